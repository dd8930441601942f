/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Binary-compatible mirrors of the enums and structs declared in
//! `hiredis.h` and `hircluster.h`.
//!
//! Nothing in here has logic of its own: the field order and widths
//! must match the native headers exactly, or every call through
//! [`Bindings`](crate::Bindings) reads and writes garbage.

use std::{
    ffi::{c_char, c_int, c_long, c_longlong},
    marker::{PhantomData, PhantomPinned},
    time::Duration,
};

use enumflags2::{BitFlags, bitflags};

/// Flags accepted by `redisClusterConnect` and friends.
///
/// The native `HIRCLUSTER_FLAG_NULL` (`0x0`) is the empty set,
/// i.e. [`RedisClusterFlags::empty`].
#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RedisClusterFlag {
    /// Track slave nodes in `redisClusterContext->nodes`.
    AddSlave = 0x1000,
    /// Track open slots of master nodes.
    AddOpenSlot = 0x2000,
    /// Route commands through the slot table rather than the node dict.
    RouteUseSlots = 0x4000,
}

/// A combination of [`RedisClusterFlag`]s, OR-ed together before being
/// passed to the native library.
pub type RedisClusterFlags = BitFlags<RedisClusterFlag>;

/// Convert a set of cluster flags into the `int` the native functions expect.
pub fn cluster_flags_to_c(flags: RedisClusterFlags) -> c_int {
    flags.bits() as c_int
}

/// Error returned when a native tag doesn't correspond to any variant
/// of the mirrored enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown native tag {0}")]
pub struct UnknownTag(pub c_int);

/// `REDIS_REPLY_*` tags stored in [`RedisReply::type_`].
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RedisReplyType {
    String = 1,
    Array = 2,
    Integer = 3,
    Nil = 4,
    Status = 5,
    Error = 6,
}

impl TryFrom<c_int> for RedisReplyType {
    type Error = UnknownTag;

    fn try_from(value: c_int) -> Result<Self, UnknownTag> {
        Ok(match value {
            1 => Self::String,
            2 => Self::Array,
            3 => Self::Integer,
            4 => Self::Nil,
            5 => Self::Status,
            6 => Self::Error,
            other => return Err(UnknownTag(other)),
        })
    }
}

/// `REDIS_OK`, `REDIS_ERR` and the `REDIS_ERR_*` codes.
///
/// The functions returning a status use [`RedisOkType::Ok`] and
/// [`RedisOkType::Err`]; the more specific codes end up in the
/// context's `err` field.
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RedisOkType {
    Ok = 0,
    Err = -1,
    /// Error in read or write.
    ErrIo = 1,
    /// Everything else.
    ErrOther = 2,
    /// End of file.
    ErrEof = 3,
    ErrProtocol = 4,
    ErrOom = 5,
    ErrClusterTooManyRedirect = 6,
}

impl TryFrom<c_int> for RedisOkType {
    type Error = UnknownTag;

    fn try_from(value: c_int) -> Result<Self, UnknownTag> {
        Ok(match value {
            0 => Self::Ok,
            -1 => Self::Err,
            1 => Self::ErrIo,
            2 => Self::ErrOther,
            3 => Self::ErrEof,
            4 => Self::ErrProtocol,
            5 => Self::ErrOom,
            6 => Self::ErrClusterTooManyRedirect,
            other => return Err(UnknownTag(other)),
        })
    }
}

/// Mirror of `struct timeval`, passed by value to
/// `redisClusterConnectWithTimeout`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeval {
    pub tv_sec: c_long,
    pub tv_usec: c_long,
}

impl Timeval {
    pub const fn new(tv_sec: c_long, tv_usec: c_long) -> Self {
        Self { tv_sec, tv_usec }
    }
}

impl From<Duration> for Timeval {
    /// Saturates at `c_long::MAX` seconds.
    fn from(duration: Duration) -> Self {
        Self {
            tv_sec: c_long::try_from(duration.as_secs()).unwrap_or(c_long::MAX),
            tv_usec: duration.subsec_micros() as c_long,
        }
    }
}

/// Mirror of `redisReply`.
///
/// Which fields are meaningful depends on `type_`:
///
/// | `type_`   | meaningful fields       |
/// |-----------|-------------------------|
/// | `String`  | `str_`, `len`           |
/// | `Status`  | `str_`, `len`           |
/// | `Error`   | `str_`, `len`           |
/// | `Integer` | `integer`               |
/// | `Array`   | `elements`, `element`   |
/// | `Nil`     | none                    |
///
/// Reading a field outside of that table yields an unspecified value.
#[repr(C)]
#[derive(Debug)]
pub struct RedisReply {
    pub type_: c_int,
    pub integer: c_longlong,
    pub len: c_int,
    pub str_: *mut c_char,
    pub elements: libc::size_t,
    pub element: *mut *mut RedisReply,
}

/// Maximum length of the error string embedded in native contexts,
/// including its null terminator.
pub const ERRSTR_LEN: usize = 128;

/// Opaque `redisContext`.
///
/// Only the leading `err`/`errstr` fields are public in the native header
/// and mirrored here; the rest of the struct is never touched from Rust.
#[repr(C)]
pub struct RedisContext {
    pub err: c_int,
    pub errstr: [c_char; ERRSTR_LEN],
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Opaque `redisClusterContext`.
///
/// Shares its leading `err`/`errstr` fields with [`RedisContext`].
#[repr(C)]
pub struct RedisClusterContext {
    pub err: c_int,
    pub errstr: [c_char; ERRSTR_LEN],
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}
