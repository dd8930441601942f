/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The callable surface of `libhiredis_vip`.
//!
//! Every entry point is a plain, blocking C call: the calling thread is
//! occupied until the native library returns, and nothing in here retries,
//! yields, or interprets the result.

use std::{
    ffi::{c_char, c_int, c_longlong, c_void},
    fmt,
    path::{Path, PathBuf},
};

use libloading::Library;

use crate::types::{RedisClusterContext, RedisContext, RedisReply, Timeval};

/// `void *redisCommand(redisContext *c, const char *format, ...)`
pub type RedisCommandFn =
    unsafe extern "C" fn(c: *mut RedisContext, format: *const c_char, ...) -> *mut RedisReply;

/// `void *redisClusterCommand(redisClusterContext *cc, const char *format, ...)`
pub type RedisClusterCommandFn = unsafe extern "C" fn(
    cc: *mut RedisClusterContext,
    format: *const c_char,
    ...
) -> *mut RedisReply;

/// Function pointers for every native entry point the binding relies on.
///
/// A table is normally resolved from a loaded library by
/// [`LibraryLoader::load`](crate::LibraryLoader::load). Tests can build one
/// by hand out of Rust implementations of the same signatures.
#[derive(Clone, Copy)]
pub struct Bindings {
    pub free_reply_object: unsafe extern "C" fn(reply: *mut c_void),
    /// Not exported by every hiredis-vip build.
    pub redis_reply_element:
        Option<unsafe extern "C" fn(reply: *mut RedisReply, index: libc::size_t) -> *mut RedisReply>,
    pub redis_connect: unsafe extern "C" fn(ip: *const c_char, port: c_int) -> *mut RedisContext,
    pub redis_reconnect: unsafe extern "C" fn(c: *mut RedisContext) -> c_int,
    pub redis_enable_keep_alive: unsafe extern "C" fn(c: *mut RedisContext) -> c_int,
    pub redis_command: RedisCommandFn,
    pub redis_free: unsafe extern "C" fn(c: *mut RedisContext),

    pub redis_cluster_free: unsafe extern "C" fn(cc: *mut RedisClusterContext),
    pub redis_cluster_connect:
        unsafe extern "C" fn(addrs: *const c_char, flags: c_int) -> *mut RedisClusterContext,
    pub redis_cluster_connect_with_timeout: unsafe extern "C" fn(
        addrs: *const c_char,
        tv: Timeval,
        flags: c_int,
    ) -> *mut RedisClusterContext,
    pub redis_cluster_connect_non_block:
        unsafe extern "C" fn(addrs: *const c_char, flags: c_int) -> *mut RedisClusterContext,
    pub redis_cluster_command: RedisClusterCommandFn,
    pub redis_cluster_set_max_redirect:
        unsafe extern "C" fn(cc: *mut RedisClusterContext, max_redirect_count: c_int),
    pub redis_cluster_reset: unsafe extern "C" fn(cc: *mut RedisClusterContext),
}

/// A symbol the native library was expected to export but didn't.
#[derive(Debug, thiserror::Error)]
#[error("symbol `{symbol}` could not be resolved: {source}")]
pub struct MissingSymbol {
    pub symbol: &'static str,
    #[source]
    pub source: libloading::Error,
}

/// Copy a function pointer out of `library`.
///
/// # Safety
/// - `T` must be the exact function pointer type of the exported symbol.
/// - The returned pointer is only valid while `library` stays loaded.
unsafe fn resolve<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, MissingSymbol> {
    // Safety: guaranteed by the caller.
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|source| MissingSymbol { symbol, source })
}

impl Bindings {
    /// Resolve every entry point from `library`.
    ///
    /// # Safety
    /// `library` must be a build of hiredis-vip whose public header matches
    /// the signatures declared on [`Bindings`], and must outlive every use
    /// of the returned table.
    pub unsafe fn resolve(library: &Library) -> Result<Self, MissingSymbol> {
        // Safety: guaranteed by the caller, for every symbol below.
        unsafe {
            Ok(Self {
                free_reply_object: resolve(library, "freeReplyObject")?,
                redis_reply_element: resolve(library, "redisReplyElement").ok(),
                redis_connect: resolve(library, "redisConnect")?,
                redis_reconnect: resolve(library, "redisReconnect")?,
                redis_enable_keep_alive: resolve(library, "redisEnableKeepAlive")?,
                redis_command: resolve(library, "redisCommand")?,
                redis_free: resolve(library, "redisFree")?,
                redis_cluster_free: resolve(library, "redisClusterFree")?,
                redis_cluster_connect: resolve(library, "redisClusterConnect")?,
                redis_cluster_connect_with_timeout: resolve(
                    library,
                    "redisClusterConnectWithTimeout",
                )?,
                redis_cluster_connect_non_block: resolve(library, "redisClusterConnectNonBlock")?,
                redis_cluster_command: resolve(library, "redisClusterCommand")?,
                redis_cluster_set_max_redirect: resolve(library, "redisClusterSetMaxRedirect")?,
                redis_cluster_reset: resolve(library, "redisClusterReset")?,
            })
        }
    }
}

/// A single argument forwarded to a printf-style variadic native call.
///
/// Each record is one C-level argument; a `%b` conversion consumes a
/// [`VarArg::CStr`] pointer followed by a [`VarArg::SizeT`] length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarArg {
    /// A `const char *`, for `%s` or the pointer half of `%b`.
    CStr(*const c_char),
    /// A `size_t`, for the length half of `%b`.
    SizeT(libc::size_t),
    /// A `long long`, for `%lld`.
    LongLong(c_longlong),
}

impl VarArg {
    /// On 64-bit targets pointers, `size_t` and `long long` are all passed
    /// in one integer-class variadic slot, so a single machine word stands
    /// in for any of them.
    fn into_word(self) -> usize {
        match self {
            Self::CStr(ptr) => ptr as usize,
            Self::SizeT(n) => n,
            Self::LongLong(n) => n as usize,
        }
    }
}

/// Upper bound on the number of [`VarArg`]s a single command can forward.
pub const MAX_VARARGS: usize = 16;

macro_rules! call_variadic {
    ($f:expr, $ctx:expr, $format:expr, $words:expr; $($len:literal => [$($i:literal),*]),* $(,)?) => {
        match $words.len() {
            $($len => $f($ctx, $format $(, $words[$i])*),)*
            len => panic!("{len} variadic arguments exceed the limit of {MAX_VARARGS}"),
        }
    };
}

macro_rules! dispatch_variadic {
    ($f:expr, $ctx:expr, $format:expr, $words:expr) => {
        call_variadic!($f, $ctx, $format, $words;
            0 => [],
            1 => [0],
            2 => [0, 1],
            3 => [0, 1, 2],
            4 => [0, 1, 2, 3],
            5 => [0, 1, 2, 3, 4],
            6 => [0, 1, 2, 3, 4, 5],
            7 => [0, 1, 2, 3, 4, 5, 6],
            8 => [0, 1, 2, 3, 4, 5, 6, 7],
            9 => [0, 1, 2, 3, 4, 5, 6, 7, 8],
            10 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
            11 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
            12 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            13 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            14 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13],
            15 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14],
            16 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
        )
    };
}

/// A loaded hiredis-vip library together with its resolved [`Bindings`].
pub struct HiredisVip {
    bindings: Bindings,
    path: Option<PathBuf>,
    // Keeps every pointer in `bindings` valid. Never unloaded before them.
    _library: Option<Library>,
}

impl HiredisVip {
    pub(crate) fn from_library(library: Library, path: PathBuf) -> Result<Self, MissingSymbol> {
        // Safety: `library` was found under the hiredis-vip file name and is
        // moved into `Self` alongside the table resolved from it.
        let bindings = unsafe { Bindings::resolve(&library)? };
        Ok(Self {
            bindings,
            path: Some(path),
            _library: Some(library),
        })
    }

    /// Use a hand-built table instead of a loaded library.
    ///
    /// # Safety
    /// Every pointer in `bindings` must behave like the hiredis-vip function
    /// it stands in for, and remain callable for as long as `Self` lives.
    pub const unsafe fn from_bindings(bindings: Bindings) -> Self {
        Self {
            bindings,
            path: None,
            _library: None,
        }
    }

    /// The resolved entry points.
    pub const fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Where the library was loaded from, if it was loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Call `redisCommand(c, format, args...)`.
    ///
    /// # Safety
    /// - `c` must be a live context returned by `redisConnect`, not used
    ///   concurrently from another thread.
    /// - `format` must be a null-terminated string whose conversion
    ///   specifiers consume exactly `args`, in order and by type.
    /// - Every [`VarArg::CStr`] must stay valid for the duration of the call.
    ///
    /// # Panics
    /// If `args` holds more than [`MAX_VARARGS`] records.
    pub unsafe fn redis_command(
        &self,
        c: *mut RedisContext,
        format: *const c_char,
        args: &[VarArg],
    ) -> *mut RedisReply {
        let words: Vec<usize> = args.iter().map(|arg| arg.into_word()).collect();
        let f = self.bindings.redis_command;
        // Safety: guaranteed by the caller.
        unsafe { dispatch_variadic!(f, c, format, words) }
    }

    /// Call `redisClusterCommand(cc, format, args...)`.
    ///
    /// # Safety
    /// Same requirements as [`HiredisVip::redis_command`], with `cc` a live
    /// context returned by one of the `redisClusterConnect*` functions.
    ///
    /// # Panics
    /// If `args` holds more than [`MAX_VARARGS`] records.
    pub unsafe fn redis_cluster_command(
        &self,
        cc: *mut RedisClusterContext,
        format: *const c_char,
        args: &[VarArg],
    ) -> *mut RedisReply {
        let words: Vec<usize> = args.iter().map(|arg| arg.into_word()).collect();
        let f = self.bindings.redis_cluster_command;
        // Safety: guaranteed by the caller.
        unsafe { dispatch_variadic!(f, cc, format, words) }
    }
}

impl fmt::Debug for HiredisVip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HiredisVip")
            .field("path", &self.path)
            .field(
                "redis_reply_element",
                &self.bindings.redis_reply_element.is_some(),
            )
            .finish_non_exhaustive()
    }
}
