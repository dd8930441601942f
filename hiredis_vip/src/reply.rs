/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::{ffi::c_int, fmt, ptr::NonNull, slice};

use hiredis_vip_sys::{HiredisVip, RedisReply, RedisReplyType, UnknownTag};
use tracing::trace;

/// An owned `redisReply`, released with `freeReplyObject` on drop.
///
/// # Invariants
/// - The wrapped pointer is non-null and was returned by `redisCommand` or
///   `redisClusterCommand` of the library `api` points to.
/// - The wrapped pointer is unique: nothing else frees it or holds onto it
///   past the lifetime of this value.
pub struct Reply {
    raw: NonNull<RedisReply>,
    api: &'static HiredisVip,
}

impl Reply {
    /// Take ownership of a reply returned by a command function.
    ///
    /// # Safety
    /// `raw` must satisfy the invariants of [`Reply`].
    pub(crate) const unsafe fn from_raw(api: &'static HiredisVip, raw: NonNull<RedisReply>) -> Self {
        Self { raw, api }
    }

    /// The tag of the reply.
    pub fn kind(&self) -> Result<RedisReplyType, UnknownTag> {
        self.value().kind()
    }

    /// A view of the reply that only exposes the fields valid for its kind.
    pub fn value(&self) -> ReplyRef<'_> {
        // Safety: the invariants of `Reply` guarantee a live `redisReply`,
        // which is not freed while `self` is borrowed.
        unsafe { ReplyRef::from_raw(self.raw.as_ref()) }
    }

    /// The `index`-th sub-element, fetched through the native
    /// `redisReplyElement`.
    ///
    /// `None` when the index is out of bounds, or when the loaded library
    /// doesn't export `redisReplyElement`; [`ReplyRef::Array`] reads
    /// sub-elements directly and works in both cases.
    pub fn native_element(&self, index: usize) -> Option<ReplyRef<'_>> {
        let reply_element = self.api.bindings().redis_reply_element?;
        if !matches!(self.value(), ReplyRef::Array(elements) if index < elements.len()) {
            return None;
        }
        // Safety: `self.raw` is a live array reply and `index` is in bounds.
        let element = unsafe { reply_element(self.raw.as_ptr(), index) };
        // Safety: sub-elements live as long as their parent.
        NonNull::new(element).map(|element| unsafe { ReplyRef::from_raw(element.as_ref()) })
    }

    /// The wrapped pointer. Still owned by `self`.
    pub fn as_ptr(&self) -> *const RedisReply {
        self.raw.as_ptr()
    }

    /// Give up ownership without freeing. The caller becomes responsible
    /// for passing the pointer to `freeReplyObject` exactly once.
    pub fn into_raw(self) -> *mut RedisReply {
        let raw = self.raw.as_ptr();
        std::mem::forget(self);
        raw
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        trace!(reply = ?self.raw, "freeReplyObject");
        // Safety: `self.raw` is unique and live (see the invariants of
        // `Reply`), and is never used again.
        unsafe { (self.api.bindings().free_reply_object)(self.raw.as_ptr().cast()) };
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// Safety: `Reply` uniquely owns its `redisReply`, and `freeReplyObject`
/// may be called from any thread. It's not `Sync`: replies are passed
/// along, not shared.
unsafe impl Send for Reply {}

/// A borrowed view of a `redisReply`, tagged by kind.
///
/// String payloads are returned as bytes, exactly `len` long, since Redis
/// strings are binary safe.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ReplyRef<'a> {
    String(&'a [u8]),
    Array(Elements<'a>),
    Integer(i64),
    Nil,
    Status(&'a [u8]),
    Error(&'a [u8]),
    /// A tag hiredis-vip doesn't produce. No payload field is trusted.
    Unknown(c_int),
}

impl<'a> ReplyRef<'a> {
    /// Build a view over a native reply.
    ///
    /// # Safety
    /// `reply` must be a fully initialized `redisReply` as produced by
    /// hiredis-vip, live for `'a`.
    pub unsafe fn from_raw(reply: &'a RedisReply) -> Self {
        let Ok(kind) = RedisReplyType::try_from(reply.type_) else {
            return Self::Unknown(reply.type_);
        };
        match kind {
            // Safety: string payloads are valid for string-like kinds.
            RedisReplyType::String => Self::String(unsafe { str_bytes(reply) }),
            // Safety: as above.
            RedisReplyType::Status => Self::Status(unsafe { str_bytes(reply) }),
            // Safety: as above.
            RedisReplyType::Error => Self::Error(unsafe { str_bytes(reply) }),
            RedisReplyType::Integer => Self::Integer(reply.integer),
            RedisReplyType::Nil => Self::Nil,
            RedisReplyType::Array => {
                let element = if reply.element.is_null() || reply.elements == 0 {
                    &[][..]
                } else {
                    // Safety: array replies hold `elements` sub-reply pointers.
                    unsafe { slice::from_raw_parts(reply.element.cast_const(), reply.elements) }
                };
                Self::Array(Elements { element })
            }
        }
    }

    pub fn kind(&self) -> Result<RedisReplyType, UnknownTag> {
        match self {
            Self::String(_) => Ok(RedisReplyType::String),
            Self::Array(_) => Ok(RedisReplyType::Array),
            Self::Integer(_) => Ok(RedisReplyType::Integer),
            Self::Nil => Ok(RedisReplyType::Nil),
            Self::Status(_) => Ok(RedisReplyType::Status),
            Self::Error(_) => Ok(RedisReplyType::Error),
            Self::Unknown(tag) => Err(UnknownTag(*tag)),
        }
    }

    /// The payload of a string, status or error reply.
    pub const fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Self::String(bytes) | Self::Status(bytes) | Self::Error(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub const fn as_array(&self) -> Option<Elements<'a>> {
        match self {
            Self::Array(elements) => Some(*elements),
            _ => None,
        }
    }

    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// # Safety
/// `reply` must be a string-like reply whose `str_` points to at least
/// `len` readable bytes.
unsafe fn str_bytes(reply: &RedisReply) -> &[u8] {
    let len = usize::try_from(reply.len).unwrap_or(0);
    if reply.str_.is_null() || len == 0 {
        return &[];
    }
    // Safety: guaranteed by the caller.
    unsafe { slice::from_raw_parts(reply.str_.cast::<u8>(), len) }
}

impl fmt::Debug for ReplyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(bytes) => f
                .debug_tuple("String")
                .field(&String::from_utf8_lossy(bytes))
                .finish(),
            Self::Array(elements) => f.debug_tuple("Array").field(elements).finish(),
            Self::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            Self::Nil => f.write_str("Nil"),
            Self::Status(bytes) => f
                .debug_tuple("Status")
                .field(&String::from_utf8_lossy(bytes))
                .finish(),
            Self::Error(bytes) => f
                .debug_tuple("Error")
                .field(&String::from_utf8_lossy(bytes))
                .finish(),
            Self::Unknown(tag) => f.debug_tuple("Unknown").field(tag).finish(),
        }
    }
}

/// The sub-replies of an array reply, borrowed from their parent.
#[derive(Clone, Copy)]
pub struct Elements<'a> {
    element: &'a [*mut RedisReply],
}

impl<'a> Elements<'a> {
    pub const fn len(&self) -> usize {
        self.element.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.element.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ReplyRef<'a>> {
        self.element.get(index).map(|&element| view(element))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = ReplyRef<'a>> + 'a {
        self.element.iter().map(|&element| view(element))
    }
}

/// A NULL sub-element reads as [`ReplyRef::Nil`].
fn view<'a>(element: *mut RedisReply) -> ReplyRef<'a> {
    // Safety: sub-elements of a live array reply are live for as long as
    // the parent, which outlives `'a`.
    unsafe { element.as_ref() }.map_or(ReplyRef::Nil, |element| {
        // Safety: as above.
        unsafe { ReplyRef::from_raw(element) }
    })
}

impl<'a> IntoIterator for Elements<'a> {
    type Item = ReplyRef<'a>;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, *mut RedisReply>, fn(&*mut RedisReply) -> ReplyRef<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        let to_view: fn(&*mut RedisReply) -> ReplyRef<'a> = |&element| view(element);
        self.element.iter().map(to_view)
    }
}

impl PartialEq for Elements<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Elements<'_> {}

impl fmt::Debug for Elements<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
