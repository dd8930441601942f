/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Replies handed out by the mock command functions.

use std::{ffi::c_int, ptr};

use hiredis_vip_sys::{RedisReply, RedisReplyType};

/// A reply to be returned by the next mocked command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    String(Vec<u8>),
    Array(Vec<MockReply>),
    Integer(i64),
    Nil,
    Status(String),
    Error(String),
}

impl MockReply {
    pub fn string(s: impl Into<Vec<u8>>) -> Self {
        Self::String(s.into())
    }

    pub fn status(s: impl Into<String>) -> Self {
        Self::Status(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Self::Error(s.into())
    }

    /// Lay the reply out as a native `redisReply` tree.
    ///
    /// The tree must be released with [`free_reply`].
    pub(crate) fn into_raw(self) -> *mut RedisReply {
        let mut reply = RedisReply {
            type_: 0,
            integer: 0,
            len: 0,
            str_: ptr::null_mut(),
            elements: 0,
            element: ptr::null_mut(),
        };
        match self {
            Self::String(bytes) => set_str(&mut reply, RedisReplyType::String, bytes),
            Self::Status(s) => set_str(&mut reply, RedisReplyType::Status, s.into_bytes()),
            Self::Error(s) => set_str(&mut reply, RedisReplyType::Error, s.into_bytes()),
            Self::Integer(n) => {
                reply.type_ = RedisReplyType::Integer as c_int;
                reply.integer = n;
            }
            Self::Nil => reply.type_ = RedisReplyType::Nil as c_int,
            Self::Array(elements) => {
                reply.type_ = RedisReplyType::Array as c_int;
                reply.elements = elements.len();
                let element: Box<[*mut RedisReply]> =
                    elements.into_iter().map(Self::into_raw).collect();
                reply.element = Box::into_raw(element).cast();
            }
        }
        Box::into_raw(Box::new(reply))
    }
}

fn set_str(reply: &mut RedisReply, type_: RedisReplyType, mut bytes: Vec<u8>) {
    reply.type_ = type_ as c_int;
    reply.len = bytes.len() as c_int;
    // hiredis always null-terminates string payloads.
    bytes.push(0);
    reply.str_ = Box::into_raw(bytes.into_boxed_slice()).cast();
}

/// Release a tree built by [`MockReply::into_raw`].
///
/// # Safety
/// `reply` must originate from [`MockReply::into_raw`] and must not have
/// been released already.
pub(crate) unsafe fn free_reply(reply: *mut RedisReply) {
    // Safety: guaranteed by the caller.
    let reply = unsafe { Box::from_raw(reply) };
    if !reply.str_.is_null() {
        let len = reply.len as usize + 1;
        // Safety: `str_` was allocated by `set_str` as a boxed slice of
        // `len` payload bytes plus the null terminator.
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(reply.str_.cast::<u8>(), len)) });
    }
    if !reply.element.is_null() {
        // Safety: `element` was allocated by `into_raw` as a boxed slice of
        // `elements` pointers.
        let elements =
            unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(reply.element, reply.elements)) };
        for element in elements.iter() {
            // Safety: every element was built by `into_raw` and is owned by
            // its parent only.
            unsafe { free_reply(*element) };
        }
    }
}
