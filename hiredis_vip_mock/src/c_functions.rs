/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Mock implementations of the hiredis-vip C functions.
//!
//! None of these may panic: unwinding out of an `extern "C"` function aborts.

use std::{
    ffi::{CStr, c_char, c_int, c_void},
    ptr,
};

use hiredis_vip_sys::{
    Bindings, ERRSTR_LEN, RedisClusterCommandFn, RedisClusterContext, RedisCommandFn,
    RedisContext, RedisOkType, RedisReply, Timeval,
};

use crate::{
    CONNECTION_REFUSED, NO_QUEUED_REPLY, UNREACHABLE,
    reply::free_reply,
    state::{MockState, with_state},
};

/// Shared layout of the mocked `redisContext` and `redisClusterContext`:
/// the native public head followed by mock-only fields.
#[repr(C)]
struct MockContext {
    err: c_int,
    errstr: [c_char; ERRSTR_LEN],
    unreachable: bool,
}

impl MockContext {
    fn new(address: &CStr) -> Box<Self> {
        let mut context = Box::new(Self {
            err: 0,
            errstr: [0; ERRSTR_LEN],
            unreachable: false,
        });
        if address.to_string_lossy().contains(UNREACHABLE) {
            context.unreachable = true;
            context.set_error(RedisOkType::ErrIo, CONNECTION_REFUSED);
        }
        context
    }

    fn set_error(&mut self, status: RedisOkType, message: &str) {
        self.err = status as c_int;
        self.errstr = [0; ERRSTR_LEN];
        for (dst, src) in self
            .errstr
            .iter_mut()
            .zip(message.bytes().take(ERRSTR_LEN - 1))
        {
            *dst = src as c_char;
        }
    }

    fn clear_error(&mut self) {
        self.err = 0;
        self.errstr = [0; ERRSTR_LEN];
    }
}

fn release(live: impl FnOnce(&mut MockState) -> bool, ptr: *mut MockContext) {
    if with_state(live) {
        // Safety: the pointer was still tracked as live, so it originates
        // from `Box::into_raw` in one of the connect functions.
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Pop the next queued reply, or report an I/O error on `context`.
fn next_reply(context: *mut MockContext, format: *const c_char) -> *mut RedisReply {
    // Safety: callers pass a null-terminated format string.
    let format = unsafe { CStr::from_ptr(format) }.to_string_lossy().into_owned();
    let queued = with_state(|state| {
        state.stats.commands.push(format);
        state.queued.pop_front().flatten()
    });
    match queued {
        Some(reply) => {
            let raw = reply.into_raw();
            with_state(|state| state.replies.insert(raw as usize));
            raw
        }
        None => {
            // Safety: callers pass a live context.
            unsafe { &mut *context }.set_error(RedisOkType::ErrEof, NO_QUEUED_REPLY);
            ptr::null_mut()
        }
    }
}

unsafe extern "C" fn free_reply_object(reply: *mut c_void) {
    if reply.is_null() {
        return;
    }
    let live = with_state(|state| {
        let live = state.replies.remove(&(reply as usize));
        if live {
            state.stats.replies_freed += 1;
        } else {
            state.stats.double_frees += 1;
        }
        live
    });
    if live {
        // Safety: the reply was tracked as live, so it was built by
        // `MockReply::into_raw` and not released yet.
        unsafe { free_reply(reply.cast()) };
    }
}

unsafe extern "C" fn redis_reply_element(
    reply: *mut RedisReply,
    index: libc::size_t,
) -> *mut RedisReply {
    // Safety: callers pass a live reply.
    let reply = unsafe { &*reply };
    if reply.element.is_null() || index >= reply.elements {
        return ptr::null_mut();
    }
    // Safety: `index` is within the `elements` pointers of `element`.
    unsafe { *reply.element.add(index) }
}

unsafe extern "C" fn redis_connect(ip: *const c_char, _port: c_int) -> *mut RedisContext {
    // Safety: callers pass a null-terminated host.
    let context = MockContext::new(unsafe { CStr::from_ptr(ip) });
    let raw = Box::into_raw(context);
    with_state(|state| {
        state.stats.connects += 1;
        state.contexts.insert(raw as usize);
    });
    raw.cast()
}

unsafe extern "C" fn redis_reconnect(c: *mut RedisContext) -> c_int {
    // Safety: callers pass a live context.
    let context = unsafe { &mut *c.cast::<MockContext>() };
    with_state(|state| state.stats.reconnects += 1);
    if context.unreachable {
        context.set_error(RedisOkType::ErrIo, CONNECTION_REFUSED);
        RedisOkType::Err as c_int
    } else {
        context.clear_error();
        RedisOkType::Ok as c_int
    }
}

unsafe extern "C" fn redis_enable_keep_alive(_c: *mut RedisContext) -> c_int {
    with_state(|state| state.stats.keep_alives += 1);
    RedisOkType::Ok as c_int
}

unsafe extern "C" fn redis_command(c: *mut RedisContext, format: *const c_char) -> *mut RedisReply {
    next_reply(c.cast(), format)
}

unsafe extern "C" fn redis_free(c: *mut RedisContext) {
    if c.is_null() {
        return;
    }
    release(
        |state| {
            let live = state.contexts.remove(&(c as usize));
            if live {
                state.stats.contexts_freed += 1;
            } else {
                state.stats.double_frees += 1;
            }
            live
        },
        c.cast(),
    );
}

fn cluster_connect(addrs: *const c_char, flags: c_int) -> *mut RedisClusterContext {
    // Safety: callers pass a null-terminated address list.
    let context = MockContext::new(unsafe { CStr::from_ptr(addrs) });
    let raw = Box::into_raw(context);
    with_state(|state| {
        state.stats.cluster_connects += 1;
        state.stats.last_cluster_flags = Some(flags);
        state.cluster_contexts.insert(raw as usize);
    });
    raw.cast()
}

unsafe extern "C" fn redis_cluster_connect(
    addrs: *const c_char,
    flags: c_int,
) -> *mut RedisClusterContext {
    cluster_connect(addrs, flags)
}

unsafe extern "C" fn redis_cluster_connect_with_timeout(
    addrs: *const c_char,
    tv: Timeval,
    flags: c_int,
) -> *mut RedisClusterContext {
    with_state(|state| state.stats.last_timeout = Some(tv));
    // Safety: callers pass a null-terminated address list.
    if unsafe { CStr::from_ptr(addrs) }
        .to_string_lossy()
        .contains(UNREACHABLE)
    {
        // hiredis-vip gives up on the seed nodes once the timeout expires.
        return ptr::null_mut();
    }
    cluster_connect(addrs, flags)
}

unsafe extern "C" fn redis_cluster_connect_non_block(
    addrs: *const c_char,
    flags: c_int,
) -> *mut RedisClusterContext {
    with_state(|state| state.stats.non_blocking_connects += 1);
    cluster_connect(addrs, flags)
}

unsafe extern "C" fn redis_cluster_command(
    cc: *mut RedisClusterContext,
    format: *const c_char,
) -> *mut RedisReply {
    next_reply(cc.cast(), format)
}

unsafe extern "C" fn redis_cluster_set_max_redirect(_cc: *mut RedisClusterContext, count: c_int) {
    with_state(|state| state.stats.max_redirect = Some(count));
}

unsafe extern "C" fn redis_cluster_reset(cc: *mut RedisClusterContext) {
    // Safety: callers pass a live context.
    unsafe { &mut *cc.cast::<MockContext>() }.clear_error();
    with_state(|state| state.stats.cluster_resets += 1);
}

unsafe extern "C" fn redis_cluster_free(cc: *mut RedisClusterContext) {
    if cc.is_null() {
        return;
    }
    release(
        |state| {
            let live = state.cluster_contexts.remove(&(cc as usize));
            if live {
                state.stats.cluster_contexts_freed += 1;
            } else {
                state.stats.double_frees += 1;
            }
            live
        },
        cc.cast(),
    );
}

type FixedCommandFn = unsafe extern "C" fn(*mut RedisContext, *const c_char) -> *mut RedisReply;
type FixedClusterCommandFn =
    unsafe extern "C" fn(*mut RedisClusterContext, *const c_char) -> *mut RedisReply;

pub(crate) fn bindings() -> Bindings {
    // Safety: the command mocks only read the fixed leading arguments. On the
    // 64-bit targets hiredis_vip_sys supports those are passed the same way
    // to a variadic callee, and the trailing variadic words are ignored.
    let (redis_command, redis_cluster_command) = unsafe {
        (
            std::mem::transmute::<FixedCommandFn, RedisCommandFn>(redis_command),
            std::mem::transmute::<FixedClusterCommandFn, RedisClusterCommandFn>(
                redis_cluster_command,
            ),
        )
    };

    Bindings {
        free_reply_object,
        redis_reply_element: Some(redis_reply_element),
        redis_connect,
        redis_reconnect,
        redis_enable_keep_alive,
        redis_command,
        redis_free,
        redis_cluster_free,
        redis_cluster_connect,
        redis_cluster_connect_with_timeout,
        redis_cluster_connect_non_block,
        redis_cluster_command,
        redis_cluster_set_max_redirect,
        redis_cluster_reset,
    }
}
