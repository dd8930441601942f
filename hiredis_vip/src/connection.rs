/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::{
    ffi::{CStr, CString, c_int},
    ptr::NonNull,
};

use hiredis_vip_sys::{HiredisVip, RedisContext, RedisOkType};
use tracing::{debug, trace};

use crate::{
    command::{CommandArg, to_varargs},
    error::{Error, NativeError, Result, check_status},
    reply::Reply,
};

/// An owned connection to a single Redis server, released with `redisFree`
/// on drop.
///
/// Every call blocks until the server answers.
///
/// # Invariants
/// - The wrapped pointer is non-null and was returned by `redisConnect` of
///   the library `api` points to.
/// - The wrapped pointer is unique: nothing else frees it.
pub struct Connection {
    ctx: NonNull<RedisContext>,
    api: &'static HiredisVip,
}

impl Connection {
    /// Connect to `host:port` through the process-wide library.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with(hiredis_vip_sys::hiredis_vip()?, host, port)
    }

    /// Connect to `host:port` through `api`.
    ///
    /// A context that comes back in an error state is released before the
    /// error is returned.
    pub fn connect_with(api: &'static HiredisVip, host: &str, port: u16) -> Result<Self> {
        let host = CString::new(host)?;
        // Safety: `host` is a null-terminated string that outlives the call.
        let raw = unsafe { (api.bindings().redis_connect)(host.as_ptr(), c_int::from(port)) };
        let ctx = NonNull::new(raw).ok_or(Error::NullContext)?;
        let connection = Self { ctx, api };
        if let Some(err) = connection.error() {
            debug!(?host, port, %err, "redisConnect failed");
            return Err(Error::Connect(err));
        }
        debug!(?host, port, "connected");
        Ok(connection)
    }

    /// The context's current error, if any.
    pub fn error(&self) -> Option<NativeError> {
        // Safety: the invariants of `Connection` guarantee a live context.
        let ctx = unsafe { self.ctx.as_ref() };
        NativeError::from_context(ctx.err, &ctx.errstr)
    }

    /// Re-establish the connection to the same server, reusing the context.
    pub fn reconnect(&mut self) -> Result<()> {
        // Safety: the context is live and exclusively borrowed.
        let status = unsafe { (self.api.bindings().redis_reconnect)(self.ctx.as_ptr()) };
        check_status(status, self.error())
    }

    /// Turn on TCP keep-alive for the connection.
    pub fn enable_keepalive(&mut self) -> Result<()> {
        // Safety: the context is live and exclusively borrowed.
        let status = unsafe { (self.api.bindings().redis_enable_keep_alive)(self.ctx.as_ptr()) };
        check_status(status, self.error())
    }

    /// Send a command and wait for its reply.
    ///
    /// `format` follows `redisCommand`: `%s` takes a [`CommandArg::Str`],
    /// `%b` a [`CommandArg::Bytes`], `%lld` a [`CommandArg::Integer`].
    /// Replies of kind error are returned as `Ok`.
    pub fn command(&mut self, format: &CStr, args: &[CommandArg<'_>]) -> Result<Reply> {
        let varargs = to_varargs(format, args)?;
        trace!(?format, args = args.len(), "redisCommand");
        // Safety: the context is live and exclusively borrowed, `varargs`
        // was checked against `format`, and `args` outlives the call.
        let raw = unsafe {
            self.api
                .redis_command(self.ctx.as_ptr(), format.as_ptr(), &varargs)
        };
        match NonNull::new(raw) {
            // Safety: a non-null reply is owned by the caller of `redisCommand`.
            Some(raw) => Ok(unsafe { Reply::from_raw(self.api, raw) }),
            None => Err(Error::NullReply(
                self.error()
                    .unwrap_or_else(|| NativeError::undescribed(RedisOkType::ErrOther)),
            )),
        }
    }

    /// The wrapped pointer. Still owned by `self`.
    pub fn as_ptr(&self) -> *mut RedisContext {
        self.ctx.as_ptr()
    }

    /// Give up ownership without freeing. The caller becomes responsible
    /// for passing the pointer to `redisFree` exactly once.
    pub fn into_raw(self) -> *mut RedisContext {
        let raw = self.ctx.as_ptr();
        std::mem::forget(self);
        raw
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        trace!(ctx = ?self.ctx, "redisFree");
        // Safety: the context is unique and live, and never used again.
        unsafe { (self.api.bindings().redis_free)(self.ctx.as_ptr()) };
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("ctx", &self.ctx)
            .field("error", &self.error())
            .finish()
    }
}

/// Safety: the context is uniquely owned and hiredis keeps no thread-local
/// state for it, so it can be moved to another thread. It is not `Sync`:
/// a context must not be used from two threads at once.
unsafe impl Send for Connection {}
