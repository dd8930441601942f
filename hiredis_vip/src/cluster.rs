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

use enumflags2::make_bitflags;
use hiredis_vip_sys::{
    HiredisVip, RedisClusterContext, RedisClusterFlag, RedisClusterFlags, RedisOkType, Timeval,
    cluster_flags_to_c,
};
use tracing::{debug, trace};

use crate::{
    command::{CommandArg, to_varargs},
    error::{Error, NativeError, Result},
    reply::Reply,
};

/// The flags used when none are given: track replicas of every master.
pub const DEFAULT_CLUSTER_FLAGS: RedisClusterFlags = make_bitflags!(RedisClusterFlag::{AddSlave});

/// An owned connection to a Redis Cluster, released with
/// `redisClusterFree` on drop.
///
/// Addresses are given as a comma-separated list of `host:port` seed nodes,
/// e.g. `"127.0.0.1:7000,127.0.0.1:7001"`. Commands are routed by key slot
/// and follow redirections, up to the limit set with
/// [`ClusterContext::set_max_redirect`].
///
/// # Invariants
/// - The wrapped pointer is non-null and was returned by one of the
///   `redisClusterConnect*` functions of the library `api` points to.
/// - The wrapped pointer is unique: nothing else frees it.
pub struct ClusterContext {
    ctx: NonNull<RedisClusterContext>,
    api: &'static HiredisVip,
}

impl ClusterContext {
    /// Connect with [`DEFAULT_CLUSTER_FLAGS`] through the process-wide library.
    pub fn connect(addrs: &str) -> Result<Self> {
        Self::connect_with_flags(addrs, DEFAULT_CLUSTER_FLAGS)
    }

    /// Connect with `flags` through the process-wide library.
    pub fn connect_with_flags(addrs: &str, flags: RedisClusterFlags) -> Result<Self> {
        Self::connect_with(hiredis_vip_sys::hiredis_vip()?, addrs, flags)
    }

    /// Connect through `api`.
    pub fn connect_with(api: &'static HiredisVip, addrs: &str, flags: RedisClusterFlags) -> Result<Self> {
        let addrs = CString::new(addrs)?;
        // Safety: `addrs` is a null-terminated string that outlives the call.
        let raw = unsafe {
            (api.bindings().redis_cluster_connect)(addrs.as_ptr(), cluster_flags_to_c(flags))
        };
        Self::wrap(api, raw, &addrs, flags)
    }

    /// Connect, giving up on the seed nodes once `timeout` expires.
    pub fn connect_with_timeout(
        addrs: &str,
        timeout: impl Into<Timeval>,
        flags: RedisClusterFlags,
    ) -> Result<Self> {
        Self::connect_with_timeout_in(hiredis_vip_sys::hiredis_vip()?, addrs, timeout, flags)
    }

    /// [`ClusterContext::connect_with_timeout`] through `api`.
    pub fn connect_with_timeout_in(
        api: &'static HiredisVip,
        addrs: &str,
        timeout: impl Into<Timeval>,
        flags: RedisClusterFlags,
    ) -> Result<Self> {
        let addrs = CString::new(addrs)?;
        let timeout = timeout.into();
        // Safety: `addrs` is a null-terminated string that outlives the call.
        let raw = unsafe {
            (api.bindings().redis_cluster_connect_with_timeout)(
                addrs.as_ptr(),
                timeout,
                cluster_flags_to_c(flags),
            )
        };
        Self::wrap(api, raw, &addrs, flags)
    }

    /// Connect without waiting for the seed nodes to answer.
    pub fn connect_nonblocking(addrs: &str, flags: RedisClusterFlags) -> Result<Self> {
        Self::connect_nonblocking_in(hiredis_vip_sys::hiredis_vip()?, addrs, flags)
    }

    /// [`ClusterContext::connect_nonblocking`] through `api`.
    pub fn connect_nonblocking_in(
        api: &'static HiredisVip,
        addrs: &str,
        flags: RedisClusterFlags,
    ) -> Result<Self> {
        let addrs = CString::new(addrs)?;
        // Safety: `addrs` is a null-terminated string that outlives the call.
        let raw = unsafe {
            (api.bindings().redis_cluster_connect_non_block)(
                addrs.as_ptr(),
                cluster_flags_to_c(flags),
            )
        };
        Self::wrap(api, raw, &addrs, flags)
    }

    fn wrap(
        api: &'static HiredisVip,
        raw: *mut RedisClusterContext,
        addrs: &CStr,
        flags: RedisClusterFlags,
    ) -> Result<Self> {
        let ctx = NonNull::new(raw).ok_or(Error::NullContext)?;
        let cluster = Self { ctx, api };
        if let Some(err) = cluster.error() {
            debug!(?addrs, ?flags, %err, "redisClusterConnect failed");
            return Err(Error::Connect(err));
        }
        debug!(?addrs, ?flags, "connected to cluster");
        Ok(cluster)
    }

    /// The context's current error, if any.
    pub fn error(&self) -> Option<NativeError> {
        // Safety: the invariants of `ClusterContext` guarantee a live context.
        let ctx = unsafe { self.ctx.as_ref() };
        NativeError::from_context(ctx.err, &ctx.errstr)
    }

    /// Drop the connections to every node and clear the error state.
    pub fn reset(&mut self) {
        // Safety: the context is live and exclusively borrowed.
        unsafe { (self.api.bindings().redis_cluster_reset)(self.ctx.as_ptr()) };
    }

    /// How many `MOVED`/`ASK` redirections a command may follow.
    pub fn set_max_redirect(&mut self, count: c_int) {
        // Safety: the context is live and exclusively borrowed.
        unsafe { (self.api.bindings().redis_cluster_set_max_redirect)(self.ctx.as_ptr(), count) };
    }

    /// Send a command to the node owning its key and wait for the reply.
    ///
    /// Accepts the same format strings as
    /// [`Connection::command`](crate::Connection::command).
    pub fn command(&mut self, format: &CStr, args: &[CommandArg<'_>]) -> Result<Reply> {
        let varargs = to_varargs(format, args)?;
        trace!(?format, args = args.len(), "redisClusterCommand");
        // Safety: the context is live and exclusively borrowed, `varargs`
        // was checked against `format`, and `args` outlives the call.
        let raw = unsafe {
            self.api
                .redis_cluster_command(self.ctx.as_ptr(), format.as_ptr(), &varargs)
        };
        match NonNull::new(raw) {
            // Safety: a non-null reply is owned by the caller of
            // `redisClusterCommand`.
            Some(raw) => Ok(unsafe { Reply::from_raw(self.api, raw) }),
            None => Err(Error::NullReply(self.error().unwrap_or_else(|| {
                NativeError::undescribed(RedisOkType::ErrOther)
            }))),
        }
    }

    /// The wrapped pointer. Still owned by `self`.
    pub fn as_ptr(&self) -> *mut RedisClusterContext {
        self.ctx.as_ptr()
    }

    /// Give up ownership without freeing. The caller becomes responsible
    /// for passing the pointer to `redisClusterFree` exactly once.
    pub fn into_raw(self) -> *mut RedisClusterContext {
        let raw = self.ctx.as_ptr();
        std::mem::forget(self);
        raw
    }
}

impl Drop for ClusterContext {
    fn drop(&mut self) {
        trace!(ctx = ?self.ctx, "redisClusterFree");
        // Safety: the context is unique and live, and never used again.
        unsafe { (self.api.bindings().redis_cluster_free)(self.ctx.as_ptr()) };
    }
}

impl std::fmt::Debug for ClusterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterContext")
            .field("ctx", &self.ctx)
            .field("error", &self.error())
            .finish()
    }
}

/// Safety: same reasoning as for [`Connection`](crate::Connection).
unsafe impl Send for ClusterContext {}
