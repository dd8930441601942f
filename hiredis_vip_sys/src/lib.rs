/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Raw bindings to [hiredis-vip](https://github.com/vipshop/hiredis-vip),
//! the cluster-aware fork of `hiredis`.
//!
//! The native library is opened at runtime rather than linked, so that a
//! missing or mismatched install surfaces as a [`LoadError`] instead of a
//! link failure. Everything in this crate is a byte-for-byte mirror of the
//! native ABI; see the `hiredis_vip` crate for owning, safe handles.

#[cfg(not(target_pointer_width = "64"))]
compile_error!("hiredis_vip_sys forwards variadic arguments as machine words and needs a 64-bit target");

use std::sync::{Arc, OnceLock};

mod bindings;
pub mod loader;
mod types;

pub use bindings::{
    Bindings, HiredisVip, MAX_VARARGS, MissingSymbol, RedisClusterCommandFn, RedisCommandFn,
    VarArg,
};
pub use loader::{LibraryLoader, LoadError};
pub use types::{
    ERRSTR_LEN, RedisClusterContext, RedisClusterFlag, RedisClusterFlags, RedisContext,
    RedisOkType, RedisReply, RedisReplyType, Timeval, UnknownTag, cluster_flags_to_c,
};

static HIREDIS_VIP: OnceLock<Result<HiredisVip, Arc<LoadError>>> = OnceLock::new();

/// Load the process-wide library with `loader`.
///
/// Only the first call, or the first call to [`hiredis_vip`], performs a
/// search; later calls return the outcome of that one, whatever loader
/// they pass. A failed load is final.
pub fn init(loader: &LibraryLoader) -> Result<&'static HiredisVip, Arc<LoadError>> {
    HIREDIS_VIP
        .get_or_init(|| loader.load().map_err(Arc::new))
        .as_ref()
        .map_err(Arc::clone)
}

/// The process-wide library, loaded with [`LibraryLoader::default`] unless
/// [`init`] ran first.
pub fn hiredis_vip() -> Result<&'static HiredisVip, Arc<LoadError>> {
    init(&LibraryLoader::default())
}
