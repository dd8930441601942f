/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Safe, owning handles over the hiredis-vip client library.
//!
//! The native library is loaded at runtime on first use, see
//! [`hiredis_vip_sys::loader`] for where it's searched. Every handle frees
//! its native resource exactly once when dropped:
//!
//! - [`Connection`] wraps a `redisContext` connected to a single server,
//! - [`ClusterContext`] wraps a `redisClusterContext`,
//! - [`Reply`] wraps a `redisReply`, viewed through [`ReplyRef`].
//!
//! ```no_run
//! # fn main() -> hiredis_vip::Result<()> {
//! let mut connection = hiredis_vip::connect("127.0.0.1", 6379)?;
//! connection.command(c"SET %b %b", &["foo".into(), "bar".into()])?;
//! let reply = connection.command(c"GET %b", &["foo".into()])?;
//! assert_eq!(reply.value().as_bytes(), Some(&b"bar"[..]));
//! # Ok(())
//! # }
//! ```
//!
//! All calls block the calling thread until the server answers. Handles can
//! be moved between threads but not shared: use one connection per thread.

mod cluster;
mod command;
mod connection;
mod error;
mod reply;

pub use cluster::{ClusterContext, DEFAULT_CLUSTER_FLAGS};
pub use command::CommandArg;
pub use connection::Connection;
pub use error::{Error, FormatError, NativeError, Result};
pub use hiredis_vip_sys::{
    HiredisVip, LibraryLoader, LoadError, RedisClusterFlag, RedisClusterFlags, RedisOkType,
    RedisReplyType, Timeval, UnknownTag,
};
pub use reply::{Elements, Reply, ReplyRef};

/// Connect to a single Redis server at `host:port`.
pub fn connect(host: &str, port: u16) -> Result<Connection> {
    Connection::connect(host, port)
}

/// Connect to a Redis Cluster through a comma-separated list of seed nodes.
///
/// `flags` default to [`DEFAULT_CLUSTER_FLAGS`] when `None`.
pub fn cluster_connect(addrs: &str, flags: Option<RedisClusterFlags>) -> Result<ClusterContext> {
    ClusterContext::connect_with_flags(addrs, flags.unwrap_or(DEFAULT_CLUSTER_FLAGS))
}
