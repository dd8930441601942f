/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! `hiredis_vip_mock` provides Rust implementations of the hiredis-vip entry
//! points bound by [`hiredis_vip_sys::Bindings`], so that the owning wrappers
//! can be exercised without the native library or a Redis server.
//!
//! Contexts and replies are allocated on the Rust heap. Every allocation and
//! release is recorded in thread-local [`MockStats`], which is what tests
//! assert on: a handle that releases its resource exactly once leaves
//! `double_frees` at zero and the matching `live_*` count back at zero.
//!
//! Command calls don't talk to anything; they pop the next reply queued on
//! the calling thread with [`push_reply`].
//!
//! Addresses containing [`UNREACHABLE`] simulate a server that can't be
//! reached.

use std::sync::OnceLock;

use hiredis_vip_sys::HiredisVip;

mod c_functions;
mod reply;
mod state;

pub use reply::MockReply;
pub use state::{MockStats, push_null_reply, push_reply, reset, stats};

/// Hosts or cluster addresses containing this marker fail to connect.
pub const UNREACHABLE: &str = "unreachable";

/// The error string reported by contexts that failed to connect.
pub const CONNECTION_REFUSED: &str = "Connection refused";

/// The error string reported when a command finds no queued reply.
pub const NO_QUEUED_REPLY: &str = "Server closed the connection";

/// A [`HiredisVip`] whose entry points are the mock implementations.
pub fn mock_hiredis_vip() -> &'static HiredisVip {
    static MOCK: OnceLock<HiredisVip> = OnceLock::new();
    MOCK.get_or_init(|| {
        // Safety: every function in the table mirrors the native signature
        // and lives for the whole program.
        unsafe { HiredisVip::from_bindings(c_functions::bindings()) }
    })
}
