/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Thread-local bookkeeping for the mock entry points.

use std::{
    cell::RefCell,
    collections::{HashSet, VecDeque},
    ffi::c_int,
};

use hiredis_vip_sys::Timeval;

use crate::reply::MockReply;

/// A snapshot of what the mock observed on the current thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Format strings of every command, in call order.
    pub commands: Vec<String>,
    pub connects: usize,
    pub cluster_connects: usize,
    pub live_contexts: usize,
    pub live_cluster_contexts: usize,
    pub live_replies: usize,
    pub contexts_freed: usize,
    pub cluster_contexts_freed: usize,
    pub replies_freed: usize,
    /// Releases of a pointer that wasn't live: freed twice, or never allocated.
    pub double_frees: usize,
    pub reconnects: usize,
    pub keep_alives: usize,
    pub cluster_resets: usize,
    pub max_redirect: Option<c_int>,
    pub last_cluster_flags: Option<c_int>,
    pub last_timeout: Option<Timeval>,
    pub non_blocking_connects: usize,
}

#[derive(Default)]
pub(crate) struct MockState {
    pub(crate) stats: MockStats,
    /// `None` entries make the next command return NULL.
    pub(crate) queued: VecDeque<Option<MockReply>>,
    pub(crate) contexts: HashSet<usize>,
    pub(crate) cluster_contexts: HashSet<usize>,
    pub(crate) replies: HashSet<usize>,
}

impl MockState {
    fn snapshot(&self) -> MockStats {
        MockStats {
            live_contexts: self.contexts.len(),
            live_cluster_contexts: self.cluster_contexts.len(),
            live_replies: self.replies.len(),
            ..self.stats.clone()
        }
    }
}

thread_local! {
    pub(crate) static MOCK_STATE: RefCell<MockState> = RefCell::new(MockState::default());
}

pub(crate) fn with_state<R>(f: impl FnOnce(&mut MockState) -> R) -> R {
    MOCK_STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Queue `reply` as the result of the next command issued on this thread.
pub fn push_reply(reply: MockReply) {
    with_state(|state| state.queued.push_back(Some(reply)));
}

/// Make the next command issued on this thread return NULL.
pub fn push_null_reply() {
    with_state(|state| state.queued.push_back(None));
}

/// What the mock observed on this thread since the last [`reset`].
pub fn stats() -> MockStats {
    with_state(|state| state.snapshot())
}

/// Forget queued replies and counters.
///
/// Allocations that are still live are leaked rather than freed.
pub fn reset() {
    with_state(|state| *state = MockState::default());
}
