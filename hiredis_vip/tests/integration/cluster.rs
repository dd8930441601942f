/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::time::Duration;

use hiredis_vip::{
    ClusterContext, DEFAULT_CLUSTER_FLAGS, Error, RedisClusterFlag, RedisClusterFlags, ReplyRef,
    Timeval,
};
use hiredis_vip_mock::{MockReply, push_null_reply, push_reply, stats};
use pretty_assertions::assert_eq;

use crate::{assert_all_released, init};

const ADDRS: &str = "127.0.0.1:7000,127.0.0.1:7001";

#[test]
fn connect_and_drop_frees_once() {
    let api = init();
    let cluster = ClusterContext::connect_with(api, ADDRS, DEFAULT_CLUSTER_FLAGS).unwrap();
    assert_eq!(stats().live_cluster_contexts, 1);

    drop(cluster);
    let stats = stats();
    assert_eq!(stats.cluster_connects, 1);
    assert_eq!(stats.cluster_contexts_freed, 1);
    assert_all_released(&stats);
}

#[test]
fn default_flags_match_explicit_add_slave() {
    let api = init();
    drop(ClusterContext::connect_with(api, ADDRS, DEFAULT_CLUSTER_FLAGS).unwrap());
    let omitted = stats().last_cluster_flags;

    drop(
        ClusterContext::connect_with(api, ADDRS, RedisClusterFlag::AddSlave.into()).unwrap(),
    );
    let explicit = stats().last_cluster_flags;

    assert_eq!(omitted, Some(0x1000));
    assert_eq!(omitted, explicit);
}

#[test]
fn flags_are_passed_as_their_bit_values() {
    let api = init();
    let flags = RedisClusterFlag::AddSlave | RedisClusterFlag::RouteUseSlots;
    drop(ClusterContext::connect_with(api, ADDRS, flags).unwrap());
    assert_eq!(stats().last_cluster_flags, Some(0x5000));

    drop(ClusterContext::connect_with(api, ADDRS, RedisClusterFlags::empty()).unwrap());
    assert_eq!(stats().last_cluster_flags, Some(0));
}

#[test]
fn failed_connect_is_freed_and_reported() {
    let api = init();
    let err = ClusterContext::connect_with(api, "unreachable:7000", DEFAULT_CLUSTER_FLAGS)
        .unwrap_err();
    assert!(matches!(err, Error::Connect(_)), "{err:?}");
    assert_all_released(&stats());
}

#[test]
fn timeout_against_unreachable_nodes_yields_no_context() {
    let api = init();
    let err = ClusterContext::connect_with_timeout_in(
        api,
        "unreachable:7000,unreachable:7001",
        Timeval::new(1, 0),
        DEFAULT_CLUSTER_FLAGS,
    )
    .unwrap_err();
    assert!(matches!(err, Error::NullContext), "{err:?}");

    let stats = stats();
    assert_eq!(stats.last_timeout, Some(Timeval::new(1, 0)));
    assert_eq!(stats.cluster_connects, 0);
}

#[test]
fn timeout_accepts_a_duration() {
    let api = init();
    let cluster = ClusterContext::connect_with_timeout_in(
        api,
        ADDRS,
        Duration::from_millis(1500),
        DEFAULT_CLUSTER_FLAGS,
    )
    .unwrap();
    drop(cluster);

    let stats = stats();
    assert_eq!(stats.last_timeout, Some(Timeval::new(1, 500_000)));
    assert_all_released(&stats);
}

#[test]
fn nonblocking_connect() {
    let api = init();
    let cluster =
        ClusterContext::connect_nonblocking_in(api, ADDRS, DEFAULT_CLUSTER_FLAGS).unwrap();
    drop(cluster);

    let stats = stats();
    assert_eq!(stats.non_blocking_connects, 1);
    assert_all_released(&stats);
}

#[test]
fn missing_key_is_nil() {
    let api = init();
    let mut cluster = ClusterContext::connect_with(api, ADDRS, DEFAULT_CLUSTER_FLAGS).unwrap();

    push_reply(MockReply::Nil);
    let reply = cluster.command(c"GET missing-key", &[]).unwrap();
    assert_eq!(reply.value(), ReplyRef::Nil);
    drop(reply);
    drop(cluster);

    let stats = stats();
    assert_eq!(stats.commands, vec!["GET missing-key"]);
    assert_all_released(&stats);
}

#[test]
fn reset_clears_the_error() {
    let api = init();
    let mut cluster = ClusterContext::connect_with(api, ADDRS, DEFAULT_CLUSTER_FLAGS).unwrap();

    push_null_reply();
    assert!(matches!(
        cluster.command(c"GET %b", &["k".into()]),
        Err(Error::NullReply(_))
    ));
    assert!(cluster.error().is_some());

    cluster.reset();
    assert!(cluster.error().is_none());
    assert_eq!(stats().cluster_resets, 1);
}

#[test]
fn set_max_redirect() {
    let api = init();
    let mut cluster = ClusterContext::connect_with(api, ADDRS, DEFAULT_CLUSTER_FLAGS).unwrap();
    cluster.set_max_redirect(3);
    assert_eq!(stats().max_redirect, Some(3));
}

#[test]
fn into_raw_hands_over_ownership() {
    let api = init();
    let cluster = ClusterContext::connect_with(api, ADDRS, DEFAULT_CLUSTER_FLAGS).unwrap();
    let raw = cluster.into_raw();
    assert_eq!(stats().live_cluster_contexts, 1);

    // Safety: `raw` came from `into_raw` and is freed exactly once.
    unsafe { (api.bindings().redis_cluster_free)(raw) };
    assert_all_released(&stats());
}
