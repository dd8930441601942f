/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Tests against the native library and real servers:
//! a standalone Redis on 127.0.0.1:6379 and a cluster with seed nodes on
//! 127.0.0.1:7000 and 127.0.0.1:7001.
//!
//! Run with `cargo test -- --ignored`.

use std::time::{Duration, Instant};

use hiredis_vip::{Error, ReplyRef, Timeval};
use pretty_assertions::assert_eq;

#[test]
#[ignore = "needs libhiredis_vip and a Redis server on 127.0.0.1:6379"]
fn set_get() {
    let mut connection = hiredis_vip::connect("127.0.0.1", 6379).unwrap();
    let reply = connection
        .command(c"SET %b %b", &["hiredis_vip:foo".into(), "bar".into()])
        .unwrap();
    assert_eq!(reply.value(), ReplyRef::Status(b"OK"));

    let reply = connection
        .command(c"GET %b", &["hiredis_vip:foo".into()])
        .unwrap();
    assert_eq!(reply.value(), ReplyRef::String(b"bar"));
}

#[test]
#[ignore = "needs libhiredis_vip and a Redis Cluster on 127.0.0.1:7000,7001"]
fn cluster_get_missing_key() {
    let mut cluster =
        hiredis_vip::cluster_connect("127.0.0.1:7000,127.0.0.1:7001", None).unwrap();
    let reply = cluster.command(c"GET missing-key", &[]).unwrap();
    assert_eq!(reply.value(), ReplyRef::Nil);
}

#[test]
#[ignore = "needs libhiredis_vip"]
fn cluster_timeout_is_bounded() {
    // TEST-NET-1 addresses are never routed.
    let start = Instant::now();
    let result = hiredis_vip::ClusterContext::connect_with_timeout(
        "192.0.2.1:7000,192.0.2.2:7001",
        Timeval::new(1, 0),
        hiredis_vip::DEFAULT_CLUSTER_FLAGS,
    );
    assert!(
        matches!(result, Err(Error::NullContext | Error::Connect(_))),
        "{result:?}"
    );
    let elapsed = start.elapsed();
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
}
