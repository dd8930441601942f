/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::{sync::OnceLock, time::Duration};

use hiredis_vip::{
    ClusterContext, CommandArg, Connection, Error, HiredisVip, LibraryLoader, RedisClusterFlag,
    RedisReplyType, ReplyRef,
};
use hiredis_vip_sys::loader::Directories;
use pretty_assertions::assert_eq;

fn stub() -> &'static HiredisVip {
    static STUB: OnceLock<HiredisVip> = OnceLock::new();
    STUB.get_or_init(|| {
        LibraryLoader::new()
            .with_strategy(Directories::new("stub", [hiredis_vip_stub::stub_dir()]))
            .load()
            .unwrap()
    })
}

#[test]
fn command_arguments_reach_the_library_in_order() {
    let mut connection = Connection::connect_with(stub(), "127.0.0.1", 6379).unwrap();
    let reply = connection
        .command(
            c"SET %b %b EX %lld %s 100%%",
            &["k\0ey".into(), "value".into(), (-42i64).into(), c"NX".into()],
        )
        .unwrap();

    assert_eq!(reply.kind(), Ok(RedisReplyType::String));
    assert_eq!(reply.kind(), reply.value().kind());
    assert_eq!(
        reply.value(),
        ReplyRef::String(&b"SET [k\0ey/4] [value/5] EX -42 NX 100%"[..])
    );
}

#[test]
fn largest_command_reaches_the_library() {
    let mut connection = Connection::connect_with(stub(), "127.0.0.1", 6379).unwrap();
    // Eight `%b` arguments take two words each.
    let args: Vec<CommandArg<'_>> = (0..8).map(|_| "ab".into()).collect();
    let reply = connection
        .command(c"%b %b %b %b %b %b %b %b", &args)
        .unwrap();

    let expected = vec!["[ab/2]"; 8].join(" ");
    assert_eq!(reply.value().as_bytes(), Some(expected.as_bytes()));
}

#[test]
fn cluster_command_arguments_reach_the_library() {
    let mut cluster = ClusterContext::connect_with(
        stub(),
        "127.0.0.1:7000",
        hiredis_vip::DEFAULT_CLUSTER_FLAGS,
    )
    .unwrap();
    let reply = cluster
        .command(c"HSET %s %b %lld", &[c"h".into(), b"f\0".into(), i64::MAX.into()])
        .unwrap();
    let expected = format!("HSET h [f\0/2] {}", i64::MAX);
    assert_eq!(reply.value(), ReplyRef::String(expected.as_bytes()));
}

#[test]
fn timeout_is_passed_as_a_timeval() {
    let mut cluster = ClusterContext::connect_with_timeout_in(
        stub(),
        "127.0.0.1:7000",
        Duration::from_millis(1500),
        hiredis_vip::DEFAULT_CLUSTER_FLAGS,
    )
    .unwrap();
    let reply = cluster.command(c"TIMEOUT", &[]).unwrap();
    assert_eq!(reply.value(), ReplyRef::Integer(1_500_000));
}

#[test]
fn flags_are_passed_as_their_native_bits() {
    let mut cluster = ClusterContext::connect_nonblocking_in(
        stub(),
        "127.0.0.1:7000",
        RedisClusterFlag::AddSlave | RedisClusterFlag::RouteUseSlots,
    )
    .unwrap();
    let reply = cluster.command(c"FLAGS", &[]).unwrap();
    assert_eq!(reply.value(), ReplyRef::Integer(0x5000));
}

#[test]
fn refused_connection_reports_the_native_error() {
    let error = Connection::connect_with(stub(), "127.0.0.1", 0).unwrap_err();
    let Error::Connect(native) = &error else {
        panic!("expected a connect error, got {error:?}");
    };
    assert_eq!(native.code, 1);
    assert_eq!(native.message, "Connection refused");
}

#[test]
fn unreachable_cluster_reports_the_native_error() {
    let error = ClusterContext::connect_with(
        stub(),
        "unreachable:7000",
        hiredis_vip::DEFAULT_CLUSTER_FLAGS,
    )
    .unwrap_err();
    assert!(
        matches!(&error, Error::Connect(native) if native.message == "no reachable node in cluster"),
        "{error:?}"
    );
}
