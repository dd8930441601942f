/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use hiredis_vip::{Connection, Error, FormatError, RedisOkType, ReplyRef};
use hiredis_vip_mock::{
    CONNECTION_REFUSED, MockReply, NO_QUEUED_REPLY, push_null_reply, push_reply, stats,
};
use pretty_assertions::assert_eq;

use crate::{assert_all_released, init};

#[test]
fn connect_and_drop_frees_once() {
    let api = init();
    let connection = Connection::connect_with(api, "127.0.0.1", 6379).unwrap();
    assert!(connection.error().is_none());
    assert_eq!(stats().live_contexts, 1);

    drop(connection);
    let stats = stats();
    assert_eq!(stats.connects, 1);
    assert_eq!(stats.contexts_freed, 1);
    assert_all_released(&stats);
}

#[test]
fn failed_connect_is_freed_and_reported() {
    let api = init();
    let err = Connection::connect_with(api, "unreachable.invalid", 6379).unwrap_err();
    let Error::Connect(native) = err else {
        panic!("expected a connect error, got {err:?}");
    };
    assert_eq!(native.status(), Some(RedisOkType::ErrIo));
    assert_eq!(native.message, CONNECTION_REFUSED);

    let stats = stats();
    assert_eq!(stats.contexts_freed, 1);
    assert_all_released(&stats);
}

#[test]
fn host_with_nul_is_rejected_before_connecting() {
    let api = init();
    let err = Connection::connect_with(api, "127.0.0.1\0", 6379).unwrap_err();
    assert!(matches!(err, Error::InvalidString(_)), "{err:?}");
    assert_eq!(stats().connects, 0);
}

#[test]
fn set_then_get() {
    let api = init();
    let mut connection = Connection::connect_with(api, "127.0.0.1", 6379).unwrap();

    push_reply(MockReply::status("OK"));
    let reply = connection
        .command(c"SET %b %b", &["foo".into(), "bar".into()])
        .unwrap();
    assert_eq!(reply.value(), ReplyRef::Status(b"OK"));
    drop(reply);

    push_reply(MockReply::string("bar"));
    let reply = connection.command(c"GET %b", &["foo".into()]).unwrap();
    assert_eq!(reply.value().as_bytes(), Some(&b"bar"[..]));
    drop(reply);
    drop(connection);

    let stats = stats();
    assert_eq!(stats.commands, vec!["SET %b %b", "GET %b"]);
    assert_eq!(stats.replies_freed, 2);
    assert_all_released(&stats);
}

#[test]
fn error_replies_are_not_errors() {
    let api = init();
    let mut connection = Connection::connect_with(api, "127.0.0.1", 6379).unwrap();

    push_reply(MockReply::error("ERR unknown command 'NOPE'"));
    let reply = connection.command(c"NOPE", &[]).unwrap();
    assert_eq!(
        reply.value(),
        ReplyRef::Error(b"ERR unknown command 'NOPE'")
    );
}

#[test]
fn null_reply_carries_the_context_error() {
    let api = init();
    let mut connection = Connection::connect_with(api, "127.0.0.1", 6379).unwrap();

    push_null_reply();
    let err = connection.command(c"PING", &[]).unwrap_err();
    let Error::NullReply(native) = err else {
        panic!("expected a null reply error, got {err:?}");
    };
    assert_eq!(native.status(), Some(RedisOkType::ErrEof));
    assert_eq!(native.message, NO_QUEUED_REPLY);
    assert_eq!(connection.error(), Some(native));
}

#[test]
fn format_mismatch_never_reaches_the_library() {
    let api = init();
    let mut connection = Connection::connect_with(api, "127.0.0.1", 6379).unwrap();

    let err = connection.command(c"GET %b", &[]).unwrap_err();
    assert!(
        matches!(
            err,
            Error::Format(FormatError::ArgumentCount {
                expected: 1,
                found: 0
            })
        ),
        "{err:?}"
    );
    assert!(stats().commands.is_empty());
}

#[test]
fn reconnect_clears_the_error() {
    let api = init();
    let mut connection = Connection::connect_with(api, "127.0.0.1", 6379).unwrap();

    push_null_reply();
    assert!(connection.command(c"PING", &[]).is_err());
    assert!(connection.error().is_some());

    connection.reconnect().unwrap();
    assert!(connection.error().is_none());
    assert_eq!(stats().reconnects, 1);
}

#[test]
fn enable_keepalive() {
    let api = init();
    let mut connection = Connection::connect_with(api, "127.0.0.1", 6379).unwrap();
    connection.enable_keepalive().unwrap();
    assert_eq!(stats().keep_alives, 1);
}

#[test]
fn early_return_still_frees() {
    fn incr_twice(api: &'static hiredis_vip::HiredisVip) -> hiredis_vip::Result<i64> {
        let mut connection = Connection::connect_with(api, "127.0.0.1", 6379)?;
        let reply = connection.command(c"INCR %b", &["counter".into()])?;
        // The second command fails: both the reply and the connection are
        // dropped on the way out.
        connection.command(c"INCR %b", &["counter".into()])?;
        Ok(reply.value().as_integer().unwrap_or_default())
    }

    let api = init();
    push_reply(MockReply::Integer(1));
    push_null_reply();
    assert!(matches!(incr_twice(api), Err(Error::NullReply(_))));

    let stats = stats();
    assert_eq!(stats.contexts_freed, 1);
    assert_eq!(stats.replies_freed, 1);
    assert_all_released(&stats);
}

#[test]
fn into_raw_hands_over_ownership() {
    let api = init();
    let connection = Connection::connect_with(api, "127.0.0.1", 6379).unwrap();
    let raw = connection.into_raw();
    assert_eq!(stats().live_contexts, 1);

    // Safety: `raw` came from `into_raw` and is freed exactly once.
    unsafe { (api.bindings().redis_free)(raw) };
    assert_all_released(&stats());
}
