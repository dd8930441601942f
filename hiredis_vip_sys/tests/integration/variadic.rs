/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::{
    ffi::{CStr, CString, c_char},
    ptr, slice,
};

use hiredis_vip_sys::{MAX_VARARGS, RedisReplyType, VarArg};
use pretty_assertions::assert_eq;

use crate::stub;

fn bytes(data: &[u8]) -> [VarArg; 2] {
    [VarArg::CStr(data.as_ptr().cast::<c_char>()), VarArg::SizeT(data.len())]
}

/// Run `format` on a fresh standalone context and return the string the
/// stub built from the arguments it received.
fn echo(format: &CStr, args: &[VarArg]) -> Vec<u8> {
    let api = stub();
    // Safety: the stub implements the native entry points, `format`
    // consumes exactly `args`, whose pointers outlive the call, and every
    // allocation is released once.
    unsafe {
        let c = (api.bindings().redis_connect)(c"127.0.0.1".as_ptr(), 6379);
        let reply = api.redis_command(c, format.as_ptr(), args);
        assert!(!reply.is_null(), "{format:?} returned no reply");
        assert_eq!((*reply).type_, RedisReplyType::String as i32);
        let echoed =
            slice::from_raw_parts((*reply).str_.cast::<u8>(), (*reply).len as usize).to_vec();
        (api.bindings().free_reply_object)(reply.cast());
        (api.bindings().redis_free)(c);
        echoed
    }
}

#[test]
fn no_arguments() {
    assert_eq!(echo(c"PING", &[]), b"PING");
}

#[test]
fn byte_strings_pass_a_pointer_then_a_length() {
    let key = b"k\0ey";
    assert_eq!(echo(c"GET %b", &bytes(key)), b"GET [k\0ey/4]");
}

#[test]
fn strings_integers_and_literal_percent() {
    let value = b"value";
    let mut args = bytes(value).to_vec();
    args.push(VarArg::LongLong(-42));
    args.push(VarArg::CStr(c"NX".as_ptr()));
    assert_eq!(
        echo(c"SET k %b EX %lld %s 100%%", &args),
        b"SET k [value/5] EX -42 NX 100%"
    );
}

#[test]
fn long_long_keeps_its_full_width() {
    assert_eq!(
        echo(c"%lld %lli", &[VarArg::LongLong(i64::MIN), VarArg::LongLong(i64::MAX)]),
        format!("{} {}", i64::MIN, i64::MAX).into_bytes()
    );
}

#[test]
fn every_arity_reaches_the_callee() {
    for arity in 0..=MAX_VARARGS {
        let args: Vec<VarArg> = (0..arity as i64).map(VarArg::LongLong).collect();
        let format = CString::new(vec!["%lld"; arity].join(",")).unwrap();
        let expected = (0..arity)
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");
        assert_eq!(echo(&format, &args), expected.into_bytes(), "arity {arity}");
    }
}

#[test]
#[should_panic(expected = "exceed the limit")]
fn more_words_than_supported_panic_before_the_call() {
    let args = vec![VarArg::LongLong(0); MAX_VARARGS + 1];
    // Safety: the arity check panics before anything is dereferenced.
    unsafe {
        stub().redis_command(ptr::null_mut(), c"".as_ptr(), &args);
    }
}

#[test]
fn cluster_command_forwards_the_same_words() {
    let api = stub();
    let key = b"slot\0key";
    // Safety: as in `echo`, on a cluster context.
    unsafe {
        let cc = (api.bindings().redis_cluster_connect)(c"127.0.0.1:7000".as_ptr(), 0);
        let reply = api.redis_cluster_command(cc, c"GET %b".as_ptr(), &bytes(key));
        assert!(!reply.is_null());
        let echoed = slice::from_raw_parts((*reply).str_.cast::<u8>(), (*reply).len as usize);
        assert_eq!(echoed, b"GET [slot\0key/8]");
        (api.bindings().free_reply_object)(reply.cast());
        (api.bindings().redis_cluster_free)(cc);
    }
}
