/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use hiredis_vip_sys::{
    LibraryLoader, LoadError,
    loader::{Directories, LoadFailure, library_file_name},
};
use pretty_assertions::assert_eq;

use crate::stub;

#[test]
fn loads_the_only_directory_holding_the_library() {
    let empty = tempfile::tempdir().unwrap();
    let api = LibraryLoader::new()
        .with_strategy(Directories::new(
            "test",
            [empty.path(), hiredis_vip_stub::stub_dir()],
        ))
        .load()
        .unwrap();

    assert_eq!(
        api.path(),
        Some(hiredis_vip_stub::stub_dir().join(library_file_name()).as_path())
    );
    assert!(api.bindings().redis_reply_element.is_some());
}

#[test]
fn library_without_the_entry_points_is_unloadable() {
    let error = LibraryLoader::new()
        .with_strategy(Directories::new(
            "test",
            [hiredis_vip_stub::no_symbols_dir()],
        ))
        .load()
        .unwrap_err();

    let LoadError::Unloadable { attempts, .. } = &error else {
        panic!("expected Unloadable, got {error:?}");
    };
    assert_eq!(attempts.len(), 1);
    assert_eq!(
        attempts[0].path,
        hiredis_vip_stub::no_symbols_dir().join(library_file_name())
    );
    let LoadFailure::MissingSymbol(missing) = &attempts[0].cause else {
        panic!("expected a missing symbol, got {:?}", attempts[0].cause);
    };
    assert_eq!(missing.symbol, "freeReplyObject");
    assert!(error.to_string().contains("freeReplyObject"), "{error}");
}

#[test]
fn first_usable_candidate_wins_over_a_broken_one() {
    let api = LibraryLoader::new()
        .with_strategy(Directories::new(
            "test",
            [
                hiredis_vip_stub::no_symbols_dir(),
                hiredis_vip_stub::stub_dir(),
            ],
        ))
        .load()
        .unwrap();
    assert_eq!(
        api.path(),
        Some(hiredis_vip_stub::stub_dir().join(library_file_name()).as_path())
    );
}

#[test]
fn stub_connects_through_the_resolved_table() {
    let api = stub();
    // Safety: the stub exports `redisConnect`/`redisFree` with the native
    // signatures, and the context is freed exactly once.
    unsafe {
        let c = (api.bindings().redis_connect)(c"127.0.0.1".as_ptr(), 6379);
        assert!(!c.is_null());
        assert_eq!((*c).err, 0);
        (api.bindings().redis_free)(c);
    }
}
