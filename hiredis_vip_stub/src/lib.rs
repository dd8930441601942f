/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Shared objects standing in for `libhiredis_vip` in tests.
//!
//! The build script compiles `c/stub.c`, which exports every hiredis-vip
//! entry point with the native struct layouts. Its command functions read
//! their arguments with `va_arg` and reply with a string describing them:
//! `%s` as the string, `%b` as `[<bytes>/<len>]`, `%lld` as the integer and
//! `%%` as `%`. Cluster contexts answer `TIMEOUT` (in microseconds) and
//! `FLAGS` with their connect arguments.
//!
//! Addresses containing `unreachable`, and port 0, fail to connect.
//!
//! Only built on unix targets.

use std::path::Path;

/// The directory holding the stub `libhiredis_vip`.
pub fn stub_dir() -> &'static Path {
    Path::new(env!("HIREDIS_VIP_STUB_DIR"))
}

/// The directory holding a `libhiredis_vip` that loads fine but exports
/// none of the hiredis-vip symbols.
pub fn no_symbols_dir() -> &'static Path {
    Path::new(env!("HIREDIS_VIP_NO_SYMBOLS_DIR"))
}
