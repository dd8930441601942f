/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Error types surfaced by the owning handles.

use std::{
    ffi::{NulError, c_char, c_int},
    sync::Arc,
};

use hiredis_vip_sys::{ERRSTR_LEN, LoadError, MAX_VARARGS, RedisOkType, UnknownTag};

/// A specialized Result type for hiredis-vip operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong when talking to hiredis-vip.
///
/// Replies of kind [`Error`](crate::ReplyRef::Error) are *not* turned into
/// an [`Error`]: they're successful calls carrying a server-side error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The native library couldn't be located or opened. Fatal.
    #[error(transparent)]
    Load(#[from] Arc<LoadError>),
    /// A connect call returned NULL, i.e. the context couldn't be allocated.
    #[error("hiredis-vip couldn't allocate a context")]
    NullContext,
    /// A connect call returned a context in an error state.
    #[error("connection failed: {0}")]
    Connect(#[source] NativeError),
    /// A command returned NULL. The context usually has to be reconnected.
    #[error("command returned no reply: {0}")]
    NullReply(#[source] NativeError),
    /// A status-returning call (reconnect, keep-alive) reported a failure.
    #[error(transparent)]
    Native(#[from] NativeError),
    /// A status code outside the native `REDIS_OK`/`REDIS_ERR_*` range.
    #[error("unknown status code: {0}")]
    UnknownStatus(#[from] UnknownTag),
    /// The command arguments don't match the format string.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// A host or address list contains an interior NUL byte.
    #[error(transparent)]
    InvalidString(#[from] NulError),
}

/// The `err` code and `errstr` message of a native context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct NativeError {
    pub code: c_int,
    pub message: String,
}

impl NativeError {
    /// Read a context's error fields. `None` when `err` is zero.
    pub(crate) fn from_context(err: c_int, errstr: &[c_char; ERRSTR_LEN]) -> Option<Self> {
        if err == 0 {
            return None;
        }
        let message: Vec<u8> = errstr
            .iter()
            .map(|&c| c as u8)
            .take_while(|&b| b != 0)
            .collect();
        Some(Self {
            code: err,
            message: String::from_utf8_lossy(&message).into_owned(),
        })
    }

    /// A failure the native library didn't describe any further.
    pub(crate) fn undescribed(status: RedisOkType) -> Self {
        Self {
            code: status as c_int,
            message: String::new(),
        }
    }

    /// The code as one of the known native statuses.
    pub fn status(&self) -> Option<RedisOkType> {
        RedisOkType::try_from(self.code).ok()
    }
}

/// Turn a `REDIS_OK`/`REDIS_ERR` return value into a [`Result`], taking the
/// details from the context's error fields when the call failed.
pub(crate) fn check_status(status: c_int, context_error: Option<NativeError>) -> Result<()> {
    match RedisOkType::try_from(status)? {
        RedisOkType::Ok => Ok(()),
        status => Err(context_error
            .unwrap_or_else(|| NativeError::undescribed(status))
            .into()),
    }
}

/// Mismatches between a command's format string and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unsupported conversion `%{specifier}` at byte {offset}; use %s, %b or %lld")]
    UnsupportedSpecifier { specifier: String, offset: usize },
    #[error("the format string ends with a lone `%`")]
    TrailingPercent,
    #[error("the format string consumes {expected} arguments but {found} were given")]
    ArgumentCount { expected: usize, found: usize },
    #[error("argument {index} is {found} but `%{specifier}` expects {expected}")]
    ArgumentKind {
        index: usize,
        specifier: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("the arguments need {words} variadic words, more than the supported {}", MAX_VARARGS)]
    TooManyArguments { words: usize },
}
