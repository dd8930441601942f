/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Typed arguments for `redisCommand`-style format strings.
//!
//! hiredis builds commands from a printf-like format where `%s` consumes a
//! C string, `%b` consumes a pointer and a length, and `%%` is a literal
//! percent sign. The format is checked against the argument list before
//! anything reaches the native library, so a mismatch is an [`Err`] instead
//! of a read past the end of the variadic arguments.

use std::ffi::{CStr, c_char};

use hiredis_vip_sys::{MAX_VARARGS, VarArg};

use crate::error::FormatError;

/// A single argument of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandArg<'a> {
    /// Consumed by `%s`.
    Str(&'a CStr),
    /// Consumed by `%b`. Binary safe.
    Bytes(&'a [u8]),
    /// Consumed by `%lld`.
    Integer(i64),
}

impl CommandArg<'_> {
    const fn describe(&self) -> &'static str {
        match self {
            Self::Str(_) => "a C string",
            Self::Bytes(_) => "a byte string",
            Self::Integer(_) => "an integer",
        }
    }
}

impl<'a> From<&'a CStr> for CommandArg<'a> {
    fn from(s: &'a CStr) -> Self {
        Self::Str(s)
    }
}

impl<'a> From<&'a [u8]> for CommandArg<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for CommandArg<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Self::Bytes(bytes)
    }
}

/// Rust strings may hold NUL bytes, so they are passed as `%b`.
impl<'a> From<&'a str> for CommandArg<'a> {
    fn from(s: &'a str) -> Self {
        Self::Bytes(s.as_bytes())
    }
}

impl From<i64> for CommandArg<'_> {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

/// A conversion specifier found in a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Specifier {
    Str,
    Bytes,
    LongLong,
}

impl Specifier {
    const fn token(self) -> &'static str {
        match self {
            Self::Str => "s",
            Self::Bytes => "b",
            Self::LongLong => "lld",
        }
    }

    const fn expects(self) -> &'static str {
        match self {
            Self::Str => CommandArg::Str(c"").describe(),
            Self::Bytes => CommandArg::Bytes(&[]).describe(),
            Self::LongLong => CommandArg::Integer(0).describe(),
        }
    }

    const fn accepts(self, arg: &CommandArg<'_>) -> bool {
        matches!(
            (self, arg),
            (Self::Str, CommandArg::Str(_))
                | (Self::Bytes, CommandArg::Bytes(_))
                | (Self::LongLong, CommandArg::Integer(_))
        )
    }
}

fn specifiers(format: &CStr) -> Result<Vec<Specifier>, FormatError> {
    let bytes = format.to_bytes();
    let mut specifiers = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        let rest = &bytes[i + 1..];
        let (specifier, consumed) = match rest {
            [] => return Err(FormatError::TrailingPercent),
            [b'%', ..] => {
                i += 2;
                continue;
            }
            [b's', ..] => (Specifier::Str, 1),
            [b'b', ..] => (Specifier::Bytes, 1),
            [b'l', b'l', b'd' | b'i', ..] => (Specifier::LongLong, 3),
            _ => {
                // Report up to and including the conversion character.
                let end = rest
                    .iter()
                    .position(u8::is_ascii_alphabetic)
                    .map_or(rest.len(), |pos| pos + 1);
                return Err(FormatError::UnsupportedSpecifier {
                    specifier: String::from_utf8_lossy(&rest[..end]).into_owned(),
                    offset: i,
                });
            }
        };
        specifiers.push(specifier);
        i += 1 + consumed;
    }
    Ok(specifiers)
}

/// Check `args` against `format` and lower them to the variadic records
/// the native command functions consume.
///
/// The returned records borrow the memory of `args`: they're only valid
/// while `args` is.
pub(crate) fn to_varargs(format: &CStr, args: &[CommandArg<'_>]) -> Result<Vec<VarArg>, FormatError> {
    let specifiers = specifiers(format)?;
    if specifiers.len() != args.len() {
        return Err(FormatError::ArgumentCount {
            expected: specifiers.len(),
            found: args.len(),
        });
    }

    let mut varargs = Vec::with_capacity(args.len() * 2);
    for (index, (specifier, arg)) in specifiers.into_iter().zip(args).enumerate() {
        if !specifier.accepts(arg) {
            return Err(FormatError::ArgumentKind {
                index,
                specifier: specifier.token(),
                expected: specifier.expects(),
                found: arg.describe(),
            });
        }
        match *arg {
            CommandArg::Str(s) => varargs.push(VarArg::CStr(s.as_ptr())),
            CommandArg::Bytes(bytes) => {
                varargs.push(VarArg::CStr(bytes.as_ptr().cast::<c_char>()));
                varargs.push(VarArg::SizeT(bytes.len()));
            }
            CommandArg::Integer(n) => varargs.push(VarArg::LongLong(n)),
        }
    }

    if varargs.len() > MAX_VARARGS {
        return Err(FormatError::TooManyArguments {
            words: varargs.len(),
        });
    }
    Ok(varargs)
}
