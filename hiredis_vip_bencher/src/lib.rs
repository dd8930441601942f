/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! SET/GET throughput of a single blocking connection.

use std::{
    error::Error,
    hint::black_box,
    time::{Duration, Instant},
};

use criterion::{BenchmarkGroup, Criterion, measurement::WallTime};
use hiredis_vip::Connection;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_N: usize = 20_000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, `info` by default.
///
/// # Errors
///
/// Returns an Error if a global subscriber is already installed.
pub fn try_init_tracing() -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_thread_names(true)
        .with_env_filter(env_filter)
        .try_init()
}

/// The key and value written by the `i`-th round.
pub fn key_value(i: usize) -> (String, String) {
    let key = format!("foo{i}");
    let value = key.repeat(10);
    (key, value)
}

/// One `SET key value` followed by one `GET key`.
pub fn set_get(connection: &mut Connection, i: usize) -> hiredis_vip::Result<()> {
    let (key, value) = key_value(i);
    let key = key.as_bytes();
    black_box(connection.command(c"SET %b %b", &[key.into(), value.as_bytes().into()])?);
    black_box(connection.command(c"GET %b", &[key.into()])?);
    Ok(())
}

/// Run `n` rounds of [`set_get`] and return how long they took.
pub fn run(connection: &mut Connection, n: usize) -> hiredis_vip::Result<Duration> {
    let start = Instant::now();
    for i in 0..n {
        set_get(connection, i)?;
    }
    Ok(start.elapsed())
}

/// Thousands of commands per second: every round issues two.
pub fn kops(n: usize, elapsed: Duration) -> f64 {
    (2 * n) as f64 / 1000.0 / elapsed.as_secs_f64()
}

/// Benchmark [`set_get`] rounds against an already connected server.
pub fn set_get_group(c: &mut Criterion, connection: &mut Connection) {
    let mut group: BenchmarkGroup<'_, WallTime> = c.benchmark_group("SET+GET");
    group.measurement_time(Duration::from_secs(5));
    let mut i = 0;
    group.bench_function("hiredis_vip", |b| {
        b.iter(|| {
            if let Err(err) = set_get(connection, i) {
                tracing::warn!(%err, "SET/GET round failed");
            }
            i += 1;
        })
    });
    group.finish();
}
