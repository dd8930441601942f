/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! `hiredis_vip_bencher [n] [host] [port]`: time `n` SETs and `n` GETs over
//! one connection and print the throughput.

use std::process::ExitCode;

use hiredis_vip_bencher::{DEFAULT_HOST, DEFAULT_N, DEFAULT_PORT, kops, run, try_init_tracing};
use tracing::{error, info};

fn main() -> ExitCode {
    if let Err(err) = try_init_tracing() {
        eprintln!("unable to install the tracing subscriber: {err}");
    }

    let mut args = std::env::args().skip(1);
    let n = match args.next().map(|n| n.parse::<usize>()) {
        None => DEFAULT_N,
        Some(Ok(n)) => n,
        Some(Err(err)) => {
            error!(%err, "invalid number of rounds");
            return ExitCode::FAILURE;
        }
    };
    let host = args.next().unwrap_or_else(|| DEFAULT_HOST.to_owned());
    let port = match args.next().map(|port| port.parse::<u16>()) {
        None => DEFAULT_PORT,
        Some(Ok(port)) => port,
        Some(Err(err)) => {
            error!(%err, "invalid port");
            return ExitCode::FAILURE;
        }
    };

    let result = hiredis_vip::connect(&host, port).and_then(|mut connection| {
        info!(n, %host, port, "running SET/GET rounds");
        run(&mut connection, n)
    });
    match result {
        Ok(elapsed) => {
            println!("{:.2} Kops", kops(n, elapsed));
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "benchmark failed");
            ExitCode::FAILURE
        }
    }
}
