/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::{
    env,
    path::{Path, PathBuf},
};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap();

    let stub_dir = out_dir.join("stub");
    let no_symbols_dir = out_dir.join("no_symbols");

    // The loader tests only run on unix targets.
    if env::var_os("CARGO_CFG_UNIX").is_some() {
        let file_name = match target_os.as_str() {
            "macos" | "ios" => "libhiredis_vip.dylib",
            _ => "libhiredis_vip.so",
        };
        let shared_flag = if target_os == "macos" {
            "-dynamiclib"
        } else {
            "-shared"
        };
        build_shared_library(
            &manifest_dir.join("c").join("stub.c"),
            &stub_dir.join(file_name),
            shared_flag,
        );
        build_shared_library(
            &manifest_dir.join("c").join("no_symbols.c"),
            &no_symbols_dir.join(file_name),
            shared_flag,
        );
    }

    println!("cargo:rustc-env=HIREDIS_VIP_STUB_DIR={}", stub_dir.display());
    println!(
        "cargo:rustc-env=HIREDIS_VIP_NO_SYMBOLS_DIR={}",
        no_symbols_dir.display()
    );
    println!(
        "cargo:rerun-if-changed={}",
        manifest_dir.join("c").display()
    );
}

/// `cc` only produces static archives, so the compiler it configures for
/// the target is invoked directly to link a shared object.
fn build_shared_library(source: &Path, output: &Path, shared_flag: &str) {
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();
    let compiler = cc::Build::new().pic(true).get_compiler();
    let status = compiler
        .to_command()
        .arg(shared_flag)
        .arg("-o")
        .arg(output)
        .arg(source)
        .status()
        .expect("Unable to run the C compiler");
    assert!(
        status.success(),
        "Couldn't build {} from {}",
        output.display(),
        source.display()
    );
}
