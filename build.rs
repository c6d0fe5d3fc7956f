// build.rs

use std::env;

/// Fallback used when `BITCODE_FILE` is not set at build time.
const DEFAULT_MODULE: &str = "module.bc";

fn main() {
    println!("cargo:rerun-if-env-changed=BITCODE_FILE");

    // The input module path is a build-time setting; the CLI can still override it.
    let module = env::var("BITCODE_FILE").unwrap_or_else(|_| DEFAULT_MODULE.to_string());
    println!("cargo:rustc-env=JITPROBE_DEFAULT_MODULE={}", module);
}
