//! Build script for kernel availability
//!
//! Turns the target architecture and the `simd` / `avx512` Cargo features into
//! the cfgs that decide which streaming kernels are compiled:
//!
//! - `fastmem_avx2_kernel`: 32-byte kernel, x86_64 with feature `simd`
//! - `fastmem_avx512_kernel`: 64-byte kernel, x86_64 with feature `avx512`
//!
//! Whether the host running the binary can execute a compiled kernel is decided
//! at runtime, not here.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-check-cfg=cfg(fastmem_avx2_kernel)");
    println!("cargo:rustc-check-cfg=cfg(fastmem_avx512_kernel)");

    configure_kernels();
}

/// Cargo features are visible to build scripts as env vars, not cfgs
fn feature_enabled(name: &str) -> bool {
    env::var_os(format!("CARGO_FEATURE_{}", name.to_uppercase())).is_some()
}

fn configure_kernels() {
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let x86_64 = target_arch == "x86_64";

    let avx2 = x86_64 && feature_enabled("simd");
    let avx512 = x86_64 && feature_enabled("avx512");

    if avx2 {
        println!("cargo:rustc-cfg=fastmem_avx2_kernel");
    }
    if avx512 {
        println!("cargo:rustc-cfg=fastmem_avx512_kernel");
    }

    if !avx2 && !avx512 {
        if x86_64 {
            println!("cargo:warning=fastmem: vector kernels disabled, enable the `simd` feature for streaming copies");
        } else {
            println!(
                "cargo:warning=fastmem: no streaming kernels for target architecture {}, using the portable copy",
                target_arch
            );
        }
    }
}
