//! # Fastmem: Cache-Aware Bulk Memory Copy
//!
//! A drop-in non-overlapping byte copy that picks its strategy from the host
//! CPU, detected once per process.
//!
//! ## Key Features
//!
//! - **Runtime Dispatch**: AVX-512 and AVX2 streaming kernels selected from runtime CPU detection
//! - **Cache Awareness**: transfers that fit in the last-level cache use a plain cache-filling copy
//! - **Non-temporal Streaming**: larger transfers bypass the cache with streaming stores and NTA prefetch
//! - **Explicit Strategies**: force any kernel for testing and benchmarking
//! - **Introspection**: capability set, cache geometry and CPU identification
//!
//! ## Quick Start
//!
//! ```rust
//! use fastmem::{copy_slice, copy_slice_with, query_cache_geometry, Strategy};
//!
//! let src = vec![42u8; 4096];
//! let mut dst = vec![0u8; 4096];
//!
//! // Strategy chosen by size and host capabilities
//! copy_slice(&mut dst, &src).unwrap();
//! assert_eq!(dst, src);
//!
//! // Force the 32-byte streaming kernel (portable if the host lacks it)
//! copy_slice_with(&mut dst, &src, Strategy::NarrowVector).unwrap();
//!
//! let geometry = query_cache_geometry();
//! println!("streaming above {} bytes", geometry.l3_size);
//! ```
//!
//! ## Raw Pointers
//!
//! [`copy`] has the contract of `memcpy`: both regions valid for `len` bytes
//! and non-overlapping. It returns `dst` and never fails.

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod copy;
pub mod error;
pub mod memory;
pub mod simd;
pub mod system;

// Re-export core types
pub use config::{Config, CopyConfig, StreamingThreshold};
pub use copy::{
    copy, copy_auto, copy_narrow, copy_portable, copy_slice, copy_slice_with, copy_widest, copy_with,
    get_copy_function, query_cache_geometry, query_capabilities, CopyFn,
};
pub use error::{FastMemError, Result};
pub use simd::{best_kernel, CopyKernel, Dispatcher, Strategy};
pub use system::{cpu_info, CacheGeometry, CapabilitySet, CpuInfo, VectorExtension};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if the process-wide dispatcher selected a vector kernel
pub fn has_simd_support() -> bool {
    best_kernel() != CopyKernel::Portable
}

/// Run detection and kernel selection now instead of on the first copy
pub fn init() {
    log::debug!("Initializing fastmem v{}", VERSION);
    let _ = Dispatcher::global();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_functionality() {
        init();
        assert!(!VERSION.is_empty());
        assert!(best_kernel().is_available(query_capabilities()));
    }

    #[test]
    fn test_version_info() {
        assert!(VERSION.contains('.'));
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2);
    }

    #[test]
    fn test_simd_support_matches_kernel() {
        assert_eq!(has_simd_support(), Dispatcher::global().active_kernel() != CopyKernel::Portable);
    }
}
