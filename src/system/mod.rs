//! # System Introspection
//!
//! Host facts the copy dispatcher depends on:
//!
//! - **CPU Feature Detection**: which vector extensions are usable at runtime
//! - **Cache Geometry**: L1/L2/L3 and cache line sizes
//! - **CPU Identification**: vendor and brand strings for diagnostics
//!
//! Everything here is detected once per process and cached.

pub mod cache_geometry;
pub mod cpu_features;

pub use cache_geometry::{get_cache_geometry, parse_size, CacheGeometry};
pub use cpu_features::{cpu_info, get_capabilities, supports, CapabilitySet, CpuInfo, VectorExtension};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        let _caps = get_capabilities();
        let geometry = get_cache_geometry();
        assert!(geometry.is_valid());
        assert_eq!(cpu_info().geometry, geometry);
    }
}
