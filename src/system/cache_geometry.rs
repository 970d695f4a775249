//! # Cache Geometry
//!
//! Sizes of the L1 data, L2 and L3 caches and the cache line, detected once
//! per process.
//!
//! Sources are consulted in order and each field is resolved independently:
//!
//! 1. CPUID deterministic cache parameters (x86_64)
//! 2. AMD extended leaves `0x8000_0005`/`0x8000_0006` (x86_64)
//! 3. `/sys/devices/system/cpu/cpu0/cache` (Linux)
//! 4. Built-in defaults: 32 KiB, 256 KiB, 8 MiB, 64-byte lines
//!
//! Detection never fails. A field no source could report falls back to its
//! default and every reported value is positive.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{FastMemError, Result};

/// Default L1 data cache size (32 KiB)
pub const DEFAULT_L1_CACHE_SIZE: usize = 32 * 1024;
/// Default L2 cache size (256 KiB)
pub const DEFAULT_L2_CACHE_SIZE: usize = 256 * 1024;
/// Default L3 cache size (8 MiB)
pub const DEFAULT_L3_CACHE_SIZE: usize = 8 * 1024 * 1024;
/// Default cache line size (64 bytes)
pub const DEFAULT_CACHE_LINE_SIZE: usize = 64;

#[cfg_attr(not(all(target_os = "linux", not(miri))), allow(dead_code))]
const SYSFS_CACHE_DIR: &str = "/sys/devices/system/cpu/cpu0/cache";

/// Cache sizes in bytes. All fields are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheGeometry {
    /// L1 data cache size
    pub l1_size: usize,
    /// L2 cache size
    pub l2_size: usize,
    /// Last-level (L3) cache size
    pub l3_size: usize,
    /// Cache line size
    pub cache_line_size: usize,
}

impl CacheGeometry {
    /// Geometry used when nothing can be detected
    pub const DEFAULT: CacheGeometry = CacheGeometry {
        l1_size: DEFAULT_L1_CACHE_SIZE,
        l2_size: DEFAULT_L2_CACHE_SIZE,
        l3_size: DEFAULT_L3_CACHE_SIZE,
        cache_line_size: DEFAULT_CACHE_LINE_SIZE,
    };

    /// Run detection without caching the result
    pub fn detect() -> Self {
        detect_uncached()
    }

    /// Check that every field is positive
    pub fn is_valid(&self) -> bool {
        self.l1_size > 0 && self.l2_size > 0 && self.l3_size > 0 && self.cache_line_size > 0
    }
}

impl Default for CacheGeometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Geometry assembled from one or more sources, fields still unresolved are `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PartialGeometry {
    pub l1_size: Option<usize>,
    pub l2_size: Option<usize>,
    pub l3_size: Option<usize>,
    pub cache_line_size: Option<usize>,
}

impl PartialGeometry {
    fn set(slot: &mut Option<usize>, value: usize) {
        if slot.is_none() && value > 0 {
            *slot = Some(value);
        }
    }

    pub fn set_l1(&mut self, bytes: usize) {
        Self::set(&mut self.l1_size, bytes);
    }

    pub fn set_l2(&mut self, bytes: usize) {
        Self::set(&mut self.l2_size, bytes);
    }

    pub fn set_l3(&mut self, bytes: usize) {
        Self::set(&mut self.l3_size, bytes);
    }

    pub fn set_line(&mut self, bytes: usize) {
        Self::set(&mut self.cache_line_size, bytes);
    }

    /// Fill fields that are still unresolved from a lower-priority source
    pub fn merge(&mut self, other: PartialGeometry) {
        if let Some(v) = other.l1_size {
            self.set_l1(v);
        }
        if let Some(v) = other.l2_size {
            self.set_l2(v);
        }
        if let Some(v) = other.l3_size {
            self.set_l3(v);
        }
        if let Some(v) = other.cache_line_size {
            self.set_line(v);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.l1_size.is_some()
            && self.l2_size.is_some()
            && self.l3_size.is_some()
            && self.cache_line_size.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == PartialGeometry::default()
    }

    /// Substitute defaults for anything unresolved
    pub fn resolve(self) -> CacheGeometry {
        CacheGeometry {
            l1_size: self.l1_size.unwrap_or(DEFAULT_L1_CACHE_SIZE),
            l2_size: self.l2_size.unwrap_or(DEFAULT_L2_CACHE_SIZE),
            l3_size: self.l3_size.unwrap_or(DEFAULT_L3_CACHE_SIZE),
            cache_line_size: self.cache_line_size.unwrap_or(DEFAULT_CACHE_LINE_SIZE),
        }
    }
}

fn detect_uncached() -> CacheGeometry {
    #[allow(unused_mut)]
    let mut partial = PartialGeometry::default();

    #[cfg(all(target_arch = "x86_64", not(miri)))]
    {
        let cpuid = raw_cpuid::CpuId::new();
        partial.merge(cpuid_cache_parameters(&cpuid));
        if !partial.is_complete() {
            partial.merge(cpuid_amd_legacy(&cpuid));
        }
    }

    #[cfg(all(target_os = "linux", not(miri)))]
    if !partial.is_complete() {
        partial.merge(read_sysfs_cache(Path::new(SYSFS_CACHE_DIR)));
    }

    if partial.is_empty() {
        log::warn!("cache geometry could not be detected, using defaults");
    } else if !partial.is_complete() {
        log::warn!("cache geometry partially detected ({:?}), filling gaps with defaults", partial);
    }

    let geometry = partial.resolve();
    log::debug!(
        "cache geometry: L1d {} bytes, L2 {} bytes, L3 {} bytes, line {} bytes",
        geometry.l1_size,
        geometry.l2_size,
        geometry.l3_size,
        geometry.cache_line_size
    );
    geometry
}

#[cfg(all(target_arch = "x86_64", not(miri)))]
fn cpuid_cache_parameters<R: raw_cpuid::CpuIdReader>(cpuid: &raw_cpuid::CpuId<R>) -> PartialGeometry {
    use raw_cpuid::CacheType;

    let mut partial = PartialGeometry::default();
    let Some(caches) = cpuid.get_cache_parameters() else {
        return partial;
    };

    for cache in caches {
        let size = cache.associativity()
            * cache.physical_line_partitions()
            * cache.coherency_line_size()
            * cache.sets();
        match (cache.level(), cache.cache_type()) {
            (1, CacheType::Data | CacheType::Unified) => {
                partial.set_l1(size);
                partial.set_line(cache.coherency_line_size());
            }
            (2, CacheType::Data | CacheType::Unified) => partial.set_l2(size),
            (3, CacheType::Data | CacheType::Unified) => partial.set_l3(size),
            _ => {}
        }
    }
    partial
}

#[cfg(all(target_arch = "x86_64", not(miri)))]
fn cpuid_amd_legacy<R: raw_cpuid::CpuIdReader>(cpuid: &raw_cpuid::CpuId<R>) -> PartialGeometry {
    let mut partial = PartialGeometry::default();

    if let Some(l1) = cpuid.get_l1_cache_and_tlb_info() {
        partial.set_l1(usize::from(l1.dcache_size()) * 1024);
        partial.set_line(usize::from(l1.dcache_line_size()));
    }
    if let Some(l2l3) = cpuid.get_l2_l3_cache_and_tlb_info() {
        partial.set_l2(usize::from(l2l3.l2cache_size()) * 1024);
        partial.set_line(usize::from(l2l3.l2cache_line_size()));
        // reported in 512 KiB units
        partial.set_l3(usize::from(l2l3.l3cache_size()) * 512 * 1024);
    }
    partial
}

/// Read `index*/{level,type,size,coherency_line_size}` entries under `dir`
#[cfg_attr(not(all(target_os = "linux", not(miri))), allow(dead_code))]
pub(crate) fn read_sysfs_cache(dir: &Path) -> PartialGeometry {
    let mut partial = PartialGeometry::default();

    for index in 0.. {
        let entry = dir.join(format!("index{}", index));
        if !entry.is_dir() {
            break;
        }

        let read = |name: &str| fs::read_to_string(entry.join(name)).ok();
        let Some(level) = read("level").and_then(|s| s.trim().parse::<u32>().ok()) else {
            continue;
        };
        let kind = read("type").unwrap_or_default();
        let kind = kind.trim();
        if kind == "Instruction" {
            continue;
        }
        let size = read("size").and_then(|s| parse_size(&s).ok()).unwrap_or(0);

        match level {
            1 => {
                partial.set_l1(size);
                if let Some(line) =
                    read("coherency_line_size").and_then(|s| s.trim().parse::<usize>().ok())
                {
                    partial.set_line(line);
                }
            }
            2 => partial.set_l2(size),
            3 => partial.set_l3(size),
            _ => {}
        }
    }
    partial
}

/// Parse a byte size such as `32K`, `8M`, `1G`, `48KB` or `4096`
pub fn parse_size(text: &str) -> Result<usize> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FastMemError::invalid_data("Empty size string"));
    }

    let upper = text.to_ascii_uppercase();
    let trimmed = upper.strip_suffix('B').unwrap_or(&upper);
    let (number_part, unit) = if let Some(n) = trimmed.strip_suffix('K') {
        (n, 1024)
    } else if let Some(n) = trimmed.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = trimmed.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else {
        (trimmed, 1)
    };

    let number: usize = number_part
        .trim()
        .parse()
        .map_err(|_| FastMemError::invalid_data(format!("Invalid size number: {}", text)))?;

    number
        .checked_mul(unit)
        .ok_or_else(|| FastMemError::invalid_data(format!("Size overflows usize: {}", text)))
}

static CACHE_GEOMETRY: OnceLock<CacheGeometry> = OnceLock::new();

/// Get the process-wide cache geometry (detected once on first call)
pub fn get_cache_geometry() -> CacheGeometry {
    *CACHE_GEOMETRY.get_or_init(detect_uncached)
}
