//! # CPU Feature Detection
//!
//! Runtime detection of the vector extensions the copy kernels are built on,
//! plus CPU identification strings for diagnostics.
//!
//! Detection runs once per process. The result is an immutable
//! [`CapabilitySet`] snapshot shared by every caller.
//!
//! A binary compiled with `-C target-feature=+avx2` still runs on whatever
//! host it is deployed to, so the compile-time view ([`CapabilitySet::compile_time`])
//! is only ever used to warn about a mismatch. The runtime check is the
//! source of truth.

use std::fmt;
use std::sync::OnceLock;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::cache_geometry::{get_cache_geometry, CacheGeometry};

/// Vector instruction-set extensions relevant to bulk copying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorExtension {
    /// 128-bit SSE2 (baseline on x86_64)
    Sse2,
    /// 256-bit AVX (float only)
    Avx,
    /// 256-bit AVX2 integer operations
    Avx2,
    /// 512-bit AVX-512 Foundation
    Avx512F,
    /// AVX-512 byte/word instructions
    Avx512Bw,
    /// AVX-512 vector length extensions
    Avx512Vl,
}

impl VectorExtension {
    /// Every extension, narrowest first
    pub const ALL: [VectorExtension; 6] = [
        VectorExtension::Sse2,
        VectorExtension::Avx,
        VectorExtension::Avx2,
        VectorExtension::Avx512F,
        VectorExtension::Avx512Bw,
        VectorExtension::Avx512Vl,
    ];

    /// Feature name as used by `is_x86_feature_detected!` and `target_feature`
    pub fn name(self) -> &'static str {
        match self {
            VectorExtension::Sse2 => "sse2",
            VectorExtension::Avx => "avx",
            VectorExtension::Avx2 => "avx2",
            VectorExtension::Avx512F => "avx512f",
            VectorExtension::Avx512Bw => "avx512bw",
            VectorExtension::Avx512Vl => "avx512vl",
        }
    }

    /// Register width in bytes
    pub fn register_width(self) -> usize {
        match self {
            VectorExtension::Sse2 => 16,
            VectorExtension::Avx | VectorExtension::Avx2 => 32,
            VectorExtension::Avx512F | VectorExtension::Avx512Bw | VectorExtension::Avx512Vl => 64,
        }
    }

    fn flag(self) -> CapabilitySet {
        match self {
            VectorExtension::Sse2 => CapabilitySet::SSE2,
            VectorExtension::Avx => CapabilitySet::AVX,
            VectorExtension::Avx2 => CapabilitySet::AVX2,
            VectorExtension::Avx512F => CapabilitySet::AVX512F,
            VectorExtension::Avx512Bw => CapabilitySet::AVX512BW,
            VectorExtension::Avx512Vl => CapabilitySet::AVX512VL,
        }
    }
}

impl fmt::Display for VectorExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of vector extensions usable on this host.
    ///
    /// Computed once, immutable afterwards.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CapabilitySet: u32 {
        /// SSE2
        const SSE2 = 1 << 0;
        /// AVX
        const AVX = 1 << 1;
        /// AVX2
        const AVX2 = 1 << 2;
        /// AVX-512F
        const AVX512F = 1 << 3;
        /// AVX-512BW
        const AVX512BW = 1 << 4;
        /// AVX-512VL
        const AVX512VL = 1 << 5;
    }
}

impl CapabilitySet {
    /// Check if a specific extension is available
    #[inline]
    pub fn supports(&self, extension: VectorExtension) -> bool {
        self.contains(extension.flag())
    }

    /// Iterate the supported extensions, narrowest first
    pub fn extensions(&self) -> impl Iterator<Item = VectorExtension> {
        let set = *self;
        VectorExtension::ALL.into_iter().filter(move |ext| set.supports(*ext))
    }

    /// Widest supported register in bytes, 0 when no vector extension is usable
    pub fn max_vector_width(&self) -> usize {
        self.extensions().map(VectorExtension::register_width).max().unwrap_or(0)
    }

    /// Detect capabilities without caching
    pub fn detect() -> Self {
        detect_runtime()
    }

    /// Extensions the compiler was told to assume via `target_feature`
    pub fn compile_time() -> Self {
        let mut set = CapabilitySet::empty();
        set.set(CapabilitySet::SSE2, cfg!(target_feature = "sse2"));
        set.set(CapabilitySet::AVX, cfg!(target_feature = "avx"));
        set.set(CapabilitySet::AVX2, cfg!(target_feature = "avx2"));
        set.set(CapabilitySet::AVX512F, cfg!(target_feature = "avx512f"));
        set.set(CapabilitySet::AVX512BW, cfg!(target_feature = "avx512bw"));
        set.set(CapabilitySet::AVX512VL, cfg!(target_feature = "avx512vl"));
        set
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for ext in self.extensions() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(ext.name())?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(all(target_arch = "x86_64", not(miri)))]
fn detect_runtime() -> CapabilitySet {
    let mut set = CapabilitySet::empty();
    // is_x86_feature_detected! also checks that the OS saves the wide register state
    set.set(CapabilitySet::SSE2, std::is_x86_feature_detected!("sse2"));
    set.set(CapabilitySet::AVX, std::is_x86_feature_detected!("avx"));
    set.set(CapabilitySet::AVX2, std::is_x86_feature_detected!("avx2"));
    set.set(CapabilitySet::AVX512F, std::is_x86_feature_detected!("avx512f"));
    set.set(CapabilitySet::AVX512BW, std::is_x86_feature_detected!("avx512bw"));
    set.set(CapabilitySet::AVX512VL, std::is_x86_feature_detected!("avx512vl"));
    set
}

// Miri cannot interpret vector intrinsics, other targets have no kernels to select.
#[cfg(not(all(target_arch = "x86_64", not(miri))))]
fn detect_runtime() -> CapabilitySet {
    CapabilitySet::empty()
}

static CAPABILITIES: OnceLock<CapabilitySet> = OnceLock::new();

/// Get the process-wide capability set (detected once on first call)
pub fn get_capabilities() -> CapabilitySet {
    *CAPABILITIES.get_or_init(|| {
        let detected = CapabilitySet::detect();
        let assumed = CapabilitySet::compile_time();
        let missing = assumed.difference(detected);
        if !missing.is_empty() {
            log::warn!(
                "binary was compiled for [{}] but the host does not report [{}]; using runtime detection",
                assumed,
                missing
            );
        }
        log::debug!("detected vector extensions: {}", detected);
        detected
    })
}

/// Check if a specific vector extension is available on this host
#[inline]
pub fn supports(extension: VectorExtension) -> bool {
    get_capabilities().supports(extension)
}

/// CPU identification and cache information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuInfo {
    /// Vendor id string (e.g. `GenuineIntel`)
    pub vendor: String,
    /// Processor brand string
    pub brand: String,
    /// Raw CPUID leaf 1 feature word, `ecx << 32 | edx` (0 off x86_64)
    pub feature_flags: u64,
    /// Runtime-detected vector extensions
    pub capabilities: CapabilitySet,
    /// Cache sizes and line size
    pub geometry: CacheGeometry,
}

impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.extensions())
    }
}

const UNKNOWN: &str = "Unknown";

static CPU_INFO: OnceLock<CpuInfo> = OnceLock::new();

/// Get the process-wide CPU information (gathered once on first call)
pub fn cpu_info() -> &'static CpuInfo {
    CPU_INFO.get_or_init(|| {
        let (vendor, brand) = identify_cpu();
        CpuInfo {
            vendor,
            brand,
            feature_flags: leaf1_feature_flags(),
            capabilities: get_capabilities(),
            geometry: get_cache_geometry(),
        }
    })
}

#[cfg(all(target_arch = "x86_64", not(miri)))]
fn identify_cpu() -> (String, String) {
    let cpuid = raw_cpuid::CpuId::new();
    let vendor = cpuid
        .get_vendor_info()
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let brand = cpuid
        .get_processor_brand_string()
        .map(|b| b.as_str().trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());
    (vendor, brand)
}

#[cfg(all(not(all(target_arch = "x86_64", not(miri))), target_os = "linux", not(miri)))]
fn identify_cpu() -> (String, String) {
    let (vendor, brand) = std::fs::read_to_string("/proc/cpuinfo")
        .map(|text| parse_proc_cpuinfo(&text))
        .unwrap_or((None, None));
    (
        vendor.unwrap_or_else(|| UNKNOWN.to_string()),
        brand.unwrap_or_else(|| UNKNOWN.to_string()),
    )
}

#[cfg(not(any(all(target_arch = "x86_64", not(miri)), all(target_os = "linux", not(miri)))))]
fn identify_cpu() -> (String, String) {
    (UNKNOWN.to_string(), UNKNOWN.to_string())
}

#[cfg(all(target_arch = "x86_64", not(miri)))]
fn leaf1_feature_flags() -> u64 {
    let leaf = raw_cpuid::cpuid!(1);
    (u64::from(leaf.ecx) << 32) | u64::from(leaf.edx)
}

#[cfg(not(all(target_arch = "x86_64", not(miri))))]
fn leaf1_feature_flags() -> u64 {
    0
}

/// Pull vendor and model out of `/proc/cpuinfo` text
#[cfg_attr(any(all(target_arch = "x86_64", not(miri)), not(target_os = "linux"), miri), allow(dead_code))]
pub(crate) fn parse_proc_cpuinfo(text: &str) -> (Option<String>, Option<String>) {
    let mut vendor = None;
    let mut brand = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "vendor_id" if vendor.is_none() => vendor = Some(value.to_string()),
            "CPU implementer" if vendor.is_none() => {
                vendor = Some(
                    match value {
                        "0x41" => "ARM",
                        "0x51" => "Qualcomm",
                        "0x61" => "Apple",
                        "0xc0" => "Ampere",
                        other => other,
                    }
                    .to_string(),
                );
            }
            "model name" | "Processor" | "cpu model" if brand.is_none() => {
                brand = Some(value.to_string())
            }
            _ => {}
        }
        if vendor.is_some() && brand.is_some() {
            break;
        }
    }

    (vendor, brand)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_is_stable() {
        let first = get_capabilities();
        let second = get_capabilities();
        assert_eq!(first, second);
        assert_eq!(first, CapabilitySet::detect());
    }

    #[cfg(all(target_arch = "x86_64", not(miri)))]
    #[test]
    fn test_matches_std_detection() {
        let caps = get_capabilities();
        assert_eq!(caps.supports(VectorExtension::Avx2), std::is_x86_feature_detected!("avx2"));
        assert_eq!(caps.supports(VectorExtension::Avx512F), std::is_x86_feature_detected!("avx512f"));
        // SSE2 is part of the x86_64 baseline
        assert!(caps.supports(VectorExtension::Sse2));
    }

    #[test]
    fn test_supports_and_width() {
        let set = CapabilitySet::SSE2 | CapabilitySet::AVX2;
        assert!(set.supports(VectorExtension::Avx2));
        assert!(!set.supports(VectorExtension::Avx512F));
        assert_eq!(set.max_vector_width(), 32);
        assert_eq!(CapabilitySet::empty().max_vector_width(), 0);
        assert_eq!((set | CapabilitySet::AVX512F).max_vector_width(), 64);
    }

    #[test]
    fn test_display() {
        assert_eq!(CapabilitySet::empty().to_string(), "none");
        let set = CapabilitySet::AVX512F | CapabilitySet::SSE2;
        assert_eq!(set.to_string(), "sse2 avx512f");
    }

    #[test]
    fn test_compile_time_view() {
        let assumed = CapabilitySet::compile_time();
        assert_eq!(assumed.supports(VectorExtension::Avx2), cfg!(target_feature = "avx2"));
    }

    #[test]
    fn test_cpu_info() {
        let info = cpu_info();
        assert!(!info.vendor.is_empty());
        assert!(!info.brand.is_empty());
        assert_eq!(info.capabilities, get_capabilities());
        assert_eq!(info.geometry, get_cache_geometry());
        assert!(std::ptr::eq(info, cpu_info()));
    }

    #[test]
    fn test_cpu_info_serializes() {
        let info = CpuInfo {
            vendor: "GenuineIntel".to_string(),
            brand: "Test CPU".to_string(),
            feature_flags: 0,
            capabilities: CapabilitySet::SSE2 | CapabilitySet::AVX2,
            geometry: CacheGeometry::default(),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"capabilities\":[\"sse2\",\"avx2\"]"));
        assert!(json.contains("\"l3_size\":8388608"));
    }

    #[test]
    fn test_parse_proc_cpuinfo_x86() {
        let text = "processor\t: 0\nvendor_id\t: AuthenticAMD\ncpu family\t: 25\nmodel name\t: AMD EPYC 7763 64-Core Processor\n";
        let (vendor, brand) = parse_proc_cpuinfo(text);
        assert_eq!(vendor.as_deref(), Some("AuthenticAMD"));
        assert_eq!(brand.as_deref(), Some("AMD EPYC 7763 64-Core Processor"));
    }

    #[test]
    fn test_parse_proc_cpuinfo_arm() {
        let text = "processor\t: 0\nBogoMIPS\t: 50.00\nCPU implementer\t: 0x41\nCPU part\t: 0xd0c\n";
        let (vendor, brand) = parse_proc_cpuinfo(text);
        assert_eq!(vendor.as_deref(), Some("ARM"));
        assert_eq!(brand, None);
    }
}
