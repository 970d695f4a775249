//! Copy dispatcher configuration.

use super::{parse_env_bool, parse_env_var, Config};
use crate::error::{FastMemError, Result};
use crate::simd::Strategy;
use crate::system::{parse_size, CacheGeometry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Smallest accepted prefetch distance, in blocks
pub const MIN_PREFETCH_DISTANCE: usize = 1;
/// Largest accepted prefetch distance, in blocks
pub const MAX_PREFETCH_DISTANCE: usize = 16;
/// Default prefetch distance, in blocks
pub const DEFAULT_PREFETCH_DISTANCE: usize = 2;

/// Size above which copies switch to non-temporal streaming stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingThreshold {
    /// Detected last-level cache size
    #[default]
    L3Cache,
    /// Detected L2 cache size
    L2Cache,
    /// Fixed byte count
    Bytes(usize),
}

impl StreamingThreshold {
    /// Resolve to a byte count against the given geometry
    pub fn resolve(&self, geometry: &CacheGeometry) -> usize {
        match *self {
            StreamingThreshold::L3Cache => geometry.l3_size,
            StreamingThreshold::L2Cache => geometry.l2_size,
            StreamingThreshold::Bytes(n) => n,
        }
    }
}

impl FromStr for StreamingThreshold {
    type Err = FastMemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l3" | "l3_cache" => Ok(StreamingThreshold::L3Cache),
            "l2" | "l2_cache" => Ok(StreamingThreshold::L2Cache),
            other => parse_size(other).map(StreamingThreshold::Bytes).map_err(|_| {
                FastMemError::configuration(format!(
                    "unknown streaming threshold {:?}, expected l3, l2 or a byte size",
                    s
                ))
            }),
        }
    }
}

impl fmt::Display for StreamingThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamingThreshold::L3Cache => f.write_str("l3"),
            StreamingThreshold::L2Cache => f.write_str("l2"),
            StreamingThreshold::Bytes(n) => write!(f, "{}", n),
        }
    }
}

/// Configuration consumed by [`Dispatcher`](crate::simd::Dispatcher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Master switch for the vector kernels
    pub enable_simd: bool,
    /// Allow the 32-byte (AVX2) kernel
    pub enable_avx2: bool,
    /// Allow the 64-byte (AVX-512) kernel
    pub enable_avx512: bool,
    /// Where the dispatcher switches to streaming stores
    pub streaming_threshold: StreamingThreshold,
    /// Source prefetch distance in blocks ahead of the current block
    pub prefetch_distance: usize,
    /// Kernel family the dispatcher selects for plain `copy`
    pub strategy: Strategy,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            enable_simd: true,
            enable_avx2: true,
            enable_avx512: true,
            streaming_threshold: StreamingThreshold::L3Cache,
            prefetch_distance: DEFAULT_PREFETCH_DISTANCE,
            strategy: Strategy::Auto,
        }
    }
}

impl CopyConfig {
    /// Configuration with a fixed streaming threshold, mostly for tests and benches
    pub fn with_threshold(bytes: usize) -> Self {
        Self {
            streaming_threshold: StreamingThreshold::Bytes(bytes),
            ..Self::default()
        }
    }

    /// Configuration that never selects a vector kernel
    pub fn portable_only() -> Self {
        Self {
            enable_simd: false,
            strategy: Strategy::Portable,
            ..Self::default()
        }
    }
}

impl Config for CopyConfig {
    fn validate(&self) -> Result<()> {
        if !(MIN_PREFETCH_DISTANCE..=MAX_PREFETCH_DISTANCE).contains(&self.prefetch_distance) {
            return Err(FastMemError::configuration(format!(
                "prefetch_distance {} is outside {}..={}",
                self.prefetch_distance, MIN_PREFETCH_DISTANCE, MAX_PREFETCH_DISTANCE
            )));
        }
        Ok(())
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        config.enable_simd = parse_env_bool(&format!("{}SIMD_ENABLE", prefix), config.enable_simd)?;
        config.enable_avx2 = parse_env_bool(&format!("{}SIMD_AVX2", prefix), config.enable_avx2)?;
        config.enable_avx512 =
            parse_env_bool(&format!("{}SIMD_AVX512", prefix), config.enable_avx512)?;
        config.streaming_threshold = parse_env_var(
            &format!("{}STREAMING_THRESHOLD", prefix),
            config.streaming_threshold,
        )?;
        config.prefetch_distance =
            parse_env_var(&format!("{}PREFETCH_DISTANCE", prefix), config.prefetch_distance)?;
        config.strategy = parse_env_var(&format!("{}STRATEGY", prefix), config.strategy)?;
        config.validate()?;
        Ok(config)
    }

    fn performance_preset() -> Self {
        Self::default()
    }

    fn memory_preset() -> Self {
        Self {
            streaming_threshold: StreamingThreshold::L2Cache,
            ..Self::default()
        }
    }

    fn realtime_preset() -> Self {
        Self {
            prefetch_distance: MIN_PREFETCH_DISTANCE,
            ..Self::default()
        }
    }

    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)
            .map_err(|e| FastMemError::configuration(format!("Failed to serialize copy config: {}", e)))?;
        std::fs::write(path, serialized)
            .map_err(|e| FastMemError::configuration(format!("Failed to write copy config file: {}", e)))?;
        Ok(())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FastMemError::configuration(format!("Failed to read copy config file: {}", e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| FastMemError::configuration(format!("Failed to parse copy config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
