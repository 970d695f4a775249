//! Kernel selection and the copy entry point
//!
//! A [`Dispatcher`] picks its kernel once, at construction, from the host
//! capabilities and a [`CopyConfig`]. After that it is immutable and shared
//! without locking. The process-wide instance lives behind
//! [`Dispatcher::global`] and is built on first use.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::kernel::CopyKernel;
use crate::config::copy::{MAX_PREFETCH_DISTANCE, MIN_PREFETCH_DISTANCE};
use crate::config::{Config, CopyConfig};
use crate::error::{FastMemError, Result};
use crate::memory::portable::copy_bytes;
use crate::memory::streaming::StreamParams;
use crate::system::{get_cache_geometry, get_capabilities, CacheGeometry, CapabilitySet};

/// Which kernel family a copy should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Best kernel for this host, picked once
    #[default]
    Auto,
    /// The 64-byte streaming kernel
    WidestVector,
    /// The 32-byte streaming kernel
    NarrowVector,
    /// The portable kernel
    Portable,
}

impl Strategy {
    /// All strategies
    pub const ALL: [Strategy; 4] = [
        Strategy::Auto,
        Strategy::WidestVector,
        Strategy::NarrowVector,
        Strategy::Portable,
    ];

    /// Short name, also accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::WidestVector => "widest",
            Strategy::NarrowVector => "narrow",
            Strategy::Portable => "portable",
        }
    }
}

impl FromStr for Strategy {
    type Err = FastMemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Strategy::Auto),
            "widest" | "widest_vector" | "avx512" => Ok(Strategy::WidestVector),
            "narrow" | "narrow_vector" | "avx2" => Ok(Strategy::NarrowVector),
            "portable" | "standard" => Ok(Strategy::Portable),
            _ => Err(FastMemError::configuration(format!(
                "unknown copy strategy {:?}, expected auto, widest, narrow or portable",
                s
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel an explicit strategy names, before availability is checked
fn requested_kernel(strategy: Strategy) -> Option<CopyKernel> {
    match strategy {
        Strategy::Auto => None,
        Strategy::WidestVector => Some(CopyKernel::Avx512Stream),
        Strategy::NarrowVector => Some(CopyKernel::Avx2Stream),
        Strategy::Portable => Some(CopyKernel::Portable),
    }
}

/// Pick the kernel a dispatcher built from `config` runs on a host with `caps`.
///
/// Total: the result is always available, falling back to
/// [`CopyKernel::Portable`].
pub fn select_kernel(config: &CopyConfig, caps: CapabilitySet) -> CopyKernel {
    if !config.enable_simd {
        return CopyKernel::Portable;
    }

    let allowed = |kernel: CopyKernel| match kernel {
        CopyKernel::Portable => true,
        CopyKernel::Avx2Stream => config.enable_avx2,
        CopyKernel::Avx512Stream => config.enable_avx512,
    };

    match requested_kernel(config.strategy) {
        Some(kernel) if allowed(kernel) && kernel.is_available(caps) => kernel,
        Some(_) => CopyKernel::Portable,
        None => CopyKernel::PRIORITY
            .into_iter()
            .find(|&kernel| allowed(kernel) && kernel.is_available(caps))
            .unwrap_or(CopyKernel::Portable),
    }
}

/// Selected kernel plus the parameters it streams with
#[derive(Debug, Clone)]
pub struct Dispatcher {
    kernel: CopyKernel,
    capabilities: CapabilitySet,
    params: StreamParams,
    config: CopyConfig,
}

static GLOBAL_DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

impl Dispatcher {
    /// Build a dispatcher for this host
    pub fn new(config: CopyConfig) -> Self {
        Self::with_environment(config, get_capabilities(), get_cache_geometry())
    }

    /// Build a dispatcher for explicit capabilities and geometry.
    ///
    /// `caps` can only narrow what the host offers: it is intersected with
    /// [`get_capabilities`], so claiming an extension the host lacks never
    /// selects a kernel that cannot run. An out-of-range prefetch distance is
    /// clamped to the range [`Config::validate`] accepts.
    pub fn with_environment(config: CopyConfig, caps: CapabilitySet, geometry: CacheGeometry) -> Self {
        let caps = caps & get_capabilities();
        let kernel = select_kernel(&config, caps);

        let prefetch_distance = config.prefetch_distance.clamp(MIN_PREFETCH_DISTANCE, MAX_PREFETCH_DISTANCE);
        if prefetch_distance != config.prefetch_distance {
            log::warn!(
                "prefetch distance {} out of range, using {}",
                config.prefetch_distance,
                prefetch_distance
            );
        }
        let params = StreamParams::from_geometry(&geometry)
            .with_threshold(config.streaming_threshold.resolve(&geometry))
            .with_prefetch_distance(prefetch_distance);

        Self {
            kernel,
            capabilities: caps,
            params,
            config,
        }
    }

    /// The process-wide dispatcher, configured from `FASTMEM_*` variables
    pub fn global() -> &'static Dispatcher {
        GLOBAL_DISPATCHER.get_or_init(|| {
            let config = CopyConfig::from_env().unwrap_or_else(|e| {
                log::warn!("ignoring FASTMEM_* configuration: {}", e);
                CopyConfig::default()
            });
            let dispatcher = Dispatcher::new(config);
            log::info!(
                "fastmem copy kernel: {} (streaming threshold {} bytes, host: {}, widest register {} bytes)",
                dispatcher.kernel,
                dispatcher.params.threshold,
                dispatcher.capabilities,
                dispatcher.capabilities.max_vector_width()
            );
            dispatcher
        })
    }

    /// Kernel used by [`Dispatcher::copy`] for large transfers
    #[inline]
    pub fn active_kernel(&self) -> CopyKernel {
        self.kernel
    }

    /// Transfers smaller than this take the portable path
    #[inline]
    pub fn threshold(&self) -> usize {
        self.params.threshold
    }

    /// Capabilities the kernel was selected against
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    /// Configuration this dispatcher was built from
    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Streaming parameters shared by every kernel this dispatcher runs
    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    /// Kernel `strategy` maps to on this dispatcher.
    ///
    /// `Auto` is the active kernel. An explicit strategy whose kernel is not
    /// compiled in or not supported by the host resolves to
    /// [`CopyKernel::Portable`].
    pub fn resolve(&self, strategy: Strategy) -> CopyKernel {
        match requested_kernel(strategy) {
            None => self.kernel,
            Some(kernel) if kernel.is_available(self.capabilities) => kernel,
            Some(_) => CopyKernel::Portable,
        }
    }

    /// Copy `len` bytes and return `dst`.
    ///
    /// # Safety
    ///
    /// When `len > 0`, `src` must be valid for reads and `dst` valid for
    /// writes of `len` bytes, and the regions must not overlap.
    #[inline]
    pub unsafe fn copy(&self, dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
        if len < self.params.threshold {
            return unsafe { copy_bytes(dst, src, len) };
        }
        // SAFETY: the active kernel was checked against the host at construction
        unsafe { self.kernel.run(dst, src, len, &self.params) }
    }

    /// Copy with an explicit strategy, see [`Dispatcher::resolve`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Dispatcher::copy`].
    #[inline]
    pub unsafe fn copy_with(&self, dst: *mut u8, src: *const u8, len: usize, strategy: Strategy) -> *mut u8 {
        if strategy == Strategy::Auto {
            return unsafe { self.copy(dst, src, len) };
        }
        // SAFETY: resolve only returns kernels available on this host
        unsafe { self.resolve(strategy).run(dst, src, len, &self.params) }
    }
}

/// Kernel the process-wide dispatcher selected
pub fn best_kernel() -> CopyKernel {
    Dispatcher::global().active_kernel()
}
