//! Copy kernel handles
//!
//! [`CopyKernel`] is a closed set of tagged variants. Every variant exists in
//! every build; whether its code was compiled in ([`CopyKernel::is_compiled`])
//! and whether the host can run it ([`CopyKernel::is_supported_by`]) are two
//! independent axes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::portable::copy_bytes;
use crate::memory::streaming::{StreamParams, AVX2_BLOCK, AVX2_LANE, AVX512_BLOCK, AVX512_LANE};
use crate::system::{CapabilitySet, VectorExtension};

/// One concrete copy strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyKernel {
    /// Plain byte-range copy
    Portable,
    /// 32-byte lanes, 256-byte blocks, streaming stores
    Avx2Stream,
    /// 64-byte lanes, 512-byte blocks, streaming stores
    Avx512Stream,
}

impl CopyKernel {
    /// Every kernel in selection priority order, widest first
    pub const PRIORITY: [CopyKernel; 3] =
        [CopyKernel::Avx512Stream, CopyKernel::Avx2Stream, CopyKernel::Portable];

    /// Short name for logs and benchmark ids
    pub fn name(self) -> &'static str {
        match self {
            CopyKernel::Portable => "portable",
            CopyKernel::Avx2Stream => "avx2-stream",
            CopyKernel::Avx512Stream => "avx512-stream",
        }
    }

    /// Vector lane width in bytes, `None` for the portable kernel
    pub fn lane_width(self) -> Option<usize> {
        match self {
            CopyKernel::Portable => None,
            CopyKernel::Avx2Stream => Some(AVX2_LANE),
            CopyKernel::Avx512Stream => Some(AVX512_LANE),
        }
    }

    /// Streaming block size in bytes, `None` for the portable kernel
    pub fn block_size(self) -> Option<usize> {
        match self {
            CopyKernel::Portable => None,
            CopyKernel::Avx2Stream => Some(AVX2_BLOCK),
            CopyKernel::Avx512Stream => Some(AVX512_BLOCK),
        }
    }

    /// Extension the host must report for this kernel to run
    pub fn required_extension(self) -> Option<VectorExtension> {
        match self {
            CopyKernel::Portable => None,
            CopyKernel::Avx2Stream => Some(VectorExtension::Avx2),
            CopyKernel::Avx512Stream => Some(VectorExtension::Avx512F),
        }
    }

    /// Whether this build contains the kernel's code
    pub fn is_compiled(self) -> bool {
        match self {
            CopyKernel::Portable => true,
            CopyKernel::Avx2Stream => cfg!(fastmem_avx2_kernel),
            CopyKernel::Avx512Stream => cfg!(fastmem_avx512_kernel),
        }
    }

    /// Whether a host with `caps` can execute the kernel
    pub fn is_supported_by(self, caps: CapabilitySet) -> bool {
        self.required_extension().map_or(true, |ext| caps.supports(ext))
    }

    /// Compiled in and supported by `caps`
    pub fn is_available(self, caps: CapabilitySet) -> bool {
        self.is_compiled() && self.is_supported_by(caps)
    }

    /// Run the kernel.
    ///
    /// # Safety
    ///
    /// The kernel must be available on this host, see [`CopyKernel::is_available`].
    /// When `len > 0`, `src` must be valid for reads and `dst` valid for
    /// writes of `len` bytes, and the regions must not overlap.
    #[inline]
    pub(crate) unsafe fn run(self, dst: *mut u8, src: *const u8, len: usize, params: &StreamParams) -> *mut u8 {
        match self {
            CopyKernel::Portable => unsafe { copy_bytes(dst, src, len) },
            #[cfg(fastmem_avx2_kernel)]
            CopyKernel::Avx2Stream => unsafe { crate::memory::streaming::copy_avx2(dst, src, len, params) },
            #[cfg(fastmem_avx512_kernel)]
            CopyKernel::Avx512Stream => unsafe { crate::memory::streaming::copy_avx512(dst, src, len, params) },
            #[allow(unreachable_patterns)]
            _ => {
                let _ = params;
                unsafe { copy_bytes(dst, src, len) }
            }
        }
    }
}

impl fmt::Display for CopyKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
