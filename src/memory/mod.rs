//! Copy kernels and memory-hint utilities
//!
//! - [`portable`]: byte-range copy with no alignment assumptions
//! - [`prefetch`]: non-temporal prefetch hints
//! - [`streaming`]: vector kernels with non-temporal stores
//!
//! The vector kernels exist only when the build compiled them in
//! (`fastmem_avx2_kernel` / `fastmem_avx512_kernel`). Whether the host can run
//! them is a separate question answered by [`crate::system`].

pub mod portable;
pub mod prefetch;
pub mod streaming;

pub use portable::copy_bytes;
pub use prefetch::{prefetch_nta, prefetch_range_nta};
pub use streaming::{StreamParams, StreamPlan, AVX2_BLOCK, AVX2_LANE, AVX512_BLOCK, AVX512_LANE};

#[cfg(fastmem_avx2_kernel)]
pub use streaming::copy_avx2;
#[cfg(fastmem_avx512_kernel)]
pub use streaming::copy_avx512;
