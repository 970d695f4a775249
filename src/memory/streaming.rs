//! Non-temporal streaming copy kernels
//!
//! Every vector kernel runs the same plan, parameterized by lane width `W`
//! and block size `B = 8 * W`:
//!
//! 1. At or below the streaming threshold, copy with the portable kernel.
//! 2. Copy `(W - dst % W) % W` head bytes so the destination is `W`-aligned.
//! 3. Copy whole blocks. Before each block, prefetch (NTA) the source block
//!    `prefetch_distance` blocks ahead, then per lane do an unaligned load and
//!    a non-temporal store.
//! 4. Copy the remaining tail with the portable kernel.
//! 5. Store fence, so the weakly ordered streaming stores are visible to any
//!    later load from any core.
//!
//! Only the destination is aligned. Source loads are always unaligned.

use crate::system::CacheGeometry;

#[cfg(any(fastmem_avx2_kernel, fastmem_avx512_kernel))]
use super::{portable::copy_bytes, prefetch::prefetch_range_nta};

/// Lane width of the 256-bit kernel
pub const AVX2_LANE: usize = 32;
/// Block size of the 256-bit kernel
pub const AVX2_BLOCK: usize = 8 * AVX2_LANE;
/// Lane width of the 512-bit kernel
pub const AVX512_LANE: usize = 64;
/// Block size of the 512-bit kernel
pub const AVX512_BLOCK: usize = 8 * AVX512_LANE;

/// Tuning shared by every streaming kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Transfers of at most this many bytes use the portable kernel
    pub threshold: usize,
    /// How many blocks ahead of the current one to prefetch
    pub prefetch_distance: usize,
    /// Prefetch granularity
    pub cache_line: usize,
}

impl StreamParams {
    /// Stream above the L3 size, prefetch two blocks ahead
    pub fn from_geometry(geometry: &CacheGeometry) -> Self {
        Self {
            threshold: geometry.l3_size,
            prefetch_distance: 2,
            cache_line: geometry.cache_line_size,
        }
    }

    /// Replace the threshold
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replace the prefetch distance
    pub fn with_prefetch_distance(mut self, blocks: usize) -> Self {
        self.prefetch_distance = blocks;
        self
    }
}

/// How a streaming copy of `len` bytes splits into head, body and tail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPlan {
    /// Bytes copied by the portable kernel to align the destination
    pub head: usize,
    /// Bytes copied with vector loads and streaming stores, a multiple of the block size
    pub body: usize,
    /// Bytes left after the last whole block
    pub tail: usize,
}

impl StreamPlan {
    /// Split a copy to destination address `dst_addr`.
    ///
    /// `lane` must be a power of two and `block` a positive multiple of it.
    #[inline]
    pub fn new(dst_addr: usize, len: usize, lane: usize, block: usize) -> Self {
        debug_assert!(lane.is_power_of_two());
        debug_assert!(block >= lane && block % lane == 0);

        let head = ((lane - (dst_addr & (lane - 1))) & (lane - 1)).min(len);
        let rest = len - head;
        let body = rest - rest % block;
        Self {
            head,
            body,
            tail: rest - body,
        }
    }

    /// Number of whole blocks in the body
    #[inline]
    pub fn blocks(&self, block: usize) -> usize {
        self.body / block
    }
}

/// Copy with 256-bit loads and non-temporal stores.
///
/// # Safety
///
/// The host must support AVX2. When `len > 0`, `src` must be valid for reads
/// and `dst` valid for writes of `len` bytes, and the regions must not overlap.
#[cfg(fastmem_avx2_kernel)]
#[target_feature(enable = "avx2")]
pub unsafe fn copy_avx2(dst: *mut u8, src: *const u8, len: usize, params: &StreamParams) -> *mut u8 {
    use std::arch::x86_64::{__m256i, _mm256_loadu_si256, _mm256_stream_si256, _mm_sfence};

    if len <= params.threshold {
        return unsafe { copy_bytes(dst, src, len) };
    }

    let plan = StreamPlan::new(dst as usize, len, AVX2_LANE, AVX2_BLOCK);
    let ahead = params.prefetch_distance.saturating_mul(AVX2_BLOCK);

    // SAFETY: every access stays inside [0, len) of both regions and the
    // stores are AVX2_LANE-aligned after the head copy
    unsafe {
        copy_bytes(dst, src, plan.head);
        let mut d = dst.add(plan.head);
        let mut s = src.add(plan.head);

        for _ in 0..plan.blocks(AVX2_BLOCK) {
            prefetch_range_nta(s.wrapping_add(ahead), AVX2_BLOCK, params.cache_line);
            for lane in (0..AVX2_BLOCK).step_by(AVX2_LANE) {
                let v = _mm256_loadu_si256(s.add(lane).cast::<__m256i>());
                _mm256_stream_si256(d.add(lane).cast::<__m256i>(), v);
            }
            s = s.add(AVX2_BLOCK);
            d = d.add(AVX2_BLOCK);
        }

        copy_bytes(d, s, plan.tail);
        _mm_sfence();
    }
    dst
}

/// Copy with 512-bit loads and non-temporal stores.
///
/// # Safety
///
/// The host must support AVX-512F. When `len > 0`, `src` must be valid for
/// reads and `dst` valid for writes of `len` bytes, and the regions must not
/// overlap.
#[cfg(fastmem_avx512_kernel)]
#[target_feature(enable = "avx512f")]
pub unsafe fn copy_avx512(dst: *mut u8, src: *const u8, len: usize, params: &StreamParams) -> *mut u8 {
    use std::arch::x86_64::{_mm512_loadu_si512, _mm512_stream_si512, _mm_sfence};

    if len <= params.threshold {
        return unsafe { copy_bytes(dst, src, len) };
    }

    let plan = StreamPlan::new(dst as usize, len, AVX512_LANE, AVX512_BLOCK);
    let ahead = params.prefetch_distance.saturating_mul(AVX512_BLOCK);

    // SAFETY: every access stays inside [0, len) of both regions and the
    // stores are AVX512_LANE-aligned after the head copy
    unsafe {
        copy_bytes(dst, src, plan.head);
        let mut d = dst.add(plan.head);
        let mut s = src.add(plan.head);

        for _ in 0..plan.blocks(AVX512_BLOCK) {
            prefetch_range_nta(s.wrapping_add(ahead), AVX512_BLOCK, params.cache_line);
            for lane in (0..AVX512_BLOCK).step_by(AVX512_LANE) {
                let v = _mm512_loadu_si512(s.add(lane).cast());
                _mm512_stream_si512(d.add(lane).cast(), v);
            }
            s = s.add(AVX512_BLOCK);
            d = d.add(AVX512_BLOCK);
        }

        copy_bytes(d, s, plan.tail);
        _mm_sfence();
    }
    dst
}
