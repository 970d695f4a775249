//! Portable copy kernel
//!
//! A direct byte-range copy with no alignment assumptions. Every other kernel
//! falls back to it for small transfers and for the unaligned head and tail
//! of a streaming copy.

use std::ptr;

/// Copy `len` bytes from `src` to `dst` and return `dst`.
///
/// `len == 0` touches neither pointer.
///
/// # Safety
///
/// When `len > 0`, `src` must be valid for reads and `dst` valid for writes of
/// `len` bytes, and the two regions must not overlap.
#[inline(always)]
pub unsafe fn copy_bytes(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    if len != 0 {
        // SAFETY: guaranteed by the caller
        unsafe { ptr::copy_nonoverlapping(src, dst, len) };
    }
    dst
}
