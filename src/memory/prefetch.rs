//! Non-temporal software prefetch
//!
//! The streaming kernels read each source byte once, so the only hint they
//! issue is the non-temporal one (`prefetchnta` on x86_64, `pldl1strm` on
//! aarch64). A prefetch never faults, even for addresses outside any
//! allocation, so these wrappers are safe to call with any pointer value.

/// Hint the memory subsystem to stream in the line containing `addr`
#[inline(always)]
pub fn prefetch_nta(addr: *const u8) {
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_NTA};
        // SAFETY: prefetch does not dereference and cannot fault
        unsafe { _mm_prefetch::<_MM_HINT_NTA>(addr as *const i8) };
    }

    #[cfg(all(target_arch = "aarch64", not(miri)))]
    {
        // SAFETY: prfm is a hint and cannot fault
        unsafe {
            std::arch::asm!("prfm pldl1strm, [{0}]", in(reg) addr, options(nostack, readonly, preserves_flags));
        }
    }

    #[cfg(not(all(any(target_arch = "x86_64", target_arch = "aarch64"), not(miri))))]
    {
        let _ = addr;
    }
}

/// Stream in every cache line of `[addr, addr + len)`.
///
/// Uses wrapping arithmetic, so the range may lie past the end of the
/// allocation `addr` points into.
#[inline(always)]
pub fn prefetch_range_nta(addr: *const u8, len: usize, line_size: usize) {
    let step = line_size.max(1);
    let mut offset = 0;
    while offset < len {
        prefetch_nta(addr.wrapping_add(offset));
        offset += step;
    }
}
