//! Public copy entry points
//!
//! Everything here goes through the process-wide [`Dispatcher`], which is
//! built on first use and never changes afterwards.
//!
//! ```rust
//! let src = vec![7u8; 1 << 16];
//! let mut dst = vec![0u8; 1 << 16];
//! fastmem::copy_slice(&mut dst, &src).unwrap();
//! assert_eq!(dst, src);
//! ```

use crate::error::{check_same_len, Result};
use crate::simd::{Dispatcher, Strategy};
use crate::system::{get_cache_geometry, get_capabilities, CacheGeometry, CapabilitySet};

/// Raw copy function signature, `(dst, src, len) -> dst`
pub type CopyFn = unsafe fn(*mut u8, *const u8, usize) -> *mut u8;

/// Copy `len` bytes from `src` to `dst` and return `dst`.
///
/// Transfers below the streaming threshold (the L3 size by default) use a
/// plain cache-friendly copy. Larger ones use the best streaming kernel the
/// host supports.
///
/// # Safety
///
/// When `len > 0`, `src` must be valid for reads and `dst` valid for writes
/// of `len` bytes, and the regions must not overlap. With `len == 0` nothing
/// is read or written and `dst` is returned unchanged.
#[inline]
pub unsafe fn copy(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    unsafe { Dispatcher::global().copy(dst, src, len) }
}

/// Copy with an explicit strategy.
///
/// A strategy whose kernel is not compiled in or not supported by the host
/// falls back to the portable kernel.
///
/// # Safety
///
/// Same contract as [`copy`].
#[inline]
pub unsafe fn copy_with(dst: *mut u8, src: *const u8, len: usize, strategy: Strategy) -> *mut u8 {
    unsafe { Dispatcher::global().copy_with(dst, src, len, strategy) }
}

/// Copy `src` into `dst`, which must have the same length
pub fn copy_slice(dst: &mut [u8], src: &[u8]) -> Result<()> {
    copy_slice_with(dst, src, Strategy::Auto)
}

/// Copy `src` into `dst` with an explicit strategy
pub fn copy_slice_with(dst: &mut [u8], src: &[u8], strategy: Strategy) -> Result<()> {
    check_same_len(dst.len(), src.len())?;
    // SAFETY: both slices cover len bytes and a &mut cannot alias a &
    unsafe { copy_with(dst.as_mut_ptr(), src.as_ptr(), src.len(), strategy) };
    Ok(())
}

/// [`copy`] with [`Strategy::Auto`]
///
/// # Safety
///
/// Same contract as [`copy`].
pub unsafe fn copy_auto(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    unsafe { copy(dst, src, len) }
}

/// [`copy_with`] with [`Strategy::WidestVector`]
///
/// # Safety
///
/// Same contract as [`copy`].
pub unsafe fn copy_widest(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    unsafe { copy_with(dst, src, len, Strategy::WidestVector) }
}

/// [`copy_with`] with [`Strategy::NarrowVector`]
///
/// # Safety
///
/// Same contract as [`copy`].
pub unsafe fn copy_narrow(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    unsafe { copy_with(dst, src, len, Strategy::NarrowVector) }
}

/// [`copy_with`] with [`Strategy::Portable`]
///
/// # Safety
///
/// Same contract as [`copy`].
pub unsafe fn copy_portable(dst: *mut u8, src: *const u8, len: usize) -> *mut u8 {
    unsafe { copy_with(dst, src, len, Strategy::Portable) }
}

/// Function pointer for `strategy`, for harnesses that iterate over implementations
pub fn get_copy_function(strategy: Strategy) -> CopyFn {
    match strategy {
        Strategy::Auto => copy_auto,
        Strategy::WidestVector => copy_widest,
        Strategy::NarrowVector => copy_narrow,
        Strategy::Portable => copy_portable,
    }
}

/// Vector extensions usable on this host
pub fn query_capabilities() -> CapabilitySet {
    get_capabilities()
}

/// Cache geometry of this host
pub fn query_cache_geometry() -> CacheGeometry {
    get_cache_geometry()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FastMemError;

    #[test]
    fn test_copy_slice() {
        let src: Vec<u8> = (0..1000).map(|i| (i * 13) as u8).collect();
        let mut dst = vec![0u8; 1000];
        copy_slice(&mut dst, &src).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn test_copy_slice_length_mismatch() {
        let src = [1u8; 10];
        let mut dst = [0u8; 12];
        match copy_slice(&mut dst, &src) {
            Err(FastMemError::LengthMismatch { dst, src }) => {
                assert_eq!(dst, 12);
                assert_eq!(src, 10);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
        assert_eq!(dst, [0u8; 12]);
    }

    #[test]
    fn test_zero_length_returns_dst() {
        let ret = unsafe { copy(std::ptr::null_mut(), std::ptr::null(), 0) };
        assert!(ret.is_null());

        let mut buf = [0xabu8; 4];
        let ptr = buf.as_mut_ptr();
        let ret = unsafe { copy_with(ptr, [1u8].as_ptr(), 0, Strategy::WidestVector) };
        assert_eq!(ret, ptr);
        assert_eq!(buf, [0xab; 4]);
    }

    #[test]
    fn test_function_table() {
        let src: Vec<u8> = (0..777).map(|i| i as u8).collect();
        for strategy in Strategy::ALL {
            let f = get_copy_function(strategy);
            let mut dst = vec![0u8; src.len()];
            let ret = unsafe { f(dst.as_mut_ptr(), src.as_ptr(), src.len()) };
            assert_eq!(ret, dst.as_mut_ptr());
            assert_eq!(dst, src);
        }
    }

    #[test]
    fn test_queries() {
        assert_eq!(query_capabilities(), get_capabilities());
        assert!(query_cache_geometry().is_valid());
    }
}
