//! Process-wide allocators: the C heap and Rust's global allocator.

use std::alloc::Layout;
use std::mem;
use std::ptr::{self, NonNull};

use crate::{AllocError, BackingAllocator};

/// Alignment `malloc` guarantees for every block.
///
/// Requests with a larger alignment take the `posix_memalign` path.
pub const MALLOC_ALIGN: usize = 2 * mem::size_of::<usize>();

/// The C allocator (`malloc`/`free`).
///
/// Stateless and zero-sized; copies are interchangeable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Malloc;

impl BackingAllocator for Malloc {
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let size = layout.size().max(1);
        let raw = if layout.align() <= MALLOC_ALIGN {
            // SAFETY: malloc accepts any non-zero size.
            unsafe { libc::malloc(size) }
        } else {
            aligned_malloc(size, layout.align())
        };
        NonNull::new(raw.cast::<u8>()).ok_or(AllocError::new(layout))
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>, _layout: Layout) {
        // SAFETY: both allocation paths hand out blocks that `free` accepts.
        unsafe { libc::free(ptr.as_ptr().cast::<libc::c_void>()) }
    }
}

#[cfg(unix)]
fn aligned_malloc(size: usize, align: usize) -> *mut libc::c_void {
    let mut out = ptr::null_mut();
    let align = align.max(mem::size_of::<usize>());
    // SAFETY: `align` is a power of two (guaranteed by `Layout`) and a
    // multiple of the pointer size.
    match unsafe { libc::posix_memalign(&mut out, align, size) } {
        0 => out,
        _ => ptr::null_mut(),
    }
}

#[cfg(not(unix))]
const fn aligned_malloc(_size: usize, _align: usize) -> *mut libc::c_void {
    // `free` cannot release `_aligned_malloc` blocks, so over-aligned requests
    // are reported as failures instead.
    ptr::null_mut()
}

/// Rust's global allocator (`std::alloc`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Global;

impl Global {
    fn non_empty(layout: Layout) -> Layout {
        // SAFETY: the alignment came from a valid layout and rounding the size
        // up to 1 cannot overflow.
        unsafe { Layout::from_size_align_unchecked(layout.size().max(1), layout.align()) }
    }
}

impl BackingAllocator for Global {
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: `non_empty` never yields a zero-sized layout.
        let raw = unsafe { std::alloc::alloc(Self::non_empty(layout)) };
        NonNull::new(raw).ok_or(AllocError::new(layout))
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller passes the layout used at allocation.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), Self::non_empty(layout)) }
    }
}
