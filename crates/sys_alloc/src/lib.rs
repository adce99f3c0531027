//! Backing allocator capability and low-level system allocator primitives.
//!
//! A garbage collector embedded in a host runtime obtains raw memory through a
//! [`BackingAllocator`]. This crate defines that capability, the error it
//! reports, and a few implementations:
//!
//! - [`Malloc`] wraps the C allocator (`malloc`/`free`) and is the default.
//! - [`Global`] wraps Rust's global allocator.
//! - [`PoolAllocator`] serves fixed-size slots carved out of page mappings.

use std::alloc::Layout;
use std::fmt;
use std::io;
use std::ptr::NonNull;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as os;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as os;

mod malloc;
mod pool;

pub use malloc::{Global, Malloc, MALLOC_ALIGN};
pub use os::page_size;
pub use pool::{PoolAllocator, SLOT_ALIGN};

// ============================================================================
// Backing allocator capability
// ============================================================================

/// A pluggable source of raw memory.
///
/// The implementing value is the allocator's context: whatever state it needs
/// (a pool, an arena, counters) travels with `&mut self` through both calls.
/// A collector takes its allocator by value, so the caller's copy does not
/// need to outlive the collector.
///
/// The allocator does not own the memory it hands out. It only promises that a
/// block returned by [`allocate`](Self::allocate) stays valid until it is
/// passed back to [`release`](Self::release).
pub trait BackingAllocator {
    /// Allocates a block that fits `layout`.
    ///
    /// The returned pointer must be aligned to at least `layout.align()` and
    /// valid for reads and writes of `layout.size()` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the request cannot be satisfied.
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same allocator with
    /// the same `layout`, and must not have been released already.
    unsafe fn release(&mut self, ptr: NonNull<u8>, layout: Layout);
}

impl<A: BackingAllocator + ?Sized> BackingAllocator for &mut A {
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded contract.
        unsafe { (**self).release(ptr, layout) }
    }
}

impl<A: BackingAllocator + ?Sized> BackingAllocator for Box<A> {
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded contract.
        unsafe { (**self).release(ptr, layout) }
    }
}

/// The backing allocator could not satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    size: usize,
    align: usize,
}

impl AllocError {
    /// Creates an error for a failed request of `layout`.
    #[must_use]
    pub const fn new(layout: Layout) -> Self {
        Self {
            size: layout.size(),
            align: layout.align(),
        }
    }

    /// Creates an error for a request that could not even be expressed as a
    /// `Layout`, e.g. because adding bookkeeping overflowed the size.
    #[must_use]
    pub const fn from_size_align(size: usize, align: usize) -> Self {
        Self { size, align }
    }

    /// Requested size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Requested alignment in bytes.
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory allocation of {} bytes (align {}) failed",
            self.size, self.align
        )
    }
}

impl std::error::Error for AllocError {}

// ============================================================================
// Page mappings
// ============================================================================

/// Returns the system allocation granularity.
///
/// On Windows, this is typically 64KB. On Unix, this is typically the system page size.
pub fn allocation_granularity() -> usize {
    #[cfg(windows)]
    {
        os::allocation_granularity()
    }
    #[cfg(unix)]
    {
        os::page_size()
    }
}

/// A handle to an anonymous memory mapped region.
///
/// The region is unmapped when this handle is dropped.
pub struct Mmap {
    inner: os::MmapInner,
}

impl Mmap {
    /// Returns a pointer to the start of the memory mapping.
    #[must_use]
    pub fn ptr(&self) -> *mut u8 {
        self.inner.ptr()
    }

    /// Returns the length of the memory mapping in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the mapping is empty (never the case for a live mapping).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Returns `true` if `ptr` points inside this mapping.
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.ptr() as usize;
        let addr = ptr as usize;
        addr >= start && addr < start + self.len()
    }
}

unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}

/// Configuration for creating an anonymous memory mapping.
#[derive(Debug, Clone)]
pub struct MmapOptions {
    len: usize,
    populate: bool,
}

impl MmapOptions {
    /// Creates a new `MmapOptions` with default settings (length 0).
    /// You must set a length before mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            len: 0,
            populate: false,
        }
    }

    /// Sets the length of the mapping in bytes.
    #[must_use]
    pub const fn len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Sets whether to pre-populate (prefault) the page tables.
    ///
    /// On Linux, this adds `MAP_POPULATE`.
    #[must_use]
    pub const fn populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    /// Creates an anonymous, read-write, private memory map.
    ///
    /// # Errors
    ///
    /// Returns an error if the length is zero or the operating system refuses
    /// the mapping.
    pub fn map_anon(&self) -> io::Result<Mmap> {
        if self.len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "length must be greater than 0",
            ));
        }

        // SAFETY: a fresh anonymous mapping with no address hint cannot alias
        // any existing allocation.
        let inner = unsafe { os::MmapInner::map_anon(self.len, self.populate)? };

        Ok(Mmap { inner })
    }
}

impl Default for MmapOptions {
    fn default() -> Self {
        Self::new()
    }
}
