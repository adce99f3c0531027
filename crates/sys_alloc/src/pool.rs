//! Fixed-size slot pool backed by page mappings.
//!
//! Hosts that allocate many blocks of one size (cons cells, boxed numbers,
//! environment frames) can hand a `PoolAllocator` to the collector instead of
//! going through `malloc` for every object.

use std::alloc::Layout;
use std::fmt;
use std::mem;
use std::ptr::NonNull;

use crate::{allocation_granularity, page_size, AllocError, BackingAllocator, Malloc, Mmap, MmapOptions};

/// Alignment of every slot handed out by a [`PoolAllocator`].
pub const SLOT_ALIGN: usize = 16;

/// Link stored in the first word of a released slot.
struct FreeSlot {
    next: Option<NonNull<FreeSlot>>,
}

const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// A pool of equally sized slots.
///
/// Requests that fit in a slot (size and alignment) are served from the pool:
/// first from the free list of released slots, then by bumping through the
/// newest chunk, mapping a fresh chunk when that one is exhausted. Larger
/// requests fall through to [`Malloc`].
///
/// Chunks are only returned to the operating system when the pool is dropped,
/// so the pool must outlive every block it handed out. A collector that owns
/// its pool satisfies this automatically.
pub struct PoolAllocator {
    slot_size: usize,
    chunk_size: usize,
    chunks: Vec<Mmap>,
    free: Option<NonNull<FreeSlot>>,
    cursor: usize,
    limit: usize,
    slots_in_use: usize,
    fallback: Malloc,
}

impl PoolAllocator {
    /// Creates a pool whose slots hold at least `slot_size` bytes.
    #[must_use]
    pub fn new(slot_size: usize) -> Self {
        Self::with_chunk_size(slot_size, allocation_granularity().max(64 * 1024))
    }

    /// Creates a pool that maps `chunk_size` bytes (rounded up to whole pages)
    /// at a time.
    #[must_use]
    pub fn with_chunk_size(slot_size: usize, chunk_size: usize) -> Self {
        let slot_size = round_up(slot_size.max(mem::size_of::<FreeSlot>()), SLOT_ALIGN);
        let chunk_size = round_up(chunk_size.max(slot_size), page_size());
        Self {
            slot_size,
            chunk_size,
            chunks: Vec::new(),
            free: None,
            cursor: 0,
            limit: 0,
            slots_in_use: 0,
            fallback: Malloc,
        }
    }

    /// Usable bytes per slot.
    #[must_use]
    pub const fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Number of chunks mapped so far.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of slots currently handed out.
    #[must_use]
    pub const fn slots_in_use(&self) -> usize {
        self.slots_in_use
    }

    /// Returns `true` if `layout` is served from the pool rather than the fallback.
    #[must_use]
    pub const fn fits(&self, layout: Layout) -> bool {
        layout.size() <= self.slot_size && layout.align() <= SLOT_ALIGN
    }

    fn refill(&mut self, layout: Layout) -> Result<(), AllocError> {
        let chunk = MmapOptions::new()
            .len(self.chunk_size)
            .map_anon()
            .map_err(|_| AllocError::new(layout))?;
        self.cursor = chunk.ptr() as usize;
        self.limit = self.cursor + chunk.len();
        self.chunks.push(chunk);
        Ok(())
    }

    fn take_slot(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if let Some(slot) = self.free {
            // SAFETY: every pointer on the free list is a released slot whose
            // first word we wrote in `release`.
            self.free = unsafe { slot.as_ref().next };
            return Ok(slot.cast());
        }

        if self.limit - self.cursor < self.slot_size {
            self.refill(layout)?;
        }
        let slot = self.cursor as *mut u8;
        self.cursor += self.slot_size;
        NonNull::new(slot).ok_or(AllocError::new(layout))
    }
}

impl BackingAllocator for PoolAllocator {
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if !self.fits(layout) {
            return self.fallback.allocate(layout);
        }
        let slot = self.take_slot(layout)?;
        self.slots_in_use += 1;
        Ok(slot)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>, layout: Layout) {
        if !self.fits(layout) {
            // SAFETY: same layout routed this block to the fallback.
            unsafe { self.fallback.release(ptr, layout) };
            return;
        }
        let slot = ptr.cast::<FreeSlot>();
        // SAFETY: slots are at least one `FreeSlot` wide and `SLOT_ALIGN`-aligned.
        unsafe { slot.as_ptr().write(FreeSlot { next: self.free }) };
        self.free = Some(slot);
        self.slots_in_use -= 1;
    }
}

impl fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("slot_size", &self.slot_size)
            .field("chunk_size", &self.chunk_size)
            .field("chunks", &self.chunks.len())
            .field("slots_in_use", &self.slots_in_use)
            .finish_non_exhaustive()
    }
}

// The free list and bump cursor only point into chunks owned by the pool.
unsafe impl Send for PoolAllocator {}
