//! The collector context.
//!
//! A [`Heap`] owns the intrusive list of every block it handed out and the
//! backing allocator those blocks came from. Blocks leave the list in exactly
//! one way: a [`collect`](Heap::collect) that finds them unmarked.

use std::alloc::Layout;
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};
use std::time::Instant;

use sys_alloc::{AllocError, BackingAllocator, Malloc};

use crate::config::HeapConfig;
use crate::header::{Header, PAYLOAD_ALIGN, SCRUB_BYTE};
use crate::mark::{Marker, Pending, VisitFn};
use crate::metrics::{CollectStats, HeapStats, TeardownReport};
use crate::trace::Trace;
use crate::tracing::internal::{
    log_lifetime, log_residual, log_sweep_end, trace_gc_collection, GcId,
};
use crate::Gc;

/// A cooperative mark-sweep heap.
///
/// The host allocates blocks with [`alloc`](Self::alloc), marks every root
/// with [`mark`](Self::mark) before each [`collect`](Self::collect), and
/// supplies visit callbacks that mark the references stored inside payloads.
/// Everything not marked since the previous collection is freed.
///
/// Dropping the heap (or calling [`teardown`](Self::teardown)) frees every
/// block still on the list.
///
/// # Example
///
/// ```
/// use coop_gc::Heap;
///
/// let mut heap = Heap::default();
/// let root = heap.alloc(8)?;
/// let _garbage = heap.alloc(32)?;
///
/// unsafe { heap.mark(Some(root), None) };
/// let stats = heap.collect();
/// assert_eq!(stats.objects_reclaimed, 1);
/// assert_eq!(heap.len(), 1);
/// # Ok::<(), coop_gc::AllocError>(())
/// ```
pub struct Heap<A: BackingAllocator = Malloc> {
    head: Option<NonNull<Header>>,
    allocator: A,
    config: HeapConfig,
    stats: HeapStats,
    worklist: Vec<Pending>,
    cycles: u64,
    last_collect: Option<CollectStats>,
    torn_down: bool,
}

// Payload pointers are plain addresses; nothing ties a heap to the thread
// that created it.
unsafe impl<A: BackingAllocator + Send> Send for Heap<A> {}

// ============================================================================
// Lifecycle
// ============================================================================

impl<A: BackingAllocator> Heap<A> {
    /// Creates an empty heap drawing memory from `allocator`.
    pub const fn new(allocator: A) -> Self {
        Self::with_config(allocator, HeapConfig::new())
    }

    /// Creates an empty heap with explicit options.
    pub const fn with_config(allocator: A, config: HeapConfig) -> Self {
        Self {
            head: None,
            allocator,
            config,
            stats: HeapStats::new(),
            worklist: Vec::new(),
            cycles: 0,
            last_collect: None,
            torn_down: false,
        }
    }

    /// Creates a heap in its own heap storage.
    ///
    /// This is the fallible constructor: it reports failure instead of
    /// aborting when the storage for the context itself cannot be obtained.
    ///
    /// The context is allocated from Rust's global allocator, not from
    /// `allocator`. Only managed blocks come from `allocator`, so a
    /// [`PoolAllocator`](sys_alloc::PoolAllocator) never holds the heap
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the context could not be allocated.
    pub fn try_new_in(allocator: A, config: HeapConfig) -> Result<Box<Self>, AllocError> {
        let layout = Layout::new::<Self>();
        // SAFETY: `Self` always has a non-zero size.
        let raw = unsafe { std::alloc::alloc(layout) }.cast::<Self>();
        let Some(slot) = NonNull::new(raw) else {
            return Err(AllocError::new(layout));
        };
        // SAFETY: `slot` is a fresh allocation of `Layout::new::<Self>()`,
        // which is exactly what `Box::from_raw` expects.
        unsafe {
            slot.as_ptr().write(Self::with_config(allocator, config));
            Ok(Box::from_raw(slot.as_ptr()))
        }
    }

    /// Frees every block and reports what was released.
    ///
    /// Sweeps twice. The first sweep frees all unmarked blocks and unmarks
    /// the rest; with nothing marked in between, the second sweep frees
    /// whatever the first one kept. The heap is therefore always drained,
    /// even if blocks were left marked by an unfinished cycle.
    ///
    /// # Panics
    ///
    /// With diagnostics enabled, panics if any block or byte is still
    /// accounted for after both sweeps.
    pub fn teardown(mut self) -> TeardownReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> TeardownReport {
        let diagnostics = self.config.diagnostics();
        let lifetime = self.stats;
        if diagnostics {
            log_lifetime(&lifetime);
        }

        let first_pass = self.collect();
        let second_pass = self.collect();
        self.torn_down = true;

        if diagnostics && (!self.stats.is_drained() || self.head.is_some()) {
            if std::thread::panicking() {
                log_residual(&self.stats, self.head.is_none());
            } else {
                panic!(
                    "coop-gc: heap not drained after teardown ({} allocs, {} bytes, list {})",
                    self.stats.allocs,
                    self.stats.bytes,
                    if self.head.is_some() { "non-empty" } else { "empty" },
                );
            }
        }

        TeardownReport {
            lifetime,
            first_pass,
            second_pass,
        }
    }
}

impl Heap<Malloc> {
    /// Fallible counterpart of [`Heap::default`].
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the context could not be allocated.
    pub fn try_default() -> Result<Box<Self>, AllocError> {
        Self::try_new_in(Malloc, HeapConfig::new())
    }
}

impl Default for Heap<Malloc> {
    fn default() -> Self {
        Self::new(Malloc)
    }
}

impl<A: BackingAllocator> Drop for Heap<A> {
    fn drop(&mut self) {
        if !self.torn_down {
            self.shutdown();
        }
    }
}

// ============================================================================
// Allocation
// ============================================================================

impl<A: BackingAllocator> Heap<A> {
    /// Allocates a block with room for `size` payload bytes.
    ///
    /// The payload is aligned to [`PAYLOAD_ALIGN`] and uninitialized. The
    /// block starts unmarked: unless it is marked before the next
    /// [`collect`](Self::collect), that collection frees it.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the backing allocator fails or `size` plus
    /// the header overflows. The heap is left untouched in that case.
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let layout = Header::block_layout(size)
            .ok_or(AllocError::from_size_align(size, PAYLOAD_ALIGN))?;
        let block = self.allocator.allocate(layout)?;

        // SAFETY: the allocator returned `layout.size()` bytes aligned to
        // `PAYLOAD_ALIGN`.
        let header = unsafe { Header::init(block, layout.size(), self.head) };
        self.head = Some(header);
        if self.config.diagnostics() {
            self.stats.record_alloc(layout.size());
        }
        Ok(Header::payload(header))
    }

    /// Moves `value` into a new block.
    ///
    /// The value's destructor never runs: sweeping releases raw memory. Types
    /// with drop glue are rejected at compile time.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the block could not be allocated; `value` is
    /// dropped in that case.
    pub fn alloc_value<T: Trace>(&mut self, value: T) -> Result<Gc<T>, AllocError> {
        const {
            assert!(
                !mem::needs_drop::<T>(),
                "managed values are freed without running destructors"
            );
            assert!(
                mem::align_of::<T>() <= PAYLOAD_ALIGN,
                "managed values cannot be over-aligned"
            );
        }
        let ptr = self.alloc(mem::size_of::<T>())?.cast::<T>();
        // SAFETY: fresh block, large and aligned enough for `T`.
        unsafe { ptr.as_ptr().write(value) };
        Ok(Gc::from_raw(ptr))
    }
}

// ============================================================================
// Marking
// ============================================================================

impl<A: BackingAllocator> Heap<A> {
    /// Marks a root.
    ///
    /// `None` is a no-op. If the block is not yet marked this cycle it is
    /// marked and `visit` (when given) runs once with `ptr`, marking the
    /// block's outgoing references through the [`Marker`] it receives.
    /// Reachable blocks are processed from a worklist until none is left.
    ///
    /// Returns the number of blocks newly marked by this call.
    ///
    /// # Safety
    ///
    /// `ptr`, if present, must be a payload returned by [`alloc`](Self::alloc)
    /// on this heap that has not been swept. The same holds for every pointer
    /// the visit callbacks pass to [`Marker::mark`].
    pub unsafe fn mark(&mut self, ptr: Option<NonNull<u8>>, visit: Option<VisitFn>) -> usize {
        // SAFETY: forwarded contract.
        unsafe {
            self.mark_with(|marker| {
                marker.mark(ptr, visit);
            })
        }
    }

    /// Marks a typed root and everything its [`Trace`] impl reaches.
    ///
    /// # Safety
    ///
    /// `value`, if present, must come from [`alloc_value`](Self::alloc_value)
    /// on this heap and must not have been swept.
    pub unsafe fn mark_value<T: Trace>(&mut self, value: Option<Gc<T>>) -> usize {
        // SAFETY: forwarded contract.
        unsafe {
            self.mark_with(|marker| {
                marker.mark_value(value);
            })
        }
    }

    /// Runs `roots` with a marking session, then processes everything it
    /// queued.
    ///
    /// Convenient for hosts that mark several roots at once. Returns the
    /// number of blocks newly marked.
    ///
    /// # Safety
    ///
    /// Every pointer marked through the session, by `roots` or by the visit
    /// callbacks and [`Trace`] impls it reaches, must be a payload of this
    /// heap that has not been swept. A [`Gc`] kept across a collection
    /// without being marked is dangling and must not be traced here.
    ///
    /// Calling it without `unsafe` does not compile:
    ///
    /// ```compile_fail
    /// use coop_gc::{Heap, Trace};
    ///
    /// let mut heap = Heap::default();
    /// let g = heap.alloc_value(7u64)?;
    /// heap.collect();
    /// heap.mark_with(|m| g.trace(m));
    /// # Ok::<(), coop_gc::AllocError>(())
    /// ```
    pub unsafe fn mark_with(&mut self, roots: impl FnOnce(&mut Marker<'_>)) -> usize {
        self.worklist.clear();
        let mut marker = Marker::new(&mut self.worklist);
        roots(&mut marker);
        marker.drain();
        marker.marked()
    }

    /// Returns `true` if the block is marked for the current cycle.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live payload of this heap.
    #[must_use]
    pub unsafe fn is_marked(&self, ptr: NonNull<u8>) -> bool {
        // SAFETY: caller guarantees `ptr` is a live payload.
        unsafe { Header::from_payload(ptr).as_ref().marked }
    }
}

// ============================================================================
// Collection
// ============================================================================

impl<A: BackingAllocator> Heap<A> {
    /// Sweeps the heap.
    ///
    /// Walks the live list once. Marked blocks are unmarked and kept; every
    /// other block is unlinked and released. With diagnostics on, released
    /// blocks are first overwritten with [`SCRUB_BYTE`] and the running
    /// counters are decremented.
    ///
    /// No roots are discovered here: whatever the host did not mark since the
    /// previous collection is gone afterwards.
    pub fn collect(&mut self) -> CollectStats {
        self.cycles += 1;
        let diagnostics = self.config.diagnostics();
        #[allow(clippy::let_unit_value)]
        let _span = trace_gc_collection(GcId(self.cycles));
        let start = Instant::now();
        let mut stats = CollectStats {
            cycle: self.cycles,
            ..CollectStats::default()
        };

        let Self {
            head,
            allocator,
            stats: counters,
            ..
        } = self;
        let mut link: *mut Option<NonNull<Header>> = head;

        // SAFETY: `link` points either at `head` or at the `next` field of a
        // header that stays on the list. A header is read in full before its
        // block is unlinked, scrubbed and released, and never touched again.
        unsafe {
            while let Some(node) = *link {
                let header = node.as_ptr();
                let size = (*header).size;
                if (*header).marked {
                    (*header).marked = false;
                    stats.record_survivor(size);
                    link = ptr::addr_of_mut!((*header).next);
                } else {
                    *link = (*header).next;
                    stats.record_reclaimed(size);
                    if diagnostics {
                        counters.record_free(size);
                        ptr::write_bytes(header.cast::<u8>(), SCRUB_BYTE, size);
                    }
                    allocator.release(node.cast::<u8>(), Header::layout_of(size));
                }
            }
        }

        stats.duration = start.elapsed();
        log_sweep_end(&stats, diagnostics);
        self.last_collect = Some(stats);
        stats
    }
}

// ============================================================================
// Introspection
// ============================================================================

impl<A: BackingAllocator> Heap<A> {
    /// The options this heap was created with.
    pub const fn config(&self) -> HeapConfig {
        self.config
    }

    /// The backing allocator.
    pub const fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Allocation counters. All zero unless diagnostics are enabled.
    pub const fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Statistics of the most recent collection, if any ran.
    pub const fn last_collect(&self) -> Option<CollectStats> {
        self.last_collect
    }

    /// Number of collections run so far.
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Number of blocks on the live list. Walks the list.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut node = self.head;
        while let Some(header) = node {
            count += 1;
            // SAFETY: every header on the list is live.
            node = unsafe { header.as_ref().next };
        }
        count
    }

    /// Returns `true` if the heap holds no blocks.
    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl<A: BackingAllocator + fmt::Debug> fmt::Debug for Heap<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("allocator", &self.allocator)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}
