//! Sharing one heap between threads.
//!
//! A [`Heap`] has no internal synchronization. Hosts that need a single heap
//! reachable from several threads put it behind a lock; `SharedHeap` is that
//! lock. Every allocate/mark/collect call happens while holding it, so the
//! heap itself still only ever sees one caller at a time.

use parking_lot::{Mutex, MutexGuard};
use sys_alloc::{BackingAllocator, Malloc};

use crate::config::HeapConfig;
use crate::heap::Heap;
use crate::metrics::TeardownReport;

/// A [`Heap`] behind a `parking_lot::Mutex`.
pub struct SharedHeap<A: BackingAllocator = Malloc> {
    inner: Mutex<Heap<A>>,
}

impl<A: BackingAllocator> SharedHeap<A> {
    /// Wraps an existing heap.
    pub fn new(heap: Heap<A>) -> Self {
        Self {
            inner: Mutex::new(heap),
        }
    }

    /// Creates a shared heap over `allocator`.
    pub fn with_config(allocator: A, config: HeapConfig) -> Self {
        Self::new(Heap::with_config(allocator, config))
    }

    /// Locks the heap for a sequence of operations.
    ///
    /// Hold the guard across a whole mark-then-collect cycle: another thread
    /// allocating between the marks and the sweep would have its fresh block
    /// freed.
    pub fn lock(&self) -> MutexGuard<'_, Heap<A>> {
        self.inner.lock()
    }

    /// Attempts to lock the heap without blocking.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Heap<A>>> {
        self.inner.try_lock()
    }

    /// Unwraps the heap.
    pub fn into_inner(self) -> Heap<A> {
        self.inner.into_inner()
    }

    /// Tears the heap down, freeing every block.
    pub fn teardown(self) -> TeardownReport {
        self.into_inner().teardown()
    }
}

impl Default for SharedHeap<Malloc> {
    fn default() -> Self {
        Self::new(Heap::default())
    }
}
