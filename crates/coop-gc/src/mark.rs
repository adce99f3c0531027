//! The mark primitive and its worklist.
//!
//! Marking is driven by the host. It marks each root with
//! [`Heap::mark`](crate::Heap::mark), passing a visit callback that knows the
//! payload's shape; the callback reports outgoing references through
//! [`Marker::mark`]. Instead of recursing into the callback for every edge,
//! newly marked blocks are pushed on a worklist and visited in turn, so the
//! depth of the object graph never grows the call stack.

use std::ptr::NonNull;

use crate::header::Header;
use crate::trace::{visit_traced, Trace};
use crate::Gc;

/// Callback that reports the managed references held by a payload.
///
/// It receives the payload pointer of a block that was just marked and must
/// call [`Marker::mark`] on every managed block that payload refers to.
/// Omitting an edge lets the next collection free a block that is still in
/// use.
pub type VisitFn = fn(&mut Marker<'_>, NonNull<u8>);

/// A marked block waiting for its visit callback.
#[derive(Clone, Copy)]
pub(crate) struct Pending {
    ptr: NonNull<u8>,
    visit: VisitFn,
}

/// Marking session handed to visit callbacks.
///
/// Created by [`Heap::mark`](crate::Heap::mark); borrows the heap's worklist
/// so repeated root marking does not reallocate it.
pub struct Marker<'w> {
    worklist: &'w mut Vec<Pending>,
    marked: usize,
}

impl<'w> Marker<'w> {
    pub(crate) fn new(worklist: &'w mut Vec<Pending>) -> Self {
        Self {
            worklist,
            marked: 0,
        }
    }

    /// Marks `ptr` as reachable.
    ///
    /// `None` is ignored. A block that is already marked this cycle is left
    /// alone, so shared and cyclic structures are visited once. Otherwise the
    /// block is marked and, if `visit` is given, queued so that `visit` runs
    /// exactly once with `ptr`. Pass `None` for payloads without managed
    /// references.
    ///
    /// Returns `true` if this call marked the block.
    ///
    /// # Safety
    ///
    /// `ptr`, if present, must be a payload pointer returned by
    /// [`Heap::alloc`](crate::Heap::alloc) that has not been swept.
    pub unsafe fn mark(&mut self, ptr: Option<NonNull<u8>>, visit: Option<VisitFn>) -> bool {
        let Some(ptr) = ptr else {
            return false;
        };
        // SAFETY: caller guarantees `ptr` is a live payload.
        let header = unsafe { Header::from_payload(ptr).as_ptr() };
        // SAFETY: live payloads always have a valid header in front of them.
        unsafe {
            if (*header).marked {
                return false;
            }
            (*header).marked = true;
        }
        self.marked += 1;
        if let Some(visit) = visit {
            self.worklist.push(Pending { ptr, visit });
        }
        true
    }

    /// Marks a typed payload and queues its [`Trace`] implementation.
    ///
    /// # Safety
    ///
    /// Same as [`Marker::mark`]; `value` must come from
    /// [`Heap::alloc_value`](crate::Heap::alloc_value).
    pub unsafe fn mark_value<T: Trace>(&mut self, value: Option<Gc<T>>) -> bool {
        // SAFETY: forwarded contract.
        unsafe { self.mark(value.map(Gc::erase), Some(visit_traced::<T>)) }
    }

    /// Number of blocks this session has marked so far.
    #[must_use]
    pub const fn marked(&self) -> usize {
        self.marked
    }

    /// Runs queued visit callbacks until no marked block is left unvisited.
    pub(crate) fn drain(&mut self) {
        while let Some(Pending { ptr, visit }) = self.worklist.pop() {
            visit(self, ptr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Heap;
    use std::cell::Cell;

    thread_local! {
        static VISITS: Cell<usize> = const { Cell::new(0) };
    }

    fn count_visit(_marker: &mut Marker<'_>, _ptr: NonNull<u8>) {
        VISITS.with(|v| v.set(v.get() + 1));
    }

    #[test]
    fn test_mark_none_is_noop() {
        let mut worklist = Vec::new();
        let mut marker = Marker::new(&mut worklist);
        assert!(!unsafe { marker.mark(None, Some(count_visit)) });
        assert_eq!(marker.marked(), 0);
        assert!(marker.worklist.is_empty());
    }

    #[test]
    fn test_mark_queues_visit_once() {
        VISITS.with(|v| v.set(0));
        let mut heap = Heap::default();
        let block = heap.alloc(16).unwrap();

        let mut worklist = Vec::new();
        let mut marker = Marker::new(&mut worklist);
        assert!(unsafe { marker.mark(Some(block), Some(count_visit)) });
        assert!(!unsafe { marker.mark(Some(block), Some(count_visit)) });
        assert_eq!(marker.worklist.len(), 1);

        marker.drain();
        assert_eq!(VISITS.with(Cell::get), 1);
        assert_eq!(marker.marked(), 1);
        assert!(unsafe { heap.is_marked(block) });
    }

    #[test]
    fn test_leaf_mark_skips_worklist() {
        let mut heap = Heap::default();
        let block = heap.alloc(4).unwrap();

        let mut worklist = Vec::new();
        let mut marker = Marker::new(&mut worklist);
        assert!(unsafe { marker.mark(Some(block), None) });
        assert!(marker.worklist.is_empty());
    }
}
