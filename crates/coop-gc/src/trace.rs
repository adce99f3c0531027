//! Trace trait for typed payloads.
//!
//! Hosts that store Rust values in the heap can implement [`Trace`] instead of
//! writing visit callbacks by hand. [`Heap::mark_value`](crate::Heap::mark_value)
//! and [`Marker::mark_value`] register a visit callback monomorphized for the
//! value's type.

use std::cell::Cell;
use std::ptr::NonNull;

use crate::mark::Marker;
use crate::Gc;

// ============================================================================
// Core Trait
// ============================================================================

/// A type whose managed references can be reported to a [`Marker`].
///
/// # Safety
///
/// Implementations **MUST** report every `Gc<T>` they hold by calling
/// `trace` on it (or [`Marker::mark_value`] directly). A missed edge lets the
/// next collection free a block that is still referenced.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use coop_gc::{Gc, Marker, Trace};
///
/// struct Pair {
///     head: i64,
///     tail: Cell<Option<Gc<Pair>>>,
/// }
///
/// unsafe impl Trace for Pair {
///     fn trace(&self, marker: &mut Marker<'_>) {
///         self.tail.trace(marker);
///     }
/// }
/// ```
pub unsafe trait Trace {
    /// Report all managed references held by `self`.
    fn trace(&self, marker: &mut Marker<'_>);
}

/// Visit callback registered for payloads of type `T`.
pub(crate) fn visit_traced<T: Trace>(marker: &mut Marker<'_>, ptr: NonNull<u8>) {
    // SAFETY: only registered through `mark_value::<T>`, whose caller promises
    // the payload holds an initialized `T`.
    let value = unsafe { ptr.cast::<T>().as_ref() };
    value.trace(marker);
}

// ============================================================================
// Managed references
// ============================================================================

unsafe impl<T: Trace> Trace for Gc<T> {
    fn trace(&self, marker: &mut Marker<'_>) {
        // SAFETY: a handle reachable from a payload being traced is live for
        // this cycle; that is the host contract for every stored handle.
        unsafe {
            marker.mark_value(Some(*self));
        }
    }
}

// ============================================================================
// Containers
// ============================================================================

unsafe impl<T: Trace> Trace for Option<T> {
    fn trace(&self, marker: &mut Marker<'_>) {
        if let Some(value) = self {
            value.trace(marker);
        }
    }
}

unsafe impl<T: Trace + Copy> Trace for Cell<T> {
    fn trace(&self, marker: &mut Marker<'_>) {
        self.get().trace(marker);
    }
}

unsafe impl<T: Trace, const N: usize> Trace for [T; N] {
    fn trace(&self, marker: &mut Marker<'_>) {
        for value in self {
            value.trace(marker);
        }
    }
}

unsafe impl<A: Trace, B: Trace> Trace for (A, B) {
    fn trace(&self, marker: &mut Marker<'_>) {
        self.0.trace(marker);
        self.1.trace(marker);
    }
}

unsafe impl<A: Trace, B: Trace, C: Trace> Trace for (A, B, C) {
    fn trace(&self, marker: &mut Marker<'_>) {
        self.0.trace(marker);
        self.1.trace(marker);
        self.2.trace(marker);
    }
}

// ============================================================================
// Leaf types
// ============================================================================

macro_rules! impl_trace_leaf {
    ($($t:ty),* $(,)?) => {
        $(
            unsafe impl Trace for $t {
                #[inline]
                fn trace(&self, _marker: &mut Marker<'_>) {}
            }
        )*
    };
}

impl_trace_leaf!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Heap;

    struct Node {
        value: u32,
        next: Cell<Option<Gc<Node>>>,
    }

    unsafe impl Trace for Node {
        fn trace(&self, marker: &mut Marker<'_>) {
            self.next.trace(marker);
        }
    }

    #[test]
    fn test_chain_is_traced() {
        let mut heap = Heap::default();
        let tail = heap
            .alloc_value(Node {
                value: 2,
                next: Cell::new(None),
            })
            .unwrap();
        let head = heap
            .alloc_value(Node {
                value: 1,
                next: Cell::new(Some(tail)),
            })
            .unwrap();
        let _garbage = heap.alloc_value(7u64).unwrap();

        unsafe { heap.mark_value(Some(head)) };
        let stats = heap.collect();

        assert_eq!(stats.objects_surviving, 2);
        assert_eq!(stats.objects_reclaimed, 1);
        unsafe {
            assert_eq!(head.get().value, 1);
            let next = head.get().next.get().unwrap();
            assert_eq!(next, tail);
            assert_eq!(next.get().value, 2);
        }
    }

    #[test]
    fn test_tuple_and_array_edges() {
        let mut heap = Heap::default();
        let a = heap.alloc_value(1u8).unwrap();
        let b = heap.alloc_value(2u8).unwrap();
        let c = heap.alloc_value(3u8).unwrap();
        let holder = heap.alloc_value(([Some(a), None], (b, 0u32))).unwrap();
        let _unreferenced = c;

        unsafe { heap.mark_value(Some(holder)) };
        let stats = heap.collect();
        assert_eq!(stats.objects_surviving, 3);
        assert_eq!(stats.objects_reclaimed, 1);
    }
}
