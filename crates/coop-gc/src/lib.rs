//! An explicit, cooperative mark-sweep collector.
//!
//! `coop-gc` is meant to be embedded in an interpreter or VM that knows its
//! own roots. The collector never scans stacks or registers: the host tells it
//! which blocks are reachable by marking its roots, and supplies visit
//! callbacks that mark the references stored inside each block. A collection
//! then frees every block that was not marked since the previous one.
//!
//! # Pieces
//!
//! - A [`BackingAllocator`] supplies raw memory. [`Malloc`] is the default;
//!   [`PoolAllocator`] serves fixed-size slots from page mappings.
//! - Every block carries a small header (see [`overhead`]) linking it into the
//!   heap's live list and holding its mark flag.
//! - [`Heap`] owns the list and the allocator: [`Heap::alloc`],
//!   [`Heap::mark`], [`Heap::collect`] and [`Heap::teardown`].
//! - [`Marker`] is the marking session visit callbacks receive.
//!
//! # Quick Start
//!
//! ```
//! use std::ptr::NonNull;
//! use coop_gc::{Heap, Marker};
//!
//! // A cons cell: two pointers to other managed blocks.
//! #[repr(C)]
//! struct Cons {
//!     car: Option<NonNull<u8>>,
//!     cdr: Option<NonNull<u8>>,
//! }
//!
//! fn visit_cons(marker: &mut Marker<'_>, ptr: NonNull<u8>) {
//!     let cell = unsafe { ptr.cast::<Cons>().as_ref() };
//!     unsafe {
//!         marker.mark(cell.car, None);
//!         marker.mark(cell.cdr, Some(visit_cons));
//!     }
//! }
//!
//! let mut heap = Heap::default();
//! let atom = heap.alloc(16)?;
//! let cell = heap.alloc(std::mem::size_of::<Cons>())?;
//! unsafe {
//!     cell.cast::<Cons>().as_ptr().write(Cons { car: Some(atom), cdr: None });
//! }
//! let _garbage = heap.alloc(64)?;
//!
//! // Each cycle: mark the roots, then collect.
//! unsafe { heap.mark(Some(cell), Some(visit_cons)) };
//! let stats = heap.collect();
//! assert_eq!(stats.objects_surviving, 2);
//! assert_eq!(stats.objects_reclaimed, 1);
//! # Ok::<(), coop_gc::AllocError>(())
//! ```
//!
//! # Host contract
//!
//! - Mark every root before every [`Heap::collect`].
//! - Visit callbacks must mark every managed reference a payload holds.
//! - A payload pointer not marked during a cycle is dangling once that
//!   cycle's collection returns.
//!
//! # Thread Safety
//!
//! A `Heap` is single-threaded: it may move between threads but must not be
//! used from two at once. [`SharedHeap`] wraps one in a mutex for hosts that
//! need to share it.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod header;
mod heap;
mod mark;
mod metrics;
mod ptr;
mod shared;
mod trace;

/// GC tracing spans and events.
pub mod tracing;

pub use config::{HeapConfig, DIAGNOSTICS_ENV};
pub use header::{overhead, PAYLOAD_ALIGN, SCRUB_BYTE};
pub use heap::Heap;
pub use mark::{Marker, VisitFn};
pub use metrics::{CollectStats, HeapStats, TeardownReport};
pub use ptr::Gc;
pub use shared::SharedHeap;
pub use trace::Trace;

pub use sys_alloc::{AllocError, BackingAllocator, Global, Malloc, PoolAllocator};
