//! GC tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! tracing spans and events for collections and teardown. Without the feature
//! the same functions exist as no-ops so call sites need no `cfg`.

#[cfg(feature = "tracing")]
pub mod internal {
    use tracing::{span, Level};

    use crate::metrics::{CollectStats, HeapStats};

    /// Identifier of one collection on one heap.
    ///
    /// This is the heap's collection counter, so ids restart at 1 for every
    /// heap and correlate the events emitted while that heap sweeps.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Create a span for one sweep.
    pub fn trace_gc_collection(gc_id: GcId) -> span::EnteredSpan {
        span!(Level::DEBUG, "gc_collect", gc_id = gc_id.0).entered()
    }

    /// Log the outcome of a sweep.
    ///
    /// Diagnostic heaps report at `INFO`, others at `TRACE`.
    pub fn log_sweep_end(stats: &CollectStats, diagnostics: bool) {
        if diagnostics {
            tracing::info!(
                objects_reclaimed = stats.objects_reclaimed,
                objects_before = stats.objects_before,
                bytes_reclaimed = stats.bytes_reclaimed,
                bytes_before = stats.bytes_before,
                duration_us = u64::try_from(stats.duration.as_micros()).unwrap_or(u64::MAX),
                "collect statistics"
            );
        } else {
            tracing::trace!(
                objects_reclaimed = stats.objects_reclaimed,
                objects_surviving = stats.objects_surviving,
                "sweep_end"
            );
        }
    }

    /// Log lifetime counters at teardown.
    pub fn log_lifetime(stats: &HeapStats) {
        tracing::info!(
            lifetime_allocs = stats.lifetime_allocs,
            active_allocs = stats.allocs,
            lifetime_bytes = stats.lifetime_bytes,
            active_bytes = stats.bytes,
            "lifetime statistics"
        );
    }

    /// Log blocks left behind after teardown.
    pub fn log_residual(stats: &HeapStats, list_empty: bool) {
        tracing::error!(
            allocs = stats.allocs,
            bytes = stats.bytes,
            list_empty,
            "heap not drained after teardown"
        );
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    use crate::metrics::{CollectStats, HeapStats};

    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Stub function when tracing is disabled.
    pub const fn trace_gc_collection(_gc_id: GcId) {}

    /// Stub function when tracing is disabled.
    pub const fn log_sweep_end(_stats: &CollectStats, _diagnostics: bool) {}

    /// Stub function when tracing is disabled.
    pub const fn log_lifetime(_stats: &HeapStats) {}

    /// Stub function when tracing is disabled.
    pub const fn log_residual(_stats: &HeapStats, _list_empty: bool) {}
}

pub use internal::GcId;
