//! Allocation counters and collection statistics.
//!
//! All byte counts include the per-block [`overhead`](crate::overhead).

use std::fmt;
use std::time::Duration;

/// Running and lifetime allocation counters of a heap.
///
/// Only maintained when the heap was created with diagnostics enabled;
/// otherwise every field stays zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Blocks currently live.
    pub allocs: usize,
    /// Bytes currently live.
    pub bytes: usize,
    /// Blocks allocated since the heap was created.
    pub lifetime_allocs: usize,
    /// Bytes allocated since the heap was created.
    pub lifetime_bytes: usize,
}

impl HeapStats {
    /// Create a new `HeapStats` with all counters set to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allocs: 0,
            bytes: 0,
            lifetime_allocs: 0,
            lifetime_bytes: 0,
        }
    }

    pub(crate) const fn record_alloc(&mut self, size: usize) {
        self.allocs += 1;
        self.bytes += size;
        self.lifetime_allocs += 1;
        self.lifetime_bytes += size;
    }

    pub(crate) const fn record_free(&mut self, size: usize) {
        self.allocs -= 1;
        self.bytes -= size;
    }

    /// Returns `true` if no block is accounted as live.
    #[must_use]
    pub const fn is_drained(&self) -> bool {
        self.allocs == 0 && self.bytes == 0
    }
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "allocs: {} ({} active)", self.lifetime_allocs, self.allocs)?;
        write!(f, "bytes:  {} ({} active)", self.lifetime_bytes, self.bytes)
    }
}

/// Statistics from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Sequence number of this collection on its heap, starting at 1.
    pub cycle: u64,
    /// Blocks on the live list when the sweep started.
    pub objects_before: usize,
    /// Bytes on the live list when the sweep started.
    pub bytes_before: usize,
    /// Blocks released.
    pub objects_reclaimed: usize,
    /// Bytes released.
    pub bytes_reclaimed: usize,
    /// Blocks kept because they were marked.
    pub objects_surviving: usize,
    /// Bytes kept because they were marked.
    pub bytes_surviving: usize,
    /// Wall-clock time spent sweeping.
    pub duration: Duration,
}

impl CollectStats {
    pub(crate) const fn record_survivor(&mut self, size: usize) {
        self.objects_before += 1;
        self.bytes_before += size;
        self.objects_surviving += 1;
        self.bytes_surviving += size;
    }

    pub(crate) const fn record_reclaimed(&mut self, size: usize) {
        self.objects_before += 1;
        self.bytes_before += size;
        self.objects_reclaimed += 1;
        self.bytes_reclaimed += size;
    }
}

impl fmt::Display for CollectStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "allocs: {} (of {})",
            self.objects_reclaimed, self.objects_before
        )?;
        write!(f, "bytes:  {} (of {})", self.bytes_reclaimed, self.bytes_before)
    }
}

/// What a heap released while being torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Counters as they stood before the final sweeps.
    pub lifetime: HeapStats,
    /// First sweep: frees every unmarked block and unmarks the rest.
    pub first_pass: CollectStats,
    /// Second sweep: frees whatever the first pass kept.
    pub second_pass: CollectStats,
}

impl TeardownReport {
    /// Total blocks released across both passes.
    #[must_use]
    pub const fn objects_reclaimed(&self) -> usize {
        self.first_pass.objects_reclaimed + self.second_pass.objects_reclaimed
    }

    /// Total bytes released across both passes.
    #[must_use]
    pub const fn bytes_reclaimed(&self) -> usize {
        self.first_pass.bytes_reclaimed + self.second_pass.bytes_reclaimed
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lifetime statistics:")?;
        writeln!(f, "{}", self.lifetime)?;
        write!(
            f,
            "released {} allocs, {} bytes",
            self.objects_reclaimed(),
            self.bytes_reclaimed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_stats_accounting() {
        let mut stats = HeapStats::new();
        stats.record_alloc(40);
        stats.record_alloc(72);
        stats.record_free(40);

        assert_eq!(stats.allocs, 1);
        assert_eq!(stats.bytes, 72);
        assert_eq!(stats.lifetime_allocs, 2);
        assert_eq!(stats.lifetime_bytes, 112);
        assert!(!stats.is_drained());

        stats.record_free(72);
        assert!(stats.is_drained());
        assert_eq!(stats.lifetime_allocs, 2);
    }

    #[test]
    fn test_collect_stats_display() {
        let mut stats = CollectStats::default();
        stats.record_reclaimed(64);
        stats.record_survivor(48);
        stats.record_survivor(40);

        assert_eq!(stats.objects_before, 3);
        assert_eq!(stats.bytes_surviving, 88);
        assert_eq!(stats.to_string(), "allocs: 1 (of 3)\nbytes:  64 (of 152)");
    }

    #[test]
    fn test_heap_stats_display() {
        let stats = HeapStats {
            allocs: 1,
            bytes: 48,
            lifetime_allocs: 5,
            lifetime_bytes: 240,
        };
        assert_eq!(
            stats.to_string(),
            "allocs: 5 (1 active)\nbytes:  240 (48 active)"
        );
    }
}
