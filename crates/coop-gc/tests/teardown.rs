//! Tests for heap teardown and drop.

mod common;

use common::Recording;
use coop_gc::{overhead, Heap, HeapConfig};

#[test]
fn test_teardown_drains_unmarked_heap() {
    let recording = Recording::new();
    let mut heap = Heap::with_config(recording.clone(), HeapConfig::debug());
    for size in [1, 2, 4, 8, 16, 32, 64] {
        heap.alloc(size).unwrap();
    }
    assert_eq!(recording.live(), 7);

    let report = heap.teardown();
    assert_eq!(report.first_pass.objects_reclaimed, 7);
    assert_eq!(report.second_pass.objects_before, 0);
    assert_eq!(report.lifetime.allocs, 7);
    assert_eq!(report.bytes_reclaimed(), 127 + 7 * overhead());

    let log = recording.log();
    assert!(log.live.is_empty());
    assert_eq!(log.released.len(), 7);
    assert_eq!(log.double_releases, 0);
}

/// A block left marked when the heap goes away survives the first teardown
/// sweep (which only unmarks it) and is freed by the second.
#[test]
fn test_teardown_right_after_marking() {
    let recording = Recording::new();
    let mut heap = Heap::with_config(recording.clone(), HeapConfig::debug());
    let marked = heap.alloc(24).unwrap();
    let unmarked = heap.alloc(24).unwrap();
    unsafe { heap.mark(Some(marked), None) };

    let report = heap.teardown();

    assert_eq!(report.first_pass.objects_surviving, 1);
    assert_eq!(report.first_pass.objects_reclaimed, 1);
    assert_eq!(report.second_pass.objects_before, 1);
    assert_eq!(report.second_pass.objects_reclaimed, 1);
    assert_eq!(report.objects_reclaimed(), 2);

    assert_eq!(recording.times_released(marked), 1);
    assert_eq!(recording.times_released(unmarked), 1);
    assert_eq!(recording.live(), 0);
}

#[test]
fn test_drop_releases_everything() {
    let recording = Recording::new();
    {
        let mut heap = Heap::new(recording.clone());
        let a = heap.alloc(8).unwrap();
        heap.alloc(8).unwrap();
        unsafe { heap.mark(Some(a), None) };
    }
    let log = recording.log();
    assert!(log.live.is_empty());
    assert_eq!(log.released.len(), 2);
}

#[test]
fn test_teardown_after_several_cycles() {
    let recording = Recording::new();
    let mut heap = Heap::with_config(recording.clone(), HeapConfig::debug());
    let root = heap.alloc(8).unwrap();

    for _ in 0..5 {
        heap.alloc(32).unwrap();
        unsafe { heap.mark(Some(root), None) };
        heap.collect();
    }
    assert_eq!(heap.stats().allocs, 1);
    assert_eq!(heap.stats().lifetime_allocs, 6);

    let report = heap.teardown();
    assert_eq!(report.objects_reclaimed(), 1);
    assert_eq!(recording.log().allocations, 6);
    assert_eq!(recording.live(), 0);
}

#[test]
fn test_empty_heap_teardown() {
    let heap = Heap::with_config(Recording::new(), HeapConfig::debug());
    let report = heap.teardown();
    assert_eq!(report.objects_reclaimed(), 0);
    assert_eq!(report.lifetime.lifetime_allocs, 0);
}

#[test]
fn test_teardown_report_display() {
    let mut heap = Heap::with_config(Recording::new(), HeapConfig::debug());
    heap.alloc(0).unwrap();
    let report = heap.teardown();
    let expected = format!(
        "lifetime statistics:\nallocs: 1 (1 active)\nbytes:  {o} ({o} active)\nreleased 1 allocs, {o} bytes",
        o = overhead()
    );
    assert_eq!(report.to_string(), expected);
}
