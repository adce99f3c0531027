//! Integration tests for GC tracing feature.
//!
//! These tests install a thread-local subscriber that writes into a buffer
//! and check the events emitted by collections and teardown.

#![cfg(feature = "tracing")]

use std::io;
use std::sync::Arc;

use coop_gc::{Heap, HeapConfig, Malloc};
use parking_lot::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture(level: LevelFilter, body: impl FnOnce()) -> String {
    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    {
        let _guard = subscriber.set_default();
        body();
    }
    buffer.contents()
}

#[test]
fn test_diagnostic_collect_reports_statistics() {
    let output = capture(LevelFilter::INFO, || {
        let mut heap = Heap::with_config(Malloc, HeapConfig::debug());
        let keep = heap.alloc(8).unwrap();
        heap.alloc(8).unwrap();
        unsafe { heap.mark(Some(keep), None) };
        heap.collect();
    });

    assert!(output.contains("collect statistics"), "{output}");
    assert!(output.contains("objects_reclaimed=1"), "{output}");
    assert!(output.contains("objects_before=2"), "{output}");
}

#[test]
fn test_teardown_reports_lifetime() {
    let output = capture(LevelFilter::INFO, || {
        let mut heap = Heap::with_config(Malloc, HeapConfig::debug());
        heap.alloc(8).unwrap();
        heap.alloc(8).unwrap();
        drop(heap);
    });

    assert!(output.contains("lifetime statistics"), "{output}");
    assert!(output.contains("lifetime_allocs=2"), "{output}");
}

#[test]
fn test_quiet_heap_stays_below_info() {
    let output = capture(LevelFilter::INFO, || {
        let mut heap = Heap::default();
        heap.alloc(8).unwrap();
        heap.collect();
    });

    assert!(output.is_empty(), "{output}");
}

#[test]
fn test_sweep_span_carries_gc_id() {
    let output = capture(LevelFilter::TRACE, || {
        let mut heap = Heap::default();
        heap.alloc(8).unwrap();
        heap.collect();
        heap.collect();
    });

    assert!(output.contains("sweep_end"), "{output}");
    assert!(output.contains("gc_id=2"), "{output}");
}
