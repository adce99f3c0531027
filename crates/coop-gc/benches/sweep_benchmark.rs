//! Benchmark: sweep cost with different survivor ratios and allocators.

use std::hint::black_box;
use std::mem;

use coop_gc::{overhead, Gc, Heap, Marker, PoolAllocator, Trace};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

#[derive(Clone, Copy)]
struct Node {
    value: i64,
    next: Option<Gc<Node>>,
}

unsafe impl Trace for Node {
    fn trace(&self, marker: &mut Marker<'_>) {
        self.next.trace(marker);
    }
}

/// Allocates `count` nodes, linking every `keep_every`-th one into a list
/// rooted at the returned handle.
fn populate<A: coop_gc::BackingAllocator>(
    heap: &mut Heap<A>,
    count: usize,
    keep_every: usize,
) -> Option<Gc<Node>> {
    let mut root = None;
    for i in 0..count {
        let node = heap
            .alloc_value(Node {
                value: i as i64,
                next: None,
            })
            .unwrap();
        if i % keep_every == 0 {
            root = Some(
                heap.alloc_value(Node {
                    value: i as i64,
                    next: root,
                })
                .unwrap(),
            );
        }
        black_box(node);
    }
    root
}

fn bench_collect_malloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_malloc");
    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut heap = Heap::default();
                let root = populate(&mut heap, count, 10);
                unsafe { heap.mark_value(root) };
                black_box(heap.collect());
            });
        });
    }
    group.finish();
}

fn bench_collect_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_pool");
    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut heap = Heap::new(PoolAllocator::new(mem::size_of::<Node>() + overhead()));
                let root = populate(&mut heap, count, 10);
                unsafe { heap.mark_value(root) };
                black_box(heap.collect());
            });
        });
    }
    group.finish();
}

fn bench_steady_state(c: &mut Criterion) {
    c.bench_function("steady_state_1000_live", |b| {
        let mut heap = Heap::default();
        let root = populate(&mut heap, 10_000, 10);
        b.iter(|| {
            for i in 0..100 {
                black_box(
                    heap.alloc_value(Node {
                        value: i,
                        next: None,
                    })
                    .unwrap(),
                );
            }
            unsafe { heap.mark_value(root) };
            black_box(heap.collect());
        });
    });
}

criterion_group!(
    benches,
    bench_collect_malloc,
    bench_collect_pool,
    bench_steady_state
);
criterion_main!(benches);
