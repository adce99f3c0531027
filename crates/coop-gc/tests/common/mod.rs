//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Arc;

use coop_gc::{overhead, AllocError, BackingAllocator, Global, SCRUB_BYTE};
use parking_lot::{Mutex, MutexGuard};

/// Everything a [`Recording`] allocator observed.
#[derive(Debug, Default)]
pub struct AllocLog {
    /// Block address -> block size, for blocks not yet released.
    pub live: HashMap<usize, usize>,
    /// Addresses in release order.
    pub released: Vec<usize>,
    pub allocations: usize,
    pub double_releases: usize,
    pub unscrubbed_releases: usize,
    /// Fail this many upcoming requests.
    pub failures_pending: usize,
}

/// Backing allocator that records every call; clones share one log, so a
/// test can keep a handle after moving the allocator into a heap.
#[derive(Clone, Default)]
pub struct Recording {
    log: Arc<Mutex<AllocLog>>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, AllocLog> {
        self.log.lock()
    }

    pub fn live(&self) -> usize {
        self.log().live.len()
    }

    /// How many times the block behind `payload` was released.
    pub fn times_released(&self, payload: NonNull<u8>) -> usize {
        let addr = block_addr(payload);
        self.log().released.iter().filter(|&&a| a == addr).count()
    }

    pub fn fail_next(&self, count: usize) {
        self.log().failures_pending = count;
    }
}

impl BackingAllocator for Recording {
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let mut log = self.log.lock();
        if log.failures_pending > 0 {
            log.failures_pending -= 1;
            return Err(AllocError::new(layout));
        }
        let ptr = Global.allocate(layout)?;
        log.allocations += 1;
        log.live.insert(ptr.as_ptr() as usize, layout.size());
        Ok(ptr)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>, layout: Layout) {
        let mut log = self.log.lock();
        let addr = ptr.as_ptr() as usize;
        if log.live.remove(&addr).is_none() {
            log.double_releases += 1;
        }
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), layout.size()) };
        if !bytes.iter().all(|&b| b == SCRUB_BYTE) {
            log.unscrubbed_releases += 1;
        }
        log.released.push(addr);
        unsafe { Global.release(ptr, layout) };
    }
}

/// Address of the block a payload pointer belongs to.
pub fn block_addr(payload: NonNull<u8>) -> usize {
    payload.as_ptr() as usize - overhead()
}
