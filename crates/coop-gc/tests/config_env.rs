//! Reading the diagnostics switch from the environment.
//!
//! Kept in its own test binary with a single test: it is the only code that
//! changes process-wide environment variables.

use coop_gc::{Heap, HeapConfig, Malloc, DIAGNOSTICS_ENV};

#[test]
fn test_config_from_env() {
    std::env::set_var(DIAGNOSTICS_ENV, "on");
    let config = HeapConfig::from_env();
    assert!(config.diagnostics());

    let mut heap = Heap::with_config(Malloc, config);
    heap.alloc(8).unwrap();
    assert_eq!(heap.stats().allocs, 1);
    drop(heap);

    std::env::set_var(DIAGNOSTICS_ENV, "0");
    assert!(!HeapConfig::from_env().diagnostics());

    std::env::remove_var(DIAGNOSTICS_ENV);
    assert!(!HeapConfig::from_env().diagnostics());
}
