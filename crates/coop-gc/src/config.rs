//! Heap construction options.

use std::env;

/// Environment variable read by [`HeapConfig::from_env`].
pub const DIAGNOSTICS_ENV: &str = "COOP_GC_DIAGNOSTICS";

/// Options fixed when a heap is created.
///
/// Diagnostics change what the heap lets you observe, never which blocks it
/// keeps or frees. When enabled the heap
///
/// - keeps running and lifetime allocation/byte counters,
/// - overwrites every block with [`SCRUB_BYTE`](crate::SCRUB_BYTE) before
///   releasing it, so stale payload pointers read obvious garbage,
/// - reports a summary per collection and at teardown through `tracing`,
/// - checks at teardown that nothing is left behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapConfig {
    diagnostics: bool,
}

impl HeapConfig {
    /// Default configuration: diagnostics off.
    #[must_use]
    pub const fn new() -> Self {
        Self { diagnostics: false }
    }

    /// Configuration with diagnostics on.
    #[must_use]
    pub const fn debug() -> Self {
        Self { diagnostics: true }
    }

    /// Enables or disables diagnostics.
    #[must_use]
    pub const fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Whether diagnostics are enabled.
    #[must_use]
    pub const fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    /// Reads the configuration from the environment.
    ///
    /// `COOP_GC_DIAGNOSTICS` set to `1`, `true`, `on` or `yes` enables
    /// diagnostics; anything else (or unset) leaves them off.
    #[must_use]
    pub fn from_env() -> Self {
        let diagnostics = env::var(DIAGNOSTICS_ENV)
            .ok()
            .is_some_and(|value| parse_flag(&value));
        Self::new().with_diagnostics(diagnostics)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
