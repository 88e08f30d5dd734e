//! Tracing and logging setup shared by every binary and test harness.

/// Initialize process-wide logging: JSON lines, filtered by `RUST_LOG` (default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Initialize logging for tests: human-readable output routed through the test
/// harness capture, filtered by `RUST_LOG` (default `warn`).
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Subscriber configuration (filters, formatters).
pub mod tracing;
