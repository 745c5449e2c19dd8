// ABOUTME: Tracing subscriber setup for structured fleet logs.
// ABOUTME: Filter comes from RUST_LOG, defaulting to info.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Quietly does nothing if a global subscriber is already set, so tests and
/// embedding applications can call it unconditionally.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
