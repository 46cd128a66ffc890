//! Tracing initialization helpers.
//!
//! The engine logs through `tracing`; embedding applications own the global
//! subscriber. [`init`] wires a sensible default for binaries and examples:
//! fmt output filtered by `RUST_LOG`, falling back to `info` for this crate.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a fmt subscriber honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops when a global
/// subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ductwork=info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init();
        super::init();
    }
}
