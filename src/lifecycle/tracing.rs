//! # Observability & Tracing
//!
//! Two separate logging paths exist in this crate:
//!
//! - The **Log Pipeline** carries operator-facing lines (`"Starting up workers..."`)
//!   to log-capable frontends. It is part of the product.
//! - **`tracing`** carries developer diagnostics about the substrate itself:
//!   dispatcher start/exit, join timeouts, discarded partial lines, registry freezes.
//!
//! The [`setup_tracing`] function initializes the second path with the
//! `tracing` crate.
//!
//! ## Configuration
//!
//! The subscriber uses a compact format that hides the crate/module prefix
//! (`with_target(false)`) and honours the `RUST_LOG` environment variable.
//!
//! ```bash
//! # Dispatcher lifecycle only
//! RUST_LOG=info cargo test
//!
//! # Also show registry, snapshot and join details
//! RUST_LOG=debug cargo test
//!
//! # Filter to one module
//! RUST_LOG=hashvisor::pipeline=debug cargo test
//! ```
//!
//! ## What Gets Traced
//!
//! Every event carries structured fields instead of interpolated text:
//!
//! ```text
//! INFO Dispatcher started pipeline="log"
//! DEBUG Registered class type_tag="worksourcegroup" kind=work source id=1
//! WARN Dispatcher did not exit in time, detaching pipeline="event" timeout=10s
//! INFO Dispatcher stopped pipeline="log" delivered=42
//! ```

/// Installs the global subscriber. Panics if one is already installed.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but a no-op when a subscriber is already installed.
///
/// Safe to call from every test.
pub fn try_setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init();
}
