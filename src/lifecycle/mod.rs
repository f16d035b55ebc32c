//! Lifecycle orchestration of the controller core.
//!
//! This module contains:
//!
//! - **The state machine**: ordered bring-up and tear-down of pipelines, collaborators and plugins
//! - **Configuration**: instance name, default log level, config directory, join timeout
//! - **Plugin context**: the [`CoreHandle`] plugins receive when they are inflated or autodetected
//! - **Observability setup**: initializing `tracing` for substrate diagnostics
//!
//! # Main Components
//!
//! - [`Core`] - The orchestrator that owns all collections and both pipelines
//! - [`CoreBuilder`] - Assembles a `Core` from a [`CoreConfig`], modules and collaborators
//! - [`setup_tracing`] - Initializes the tracing/logging infrastructure

pub mod config;
pub mod core;
pub mod handle;
pub mod tracing;

pub use self::config::*;
pub use self::core::*;
pub use self::handle::*;
pub use self::tracing::*;
