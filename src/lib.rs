#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # hashvisor
//!
//! > **The control core of a pluggable hashing-worker controller.**
//!
//! This crate owns the lifecycle of a dynamically discovered set of plugins
//! (frontends, workers, work sources, blockchains), multiplexes their log and
//! telemetry output through two asynchronous dispatcher pipelines, and
//! persists/restores the whole plugin graph across restarts.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Plugins as trait objects
//! Every plugin kind is a trait ([`Frontend`](framework::Frontend),
//! [`Worker`](framework::Worker), [`Blockchain`](framework::Blockchain),
//! [`WorkSource`](framework::WorkSource)) sharing the
//! [`Plugin`](framework::Plugin) supertrait. Capabilities such as "can log"
//! are trait methods, not attributes probed at runtime.
//!
//! ### One dispatcher task per pipeline
//! Log lines and events are pushed onto unbounded channels and fanned out by a
//! dedicated Tokio task each. Producers never block. Stopping a pipeline
//! closes its channel; the task drains what is left and exits.
//!
//! ### Failure isolation everywhere
//! A plugin that fails to load, start, stop, log or handle an event is logged
//! and skipped. Nothing propagates out of a lifecycle transition.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Type-Safe Error Handling
//! Each seam has its own `thiserror` enum: [`PluginError`](framework::PluginError),
//! [`RegistryError`](framework::RegistryError),
//! [`PersistenceError`](framework::PersistenceError) and
//! [`CoreError`](framework::CoreError).
//!
//! ### 2. Two locks, one order
//! A wide async lock serializes start/stop with lifecycle-coupled mutations.
//! Each collection has a narrow lock that is only ever taken inside it.
//!
//! ### 3. Tagged persistence
//! Plugins deflate to tagged records; inflating dispatches on the tag through
//! the [`registry`]. A snapshot is restored completely or not at all.
//!
//! ### 4. Observability
//! Operator-facing output goes through the Log Pipeline. Diagnostics of the
//! substrate itself use `tracing`; see [`lifecycle::tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Contracts ([`framework`])
//! - **Role**: Plugin traits, settings, statistics and error types.
//! - **Testing**: [`framework::mock`] provides scriptable plugins.
//!
//! ### 2. The Orchestrator ([`lifecycle`])
//! - **Role**: The start/stop state machine and the collection APIs.
//! - **Key items**: [`Core`](lifecycle::Core), [`CoreBuilder`](lifecycle::CoreBuilder).
//!
//! ### 3. The Pipelines ([`pipeline`])
//! - **Role**: Line-buffered logging, event dispatch, output redirection.
//!
//! ### 4. Discovery & Persistence ([`registry`], [`persistence`])
//! - **Role**: Class identifiers, module loading, snapshot encode/decode.
//!
//! ### 5. Building Blocks ([`collections`], [`worksource`], [`work`])
//! - **Role**: Guarded collections, the work source group, collaborator traits.
//!
//! ## 🚀 Quick Start
//!
//! ```ignore
//! hashvisor::lifecycle::setup_tracing();
//! let core = CoreBuilder::new(CoreConfig::new("default")).build();
//! core.start().await?;
//! // ...
//! core.stop().await;
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod collections;
pub mod framework;
pub mod lifecycle;
pub mod persistence;
pub mod pipeline;
pub mod registry;
pub mod work;
pub mod worksource;

#[doc(hidden)]
pub use inventory;
