//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback crates:
//! - Logging and tracing bootstrap
//! - Engine configuration
//! - Typed event bus
//!
//! ## Overview
//!
//! Nothing in here knows about sounds or connections. The playback crate
//! builds on these pieces: it reads a [`CoreConfig`](config::CoreConfig),
//! publishes its events on an [`EventBus`](events::EventBus) and logs through
//! `tracing`, which [`init_logging`](logging::init_logging) wires to stdout and
//! to an optional host sink.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ConnectionConfig, CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{EventBus, EventStream};
