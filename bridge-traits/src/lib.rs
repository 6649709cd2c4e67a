//! # Host Bridge Traits
//!
//! Capabilities the playback engine needs from its host but cannot provide
//! itself.
//!
//! ## Traits
//!
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//! - [`AudioElement`](playback::AudioElement) - The platform playback element
//!   shared across sounds on constrained devices
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with an actionable message.

pub mod error;
pub mod log;
pub mod playback;

pub use error::BridgeError;

pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{AudioElement, DetachedAudioElement};
