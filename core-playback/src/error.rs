//! # Playback Error Types
//!
//! Error types for sound resolution and transport control.

use crate::resolver::Failure;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// Every attempted connection/URL combination failed.
    ///
    /// `failures` lists the attempts in the order they were made. It is empty
    /// when no connection could play any of the URLs.
    #[error("No playable source: {} attempt(s) failed", failures.len())]
    Exhausted { failures: Vec<Failure> },

    /// A deferred URL list could not be produced.
    #[error("Failed to resolve URLs: {0}")]
    UrlSource(String),

    /// A backend refused to create or load a sound.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The sound did not settle within the configured load timeout.
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// No connection is registered under this name.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// A transport operation needs a current sound and there is none.
    #[error("No current sound")]
    NoCurrentSound,

    /// The sound was torn down and can no longer be controlled.
    #[error("Sound has been torn down: {0}")]
    TornDown(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

impl PlaybackError {
    /// Returns `true` if resolution ran out of strategies.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PlaybackError::Exhausted { .. })
    }

    /// Failures recorded during resolution, if this is an exhaustion error.
    pub fn failures(&self) -> &[Failure] {
        match self {
            PlaybackError::Exhausted { failures } => failures,
            _ => &[],
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
