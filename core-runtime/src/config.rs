//! # Core Configuration Module
//!
//! Settings for the playback engine.
//!
//! ## Overview
//!
//! A `CoreConfig` is built with [`CoreConfig::builder`] (or deserialized from
//! JSON) and validated before any player uses it. It names the connections to
//! activate, in priority order, together with each connection's own options,
//! and tunes the device profile, the position poller and the sound cache.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .connection("DummyConnection", serde_json::json!({}))
//!     .poll_interval(Duration::from_millis(250))
//!     .default_volume(80)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.connections[0].name, "DummyConnection");
//! ```
//!
//! ## Error Handling
//!
//! `build()` and `validate()` return [`Error::Config`] with an actionable
//! message:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! CoreConfig::builder()
//!     .default_volume(150)
//!     .build()
//!     .expect("volume is out of range");
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::log::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_NATIVE_CONNECTION: &str = "NativeAudio";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_VOLUME: u8 = 100;
pub const DEFAULT_SOUND_CACHE_CAPACITY: usize = 100;

/// One configured connection: its registered name plus backend-specific options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ConnectionConfig {
    pub fn new(name: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// Core configuration for the playback engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Connections to activate, highest priority first
    pub connections: Vec<ConnectionConfig>,

    /// Verbose logging
    pub debug: bool,

    /// Route every sound through the shared audio element, even on desktop
    pub always_use_single_audio_element: bool,

    /// Device profile: prefer the native connection and share one element
    pub is_mobile_device: bool,

    /// Name of the platform-native connection tried first on mobile
    pub native_connection: String,

    /// Position polling period of the current sound, in milliseconds
    pub poll_interval_ms: u64,

    /// Volume applied to sounds before anyone sets one (0-100)
    pub default_volume: u8,

    /// Maximum number of resolved sounds kept in the cache
    pub sound_cache_capacity: usize,

    /// Give up on an attempt whose sound has not settled within this many
    /// milliseconds. `None` waits indefinitely.
    pub load_timeout_ms: Option<u64>,

    /// Per-subscriber buffer of the player event bus
    pub event_buffer_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            debug: false,
            always_use_single_audio_element: false,
            is_mobile_device: false,
            native_connection: DEFAULT_NATIVE_CONNECTION.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_volume: DEFAULT_VOLUME,
            sound_cache_capacity: DEFAULT_SOUND_CACHE_CAPACITY,
            load_timeout_ms: None,
            event_buffer_size: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Parses and validates a JSON document.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CoreConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid configuration document: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// Logging setup matching this configuration's `debug` flag.
    pub fn logging_config(&self) -> LoggingConfig {
        let level = if self.debug {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        LoggingConfig::default().with_level(level)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Default volume is within 0-100
    /// - Poll interval, cache capacity and event buffer are non-zero
    /// - Connection names are non-empty and unique
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 100 {
            return Err(Error::Config(format!(
                "Default volume must be between 0 and 100, got {}",
                self.default_volume
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "Poll interval must be greater than 0ms".to_string(),
            ));
        }

        if self.sound_cache_capacity == 0 {
            return Err(Error::Config(
                "Sound cache capacity must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.load_timeout_ms == Some(0) {
            return Err(Error::Config(
                "Load timeout must be greater than 0ms. Leave it unset to wait indefinitely."
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for connection in &self.connections {
            if connection.name.trim().is_empty() {
                return Err(Error::Config(
                    "Connection name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(connection.name.as_str()) {
                return Err(Error::Config(format!(
                    "Connection '{}' is configured more than once",
                    connection.name
                )));
            }
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    connections: Vec<ConnectionConfig>,
    debug: bool,
    always_use_single_audio_element: bool,
    is_mobile_device: bool,
    native_connection: Option<String>,
    poll_interval: Option<Duration>,
    default_volume: Option<u8>,
    sound_cache_capacity: Option<usize>,
    load_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Appends a connection; earlier connections have higher priority.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let config = CoreConfig::builder()
    ///     .connection("NativeAudio", serde_json::json!({}))
    ///     .connection("DummyConnection", serde_json::json!({"volume": 50}))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.connections.len(), 2);
    /// ```
    pub fn connection(mut self, name: impl Into<String>, config: serde_json::Value) -> Self {
        self.connections.push(ConnectionConfig::new(name, config));
        self
    }

    /// Replaces the connection list.
    pub fn connections(mut self, connections: Vec<ConnectionConfig>) -> Self {
        self.connections = connections;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn always_use_single_audio_element(mut self, enabled: bool) -> Self {
        self.always_use_single_audio_element = enabled;
        self
    }

    pub fn is_mobile_device(mut self, mobile: bool) -> Self {
        self.is_mobile_device = mobile;
        self
    }

    /// Default: `"NativeAudio"`
    pub fn native_connection(mut self, name: impl Into<String>) -> Self {
        self.native_connection = Some(name.into());
        self
    }

    /// Default: 500ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Default: 100
    pub fn default_volume(mut self, volume: u8) -> Self {
        self.default_volume = Some(volume);
        self
    }

    /// Default: 100 sounds
    pub fn sound_cache_capacity(mut self, capacity: usize) -> Self {
        self.sound_cache_capacity = Some(capacity);
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::default();

        let config = CoreConfig {
            connections: self.connections,
            debug: self.debug,
            always_use_single_audio_element: self.always_use_single_audio_element,
            is_mobile_device: self.is_mobile_device,
            native_connection: self
                .native_connection
                .unwrap_or(defaults.native_connection),
            poll_interval_ms: self
                .poll_interval
                .map(|d| d.as_millis() as u64)
                .unwrap_or(defaults.poll_interval_ms),
            default_volume: self.default_volume.unwrap_or(defaults.default_volume),
            sound_cache_capacity: self
                .sound_cache_capacity
                .unwrap_or(defaults.sound_cache_capacity),
            load_timeout_ms: self.load_timeout.map(|d| d.as_millis() as u64),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
        };

        config.validate()?;

        Ok(config)
    }
}
