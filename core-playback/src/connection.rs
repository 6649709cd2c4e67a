//! # Connection Interface
//!
//! A connection is a playback backend (a streaming library wrapper, the
//! platform's native player, the test dummy). It decides which URLs it can
//! handle and creates a [`SoundBackend`] for a URL on request.
//!
//! Connections are activated from configuration through a
//! [`ConnectionRegistry`], which maps configured names to factories.

use crate::connections::DummyConnection;
use crate::error::{PlaybackError, Result};
use crate::shared_audio::SharedAudioAccess;
use crate::sound::{SoundBackend, SoundSignals};
use crate::url::{LoadOptions, SoundUrl};
use async_trait::async_trait;
use core_runtime::config::ConnectionConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a connection needs to create one sound.
pub struct SoundRequest {
    pub url: SoundUrl,
    pub options: LoadOptions,
    /// Present when the sound must play through the shared audio element
    pub shared_audio_access: Option<SharedAudioAccess>,
    /// Where the backend reports readiness and transport changes
    pub signals: SoundSignals,
}

impl fmt::Debug for SoundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundRequest")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("shared_audio_access", &self.shared_audio_access.is_some())
            .finish()
    }
}

/// Playback backend contract.
///
/// `create` returning `Ok` does not mean the sound loaded: the backend
/// signals `ready()` or `load_error()` through the request's
/// [`SoundSignals`], either before returning or later from its own task.
#[async_trait]
pub trait Connection: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backend works in this environment at all.
    fn can_use_connection(&self) -> bool {
        true
    }

    fn can_play_mime_type(&self, _mime_type: &str) -> bool {
        true
    }

    /// Usable, and either the mime type is unknown or the backend accepts it.
    fn can_play(&self, url: &SoundUrl) -> bool {
        if !self.can_use_connection() {
            return false;
        }
        match url.mime_type() {
            Some(mime_type) => self.can_play_mime_type(&mime_type),
            None => true,
        }
    }

    async fn create(&self, request: SoundRequest) -> Result<Box<dyn SoundBackend>>;
}

/// A connection activated from configuration.
#[derive(Clone)]
pub struct ActiveConnection {
    /// Configured name; what `use_connections` refers to
    pub name: String,
    pub config: serde_json::Value,
    pub connection: Arc<dyn Connection>,
}

impl fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

/// Builds a connection from its configuration object.
pub type ConnectionFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Connection>> + Send + Sync>;

/// Maps connection names to factories.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    factories: HashMap<String, ConnectionFactory>,
}

impl ConnectionRegistry {
    /// Registry with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in connections (`DummyConnection`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DummyConnection::NAME, |config| {
            Ok(Arc::new(DummyConnection::from_config(config)?) as Arc<dyn Connection>)
        });
        registry
    }

    /// Registers (or replaces) the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Connection>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registers an already-built connection under `name`, ignoring its config.
    pub fn register_instance(
        &mut self,
        name: impl Into<String>,
        connection: Arc<dyn Connection>,
    ) -> &mut Self {
        self.register(name, move |_| Ok(Arc::clone(&connection)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds the connection configured by `config`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::UnknownConnection`] when nothing is registered under
    /// the configured name, or whatever the factory returns.
    pub fn create(&self, config: &ConnectionConfig) -> Result<ActiveConnection> {
        let factory = self
            .factories
            .get(&config.name)
            .ok_or_else(|| PlaybackError::UnknownConnection(config.name.clone()))?;

        Ok(ActiveConnection {
            name: config.name.clone(),
            config: config.config.clone(),
            connection: factory(&config.config)?,
        })
    }

    /// Instantiates the configured connections, keeping their order.
    ///
    /// Unknown names and failing factories are logged and skipped.
    pub fn activate(&self, configs: &[ConnectionConfig]) -> Vec<ActiveConnection> {
        configs
            .iter()
            .filter_map(|config| match self.create(config) {
                Ok(active) => {
                    debug!(connection = %config.name, "connection activated");
                    Some(active)
                }
                Err(error) => {
                    warn!(connection = %config.name, %error, "skipping connection");
                    None
                }
            })
            .collect()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct PickyConnection {
        usable: bool,
    }

    #[async_trait]
    impl Connection for PickyConnection {
        fn name(&self) -> &str {
            "Picky"
        }

        fn can_use_connection(&self) -> bool {
            self.usable
        }

        fn can_play_mime_type(&self, mime_type: &str) -> bool {
            mime_type == "audio/mpeg"
        }

        async fn create(&self, _request: SoundRequest) -> Result<Box<dyn SoundBackend>> {
            Err(PlaybackError::Backend("not in this test".into()))
        }
    }

    #[test]
    fn default_can_play_checks_known_mime_types() {
        let picky = PickyConnection { usable: true };

        assert!(picky.can_play(&SoundUrl::new("/good/1000/a.mp3")));
        assert!(!picky.can_play(&SoundUrl::new("/good/1000/a.aac")));
        assert!(!picky.can_play(&SoundUrl::with_mime_type("/good/1000/a.mp3", "audio/aac")));
    }

    #[test]
    fn unknown_mime_type_fails_open() {
        let picky = PickyConnection { usable: true };
        assert!(picky.can_play(&SoundUrl::new("/good/1000/test")));
    }

    #[test]
    fn unusable_connection_plays_nothing() {
        let picky = PickyConnection { usable: false };
        assert!(!picky.can_play(&SoundUrl::new("/good/1000/a.mp3")));
        assert!(!picky.can_play(&SoundUrl::new("/good/1000/test")));
    }

    #[test]
    fn activate_keeps_order_and_skips_unknown_names() {
        let mut registry = ConnectionRegistry::with_defaults();
        registry.register_instance("Picky", Arc::new(PickyConnection { usable: true }));

        let active = registry.activate(&[
            ConnectionConfig::new("Picky", json!({})),
            ConnectionConfig::new("Missing", json!({})),
            ConnectionConfig::new("DummyConnection", json!({"tick_ms": 10})),
        ]);

        let names: Vec<_> = active.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Picky", "DummyConnection"]);
        assert_eq!(active[1].config, json!({"tick_ms": 10}));
    }

    #[test]
    fn create_reports_unknown_names() {
        let registry = ConnectionRegistry::with_defaults();
        let error = registry
            .create(&ConnectionConfig::new("Missing", json!({})))
            .unwrap_err();
        assert!(matches!(error, PlaybackError::UnknownConnection(name) if name == "Missing"));
    }

    #[test]
    fn failing_factory_is_skipped() {
        let mut registry = ConnectionRegistry::new();
        registry.register("Broken", |_| {
            Err(PlaybackError::Backend("missing library".into()))
        });

        assert!(registry
            .activate(&[ConnectionConfig::new("Broken", json!({}))])
            .is_empty());
        assert!(registry.contains("Broken"));
    }
}
