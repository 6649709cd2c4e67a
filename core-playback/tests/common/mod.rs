//! Scripted connection shared by the integration tests.
//!
//! Behaviour is driven by the URL:
//! - contains `bad`: the sound signals `load_error`
//! - contains `explode`: `create` itself fails
//! - contains `slow`: the sound never settles
//! - contains `deferred`: the sound becomes ready one task yield after `create`
//! - contains `refuse`: loads, but `play` fails
//! - anything else loads with a 1000ms duration

#![allow(dead_code)]

use async_trait::async_trait;
use core_playback::{
    Connection, ConnectionRegistry, PlaybackError, Player, PlayerEvent, Result, SoundBackend,
    SoundRequest, SoundSignals,
};
use core_runtime::events::EventStream;
use core_runtime::{CoreConfig, CoreConfigBuilder};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

pub const DURATION: u64 = 1000;

pub struct ScriptedConnection {
    name: String,
    usable: AtomicBool,
    mime_types: Option<Vec<String>>,
    creates: AtomicUsize,
    backends: Mutex<Vec<Arc<BackendState>>>,
}

impl ScriptedConnection {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            usable: AtomicBool::new(true),
            mime_types: None,
            creates: AtomicUsize::new(0),
            backends: Mutex::new(Vec::new()),
        })
    }

    /// Connection that only accepts the listed mime types.
    pub fn playing_only(name: &str, mime_types: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            usable: AtomicBool::new(true),
            mime_types: Some(mime_types.iter().map(|m| m.to_string()).collect()),
            creates: AtomicUsize::new(0),
            backends: Mutex::new(Vec::new()),
        })
    }

    pub fn set_usable(&self, usable: bool) {
        self.usable.store(usable, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn backend(&self, index: usize) -> Arc<BackendState> {
        Arc::clone(&self.backends.lock()[index])
    }

    pub fn created_urls(&self) -> Vec<String> {
        self.backends.lock().iter().map(|b| b.url.clone()).collect()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_use_connection(&self) -> bool {
        self.usable.load(Ordering::SeqCst)
    }

    fn can_play_mime_type(&self, mime_type: &str) -> bool {
        match &self.mime_types {
            Some(accepted) => accepted.iter().any(|m| m == mime_type),
            None => true,
        }
    }

    async fn create(&self, request: SoundRequest) -> Result<Box<dyn SoundBackend>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let url = request.url.url.clone();

        if url.contains("explode") {
            return Err(PlaybackError::Backend(format!("{} exploded on {}", self.name, url)));
        }

        let state = Arc::new(BackendState {
            url: url.clone(),
            signals: request.signals.clone(),
            position: AtomicU64::new(0),
            volume: AtomicU8::new(100),
            position_reads: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        });
        self.backends.lock().push(Arc::clone(&state));

        if url.contains("bad") {
            request
                .signals
                .load_error(format!("{} cannot play {}", self.name, url));
        } else if url.contains("deferred") {
            let signals = request.signals.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                signals.ready();
            });
        } else if !url.contains("slow") {
            request.signals.ready();
        }

        Ok(Box::new(ScriptedBackend(state)))
    }
}

pub struct BackendState {
    pub url: String,
    pub signals: SoundSignals,
    position: AtomicU64,
    volume: AtomicU8,
    position_reads: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl BackendState {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }

    pub fn position_reads(&self) -> usize {
        self.position_reads.load(Ordering::SeqCst)
    }

    /// Moves playback as if the backend had advanced on its own.
    pub fn advance_to(&self, position: u64) {
        self.position.store(position, Ordering::SeqCst);
        self.signals.position_changed(position);
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

struct ScriptedBackend(Arc<BackendState>);

impl SoundBackend for ScriptedBackend {
    fn play(&self, position: Option<u64>) -> Result<()> {
        self.0.record("play");
        if self.0.url.contains("refuse") {
            return Err(PlaybackError::Backend(format!("{} refused to play", self.0.url)));
        }
        if let Some(position) = position {
            self.0.position.store(position.min(DURATION), Ordering::SeqCst);
        }
        self.0.signals.played();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.0.record("pause");
        self.0.signals.paused();
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.0.record("stop");
        self.0.signals.paused();
        Ok(())
    }

    fn set_position(&self, position: u64) -> Result<()> {
        self.0.record(format!("set_position {}", position));
        self.0.position.store(position, Ordering::SeqCst);
        Ok(())
    }

    fn current_position(&self) -> u64 {
        self.0.position_reads.fetch_add(1, Ordering::SeqCst);
        self.0.position.load(Ordering::SeqCst)
    }

    fn audio_duration(&self) -> Option<u64> {
        Some(DURATION)
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.0.volume.store(volume, Ordering::SeqCst);
        Ok(())
    }

    fn teardown(&self) {
        self.0.record("teardown");
    }
}

/// Registry exposing each connection under its own name.
pub fn registry(connections: &[Arc<ScriptedConnection>]) -> ConnectionRegistry {
    let mut registry = ConnectionRegistry::new();
    for connection in connections {
        registry.register_instance(
            connection.name.clone(),
            Arc::clone(connection) as Arc<dyn Connection>,
        );
    }
    registry
}

/// Player over `connections`, configured in the given order.
pub fn player(connections: &[Arc<ScriptedConnection>]) -> Player {
    player_with(connections, |builder| builder)
}

pub fn player_with<F>(connections: &[Arc<ScriptedConnection>], configure: F) -> Player
where
    F: FnOnce(CoreConfigBuilder) -> CoreConfigBuilder,
{
    let mut builder = CoreConfig::builder();
    for connection in connections {
        builder = builder.connection(connection.name.clone(), serde_json::json!({}));
    }
    let config = configure(builder).build().unwrap();

    Player::builder(config)
        .registry(registry(connections))
        .build()
        .unwrap()
}

/// Event names in emission order.
pub fn names(events: &[PlayerEvent]) -> Vec<&'static str> {
    events.iter().map(PlayerEvent::name).collect()
}

pub fn drain(stream: &mut EventStream<PlayerEvent>) -> Vec<PlayerEvent> {
    stream.drain()
}
