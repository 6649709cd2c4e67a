//! # Player
//!
//! The public service tying the pieces together:
//!
//! ```text
//! load(urls, options)
//!   -> new-load-request
//!   -> deferred URLs awaited
//!   -> pre-load hooks rewrite the list (pre-load)
//!   -> wait for any pass already running for the same key
//!   -> cache lookup ──hit──> cached sound
//!   -> StrategyBuilder -> SoundResolver -> cache + register
//! play(urls, options) = load + sound.play + set_current_sound
//! ```
//!
//! Transport calls (`pause`, `rewind`, ...) act on the coordinator's current
//! sound.

use crate::cache::{CacheKey, LruSoundCache, SoundCache};
use crate::connection::{ActiveConnection, Connection, ConnectionRegistry};
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::events::PlayerEvent;
use crate::resolver::{LoadResult, SoundResolver};
use crate::shared_audio::SharedAudioAccess;
use crate::sound::Sound;
use crate::strategy::StrategyBuilder;
use crate::url::{LoadOptions, SoundUrl, UrlSource};
use bridge_traits::playback::{AudioElement, DetachedAudioElement};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

/// Rewrites the URL list of a request before the cache key is computed.
pub type PreLoadHook = Arc<dyn Fn(&mut Vec<SoundUrl>) + Send + Sync>;

pub struct Player {
    connections: Vec<ActiveConnection>,
    cache: Arc<dyn SoundCache>,
    resolver: SoundResolver,
    coordinator: Coordinator,
    shared_audio: SharedAudioAccess,
    native_connection: String,
    is_mobile_device: AtomicBool,
    always_use_single_audio_element: AtomicBool,
    pre_load_hooks: Mutex<Vec<PreLoadHook>>,
    in_flight: InFlight,
}

impl Player {
    /// Player with the built-in connections, an LRU cache and a detached
    /// shared audio element.
    pub fn new(config: CoreConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: CoreConfig) -> PlayerBuilder {
        PlayerBuilder {
            config,
            registry: None,
            cache: None,
            audio_element: None,
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Resolves `urls` to a loaded sound without playing it.
    ///
    /// Every sound returned is registered with the coordinator, so calling
    /// `play` on it directly makes it the current sound.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::UrlSource`](crate::PlaybackError::UrlSource) when a
    ///   deferred URL list fails
    /// - [`PlaybackError::Exhausted`](crate::PlaybackError::Exhausted) when no
    ///   strategy loads
    #[instrument(skip_all)]
    pub async fn load(&self, urls: impl Into<UrlSource>, options: LoadOptions) -> Result<LoadResult> {
        let source = urls.into();
        self.emit(PlayerEvent::NewLoadRequest {
            urls: source.urls().map(<[SoundUrl]>::to_vec),
            options: options.clone(),
        });

        let mut urls = source.resolve().await?;

        let hooks = self.pre_load_hooks.lock().clone();
        for hook in &hooks {
            hook(&mut urls);
        }
        self.emit(PlayerEvent::PreLoad(urls.clone()));

        let key = CacheKey::from_urls(&urls);
        let _pass = self.in_flight.enter(&key).await;
        if let Some(sound) = self.cache.find(&key) {
            debug!(sound = %sound.id(), "serving sound from cache");
            self.coordinator.register(&sound);
            return Ok(LoadResult {
                sound,
                failures: Vec::new(),
            });
        }

        let plan = StrategyBuilder::new(&self.connections)
            .mobile(self.is_mobile_device())
            .always_use_single_audio_element(self.always_use_single_audio_element())
            .native_connection(&self.native_connection)
            .shared_audio_access(self.shared_audio.clone())
            .build(&urls, options.use_connections.as_deref());

        let result = self.resolver.resolve(&plan, &options).await?;
        self.cache.cache(key, result.sound.clone());
        self.coordinator.register(&result.sound);
        Ok(result)
    }

    /// Loads `urls`, makes the sound current and starts it at
    /// `options.position` (or where it left off).
    #[instrument(skip_all)]
    pub async fn play(&self, urls: impl Into<UrlSource>, options: LoadOptions) -> Result<LoadResult> {
        let position = options.position;
        let result = self.load(urls, options).await?;
        result.sound.play(position)?;
        self.coordinator.set_current_sound(&result.sound);
        Ok(result)
    }

    /// Registers a hook that may rewrite the URL list of every later request.
    /// Hooks run in registration order.
    pub fn on_pre_load<F>(&self, hook: F)
    where
        F: Fn(&mut Vec<SoundUrl>) + Send + Sync + 'static,
    {
        self.pre_load_hooks.lock().push(Arc::new(hook));
    }

    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    // ========================================================================
    // Current sound
    // ========================================================================

    pub fn current_sound(&self) -> Option<Sound> {
        self.coordinator.current_sound()
    }

    pub fn set_current_sound(&self, sound: &Sound) {
        self.coordinator.set_current_sound(sound);
    }

    pub fn pause(&self) -> Result<()> {
        self.coordinator.pause()
    }

    pub fn stop(&self) -> Result<()> {
        self.coordinator.stop()
    }

    pub fn toggle_pause(&self) -> Result<()> {
        self.coordinator.toggle_pause()
    }

    pub fn set_position(&self, position: u64) -> Result<()> {
        self.coordinator.set_position(position)
    }

    pub fn rewind(&self, amount: u64) -> Result<()> {
        self.coordinator.rewind(amount)
    }

    pub fn fast_forward(&self, amount: u64) -> Result<()> {
        self.coordinator.fast_forward(amount)
    }

    pub fn position(&self) -> u64 {
        self.coordinator.position()
    }

    // ========================================================================
    // Volume
    // ========================================================================

    pub fn volume(&self) -> u8 {
        self.coordinator.volume()
    }

    pub fn set_volume(&self, volume: u8) {
        self.coordinator.set_volume(volume);
    }

    pub fn default_volume(&self) -> u8 {
        self.coordinator.default_volume()
    }

    pub fn toggle_mute(&self) {
        self.coordinator.toggle_mute();
    }

    pub fn is_muted(&self) -> bool {
        self.coordinator.is_muted()
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn is_mobile_device(&self) -> bool {
        self.is_mobile_device.load(Ordering::SeqCst)
    }

    /// Affects requests that miss the cache from now on.
    pub fn set_is_mobile_device(&self, mobile: bool) {
        self.is_mobile_device.store(mobile, Ordering::SeqCst);
    }

    pub fn always_use_single_audio_element(&self) -> bool {
        self.always_use_single_audio_element.load(Ordering::SeqCst)
    }

    pub fn set_always_use_single_audio_element(&self, enabled: bool) {
        self.always_use_single_audio_element
            .store(enabled, Ordering::SeqCst);
    }

    pub fn poll_interval(&self) -> Duration {
        self.coordinator.poll_interval()
    }

    pub fn set_poll_interval(&self, period: Duration) {
        self.coordinator.set_poll_interval(period);
    }

    /// The element sounds share when a single audio element is in use.
    pub fn shared_audio_access(&self) -> &SharedAudioAccess {
        &self.shared_audio
    }

    // ========================================================================
    // Connections and events
    // ========================================================================

    /// Names of the active connections, in priority order.
    pub fn available_connections(&self) -> Vec<String> {
        self.connections.iter().map(|c| c.name.clone()).collect()
    }

    pub fn connection(&self, name: &str) -> Option<Arc<dyn Connection>> {
        self.connections
            .iter()
            .find(|c| c.name == name)
            .map(|c| Arc::clone(&c.connection))
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.coordinator.events().subscribe()
    }

    pub fn event_stream(&self) -> EventStream<PlayerEvent> {
        EventStream::new(self.subscribe())
    }

    fn emit(&self, event: PlayerEvent) {
        self.coordinator.events().emit(event).ok();
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("connections", &self.available_connections())
            .field("is_mobile_device", &self.is_mobile_device())
            .field(
                "always_use_single_audio_element",
                &self.always_use_single_audio_element(),
            )
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

/// One gate per cache key: a request waits for any pass already running for
/// its key, then finds that pass's sound in the cache.
#[derive(Default)]
struct InFlight {
    gates: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    async fn enter(&self, key: &CacheKey) -> InFlightPass<'_> {
        let gate = Arc::clone(self.gates.lock().entry(key.clone()).or_default());
        let guard = Arc::clone(&gate).lock_owned().await;
        InFlightPass {
            owner: self,
            key: key.clone(),
            gate,
            guard: Some(guard),
        }
    }
}

struct InFlightPass<'a> {
    owner: &'a InFlight,
    key: CacheKey,
    gate: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightPass<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut gates = self.owner.gates.lock();
        // Only the map and this pass still hold the gate.
        if Arc::strong_count(&self.gate) == 2 {
            gates.remove(&self.key);
        }
    }
}

/// Builder for [`Player`].
pub struct PlayerBuilder {
    config: CoreConfig,
    registry: Option<ConnectionRegistry>,
    cache: Option<Arc<dyn SoundCache>>,
    audio_element: Option<Arc<dyn AudioElement>>,
}

impl PlayerBuilder {
    /// Connection factories to activate the configured names from. Defaults
    /// to [`ConnectionRegistry::with_defaults`].
    pub fn registry(mut self, registry: ConnectionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn sound_cache(mut self, cache: Arc<dyn SoundCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Platform element multiplexed across sounds on mobile devices.
    pub fn audio_element(mut self, element: Arc<dyn AudioElement>) -> Self {
        self.audio_element = Some(element);
        self
    }

    /// # Errors
    ///
    /// [`PlaybackError::Config`](crate::PlaybackError::Config) when the
    /// configuration does not validate.
    pub fn build(self) -> Result<Player> {
        let config = self.config;
        config.validate()?;

        let registry = self.registry.unwrap_or_else(ConnectionRegistry::with_defaults);
        let connections = registry.activate(&config.connections);
        if connections.is_empty() {
            warn!("no connections active, every load will fail");
        }

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(LruSoundCache::new(config.sound_cache_capacity)));
        let element = self
            .audio_element
            .unwrap_or_else(|| Arc::new(DetachedAudioElement::new()));

        let coordinator = Coordinator::new(
            EventBus::new(config.event_buffer_size),
            config.poll_interval(),
            config.default_volume,
        );

        let player = Player {
            connections,
            cache,
            resolver: SoundResolver::new().with_load_timeout(config.load_timeout()),
            coordinator,
            shared_audio: SharedAudioAccess::new(element),
            native_connection: config.native_connection.clone(),
            is_mobile_device: AtomicBool::new(config.is_mobile_device),
            always_use_single_audio_element: AtomicBool::new(
                config.always_use_single_audio_element,
            ),
            pre_load_hooks: Mutex::new(Vec::new()),
            in_flight: InFlight::default(),
        };

        info!(
            connections = ?player.available_connections(),
            mobile = config.is_mobile_device,
            single_audio_element = config.always_use_single_audio_element,
            "player ready"
        );
        Ok(player)
    }
}

impl fmt::Debug for PlayerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("custom_cache", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;
    use crate::connections::DummyConnection;
    use serde_json::json;

    fn config() -> CoreConfig {
        CoreConfig::builder()
            .connection(DummyConnection::NAME, json!({"tick_ms": 10}))
            .build()
            .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.default_volume = 101;
        assert!(matches!(Player::new(config), Err(PlaybackError::Config(_))));
    }

    #[test]
    fn unknown_connections_are_skipped() {
        let mut config = config();
        config
            .connections
            .push(core_runtime::ConnectionConfig::new("Nope", json!({})));
        let player = Player::new(config).unwrap();
        assert_eq!(player.available_connections(), vec!["DummyConnection"]);
        assert!(player.connection("Nope").is_none());
        assert!(player.connection(DummyConnection::NAME).is_some());
    }

    #[test]
    fn settings_start_from_config() {
        let config = CoreConfig::builder()
            .connection(DummyConnection::NAME, json!({}))
            .is_mobile_device(true)
            .default_volume(80)
            .poll_interval(Duration::from_millis(250))
            .build()
            .unwrap();
        let player = Player::new(config).unwrap();

        assert!(player.is_mobile_device());
        assert!(!player.always_use_single_audio_element());
        assert_eq!(player.volume(), 80);
        assert_eq!(player.default_volume(), 80);
        assert_eq!(player.poll_interval(), Duration::from_millis(250));

        player.set_is_mobile_device(false);
        player.set_always_use_single_audio_element(true);
        assert!(!player.is_mobile_device());
        assert!(player.always_use_single_audio_element());
    }

    #[tokio::test]
    async fn bad_url_exhausts_with_its_failure() {
        let player = Player::new(config()).unwrap();
        let error = player
            .load("/bad/1000/nope", LoadOptions::default())
            .await
            .unwrap_err();

        assert!(error.is_exhausted());
        assert_eq!(error.failures().len(), 1);
        assert_eq!(error.failures()[0].connection_name, "DummyConnection");
    }
}
