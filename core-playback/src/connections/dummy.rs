//! # Dummy Connection
//!
//! A backend that plays nothing and behaves the way its URL says. Used by the
//! test suites and the demo.
//!
//! URLs of the form `/:result/:length/:name` control it:
//! - `result`: `good` loads, `bad` fails to load
//! - `length`: duration in milliseconds, or `stream` for an unbounded stream
//!
//! Any other URL is a good 1000ms sound. While playing, the position advances
//! by one tick (50ms unless configured with `tick_ms`) per tick on the tokio
//! runtime until the duration is reached.

use crate::connection::{Connection, SoundRequest};
use crate::error::{PlaybackError, Result};
use crate::shared_audio::SharedAudioAccess;
use crate::sound::{SoundBackend, SoundSignals};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

const DEFAULT_LENGTH_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Good,
    Bad,
}

/// What a dummy URL asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DummyUrl {
    outcome: Outcome,
    /// `None` for streams
    length: Option<u64>,
}

impl DummyUrl {
    fn parse(url: &str) -> Self {
        let default = DummyUrl {
            outcome: Outcome::Good,
            length: Some(DEFAULT_LENGTH_MS),
        };

        let Some(path) = url.strip_prefix('/') else {
            return default;
        };

        let mut parts = path.splitn(3, '/');
        let (Some(result), Some(length), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            warn!(url, "dummy url format should be \"/:result/:length/:name\"");
            return default;
        };
        if name.is_empty() {
            warn!(url, "dummy url format should be \"/:result/:length/:name\"");
        }

        let outcome = match result {
            "bad" => Outcome::Bad,
            "good" => Outcome::Good,
            other => {
                warn!(url, result = other, "dummy result should be 'good' or 'bad'");
                Outcome::Good
            }
        };

        let length = match length {
            "stream" => None,
            millis => match millis.parse::<u64>() {
                Ok(ms) if ms > 0 => Some(ms),
                _ => {
                    warn!(url, length = millis, "dummy length should be a positive integer or \"stream\"");
                    Some(DEFAULT_LENGTH_MS)
                }
            },
        };

        DummyUrl { outcome, length }
    }
}

#[derive(Debug, Clone)]
pub struct DummyConnection {
    tick: Duration,
}

impl DummyConnection {
    pub const NAME: &'static str = "DummyConnection";
    pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

    pub fn new() -> Self {
        Self {
            tick: Self::DEFAULT_TICK,
        }
    }

    pub fn with_tick(tick: Duration) -> Self {
        Self { tick }
    }

    /// Reads `{"tick_ms": <positive integer>}`; everything else is ignored.
    pub fn from_config(config: &serde_json::Value) -> Result<Self> {
        match config.get("tick_ms") {
            None => Ok(Self::new()),
            Some(value) => match value.as_u64() {
                Some(ms) if ms > 0 => Ok(Self::with_tick(Duration::from_millis(ms))),
                _ => Err(PlaybackError::Backend(format!(
                    "DummyConnection tick_ms must be a positive integer, got {}",
                    value
                ))),
            },
        }
    }
}

impl Default for DummyConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for DummyConnection {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn create(&self, request: SoundRequest) -> Result<Box<dyn SoundBackend>> {
        let parsed = DummyUrl::parse(request.url.as_str());
        debug!(url = %request.url, ?parsed, "creating dummy sound");

        let backend = DummyBackend {
            state: Arc::new(DummyState {
                url: request.url.url.clone(),
                duration: parsed.length,
                tick: self.tick,
                position: AtomicU64::new(0),
                volume: AtomicU8::new(100),
                signals: request.signals.clone(),
                shared_audio: request.shared_audio_access,
                ticker: Mutex::new(None),
            }),
        };

        match parsed.outcome {
            Outcome::Good => request.signals.ready(),
            Outcome::Bad => request
                .signals
                .load_error(format!("dummy sound {} failed to load", request.url)),
        }

        Ok(Box::new(backend))
    }
}

struct DummyState {
    url: String,
    duration: Option<u64>,
    tick: Duration,
    position: AtomicU64,
    volume: AtomicU8,
    signals: SoundSignals,
    shared_audio: Option<SharedAudioAccess>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl DummyState {
    /// One tick of playback. Returns `false` once the end is reached.
    fn advance(&self) -> bool {
        let tick_ms = self.tick.as_millis() as u64;
        let next = self.position.load(Ordering::SeqCst).saturating_add(tick_ms);

        match self.duration {
            Some(duration) if next >= duration => {
                self.position.store(duration, Ordering::SeqCst);
                // Detach the running task; it exits after this tick.
                let finished = self.ticker.lock().take();
                drop(finished);
                self.signals.position_changed(duration);
                self.signals.ended();
                false
            }
            _ => {
                self.position.store(next, Ordering::SeqCst);
                self.signals.position_changed(next);
                true
            }
        }
    }

    /// Returns `true` if playback was running.
    fn stop_ticking(&self) -> bool {
        match self.ticker.lock().take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

struct DummyBackend {
    state: Arc<DummyState>,
}

impl DummyBackend {
    fn start_ticking(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PlaybackError::Backend("DummyConnection needs a tokio runtime to play".to_string())
        })?;

        let mut ticker = self.state.ticker.lock();
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let period = self.state.tick;
        let state: Weak<DummyState> = Arc::downgrade(&self.state);
        *ticker = Some(runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(state) = state.upgrade() else {
                    break;
                };
                if !state.advance() {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn clamp(&self, position: u64) -> u64 {
        match self.state.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

impl SoundBackend for DummyBackend {
    fn play(&self, position: Option<u64>) -> Result<()> {
        if let Some(position) = position {
            self.state
                .position
                .store(self.clamp(position), Ordering::SeqCst);
        }
        if let Some(shared) = &self.state.shared_audio {
            shared.element().set_source(Some(&self.state.url));
        }
        self.start_ticking()?;
        self.state.signals.played();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        if self.state.stop_ticking() {
            self.state.signals.paused();
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.pause()
    }

    fn set_position(&self, position: u64) -> Result<()> {
        self.state
            .position
            .store(self.clamp(position), Ordering::SeqCst);
        Ok(())
    }

    fn current_position(&self) -> u64 {
        self.state.position.load(Ordering::SeqCst)
    }

    fn audio_duration(&self) -> Option<u64> {
        self.state.duration
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.state.volume.store(volume, Ordering::SeqCst);
        Ok(())
    }

    fn teardown(&self) {
        self.state.stop_ticking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SoundEvent;
    use crate::sound::{LoadState, Sound};
    use crate::url::{LoadOptions, Metadata, SoundUrl};
    use bridge_traits::playback::DetachedAudioElement;

    async fn dummy_sound(url: &str, shared: Option<SharedAudioAccess>) -> Sound {
        let connection = DummyConnection::new();
        let signals = SoundSignals::new(url);
        let backend = connection
            .create(SoundRequest {
                url: SoundUrl::new(url),
                options: LoadOptions::default(),
                shared_audio_access: shared.clone(),
                signals: signals.clone(),
            })
            .await
            .unwrap();
        Sound::new(
            SoundUrl::new(url),
            DummyConnection::NAME,
            Metadata::new(),
            signals,
            backend,
            shared,
        )
    }

    #[test]
    fn parses_dummy_urls() {
        assert_eq!(
            DummyUrl::parse("/bad/1000/test"),
            DummyUrl { outcome: Outcome::Bad, length: Some(1000) }
        );
        assert_eq!(
            DummyUrl::parse("/good/stream/radio"),
            DummyUrl { outcome: Outcome::Good, length: None }
        );
        assert_eq!(
            DummyUrl::parse("http://example.com/a.mp3"),
            DummyUrl { outcome: Outcome::Good, length: Some(1000) }
        );
        assert_eq!(
            DummyUrl::parse("/good/nonsense/x"),
            DummyUrl { outcome: Outcome::Good, length: Some(1000) }
        );
    }

    #[test]
    fn tick_from_config() {
        let connection = DummyConnection::from_config(&serde_json::json!({"tick_ms": 20})).unwrap();
        assert_eq!(connection.tick, Duration::from_millis(20));

        assert!(DummyConnection::from_config(&serde_json::json!({"tick_ms": 0})).is_err());
        assert!(DummyConnection::from_config(&serde_json::json!({})).is_ok());
    }

    #[tokio::test]
    async fn good_and_bad_urls_settle() {
        let good = dummy_sound("/good/1000/a", None).await;
        assert_eq!(good.load_state(), LoadState::Ready);
        assert_eq!(good.duration(), Some(1000));

        let bad = dummy_sound("/bad/1000/a", None).await;
        assert!(matches!(bad.load_state(), LoadState::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn plays_to_the_end() {
        let sound = dummy_sound("/good/200/short", None).await;
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        sound.on(move |event| sink.lock().push(event.clone()));

        sound.play(None).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(sound.position(), 100);
        assert!(sound.is_playing());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sound.position(), 200);
        assert!(sound.has_ended());
        assert!(!sound.is_playing());

        let events = events.lock();
        assert_eq!(events.first(), Some(&SoundEvent::Played));
        assert_eq!(events.last(), Some(&SoundEvent::Ended));
        assert_eq!(
            events.iter().filter(|e| **e == SoundEvent::Ended).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_the_clock() {
        let sound = dummy_sound("/good/stream/radio", None).await;
        sound.play(Some(1000)).unwrap();

        tokio::time::sleep(Duration::from_millis(110)).await;
        sound.pause().unwrap();
        let paused_at = sound.position();
        assert_eq!(paused_at, 1100);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sound.position(), paused_at);
        assert!(!sound.is_playing());
    }

    #[tokio::test]
    async fn shared_element_gets_the_source_on_play() {
        let shared = SharedAudioAccess::new(Arc::new(DetachedAudioElement::new()));
        let sound = dummy_sound("/good/1000/shared", Some(shared.clone())).await;

        sound.play(None).unwrap();

        assert_eq!(shared.element().source().as_deref(), Some("/good/1000/shared"));
        assert!(shared.has_control(sound.id()));
        sound.teardown();
        assert_eq!(shared.owner(), None);
    }
}
