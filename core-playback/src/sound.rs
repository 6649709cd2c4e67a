//! # Sound Entity
//!
//! A [`Sound`] is one playable source produced by a connection. It is split in
//! two halves:
//!
//! - [`SoundBackend`]: implemented by each connection; performs transport on
//!   the underlying player (an HTML element, a native player, a test clock).
//! - [`SoundSignals`]: handed to the backend at creation; the backend reports
//!   readiness, load errors and transport changes through it.
//!
//! The core half owns the load state, the listeners and the position-control
//! events (`will-rewind`, `position-will-change`, ...), so every backend gets
//! the same semantics for free.
//!
//! ## Load State
//!
//! `Loading → Ready | Failed | Abandoned`. The first settling signal wins;
//! anything arriving afterwards (a late `ready` from a sound the resolver
//! already gave up on) is discarded.

use crate::error::{PlaybackError, Result};
use crate::events::{ListenerId, Listeners, PositionChange, SoundEvent};
use crate::shared_audio::SharedAudioAccess;
use crate::url::{Metadata, SoundUrl};
use core_runtime::logging::redact_url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// Unique identifier of a sound instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundId(Uuid);

impl SoundId {
    pub fn new() -> Self {
        SoundId(Uuid::new_v4())
    }
}

impl Default for SoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
    /// Given up on before it settled (timeout, teardown)
    Abandoned,
}

impl LoadState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadState::Loading)
    }
}

/// Transport half of a sound, implemented by connections.
///
/// Positions and durations are milliseconds. Implementations report state
/// changes through the [`SoundSignals`] they were created with rather than
/// through return values: `play` succeeding means the request was accepted,
/// `played()` means audio is actually playing.
pub trait SoundBackend: Send + Sync {
    /// Starts playback, optionally seeking to `position` first.
    fn play(&self, position: Option<u64>) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// Seeks. `position` is already clamped to `[0, duration]`.
    fn set_position(&self, position: u64) -> Result<()>;

    fn current_position(&self) -> u64;

    /// `None` for unbounded streams.
    fn audio_duration(&self) -> Option<u64>;

    /// `volume` is within 0-100.
    fn set_volume(&self, volume: u8) -> Result<()>;

    /// Releases backend resources. Called once.
    fn teardown(&self) {}
}

struct SoundState {
    url: String,
    load_state: watch::Sender<LoadState>,
    listeners: Listeners<SoundEvent>,
    playing: AtomicBool,
    ended: AtomicBool,
    torn_down: AtomicBool,
}

/// Emission handle a backend uses to report on its sound.
#[derive(Clone)]
pub struct SoundSignals {
    state: Arc<SoundState>,
}

impl SoundSignals {
    pub fn new(url: impl Into<String>) -> Self {
        let (load_state, _) = watch::channel(LoadState::Loading);
        Self {
            state: Arc::new(SoundState {
                url: url.into(),
                load_state,
                listeners: Listeners::new(),
                playing: AtomicBool::new(false),
                ended: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    /// The sound can play.
    pub fn ready(&self) {
        self.settle(LoadState::Ready);
    }

    /// The sound cannot play.
    pub fn load_error(&self, reason: impl Into<String>) {
        self.settle(LoadState::Failed(reason.into()));
    }

    pub fn played(&self) {
        if self.is_torn_down() {
            return;
        }
        self.state.playing.store(true, Ordering::SeqCst);
        self.state.ended.store(false, Ordering::SeqCst);
        self.state.listeners.emit(&SoundEvent::Played);
    }

    pub fn paused(&self) {
        if self.is_torn_down() {
            return;
        }
        self.state.playing.store(false, Ordering::SeqCst);
        self.state.listeners.emit(&SoundEvent::Paused);
    }

    /// Playback reached the end. Repeated calls before the next `played()`
    /// are ignored.
    pub fn ended(&self) {
        if self.is_torn_down() {
            return;
        }
        self.state.playing.store(false, Ordering::SeqCst);
        if self.state.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.listeners.emit(&SoundEvent::Ended);
    }

    pub fn position_changed(&self, position: u64) {
        if self.is_torn_down() {
            return;
        }
        self.state
            .listeners
            .emit(&SoundEvent::PositionChanged(position));
    }

    pub fn load_state(&self) -> LoadState {
        self.state.load_state.borrow().clone()
    }

    fn is_torn_down(&self) -> bool {
        self.state.torn_down.load(Ordering::SeqCst)
    }

    fn settle(&self, next: LoadState) -> bool {
        let settled = self.state.load_state.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            *state = next.clone();
            true
        });

        if !settled {
            debug!(
                url = %redact_url(&self.state.url),
                signal = ?next,
                current = ?self.load_state(),
                "discarding load signal for a settled sound"
            );
        }
        settled
    }

    fn emit(&self, event: SoundEvent) {
        if !self.is_torn_down() {
            self.state.listeners.emit(&event);
        }
    }
}

impl fmt::Debug for SoundSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundSignals")
            .field("url", &self.state.url)
            .field("load_state", &self.load_state())
            .finish()
    }
}

struct SoundInner {
    id: SoundId,
    url: SoundUrl,
    connection_name: String,
    metadata: Metadata,
    backend: Box<dyn SoundBackend>,
    signals: SoundSignals,
    shared_audio: Option<SharedAudioAccess>,
    volume: AtomicU8,
}

/// Handle to a playable sound. Clones refer to the same sound.
#[derive(Clone)]
pub struct Sound {
    inner: Arc<SoundInner>,
}

impl Sound {
    /// Assembles a sound from the backend a connection created and the
    /// signals it was given.
    pub fn new(
        url: SoundUrl,
        connection_name: impl Into<String>,
        metadata: Metadata,
        signals: SoundSignals,
        backend: Box<dyn SoundBackend>,
        shared_audio: Option<SharedAudioAccess>,
    ) -> Self {
        Self {
            inner: Arc::new(SoundInner {
                id: SoundId::new(),
                url,
                connection_name: connection_name.into(),
                metadata,
                backend,
                signals,
                shared_audio,
                volume: AtomicU8::new(100),
            }),
        }
    }

    pub fn id(&self) -> SoundId {
        self.inner.id
    }

    pub fn url(&self) -> &SoundUrl {
        &self.inner.url
    }

    /// Name of the connection that created this sound.
    pub fn connection_name(&self) -> &str {
        &self.inner.connection_name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    pub fn shared_audio_access(&self) -> Option<&SharedAudioAccess> {
        self.inner.shared_audio.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.signals.load_state()
    }

    /// Waits until the sound is ready, failed or abandoned.
    pub async fn wait_until_loaded(&self) -> LoadState {
        let mut receiver = self.state().load_state.subscribe();
        let settled = receiver
            .wait_for(LoadState::is_settled)
            .await
            .map(|state| state.clone());
        settled.unwrap_or(LoadState::Abandoned)
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing.load(Ordering::SeqCst)
    }

    pub fn has_ended(&self) -> bool {
        self.state().ended.load(Ordering::SeqCst)
    }

    pub fn is_torn_down(&self) -> bool {
        self.state().torn_down.load(Ordering::SeqCst)
    }

    pub fn is_stream(&self) -> bool {
        self.duration().is_none()
    }

    pub fn position(&self) -> u64 {
        self.inner.backend.current_position()
    }

    pub fn duration(&self) -> Option<u64> {
        self.inner.backend.audio_duration()
    }

    pub fn volume(&self) -> u8 {
        self.inner.volume.load(Ordering::SeqCst)
    }

    pub fn play(&self, position: Option<u64>) -> Result<()> {
        self.ensure_alive()?;
        if let Some(shared) = &self.inner.shared_audio {
            shared.request_control(self.id());
        }
        self.inner.backend.play(position)
    }

    pub fn pause(&self) -> Result<()> {
        self.ensure_alive()?;
        self.inner.backend.pause()
    }

    pub fn stop(&self) -> Result<()> {
        self.ensure_alive()?;
        self.inner.backend.stop()
    }

    /// Seeks to `position`, clamped to `[0, duration]`.
    ///
    /// Emits `PositionWillChange` before seeking. Reaching the duration ends
    /// the sound.
    pub fn set_position(&self, position: u64) -> Result<()> {
        self.ensure_alive()?;
        let change = PositionChange {
            current_position: self.position(),
            new_position: self.clamp(position),
        };
        self.inner
            .signals
            .emit(SoundEvent::PositionWillChange(change));
        self.apply_position(change.new_position)
    }

    /// Moves back by `amount` milliseconds, stopping at 0.
    pub fn rewind(&self, amount: u64) -> Result<()> {
        self.ensure_alive()?;
        let current = self.position();
        let change = PositionChange {
            current_position: current,
            new_position: current.saturating_sub(amount),
        };
        self.inner.signals.emit(SoundEvent::WillRewind(change));
        self.apply_position(change.new_position)
    }

    /// Moves forward by `amount` milliseconds, stopping at the duration.
    pub fn fast_forward(&self, amount: u64) -> Result<()> {
        self.ensure_alive()?;
        let current = self.position();
        let change = PositionChange {
            current_position: current,
            new_position: self.clamp(current.saturating_add(amount)),
        };
        self.inner
            .signals
            .emit(SoundEvent::WillFastForward(change));
        self.apply_position(change.new_position)
    }

    /// Sets the volume, clamped to 100.
    pub fn set_volume(&self, volume: u8) -> Result<()> {
        self.ensure_alive()?;
        let volume = volume.min(100);
        self.inner.volume.store(volume, Ordering::SeqCst);
        self.inner.backend.set_volume(volume)
    }

    /// Attaches a listener for this sound's events.
    pub fn on<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&SoundEvent) + Send + Sync + 'static,
    {
        self.state().listeners.add(callback)
    }

    pub fn off(&self, listener: ListenerId) -> bool {
        self.state().listeners.remove(listener)
    }

    /// Releases the backend and detaches every listener. The sound cannot be
    /// controlled afterwards.
    pub fn teardown(&self) {
        if self.state().torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(sound = %self.id(), url = %redact_url(self.url().as_str()), "tearing down sound");

        self.abandon();
        self.state().playing.store(false, Ordering::SeqCst);
        if let Some(shared) = &self.inner.shared_audio {
            shared.release_control(self.id());
        }
        self.inner.backend.teardown();
        self.state().listeners.clear();
    }

    pub fn downgrade(&self) -> WeakSound {
        WeakSound {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Settles a still-loading sound as abandoned. Returns `false` if it had
    /// already settled.
    pub(crate) fn abandon(&self) -> bool {
        self.inner.signals.settle(LoadState::Abandoned)
    }

    fn state(&self) -> &SoundState {
        &self.inner.signals.state
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_torn_down() {
            return Err(PlaybackError::TornDown(self.id().to_string()));
        }
        Ok(())
    }

    fn clamp(&self, position: u64) -> u64 {
        match self.duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn apply_position(&self, position: u64) -> Result<()> {
        self.inner.backend.set_position(position)?;
        match self.duration() {
            Some(duration) if position >= duration => {
                self.inner.backend.stop()?;
                self.inner.signals.ended();
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl PartialEq for Sound {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Sound {}

impl Hash for Sound {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sound")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url.url)
            .field("connection", &self.inner.connection_name)
            .field("load_state", &self.load_state())
            .finish()
    }
}

/// Non-owning reference to a sound, for listeners stored on other sounds.
#[derive(Clone)]
pub struct WeakSound {
    inner: Weak<SoundInner>,
}

impl WeakSound {
    pub fn upgrade(&self) -> Option<Sound> {
        self.inner.upgrade().map(|inner| Sound { inner })
    }
}

impl fmt::Debug for WeakSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakSound")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU64;

    /// Backend with a settable clock and a record of stop calls.
    struct ClockBackend {
        position: AtomicU64,
        duration: Option<u64>,
        stops: AtomicU64,
        torn_down: AtomicBool,
    }

    impl ClockBackend {
        fn new(duration: Option<u64>) -> Self {
            Self {
                position: AtomicU64::new(0),
                duration,
                stops: AtomicU64::new(0),
                torn_down: AtomicBool::new(false),
            }
        }
    }

    impl SoundBackend for Arc<ClockBackend> {
        fn play(&self, position: Option<u64>) -> Result<()> {
            if let Some(position) = position {
                self.position.store(position, Ordering::SeqCst);
            }
            Ok(())
        }

        fn pause(&self) -> Result<()> {
            Ok(())
        }

        fn stop(&self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn set_position(&self, position: u64) -> Result<()> {
            self.position.store(position, Ordering::SeqCst);
            Ok(())
        }

        fn current_position(&self) -> u64 {
            self.position.load(Ordering::SeqCst)
        }

        fn audio_duration(&self) -> Option<u64> {
            self.duration
        }

        fn set_volume(&self, _volume: u8) -> Result<()> {
            Ok(())
        }

        fn teardown(&self) {
            self.torn_down.store(true, Ordering::SeqCst);
        }
    }

    fn sound_with(duration: Option<u64>) -> (Sound, SoundSignals, Arc<ClockBackend>) {
        let backend = Arc::new(ClockBackend::new(duration));
        let signals = SoundSignals::new("/good/1000/test.mp3");
        let sound = Sound::new(
            SoundUrl::new("/good/1000/test.mp3"),
            "Clock",
            Metadata::new(),
            signals.clone(),
            Box::new(Arc::clone(&backend)),
            None,
        );
        (sound, signals, backend)
    }

    fn record(sound: &Sound) -> Arc<Mutex<Vec<SoundEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        sound.on(move |event| sink.lock().push(event.clone()));
        events
    }

    #[test]
    fn first_settling_signal_wins() {
        let (sound, signals, _) = sound_with(Some(1000));
        assert_eq!(sound.load_state(), LoadState::Loading);

        signals.load_error("decode failed");
        signals.ready();

        assert_eq!(sound.load_state(), LoadState::Failed("decode failed".into()));
    }

    #[test]
    fn abandoned_sound_ignores_late_ready() {
        let (sound, signals, _) = sound_with(Some(1000));

        assert!(sound.abandon());
        signals.ready();

        assert_eq!(sound.load_state(), LoadState::Abandoned);
        assert!(!sound.abandon());
    }

    #[tokio::test]
    async fn wait_until_loaded_returns_settled_state() {
        let (sound, signals, _) = sound_with(Some(1000));

        let waiter = {
            let sound = sound.clone();
            tokio::spawn(async move { sound.wait_until_loaded().await })
        };
        signals.ready();

        assert_eq!(waiter.await.unwrap(), LoadState::Ready);
        assert_eq!(sound.wait_until_loaded().await, LoadState::Ready);
    }

    #[test]
    fn set_position_clamps_and_announces() {
        let (sound, _, backend) = sound_with(Some(10_000));
        let events = record(&sound);
        sound.play(Some(2000)).unwrap();

        sound.set_position(4000).unwrap();
        assert_eq!(sound.position(), 4000);

        assert_eq!(
            events.lock()[0],
            SoundEvent::PositionWillChange(PositionChange {
                current_position: 2000,
                new_position: 4000,
            })
        );
        assert_eq!(backend.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn set_position_past_duration_ends_sound() {
        let (sound, signals, backend) = sound_with(Some(1000));
        let events = record(&sound);
        signals.played();

        sound.set_position(5000).unwrap();

        assert_eq!(sound.position(), 1000);
        assert!(sound.has_ended());
        assert!(!sound.is_playing());
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
        assert_eq!(
            *events.lock(),
            vec![
                SoundEvent::Played,
                SoundEvent::PositionWillChange(PositionChange {
                    current_position: 0,
                    new_position: 1000,
                }),
                SoundEvent::Ended,
            ]
        );
    }

    #[test]
    fn rewind_and_fast_forward_announce_their_targets() {
        let (sound, _, _) = sound_with(Some(10_000));
        let events = record(&sound);
        sound.play(Some(5000)).unwrap();

        sound.rewind(1000).unwrap();
        sound.rewind(5000).unwrap();
        sound.fast_forward(6000).unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                SoundEvent::WillRewind(PositionChange {
                    current_position: 5000,
                    new_position: 4000,
                }),
                SoundEvent::WillRewind(PositionChange {
                    current_position: 4000,
                    new_position: 0,
                }),
                SoundEvent::WillFastForward(PositionChange {
                    current_position: 0,
                    new_position: 6000,
                }),
            ]
        );
    }

    #[test]
    fn streams_are_not_clamped() {
        let (sound, _, _) = sound_with(None);
        assert!(sound.is_stream());

        sound.fast_forward(90_000).unwrap();
        assert_eq!(sound.position(), 90_000);
        assert!(!sound.has_ended());
    }

    #[test]
    fn ended_is_emitted_once_until_played_again() {
        let (sound, signals, _) = sound_with(Some(1000));
        let events = record(&sound);

        signals.ended();
        signals.ended();
        signals.played();
        signals.ended();

        assert_eq!(
            *events.lock(),
            vec![SoundEvent::Ended, SoundEvent::Played, SoundEvent::Ended]
        );
    }

    #[test]
    fn volume_is_clamped() {
        let (sound, _, _) = sound_with(Some(1000));
        sound.set_volume(250).unwrap();
        assert_eq!(sound.volume(), 100);
        sound.set_volume(55).unwrap();
        assert_eq!(sound.volume(), 55);
    }

    #[test]
    fn teardown_silences_and_rejects_control() {
        let (sound, signals, backend) = sound_with(Some(1000));
        let events = record(&sound);

        sound.teardown();
        sound.teardown();
        signals.played();

        assert!(events.lock().is_empty());
        assert!(backend.torn_down.load(Ordering::SeqCst));
        assert_eq!(sound.load_state(), LoadState::Abandoned);
        assert!(matches!(sound.play(None), Err(PlaybackError::TornDown(_))));
    }

    #[test]
    fn weak_sound_does_not_keep_sound_alive() {
        let (sound, _, _) = sound_with(Some(1000));
        let weak = sound.downgrade();
        assert_eq!(weak.upgrade(), Some(sound.clone()));

        drop(sound);
        assert!(weak.upgrade().is_none());
    }
}
