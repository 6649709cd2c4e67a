//! # Current-Sound Coordinator
//!
//! Owns the single current sound:
//! - switching pauses a playing predecessor and reports the interruption
//! - the current sound's events are relayed onto the player event bus
//! - the coordinator volume is written onto each sound that becomes current
//! - a [`PositionTicker`] polls the current sound's position
//!
//! Sounds registered with [`Coordinator::register`] become current as soon
//! as they report `played`, so playing a loaded sound directly takes over
//! from whatever was playing.
//!
//! ## Locking
//!
//! Transitions are serialized by a re-entrant lock: a sound listener may
//! trigger a nested transition on the same thread. The state lock is never
//! held while calling into a sound.

use crate::error::{PlaybackError, Result};
use crate::events::{ListenerId, PlayerEvent, SoundEvent};
use crate::sound::{Sound, SoundId, WeakSound};
use crate::ticker::PositionTicker;
use core_runtime::events::EventBus;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    events: EventBus<PlayerEvent>,
    transition: ReentrantMutex<()>,
    state: Mutex<CoordinatorState>,
    default_volume: u8,
}

struct CoordinatorState {
    current: Option<Sound>,
    relay: Option<ListenerId>,
    ticker: Option<PositionTicker>,
    poll_interval: Duration,
    volume: u8,
    unmute_volume: Option<u8>,
    position: u64,
    registrations: HashMap<SoundId, (WeakSound, ListenerId)>,
}

impl Coordinator {
    pub fn new(events: EventBus<PlayerEvent>, poll_interval: Duration, default_volume: u8) -> Self {
        let default_volume = default_volume.min(100);
        Self {
            inner: Arc::new(CoordinatorInner {
                events,
                transition: ReentrantMutex::new(()),
                state: Mutex::new(CoordinatorState {
                    current: None,
                    relay: None,
                    ticker: None,
                    poll_interval,
                    volume: default_volume,
                    unmute_volume: None,
                    position: 0,
                    registrations: HashMap::new(),
                }),
                default_volume,
            }),
        }
    }

    pub fn events(&self) -> &EventBus<PlayerEvent> {
        &self.inner.events
    }

    pub fn current_sound(&self) -> Option<Sound> {
        self.inner.state.lock().current.clone()
    }

    /// Makes `next` the current sound. Setting the sound that is already
    /// current does nothing.
    pub fn set_current_sound(&self, next: &Sound) {
        let _transition = self.inner.transition.lock();

        let previous = {
            let state = self.inner.state.lock();
            if state.current.as_ref() == Some(next) {
                return;
            }
            state.current.clone()
        };

        if let Some(previous) = &previous {
            if previous.is_playing() {
                debug!(sound = %previous.id(), "interrupting current sound");
                if let Err(error) = previous.pause() {
                    warn!(sound = %previous.id(), %error, "failed to pause interrupted sound");
                }
                self.emit(PlayerEvent::CurrentSoundInterrupted(previous.clone()));
            }

            let relay = self.inner.state.lock().relay.take();
            if let Some(relay) = relay {
                previous.off(relay);
            }
        }

        let relay = self.attach_relay(next);

        let volume = self.inner.state.lock().volume;
        if let Err(error) = next.set_volume(volume) {
            warn!(sound = %next.id(), %error, "failed to apply volume to new current sound");
        }

        let position = next.position();
        let (poll_interval, stale_ticker) = {
            let mut state = self.inner.state.lock();
            state.current = Some(next.clone());
            state.position = position;
            state.relay = Some(relay);
            (state.poll_interval, state.ticker.take())
        };
        drop(stale_ticker);

        debug!(sound = %next.id(), connection = %next.connection_name(), "current sound changed");
        self.emit(PlayerEvent::CurrentSoundChanged {
            current: next.clone(),
            previous,
        });

        let ticker = self.start_ticker(next, poll_interval);
        self.inner.state.lock().ticker = ticker;
    }

    /// Makes `sound` current whenever it reports `played`.
    ///
    /// Registering the same sound again has no effect.
    pub fn register(&self, sound: &Sound) {
        let mut state = self.inner.state.lock();
        state
            .registrations
            .retain(|_, (weak, _)| weak.upgrade().is_some_and(|s| !s.is_torn_down()));
        if state.registrations.contains_key(&sound.id()) {
            return;
        }

        let coordinator = Arc::downgrade(&self.inner);
        let weak = sound.downgrade();
        let listener = sound.on(move |event| {
            if *event != SoundEvent::Played {
                return;
            }
            let (Some(inner), Some(sound)) = (coordinator.upgrade(), weak.upgrade()) else {
                return;
            };
            Coordinator { inner }.set_current_sound(&sound);
        });

        state
            .registrations
            .insert(sound.id(), (sound.downgrade(), listener));
    }

    pub fn unregister(&self, sound: &Sound) {
        let registration = self.inner.state.lock().registrations.remove(&sound.id());
        if let Some((_, listener)) = registration {
            sound.off(listener);
        }
    }

    pub fn is_registered(&self, sound: &Sound) -> bool {
        self.inner
            .state
            .lock()
            .registrations
            .contains_key(&sound.id())
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub fn pause(&self) -> Result<()> {
        self.current()?.pause()
    }

    pub fn stop(&self) -> Result<()> {
        self.current()?.stop()
    }

    /// Pauses the current sound if it is playing, resumes it otherwise.
    pub fn toggle_pause(&self) -> Result<()> {
        let sound = self.current()?;
        if sound.is_playing() {
            sound.pause()
        } else {
            sound.play(None)
        }
    }

    pub fn set_position(&self, position: u64) -> Result<()> {
        let sound = self.current()?;
        sound.set_position(position)?;
        self.record_position(&sound);
        Ok(())
    }

    pub fn rewind(&self, amount: u64) -> Result<()> {
        let sound = self.current()?;
        sound.rewind(amount)?;
        self.record_position(&sound);
        Ok(())
    }

    pub fn fast_forward(&self, amount: u64) -> Result<()> {
        let sound = self.current()?;
        sound.fast_forward(amount)?;
        self.record_position(&sound);
        Ok(())
    }

    /// Last polled (or set) position of the current sound.
    pub fn position(&self) -> u64 {
        self.inner.state.lock().position
    }

    // ========================================================================
    // Volume
    // ========================================================================

    pub fn volume(&self) -> u8 {
        self.inner.state.lock().volume
    }

    pub fn default_volume(&self) -> u8 {
        self.inner.default_volume
    }

    pub fn is_muted(&self) -> bool {
        self.volume() == 0
    }

    /// Sets the volume (clamped to 100) and writes it onto the current sound.
    pub fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        let current = {
            let mut state = self.inner.state.lock();
            state.volume = volume;
            state.current.clone()
        };

        if let Some(sound) = current {
            if let Err(error) = sound.set_volume(volume) {
                warn!(sound = %sound.id(), %error, "failed to apply volume");
            }
        }
    }

    /// Mutes, or restores the volume from before muting.
    pub fn toggle_mute(&self) {
        let target = {
            let mut state = self.inner.state.lock();
            if state.volume == 0 {
                state
                    .unmute_volume
                    .take()
                    .unwrap_or(self.inner.default_volume)
            } else {
                state.unmute_volume = Some(state.volume);
                0
            }
        };
        self.set_volume(target);
    }

    // ========================================================================
    // Polling
    // ========================================================================

    pub fn poll_interval(&self) -> Duration {
        self.inner.state.lock().poll_interval
    }

    /// Changes the polling period, restarting the poller of the current sound.
    pub fn set_poll_interval(&self, period: Duration) {
        let current = {
            let mut state = self.inner.state.lock();
            state.poll_interval = period;
            state.current.clone()
        };

        if let Some(sound) = current {
            let ticker = self.start_ticker(&sound, period);
            let stale = std::mem::replace(&mut self.inner.state.lock().ticker, ticker);
            drop(stale);
        }
    }

    fn current(&self) -> Result<Sound> {
        self.current_sound().ok_or(PlaybackError::NoCurrentSound)
    }

    fn emit(&self, event: PlayerEvent) {
        self.inner.events.emit(event).ok();
    }

    fn record_position(&self, sound: &Sound) {
        let position = sound.position();
        let mut state = self.inner.state.lock();
        if state.current.as_ref() == Some(sound) {
            state.position = position;
        }
    }

    fn attach_relay(&self, sound: &Sound) -> ListenerId {
        let coordinator = Arc::downgrade(&self.inner);
        let weak = sound.downgrade();
        sound.on(move |event| {
            let (Some(inner), Some(sound)) = (coordinator.upgrade(), weak.upgrade()) else {
                return;
            };
            inner.events.emit(relayed(event, sound)).ok();
        })
    }

    fn start_ticker(&self, sound: &Sound, period: Duration) -> Option<PositionTicker> {
        let coordinator: Weak<CoordinatorInner> = Arc::downgrade(&self.inner);
        let weak = sound.downgrade();
        let id = sound.id();

        PositionTicker::start(period, move || {
            let (Some(inner), Some(sound)) = (coordinator.upgrade(), weak.upgrade()) else {
                return;
            };
            let is_current = inner
                .state
                .lock()
                .current
                .as_ref()
                .is_some_and(|current| current.id() == id);
            if !is_current {
                return;
            }

            let position = sound.position();
            inner.state.lock().position = position;
            inner
                .events
                .emit(PlayerEvent::PositionPolled { sound, position })
                .ok();
        })
    }
}

fn relayed(event: &SoundEvent, sound: Sound) -> PlayerEvent {
    match event {
        SoundEvent::Played => PlayerEvent::AudioPlayed(sound),
        SoundEvent::Paused => PlayerEvent::AudioPaused(sound),
        SoundEvent::Ended => PlayerEvent::AudioEnded(sound),
        SoundEvent::PositionChanged(position) => PlayerEvent::AudioPositionChanged {
            sound,
            position: *position,
        },
        SoundEvent::PositionWillChange(change) => PlayerEvent::AudioPositionWillChange {
            sound,
            change: *change,
        },
        SoundEvent::WillRewind(change) => PlayerEvent::AudioWillRewind {
            sound,
            change: *change,
        },
        SoundEvent::WillFastForward(change) => PlayerEvent::AudioWillFastForward {
            sound,
            change: *change,
        },
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Coordinator")
            .field("current", &state.current.as_ref().map(Sound::id))
            .field("volume", &state.volume)
            .field("poll_interval", &state.poll_interval)
            .finish()
    }
}
