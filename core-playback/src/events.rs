//! # Playback Events
//!
//! Two layers of events:
//! - [`SoundEvent`]: emitted by a single sound to the listeners attached to it
//!   through [`Listeners`].
//! - [`PlayerEvent`]: broadcast by the player on its
//!   [`EventBus`](core_runtime::events::EventBus); the coordinator relays the
//!   current sound's events here.

use crate::sound::Sound;
use crate::url::{LoadOptions, SoundUrl};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Old and new position of a position change, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionChange {
    pub current_position: u64,
    pub new_position: u64,
}

/// Events a sound emits to its own listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundEvent {
    Played,
    Paused,
    Ended,
    PositionChanged(u64),
    PositionWillChange(PositionChange),
    WillRewind(PositionChange),
    WillFastForward(PositionChange),
}

/// Events broadcast by the player.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    AudioPlayed(Sound),
    AudioPaused(Sound),
    AudioEnded(Sound),
    AudioPositionChanged {
        sound: Sound,
        position: u64,
    },
    AudioPositionWillChange {
        sound: Sound,
        change: PositionChange,
    },
    AudioWillRewind {
        sound: Sound,
        change: PositionChange,
    },
    AudioWillFastForward {
        sound: Sound,
        change: PositionChange,
    },
    CurrentSoundChanged {
        current: Sound,
        previous: Option<Sound>,
    },
    CurrentSoundInterrupted(Sound),
    /// Every `load`/`play` call, before anything is resolved. `urls` is `None`
    /// when the request carried a deferred URL list.
    NewLoadRequest {
        urls: Option<Vec<SoundUrl>>,
        options: LoadOptions,
    },
    /// URL list after the pre-load hooks ran.
    PreLoad(Vec<SoundUrl>),
    PositionPolled {
        sound: Sound,
        position: u64,
    },
}

impl PlayerEvent {
    /// Stable event name, as hosts see it.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::AudioPlayed(_) => "audio-played",
            PlayerEvent::AudioPaused(_) => "audio-paused",
            PlayerEvent::AudioEnded(_) => "audio-ended",
            PlayerEvent::AudioPositionChanged { .. } => "audio-position-changed",
            PlayerEvent::AudioPositionWillChange { .. } => "audio-position-will-change",
            PlayerEvent::AudioWillRewind { .. } => "audio-will-rewind",
            PlayerEvent::AudioWillFastForward { .. } => "audio-will-fast-forward",
            PlayerEvent::CurrentSoundChanged { .. } => "current-sound-changed",
            PlayerEvent::CurrentSoundInterrupted(_) => "current-sound-interrupted",
            PlayerEvent::NewLoadRequest { .. } => "new-load-request",
            PlayerEvent::PreLoad(_) => "pre-load",
            PlayerEvent::PositionPolled { .. } => "position-polled",
        }
    }

    /// The sound the event is about, when there is one.
    pub fn sound(&self) -> Option<&Sound> {
        match self {
            PlayerEvent::AudioPlayed(sound)
            | PlayerEvent::AudioPaused(sound)
            | PlayerEvent::AudioEnded(sound)
            | PlayerEvent::CurrentSoundInterrupted(sound) => Some(sound),
            PlayerEvent::AudioPositionChanged { sound, .. }
            | PlayerEvent::AudioPositionWillChange { sound, .. }
            | PlayerEvent::AudioWillRewind { sound, .. }
            | PlayerEvent::AudioWillFastForward { sound, .. }
            | PlayerEvent::PositionPolled { sound, .. } => Some(sound),
            PlayerEvent::CurrentSoundChanged { current, .. } => Some(current),
            PlayerEvent::NewLoadRequest { .. } | PlayerEvent::PreLoad(_) => None,
        }
    }
}

/// Handle returned when attaching a listener; used to detach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Listener registry with attach/detach by [`ListenerId`].
///
/// Callbacks run without the registry lock held, so a callback may attach or
/// detach listeners (on this or another registry). A listener attached while
/// an event is being emitted also receives that event; a listener detached
/// before its turn does not.
pub struct Listeners<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Callback<E>)>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if the listener was not attached.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn emit(&self, event: &E) {
        let mut notified = HashSet::new();
        loop {
            let next = {
                let entries = self.entries.lock();
                entries
                    .iter()
                    .find(|(id, _)| !notified.contains(id))
                    .map(|(id, callback)| (*id, Arc::clone(callback)))
            };
            let Some((id, callback)) = next else {
                break;
            };
            notified.insert(id);
            callback(event);
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listeners_receive_in_attach_order() {
        let listeners = Listeners::<SoundEvent>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            listeners.add(move |event: &SoundEvent| log.lock().push((tag, event.clone())));
        }

        listeners.emit(&SoundEvent::Played);

        assert_eq!(
            *log.lock(),
            vec![("first", SoundEvent::Played), ("second", SoundEvent::Played)]
        );
    }

    #[test]
    fn removed_listener_is_not_called() {
        let listeners = Listeners::<SoundEvent>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = listeners.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.emit(&SoundEvent::Paused);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(listeners.is_empty());
    }

    #[test]
    fn listener_attached_during_emit_sees_the_event() {
        let listeners = Arc::new(Listeners::<SoundEvent>::new());
        let late_calls = Arc::new(AtomicUsize::new(0));

        let registry = Arc::clone(&listeners);
        let counter = Arc::clone(&late_calls);
        listeners.add(move |_| {
            let counter = Arc::clone(&counter);
            if registry.len() == 1 {
                registry.add(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        listeners.emit(&SoundEvent::Played);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn listener_detached_during_emit_is_skipped() {
        let listeners = Arc::new(Listeners::<SoundEvent>::new());
        let second_calls = Arc::new(AtomicUsize::new(0));
        let second_id = Arc::new(Mutex::new(None));

        let registry = Arc::clone(&listeners);
        let target = Arc::clone(&second_id);
        listeners.add(move |_| {
            if let Some(id) = *target.lock() {
                registry.remove(id);
            }
        });

        let counter = Arc::clone(&second_calls);
        let id = listeners.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *second_id.lock() = Some(id);

        listeners.emit(&SoundEvent::Ended);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn event_names() {
        let request = PlayerEvent::NewLoadRequest {
            urls: None,
            options: LoadOptions::default(),
        };
        assert_eq!(request.name(), "new-load-request");
        assert!(request.sound().is_none());
        assert_eq!(PlayerEvent::PreLoad(Vec::new()).name(), "pre-load");
    }
}
