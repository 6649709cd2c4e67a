//! Shared audio element handoff.
//!
//! On devices that only unlock audio for an element touched by a user gesture,
//! every sound plays through the same [`AudioElement`]. `SharedAudioAccess`
//! tracks which sound currently controls it.

use crate::sound::SoundId;
use bridge_traits::playback::AudioElement;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SharedAudioAccess {
    inner: Arc<SharedAudioInner>,
}

struct SharedAudioInner {
    element: Arc<dyn AudioElement>,
    owner: Mutex<Option<SoundId>>,
}

impl SharedAudioAccess {
    pub fn new(element: Arc<dyn AudioElement>) -> Self {
        Self {
            inner: Arc::new(SharedAudioInner {
                element,
                owner: Mutex::new(None),
            }),
        }
    }

    pub fn element(&self) -> &Arc<dyn AudioElement> {
        &self.inner.element
    }

    /// Hands the element to `sound`. Returns the previous owner, if another
    /// sound had it.
    pub fn request_control(&self, sound: SoundId) -> Option<SoundId> {
        let mut owner = self.inner.owner.lock();
        let previous = owner.replace(sound);
        match previous {
            Some(previous) if previous != sound => {
                debug!(from = %previous, to = %sound, "shared audio element handed over");
                Some(previous)
            }
            _ => None,
        }
    }

    pub fn has_control(&self, sound: SoundId) -> bool {
        *self.inner.owner.lock() == Some(sound)
    }

    /// Gives the element up if `sound` holds it, clearing its source.
    pub fn release_control(&self, sound: SoundId) {
        let mut owner = self.inner.owner.lock();
        if *owner == Some(sound) {
            *owner = None;
            drop(owner);
            self.inner.element.set_source(None);
        }
    }

    pub fn owner(&self) -> Option<SoundId> {
        *self.inner.owner.lock()
    }

    /// `true` if both handles multiplex the same element.
    pub fn same_element(&self, other: &SharedAudioAccess) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SharedAudioAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedAudioAccess")
            .field("owner", &self.owner())
            .field("source", &self.inner.element.source())
            .finish()
    }
}
