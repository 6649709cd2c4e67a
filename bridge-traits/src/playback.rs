//! Platform audio element bridge.
//!
//! Constrained platforms (mobile browsers, some embedded webviews) only allow
//! audio playback through an element that was unlocked by a user gesture, so
//! the engine hands one element from sound to sound instead of creating a new
//! one per sound. The host supplies the element; the engine only switches its
//! source.

use parking_lot::Mutex;

/// A platform playback element that can be pointed at different sources.
pub trait AudioElement: Send + Sync {
    /// Source currently loaded into the element, if any.
    fn source(&self) -> Option<String>;

    /// Point the element at a new source, or clear it with `None`.
    fn set_source(&self, source: Option<&str>);
}

/// Element used when the host does not provide one.
///
/// Records the source it was given; it produces no sound.
#[derive(Debug, Default)]
pub struct DetachedAudioElement {
    source: Mutex<Option<String>>,
}

impl DetachedAudioElement {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioElement for DetachedAudioElement {
    fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    fn set_source(&self, source: Option<&str>) {
        *self.source.lock() = source.map(str::to_owned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_element_tracks_source() {
        let element = DetachedAudioElement::new();
        assert_eq!(element.source(), None);

        element.set_source(Some("/good/1000/a.mp3"));
        assert_eq!(element.source().as_deref(), Some("/good/1000/a.mp3"));

        element.set_source(None);
        assert_eq!(element.source(), None);
    }
}
