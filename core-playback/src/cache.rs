//! # Sound Cache
//!
//! Memoizes resolved sounds by the URL list that produced them, so loading the
//! same URLs again returns the same sound without another resolution pass.

use crate::sound::Sound;
use crate::url::SoundUrl;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;
use tracing::debug;

/// Canonical key of a URL list: each URL, with `;type=<mime>` appended when
/// the caller gave a mime hint, joined by `,`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_urls(urls: &[SoundUrl]) -> Self {
        let key = urls
            .iter()
            .map(|url| match &url.mime_hint {
                Some(mime) => format!("{};type={}", url.url, mime),
                None => url.url.clone(),
            })
            .collect::<Vec<_>>()
            .join(",");
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for resolved sounds.
pub trait SoundCache: Send + Sync {
    fn find(&self, key: &CacheKey) -> Option<Sound>;

    /// Stores `sound` under `key`, replacing any previous entry.
    fn cache(&self, key: CacheKey, sound: Sound);

    fn reset(&self);
}

/// In-memory [`SoundCache`] bounded by entry count.
///
/// A sound replaced under its key by a different sound is torn down, unless it
/// is playing. Sounds evicted for capacity are only forgotten: the coordinator
/// may still hold them as current.
pub struct LruSoundCache {
    entries: Mutex<LruCache<CacheKey, Sound>>,
}

impl LruSoundCache {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for LruSoundCache {
    fn default() -> Self {
        Self::new(core_runtime::config::DEFAULT_SOUND_CACHE_CAPACITY)
    }
}

impl SoundCache for LruSoundCache {
    fn find(&self, key: &CacheKey) -> Option<Sound> {
        let found = self.entries.lock().get(key).cloned();
        debug!(key = %key, hit = found.is_some(), "sound cache lookup");
        found
    }

    fn cache(&self, key: CacheKey, sound: Sound) {
        let displaced = self.entries.lock().push(key.clone(), sound.clone());

        match displaced {
            Some((displaced_key, old)) if displaced_key == key => {
                if old != sound && !old.is_playing() {
                    debug!(key = %key, sound = %old.id(), "tearing down superseded sound");
                    old.teardown();
                }
            }
            Some((evicted_key, old)) => {
                debug!(key = %evicted_key, sound = %old.id(), "evicted sound from cache");
            }
            None => {}
        }
    }

    fn reset(&self) {
        self.entries.lock().clear();
    }
}

impl fmt::Debug for LruSoundCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("LruSoundCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}
