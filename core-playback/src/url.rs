//! # Sound URLs and Load Options
//!
//! What a caller hands to `load`/`play`: one or more candidate URLs (possibly
//! produced later by a future) and per-request options.

use crate::error::{PlaybackError, Result};
use crate::mime::guess_mime_type;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

/// Opaque per-sound metadata bag.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A candidate source URL with an optional explicit mime type hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundUrl {
    pub url: String,
    /// Mime type given by the caller. Takes precedence over the extension.
    pub mime_hint: Option<String>,
}

impl SoundUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_hint: None,
        }
    }

    pub fn with_mime_type(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_hint: Some(mime_type.into()),
        }
    }

    /// The explicit hint, else the type implied by the extension.
    pub fn mime_type(&self) -> Option<String> {
        self.mime_hint
            .clone()
            .or_else(|| guess_mime_type(&self.url).map(str::to_owned))
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for SoundUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl From<&str> for SoundUrl {
    fn from(url: &str) -> Self {
        SoundUrl::new(url)
    }
}

impl From<String> for SoundUrl {
    fn from(url: String) -> Self {
        SoundUrl::new(url)
    }
}

impl From<&String> for SoundUrl {
    fn from(url: &String) -> Self {
        SoundUrl::new(url.as_str())
    }
}

/// URLs for a load request, available now or produced by a future.
pub enum UrlSource {
    Urls(Vec<SoundUrl>),
    Deferred(BoxFuture<'static, Result<Vec<SoundUrl>>>),
}

impl UrlSource {
    /// Wraps a future that yields the URLs once they are known (e.g. after an
    /// API call returned the stream locations).
    ///
    /// An error from the future fails the load with
    /// [`PlaybackError::UrlSource`].
    pub fn deferred<F, U, E>(future: F) -> Self
    where
        F: Future<Output = std::result::Result<Vec<U>, E>> + Send + 'static,
        U: Into<SoundUrl>,
        E: fmt::Display,
    {
        UrlSource::Deferred(Box::pin(async move {
            future
                .await
                .map(|urls| urls.into_iter().map(Into::into).collect())
                .map_err(|e| PlaybackError::UrlSource(e.to_string()))
        }))
    }

    /// The URLs, if they are already known.
    pub fn urls(&self) -> Option<&[SoundUrl]> {
        match self {
            UrlSource::Urls(urls) => Some(urls),
            UrlSource::Deferred(_) => None,
        }
    }

    pub async fn resolve(self) -> Result<Vec<SoundUrl>> {
        match self {
            UrlSource::Urls(urls) => Ok(urls),
            UrlSource::Deferred(future) => future.await,
        }
    }
}

impl fmt::Debug for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlSource::Urls(urls) => f.debug_tuple("Urls").field(urls).finish(),
            UrlSource::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

impl From<SoundUrl> for UrlSource {
    fn from(url: SoundUrl) -> Self {
        UrlSource::Urls(vec![url])
    }
}

impl From<&str> for UrlSource {
    fn from(url: &str) -> Self {
        UrlSource::Urls(vec![url.into()])
    }
}

impl From<String> for UrlSource {
    fn from(url: String) -> Self {
        UrlSource::Urls(vec![url.into()])
    }
}

impl<T: Into<SoundUrl>> From<Vec<T>> for UrlSource {
    fn from(urls: Vec<T>) -> Self {
        UrlSource::Urls(urls.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SoundUrl>, const N: usize> From<[T; N]> for UrlSource {
    fn from(urls: [T; N]) -> Self {
        UrlSource::Urls(urls.into_iter().map(Into::into).collect())
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Attached to the resolved sound, untouched by the engine
    pub metadata: Metadata,
    /// Try only these connections, in this order
    pub use_connections: Option<Vec<String>>,
    /// Start position in milliseconds for `play`
    pub position: Option<u64>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn use_connections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.use_connections = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn at_position(mut self, position: u64) -> Self {
        self.position = Some(position);
        self
    }
}
