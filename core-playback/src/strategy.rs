//! # Strategy Builder
//!
//! Turns the active connections and the candidate URLs into the ordered list
//! of attempts the resolver walks.
//!
//! ## Orderings
//!
//! - **Standard** (desktop): breadth-first over URLs. Every connection gets a
//!   shot at the first URL before any connection sees the second one.
//! - **Mobile**: the native connection across all URLs first, then the other
//!   connections breadth-first. Falls back to standard ordering when the
//!   native connection is not active.
//! - **Custom**: `use_connections` replaces the connection set and order.
//!   Mobile ordering does not apply.
//!
//! When the device is mobile or the player always uses a single audio
//! element, every strategy carries the shared audio handle.

use crate::connection::{ActiveConnection, Connection};
use crate::shared_audio::SharedAudioAccess;
use crate::url::SoundUrl;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// One attempt: play `url` with `connection`.
#[derive(Clone)]
pub struct Strategy {
    pub connection_name: String,
    pub connection: Arc<dyn Connection>,
    pub url: SoundUrl,
    pub shared_audio_access: Option<SharedAudioAccess>,
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("connection_name", &self.connection_name)
            .field("url", &self.url.url)
            .field("shared_audio_access", &self.shared_audio_access.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Standard,
    Mobile,
    Custom,
}

#[derive(Debug, Clone)]
pub struct StrategyPlan {
    pub kind: StrategyKind,
    pub strategies: Vec<Strategy>,
}

impl StrategyPlan {
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Builds [`StrategyPlan`]s for a fixed set of active connections.
#[derive(Debug, Clone)]
pub struct StrategyBuilder<'a> {
    connections: &'a [ActiveConnection],
    is_mobile_device: bool,
    always_use_single_audio_element: bool,
    native_connection: &'a str,
    shared_audio_access: Option<SharedAudioAccess>,
}

impl<'a> StrategyBuilder<'a> {
    /// `connections` is in priority order.
    pub fn new(connections: &'a [ActiveConnection]) -> Self {
        Self {
            connections,
            is_mobile_device: false,
            always_use_single_audio_element: false,
            native_connection: core_runtime::config::DEFAULT_NATIVE_CONNECTION,
            shared_audio_access: None,
        }
    }

    pub fn mobile(mut self, is_mobile_device: bool) -> Self {
        self.is_mobile_device = is_mobile_device;
        self
    }

    pub fn always_use_single_audio_element(mut self, enabled: bool) -> Self {
        self.always_use_single_audio_element = enabled;
        self
    }

    pub fn native_connection(mut self, name: &'a str) -> Self {
        self.native_connection = name;
        self
    }

    pub fn shared_audio_access(mut self, access: SharedAudioAccess) -> Self {
        self.shared_audio_access = Some(access);
        self
    }

    pub fn build(&self, urls: &[SoundUrl], use_connections: Option<&[String]>) -> StrategyPlan {
        if let Some(names) = use_connections {
            let selected = self.select(names);
            return StrategyPlan {
                kind: StrategyKind::Custom,
                strategies: self.breadth_first(&selected, urls),
            };
        }

        let all: Vec<&ActiveConnection> = self.connections.iter().collect();

        if self.is_mobile_device {
            if let Some(native) = all.iter().find(|c| c.name == self.native_connection) {
                let mut strategies: Vec<Strategy> = urls
                    .iter()
                    .filter(|url| native.connection.can_play(url))
                    .map(|url| self.strategy(native, url))
                    .collect();

                let others: Vec<&ActiveConnection> = all
                    .iter()
                    .copied()
                    .filter(|c| c.name != self.native_connection)
                    .collect();
                strategies.extend(self.breadth_first(&others, urls));

                return StrategyPlan {
                    kind: StrategyKind::Mobile,
                    strategies,
                };
            }
        }

        StrategyPlan {
            kind: StrategyKind::Standard,
            strategies: self.breadth_first(&all, urls),
        }
    }

    fn select(&self, names: &[String]) -> Vec<&'a ActiveConnection> {
        names
            .iter()
            .filter_map(|name| {
                let found = self.connections.iter().find(|c| &c.name == name);
                if found.is_none() {
                    warn!(connection = %name, "requested connection is not active, skipping");
                }
                found
            })
            .collect()
    }

    fn breadth_first(&self, connections: &[&ActiveConnection], urls: &[SoundUrl]) -> Vec<Strategy> {
        urls.iter()
            .flat_map(move |url| {
                connections
                    .iter()
                    .filter(move |c| c.connection.can_play(url))
                    .map(move |c| self.strategy(c, url))
            })
            .collect()
    }

    fn strategy(&self, connection: &ActiveConnection, url: &SoundUrl) -> Strategy {
        let shared = self.is_mobile_device || self.always_use_single_audio_element;
        Strategy {
            connection_name: connection.name.clone(),
            connection: Arc::clone(&connection.connection),
            url: url.clone(),
            shared_audio_access: if shared {
                self.shared_audio_access.clone()
            } else {
                None
            },
        }
    }
}
