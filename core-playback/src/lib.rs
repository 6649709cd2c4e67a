//! # Playback Engine
//!
//! Resolves "play this audio" requests against pluggable playback backends
//! and candidate URLs, then keeps exactly one current sound.
//!
//! ## Overview
//!
//! - [`connection`]: the backend contract and the registry that activates
//!   configured backends
//! - [`sound`]: the playable unit a backend produces
//! - [`strategy`] and [`resolver`]: build the ordered attempt list and walk
//!   it until a sound loads
//! - [`cache`]: memoizes resolved sounds by their URL list
//! - [`coordinator`]: owns the current sound, relays its events and polls
//!   its position
//! - [`player`]: the public service over all of the above
//!
//! ## Usage
//!
//! ```no_run
//! use core_playback::{LoadOptions, Player};
//! use core_runtime::CoreConfig;
//!
//! # async fn run() -> core_playback::Result<()> {
//! let config = CoreConfig::builder()
//!     .connection("DummyConnection", serde_json::json!({}))
//!     .build()?;
//! let player = Player::new(config)?;
//!
//! let result = player
//!     .play(["/bad/1000/first.mp3", "/good/3000/second.mp3"], LoadOptions::default())
//!     .await?;
//! assert_eq!(result.failures.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod connection;
pub mod connections;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod mime;
pub mod player;
pub mod resolver;
pub mod shared_audio;
pub mod sound;
pub mod strategy;
pub mod ticker;
pub mod url;

pub use cache::{CacheKey, LruSoundCache, SoundCache};
pub use connection::{ActiveConnection, Connection, ConnectionRegistry, SoundRequest};
pub use connections::DummyConnection;
pub use coordinator::Coordinator;
pub use error::{PlaybackError, Result};
pub use events::{ListenerId, PlayerEvent, PositionChange, SoundEvent};
pub use player::{Player, PlayerBuilder};
pub use resolver::{Failure, LoadResult, SoundResolver};
pub use shared_audio::SharedAudioAccess;
pub use sound::{LoadState, Sound, SoundBackend, SoundId, SoundSignals, WeakSound};
pub use strategy::{Strategy, StrategyBuilder, StrategyKind, StrategyPlan};
pub use url::{LoadOptions, Metadata, SoundUrl, UrlSource};
