//! Facade over the hifi workspace crates.
//!
//! Hosts can depend on `hifi` alone: the playback engine is re-exported at the
//! root, the runtime and bridge crates under their own names.
//!
//! ```no_run
//! # async fn run() -> hifi::Result<()> {
//! let config = hifi::CoreConfig::builder()
//!     .connection("DummyConnection", serde_json::json!({}))
//!     .build()?;
//! let player = hifi::Player::new(config)?;
//! player.play("/good/1000/song.mp3", hifi::LoadOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub use bridge_traits as bridge;
pub use core_playback::*;
pub use core_runtime as runtime;
pub use core_runtime::{CoreConfig, CoreConfigBuilder};
