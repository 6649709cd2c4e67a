//! Position polling task.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::warn;

/// Runs a callback every `period` on the tokio runtime until dropped.
///
/// The first call happens one period after start.
#[derive(Debug)]
pub struct PositionTicker {
    handle: JoinHandle<()>,
}

impl PositionTicker {
    /// Returns `None` (and logs) when called outside a tokio runtime.
    pub fn start<F>(period: Duration, mut poll: F) -> Option<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("no tokio runtime, position polling disabled");
                return None;
            }
        };

        let handle = runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                poll();
            }
        });

        Some(Self { handle })
    }

}

impl Drop for PositionTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
