//! # Sound Resolver
//!
//! Walks a [`StrategyPlan`] one strategy at a time until a sound loads.
//!
//! Each attempt creates a sound through the strategy's connection and waits
//! for it to settle. A failed attempt is recorded as a [`Failure`] and its
//! sound torn down; the first sound that becomes ready ends the pass.
//! Strategies after the winner are never attempted.

use crate::error::{PlaybackError, Result};
use crate::connection::SoundRequest;
use crate::sound::{LoadState, Sound, SoundSignals};
use crate::strategy::{Strategy, StrategyPlan};
use crate::url::LoadOptions;
use core_runtime::logging::redact_url;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// A failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub url: String,
    pub connection_name: String,
    pub error: String,
}

impl Failure {
    fn new(strategy: &Strategy, error: impl Into<String>) -> Self {
        Self {
            url: strategy.url.url.clone(),
            connection_name: strategy.connection_name.clone(),
            error: error.into(),
        }
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub sound: Sound,
    /// Attempts that failed before `sound` loaded, in attempt order
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassState {
    Searching,
    Succeeded,
    Exhausted,
}

/// Bookkeeping for one resolution pass.
struct ResolutionPass {
    state: PassState,
    failures: Vec<Failure>,
    attempts: usize,
    started: Instant,
}

impl ResolutionPass {
    fn new() -> Self {
        Self {
            state: PassState::Searching,
            failures: Vec::new(),
            attempts: 0,
            started: Instant::now(),
        }
    }

    fn begin_attempt(&mut self) {
        debug_assert_eq!(self.state, PassState::Searching);
        self.attempts += 1;
    }

    fn fail(&mut self, failure: Failure) {
        debug_assert_eq!(self.state, PassState::Searching);
        debug!(
            url = %redact_url(&failure.url),
            connection = %failure.connection_name,
            error = %failure.error,
            "attempt failed"
        );
        self.failures.push(failure);
    }

    fn succeed(mut self, sound: Sound) -> LoadResult {
        self.state = PassState::Succeeded;
        info!(
            url = %redact_url(sound.url().as_str()),
            connection = %sound.connection_name(),
            attempts = self.attempts,
            elapsed_ms = self.elapsed_ms(),
            "sound resolved"
        );
        LoadResult {
            sound,
            failures: self.failures,
        }
    }

    fn exhaust(mut self) -> PlaybackError {
        self.state = PassState::Exhausted;
        warn!(
            attempts = self.attempts,
            failures = self.failures.len(),
            elapsed_ms = self.elapsed_ms(),
            "no playable source"
        );
        PlaybackError::Exhausted {
            failures: self.failures,
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

/// Executes strategy plans.
#[derive(Debug, Clone, Default)]
pub struct SoundResolver {
    load_timeout: Option<Duration>,
}

impl SoundResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail an attempt whose sound has not settled after `timeout`.
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Tries each strategy in order and returns the first sound that loads.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::Exhausted`] with every attempted strategy's failure
    /// when none loads. Strategies whose connection is no longer usable are
    /// skipped without a failure.
    #[instrument(skip_all, fields(kind = ?plan.kind, strategies = plan.len()))]
    pub async fn resolve(&self, plan: &StrategyPlan, options: &LoadOptions) -> Result<LoadResult> {
        let mut pass = ResolutionPass::new();

        for strategy in &plan.strategies {
            if !strategy.connection.can_use_connection() {
                debug!(connection = %strategy.connection_name, "connection unusable, skipping");
                continue;
            }

            pass.begin_attempt();
            match self.attempt(strategy, options).await {
                Ok(sound) => return Ok(pass.succeed(sound)),
                Err(failure) => pass.fail(failure),
            }
        }

        Err(pass.exhaust())
    }

    async fn attempt(&self, strategy: &Strategy, options: &LoadOptions) -> std::result::Result<Sound, Failure> {
        debug!(
            url = %redact_url(strategy.url.as_str()),
            connection = %strategy.connection_name,
            "attempting"
        );

        let signals = SoundSignals::new(strategy.url.url.clone());
        let request = SoundRequest {
            url: strategy.url.clone(),
            options: options.clone(),
            shared_audio_access: strategy.shared_audio_access.clone(),
            signals: signals.clone(),
        };

        let backend = strategy
            .connection
            .create(request)
            .await
            .map_err(|e| Failure::new(strategy, e.to_string()))?;

        let sound = Sound::new(
            strategy.url.clone(),
            strategy.connection_name.clone(),
            options.metadata.clone(),
            signals,
            backend,
            strategy.shared_audio_access.clone(),
        );

        let state = match self.load_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, sound.wait_until_loaded()).await {
                Ok(state) => state,
                Err(_) => {
                    sound.abandon();
                    sound.teardown();
                    return Err(Failure::new(
                        strategy,
                        PlaybackError::Timeout(timeout.as_millis() as u64).to_string(),
                    ));
                }
            },
            None => sound.wait_until_loaded().await,
        };

        match state {
            LoadState::Ready => Ok(sound),
            LoadState::Failed(reason) => {
                sound.teardown();
                Err(Failure::new(strategy, reason))
            }
            LoadState::Abandoned | LoadState::Loading => {
                sound.teardown();
                Err(Failure::new(strategy, "abandoned before loading"))
            }
        }
    }
}
