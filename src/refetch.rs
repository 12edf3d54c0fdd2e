//! Refetch orchestration for cached resources
//!
//! Provides the `RefetchController` that drives fetches against the resource
//! store (staleness checks, manual refetch, bounded retry with backoff) and
//! a background `RefreshHandle` that re-runs `ensure_fresh` on a timer so
//! data stays current without any UI involvement.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::cache::{EntrySnapshot, ResourceStore};
use crate::data::{FetchError, Fetcher};

/// Retry policy for failed fetches
///
/// Only network errors are retried; a malformed payload will not improve on
/// a second attempt, so decode errors settle immediately. Backoff grows
/// exponentially: `initial_backoff * backoff_multiplier^(attempt - 1)`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total fetch attempts before settling on the final error (minimum 1)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Factor applied to the backoff after each failed attempt
    pub backoff_multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2,
        }
    }
}

/// How a fetch run should treat an already-loading entry
enum StartMode {
    /// Do not start a duplicate; return the in-flight entry's snapshot
    Deduplicated,
    /// Start regardless, superseding the in-flight fetch
    Superseding,
}

/// Drives fetch execution and records outcomes in the resource store
///
/// The controller owns the retry policy and the at-most-one-in-flight
/// guarantee; the fetcher itself performs single attempts only. Construct
/// one explicitly at startup and hand it (via `Arc`) to whatever needs to
/// trigger fetches; there is no global instance.
pub struct RefetchController<T> {
    store: Arc<ResourceStore<T>>,
    fetcher: Arc<dyn Fetcher<T>>,
    retry: RetryConfig,
}

impl<T: Clone + Send + 'static> RefetchController<T> {
    /// Creates a controller over the given store and fetcher
    pub fn new(
        store: Arc<ResourceStore<T>>,
        fetcher: Arc<dyn Fetcher<T>>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            retry,
        }
    }

    /// The store this controller records results into
    pub fn store(&self) -> &Arc<ResourceStore<T>> {
        &self.store
    }

    /// Fetches `key` only if its entry is missing or stale
    ///
    /// Fresh entries are returned as-is without touching the network. A
    /// stale entry that is already loading is not fetched again.
    pub async fn ensure_fresh(&self, key: &str, stale_time: Duration) -> EntrySnapshot<T> {
        if !self.store.is_stale(key, stale_time, Utc::now()) {
            return self.store.get_or_create(key);
        }
        self.run(key, StartMode::Deduplicated).await
    }

    /// Unconditionally re-fetches `key`
    ///
    /// If a fetch is already in flight the call starts no second request and
    /// returns the current `Loading` snapshot; completion is observed via
    /// subscription or a later snapshot read.
    pub async fn refetch(&self, key: &str) -> EntrySnapshot<T> {
        self.run(key, StartMode::Deduplicated).await
    }

    /// Starts a new fetch for `key`, superseding any fetch in flight
    ///
    /// The superseded fetch keeps running but its result is discarded when
    /// it resolves, so the entry always reflects the last-started fetch.
    pub async fn force_refetch(&self, key: &str) -> EntrySnapshot<T> {
        self.run(key, StartMode::Superseding).await
    }

    /// Runs the fetch-retry loop for one ticket and returns the settled
    /// entry snapshot
    async fn run(&self, key: &str, mode: StartMode) -> EntrySnapshot<T> {
        let ticket = match mode {
            StartMode::Deduplicated => match self.store.begin_fetch(key) {
                Some(ticket) => ticket,
                // Already in flight; report current state instead
                None => return self.store.get_or_create(key),
            },
            StartMode::Superseding => self.store.begin_fetch_superseding(key),
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1u32;

        loop {
            match self.fetcher.fetch(ticket.key()).await {
                Ok(value) => {
                    self.store.complete_success(&ticket, value, Utc::now());
                    break;
                }
                Err(error) => {
                    if !self.store.is_current(&ticket) {
                        // Superseded mid-flight; abandon without completing
                        break;
                    }
                    let retryable = matches!(error, FetchError::Network(_));
                    if !retryable || attempt >= max_attempts {
                        self.store.complete_error(&ticket, error);
                        break;
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(self.retry.backoff_multiplier);
                    attempt += 1;
                }
            }
        }

        self.store.get_or_create(key)
    }
}

/// Configuration for the background refresh timer
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// How often to re-check freshness
    pub interval: Duration,
    /// Staleness threshold passed to `ensure_fresh`
    pub stale_time: Duration,
    /// Whether background refresh runs at all
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_time: Duration::from_secs(30),
            enabled: true,
        }
    }
}

/// Handle for controlling the background refresh task
pub struct RefreshHandle {
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Spawns a background task that keeps `key` fresh
    ///
    /// The task fires `ensure_fresh` every `config.interval`; the controller
    /// decides whether a network fetch is actually needed. No task is
    /// spawned when refresh is disabled or the interval is zero.
    pub fn spawn<T: Clone + Send + 'static>(
        config: RefreshConfig,
        controller: Arc<RefetchController<T>>,
        key: impl Into<String>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled && !config.interval.is_zero() {
            let key = key.into();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            controller.ensure_fresh(&key, config.stale_time).await;
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self { shutdown_tx }
    }

    /// Shuts down the background refresh task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
