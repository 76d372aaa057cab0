//! Background refresh loop.
//!
//! Polling the repository and tag counts is far cheaper than a crawl, so the
//! counts serve as the change detector: a crawl runs only when either count
//! grows. Deleted repositories, deleted tags and a tag re-pointed at a new
//! manifest do not change the counts upward and go unnoticed until the next
//! growth.

use crate::aggregator::Aggregator;
use crate::cache::MetadataCache;
use layerindex_common::Result;
use layerindex_domain::image::store::SnapshotStore;
use layerindex_domain::registry::{RegistryCounts, RegistrySource};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    pub crawl_concurrency: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            crawl_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Idle,
    Counting,
    Refreshing,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatcherStatus {
    pub state: WatcherState,
    /// Counts the current index was built against.
    pub counts: RegistryCounts,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_refresh: Option<OffsetDateTime>,
    pub refreshes: u64,
    pub images: usize,
}

impl Default for WatcherStatus {
    fn default() -> Self {
        Self {
            state: WatcherState::Idle,
            counts: RegistryCounts::default(),
            last_refresh: None,
            refreshes: 0,
            images: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Unchanged,
    Refreshed,
    CountFailed,
    RefreshFailed,
}

pub struct Watcher<R: ?Sized, S: ?Sized> {
    registry: Arc<R>,
    store: Arc<S>,
    cache: Arc<MetadataCache>,
    config: WatcherConfig,
    last_counts: RegistryCounts,
    status: watch::Sender<WatcherStatus>,
}

impl<R, S> Watcher<R, S>
where
    R: RegistrySource + ?Sized,
    S: SnapshotStore + ?Sized,
{
    pub fn new(registry: Arc<R>, store: Arc<S>, cache: Arc<MetadataCache>, config: WatcherConfig) -> Self {
        let (status, _) = watch::channel(WatcherStatus {
            images: cache.len(),
            ..WatcherStatus::default()
        });
        Self {
            registry,
            store,
            cache,
            config,
            last_counts: RegistryCounts::default(),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WatcherStatus> {
        self.status.subscribe()
    }

    pub fn last_counts(&self) -> RegistryCounts {
        self.last_counts
    }

    fn set_state(&self, state: WatcherState) {
        self.status.send_modify(|s| s.state = state);
    }

    /// Takes the baseline counts and rebuilds the index from scratch.
    ///
    /// An existing snapshot is never trusted for this first population. The
    /// baseline is only kept once the crawl succeeds; until then any
    /// non-empty registry counts as growth on the next poll.
    pub async fn start(&mut self) -> PollOutcome {
        self.set_state(WatcherState::Counting);
        let baseline = match self.registry.counts().await {
            Ok(counts) => counts,
            Err(e) => {
                error!(error = %e, "Failed to count registry contents, assuming an empty registry");
                RegistryCounts::default()
            }
        };
        info!(repositories = baseline.repositories, tags = baseline.tags, "Registry baseline taken");

        if self.store.exists().await {
            info!(snapshot = %self.store.location(), "Existing snapshot will be rebuilt from the registry");
        } else {
            info!(snapshot = %self.store.location(), "No snapshot found, building one");
        }

        let outcome = match self.refresh().await {
            Ok(_) => {
                self.last_counts = baseline;
                self.status.send_modify(|s| s.counts = baseline);
                PollOutcome::Refreshed
            }
            Err(e) => {
                error!(error = %e, "Initial crawl failed, retrying on the next poll");
                PollOutcome::RefreshFailed
            }
        };
        self.set_state(WatcherState::Idle);
        outcome
    }

    /// One detection step: recount, and crawl if the registry grew.
    pub async fn poll_once(&mut self) -> PollOutcome {
        self.set_state(WatcherState::Counting);

        let outcome = match self.registry.counts().await {
            Err(e) => {
                warn!(error = %e, "Failed to count registry contents");
                PollOutcome::CountFailed
            }
            Ok(counts) if !counts.grew_from(&self.last_counts) => {
                debug!(repositories = counts.repositories, tags = counts.tags, "Registry unchanged");
                PollOutcome::Unchanged
            }
            Ok(counts) => {
                info!(
                    repositories = counts.repositories,
                    tags = counts.tags,
                    previous_repositories = self.last_counts.repositories,
                    previous_tags = self.last_counts.tags,
                    "Registry grew, refreshing metadata"
                );
                match self.refresh().await {
                    Ok(_) => {
                        self.last_counts = counts;
                        self.status.send_modify(|s| s.counts = counts);
                        PollOutcome::Refreshed
                    }
                    Err(e) => {
                        error!(error = %e, "Refresh failed, keeping previous metadata");
                        PollOutcome::RefreshFailed
                    }
                }
            }
        };

        self.set_state(WatcherState::Idle);
        outcome
    }

    /// Crawls, swaps the result into the cache and persists it.
    ///
    /// A crawl error leaves cache and snapshot untouched. A save error is
    /// logged only; the cache keeps the new index.
    async fn refresh(&mut self) -> Result<usize> {
        self.set_state(WatcherState::Refreshing);

        let index = Aggregator::new(&*self.registry)
            .with_concurrency(self.config.crawl_concurrency)
            .crawl()
            .await?;
        let images = index.len();
        let current = self.cache.replace(index);

        if let Err(e) = self.store.save(&current).await {
            error!(error = %e, snapshot = %self.store.location(), "Failed to persist metadata snapshot");
        }

        self.status.send_modify(|s| {
            s.last_refresh = Some(OffsetDateTime::now_utc());
            s.refreshes += 1;
            s.images = images;
        });
        info!(images, "Metadata cache refreshed");
        Ok(images)
    }

    /// Runs until `cancel` fires. A crawl already under way finishes first.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(interval_secs = self.config.poll_interval.as_secs(), "Watcher started");

        if !cancel.is_cancelled() {
            self.start().await;
        }

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the baseline was just taken.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }

        self.set_state(WatcherState::Cancelled);
        info!("Watcher stopped");
    }
}
