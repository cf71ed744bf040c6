//! The adaptive poller: periodic full-snapshot requests whose cadence
//! rises while jobs are active and falls when the system is idle, plus
//! the async drive loop that combines polling with pushed events.
//!
//! Polling is the correctness backstop and the primary mechanism when
//! push is unavailable; the two tiers differ by roughly an order of
//! magnitude so staleness stays bounded during active work without
//! hammering the server when idle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::broadcast::JobEvent;
use crate::config::PollingConfig;
use crate::job::Job;

use super::reconciler::{ClientEvent, JobReconciler, MergeOutcome};

/// Current polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTier {
    Fast,
    Slow,
}

/// Tier selection logic. Starts in the fast tier so a freshly loaded
/// client notices in-flight work without waiting out a slow-tier cycle.
#[derive(Debug, Clone)]
pub struct AdaptivePoller {
    fast: Duration,
    slow: Duration,
    tier: PollTier,
}

impl AdaptivePoller {
    pub fn new(fast: Duration, slow: Duration) -> Self {
        Self {
            fast,
            slow,
            tier: PollTier::Fast,
        }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(
            Duration::from_secs(config.fast_secs),
            Duration::from_secs(config.slow_secs),
        )
    }

    pub fn tier(&self) -> PollTier {
        self.tier
    }

    pub fn interval(&self) -> Duration {
        match self.tier {
            PollTier::Fast => self.fast,
            PollTier::Slow => self.slow,
        }
    }

    /// Recomputes the tier after a poll from the merged list's
    /// non-terminal count. Returns the new interval only when the tier
    /// actually changed — the caller must not restart a running timer
    /// otherwise.
    pub fn observe(&mut self, non_terminal: usize) -> Option<Duration> {
        let next = if non_terminal > 0 {
            PollTier::Fast
        } else {
            PollTier::Slow
        };
        if next == self.tier {
            return None;
        }
        self.tier = next;
        log::debug!(
            "Polling tier changed to {:?} ({:?})",
            self.tier,
            self.interval()
        );
        Some(self.interval())
    }
}

#[derive(Debug, Error)]
#[error("fetch failed: {0}")]
pub struct FetchError(pub String);

/// Snapshot source the driver polls against — in production an HTTP
/// client for the list/get endpoints.
#[async_trait]
pub trait JobFetch: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Job>, FetchError>;
    async fn fetch_one(&self, id: &str) -> Result<Option<Job>, FetchError>;
}

enum PushSignal {
    Event(JobEvent),
    Lagged,
    Closed,
}

async fn next_push(rx: &mut Option<broadcast::Receiver<JobEvent>>) -> PushSignal {
    let Some(inner) = rx.as_mut() else {
        // No push channel; this arm never fires and polling carries the
        // whole load.
        return std::future::pending().await;
    };
    match inner.recv().await {
        Ok(event) => PushSignal::Event(event),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            log::warn!("Push receiver lagged by {} events", n);
            PushSignal::Lagged
        }
        Err(broadcast::error::RecvError::Closed) => PushSignal::Closed,
    }
}

/// Drives a [`JobReconciler`] from pushed events and adaptive polling,
/// publishing every new merged snapshot on a watch channel.
pub struct PollDriver {
    fetch: Arc<dyn JobFetch>,
    push: Option<broadcast::Receiver<JobEvent>>,
    poller: AdaptivePoller,
    reconciler: JobReconciler,
    snapshot_tx: watch::Sender<Vec<Job>>,
}

impl PollDriver {
    /// Builds a driver and the watch receiver that observes its merged
    /// list. The driver stops when every watch receiver is dropped.
    pub fn new(
        fetch: Arc<dyn JobFetch>,
        push: Option<broadcast::Receiver<JobEvent>>,
        poller: AdaptivePoller,
    ) -> (Self, watch::Receiver<Vec<Job>>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
        (
            Self {
                fetch,
                push,
                poller,
                reconciler: JobReconciler::new(),
                snapshot_tx,
            },
            snapshot_rx,
        )
    }

    /// Runs until all snapshot observers are gone.
    pub async fn run(mut self) {
        let mut push = self.push.take();

        // Immediate initial snapshot; the timer starts counting from here.
        self.poll().await;
        if !self.publish() {
            return;
        }

        let mut ticker = new_ticker(self.poller.interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                    if let Some(interval) = self.poller.observe(self.reconciler.non_terminal_count()) {
                        // Tier flipped: only now is the timer restarted.
                        ticker = new_ticker(interval);
                    }
                    if !self.publish() {
                        return;
                    }
                }
                signal = next_push(&mut push) => {
                    match signal {
                        PushSignal::Event(event) => {
                            self.apply_push(event).await;
                            if !self.publish() {
                                return;
                            }
                        }
                        PushSignal::Lagged => {
                            // Missed deltas are never replayed; resync.
                            self.poll().await;
                            if !self.publish() {
                                return;
                            }
                        }
                        PushSignal::Closed => {
                            log::info!("Push channel closed, falling back to polling only");
                            push = None;
                        }
                    }
                }
            }
        }
    }

    async fn apply_push(&mut self, event: JobEvent) {
        match self.reconciler.merge(event.into()) {
            MergeOutcome::Merged => {}
            MergeOutcome::FetchJob(id) => match self.fetch.fetch_one(&id).await {
                Ok(Some(job)) => {
                    self.reconciler.merge(ClientEvent::Created(job));
                }
                Ok(None) => {
                    log::debug!("Job {} vanished before it could be fetched", id);
                }
                Err(e) => {
                    log::warn!("Failed to fetch job {}: {}", id, e);
                }
            },
            MergeOutcome::Resync => {
                self.poll().await;
            }
        }
    }

    async fn poll(&mut self) {
        match self.fetch.fetch_all().await {
            Ok(jobs) => {
                self.reconciler.merge(ClientEvent::Snapshot(jobs));
            }
            Err(e) => {
                // Keep the stale list; the next tick retries.
                log::warn!("Snapshot poll failed: {}", e);
            }
        }
    }

    fn publish(&self) -> bool {
        self.snapshot_tx.send(self.reconciler.snapshot()).is_ok()
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
