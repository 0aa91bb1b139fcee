//! Reconciler: per-device fetch → compare → publish loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::FetchError;
use crate::models::{DeviceDescriptor, DeviceSnapshot};
use crate::sink::LevelSink;
use crate::source::LevelSource;

/// What a single poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Value differed from the last published one and was sent to the sink
    Published(i64),
    /// Value matched the last published one; sink not called
    Unchanged(i64),
    /// Fetch failed; state untouched apart from failure bookkeeping
    Failed(FetchError),
    /// Another poll for this device was still in flight
    Skipped,
}

#[derive(Debug, Default)]
struct LevelState {
    last_published: Option<i64>,
    /// Last level reported at info; smaller moves only log at debug
    last_logged: Option<i64>,
    consecutive_failures: u32,
    last_error: Option<String>,
    last_attempt_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
}

/// Single-slot in-flight marker, released on drop so a cancelled poll
/// cannot wedge the device.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Reconciler {
    device: DeviceDescriptor,
    source: Arc<dyn LevelSource>,
    sink: Arc<dyn LevelSink>,
    state: RwLock<LevelState>,
    in_flight: AtomicBool,
    failure_threshold: u32,
}

impl Reconciler {
    pub fn new(
        device: DeviceDescriptor,
        source: Arc<dyn LevelSource>,
        sink: Arc<dyn LevelSink>,
        failure_threshold: u32,
    ) -> Self {
        Self {
            device,
            source,
            sink,
            state: RwLock::new(LevelState::default()),
            in_flight: AtomicBool::new(false),
            failure_threshold,
        }
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Last published level, without fetching. `None` until the first success.
    pub async fn get_level(&self) -> Option<i64> {
        self.state.read().await.last_published
    }

    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        let state = self.state.read().await;
        DeviceSnapshot {
            identifier: self.device.identifier.clone(),
            name: self.device.name.clone(),
            mode: self.device.mode,
            level: state.last_published,
            polling: self.is_polling(),
            consecutive_failures: state.consecutive_failures,
            last_error: state.last_error.clone(),
            last_attempt_at: state.last_attempt_at,
            last_success_at: state.last_success_at,
        }
    }

    /// Run one fetch/compare/publish cycle.
    ///
    /// At most one cycle runs per device; a call that overlaps an in-flight
    /// cycle returns `Skipped` without fetching.
    pub async fn poll_once(&self) -> PollOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(
                "[Poller] {} ({}) still polling, dropping tick",
                self.device.name,
                self.device.identifier
            );
            return PollOutcome::Skipped;
        };

        match self.source.fetch(&self.device).await {
            Ok(value) => self.apply(value).await,
            Err(e) => self.record_failure(e).await,
        }
    }

    async fn apply(&self, value: i64) -> PollOutcome {
        let now = Utc::now();
        let mut state = self.state.write().await;

        if self.failure_threshold > 0 && state.consecutive_failures >= self.failure_threshold {
            tracing::info!(
                "[Poller] {} ({}) recovered after {} failed polls",
                self.device.name,
                self.device.identifier,
                state.consecutive_failures
            );
        }

        let changed = state.last_published != Some(value);

        state.last_published = Some(value);
        state.consecutive_failures = 0;
        state.last_error = None;
        state.last_attempt_at = Some(now);
        state.last_success_at = Some(now);

        if !changed {
            return PollOutcome::Unchanged(value);
        }

        tracing::debug!(
            "[Poller] update {} ({}) -> {}",
            self.device.name,
            self.device.identifier,
            value
        );

        let significant = state
            .last_logged
            .map_or(true, |prev| prev.abs_diff(value) > 1);
        if significant {
            tracing::info!("[Poller] {}: {}%", self.device.name, value);
            state.last_logged = Some(value);
        }

        drop(state);

        self.sink.publish(&self.device.identifier, value);
        PollOutcome::Published(value)
    }

    async fn record_failure(&self, error: FetchError) -> PollOutcome {
        let mut state = self.state.write().await;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_error = Some(error.to_string());
        state.last_attempt_at = Some(Utc::now());

        match &error {
            FetchError::Timeout => tracing::warn!(
                "[Poller] {} ({}) timed out via {} source, skipping cycle",
                self.device.name,
                self.device.identifier,
                self.source.name()
            ),
            e => tracing::warn!(
                "[Poller] {} ({}) {} fetch failed ({}): {}, skipping cycle",
                self.device.name,
                self.device.identifier,
                self.source.name(),
                e.kind(),
                e
            ),
        }

        if state.consecutive_failures == self.failure_threshold {
            tracing::warn!(
                "[Poller] {} ({}) unreachable: {} consecutive failures, level held at {:?}",
                self.device.name,
                self.device.identifier,
                state.consecutive_failures,
                state.last_published
            );
        }

        PollOutcome::Failed(error)
    }

    /// Start the background loop: poll now, then every `period`, until stopped.
    pub fn spawn(self: Arc<Self>, period: Duration) -> ReconcilerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(period, shutdown_rx));

        ReconcilerHandle {
            task,
            shutdown: shutdown_tx,
        }
    }

    async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "[Poller] Starting {} ({}, {} source, interval: {}s)",
            self.device.name,
            self.device.identifier,
            self.source.name(),
            period.as_secs()
        );

        // First tick completes immediately; late ticks are dropped, not bunched
        let mut timer = time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "[Poller] Stopped {} ({})",
            self.device.name,
            self.device.identifier
        );
    }
}

/// Owner's handle to a running reconciler loop
pub struct ReconcilerHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ReconcilerHandle {
    /// Signal the loop to exit and wait for it. An in-flight poll finishes first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!("[Poller] Reconciler task failed: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
