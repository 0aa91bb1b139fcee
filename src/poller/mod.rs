//! Level polling
//!
//! - `reconciler`: one fetch/compare/publish loop per device
//! - `PollerSet`: owns every device's reconciler and its task handle

pub mod reconciler;

pub use reconciler::{PollOutcome, Reconciler, ReconcilerHandle};

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;

use crate::models::{DeviceDescriptor, DeviceSnapshot};
use crate::sink::LevelSink;
use crate::source::Sources;

/// Every configured device's reconciler, in configuration order
pub struct PollerSet {
    reconcilers: Vec<Arc<Reconciler>>,
    handles: Mutex<Vec<ReconcilerHandle>>,
}

impl PollerSet {
    pub fn new(reconcilers: Vec<Arc<Reconciler>>) -> Self {
        Self {
            reconcilers,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Build one reconciler per device, resolving each device's source once
    pub fn from_devices(
        devices: Vec<DeviceDescriptor>,
        sources: &Sources,
        sink: Arc<dyn LevelSink>,
        failure_threshold: u32,
    ) -> Self {
        let reconcilers = devices
            .into_iter()
            .map(|device| {
                let source = sources.for_mode(device.mode);
                Arc::new(Reconciler::new(
                    device,
                    source,
                    sink.clone(),
                    failure_threshold,
                ))
            })
            .collect();

        Self::new(reconcilers)
    }

    /// Spawn every device loop. Calling again while loops are running is a no-op.
    pub async fn start(&self, period: Duration) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            tracing::warn!("[Poller] Already running {} device loops", handles.len());
            return;
        }

        for reconciler in &self.reconcilers {
            handles.push(reconciler.clone().spawn(period));
        }

        tracing::info!("[Poller] Started {} device loops", handles.len());
    }

    /// Stop every device loop and wait for them to exit
    pub async fn stop_all(&self) {
        let handles: Vec<ReconcilerHandle> = self.handles.lock().await.drain(..).collect();
        if handles.is_empty() {
            return;
        }

        let count = handles.len();
        join_all(handles.into_iter().map(ReconcilerHandle::stop)).await;
        tracing::info!("[Poller] Stopped {} device loops", count);
    }

    pub async fn running(&self) -> usize {
        self.handles
            .lock()
            .await
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<Reconciler>> {
        self.reconcilers
            .iter()
            .find(|r| r.device().identifier == identifier)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.reconcilers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reconcilers.is_empty()
    }

    pub async fn snapshots(&self) -> Vec<DeviceSnapshot> {
        join_all(self.reconcilers.iter().map(|r| r.snapshot())).await
    }

    /// Manual poll for one device; `None` if the identifier is unknown
    pub async fn refresh(&self, identifier: &str) -> Option<PollOutcome> {
        let reconciler = self.get(identifier)?;
        Some(reconciler.poll_once().await)
    }
}
