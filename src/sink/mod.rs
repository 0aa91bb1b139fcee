//! Level sinks - receive accepted level changes
//!
//! - `LogSink`: writes accepted changes to the log
//! - `WebhookSink`: forwards accepted changes to an HTTP endpoint

mod webhook;

pub use self::webhook::WebhookSink;

use std::sync::Arc;

use crate::config::SinkConfig;

/// Accessory-state sink.
///
/// `publish` must not block: the reconciler calls it inline. Implementations
/// must tolerate repeated values and values arriving out of order.
pub trait LevelSink: Send + Sync {
    fn publish(&self, device_id: &str, value: i64);

    /// Get the sink name
    fn name(&self) -> &'static str;
}

/// Sink used when nothing downstream is configured
#[derive(Debug, Default)]
pub struct LogSink;

impl LevelSink for LogSink {
    fn publish(&self, device_id: &str, value: i64) {
        tracing::info!("[Sink] {} level={}", device_id, value);
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Pick the sink from configuration
pub fn from_config(config: &SinkConfig) -> anyhow::Result<Arc<dyn LevelSink>> {
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(Arc::new(WebhookSink::new(url)?)),
        _ => Ok(Arc::new(LogSink)),
    }
}
