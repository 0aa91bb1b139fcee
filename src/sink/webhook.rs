//! Webhook sink: POSTs accepted level changes as JSON

use chrono::Utc;
use serde::Serialize;
use url::Url;

use super::LevelSink;

#[derive(Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
}

#[derive(Debug, Serialize)]
pub struct LevelPayload {
    pub device: String,
    pub level: i64,
    pub timestamp: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            url: Url::parse(url)?,
        })
    }

    /// Send one payload and wait for the response
    pub async fn deliver(&self, payload: &LevelPayload) -> Result<(), String> {
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }

        Ok(())
    }
}

impl LevelSink for WebhookSink {
    fn publish(&self, device_id: &str, value: i64) {
        let payload = LevelPayload {
            device: device_id.to_string(),
            level: value,
            timestamp: Utc::now().to_rfc3339(),
        };

        let sink = self.clone();

        tokio::spawn(async move {
            match sink.deliver(&payload).await {
                Ok(()) => {
                    tracing::debug!("[Webhook] Delivered {}={}", payload.device, payload.level)
                }
                Err(e) => tracing::warn!(
                    "[Webhook] Delivery failed for {}={}: {}",
                    payload.device,
                    payload.level,
                    e
                ),
            }
        });
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
