//! Cloud source: reads the pre-computed level from the vendor API

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{number_field, to_level, LevelSource};
use crate::error::FetchError;
use crate::models::DeviceDescriptor;

const LEVEL_FIELD: &str = "percentLevel";

pub struct PublicSource {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl PublicSource {
    pub fn new(client: reqwest::Client, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("cloud base URL cannot carry a path: {}", base_url);
        }

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// `{base}/device/{identifier}`, with the identifier percent-encoded
    pub fn device_url(&self, identifier: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["device", identifier]);
        }
        url
    }

    /// Extract `percentLevel` from a response body
    pub fn parse_level(body: &str) -> Result<i64, FetchError> {
        let value: Value = serde_json::from_str(body)?;
        to_level(number_field(&value, LEVEL_FIELD)?)
    }
}

#[async_trait]
impl LevelSource for PublicSource {
    async fn fetch(&self, device: &DeviceDescriptor) -> Result<i64, FetchError> {
        let url = self.device_url(&device.identifier);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Network(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Self::parse_level(&body)
    }

    fn name(&self) -> &'static str {
        "public"
    }
}
