//! LAN source: reads the sensor's own `/get_sensors` endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{calibrate, number_field, LevelSource};
use crate::error::FetchError;
use crate::models::DeviceDescriptor;

/// Zero offset key in a sensor record
const ZERO_KEY: &str = "z";
/// Channel-1 reading key in a sensor record
const READING_KEY: &str = "1";

pub struct LocalSource {
    client: reqwest::Client,
    timeout: Duration,
}

/// Raw local reading, before calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSample {
    pub zero: f64,
    pub reading: f64,
}

// `local_s` is a JSON document embedded as a string
#[derive(Debug, Deserialize)]
struct SensorsEnvelope {
    local_s: String,
}

impl LocalSource {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Parse a `/get_sensors` body into the first record's zero and reading
    pub fn parse_sample(body: &str) -> Result<LocalSample, FetchError> {
        let envelope: SensorsEnvelope = serde_json::from_str(body)?;
        let records: Vec<Value> = serde_json::from_str(&envelope.local_s)?;

        let first = records
            .first()
            .ok_or_else(|| FetchError::Malformed("sensor list is empty".to_string()))?;

        Ok(LocalSample {
            zero: number_field(first, ZERO_KEY)?,
            reading: number_field(first, READING_KEY)?,
        })
    }
}

#[async_trait]
impl LevelSource for LocalSource {
    async fn fetch(&self, device: &DeviceDescriptor) -> Result<i64, FetchError> {
        let url = format!("http://{}/get_sensors", device.identifier);

        let response = self
            .client
            .get(&url)
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
        let sample = Self::parse_sample(&body)?;

        tracing::trace!(
            "[Local] {} zero={} reading={}",
            device.identifier,
            sample.zero,
            sample.reading
        );

        calibrate(sample.reading, sample.zero, device.calibration_factor)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
