//! Level sources - fetch a reading from a sensor backend and normalize it

mod local;
mod public;

pub use self::local::LocalSource;
pub use self::public::PublicSource;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::models::{BackendMode, DeviceDescriptor};

/// Level source trait
#[async_trait]
pub trait LevelSource: Send + Sync {
    /// Fetch the current calibrated level (integer percentage) for a device
    async fn fetch(&self, device: &DeviceDescriptor) -> Result<i64, FetchError>;

    /// Get the source name
    fn name(&self) -> &'static str;
}

/// One shared instance per backend; devices resolve theirs once at startup.
#[derive(Clone)]
pub struct Sources {
    local: Arc<LocalSource>,
    public: Arc<PublicSource>,
}

impl Sources {
    pub fn new(cloud_base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(3)))
            .build()?;

        Ok(Self {
            local: Arc::new(LocalSource::new(client.clone(), timeout)),
            public: Arc::new(PublicSource::new(client, cloud_base_url, timeout)?),
        })
    }

    pub fn for_mode(&self, mode: BackendMode) -> Arc<dyn LevelSource> {
        match mode {
            BackendMode::Local => self.local.clone(),
            BackendMode::Public => self.public.clone(),
        }
    }
}

/// Local-mode calibration: `round((reading - zero) * factor)`, half rounding up.
pub fn calibrate(reading: f64, zero: f64, factor: f64) -> Result<i64, FetchError> {
    to_level((reading - zero) * factor)
}

/// Round to the nearest integer (x.5 goes up) and reject values that do not fit.
pub(crate) fn to_level(value: f64) -> Result<i64, FetchError> {
    // No `(value + 0.5).floor()`: that sum itself rounds in f64
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1.0 } else { floor };

    // 2^63 is exactly representable; anything at or beyond it overflows i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if !rounded.is_finite() || rounded >= LIMIT || rounded < -LIMIT {
        return Err(FetchError::Malformed(format!("level out of range: {}", value)));
    }

    Ok(rounded as i64)
}

/// Read a numeric field, accepting JSON numbers and numeric strings
pub(crate) fn number_field(object: &Value, field: &str) -> Result<f64, FetchError> {
    let value = object
        .get(field)
        .ok_or_else(|| FetchError::Malformed(format!("missing field '{}'", field)))?;

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(FetchError::Malformed(format!(
            "field '{}' is not a finite number: {}",
            field, value
        ))),
    }
}
