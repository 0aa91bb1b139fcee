//! Configuration module

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::models::{BackendMode, DeviceDescriptor};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_cloud_base_url")]
    pub cloud_base_url: String,
    /// Consecutive failures before a device is reported as unreachable in logs
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Mode for devices that do not name one
    #[serde(default)]
    pub default_mode: BackendMode,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            request_timeout_ms: default_request_timeout(),
            cloud_base_url: default_cloud_base_url(),
            failure_threshold: default_failure_threshold(),
            default_mode: BackendMode::default(),
        }
    }
}

impl PollerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub identifier: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_calibration_factor")]
    pub calibration_factor: f64,
    #[serde(default)]
    pub mode: Option<BackendMode>,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("refresh_interval_secs must be at least 1")]
    ZeroInterval,

    #[error("request_timeout_ms must be at least 1")]
    ZeroTimeout,

    #[error("Invalid cloud_base_url {0}: {1}")]
    InvalidCloudUrl(String, String),

    #[error("Device #{0} has an empty identifier")]
    EmptyIdentifier(usize),

    #[error("Duplicate device identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Device {0} has a non-finite calibration_factor")]
    InvalidCalibration(String),

    #[error("Local device identifier {0} is not a host[:port]")]
    InvalidLocalHost(String),
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8581
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_cloud_base_url() -> String {
    "https://www.mypt.in".to_string()
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_calibration_factor() -> f64 {
    1.0
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("PTLEVEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poller.refresh_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.poller.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Err(e) = url::Url::parse(&self.poller.cloud_base_url) {
            return Err(ConfigError::InvalidCloudUrl(
                self.poller.cloud_base_url.clone(),
                e.to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (index, device) in self.devices.iter().enumerate() {
            let identifier = device.identifier.trim();
            if identifier.is_empty() {
                return Err(ConfigError::EmptyIdentifier(index));
            }
            if !seen.insert(identifier) {
                return Err(ConfigError::DuplicateIdentifier(identifier.to_string()));
            }
            if !device.calibration_factor.is_finite() {
                return Err(ConfigError::InvalidCalibration(identifier.to_string()));
            }
            let mode = device.mode.unwrap_or(self.poller.default_mode);
            if mode == BackendMode::Local && !is_host_and_port(identifier) {
                return Err(ConfigError::InvalidLocalHost(identifier.to_string()));
            }
        }

        Ok(())
    }

    /// Resolve per-device settings against the poller defaults
    pub fn device_descriptors(&self) -> Vec<DeviceDescriptor> {
        self.devices
            .iter()
            .map(|d| {
                let identifier = d.identifier.trim().to_string();
                DeviceDescriptor {
                    name: d.name.clone().unwrap_or_else(|| identifier.clone()),
                    identifier,
                    calibration_factor: d.calibration_factor,
                    mode: d.mode.unwrap_or(self.poller.default_mode),
                }
            })
            .collect()
    }
}

/// Local identifiers become `http://{identifier}/get_sensors`, so they must be
/// a bare host with an optional port.
fn is_host_and_port(identifier: &str) -> bool {
    match url::Url::parse(&format!("http://{}/", identifier)) {
        Ok(url) => {
            url.has_host()
                && url.username().is_empty()
                && url.password().is_none()
                && url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> Config {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(serde_json::json!({}));

        assert_eq!(config.server.port, 8581);
        assert_eq!(config.poller.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.poller.request_timeout(), Duration::from_millis(5000));
        assert_eq!(config.poller.cloud_base_url, "https://www.mypt.in");
        assert_eq!(config.poller.default_mode, BackendMode::Local);
        assert!(config.sink.webhook_url.is_none());
        assert!(config.devices.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_descriptors_apply_defaults() {
        let config = parse(serde_json::json!({
            "poller": { "default_mode": "public" },
            "devices": [
                { "identifier": " 192.168.1.40 ", "name": "Roof tank", "mode": "local", "calibration_factor": 0.25 },
                { "identifier": "cam-123" }
            ]
        }));

        let devices = config.device_descriptors();
        assert_eq!(devices.len(), 2);

        assert_eq!(devices[0].identifier, "192.168.1.40");
        assert_eq!(devices[0].name, "Roof tank");
        assert_eq!(devices[0].mode, BackendMode::Local);
        assert_eq!(devices[0].calibration_factor, 0.25);

        assert_eq!(devices[1].name, "cam-123");
        assert_eq!(devices[1].mode, BackendMode::Public);
        assert_eq!(devices[1].calibration_factor, 1.0);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = parse(serde_json::json!({ "poller": { "refresh_interval_secs": 0 } }));
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let config = parse(serde_json::json!({
            "devices": [ { "identifier": "10.0.0.5" }, { "identifier": "10.0.0.5 " } ]
        }));
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateIdentifier("10.0.0.5".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_empty_identifier() {
        let config = parse(serde_json::json!({ "devices": [ { "identifier": "  " } ] }));
        assert_eq!(config.validate(), Err(ConfigError::EmptyIdentifier(0)));
    }

    #[test]
    fn test_validate_rejects_bad_cloud_url() {
        let config = parse(serde_json::json!({ "poller": { "cloud_base_url": "not a url" } }));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCloudUrl(_, _))
        ));
    }

    #[test]
    fn test_validate_rejects_local_identifier_that_is_not_a_host() {
        for identifier in ["http://10.0.0.5", "10.0.0.5/x", "10.0.0.5?a=1", "user@10.0.0.5"] {
            let config = parse(serde_json::json!({ "devices": [ { "identifier": identifier } ] }));
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidLocalHost(identifier.to_string())),
                "{}",
                identifier
            );
        }
    }

    #[test]
    fn test_validate_accepts_local_hosts_and_public_ids() {
        let config = parse(serde_json::json!({
            "devices": [
                { "identifier": "10.0.0.5" },
                { "identifier": "tank.local:8080" },
                { "identifier": "cam/123", "mode": "public" }
            ]
        }));
        assert!(config.validate().is_ok());
    }
}
