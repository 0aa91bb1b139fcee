//! Data models for ptlevel-sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Device Models
// ============================================================================

/// Which upstream a device is read from. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendMode {
    #[default]
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "public")]
    Public,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Local => write!(f, "local"),
            BackendMode::Public => write!(f, "public"),
        }
    }
}

impl std::str::FromStr for BackendMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localapi" => Ok(BackendMode::Local),
            "public" | "publicapi" => Ok(BackendMode::Public),
            _ => Err(format!("Unknown backend mode: {}", s)),
        }
    }
}

/// Immutable per-device settings, owned by the device's reconciler.
///
/// `identifier` is the LAN host (optionally `host:port`) in local mode and the
/// cloud device id in public mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescriptor {
    pub identifier: String,
    pub name: String,
    pub calibration_factor: f64,
    pub mode: BackendMode,
}

// ============================================================================
// Status Models
// ============================================================================

/// Point-in-time view of one device's reconciler state
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub identifier: String,
    pub name: String,
    pub mode: BackendMode,
    pub level: Option<i64>,
    pub polling: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Body of `GET /api/devices/:id/level`
#[derive(Debug, Clone, Serialize)]
pub struct LevelResponse {
    pub identifier: String,
    pub level: Option<i64>,
}

/// Result of a manual refresh request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Published,
    Unchanged,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub identifier: String,
    pub status: RefreshStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
