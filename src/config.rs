//! Monitor configuration file

use crate::alerts::{AlertThresholds, ThresholdOverrides};
use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Session configuration, as read from a JSON file
///
/// ```json
/// {
///   "thresholds": { "sadness_threshold": 0.5, "cooldown_ms": 600000 },
///   "alert_log": "alerts.ndjson"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub thresholds: ThresholdOverrides,
    /// Append emitted alerts to this NDJSON file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_log: Option<PathBuf>,
}

impl MonitorConfig {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// Defaults merged with the configured overrides, validated
    pub fn resolved_thresholds(&self) -> Result<AlertThresholds, ComputeError> {
        AlertThresholds::with_overrides(&self.thresholds)
    }
}
