//! Alert thresholds and partial overrides

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Numeric knobs for every alert rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Sadness probability at or above which an episode is in progress
    pub sadness_threshold: f64,
    pub sadness_duration_ms: i64,
    /// Attention score below which an episode is in progress
    pub attention_threshold: f64,
    pub attention_duration_ms: i64,
    /// Normal blink rate bounds (blinks per minute, inclusive)
    pub blink_rate_min: u32,
    pub blink_rate_max: u32,
    /// Time without a detected face before alerting
    pub inactivity_duration_ms: i64,
    /// Mean pain blendshape activation at or above which to alert
    pub pain_threshold: f64,
    /// Engagement score below which an episode is in progress
    pub engagement_threshold: f64,
    pub engagement_duration_ms: i64,
    /// Minimum interval between two alerts of the same type
    pub cooldown_ms: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            sadness_threshold: 0.4,
            sadness_duration_ms: 2 * 60_000,
            attention_threshold: 0.4,
            attention_duration_ms: 60_000,
            blink_rate_min: 8,
            blink_rate_max: 30,
            inactivity_duration_ms: 5 * 60_000,
            pain_threshold: 0.5,
            engagement_threshold: 0.3,
            engagement_duration_ms: 3 * 60_000,
            cooldown_ms: 5 * 60_000,
        }
    }
}

/// Partial override of [`AlertThresholds`]; absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sadness_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sadness_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attention_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blink_rate_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blink_rate_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pain_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<i64>,
}

impl ThresholdOverrides {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AlertThresholds {
    /// Apply overrides on top of the current values, without validation
    pub fn merge(&self, overrides: &ThresholdOverrides) -> Self {
        Self {
            sadness_threshold: overrides.sadness_threshold.unwrap_or(self.sadness_threshold),
            sadness_duration_ms: overrides
                .sadness_duration_ms
                .unwrap_or(self.sadness_duration_ms),
            attention_threshold: overrides
                .attention_threshold
                .unwrap_or(self.attention_threshold),
            attention_duration_ms: overrides
                .attention_duration_ms
                .unwrap_or(self.attention_duration_ms),
            blink_rate_min: overrides.blink_rate_min.unwrap_or(self.blink_rate_min),
            blink_rate_max: overrides.blink_rate_max.unwrap_or(self.blink_rate_max),
            inactivity_duration_ms: overrides
                .inactivity_duration_ms
                .unwrap_or(self.inactivity_duration_ms),
            pain_threshold: overrides.pain_threshold.unwrap_or(self.pain_threshold),
            engagement_threshold: overrides
                .engagement_threshold
                .unwrap_or(self.engagement_threshold),
            engagement_duration_ms: overrides
                .engagement_duration_ms
                .unwrap_or(self.engagement_duration_ms),
            cooldown_ms: overrides.cooldown_ms.unwrap_or(self.cooldown_ms),
        }
    }

    /// Defaults with `overrides` applied, validated
    pub fn with_overrides(overrides: &ThresholdOverrides) -> Result<Self, ComputeError> {
        let thresholds = Self::default().merge(overrides);
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        let scores = [
            ("sadness_threshold", self.sadness_threshold),
            ("attention_threshold", self.attention_threshold),
            ("pain_threshold", self.pain_threshold),
            ("engagement_threshold", self.engagement_threshold),
        ];
        for (name, value) in scores {
            if !(0.0..=1.0).contains(&value) {
                return Err(ComputeError::InvalidThresholds(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let durations = [
            ("sadness_duration_ms", self.sadness_duration_ms),
            ("attention_duration_ms", self.attention_duration_ms),
            ("inactivity_duration_ms", self.inactivity_duration_ms),
            ("engagement_duration_ms", self.engagement_duration_ms),
            ("cooldown_ms", self.cooldown_ms),
        ];
        for (name, value) in durations {
            if value < 0 {
                return Err(ComputeError::InvalidThresholds(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }

        if self.blink_rate_min > self.blink_rate_max {
            return Err(ComputeError::InvalidThresholds(format!(
                "blink_rate_min ({}) exceeds blink_rate_max ({})",
                self.blink_rate_min, self.blink_rate_max
            )));
        }

        Ok(())
    }
}
