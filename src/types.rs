//! Core types for the Synheart Gaze engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: landmark input, per-frame eye metrics, tracker statistics and alert
//! events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One facial landmark, normalized to the video frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Depth relative to the face, absent for 2D detectors
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 3D Euclidean distance to another landmark
    pub fn distance(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

/// A 2D point in normalized [0,1] eye-relative coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Default for Point2 {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

/// Horizontal gaze bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizontal {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical gaze bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    Up,
    #[default]
    Center,
    Down,
}

/// Estimated gaze direction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazeDirection {
    pub horizontal: Horizontal,
    pub vertical: Vertical,
    /// Horizontal deviation from center (-1 = far left, 1 = far right)
    pub yaw: f64,
    /// Vertical deviation from center (-1 = far up, 1 = far down)
    pub pitch: f64,
}

impl GazeDirection {
    /// Build a direction from raw yaw/pitch, bucketing with the standard deadband
    pub fn from_angles(yaw: f64, pitch: f64) -> Self {
        let yaw = yaw.clamp(-1.0, 1.0);
        let pitch = pitch.clamp(-1.0, 1.0);
        Self {
            horizontal: Horizontal::from_yaw(yaw),
            vertical: Vertical::from_pitch(pitch),
            yaw,
            pitch,
        }
    }

    /// Angular distance from dead center
    pub fn deviation(&self) -> f64 {
        (self.yaw * self.yaw + self.pitch * self.pitch).sqrt()
    }
}

/// Half-width of the "center" bucket on each gaze axis
pub const GAZE_DEADBAND: f64 = 0.15;

impl Horizontal {
    pub fn from_yaw(yaw: f64) -> Self {
        if yaw < -GAZE_DEADBAND {
            Horizontal::Left
        } else if yaw > GAZE_DEADBAND {
            Horizontal::Right
        } else {
            Horizontal::Center
        }
    }
}

impl Vertical {
    pub fn from_pitch(pitch: f64) -> Self {
        if pitch < -GAZE_DEADBAND {
            Vertical::Up
        } else if pitch > GAZE_DEADBAND {
            Vertical::Down
        } else {
            Vertical::Center
        }
    }
}

/// Iris position of each eye relative to its own eye opening
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IrisPosition {
    pub left: Point2,
    pub right: Point2,
}

/// Ocular metrics for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeMetrics {
    /// Left eye aspect ratio (0 = closed, ~0.3 = open)
    pub left_ear: f64,
    /// Right eye aspect ratio
    pub right_ear: f64,
    /// Mean of both eyes
    pub avg_ear: f64,
    /// Eyes considered closed this frame
    pub is_blinking: bool,
    pub gaze_direction: GazeDirection,
    pub iris_position: IrisPosition,
    /// Distance between iris centers, a proxy for distance to camera
    pub pupil_distance: f64,
}

/// Blink statistics over the trailing window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BlinkStats {
    /// Blinks observed since the session started
    pub blink_count: u32,
    /// Blinks observed in the trailing 60 seconds
    pub blink_rate: u32,
    /// Mean duration of blinks in the window (ms)
    pub avg_blink_duration_ms: f64,
    /// When the most recent blink ended
    pub last_blink_time: Option<DateTime<Utc>>,
}

/// Attention estimate over the trailing window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionResult {
    /// 1 = steady centered gaze, 0 = fully averted
    pub attention_score: f64,
    /// Current frame's gaze is outside the looking-away bounds
    pub is_looking_away: bool,
    /// Frames flagged as looking away since the session started
    pub look_away_count: u32,
}

impl Default for AttentionResult {
    fn default() -> Self {
        Self {
            attention_score: 1.0,
            is_looking_away: false,
            look_away_count: 0,
        }
    }
}

/// Alert categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ProlongedSadness,
    LowAttention,
    AbnormalBlinkRate,
    ProlongedInactivity,
    PainDetected,
    LowEngagement,
}

impl AlertType {
    pub const ALL: [AlertType; 6] = [
        AlertType::ProlongedSadness,
        AlertType::LowAttention,
        AlertType::AbnormalBlinkRate,
        AlertType::ProlongedInactivity,
        AlertType::PainDetected,
        AlertType::LowEngagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ProlongedSadness => "prolonged_sadness",
            AlertType::LowAttention => "low_attention",
            AlertType::AbnormalBlinkRate => "abnormal_blink_rate",
            AlertType::ProlongedInactivity => "prolonged_inactivity",
            AlertType::PainDetected => "pain_detected",
            AlertType::LowEngagement => "low_engagement",
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
        }
    }
}

/// A behavioral alert emitted by the alert system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    /// Set by the consumer once the alert has been seen
    pub acknowledged: bool,
}

impl AlertEvent {
    pub(crate) fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        message: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            alert_type,
            severity,
            message,
            acknowledged: false,
        }
    }

    /// Mark the alert as read
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }
}

/// Emotion name → probability, as produced by the expression classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionScores(pub HashMap<String, f64>);

impl EmotionScores {
    pub const SAD: &'static str = "sad";
    pub const HAPPY: &'static str = "happy";
    pub const NEUTRAL: &'static str = "neutral";

    pub fn new() -> Self {
        Self::default()
    }

    /// Probability for `name`, 0 if the classifier did not report it
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn with(mut self, name: impl Into<String>, probability: f64) -> Self {
        self.0.insert(name.into(), probability);
        self
    }
}

impl FromIterator<(String, f64)> for EmotionScores {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Blendshape name → activation score, as produced by the landmark model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlendshapeScores(pub HashMap<String, f64>);

impl BlendshapeScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activation for `name`, 0 if absent
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn with(mut self, name: impl Into<String>, score: f64) -> Self {
        self.0.insert(name.into(), score);
        self
    }
}

impl FromIterator<(String, f64)> for BlendshapeScores {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
