//! Frame input schema
//!
//! One [`FrameInput`] carries everything the external detectors produce for a
//! single camera frame. Frames arrive either as NDJSON (one object per line)
//! or as a JSON array.

use crate::error::ComputeError;
use crate::landmarks::FaceLandmarks;
use crate::types::{BlendshapeScores, EmotionScores};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-frame detector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Capture time of the frame
    pub timestamp: DateTime<Utc>,
    pub face_detected: bool,
    /// Full face mesh with iris points, absent when no face was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<FaceLandmarks>,
    #[serde(default)]
    pub emotions: EmotionScores,
    #[serde(default)]
    pub blendshapes: BlendshapeScores,
}

impl FrameInput {
    /// Frame with no face in view
    pub fn without_face(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            face_detected: false,
            landmarks: None,
            emotions: EmotionScores::default(),
            blendshapes: BlendshapeScores::default(),
        }
    }

    /// Frame with a detected face and its landmarks
    pub fn with_face(timestamp: DateTime<Utc>, landmarks: FaceLandmarks) -> Self {
        Self {
            timestamp,
            face_detected: true,
            landmarks: Some(landmarks),
            emotions: EmotionScores::default(),
            blendshapes: BlendshapeScores::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check detector output for values the engine would silently misread
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.face_detected && self.landmarks.is_some() {
            return Err(ValidationError::LandmarksWithoutFace);
        }

        if let Some(landmarks) = &self.landmarks {
            for (index, point) in landmarks.as_slice().iter().enumerate() {
                if !(point.x.is_finite() && point.y.is_finite() && point.z.is_finite()) {
                    return Err(ValidationError::NonFiniteLandmark { index });
                }
            }
        }

        for (name, value) in &self.emotions.0 {
            if !(0.0..=1.0).contains(value) {
                return Err(ValidationError::ScoreOutOfRange {
                    field: "emotions",
                    name: name.clone(),
                    value: *value,
                });
            }
        }

        for (name, value) in &self.blendshapes.0 {
            if !(0.0..=1.0).contains(value) {
                return Err(ValidationError::ScoreOutOfRange {
                    field: "blendshapes",
                    name: name.clone(),
                    value: *value,
                });
            }
        }

        Ok(())
    }
}

/// Validation errors for frame input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Landmarks supplied but face_detected is false")]
    LandmarksWithoutFace,

    #[error("Landmark {index} has a non-finite coordinate")]
    NonFiniteLandmark { index: usize },

    #[error("{field}.{name} must be within [0, 1], got {value}")]
    ScoreOutOfRange {
        field: &'static str,
        name: String,
        value: f64,
    },
}

/// Parse newline-delimited frames. Blank lines are skipped.
pub fn parse_ndjson(input: &str) -> Result<Vec<FrameInput>, ComputeError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| ComputeError::ParseError(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Parse a JSON array of frames
pub fn parse_array(input: &str) -> Result<Vec<FrameInput>, ComputeError> {
    Ok(serde_json::from_str(input)?)
}

/// Parse either format, chosen by the first non-whitespace character
pub fn parse_frames(input: &str) -> Result<Vec<FrameInput>, ComputeError> {
    if input.trim_start().starts_with('[') {
        parse_array(input)
    } else {
        parse_ndjson(input)
    }
}
