//! Pipeline orchestration
//!
//! This module provides the per-frame public API for Synheart Gaze. A
//! [`MonitorProcessor`] owns one session's trackers and alert system and
//! drives them from frame timestamps:
//!
//! landmarks → eye metrics → {blink, attention} → alert system
//!                                  ↑ emotions, blendshapes, face flag

use crate::alerts::{AlertSink, AlertState, AlertSystem, AlertThresholds, ThresholdOverrides};
use crate::attention::{AttentionState, AttentionTracker};
use crate::blink::{BlinkState, BlinkTracker};
use crate::clock::ManualClock;
use crate::error::ComputeError;
use crate::eye_metrics::compute_eye_metrics;
use crate::frame::FrameInput;
use crate::types::{AlertEvent, AlertType, AttentionResult, BlinkStats, EyeMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Version tag written into saved session state
pub const SESSION_STATE_VERSION: u32 = 1;

/// Sustained rules judged from landmark-derived metrics or expressions
const FACE_EPISODES: [AlertType; 3] = [
    AlertType::ProlongedSadness,
    AlertType::LowAttention,
    AlertType::LowEngagement,
];

/// Everything derived from one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub timestamp: DateTime<Utc>,
    /// Present when the frame carried landmarks for a detected face
    pub eye_metrics: Option<EyeMetrics>,
    pub blink: BlinkStats,
    pub attention: Option<AttentionResult>,
    /// Alerts emitted while processing this frame, in emission order
    pub alerts: Vec<AlertEvent>,
}

/// Serialized form of a suspended session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub version: u32,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub thresholds: AlertThresholds,
    pub blink: BlinkState,
    pub attention: AttentionState,
    pub alerts: AlertState,
}

/// Stateful processor for one monitoring session.
///
/// Time is taken from frame timestamps, which must not go backwards.
pub struct MonitorProcessor {
    clock: ManualClock,
    blink: BlinkTracker,
    attention: AttentionTracker,
    alerts: AlertSystem,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Default for MonitorProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorProcessor {
    /// Create a processor with default thresholds
    pub fn new() -> Self {
        Self::with_validated_thresholds(AlertThresholds::default())
    }

    /// Create a processor with thresholds overridden from the defaults
    pub fn with_thresholds(overrides: &ThresholdOverrides) -> Result<Self, ComputeError> {
        let thresholds = AlertThresholds::with_overrides(overrides)?;
        Ok(Self::with_validated_thresholds(thresholds))
    }

    fn with_validated_thresholds(thresholds: AlertThresholds) -> Self {
        let clock = ManualClock::at_epoch();
        Self {
            blink: BlinkTracker::with_clock(Arc::new(clock.clone())),
            attention: AttentionTracker::with_clock(Arc::new(clock.clone())),
            alerts: AlertSystem::with_clock(thresholds, Arc::new(clock.clone())),
            clock,
            last_timestamp: None,
        }
    }

    /// Register the alert callback
    pub fn on_alert(mut self, callback: impl FnMut(&AlertEvent) + Send + 'static) -> Self {
        self.alerts = self.alerts.on_alert(callback);
        self
    }

    /// Register the alert persistence sink
    pub fn with_sink(mut self, sink: impl AlertSink + Send + 'static) -> Self {
        self.alerts = self.alerts.with_sink(sink);
        self
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        self.alerts.thresholds()
    }

    pub fn set_thresholds(&mut self, overrides: &ThresholdOverrides) -> Result<(), ComputeError> {
        self.alerts.set_thresholds(overrides)
    }

    pub fn blink_stats(&self) -> BlinkStats {
        self.blink.stats()
    }

    pub fn attention(&self) -> AttentionResult {
        self.attention.current()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Process one frame.
    ///
    /// Face presence is judged on every frame. The landmark-derived metrics
    /// and the remaining rules run only when the frame carries landmarks for
    /// a detected face. Any other frame ends the sadness, attention and
    /// engagement episodes, drops a blink in progress and still ages the
    /// blink window.
    pub fn process_frame(&mut self, frame: &FrameInput) -> Result<FrameReport, ComputeError> {
        if let Some(previous) = self.last_timestamp {
            if frame.timestamp < previous {
                tracing::warn!(
                    previous = %previous,
                    current = %frame.timestamp,
                    "rejected out-of-order frame"
                );
                return Err(ComputeError::NonMonotonicTimestamp {
                    previous: previous.to_rfc3339(),
                    current: frame.timestamp.to_rfc3339(),
                });
            }
        }
        self.last_timestamp = Some(frame.timestamp);
        self.clock.set(frame.timestamp);

        let mut alerts = Vec::new();
        alerts.extend(self.alerts.check_face_presence(frame.face_detected));

        let landmarks = match (&frame.landmarks, frame.face_detected) {
            (Some(landmarks), true) => landmarks,
            _ => {
                for alert_type in FACE_EPISODES {
                    self.alerts.end_episode(alert_type);
                }
                return Ok(FrameReport {
                    timestamp: frame.timestamp,
                    eye_metrics: None,
                    blink: self.blink.update_unobserved(),
                    attention: None,
                    alerts,
                });
            }
        };

        let eye_metrics = compute_eye_metrics(landmarks);
        let blink = self.blink.update(eye_metrics.is_blinking);
        let attention = self.attention.update(&eye_metrics.gaze_direction);

        alerts.extend(self.alerts.check_sadness(&frame.emotions));
        alerts.extend(self.alerts.check_attention(attention.attention_score));
        alerts.extend(self.alerts.check_blink_rate(blink.blink_rate));
        alerts.extend(self.alerts.check_pain(&frame.blendshapes));
        alerts.extend(
            self.alerts
                .check_engagement(&frame.emotions, attention.attention_score),
        );

        Ok(FrameReport {
            timestamp: frame.timestamp,
            eye_metrics: Some(eye_metrics),
            blink,
            attention: Some(attention),
            alerts,
        })
    }

    /// Process one JSON frame, returning the JSON report
    pub fn process_json(&mut self, frame_json: &str) -> Result<String, ComputeError> {
        let frame = FrameInput::from_json(frame_json)?;
        let report = self.process_frame(&frame)?;
        Ok(serde_json::to_string(&report)?)
    }

    /// Start a new session: clears trackers, episodes and cooldowns
    pub fn reset(&mut self) {
        self.blink.reset();
        self.attention.reset();
        self.alerts.reset();
        self.last_timestamp = None;
        self.clock.set(DateTime::<Utc>::UNIX_EPOCH);
    }

    /// Save session state to JSON
    pub fn save_state(&self) -> Result<String, ComputeError> {
        let state = SessionState {
            version: SESSION_STATE_VERSION,
            last_timestamp: self.last_timestamp,
            thresholds: *self.alerts.thresholds(),
            blink: self.blink.state().clone(),
            attention: self.attention.state().clone(),
            alerts: self.alerts.state().clone(),
        };
        Ok(serde_json::to_string(&state)?)
    }

    /// Restore session state saved by [`MonitorProcessor::save_state`]
    pub fn load_state(&mut self, json: &str) -> Result<(), ComputeError> {
        let state: SessionState =
            serde_json::from_str(json).map_err(|e| ComputeError::StateError(e.to_string()))?;

        if state.version != SESSION_STATE_VERSION {
            return Err(ComputeError::StateError(format!(
                "unsupported state version {} (expected {SESSION_STATE_VERSION})",
                state.version
            )));
        }
        self.alerts.replace_thresholds(state.thresholds)?;
        self.blink.restore(state.blink);
        self.attention.restore(state.attention);
        self.alerts.restore(state.alerts);
        self.last_timestamp = state.last_timestamp;
        if let Some(at) = state.last_timestamp {
            self.clock.set(at);
        }

        tracing::debug!(last_timestamp = ?state.last_timestamp, "session state restored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::MemorySink;
    use crate::landmarks::fixtures::synthetic_face;
    use crate::types::EmotionScores;
    use chrono::Duration;
    use std::sync::Mutex;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    fn face_frame(ms: i64, ear: f64) -> FrameInput {
        FrameInput::with_face(at(ms), synthetic_face(ear, 0.0, 0.0))
    }

    fn alert_types(report: &FrameReport) -> Vec<AlertType> {
        report.alerts.iter().map(|a| a.alert_type).collect()
    }

    #[test]
    fn test_face_frame_reports_metrics() {
        let mut processor = MonitorProcessor::new();
        let report = processor.process_frame(&face_frame(0, 0.3)).unwrap();

        let metrics = report.eye_metrics.unwrap();
        assert!((metrics.avg_ear - 0.3).abs() < 1e-9);
        assert!(report.attention.unwrap().attention_score > 0.99);
        // No blinks yet: the blink-rate rule fires on the very first frame
        assert_eq!(alert_types(&report), vec![AlertType::AbnormalBlinkRate]);
    }

    #[test]
    fn test_no_face_skips_landmark_path() {
        let mut processor = MonitorProcessor::new();
        let report = processor.process_frame(&FrameInput::without_face(at(0))).unwrap();

        assert!(report.eye_metrics.is_none());
        assert!(report.attention.is_none());
        assert_eq!(report.blink, BlinkStats::default());
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn test_face_without_landmarks_only_checks_presence() {
        let mut processor = MonitorProcessor::new();
        let mut frame = FrameInput::without_face(at(0));
        frame.face_detected = true;
        frame.emotions = EmotionScores::new().with(EmotionScores::SAD, 0.9);

        let report = processor.process_frame(&frame).unwrap();
        assert!(report.eye_metrics.is_none());
        assert!(processor
            .alerts
            .state()
            .episode_start(AlertType::ProlongedSadness)
            .is_none());
    }

    #[test]
    fn test_prolonged_absence_alerts_once() {
        let mut processor = MonitorProcessor::new();
        let mut fired = Vec::new();
        for second in 0..=400 {
            let report = processor
                .process_frame(&FrameInput::without_face(at(second * 1_000)))
                .unwrap();
            for alert in &report.alerts {
                assert_eq!(alert.alert_type, AlertType::ProlongedInactivity);
                fired.push(second);
            }
        }
        assert_eq!(fired, vec![301]);
    }

    /// Processor where only the sadness rule fires on a steady open-eyed face
    fn sadness_only_processor() -> MonitorProcessor {
        MonitorProcessor::with_thresholds(&ThresholdOverrides {
            blink_rate_min: Some(0),
            ..Default::default()
        })
        .unwrap()
    }

    fn sad_frame(ms: i64) -> FrameInput {
        let mut frame = face_frame(ms, 0.3);
        frame.emotions = EmotionScores::new().with(EmotionScores::SAD, 0.9);
        frame
    }

    #[test]
    fn test_absence_ends_sadness_episode() {
        let mut processor = sadness_only_processor();
        for second in 0..=100 {
            let report = processor.process_frame(&sad_frame(second * 1_000)).unwrap();
            assert!(report.alerts.is_empty());
        }
        for second in 101..=130 {
            processor
                .process_frame(&FrameInput::without_face(at(second * 1_000)))
                .unwrap();
        }

        // The face is back at 131s, which starts a fresh episode
        let mut fired = Vec::new();
        for second in 131..=300 {
            let report = processor.process_frame(&sad_frame(second * 1_000)).unwrap();
            if alert_types(&report).contains(&AlertType::ProlongedSadness) {
                fired.push(second);
            }
        }
        assert_eq!(fired, vec![252]);
    }

    #[test]
    fn test_absence_ends_attention_and_engagement_episodes() {
        let mut processor = MonitorProcessor::new();
        let mut away = FrameInput::with_face(at(0), synthetic_face(0.3, 1.0, 0.0));
        away.emotions = EmotionScores::new().with(EmotionScores::NEUTRAL, 1.0);
        processor.process_frame(&away).unwrap();

        let episodes = processor.alerts.state();
        assert!(episodes.episode_start(AlertType::LowAttention).is_some());
        assert!(episodes.episode_start(AlertType::LowEngagement).is_some());

        let mut landmarkless = FrameInput::without_face(at(1_000));
        landmarkless.face_detected = true;
        processor.process_frame(&landmarkless).unwrap();

        let episodes = processor.alerts.state();
        for alert_type in FACE_EPISODES {
            assert!(episodes.episode_start(alert_type).is_none());
        }
    }

    #[test]
    fn test_blink_in_progress_dropped_when_face_lost() {
        let mut processor = MonitorProcessor::new();
        processor.process_frame(&face_frame(0, 0.3)).unwrap();
        processor.process_frame(&face_frame(100, 0.1)).unwrap();
        processor
            .process_frame(&FrameInput::without_face(at(60_000)))
            .unwrap();

        let report = processor.process_frame(&face_frame(120_100, 0.3)).unwrap();
        assert_eq!(report.blink.blink_count, 0);
        assert_eq!(report.blink.blink_rate, 0);
        assert_eq!(report.blink.avg_blink_duration_ms, 0.0);
    }

    #[test]
    fn test_no_face_frame_ages_blink_window() {
        let mut processor = MonitorProcessor::new();
        let mut ms = 0;
        for _ in 0..3 {
            processor.process_frame(&face_frame(ms, 0.3)).unwrap();
            ms += 100;
            processor.process_frame(&face_frame(ms, 0.1)).unwrap();
            ms += 150;
        }
        processor.process_frame(&face_frame(ms, 0.3)).unwrap();

        let report = processor
            .process_frame(&FrameInput::without_face(at(ms + 61_000)))
            .unwrap();
        assert_eq!(report.blink.blink_count, 3);
        assert_eq!(report.blink.blink_rate, 0);
    }

    #[test]
    fn test_blinks_counted_from_frames() {
        let mut processor = MonitorProcessor::new();
        let mut ms = 0;
        for _ in 0..3 {
            processor.process_frame(&face_frame(ms, 0.3)).unwrap();
            ms += 100;
            processor.process_frame(&face_frame(ms, 0.1)).unwrap();
            ms += 150;
        }
        let report = processor.process_frame(&face_frame(ms, 0.3)).unwrap();

        assert_eq!(report.blink.blink_count, 3);
        assert_eq!(report.blink.blink_rate, 3);
        assert!((report.blink.avg_blink_duration_ms - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_order_frame_rejected() {
        let mut processor = MonitorProcessor::new();
        processor.process_frame(&FrameInput::without_face(at(1_000))).unwrap();

        let err = processor
            .process_frame(&FrameInput::without_face(at(500)))
            .unwrap_err();
        assert!(matches!(err, ComputeError::NonMonotonicTimestamp { .. }));
        assert_eq!(processor.last_timestamp(), Some(at(1_000)));

        // Equal timestamps are accepted
        assert!(processor
            .process_frame(&FrameInput::without_face(at(1_000)))
            .is_ok());
    }

    #[test]
    fn test_sadness_survives_save_and_load() {
        let sad = EmotionScores::new().with(EmotionScores::SAD, 0.8);
        let sad_frame = |ms| {
            let mut frame = face_frame(ms, 0.3);
            frame.emotions = sad.clone();
            frame
        };

        let mut first = MonitorProcessor::new();
        for second in 0..=60 {
            first.process_frame(&sad_frame(second * 1_000)).unwrap();
        }
        let saved = first.save_state().unwrap();

        let mut resumed = MonitorProcessor::new();
        resumed.load_state(&saved).unwrap();
        assert_eq!(resumed.last_timestamp(), Some(at(60_000)));

        let mut fired = Vec::new();
        for second in 61..=150 {
            let report = resumed.process_frame(&sad_frame(second * 1_000)).unwrap();
            if alert_types(&report).contains(&AlertType::ProlongedSadness) {
                fired.push(second);
            }
        }
        assert_eq!(fired, vec![121]);
    }

    #[test]
    fn test_load_state_keeps_thresholds() {
        let overrides = ThresholdOverrides {
            cooldown_ms: Some(1_000),
            ..Default::default()
        };
        let processor = MonitorProcessor::with_thresholds(&overrides).unwrap();
        let saved = processor.save_state().unwrap();

        let mut resumed = MonitorProcessor::new();
        resumed.load_state(&saved).unwrap();
        assert_eq!(resumed.thresholds().cooldown_ms, 1_000);
    }

    #[test]
    fn test_load_state_rejects_garbage() {
        let mut processor = MonitorProcessor::new();
        assert!(matches!(
            processor.load_state("{\"version\": 1}"),
            Err(ComputeError::StateError(_))
        ));

        let mut state: serde_json::Value =
            serde_json::from_str(&processor.save_state().unwrap()).unwrap();
        state["version"] = serde_json::json!(99);
        assert!(matches!(
            processor.load_state(&state.to_string()),
            Err(ComputeError::StateError(_))
        ));
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let overrides = ThresholdOverrides {
            sadness_threshold: Some(2.0),
            ..Default::default()
        };
        assert!(MonitorProcessor::with_thresholds(&overrides).is_err());
    }

    #[test]
    fn test_process_json() {
        let mut processor = MonitorProcessor::new();
        let output = processor
            .process_json(r#"{"timestamp":"2024-01-15T10:00:00Z","face_detected":false}"#)
            .unwrap();
        let report: FrameReport = serde_json::from_str(&output).unwrap();
        assert!(report.eye_metrics.is_none());
        assert!(report.alerts.is_empty());

        assert!(processor.process_json("not json").is_err());
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut processor = MonitorProcessor::new();
        processor.process_frame(&face_frame(10_000, 0.3)).unwrap();
        processor.reset();

        assert_eq!(processor.last_timestamp(), None);
        assert_eq!(processor.blink_stats(), BlinkStats::default());

        // An earlier timestamp is fine after a reset, and cooldowns are gone
        let report = processor.process_frame(&face_frame(0, 0.3)).unwrap();
        assert_eq!(alert_types(&report), vec![AlertType::AbnormalBlinkRate]);
    }

    #[test]
    fn test_callback_and_sink_see_frame_alerts() {
        let sink = MemorySink::new();
        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        let mut processor = MonitorProcessor::new()
            .on_alert(move |_| *counter.lock().unwrap() += 1)
            .with_sink(sink.clone());

        let report = processor.process_frame(&face_frame(0, 0.3)).unwrap();

        assert_eq!(report.alerts.len(), 1);
        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(sink.events(), report.alerts);
    }
}
