//! Alert system
//!
//! One generic engine drives every [`Rule`]:
//!
//! - Sustained rules run a two-state machine per alert type. Idle becomes an
//!   episode when the condition first holds; once the episode has lasted the
//!   rule's duration an emission is attempted and the episode clock restarts.
//!   Losing the condition discards the episode.
//! - Immediate rules attempt an emission on every evaluation that holds.
//!
//! Every emission attempt passes the per-type cooldown gate first. Suppressed
//! emissions are silent.

use crate::alerts::rules::{Finding, Rule, Timing};
use crate::alerts::sink::{AlertSink, NullSink};
use crate::alerts::thresholds::{AlertThresholds, ThresholdOverrides};
use crate::clock::{elapsed_ms, system_clock, SharedClock};
use crate::error::ComputeError;
use crate::types::{AlertEvent, AlertType, BlendshapeScores, EmotionScores};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Callback invoked synchronously for every emitted alert
pub type AlertCallback = Box<dyn FnMut(&AlertEvent) + Send>;

/// Episode and cooldown bookkeeping for one monitoring session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    /// Start of the episode in progress, per sustained alert type
    episodes: BTreeMap<AlertType, DateTime<Utc>>,
    /// Last successful emission, per alert type
    last_emitted: BTreeMap<AlertType, DateTime<Utc>>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn episode_start(&self, alert_type: AlertType) -> Option<DateTime<Utc>> {
        self.episodes.get(&alert_type).copied()
    }

    pub fn last_emitted(&self, alert_type: AlertType) -> Option<DateTime<Utc>> {
        self.last_emitted.get(&alert_type).copied()
    }

    /// Return to idle for `alert_type`, discarding any episode start. Returns
    /// whether an episode was in progress.
    pub fn end_episode(&mut self, alert_type: AlertType) -> bool {
        let ended = self.episodes.remove(&alert_type).is_some();
        if ended {
            tracing::debug!(alert_type = alert_type.as_str(), "episode ended");
        }
        ended
    }

    fn cooling_down(&self, alert_type: AlertType, cooldown_ms: i64, now: DateTime<Utc>) -> bool {
        self.last_emitted
            .get(&alert_type)
            .is_some_and(|last| elapsed_ms(*last, now) < cooldown_ms)
    }

    fn try_emit(
        &mut self,
        alert_type: AlertType,
        finding: Finding,
        cooldown_ms: i64,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        if self.cooling_down(alert_type, cooldown_ms, now) {
            tracing::debug!(alert_type = alert_type.as_str(), "alert suppressed by cooldown");
            return None;
        }
        self.last_emitted.insert(alert_type, now);
        Some(AlertEvent::new(
            alert_type,
            finding.severity,
            finding.message,
            now,
        ))
    }
}

/// Evaluate one rule against the state, returning the alert to emit, if any
pub fn evaluate_rule(
    mut state: AlertState,
    rule: &Rule<'_>,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> (AlertState, Option<AlertEvent>) {
    let alert_type = rule.alert_type();

    let Some(finding) = rule.evaluate(thresholds) else {
        state.end_episode(alert_type);
        return (state, None);
    };

    let event = match rule.timing(thresholds) {
        Timing::Immediate => state.try_emit(alert_type, finding, thresholds.cooldown_ms, now),
        Timing::Sustained { duration_ms } => match state.episodes.get(&alert_type).copied() {
            None => {
                tracing::debug!(alert_type = alert_type.as_str(), "episode started");
                state.episodes.insert(alert_type, now);
                None
            }
            Some(started_at) if elapsed_ms(started_at, now) > duration_ms => {
                state.episodes.insert(alert_type, now);
                state.try_emit(alert_type, finding, thresholds.cooldown_ms, now)
            }
            Some(_) => None,
        },
    };

    (state, event)
}

/// Stateful alert system for one monitoring session
pub struct AlertSystem {
    thresholds: AlertThresholds,
    state: AlertState,
    clock: SharedClock,
    on_alert: Option<AlertCallback>,
    sink: Box<dyn AlertSink + Send>,
}

impl Default for AlertSystem {
    fn default() -> Self {
        Self::new(AlertThresholds::default())
    }
}

impl AlertSystem {
    /// Create an alert system reading the wall clock, with no callback and
    /// no persistence
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self::with_clock(thresholds, system_clock())
    }

    pub fn with_clock(thresholds: AlertThresholds, clock: SharedClock) -> Self {
        Self {
            thresholds,
            state: AlertState::default(),
            clock,
            on_alert: None,
            sink: Box::new(NullSink),
        }
    }

    /// Register the alert callback
    pub fn on_alert(mut self, callback: impl FnMut(&AlertEvent) + Send + 'static) -> Self {
        self.on_alert = Some(Box::new(callback));
        self
    }

    /// Register the persistence sink
    pub fn with_sink(mut self, sink: impl AlertSink + Send + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Merge overrides into the current thresholds. On a validation error the
    /// current thresholds are kept.
    pub fn set_thresholds(&mut self, overrides: &ThresholdOverrides) -> Result<(), ComputeError> {
        self.replace_thresholds(self.thresholds.merge(overrides))
    }

    /// Swap in a complete threshold set, validated first
    pub fn replace_thresholds(&mut self, thresholds: AlertThresholds) -> Result<(), ComputeError> {
        thresholds.validate()?;
        self.thresholds = thresholds;
        Ok(())
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn restore(&mut self, state: AlertState) {
        self.state = state;
    }

    /// End a sustained episode whose inputs are unavailable, e.g. while the
    /// face is out of view
    pub fn end_episode(&mut self, alert_type: AlertType) {
        self.state.end_episode(alert_type);
    }

    /// Forget all episodes and cooldowns
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }

    pub fn check_sadness(&mut self, emotions: &EmotionScores) -> Option<AlertEvent> {
        self.check(&Rule::Sadness(emotions))
    }

    pub fn check_attention(&mut self, attention_score: f64) -> Option<AlertEvent> {
        self.check(&Rule::LowAttention { attention_score })
    }

    pub fn check_blink_rate(&mut self, blinks_per_minute: u32) -> Option<AlertEvent> {
        self.check(&Rule::BlinkRate { blinks_per_minute })
    }

    pub fn check_face_presence(&mut self, face_detected: bool) -> Option<AlertEvent> {
        self.check(&Rule::FacePresence { face_detected })
    }

    pub fn check_pain(&mut self, blendshapes: &BlendshapeScores) -> Option<AlertEvent> {
        self.check(&Rule::Pain(blendshapes))
    }

    pub fn check_engagement(
        &mut self,
        emotions: &EmotionScores,
        attention_score: f64,
    ) -> Option<AlertEvent> {
        self.check(&Rule::Engagement {
            emotions,
            attention_score,
        })
    }

    /// Evaluate a rule now, emitting through the callback and sink
    pub fn check(&mut self, rule: &Rule<'_>) -> Option<AlertEvent> {
        let state = std::mem::take(&mut self.state);
        let (state, event) = evaluate_rule(state, rule, &self.thresholds, self.clock.now());
        self.state = state;

        let event = event?;
        tracing::info!(
            alert_id = %event.id,
            alert_type = event.alert_type.as_str(),
            severity = event.severity.as_str(),
            "alert emitted"
        );

        if let Some(callback) = self.on_alert.as_mut() {
            callback(&event);
        }
        if let Err(e) = self.sink.record(&event) {
            tracing::warn!(alert_id = %event.id, error = %e, "failed to persist alert");
        }

        Some(event)
    }
}
