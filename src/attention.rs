//! Attention tracking
//!
//! Scores attention from how far the gaze has strayed from center over the
//! trailing 5 seconds.

use crate::clock::{elapsed_ms, system_clock, SharedClock};
use crate::types::{AttentionResult, GazeDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Sliding window for the attention score
pub const ATTENTION_WINDOW_MS: i64 = 5_000;

/// |yaw| or |pitch| above this means the subject is looking away
pub const LOOK_AWAY_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub yaw: f64,
    pub pitch: f64,
    pub at: DateTime<Utc>,
}

impl GazeSample {
    fn deviation(&self) -> f64 {
        (self.yaw * self.yaw + self.pitch * self.pitch).sqrt()
    }
}

/// Attention tracker state for one monitoring session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttentionState {
    window: VecDeque<GazeSample>,
    look_away_count: u32,
    is_looking_away: bool,
}

impl AttentionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1 − mean gaze deviation over the window, 1 when the window is empty
    pub fn attention_score(&self) -> f64 {
        if self.window.is_empty() {
            return 1.0;
        }
        let mean = self.window.iter().map(GazeSample::deviation).sum::<f64>()
            / self.window.len() as f64;
        (1.0 - mean).clamp(0.0, 1.0)
    }

    pub fn result(&self) -> AttentionResult {
        AttentionResult {
            attention_score: self.attention_score(),
            is_looking_away: self.is_looking_away,
            look_away_count: self.look_away_count,
        }
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(front) = self.window.front() {
            if elapsed_ms(front.at, now) > ATTENTION_WINDOW_MS {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Advance the attention state by one gaze sample
pub fn update_attention(
    mut state: AttentionState,
    gaze: &GazeDirection,
    now: DateTime<Utc>,
) -> (AttentionState, AttentionResult) {
    state.window.push_back(GazeSample {
        yaw: gaze.yaw,
        pitch: gaze.pitch,
        at: now,
    });
    state.prune(now);

    state.is_looking_away =
        gaze.yaw.abs() > LOOK_AWAY_THRESHOLD || gaze.pitch.abs() > LOOK_AWAY_THRESHOLD;
    if state.is_looking_away {
        state.look_away_count += 1;
    }

    let result = state.result();
    (state, result)
}

/// Stateful attention tracker bound to a clock
pub struct AttentionTracker {
    state: AttentionState,
    clock: SharedClock,
}

impl Default for AttentionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AttentionTracker {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            state: AttentionState::default(),
            clock,
        }
    }

    pub fn update(&mut self, gaze: &GazeDirection) -> AttentionResult {
        let state = std::mem::take(&mut self.state);
        let (state, result) = update_attention(state, gaze, self.clock.now());
        self.state = state;
        result
    }

    /// Result as of the last update
    pub fn current(&self) -> AttentionResult {
        self.state.result()
    }

    pub fn state(&self) -> &AttentionState {
        &self.state
    }

    pub fn restore(&mut self, state: AttentionState) {
        self.state = state;
    }

    pub fn reset(&mut self) {
        self.state = AttentionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn tracker() -> (AttentionTracker, ManualClock) {
        let clock = ManualClock::at_epoch();
        (AttentionTracker::with_clock(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_empty_window_is_attentive() {
        let (tracker, _) = tracker();
        let result = tracker.current();
        assert_eq!(result.attention_score, 1.0);
        assert!(!result.is_looking_away);
        assert_eq!(result.look_away_count, 0);
    }

    #[test]
    fn test_centered_gaze_full_attention() {
        let (mut tracker, clock) = tracker();
        let center = GazeDirection::from_angles(0.0, 0.0);
        let mut result = AttentionResult::default();
        for _ in 0..30 {
            result = tracker.update(&center);
            clock.advance_ms(33);
        }
        assert_eq!(result.attention_score, 1.0);
        assert!(!result.is_looking_away);
    }

    #[test]
    fn test_fully_averted_gaze_zero_attention() {
        let (mut tracker, clock) = tracker();
        let away = GazeDirection::from_angles(1.0, 0.0);
        let mut result = AttentionResult::default();
        for _ in 0..30 {
            result = tracker.update(&away);
            clock.advance_ms(33);
        }
        assert_eq!(result.attention_score, 0.0);
        assert!(result.is_looking_away);
        assert_eq!(result.look_away_count, 30);
    }

    #[test]
    fn test_looking_away_uses_current_sample_only() {
        let (mut tracker, clock) = tracker();
        tracker.update(&GazeDirection::from_angles(0.9, 0.0));
        clock.advance_ms(100);

        let result = tracker.update(&GazeDirection::from_angles(0.1, 0.0));
        assert!(!result.is_looking_away);
        // Window still holds the averted sample
        assert!((result.attention_score - 0.5).abs() < 1e-9);
        assert_eq!(result.look_away_count, 1);
    }

    #[test]
    fn test_pitch_alone_counts_as_looking_away() {
        let (mut tracker, _) = tracker();
        let result = tracker.update(&GazeDirection::from_angles(0.0, -0.35));
        assert!(result.is_looking_away);
    }

    #[test]
    fn test_old_samples_leave_window() {
        let (mut tracker, clock) = tracker();
        tracker.update(&GazeDirection::from_angles(1.0, 0.0));

        clock.advance_ms(ATTENTION_WINDOW_MS + 1);
        let result = tracker.update(&GazeDirection::from_angles(0.0, 0.0));

        assert_eq!(tracker.state().window_len(), 1);
        assert_eq!(result.attention_score, 1.0);
    }

    #[test]
    fn test_reset() {
        let (mut tracker, _) = tracker();
        tracker.update(&GazeDirection::from_angles(1.0, 1.0));
        tracker.reset();

        assert_eq!(tracker.state().window_len(), 0);
        assert_eq!(tracker.current(), AttentionResult::default());
    }

    proptest! {
        #[test]
        fn prop_attention_score_in_unit_range(
            samples in proptest::collection::vec((-1.0f64..=1.0, -1.0f64..=1.0, 0i64..500), 1..80)
        ) {
            let (mut tracker, clock) = tracker();
            for (yaw, pitch, gap) in samples {
                let result = tracker.update(&GazeDirection::from_angles(yaw, pitch));
                prop_assert!((0.0..=1.0).contains(&result.attention_score));
                clock.advance_ms(gap);
            }
        }
    }
}
