//! Blink tracking
//!
//! Detects open → closed → open transitions of the per-frame blink flag and
//! keeps a sliding 60 second window of completed blinks for rate and duration
//! statistics.

use crate::clock::{elapsed_ms, system_clock, SharedClock};
use crate::types::BlinkStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Sliding window for blink rate and mean duration
pub const BLINK_WINDOW_MS: i64 = 60_000;

/// A completed blink
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlinkRecord {
    pub ended_at: DateTime<Utc>,
    pub duration_ms: f64,
}

/// Blink tracker state for one monitoring session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlinkState {
    /// Start of the blink currently in progress
    blink_started_at: Option<DateTime<Utc>>,
    /// Lifetime blink count
    blink_count: u32,
    /// Completed blinks within the window, oldest first
    recent: VecDeque<BlinkRecord>,
    last_blink_time: Option<DateTime<Utc>>,
}

impl BlinkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blink_in_progress(&self) -> bool {
        self.blink_started_at.is_some()
    }

    /// Blinks still inside the window as of the last update
    pub fn recent_blinks(&self) -> impl Iterator<Item = &BlinkRecord> {
        self.recent.iter()
    }

    /// Statistics as of the last update
    pub fn stats(&self) -> BlinkStats {
        let avg_blink_duration_ms = if self.recent.is_empty() {
            0.0
        } else {
            self.recent.iter().map(|b| b.duration_ms).sum::<f64>() / self.recent.len() as f64
        };

        BlinkStats {
            blink_count: self.blink_count,
            blink_rate: self.recent.len() as u32,
            avg_blink_duration_ms,
            last_blink_time: self.last_blink_time,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(front) = self.recent.front() {
            if elapsed_ms(front.ended_at, now) > BLINK_WINDOW_MS {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Advance the blink state by one frame
pub fn update_blink(
    mut state: BlinkState,
    is_blinking: bool,
    now: DateTime<Utc>,
) -> (BlinkState, BlinkStats) {
    match (state.blink_started_at, is_blinking) {
        (None, true) => {
            state.blink_started_at = Some(now);
        }
        (Some(started_at), false) => {
            let duration_ms = elapsed_ms(started_at, now).max(0) as f64;
            state.blink_started_at = None;
            state.blink_count += 1;
            state.last_blink_time = Some(now);
            state.recent.push_back(BlinkRecord {
                ended_at: now,
                duration_ms,
            });
        }
        _ => {}
    }

    state.prune(now);
    let stats = state.stats();
    (state, stats)
}

/// Advance the blink state across a frame without eye measurements.
///
/// A blink in progress is dropped because its end was never seen, and the
/// window is pruned against `now`.
pub fn update_blink_unobserved(
    mut state: BlinkState,
    now: DateTime<Utc>,
) -> (BlinkState, BlinkStats) {
    if state.blink_started_at.take().is_some() {
        tracing::debug!("blink in progress abandoned");
    }

    state.prune(now);
    let stats = state.stats();
    (state, stats)
}

/// Stateful blink tracker bound to a clock
pub struct BlinkTracker {
    state: BlinkState,
    clock: SharedClock,
}

impl Default for BlinkTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BlinkTracker {
    /// Create a tracker reading the wall clock
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            state: BlinkState::default(),
            clock,
        }
    }

    /// Feed this frame's blink flag
    pub fn update(&mut self, is_blinking: bool) -> BlinkStats {
        let state = std::mem::take(&mut self.state);
        let (state, stats) = update_blink(state, is_blinking, self.clock.now());
        self.state = state;
        stats
    }

    /// Advance the clock-based window on a frame where the eyes were not seen
    pub fn update_unobserved(&mut self) -> BlinkStats {
        let state = std::mem::take(&mut self.state);
        let (state, stats) = update_blink_unobserved(state, self.clock.now());
        self.state = state;
        stats
    }

    pub fn stats(&self) -> BlinkStats {
        self.state.stats()
    }

    pub fn state(&self) -> &BlinkState {
        &self.state
    }

    /// Replace the tracker state, e.g. when resuming a saved session
    pub fn restore(&mut self, state: BlinkState) {
        self.state = state;
    }

    pub fn reset(&mut self) {
        self.state = BlinkState::default();
    }
}
