//! Time sources
//!
//! Every duration in the engine is a comparison between timestamps obtained
//! from a [`Clock`]. Production code reads the wall clock; tests and replay
//! drive a [`ManualClock`] explicitly.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of "now" for trackers and the alert system
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock handle shared between the components of one session
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Shared handle to the wall clock
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock with millisecond resolution.
///
/// Clones share the same underlying instant, so one handle can be given to
/// several components and advanced from a single place.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock positioned at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Create a clock positioned at the Unix epoch
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Jump to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        self.now_ms
            .store(instant.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move forward by `millis` milliseconds
    pub fn advance_ms(&self, millis: i64) {
        self.now_ms.fetch_add(millis, Ordering::SeqCst);
    }

    /// Move forward by a chrono duration
    pub fn advance(&self, by: Duration) {
        self.advance_ms(by.num_milliseconds());
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_epoch()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.now_ms.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Milliseconds elapsed from `earlier` to `later` (negative if reversed)
pub(crate) fn elapsed_ms(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_milliseconds()
}
