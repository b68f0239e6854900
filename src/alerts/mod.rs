//! Behavioral alerts
//!
//! Six rules judged by one episode engine with a per-type cooldown:
//!
//! - [`rules`]: what each rule watches and when its condition holds
//! - [`system`]: episode tracking, cooldown and emission
//! - [`thresholds`]: numeric configuration and partial overrides
//! - [`sink`]: where emitted alerts are persisted

pub mod rules;
pub mod sink;
pub mod system;
pub mod thresholds;

pub use rules::{engagement_score, pain_score, timing_for, Finding, Rule, Timing};
pub use sink::{AlertSink, MemorySink, NdjsonSink, NullSink};
pub use system::{evaluate_rule, AlertCallback, AlertState, AlertSystem};
pub use thresholds::{AlertThresholds, ThresholdOverrides};
