//! Synheart Gaze - On-device engine for ocular metrics and wellbeing alerts
//!
//! Gaze turns per-frame face mesh landmarks, expression probabilities and
//! blendshape scores into eye metrics and debounced behavioral alerts:
//! landmarks → eye metrics → blink and attention tracking → alert rules.
//!
//! ## Modules
//!
//! - **Signal**: [`eye_metrics`], [`blink`] and [`attention`] derive ocular
//!   metrics and their windowed statistics
//! - **Alerts**: [`alerts`] judges six rules with a per-type cooldown
//! - **Pipeline**: [`pipeline::MonitorProcessor`] drives a whole session from
//!   timestamped [`frame::FrameInput`]s

pub mod alerts;
pub mod attention;
pub mod blink;
pub mod clock;
pub mod config;
pub mod error;
pub mod eye_metrics;
pub mod frame;
pub mod landmarks;
pub mod pipeline;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use alerts::{AlertSink, AlertSystem, AlertThresholds, ThresholdOverrides};
pub use attention::AttentionTracker;
pub use blink::BlinkTracker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MonitorConfig;
pub use error::ComputeError;
pub use eye_metrics::compute_eye_metrics;
pub use frame::FrameInput;
pub use landmarks::FaceLandmarks;
pub use pipeline::{FrameReport, MonitorProcessor};
pub use types::{AlertEvent, AlertSeverity, AlertType, EyeMetrics};

/// Gaze library version
pub const GAZE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "synheart-gaze";
