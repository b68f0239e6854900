//! Alert rules
//!
//! Each rule is a variant of [`Rule`] carrying the signal it judges. A rule
//! knows its alert type, how long its condition must hold ([`Timing`]) and,
//! given thresholds, whether the condition holds right now ([`Finding`]).
//! The episode and cooldown bookkeeping shared by all rules lives in
//! [`crate::alerts::system`].

use crate::alerts::thresholds::AlertThresholds;
use crate::landmarks::PAIN_BLENDSHAPES;
use crate::types::{AlertSeverity, AlertType, BlendshapeScores, EmotionScores};

/// How long a rule's condition must hold before it alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// Condition must hold continuously for the duration
    Sustained { duration_ms: i64 },
    /// Alert as soon as the condition is observed
    Immediate,
}

/// A rule whose condition currently holds
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub severity: AlertSeverity,
    pub message: String,
}

/// One evaluation of an alert rule against the signal it watches
#[derive(Debug, Clone, Copy)]
pub enum Rule<'a> {
    Sadness(&'a EmotionScores),
    LowAttention { attention_score: f64 },
    BlinkRate { blinks_per_minute: u32 },
    FacePresence { face_detected: bool },
    Pain(&'a BlendshapeScores),
    Engagement {
        emotions: &'a EmotionScores,
        attention_score: f64,
    },
}

impl Rule<'_> {
    pub fn alert_type(&self) -> AlertType {
        match self {
            Rule::Sadness(_) => AlertType::ProlongedSadness,
            Rule::LowAttention { .. } => AlertType::LowAttention,
            Rule::BlinkRate { .. } => AlertType::AbnormalBlinkRate,
            Rule::FacePresence { .. } => AlertType::ProlongedInactivity,
            Rule::Pain(_) => AlertType::PainDetected,
            Rule::Engagement { .. } => AlertType::LowEngagement,
        }
    }

    pub fn timing(&self, thresholds: &AlertThresholds) -> Timing {
        timing_for(self.alert_type(), thresholds)
    }

    /// `Some` while the triggering condition holds
    pub fn evaluate(&self, thresholds: &AlertThresholds) -> Option<Finding> {
        match *self {
            Rule::Sadness(emotions) => {
                let sadness = emotions.get(EmotionScores::SAD);
                (sadness >= thresholds.sadness_threshold).then(|| Finding {
                    severity: AlertSeverity::Medium,
                    message: format!(
                        "Sadness detected for more than {}",
                        describe_duration(thresholds.sadness_duration_ms)
                    ),
                })
            }
            Rule::LowAttention { attention_score } => {
                (attention_score < thresholds.attention_threshold).then(|| Finding {
                    severity: AlertSeverity::Low,
                    message: format!(
                        "Attention has been low for more than {}",
                        describe_duration(thresholds.attention_duration_ms)
                    ),
                })
            }
            Rule::BlinkRate { blinks_per_minute } => {
                if blinks_per_minute < thresholds.blink_rate_min {
                    Some(Finding {
                        severity: AlertSeverity::Medium,
                        message: format!(
                            "Blink rate is unusually low ({blinks_per_minute} blinks/min)"
                        ),
                    })
                } else if blinks_per_minute > thresholds.blink_rate_max {
                    Some(Finding {
                        severity: AlertSeverity::Low,
                        message: format!(
                            "Blink rate is unusually high ({blinks_per_minute} blinks/min)"
                        ),
                    })
                } else {
                    None
                }
            }
            Rule::FacePresence { face_detected } => (!face_detected).then(|| Finding {
                severity: AlertSeverity::High,
                message: format!(
                    "No face detected for more than {}",
                    describe_duration(thresholds.inactivity_duration_ms)
                ),
            }),
            Rule::Pain(blendshapes) => {
                let score = pain_score(blendshapes);
                (score >= thresholds.pain_threshold).then(|| Finding {
                    severity: AlertSeverity::High,
                    message: format!("Possible pain expression detected (score {score:.2})"),
                })
            }
            Rule::Engagement {
                emotions,
                attention_score,
            } => {
                let score = engagement_score(emotions, attention_score);
                (score < thresholds.engagement_threshold).then(|| Finding {
                    severity: AlertSeverity::Medium,
                    message: format!(
                        "Engagement has been low for more than {}",
                        describe_duration(thresholds.engagement_duration_ms)
                    ),
                })
            }
        }
    }
}

/// Timing of each alert type under the given thresholds
pub fn timing_for(alert_type: AlertType, thresholds: &AlertThresholds) -> Timing {
    match alert_type {
        AlertType::ProlongedSadness => Timing::Sustained {
            duration_ms: thresholds.sadness_duration_ms,
        },
        AlertType::LowAttention => Timing::Sustained {
            duration_ms: thresholds.attention_duration_ms,
        },
        AlertType::ProlongedInactivity => Timing::Sustained {
            duration_ms: thresholds.inactivity_duration_ms,
        },
        AlertType::LowEngagement => Timing::Sustained {
            duration_ms: thresholds.engagement_duration_ms,
        },
        AlertType::AbnormalBlinkRate | AlertType::PainDetected => Timing::Immediate,
    }
}

/// Mean activation of the brow-lowerer, cheek, eye-squint and nose-sneer
/// blendshapes on both sides
pub fn pain_score(blendshapes: &BlendshapeScores) -> f64 {
    PAIN_BLENDSHAPES
        .iter()
        .map(|name| blendshapes.get(name))
        .sum::<f64>()
        / PAIN_BLENDSHAPES.len() as f64
}

/// Weighted engagement: expressiveness, positive affect and attention
pub fn engagement_score(emotions: &EmotionScores, attention_score: f64) -> f64 {
    0.3 * (1.0 - emotions.get(EmotionScores::NEUTRAL))
        + 0.3 * emotions.get(EmotionScores::HAPPY)
        + 0.4 * attention_score
}

fn describe_duration(ms: i64) -> String {
    if ms >= 60_000 && ms % 60_000 == 0 {
        match ms / 60_000 {
            1 => "1 minute".to_string(),
            minutes => format!("{minutes} minutes"),
        }
    } else if ms >= 1_000 && ms % 1_000 == 0 {
        match ms / 1_000 {
            1 => "1 second".to_string(),
            seconds => format!("{seconds} seconds"),
        }
    } else {
        format!("{ms} ms")
    }
}
