//! End-to-end alert scenarios through the public API

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use synheart_gaze::alerts::{MemorySink, ThresholdOverrides};
use synheart_gaze::landmarks::{EyeIndices, FACE_MESH_WITH_IRIS_LEN, LEFT_EYE, RIGHT_EYE};
use synheart_gaze::types::{EmotionScores, Landmark};
use synheart_gaze::{
    AlertSeverity, AlertSystem, AlertThresholds, AlertType, BlinkTracker, FaceLandmarks,
    FrameInput, ManualClock, MonitorProcessor,
};

const SECOND: i64 = 1_000;

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
}

/// Face looking straight at the camera with the given eye aspect ratio
fn face(ear: f64) -> FaceLandmarks {
    let mut points = vec![Landmark::default(); FACE_MESH_WITH_IRIS_LEN];
    place_eye(&mut points, &LEFT_EYE, 0.35, ear);
    place_eye(&mut points, &RIGHT_EYE, 0.65, ear);
    FaceLandmarks::new(points).unwrap()
}

fn place_eye(points: &mut [Landmark], eye: &EyeIndices, cx: f64, ear: f64) {
    let (w, cy) = (0.05, 0.4);
    let h = ear * w;
    points[eye.p1] = Landmark::new(cx - w, cy, 0.0);
    points[eye.p4] = Landmark::new(cx + w, cy, 0.0);
    points[eye.p2] = Landmark::new(cx - w / 3.0, cy - h, 0.0);
    points[eye.p6] = Landmark::new(cx - w / 3.0, cy + h, 0.0);
    points[eye.p3] = Landmark::new(cx + w / 3.0, cy - h, 0.0);
    points[eye.p5] = Landmark::new(cx + w / 3.0, cy + h, 0.0);
    points[eye.upper_lid] = Landmark::new(cx, cy - h, 0.0);
    points[eye.lower_lid] = Landmark::new(cx, cy + h, 0.0);
    points[eye.iris_center] = Landmark::new(cx, cy, 0.0);
}

fn sad_frame(ms: i64, sadness: f64) -> FrameInput {
    let mut frame = FrameInput::with_face(at(ms), face(0.3));
    frame.emotions = EmotionScores::new().with(EmotionScores::SAD, sadness);
    frame
}

/// Processor where only the sadness rule can fire on a steady open-eyed face
fn sadness_only_processor() -> MonitorProcessor {
    MonitorProcessor::with_thresholds(&ThresholdOverrides {
        blink_rate_min: Some(0),
        ..Default::default()
    })
    .unwrap()
}

fn sadness_alert_seconds(processor: &mut MonitorProcessor, seconds: i64) -> Vec<i64> {
    let mut fired = Vec::new();
    for second in 0..=seconds {
        let report = processor.process_frame(&sad_frame(second * SECOND, 0.5)).unwrap();
        for alert in &report.alerts {
            assert_eq!(alert.alert_type, AlertType::ProlongedSadness);
            fired.push(second);
        }
    }
    fired
}

#[test]
fn test_ninety_seconds_of_sadness_is_silent() {
    let mut processor = sadness_only_processor();
    assert!(sadness_alert_seconds(&mut processor, 90).is_empty());
}

#[test]
fn test_sadness_alerts_at_two_minutes_then_respects_cooldown() {
    let mut processor = sadness_only_processor();
    // Episode clock restarts at 121s, 242s, 363s; only 121s and 484s clear
    // the 5 minute cooldown.
    assert_eq!(sadness_alert_seconds(&mut processor, 600), vec![121, 484]);
}

#[test]
fn test_sadness_at_thirty_frames_per_second() {
    let mut processor = sadness_only_processor();
    let mut first_alert = None;
    let mut count = 0;
    let frame_ms = 33;
    let mut ms = 0;
    while ms <= 150 * SECOND {
        let report = processor.process_frame(&sad_frame(ms, 0.5)).unwrap();
        if !report.alerts.is_empty() {
            first_alert.get_or_insert(ms);
            count += report.alerts.len();
        }
        ms += frame_ms;
    }

    assert_eq!(count, 1);
    let first_alert = first_alert.unwrap();
    assert!(first_alert > 120 * SECOND);
    assert!(first_alert <= 120 * SECOND + frame_ms);
}

/// Drive a blink tracker at the given rate for just over a minute
fn blink_rate_after_a_minute(blinks_per_minute: i64) -> u32 {
    let clock = ManualClock::at_epoch();
    let mut tracker = BlinkTracker::with_clock(Arc::new(clock.clone()));
    let interval = 60 * SECOND / blinks_per_minute;

    let mut stats = tracker.update(false);
    for _ in 0..blinks_per_minute {
        clock.advance_ms(interval - 150);
        tracker.update(true);
        clock.advance_ms(150);
        stats = tracker.update(false);
    }
    stats.blink_rate
}

#[test]
fn test_blink_rate_bounds_end_to_end() {
    let check = |blinks_per_minute| {
        let rate = blink_rate_after_a_minute(blinks_per_minute);
        assert_eq!(rate as i64, blinks_per_minute);
        let clock = ManualClock::at_epoch();
        let mut alerts = AlertSystem::with_clock(AlertThresholds::default(), Arc::new(clock));
        alerts.check_blink_rate(rate)
    };

    assert!(check(25).is_none());

    let high = check(35).unwrap();
    assert_eq!(high.alert_type, AlertType::AbnormalBlinkRate);
    assert_eq!(high.severity, AlertSeverity::Low);

    let low = check(5).unwrap();
    assert_eq!(low.alert_type, AlertType::AbnormalBlinkRate);
    assert_eq!(low.severity, AlertSeverity::Medium);
}

#[test]
fn test_cooldown_caps_emissions() {
    let thresholds = AlertThresholds {
        attention_duration_ms: 10 * SECOND,
        cooldown_ms: 8 * SECOND,
        ..AlertThresholds::default()
    };
    let clock = ManualClock::at_epoch();
    let mut alerts = AlertSystem::with_clock(thresholds, Arc::new(clock.clone()));

    let total_ms = 25 * thresholds.attention_duration_ms;
    let mut emitted = 0;
    let mut elapsed = 0;
    while elapsed <= total_ms {
        emitted += alerts.check_attention(0.0).into_iter().count() as i64;
        clock.advance_ms(100);
        elapsed += 100;
    }

    assert!(emitted > 0);
    assert!(emitted <= total_ms / thresholds.cooldown_ms);
}

#[test]
fn test_release_restarts_sustained_timer() {
    let mut processor = sadness_only_processor();
    let duration = 120 * SECOND;

    processor.process_frame(&sad_frame(0, 0.5)).unwrap();
    processor.process_frame(&sad_frame(duration - 10, 0.5)).unwrap();
    processor.process_frame(&sad_frame(duration - 5, 0.0)).unwrap();

    let mut ms = duration;
    while ms < 2 * duration - 10 {
        let report = processor.process_frame(&sad_frame(ms, 0.5)).unwrap();
        assert!(report.alerts.is_empty(), "fired early at {ms} ms");
        ms += SECOND;
    }

    let report = processor.process_frame(&sad_frame(2 * duration, 0.5)).unwrap();
    assert!(report.alerts.is_empty());
    let report = processor
        .process_frame(&sad_frame(2 * duration + 1, 0.5))
        .unwrap();
    assert_eq!(report.alerts.len(), 1);
}

#[test]
fn test_sadness_episode_does_not_span_absence() {
    let mut processor = sadness_only_processor();
    for second in 0..=100 {
        processor.process_frame(&sad_frame(second * SECOND, 0.9)).unwrap();
    }
    for second in 101..=130 {
        let report = processor
            .process_frame(&FrameInput::without_face(at(second * SECOND)))
            .unwrap();
        assert!(report.alerts.is_empty());
    }

    let report = processor.process_frame(&sad_frame(131 * SECOND, 0.9)).unwrap();
    assert!(report.alerts.is_empty());
}

#[test]
fn test_absent_face_alerts_through_sink() {
    let sink = MemorySink::new();
    let mut processor = MonitorProcessor::new().with_sink(sink.clone());

    for second in 0..=310 {
        processor
            .process_frame(&FrameInput::without_face(at(second * SECOND)))
            .unwrap();
    }

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].alert_type, AlertType::ProlongedInactivity);
    assert_eq!(events[0].severity, AlertSeverity::High);
    assert_eq!(events[0].timestamp, at(301 * SECOND));
    assert!(!events[0].acknowledged);
}
