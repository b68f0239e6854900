//! Eye metric derivation
//!
//! This module derives per-frame ocular metrics from face mesh landmarks:
//! - Eye aspect ratio (EAR) per eye and the blink flag
//! - Iris position relative to each eye opening
//! - Gaze direction (yaw/pitch and categorical buckets)
//! - Inter-pupil distance

use crate::landmarks::{EyeIndices, FaceLandmarks, LEFT_EYE, RIGHT_EYE};
use crate::types::{EyeMetrics, GazeDirection, IrisPosition, Point2};

/// Average EAR below which both eyes are considered closed
pub const EAR_BLINK_THRESHOLD: f64 = 0.21;

/// Spans narrower than this are treated as degenerate
const MIN_SPAN: f64 = 1e-9;

/// Compute ocular metrics for one frame
pub fn compute_eye_metrics(landmarks: &FaceLandmarks) -> EyeMetrics {
    let left_ear = eye_aspect_ratio(landmarks, &LEFT_EYE);
    let right_ear = eye_aspect_ratio(landmarks, &RIGHT_EYE);
    let avg_ear = (left_ear + right_ear) / 2.0;

    let iris_position = IrisPosition {
        left: iris_position(landmarks, &LEFT_EYE),
        right: iris_position(landmarks, &RIGHT_EYE),
    };

    let gaze_direction = gaze_direction(&iris_position);

    let pupil_distance = landmarks
        .point(LEFT_EYE.iris_center)
        .distance(&landmarks.point(RIGHT_EYE.iris_center));

    EyeMetrics {
        left_ear,
        right_ear,
        avg_ear,
        is_blinking: avg_ear < EAR_BLINK_THRESHOLD,
        gaze_direction,
        iris_position,
        pupil_distance,
    }
}

/// EAR = (|p2-p6| + |p3-p5|) / (2 * |p1-p4|), 0 when the corners coincide
pub fn eye_aspect_ratio(landmarks: &FaceLandmarks, eye: &EyeIndices) -> f64 {
    let horizontal = landmarks.point(eye.p1).distance(&landmarks.point(eye.p4));
    if horizontal == 0.0 {
        return 0.0;
    }

    let vertical1 = landmarks.point(eye.p2).distance(&landmarks.point(eye.p6));
    let vertical2 = landmarks.point(eye.p3).distance(&landmarks.point(eye.p5));

    (vertical1 + vertical2) / (2.0 * horizontal)
}

/// Iris center normalized against the eye's corner and lid spans
fn iris_position(landmarks: &FaceLandmarks, eye: &EyeIndices) -> Point2 {
    let iris = landmarks.point(eye.iris_center);

    let corner_a = landmarks.point(eye.p1);
    let corner_b = landmarks.point(eye.p4);
    let x = normalize_in_span(iris.x, corner_a.x, corner_b.x);

    let upper = landmarks.point(eye.upper_lid);
    let lower = landmarks.point(eye.lower_lid);
    let y = normalize_in_span(iris.y, upper.y, lower.y);

    Point2 { x, y }
}

/// Position of `value` within [min(a,b), max(a,b)], clamped to [0,1].
/// A collapsed span (closed eye) reports the center.
fn normalize_in_span(value: f64, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let span = hi - lo;
    if span < MIN_SPAN {
        return 0.5;
    }
    ((value - lo) / span).clamp(0.0, 1.0)
}

/// Average both eyes and remap [0,1] → [-1,1]
fn gaze_direction(iris: &IrisPosition) -> GazeDirection {
    let mean_x = (iris.left.x + iris.right.x) / 2.0;
    let mean_y = (iris.left.y + iris.right.y) / 2.0;
    GazeDirection::from_angles(mean_x * 2.0 - 1.0, mean_y * 2.0 - 1.0)
}
