//! Face mesh landmark layout
//!
//! Index constants follow the MediaPipe face mesh with refined iris points
//! (478 landmarks). Eye point names use the EAR convention: `P1`/`P4` are the
//! horizontal corners, `P2`/`P6` and `P3`/`P5` the two vertical lid pairs.

use crate::error::ComputeError;
use crate::types::Landmark;
use serde::{Deserialize, Serialize};

/// Number of points produced by the face mesh with iris refinement
pub const FACE_MESH_WITH_IRIS_LEN: usize = 478;

/// Six EAR points plus lid extremes and iris center for one eye
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeIndices {
    pub p1: usize,
    pub p2: usize,
    pub p3: usize,
    pub p4: usize,
    pub p5: usize,
    pub p6: usize,
    pub upper_lid: usize,
    pub lower_lid: usize,
    pub iris_center: usize,
}

pub const LEFT_EYE: EyeIndices = EyeIndices {
    p1: 33,
    p2: 160,
    p3: 158,
    p4: 133,
    p5: 153,
    p6: 144,
    upper_lid: 159,
    lower_lid: 145,
    iris_center: 468,
};

pub const RIGHT_EYE: EyeIndices = EyeIndices {
    p1: 362,
    p2: 385,
    p3: 387,
    p4: 263,
    p5: 373,
    p6: 380,
    upper_lid: 386,
    lower_lid: 374,
    iris_center: 473,
};

/// Blendshapes averaged by the pain-indicator rule
pub const PAIN_BLENDSHAPES: [&str; 8] = [
    "browDownLeft",
    "browDownRight",
    "cheekSquintLeft",
    "cheekSquintRight",
    "eyeSquintLeft",
    "eyeSquintRight",
    "noseSneerLeft",
    "noseSneerRight",
];

/// One frame of face mesh landmarks, guaranteed long enough for every
/// index this crate reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct FaceLandmarks(Vec<Landmark>);

impl FaceLandmarks {
    pub fn new(points: Vec<Landmark>) -> Result<Self, ComputeError> {
        if points.len() < FACE_MESH_WITH_IRIS_LEN {
            return Err(ComputeError::InsufficientLandmarks {
                expected: FACE_MESH_WITH_IRIS_LEN,
                actual: points.len(),
            });
        }
        Ok(Self(points))
    }

    /// Landmark at a named index
    pub fn point(&self, index: usize) -> Landmark {
        self.0[index]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Landmark] {
        &self.0
    }

    /// Replace a single landmark in a test fixture. Panics when `index` is out
    /// of range.
    #[cfg(test)]
    pub(crate) fn set(&mut self, index: usize, landmark: Landmark) {
        self.0[index] = landmark;
    }
}

impl TryFrom<Vec<Landmark>> for FaceLandmarks {
    type Error = ComputeError;

    fn try_from(points: Vec<Landmark>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<FaceLandmarks> for Vec<Landmark> {
    fn from(landmarks: FaceLandmarks) -> Self {
        landmarks.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_landmark_sets() {
        let result = FaceLandmarks::new(vec![Landmark::default(); 468]);
        match result {
            Err(ComputeError::InsufficientLandmarks { expected, actual }) => {
                assert_eq!(expected, FACE_MESH_WITH_IRIS_LEN);
                assert_eq!(actual, 468);
            }
            other => panic!("expected InsufficientLandmarks, got {other:?}"),
        }
    }

    #[test]
    fn test_indices_within_mesh() {
        for eye in [LEFT_EYE, RIGHT_EYE] {
            for index in [
                eye.p1,
                eye.p2,
                eye.p3,
                eye.p4,
                eye.p5,
                eye.p6,
                eye.upper_lid,
                eye.lower_lid,
                eye.iris_center,
            ] {
                assert!(index < FACE_MESH_WITH_IRIS_LEN);
            }
        }
    }

    #[test]
    fn test_deserialize_validates_length() {
        let short = serde_json::to_string(&vec![Landmark::default(); 10]).unwrap();
        assert!(serde_json::from_str::<FaceLandmarks>(&short).is_err());

        let full = serde_json::to_string(&vec![Landmark::default(); 478]).unwrap();
        let parsed: FaceLandmarks = serde_json::from_str(&full).unwrap();
        assert_eq!(parsed.len(), 478);
    }
}
