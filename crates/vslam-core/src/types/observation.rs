//! Observation and correspondence types.
//!
//! A tracking stage hands the refiner a list of [`Correspondence`] values.
//! Each one pairs a landmark with the detection matched to it in the same
//! match row, so a 3D point can never drift out of alignment with its 2D
//! observation.

use crate::{Landmark, LandmarkId, Pt3, Real, Vec2};
use serde::{Deserialize, Serialize};

/// 2D feature detection with its scale.
///
/// `scale` is the detector scale in pixels and is used as the standard
/// deviation of the reprojection residual.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub uv: Vec2,
    pub scale: Real,
}

impl Observation {
    pub fn new(uv: Vec2, scale: Real) -> Self {
        Self { uv, scale }
    }

    /// Valid when coordinates are finite and the scale is strictly positive.
    pub fn is_valid(&self) -> bool {
        self.uv.iter().all(|v| v.is_finite()) && self.scale.is_finite() && self.scale > 0.0
    }
}

/// One landmark paired with its observation in the target image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub landmark: LandmarkId,
    pub point: Pt3,
    pub observation: Observation,
}

impl Correspondence {
    pub fn new(landmark: &Landmark, observation: Observation) -> Self {
        Self {
            landmark: landmark.id,
            point: landmark.position,
            observation,
        }
    }
}

/// Split correspondences into index-aligned point and observation lists.
pub fn split_correspondences(corrs: &[Correspondence]) -> (Vec<Pt3>, Vec<Observation>) {
    corrs.iter().map(|c| (c.point, c.observation)).unzip()
}
