use crate::Pt3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Map-wide landmark identifier, stable across frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LandmarkId(pub u64);

impl fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lm{}", self.0)
    }
}

/// Triangulated 3D point in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: LandmarkId,
    pub position: Pt3,
}

impl Landmark {
    pub fn new(id: LandmarkId, position: Pt3) -> Self {
        Self { id, position }
    }
}
