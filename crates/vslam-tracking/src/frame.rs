//! Reference frames, feature sets and raw matches exchanged with collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vslam_core::{Landmark, LandmarkId, Observation, WorldToCamera};

/// A tracked frame (or keyframe) the next image can be matched against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    /// Image identifier.
    pub id: String,
    /// Refined pose of this frame.
    pub pose: WorldToCamera,
    /// Landmarks visible in this frame, keyed by id.
    pub visible_landmarks: BTreeMap<LandmarkId, Landmark>,
}

impl ReferenceFrame {
    pub fn new(id: impl Into<String>, pose: WorldToCamera, landmarks: &[Landmark]) -> Self {
        Self {
            id: id.into(),
            pose,
            visible_landmarks: landmarks.iter().map(|l| (l.id, *l)).collect(),
        }
    }

    pub fn landmark(&self, id: LandmarkId) -> Option<&Landmark> {
        self.visible_landmarks.get(&id)
    }

    pub fn num_landmarks(&self) -> usize {
        self.visible_landmarks.len()
    }
}

pub type Descriptor = Vec<u8>;

/// Detected features of one image, index-aligned across the three lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub points: Vec<Observation>,
    #[serde(default)]
    pub descriptors: Vec<Descriptor>,
    #[serde(default)]
    pub colors: Vec<[u8; 3]>,
}

impl FeatureSet {
    /// Features with empty descriptors and gray colors.
    pub fn from_points(points: Vec<Observation>) -> Self {
        let n = points.len();
        Self {
            points,
            descriptors: vec![Vec::new(); n],
            colors: vec![[128, 128, 128]; n],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keep only features whose flag in `keep` is set.
    pub fn filtered(&self, keep: &[bool]) -> Self {
        let pick = |i: usize| keep.get(i).copied().unwrap_or(true);
        Self {
            points: select(&self.points, pick),
            descriptors: select(&self.descriptors, pick),
            colors: select(&self.colors, pick),
        }
    }
}

fn select<T: Clone>(items: &[T], pick: impl Fn(usize) -> bool) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| pick(*i))
        .map(|(_, v)| v.clone())
        .collect()
}

/// One raw match row: a reference landmark and a feature index in the target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkMatch {
    pub landmark: LandmarkId,
    pub feature: usize,
}
