//! In-memory map and feature stores.

use crate::frame::{FeatureSet, ReferenceFrame};
use crate::interfaces::{FeatureStore, MapStore};
use crate::motion_model::ConstantMotionModel;
use anyhow::{anyhow, ensure, Result};
use std::collections::HashMap;
use vslam_core::WorldToCamera;

/// Frames in insertion order with a keyframe marker and a motion model.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMap {
    frames: Vec<ReferenceFrame>,
    last_keyframe: Option<usize>,
    motion: ConstantMotionModel,
}

impl InMemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tracked frame; keyframes also become the fallback reference.
    pub fn add_frame(&mut self, frame: ReferenceFrame, is_keyframe: bool) {
        self.motion.update(&frame.pose);
        self.frames.push(frame);
        if is_keyframe {
            self.last_keyframe = Some(self.frames.len() - 1);
        }
    }
}

impl MapStore for InMemoryMap {
    fn last_frame(&self) -> Option<&ReferenceFrame> {
        self.frames.last()
    }

    fn last_keyframe(&self) -> Option<&ReferenceFrame> {
        self.last_keyframe.and_then(|idx| self.frames.get(idx))
    }

    fn estimate_pose(&self) -> WorldToCamera {
        self.motion.predict().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct StoredFeatures {
    features: FeatureSet,
    /// `true` keeps the feature when loading masked.
    mask: Option<Vec<bool>>,
}

/// Features per image with optional masks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeatureStore {
    images: HashMap<String, StoredFeatures>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: impl Into<String>, features: FeatureSet) {
        self.images.insert(
            image.into(),
            StoredFeatures {
                features,
                mask: None,
            },
        );
    }

    /// Attach a keep-mask to an already inserted image.
    pub fn set_mask(&mut self, image: &str, mask: Vec<bool>) -> Result<()> {
        let stored = self
            .images
            .get_mut(image)
            .ok_or_else(|| anyhow!("no features for image {image}"))?;
        ensure!(
            mask.len() == stored.features.len(),
            "mask length {} does not match {} features of {}",
            mask.len(),
            stored.features.len(),
            image
        );
        stored.mask = Some(mask);
        Ok(())
    }
}

impl FeatureStore for InMemoryFeatureStore {
    fn load_points_features_colors(&self, image: &str, masked: bool) -> Result<FeatureSet> {
        let stored = self
            .images
            .get(image)
            .ok_or_else(|| anyhow!("no features for image {image}"))?;
        Ok(match (&stored.mask, masked) {
            (Some(mask), true) => stored.features.filtered(mask),
            _ => stored.features.clone(),
        })
    }
}
