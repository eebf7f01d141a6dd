//! Tracking outcome types.

use crate::error::StageFailure;
use crate::frame::ReferenceFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use vslam_core::{Camera, Correspondence, WorldToCamera};
use vslam_optim::{RefineTiming, ReprojectionStats};

/// Which reference produced the pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingStage {
    LastFrame,
    LastKeyframe,
}

impl fmt::Display for TrackingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingStage::LastFrame => write!(f, "last frame"),
            TrackingStage::LastKeyframe => write!(f, "last keyframe"),
        }
    }
}

/// Work of one stage, scoped to a single tracking call.
#[derive(Debug, Clone)]
pub struct TrackingAttempt<'a> {
    pub stage: TrackingStage,
    pub reference: &'a ReferenceFrame,
    pub init_pose: WorldToCamera,
    pub correspondences: Vec<Correspondence>,
}

/// Wall-clock laps of one [`crate::FrameTracker::track`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackingTiming {
    /// Feature loading and matching, summed over attempted stages.
    pub matching: Duration,
    /// Refinement of the successful stage.
    pub refinement: RefineTiming,
    pub total: Duration,
}

/// Successful tracking of one image.
#[derive(Debug, Clone)]
pub struct TrackingOutcome {
    /// Refined world-to-camera pose.
    pub pose: WorldToCamera,
    /// Camera after refinement; equals the input unless intrinsics were optimized.
    pub camera: Camera,
    pub stage: TrackingStage,
    /// Id of the reference frame that produced the pose.
    pub reference: String,
    /// Correspondences handed to the refiner.
    pub n_matches: usize,
    pub final_cost: f64,
    pub reprojection: ReprojectionStats,
    pub timing: TrackingTiming,
    /// Why the last-frame stage failed when the keyframe fallback produced the pose.
    pub fallback: Option<StageFailure>,
}
