//! Collaborators the tracker consumes.
//!
//! The tracker never owns map, feature or matching state; each call receives
//! these handles explicitly through [`TrackingContext`].

use crate::frame::{FeatureSet, LandmarkMatch, ReferenceFrame};
use anyhow::Result;
use std::sync::Arc;
use vslam_core::{Camera, Correspondence, WorldToCamera};
use vslam_optim::{refine_correspondences, PoseRefineOptions, PoseRefinement, RefineError};

/// Read access to the map during one tracking call.
pub trait MapStore {
    /// Most recently tracked frame.
    fn last_frame(&self) -> Option<&ReferenceFrame>;
    /// Most recent keyframe; may be the same frame as [`MapStore::last_frame`].
    fn last_keyframe(&self) -> Option<&ReferenceFrame>;
    /// Predicted world-to-camera pose of the next frame.
    fn estimate_pose(&self) -> WorldToCamera;
}

/// Access to detected features.
pub trait FeatureStore {
    /// Load points, descriptors and colors of `image`. With `masked`, features
    /// under the image mask are dropped and indices refer to the kept set.
    fn load_points_features_colors(&self, image: &str, masked: bool) -> Result<FeatureSet>;
}

/// Landmark-to-feature matching.
pub trait CorrespondenceMatcher {
    /// Match the landmarks visible in `reference` against `target` features.
    fn match_landmarks_to_image(
        &self,
        reference: &ReferenceFrame,
        target: &FeatureSet,
        camera: &Camera,
    ) -> Result<Vec<LandmarkMatch>>;
}

/// Pose refinement seam between the tracker and the solver.
pub trait PoseRefiner {
    fn refine(
        &self,
        correspondences: &[Correspondence],
        init_pose: &WorldToCamera,
        camera: &Camera,
    ) -> Result<PoseRefinement, RefineError>;
}

/// [`PoseRefiner`] backed by the tiny-solver pose refinement.
///
/// Owns a rayon pool of `options.num_threads` workers, built once and shared
/// by every refinement and every clone.
#[derive(Debug, Clone)]
pub struct SolverRefiner {
    options: PoseRefineOptions,
    pool: Arc<rayon::ThreadPool>,
}

impl SolverRefiner {
    pub fn new(options: PoseRefineOptions) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.num_threads)
            .thread_name(|i| format!("vslam-refine-{i}"))
            .build()?;
        Ok(Self {
            options,
            pool: Arc::new(pool),
        })
    }

    pub fn options(&self) -> &PoseRefineOptions {
        &self.options
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl PoseRefiner for SolverRefiner {
    fn refine(
        &self,
        correspondences: &[Correspondence],
        init_pose: &WorldToCamera,
        camera: &Camera,
    ) -> Result<PoseRefinement, RefineError> {
        self.pool
            .install(|| refine_correspondences(correspondences, init_pose, camera, &self.options))
    }
}

/// Collaborators for one tracking call.
#[derive(Clone, Copy)]
pub struct TrackingContext<'a> {
    pub map: &'a dyn MapStore,
    pub features: &'a dyn FeatureStore,
    pub matcher: &'a dyn CorrespondenceMatcher,
}
