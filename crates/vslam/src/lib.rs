//! High-level entry crate for `vslam-rs` monocular frame tracking.
//!
//! Tracking a new image means estimating its world-to-camera pose from the
//! landmarks already in the map:
//! - match the image against the last tracked frame and refine the pose
//!   starting from the map's motion prediction,
//! - otherwise match it against the last keyframe and refine again,
//! - refine with a robust reprojection cost, an up-vector prior and optional
//!   intrinsics priors, solved by tiny-solver.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use vslam::prelude::*;
//!
//! # let (map, features, camera): (InMemoryMap, InMemoryFeatureStore, Camera) = unimplemented!();
//! let tracker = FrameTracker::new(TrackingConfig::default())?;
//! let matcher = ProjectionMatcher::default();
//! let ctx = TrackingContext {
//!     map: &map,
//!     features: &features,
//!     matcher: &matcher,
//! };
//! let outcome = tracker.track("image_0042", ctx, &camera)?;
//! println!("{:?} from {}", outcome.stage, outcome.reference);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`core`] - Math types, camera model, typed poses, correspondences
//! - [`optim`] - Problem IR, factors, tiny-solver backend, pose refinement
//! - [`tracking`] - Frame tracker, configuration, map and feature stores
//! - [`synthetic`] - Deterministic synthetic scenes for testing

// ═══════════════════════════════════════════════════════════════════════════════
// Foundation Crates
// ═══════════════════════════════════════════════════════════════════════════════

/// Core math types, camera model and typed poses.
///
/// Re-exports everything from `vslam_core`.
pub mod core {
    pub use vslam_core::*;
}

/// Non-linear optimization with backend-agnostic IR.
///
/// Re-exports everything from `vslam_optim`.
pub mod optim {
    pub use vslam_optim::*;
}

/// Two-stage frame tracking.
///
/// Re-exports everything from `vslam_tracking`.
pub mod tracking {
    pub use vslam_tracking::*;
}

/// Deterministic synthetic scenes: landmark clouds, trajectories, observations.
pub mod synthetic {
    pub use vslam_core::synthetic::*;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Re-exports (Top-Level)
// ═══════════════════════════════════════════════════════════════════════════════

pub use vslam_core::{
    BrownConrady5, Camera, CameraToWorld, Correspondence, Iso3, Landmark, LandmarkId,
    Observation, PinholeIntrinsics, Pt3, Vec2, Vec3, WorldToCamera,
};
pub use vslam_optim::{
    refine_correspondences, refine_pose, PoseRefineOptions, PoseRefinement, RefineError,
    RobustLoss,
};
pub use vslam_tracking::{
    FrameTracker, TrackingConfig, TrackingError, TrackingOutcome, TrackingStage,
    MIN_TRACKING_MATCHES,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude (Quick Start)
// ═══════════════════════════════════════════════════════════════════════════════

/// Convenient re-exports for common use cases.
///
/// ```no_run
/// use vslam::prelude::*;
/// ```
pub mod prelude {
    pub use vslam_core::{
        Camera, Correspondence, Landmark, LandmarkId, Observation, PinholeIntrinsics,
        WorldToCamera,
    };
    pub use vslam_optim::{PoseRefineOptions, RefineError, RobustLoss};
    pub use vslam_tracking::{
        CorrespondenceMatcher, FeatureSet, FeatureStore, FrameTracker, InMemoryFeatureStore,
        InMemoryMap, MapStore, ProjectionMatcher, ReferenceFrame, TrackingConfig,
        TrackingContext, TrackingError, TrackingOutcome, TrackingStage,
    };
}
