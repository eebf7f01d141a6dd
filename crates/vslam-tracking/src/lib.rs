//! Monocular frame tracking against a sparse map.
//!
//! [`FrameTracker::track`] estimates the world-to-camera pose of a new image
//! by matching it against the map's last frame and, failing that, the last
//! keyframe, then refining the pose over the matched landmarks. The map,
//! feature store and matcher are passed in per call through
//! [`TrackingContext`].

pub mod config;
pub mod error;
pub mod frame;
pub mod interfaces;
pub mod map;
pub mod matcher;
pub mod motion_model;
pub mod result;
pub mod tracker;

pub use config::{KeyframeInitPose, LossFunction, TrackingConfig};
pub use error::{ConfigError, StageFailure, TrackingError};
pub use frame::{Descriptor, FeatureSet, LandmarkMatch, ReferenceFrame};
pub use interfaces::{
    CorrespondenceMatcher, FeatureStore, MapStore, PoseRefiner, SolverRefiner, TrackingContext,
};
pub use map::{InMemoryFeatureStore, InMemoryMap};
pub use matcher::ProjectionMatcher;
pub use motion_model::ConstantMotionModel;
pub use result::{TrackingAttempt, TrackingOutcome, TrackingStage, TrackingTiming};
pub use tracker::{FrameTracker, MIN_TRACKING_MATCHES};
