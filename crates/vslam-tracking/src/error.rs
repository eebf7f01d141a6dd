use std::path::PathBuf;
use thiserror::Error;
use vslam_core::LandmarkId;
use vslam_optim::RefineError;

/// Why one tracking stage did not produce a pose.
///
/// Stage failures never escape [`crate::FrameTracker::track`] on their own:
/// they trigger the keyframe fallback and are reported inside
/// [`TrackingError::TrackingFailure`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageFailure {
    #[error("no reference frame available")]
    MissingReference,
    #[error("insufficient correspondences: {found} matches, need at least {required}")]
    InsufficientCorrespondences { found: usize, required: usize },
    #[error(transparent)]
    Refinement(#[from] RefineError),
    #[error("feature loading failed: {0}")]
    Features(String),
    #[error("matching failed: {0}")]
    Matcher(String),
    #[error("match references landmark {0} not visible in the reference frame")]
    UnknownLandmark(LandmarkId),
    #[error("match references feature {index} but the image has {available} features")]
    FeatureOutOfRange { index: usize, available: usize },
}

/// Tracking failed for this frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackingError {
    /// Both stages were exhausted. `last_frame` is `None` when the first stage
    /// was skipped (no distinct last frame).
    #[error("tracking failed: last frame: {}, last keyframe: {last_keyframe}", describe(.last_frame))]
    TrackingFailure {
        last_frame: Option<StageFailure>,
        last_keyframe: StageFailure,
    },
}

fn describe(stage: &Option<StageFailure>) -> String {
    match stage {
        Some(f) => f.to_string(),
        None => "skipped".to_string(),
    }
}

/// Invalid or unreadable tracking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to build refinement thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
