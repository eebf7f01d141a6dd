//! Two-stage frame tracking.
//!
//! A new image is first tracked against the last frame, starting from the
//! map's predicted pose. If that stage is unavailable or fails, it is tracked
//! against the last keyframe. A stage fails without calling the refiner when
//! fewer than [`MIN_TRACKING_MATCHES`] raw matches are found.

use crate::config::{KeyframeInitPose, TrackingConfig};
use crate::error::{ConfigError, StageFailure, TrackingError};
use crate::frame::{FeatureSet, LandmarkMatch, ReferenceFrame};
use crate::interfaces::{PoseRefiner, SolverRefiner, TrackingContext};
use crate::result::{TrackingAttempt, TrackingOutcome, TrackingStage, TrackingTiming};
use std::time::{Duration, Instant};
use vslam_core::{Camera, Correspondence, WorldToCamera};
use vslam_optim::PoseRefinement;

/// Minimum number of raw matches a stage needs before refinement is attempted.
pub const MIN_TRACKING_MATCHES: usize = 100;

/// Tracks images against the map's last frame and last keyframe.
#[derive(Debug, Clone)]
pub struct FrameTracker<R: PoseRefiner = SolverRefiner> {
    config: TrackingConfig,
    refiner: R,
}

impl FrameTracker<SolverRefiner> {
    /// Validate `config` and build a tracker refining with tiny-solver.
    pub fn new(config: TrackingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let refiner = SolverRefiner::new(config.refine_options())?;
        Ok(Self { config, refiner })
    }
}

impl<R: PoseRefiner> FrameTracker<R> {
    /// Validate `config` and build a tracker with a custom refiner.
    pub fn with_refiner(config: TrackingConfig, refiner: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, refiner })
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn refiner(&self) -> &R {
        &self.refiner
    }

    /// Estimate the pose of `image`.
    ///
    /// The map is only read; registering the result is up to the caller.
    pub fn track(
        &self,
        image: &str,
        ctx: TrackingContext<'_>,
        camera: &Camera,
    ) -> Result<TrackingOutcome, TrackingError> {
        let start = Instant::now();
        let mut matching = Duration::ZERO;
        let keyframe = ctx.map.last_keyframe();

        let last_frame = ctx
            .map
            .last_frame()
            .filter(|frame| keyframe.map_or(true, |kf| kf.id != frame.id));

        let first_failure = match last_frame {
            Some(frame) => {
                let attempt = TrackingAttempt {
                    stage: TrackingStage::LastFrame,
                    reference: frame,
                    init_pose: ctx.map.estimate_pose(),
                    correspondences: Vec::new(),
                };
                match self.run_stage(image, attempt, ctx, camera, &mut matching) {
                    Ok((attempt, refined)) => {
                        return Ok(self.outcome(attempt, refined, matching, start, None));
                    }
                    Err(failure) => {
                        log::warn!(
                            "{image}: tracking against last frame {} failed: {failure}",
                            frame.id
                        );
                        Some(failure)
                    }
                }
            }
            None => {
                log::debug!("{image}: no distinct last frame, tracking against last keyframe");
                None
            }
        };

        let Some(keyframe) = keyframe else {
            return Err(TrackingError::TrackingFailure {
                last_frame: first_failure,
                last_keyframe: StageFailure::MissingReference,
            });
        };

        let attempt = TrackingAttempt {
            stage: TrackingStage::LastKeyframe,
            reference: keyframe,
            init_pose: match self.config.keyframe_init_pose {
                KeyframeInitPose::Identity => WorldToCamera::identity(),
                KeyframeInitPose::Keyframe => keyframe.pose,
            },
            correspondences: Vec::new(),
        };
        match self.run_stage(image, attempt, ctx, camera, &mut matching) {
            Ok((attempt, refined)) => {
                Ok(self.outcome(attempt, refined, matching, start, first_failure))
            }
            Err(failure) => {
                log::warn!(
                    "{image}: tracking against last keyframe {} failed: {failure}",
                    keyframe.id
                );
                Err(TrackingError::TrackingFailure {
                    last_frame: first_failure,
                    last_keyframe: failure,
                })
            }
        }
    }

    fn run_stage<'r>(
        &self,
        image: &str,
        mut attempt: TrackingAttempt<'r>,
        ctx: TrackingContext<'_>,
        camera: &Camera,
        matching: &mut Duration,
    ) -> Result<(TrackingAttempt<'r>, PoseRefinement), StageFailure> {
        let reference = attempt.reference;
        let lap = Instant::now();
        let matched = load_and_match(image, reference, ctx, camera);
        *matching += lap.elapsed();
        let (features, matches) = matched?;

        log::debug!(
            "{image}: {} matches against {} ({} landmarks, {} features)",
            matches.len(),
            reference.id,
            reference.num_landmarks(),
            features.len()
        );
        if matches.len() < MIN_TRACKING_MATCHES {
            return Err(StageFailure::InsufficientCorrespondences {
                found: matches.len(),
                required: MIN_TRACKING_MATCHES,
            });
        }

        attempt.correspondences = build_correspondences(reference, &features, &matches)?;
        let refined = self
            .refiner
            .refine(&attempt.correspondences, &attempt.init_pose, camera)?;
        Ok((attempt, refined))
    }

    fn outcome(
        &self,
        attempt: TrackingAttempt<'_>,
        refined: PoseRefinement,
        matching: Duration,
        start: Instant,
        fallback: Option<StageFailure>,
    ) -> TrackingOutcome {
        let n_matches = attempt.correspondences.len();
        log::info!(
            "tracked against {} {} with {n_matches} matches, rmse {:.3} px",
            attempt.stage,
            attempt.reference.id,
            refined.reprojection.rmse
        );
        TrackingOutcome {
            pose: refined.pose,
            camera: refined.camera,
            stage: attempt.stage,
            reference: attempt.reference.id.clone(),
            n_matches,
            final_cost: refined.final_cost,
            reprojection: refined.reprojection,
            timing: TrackingTiming {
                matching,
                refinement: refined.timing,
                total: start.elapsed(),
            },
            fallback,
        }
    }
}

fn load_and_match(
    image: &str,
    reference: &ReferenceFrame,
    ctx: TrackingContext<'_>,
    camera: &Camera,
) -> Result<(FeatureSet, Vec<LandmarkMatch>), StageFailure> {
    let features = ctx
        .features
        .load_points_features_colors(image, true)
        .map_err(|e| StageFailure::Features(format!("{e:#}")))?;
    let matches = ctx
        .matcher
        .match_landmarks_to_image(reference, &features, camera)
        .map_err(|e| StageFailure::Matcher(format!("{e:#}")))?;
    Ok((features, matches))
}

/// Pair each match row's landmark with the feature of the same row.
fn build_correspondences(
    reference: &ReferenceFrame,
    features: &FeatureSet,
    matches: &[LandmarkMatch],
) -> Result<Vec<Correspondence>, StageFailure> {
    matches
        .iter()
        .map(|m| {
            let landmark = reference
                .landmark(m.landmark)
                .ok_or(StageFailure::UnknownLandmark(m.landmark))?;
            let observation = features.points.get(m.feature).ok_or(
                StageFailure::FeatureOutOfRange {
                    index: m.feature,
                    available: features.len(),
                },
            )?;
            Ok(Correspondence::new(landmark, *observation))
        })
        .collect()
}
