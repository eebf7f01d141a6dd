//! Guided matching by projection.

use crate::frame::{FeatureSet, LandmarkMatch, ReferenceFrame};
use crate::interfaces::CorrespondenceMatcher;
use anyhow::{ensure, Result};
use vslam_core::{Camera, Real};

/// Matches each reference landmark to the nearest unclaimed target feature
/// within `search_radius` pixels of its projection through the reference pose.
///
/// The search window is centred on where the landmark appeared in the
/// reference frame, not on a predicted pose of the new frame, so features
/// that moved further than `search_radius` pixels between the two frames are
/// never matched. Uses no descriptors.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionMatcher {
    pub search_radius: Real,
}

impl Default for ProjectionMatcher {
    fn default() -> Self {
        Self {
            search_radius: 15.0,
        }
    }
}

impl CorrespondenceMatcher for ProjectionMatcher {
    fn match_landmarks_to_image(
        &self,
        reference: &ReferenceFrame,
        target: &FeatureSet,
        camera: &Camera,
    ) -> Result<Vec<LandmarkMatch>> {
        ensure!(
            self.search_radius > 0.0,
            "search radius must be positive, got {}",
            self.search_radius
        );
        let mut claimed = vec![false; target.len()];
        let mut matches = Vec::new();

        for (id, landmark) in &reference.visible_landmarks {
            let Some(proj) = camera.project_world(&reference.pose, &landmark.position) else {
                continue;
            };
            let mut best_dist = self.search_radius;
            let mut best_idx = None;
            for (idx, feature) in target.points.iter().enumerate() {
                if claimed[idx] {
                    continue;
                }
                let dist = (feature.uv - proj).norm();
                if dist < best_dist {
                    best_dist = dist;
                    best_idx = Some(idx);
                }
            }
            if let Some(idx) = best_idx {
                claimed[idx] = true;
                matches.push(LandmarkMatch {
                    landmark: *id,
                    feature: idx,
                });
            }
        }

        log::debug!(
            "projection matching against {}: {} of {} landmarks matched",
            reference.id,
            matches.len(),
            reference.num_landmarks()
        );
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vslam_core::synthetic::scene;
    use vslam_core::{
        Landmark, LandmarkId, Observation, PinholeIntrinsics, Pt3, Vec2, WorldToCamera,
    };

    #[test]
    fn matches_follow_landmark_ids() {
        let cam = Camera::new("c", 640, 480, PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0));
        let landmarks = scene::landmark_cloud(60, 9);
        let pose = WorldToCamera::identity();
        let corrs = scene::observe(&cam, &pose, &landmarks, None, 0);
        // reverse the feature order so indices differ from landmark ids
        let features =
            FeatureSet::from_points(corrs.iter().rev().map(|c| c.observation).collect());
        let reference = ReferenceFrame::new("ref", pose, &landmarks);

        let matches = ProjectionMatcher { search_radius: 0.5 }
            .match_landmarks_to_image(&reference, &features, &cam)
            .unwrap();

        assert_eq!(matches.len(), corrs.len());
        for m in &matches {
            let corr = corrs.iter().find(|c| c.landmark == m.landmark).unwrap();
            assert_eq!(features.points[m.feature], corr.observation);
        }
    }

    #[test]
    fn search_window_is_centred_on_reference_projection() {
        let cam = Camera::new("c", 640, 480, PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0));
        // projections through the identity pose: (320, 240) and (420, 240)
        let landmarks = [
            Landmark::new(LandmarkId(1), Pt3::new(0.0, 0.0, 5.0)),
            Landmark::new(LandmarkId(2), Pt3::new(1.0, 0.0, 5.0)),
        ];
        let reference = ReferenceFrame::new("ref", WorldToCamera::identity(), &landmarks);
        let features = FeatureSet::from_points(vec![
            Observation::new(Vec2::new(328.0, 240.0), 1.0),
            Observation::new(Vec2::new(432.0, 240.0), 1.0),
        ]);

        let matches = ProjectionMatcher { search_radius: 10.0 }
            .match_landmarks_to_image(&reference, &features, &cam)
            .unwrap();

        assert_eq!(
            matches,
            vec![LandmarkMatch {
                landmark: LandmarkId(1),
                feature: 0,
            }]
        );
    }
}
