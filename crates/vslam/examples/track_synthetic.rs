//! Track a synthetic image sequence frame by frame.
//!
//! This example:
//! 1. Generates a landmark cloud and a slow yaw trajectory
//! 2. Seeds the map with the first frame as a keyframe
//! 3. Tracks every following frame, registering it in the map
//! 4. Prints the pose error and the stage that produced each pose
//!
//! Run with: `RUST_LOG=debug cargo run -p vslam --example track_synthetic`

use anyhow::Result;
use vslam::prelude::*;
use vslam::synthetic::{noise::UniformPixelNoise, scene};

const N_FRAMES: usize = 12;
const KEYFRAME_EVERY: usize = 4;

fn visible_landmarks(camera: &Camera, pose: &WorldToCamera, cloud: &[Landmark]) -> Vec<Landmark> {
    scene::observe(camera, pose, cloud, None, 0)
        .iter()
        .map(|c| Landmark::new(c.landmark, c.point))
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let camera = Camera::new("cam0", 640, 480, PinholeIntrinsics::new(520.0, 520.0, 320.0, 240.0));
    let cloud = scene::landmark_cloud(400, 2024);
    let poses = scene::yaw_trajectory(N_FRAMES, 0.004, 0.02);
    let noise = UniformPixelNoise {
        seed: 7,
        max_abs_px: 0.3,
    };

    let mut map = InMemoryMap::new();
    let mut features = InMemoryFeatureStore::new();
    map.add_frame(
        ReferenceFrame::new("frame_00", poses[0], &visible_landmarks(&camera, &poses[0], &cloud)),
        true,
    );

    let tracker = FrameTracker::new(TrackingConfig::default())?;
    let matcher = ProjectionMatcher {
        search_radius: 8.0,
    };

    println!("frame     stage           matches  rmse[px]  rot[mrad]  trans[mm]");
    for (idx, gt) in poses.iter().enumerate().skip(1) {
        let image = format!("frame_{idx:02}");
        let observed = scene::observe(&camera, gt, &cloud, Some(&noise), idx);
        features.insert(
            image.clone(),
            FeatureSet::from_points(observed.iter().map(|c| c.observation).collect()),
        );

        let ctx = TrackingContext {
            map: &map,
            features: &features,
            matcher: &matcher,
        };
        let outcome = match tracker.track(&image, ctx, &camera) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("{image}: {err}");
                continue;
            }
        };

        let (rot_err, trans_err) = outcome.pose.distance_to(gt);
        println!(
            "{image:<9} {:<15} {:>7}  {:>8.3}  {:>9.3}  {:>9.3}",
            outcome.stage.to_string(),
            outcome.n_matches,
            outcome.reprojection.rmse,
            rot_err * 1e3,
            trans_err * 1e3
        );

        // visible set as seen from the refined pose
        let seen = visible_landmarks(&camera, &outcome.pose, &cloud);
        map.add_frame(
            ReferenceFrame::new(image, outcome.pose, &seen),
            idx % KEYFRAME_EVERY == 0,
        );
    }

    Ok(())
}
