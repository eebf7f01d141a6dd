//! Deterministic synthetic data generation helpers.
//!
//! Small building blocks for synthetic tracking scenes used in tests and demos:
//! - a landmark cloud in front of the world origin,
//! - camera trajectories that rotate only about the vertical axis,
//! - projection helpers producing [`crate::Correspondence`] lists,
//! - deterministic pseudo-random noise.
//!
//! # Example
//!
//! ```
//! use vslam_core::{synthetic::scene, Camera, PinholeIntrinsics};
//!
//! let cam = Camera::new("cam0", 640, 480, PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0));
//! let landmarks = scene::landmark_cloud(200, 7);
//! let poses = scene::yaw_trajectory(3, 0.02, 0.05);
//! let corrs = scene::observe(&cam, &poses[1], &landmarks, None, 1);
//! assert!(corrs.len() > 100);
//! ```

pub mod noise;
pub mod scene;
