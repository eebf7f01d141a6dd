//! Core math and geometry primitives for `vslam-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, ...),
//! - the tracking camera model (pinhole intrinsics + Brown-Conrady distortion),
//! - typed poses ([`WorldToCamera`], [`CameraToWorld`]),
//! - landmarks, observations and explicit landmark/observation correspondences,
//! - deterministic synthetic scenes for tests and demos.
//!
//! Camera pipeline:
//! `pixel = K ∘ distortion ∘ pinhole(world_to_camera * p_world)`

/// Linear algebra type aliases and helpers.
pub mod math;
/// Camera intrinsics, distortion and the combined camera model.
pub mod models;
/// Pose newtypes with an explicit transform direction.
pub mod pose;
/// Landmarks, observations and correspondences.
pub mod types;
/// Deterministic synthetic tracking scenes.
pub mod synthetic;

pub use math::*;
pub use models::*;
pub use pose::*;
pub use types::*;
