//! Parameter block packing.
//!
//! - [`pose_se3`]: world-to-camera poses as 7D SE(3) blocks
//! - [`camera`]: intrinsics `[fx, fy, cx, cy]` and distortion `[k1, k2, k3, p1, p2]` blocks

pub mod camera;
pub mod pose_se3;
