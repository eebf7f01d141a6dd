//! Camera model used by the tracker.
//!
//! The mapping from a camera-frame point to a pixel is:
//! `pixel = intrinsics(distortion(pinhole(p_camera)))`
//!
//! Parameter layouts are shared with the optimizer:
//! intrinsics `[fx, fy, cx, cy]`, distortion `[k1, k2, k3, p1, p2]`.

mod camera;
mod distortion;
mod intrinsics;

pub use camera::*;
pub use distortion::*;
pub use intrinsics::*;
