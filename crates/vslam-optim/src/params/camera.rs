//! Intrinsics and distortion parameter blocks.

use anyhow::{ensure, Result};
use nalgebra::{DVector, DVectorView};
use vslam_core::{BrownConrady5, Camera, PinholeIntrinsics};

pub const INTRINSICS_DIM: usize = 4;
pub const DISTORTION_DIM: usize = 5;

/// `[fx, fy, cx, cy]`
pub fn intrinsics_to_dvec(k: &PinholeIntrinsics) -> DVector<f64> {
    DVector::from_row_slice(&k.to_array())
}

pub fn intrinsics_from_dvec(v: DVectorView<'_, f64>) -> Result<PinholeIntrinsics> {
    ensure!(
        v.len() == INTRINSICS_DIM,
        "expected intrinsics vector of length {}, got {}",
        INTRINSICS_DIM,
        v.len()
    );
    Ok(PinholeIntrinsics::new(v[0], v[1], v[2], v[3]))
}

/// `[k1, k2, k3, p1, p2]`
pub fn distortion_to_dvec(d: &BrownConrady5) -> DVector<f64> {
    DVector::from_row_slice(&d.to_array())
}

pub fn distortion_from_dvec(v: DVectorView<'_, f64>) -> Result<BrownConrady5> {
    ensure!(
        v.len() == DISTORTION_DIM,
        "expected distortion vector of length {}, got {}",
        DISTORTION_DIM,
        v.len()
    );
    Ok(BrownConrady5 {
        k1: v[0],
        k2: v[1],
        k3: v[2],
        p1: v[3],
        p2: v[4],
    })
}

/// Rebuild a camera from optimized blocks, keeping id and image size.
pub fn camera_from_blocks(
    template: &Camera,
    intr: DVectorView<'_, f64>,
    dist: DVectorView<'_, f64>,
) -> Result<Camera> {
    let mut camera = template.clone();
    camera.intrinsics = intrinsics_from_dvec(intr)?;
    camera.distortion = distortion_from_dvec(dist)?;
    Ok(camera)
}
