//! Deterministic noise helpers for synthetic datasets.
//!
//! No `thread_rng`, no dependency on the internals of `rand` generators, so
//! synthetic scenes are stable across versions and platforms.

use crate::{Real, Vec2};

/// Deterministic uniform pixel noise in `[-max_abs_px, +max_abs_px]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UniformPixelNoise {
    /// Base seed controlling the pseudo-random sequence.
    pub seed: u64,
    /// Maximum absolute per-axis noise (pixels).
    pub max_abs_px: Real,
}

impl UniformPixelNoise {
    /// Sample a 2D noise vector (pixels) for a `(frame_idx, point_idx)` key.
    pub fn sample(&self, frame_idx: usize, point_idx: usize) -> Vec2 {
        let max_abs = self.max_abs_px.abs();
        if max_abs == 0.0 {
            return Vec2::zeros();
        }
        let key = mix_key(self.seed, frame_idx, point_idx);
        let u = unit_f64(key);
        let v = unit_f64(key ^ 0x94D0_49BB_1331_11EB);
        Vec2::new((u - 0.5) * 2.0 * max_abs, (v - 0.5) * 2.0 * max_abs)
    }

    pub fn apply(&self, frame_idx: usize, point_idx: usize, uv: Vec2) -> Vec2 {
        uv + self.sample(frame_idx, point_idx)
    }
}

/// Deterministic value in `[0, 1)` for an arbitrary key.
pub fn unit_f64(key: u64) -> Real {
    let mantissa = splitmix64(key) >> 11;
    (mantissa as Real) * (1.0 / ((1u64 << 53) as Real))
}

pub(crate) fn mix_key(seed: u64, a: usize, b: usize) -> u64 {
    seed ^ (a as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (b as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
