use crate::{Real, Vec2};
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics without skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    /// Focal length in pixels along X.
    pub fx: Real,
    /// Focal length in pixels along Y.
    pub fy: Real,
    /// Principal point X coordinate in pixels.
    pub cx: Real,
    /// Principal point Y coordinate in pixels.
    pub cy: Real,
}

impl PinholeIntrinsics {
    pub fn new(fx: Real, fy: Real, cx: Real, cy: Real) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Packed as `[fx, fy, cx, cy]`.
    pub fn to_array(&self) -> [Real; 4] {
        [self.fx, self.fy, self.cx, self.cy]
    }

    /// Map distorted normalized coordinates into pixels.
    pub fn sensor_to_pixel(&self, sensor: &Vec2) -> Vec2 {
        Vec2::new(self.fx * sensor.x + self.cx, self.fy * sensor.y + self.cy)
    }

    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx > 0.0
            && self.fy > 0.0
    }
}
