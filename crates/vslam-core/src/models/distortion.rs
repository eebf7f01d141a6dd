use crate::{Real, Vec2};
use serde::{Deserialize, Serialize};

/// Brown-Conrady distortion with three radial and two tangential terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5 {
    pub k1: Real,
    pub k2: Real,
    pub k3: Real,
    pub p1: Real,
    pub p2: Real,
}

impl BrownConrady5 {
    /// Packed as `[k1, k2, k3, p1, p2]`.
    pub fn to_array(&self) -> [Real; 5] {
        [self.k1, self.k2, self.k3, self.p1, self.p2]
    }

    fn distort_impl(&self, x: Real, y: Real) -> (Real, Real) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        (x * radial + x_tan, y * radial + y_tan)
    }

    pub fn distort(&self, n_undist: &Vec2) -> Vec2 {
        let (xd, yd) = self.distort_impl(n_undist.x, n_undist.y);
        Vec2::new(xd, yd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radial_terms_pull_points_inward() {
        let d = BrownConrady5 {
            k1: -0.1,
            k2: 0.01,
            ..BrownConrady5::default()
        };
        let n = Vec2::new(0.2, -0.15);
        let r2: Real = 0.0625;
        let expected = n * (1.0 - 0.1 * r2 + 0.01 * r2 * r2);
        assert!((d.distort(&n) - expected).norm() < 1e-15);
        assert!(d.distort(&n).norm() < n.norm());
    }

    #[test]
    fn zero_distortion_is_identity() {
        let d = BrownConrady5::default();
        let n = Vec2::new(0.3, 0.4);
        assert_eq!(d.distort(&n), n);
    }
}
