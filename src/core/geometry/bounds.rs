//! Angular bound of a sphere as seen from the origin, and the bounding
//! sphere type it operates on.
//!
//! Grounded in `original_source/Sample.cpp`'s closed-form derivation: the
//! cone half-angle comes from `asin(radius / distance)`, the polar center
//! from `acos(y / distance)` in the local `y`-up frame, and the azimuthal
//! half-width from `asin(sin(alpha) / sin(theta_center))`, degenerating to
//! the full `[0, 2π)` range when the cone contains the pole.

use glam::DVec3;

use crate::core::pbrt::{Float, PI, TWO_PI};

#[derive(Debug, Clone, Copy)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: Float,
}

/// Polar/azimuthal interval under which a sphere is visible from the
/// origin, in a local `y`-up frame.
#[derive(Debug, Clone, Copy)]
pub struct AngularBound {
    pub theta_inf: Float,
    pub theta_sup: Float,
    pub phi_inf: Float,
    pub phi_sup: Float,
}

/// `center` is expressed relative to the origin already (i.e. it is the
/// vector from the sampling point to the sphere's center, in the local
/// frame). Degenerates gracefully when the origin lies inside the sphere:
/// the bound then covers the whole hemisphere/sphere as appropriate.
pub fn angular_bound(center: DVec3, radius: Float) -> AngularBound {
    let distance = center.length();
    if distance <= radius {
        // Origin is inside (or on) the sphere: every direction is valid.
        return AngularBound {
            theta_inf: 0.0,
            theta_sup: PI,
            phi_inf: 0.0,
            phi_sup: TWO_PI,
        };
    }

    let sin_alpha = (radius / distance).clamp(0.0, 1.0);
    let alpha = sin_alpha.asin();

    let cos_theta_c = (center.y / distance).clamp(-1.0, 1.0);
    let theta_c = cos_theta_c.acos();

    let theta_inf = (theta_c - alpha).max(0.0);
    let theta_sup = (theta_c + alpha).min(PI);

    let sin_theta_c = theta_c.sin();

    let (phi_inf, phi_sup) = if sin_theta_c <= sin_alpha {
        // The cone swallows the pole: every azimuth is covered.
        (0.0, TWO_PI)
    } else {
        let phi_c = center.z.atan2(center.x);
        let delta_phi = (sin_alpha / sin_theta_c).clamp(-1.0, 1.0).asin();
        (phi_c - delta_phi, phi_c + delta_phi)
    };

    AngularBound {
        theta_inf,
        theta_sup,
        phi_inf,
        phi_sup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sphere_when_origin_inside() {
        let b = angular_bound(DVec3::new(0.1, 0.0, 0.0), 1.0);
        assert_eq!(b.theta_inf, 0.0);
        assert!((b.theta_sup - PI).abs() < 1e-12);
    }

    #[test]
    fn narrow_bound_for_far_small_sphere() {
        let b = angular_bound(DVec3::new(0.0, 100.0, 0.0), 1.0);
        // Small sphere straight up: narrow theta range centered near 0.
        assert!(b.theta_sup < 0.1);
    }
}
