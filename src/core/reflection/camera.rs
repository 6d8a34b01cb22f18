//! Pinhole-camera "BSDF": converts the projected-solid-angle pixel measure
//! into the same throughput/density vocabulary every other vertex uses, so
//! the camera vertex needs no special case in the estimators. Grounded in
//! `original_source/BSDF.cpp`'s `CameraBSDF`: throughput `1/cos⁴θ`,
//! sampling disallowed because ray generation is driven by the pixel grid,
//! not by importance-sampling the lens.

use glam::DVec3;

use crate::core::reflection::BsdfQuery;

#[derive(Debug, Clone, Copy)]
pub struct CameraBsdf;

impl CameraBsdf {
    pub fn query(&self, _incident: DVec3, outgoing: DVec3) -> BsdfQuery {
        let cos_theta = outgoing.y.abs();
        if cos_theta <= 0.0 {
            return BsdfQuery::zero();
        }
        let c2 = cos_theta * cos_theta;
        BsdfQuery {
            throughput: DVec3::splat(1.0 / (c2 * c2)),
            forward_density: 0.0,
            reverse_density: 0.0,
            specular: 0.0,
        }
    }
}
