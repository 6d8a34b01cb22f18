//! Lambertian diffuse BSDF. Grounded in
//! `original_source/DiffuseBSDF.cpp`: throughput `ρ/π` on the same side of
//! the surface, zero otherwise; solid-angle density `|n·ω|/π` under
//! cosine-weighted sampling.

use glam::DVec3;

use crate::core::geometry::bounds::AngularBound;
use crate::core::pbrt::INV_PI;
use crate::core::reflection::{BsdfQuery, BsdfSample};
use crate::core::rng::{cosine_hemisphere, cosine_hemisphere_bounded, RandomEngine};

#[derive(Debug, Clone, Copy)]
pub struct DiffuseBsdf {
    pub albedo: DVec3,
}

impl DiffuseBsdf {
    fn same_side(incident: DVec3, outgoing: DVec3) -> bool {
        incident.y * outgoing.y > 0.0
    }

    pub fn query(&self, incident: DVec3, outgoing: DVec3) -> BsdfQuery {
        if !Self::same_side(incident, outgoing) {
            return BsdfQuery::zero();
        }
        let density = outgoing.y.abs() * INV_PI;
        BsdfQuery {
            throughput: self.albedo * INV_PI,
            forward_density: density,
            reverse_density: incident.y.abs() * INV_PI,
            specular: 0.0,
        }
    }

    pub fn sample(&self, engine: &mut RandomEngine, incident: DVec3) -> BsdfSample {
        let (mut dir, _density) = cosine_hemisphere(engine);
        if incident.y < 0.0 {
            dir.y = -dir.y;
        }
        let query = self.query(incident, dir);
        BsdfSample {
            direction: dir,
            query,
        }
    }

    pub fn sample_bounded(
        &self,
        engine: &mut RandomEngine,
        bound: AngularBound,
        incident: DVec3,
    ) -> (BsdfSample, f64) {
        let (mut dir, adjust) = cosine_hemisphere_bounded(engine, bound);
        if incident.y < 0.0 {
            dir.y = -dir.y;
        }
        let query = self.query(incident, dir);
        (
            BsdfSample {
                direction: dir,
                query,
            },
            adjust,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_throughput_across_surface() {
        let b = DiffuseBsdf {
            albedo: DVec3::new(0.5, 0.5, 0.5),
        };
        let q = b.query(DVec3::new(0.0, 1.0, 0.0), DVec3::new(0.0, -1.0, 0.0));
        assert_eq!(q.throughput, DVec3::ZERO);
    }

    #[test]
    fn density_matches_cosine_law() {
        let b = DiffuseBsdf {
            albedo: DVec3::splat(0.8),
        };
        let wo = DVec3::new(0.0, 0.6, 0.8);
        let q = b.query(DVec3::new(0.0, 1.0, 0.0), wo);
        assert!((q.forward_density - wo.y * INV_PI).abs() < 1e-12);
    }
}
