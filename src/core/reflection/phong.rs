//! Modified-Phong glossy BSDF with an energy-weighted diffuse/specular
//! split. Grounded in `original_source/PhongBSDF.cpp`: the Bernoulli split
//! probability is the diffuse albedo's share of total reflected power,
//! `k_d = ‖ρ_d‖₁ / (‖ρ_d‖₁ + 2π‖ρ_s‖₁/(n+1))`, and the specular lobe is
//! sampled in the frame built by `reflection_to_surface` around the mirror
//! direction via `sample_phong`.

use glam::DVec3;

use crate::core::geometry::frame::reflection_to_surface;
use crate::core::pbrt::{l1_norm, Float, INV_PI, TWO_PI};
use crate::core::reflection::{BsdfQuery, BsdfSample};
use crate::core::rng::{cosine_hemisphere, RandomEngine};

#[derive(Debug, Clone, Copy)]
pub struct PhongBsdf {
    pub diffuse: DVec3,
    pub specular: DVec3,
    pub exponent: Float,
}

impl PhongBsdf {
    pub fn diffuse_split(&self) -> Float {
        let d = l1_norm(self.diffuse);
        let s = l1_norm(self.specular);
        let denom = d + TWO_PI * s / (self.exponent + 1.0);
        if denom <= 0.0 {
            1.0
        } else {
            d / denom
        }
    }

    fn mirror(incident: DVec3) -> DVec3 {
        DVec3::new(-incident.x, incident.y, -incident.z)
    }

    pub fn query(&self, incident: DVec3, outgoing: DVec3) -> BsdfQuery {
        if incident.y * outgoing.y <= 0.0 {
            return BsdfQuery::zero();
        }

        let k_d = self.diffuse_split();
        let diffuse_density = outgoing.y.abs() * INV_PI;

        let r = Self::mirror(incident);
        let cos_alpha = r.dot(outgoing).max(0.0);
        let specular_pdf = if cos_alpha > 0.0 {
            (self.exponent + 1.0) / TWO_PI * cos_alpha.powf(self.exponent)
        } else {
            0.0
        };

        let forward_density = k_d * diffuse_density + (1.0 - k_d) * specular_pdf;

        let specular_brdf = if cos_alpha > 0.0 {
            self.specular * ((self.exponent + 2.0) / TWO_PI) * cos_alpha.powf(self.exponent)
        } else {
            DVec3::ZERO
        };

        BsdfQuery {
            throughput: self.diffuse * INV_PI + specular_brdf,
            forward_density,
            reverse_density: forward_density,
            specular: 0.0,
        }
    }

    pub fn sample(&self, engine: &mut RandomEngine, incident: DVec3) -> BsdfSample {
        let k_d = self.diffuse_split();
        let direction = if engine.bernoulli(k_d) {
            let (mut dir, _) = cosine_hemisphere(engine);
            if incident.y < 0.0 {
                dir.y = -dir.y;
            }
            dir
        } else {
            let r = Self::mirror(incident);
            let frame = reflection_to_surface(r);
            let local = sample_phong_lobe(engine, self.exponent);
            frame.to_world(local)
        };

        let query = self.query(incident, direction);
        BsdfSample {
            direction,
            query,
        }
    }
}

/// `cos^n`-weighted direction around the local `+y` axis, used to centre
/// the specular lobe on the mirror direction once rotated into world space
/// by the caller's `reflection_to_surface` frame.
fn sample_phong_lobe(engine: &mut RandomEngine, exponent: Float) -> DVec3 {
    let (u1, u2) = engine.uniform2();
    let cos_alpha = u1.powf(1.0 / (exponent + 1.0));
    let sin_alpha = (1.0 - cos_alpha * cos_alpha).max(0.0).sqrt();
    let phi = TWO_PI * u2;
    DVec3::new(sin_alpha * phi.cos(), cos_alpha, sin_alpha * phi.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_diffuse_split_is_one() {
        let b = PhongBsdf {
            diffuse: DVec3::splat(0.5),
            specular: DVec3::ZERO,
            exponent: 10.0,
        };
        assert!((b.diffuse_split() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn query_zero_across_surface() {
        let b = PhongBsdf {
            diffuse: DVec3::splat(0.5),
            specular: DVec3::splat(0.2),
            exponent: 20.0,
        };
        let q = b.query(DVec3::new(0.0, 1.0, 0.0), DVec3::new(0.0, -0.5, 0.1));
        assert_eq!(q.throughput, DVec3::ZERO);
    }
}
