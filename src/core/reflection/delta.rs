//! Delta BSDFs: perfect mirror reflection and perfect Snell transmission.
//! Grounded in `original_source/ReflectionBSDF.cpp` and
//! `TransmissionBSDF.cpp`: both report zero throughput and zero densities
//! from `query` (a delta distribution has no density in solid-angle
//! measure) but flag `specular = 1`, and both scale the sampled throughput
//! by `1/|cos θ|` to keep importance transport unbiased through the delta.

use glam::DVec3;

use crate::core::reflection::{BsdfQuery, BsdfSample};

#[derive(Debug, Clone, Copy)]
pub struct PerfectReflection;

impl PerfectReflection {
    pub fn query(&self, _incident: DVec3, _outgoing: DVec3) -> BsdfQuery {
        BsdfQuery {
            specular: 1.0,
            ..BsdfQuery::zero()
        }
    }

    pub fn sample(&self, incident: DVec3) -> BsdfSample {
        let direction = DVec3::new(-incident.x, incident.y, -incident.z);
        let throughput = DVec3::splat(1.0 / direction.y.abs());
        BsdfSample {
            direction,
            query: BsdfQuery {
                throughput,
                forward_density: 1.0,
                reverse_density: 1.0,
                specular: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerfectTransmission {
    /// Index of refraction of the medium on the `+y` (outgoing-normal) side
    /// relative to the medium on the `-y` side.
    pub eta: f64,
}

impl PerfectTransmission {
    pub fn query(&self, _incident: DVec3, _outgoing: DVec3) -> BsdfQuery {
        BsdfQuery {
            specular: 1.0,
            ..BsdfQuery::zero()
        }
    }

    /// Returns `None` under total internal reflection; the caller (the
    /// estimator's subpath loop) treats a `None` sample as subpath
    /// termination, matching "no Fresnel partial reflection" — the ray
    /// simply does not continue rather than bouncing back.
    pub fn sample(&self, incident: DVec3) -> Option<BsdfSample> {
        let entering = incident.y > 0.0;
        let eta = if entering { 1.0 / self.eta } else { self.eta };

        let cos_theta_i = incident.y.abs();
        let sin2_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0);
        let sin2_theta_t = eta * eta * sin2_theta_i;
        if sin2_theta_t >= 1.0 {
            return None;
        }
        let cos_theta_t = (1.0 - sin2_theta_t).sqrt();

        let normal_y = if entering { 1.0 } else { -1.0 };
        let direction = -eta * incident
            + (eta * cos_theta_i - cos_theta_t) * DVec3::new(0.0, normal_y, 0.0);
        let direction = direction.normalize();

        let throughput = DVec3::splat(1.0 / cos_theta_t.max(1e-12));
        Some(BsdfSample {
            direction,
            query: BsdfQuery {
                throughput,
                forward_density: 1.0,
                reverse_density: 1.0,
                specular: 1.0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_mirrors_about_normal() {
        let r = PerfectReflection;
        let sample = r.sample(DVec3::new(0.3, 0.9, 0.1));
        assert!((sample.direction.y - 0.9).abs() < 1e-12);
        assert!((sample.direction.x + 0.3).abs() < 1e-12);
    }

    #[test]
    fn total_internal_reflection_returns_none() {
        // Dense-to-sparse at a grazing angle triggers TIR.
        let t = PerfectTransmission { eta: 1.5 };
        let grazing = DVec3::new(0.999, 0.045, 0.0).normalize();
        // Exiting the denser medium (incident.y would be negative on entry
        // from inside); flip to simulate exit.
        let result = t.sample(DVec3::new(grazing.x, -grazing.y, grazing.z));
        assert!(result.is_none());
    }
}
