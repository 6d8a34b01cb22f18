//! Area lights: the emitter surface, power-proportional selection, and the
//! LSDF query used both for next-event estimation and for scoring an eye
//! path that lands on a light by chance.
//!
//! Grounded in `original_source/AreaLights.{hpp,cpp}`: a light is a
//! rectangle (position, tangent frame, half-extents) with a Lambertian
//! exitance; lights are chosen with probability proportional to total
//! emitted power `π · exitance · area`, and a chosen point's area density
//! is `weight / area`.

use glam::DVec3;

use crate::core::geometry::bounds::{angular_bound, BoundingSphere};
use crate::core::geometry::Frame;
use crate::core::pbrt::{Float, INV_PI, PI};
use crate::core::reflection::{Bsdf, DiffuseBsdf};
use crate::core::rng::{piecewise_constant_index, RandomEngine};

#[derive(Debug, Clone, Copy)]
pub struct AreaLight {
    pub position: DVec3,
    pub frame: Frame,
    pub half_width: Float,
    pub half_depth: Float,
    pub exitance: DVec3,
}

impl AreaLight {
    pub fn area(&self) -> Float {
        4.0 * self.half_width * self.half_depth
    }

    pub fn power(&self) -> Float {
        PI * crate::core::pbrt::max_component(self.exitance) * self.area()
    }

    fn sample_point(&self, engine: &mut RandomEngine) -> DVec3 {
        let (u1, u2) = engine.uniform2();
        let x = (2.0 * u1 - 1.0) * self.half_width;
        let z = (2.0 * u2 - 1.0) * self.half_depth;
        self.position + self.frame.tangent * x + self.frame.bitangent * z
    }
}

/// Full light sample: a point on an emitter, the direction radiance leaves
/// it in, the radiance itself, and both densities (area and the conditional
/// solid-angle density of the emission direction given the point).
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub light_id: usize,
    pub position: DVec3,
    pub normal: DVec3,
    pub direction: DVec3,
    pub radiance: DVec3,
    pub area_density: Float,
    pub direction_density: Float,
}

pub struct LightSet {
    lights: Vec<AreaLight>,
    weights: Vec<Float>,
    total_power: Float,
}

impl LightSet {
    pub fn new(lights: Vec<AreaLight>) -> Self {
        let weights: Vec<Float> = lights.iter().map(|l| l.power()).collect();
        let total_power: Float = weights.iter().sum();
        Self {
            lights,
            weights,
            total_power,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn get(&self, id: usize) -> &AreaLight {
        &self.lights[id]
    }

    fn selection_density(&self, light_id: usize) -> Float {
        if self.total_power <= 0.0 {
            1.0 / self.lights.len() as Float
        } else {
            self.weights[light_id] / self.total_power
        }
    }

    fn pick(&self, engine: &mut RandomEngine) -> usize {
        piecewise_constant_index(engine, &self.weights)
    }

    /// Emits a full light-subpath seed: a point plus a cosine-weighted
    /// emission direction, used by BPT/VCM to start a light subpath.
    /// `scene_bounds` restricts the emission direction toward the scene's
    /// bounding sphere per SPEC_FULL.md §4.4, so a light subpath almost
    /// never wastes its first bounce on a direction that can't hit
    /// anything. A Lambertian emitter's cosine lobe has the exact shape of
    /// `DiffuseBsdf`'s own sampling distribution, so the restriction is
    /// drawn through `Bsdf::sample_bounded` with a unit-albedo diffuse lobe
    /// standing in for the emission profile rather than duplicating its
    /// bounded-sampling math here; `DiffuseBsdf::sample_bounded` always
    /// returns `Some` for a well-formed incident direction.
    /// `LightSample::direction_density` is the corresponding conditional
    /// density (the unbounded cosine density divided by the bound's
    /// `adjust` fraction), so every MIS weight downstream still sees the
    /// true sampling density rather than the unbounded one.
    pub fn emit(&self, engine: &mut RandomEngine, scene_bounds: BoundingSphere) -> LightSample {
        let light_id = self.pick(engine);
        let light = &self.lights[light_id];
        let position = light.sample_point(engine);

        let local_center = light.frame.to_local(scene_bounds.center - position);
        let mut bound = angular_bound(local_center, scene_bounds.radius);
        // An emitter never radiates into its own back hemisphere; intersect
        // the sphere's angular bound with the forward hemisphere so
        // `adjust` stays relative to the same domain `cosine_hemisphere`
        // draws from (this also keeps `sample_bounded` from ever landing a
        // direction the `same_side` check in `DiffuseBsdf::query` zeroes
        // out, which would otherwise divide `direction_density` by zero).
        bound.theta_sup = bound.theta_sup.min(PI / 2.0);
        bound.theta_inf = bound.theta_inf.min(bound.theta_sup);
        let emission_lobe = Bsdf::Diffuse(DiffuseBsdf { albedo: DVec3::ONE });
        let (sample, adjust) = emission_lobe
            .sample_bounded(engine, bound, DVec3::Y)
            .expect("diffuse sample_bounded never returns None");
        let direction = light.frame.to_world(sample.direction);
        let direction_density = sample.query.forward_density / adjust;

        let area_density = self.selection_density(light_id) / light.area();

        LightSample {
            light_id,
            position,
            normal: light.frame.normal,
            direction,
            radiance: light.exitance,
            area_density,
            direction_density,
        }
    }

    /// Next-event form: samples a point on a light and reports the
    /// direction from `reference` to that point, for an eye vertex that
    /// wants to connect directly to a light.
    pub fn sample_direct(&self, engine: &mut RandomEngine, reference: DVec3) -> LightSample {
        let light_id = self.pick(engine);
        let light = &self.lights[light_id];
        let position = light.sample_point(engine);
        let direction = (reference - position).normalize();
        let area_density = self.selection_density(light_id) / light.area();
        let cos_theta = direction.dot(light.frame.normal).max(0.0);

        LightSample {
            light_id,
            position,
            normal: light.frame.normal,
            direction,
            radiance: light.exitance,
            area_density,
            direction_density: cos_theta * INV_PI,
        }
    }

    /// Emitted radiance and densities for direction `omega` (pointing away
    /// from the light, toward the viewer) leaving `light_id`'s surface,
    /// used when an eye path hits a light by chance and needs the forward
    /// density that strategy *would* have had under explicit sampling.
    pub fn query_lsdf(&self, light_id: usize, omega: DVec3) -> (DVec3, Float, Float) {
        let light = &self.lights[light_id];
        let cos_theta = omega.dot(light.frame.normal);
        if cos_theta <= 0.0 {
            return (DVec3::ZERO, self.selection_density(light_id) / light.area(), 0.0);
        }
        let area_density = self.selection_density(light_id) / light.area();
        let direction_density = cos_theta * INV_PI;
        (light.exitance, area_density, direction_density)
    }

    pub fn total_power(&self) -> Float {
        self.total_power
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_light() -> AreaLight {
        AreaLight {
            position: DVec3::new(0.0, 2.0, 0.0),
            frame: Frame::from_normal(DVec3::new(0.0, -1.0, 0.0)),
            half_width: 0.5,
            half_depth: 0.5,
            exitance: DVec3::splat(10.0),
        }
    }

    #[test]
    fn selection_density_sums_to_one_with_single_light() {
        let set = LightSet::new(vec![make_light()]);
        assert!((set.selection_density(0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn query_lsdf_zero_from_behind() {
        let set = LightSet::new(vec![make_light()]);
        let (radiance, _area, _dir) = set.query_lsdf(0, DVec3::new(0.0, -1.0, 0.0));
        assert_eq!(radiance, DVec3::ZERO);
    }

    #[test]
    fn emit_produces_forward_hemisphere_direction() {
        let set = LightSet::new(vec![make_light()]);
        let mut engine = RandomEngine::new(3);
        let bounds = BoundingSphere {
            center: DVec3::ZERO,
            radius: 5.0,
        };
        for _ in 0..100 {
            let sample = set.emit(&mut engine, bounds);
            assert!(sample.direction.dot(sample.normal) >= -1e-9);
            assert!(sample.direction_density > 0.0);
        }
    }

    #[test]
    fn emit_restricts_toward_the_scene_bounds() {
        // A small, distant bounding sphere should collapse the emission
        // cone tightly around the direction toward its center.
        let set = LightSet::new(vec![make_light()]);
        let mut engine = RandomEngine::new(5);
        let bounds = BoundingSphere {
            center: DVec3::new(0.0, -50.0, 0.0),
            radius: 1.0,
        };
        for _ in 0..50 {
            let sample = set.emit(&mut engine, bounds);
            assert!(sample.direction.dot(DVec3::new(0.0, -1.0, 0.0)) > 0.9);
        }
    }
}
