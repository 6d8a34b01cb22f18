//! Unidirectional path tracing with next-event estimation.
//!
//! Grounded directly in `original_source/PT.cpp`'s `PathTracing::
//! _traceEye`/`_connect`/`_connect_light`. Unlike `bpt`/`vcm`, the source
//! here never builds a light subpath or a `MisPartials` chain — MIS between
//! the two competing strategies (BSDF sampling landing on a light vs.
//! explicit next-event estimation) is a single balance-heuristic ratio kept
//! as one scalar `density` per vertex, converted to area measure one bounce
//! at a time. `vertex::MisPartials` is deliberately not used here.

use glam::DVec3;

use crate::core::camera::Camera;
use crate::core::estimators::{Estimator, EstimatorConfig, PixelSample};
use crate::core::geometry::interaction::SurfacePoint;
use crate::core::geometry::Ray;
use crate::core::pbrt::{is_finite3, Float};
use crate::core::rng::RandomEngine;
use crate::core::scene::Scene;
use crate::core::vertex::Edge;

pub struct PathTracingEstimator {
    config: EstimatorConfig,
}

impl PathTracingEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }
}

/// Per-vertex state path tracing needs: no partial-sum chain, just the
/// area-measure density accumulated so far via BSDF sampling, used to
/// balance against next-event estimation's own density when a path
/// stumbles onto a light by chance.
#[derive(Debug, Clone, Copy)]
struct PtVertex {
    surface: SurfacePoint,
    /// Direction back toward the previous vertex (world space, unit).
    omega: DVec3,
    throughput: DVec3,
    specular: Float,
    density: Float,
}

impl Estimator for PathTracingEstimator {
    fn estimate(&self, scene: &Scene, _camera: &Camera, engine: &mut RandomEngine, ray: Ray) -> PixelSample {
        PixelSample::eye_only(self.trace_eye(scene, engine, ray))
    }

    fn name(&self) -> &'static str {
        "path-tracing"
    }
}

impl PathTracingEstimator {
    fn trace_eye(&self, scene: &Scene, engine: &mut RandomEngine, ray: Ray) -> DVec3 {
        let mut radiance = DVec3::ZERO;
        let mut ray = ray;

        let mut hit = match scene.intersect(&ray) {
            Some(h) => h,
            None => return radiance,
        };
        let mut surface = scene.query_surface(&hit, -ray.direction);

        // A path can walk across several back-to-back zero-thickness light
        // quads before reaching an opaque surface; each one contributes
        // directly (no competing NEE strategy exists before the first real
        // vertex is established).
        while surface.is_light() {
            if let Some(light_id) = surface.light_id() {
                let (radiance_here, _area_density, _dir_density) = scene.lights.query_lsdf(light_id, -ray.direction);
                radiance += radiance_here;
            }
            ray = surface.spawn_ray(ray.direction);
            hit = match scene.intersect(&ray) {
                Some(h) => h,
                None => return radiance,
            };
            surface = scene.query_surface(&hit, -ray.direction);
        }

        let mut prv = PtVertex {
            surface,
            omega: -ray.direction,
            throughput: DVec3::ONE,
            specular: 0.0,
            density: 1.0,
        };

        let mut path_size = 2usize;

        loop {
            radiance += self.connect_to_light(scene, engine, &prv);

            let bsdf = match scene.query_bsdf(&prv.surface) {
                Ok(b) => b,
                Err(_) => return radiance,
            };
            let incident_local = prv.surface.frame.to_local(prv.omega);
            let sample = match bsdf.sample(engine, incident_local) {
                Some(s) => s,
                None => return radiance,
            };
            let direction_world = prv.surface.frame.to_world(sample.direction);

            let mut march_from = prv.surface;
            let mut itr = loop {
                ray = march_from.spawn_ray(direction_world);
                let hit = match scene.intersect(&ray) {
                    Some(h) => h,
                    None => return radiance,
                };
                let surface = scene.query_surface(&hit, -direction_world);

                let edge = Edge::new(
                    prv.surface.position,
                    prv.surface.geometric_normal,
                    surface.position,
                    surface.geometric_normal,
                );

                let cos_prv = direction_world.dot(prv.surface.geometric_normal).abs();
                let throughput = if sample.query.forward_density > 0.0 {
                    prv.throughput * sample.query.throughput * cos_prv / sample.query.forward_density
                } else {
                    DVec3::ZERO
                };

                let itr = PtVertex {
                    surface,
                    omega: -direction_world,
                    throughput,
                    specular: 0.0,
                    density: prv.density * edge.g_f * sample.query.forward_density,
                };

                if itr.surface.is_light() {
                    radiance += self.connect_light_hit(scene, &prv, &itr);
                    if !itr.throughput.length_squared().is_finite() || itr.throughput == DVec3::ZERO {
                        return radiance;
                    }
                    // Keep walking through the light quad exactly as the
                    // opaque-surface search above does, advancing the march
                    // origin past the quad just hit while `prv` itself stays
                    // fixed so the next hit's MIS bookkeeping is still
                    // relative to the real previous vertex.
                    march_from = itr.surface;
                    continue;
                }
                break itr;
            };
            prv.specular = sample.query.specular;

            if !is_finite3(itr.throughput) {
                return radiance;
            }
            std::mem::swap(&mut prv, &mut itr);

            let roulette = if path_size < self.config.min_subpath {
                1.0
            } else {
                self.config.roulette
            };
            if roulette < engine.uniform1() {
                return radiance;
            }
            prv.throughput /= roulette;
            path_size += 1;
        }
    }

    /// `_connect_light`: an eye vertex's BSDF sample happened to land on a
    /// light; score it against what explicit next-event estimation would
    /// have produced at the same point.
    fn connect_light_hit(&self, scene: &Scene, eye: &PtVertex, light: &PtVertex) -> DVec3 {
        let light_id = match light.surface.light_id() {
            Some(id) => id,
            None => return DVec3::ZERO,
        };
        let (radiance, area_density, _dir_density) = scene.lights.query_lsdf(light_id, light.omega);
        if radiance == DVec3::ZERO || light.density <= 0.0 {
            return DVec3::ZERO;
        }
        let weight_inv = if eye.specular == 1.0 {
            1.0
        } else {
            eye.density * area_density / light.density + 1.0
        };
        radiance * light.throughput / weight_inv
    }

    /// `_connect`: explicit next-event estimation from `eye` to a sampled
    /// point on a light.
    fn connect_to_light(&self, scene: &Scene, engine: &mut RandomEngine, eye: &PtVertex) -> DVec3 {
        let light = scene.lights.sample_direct(engine, eye.surface.position);
        let omega = light.direction; // points from the light toward `eye`.
        if omega.dot(light.normal) < 0.0 {
            return DVec3::ZERO;
        }

        let incident_local = eye.surface.frame.to_local(eye.omega);
        let outgoing_local = eye.surface.frame.to_local(-omega);
        let eye_bsdf = match scene.query_bsdf(&eye.surface) {
            Ok(b) => b,
            Err(_) => return DVec3::ZERO,
        };
        let query = eye_bsdf.query(incident_local, outgoing_local);
        if query.throughput == DVec3::ZERO {
            return DVec3::ZERO;
        }

        let edge = Edge::new(light.position, light.normal, eye.surface.position, eye.surface.geometric_normal);
        let weight_inv = query.forward_density * edge.g_b / light.area_density + 1.0;

        if scene.occluded(&eye.surface, light.position) {
            return DVec3::ZERO;
        }

        light.radiance / light.area_density * eye.throughput * query.throughput * edge.cos_b * edge.g_f / weight_inv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::light::{AreaLight, LightSet};
    use crate::core::sceneio::{Material, SelectedCamera};
    use crate::accelerators::bvh::{Triangle, TriangleBvh};
    use crate::core::geometry::Frame;
    use std::sync::Arc;

    fn floor_plus_light_scene() -> Scene {
        let material = Material {
            diffuse: DVec3::splat(0.8),
            specular: DVec3::ZERO,
            emissive: DVec3::ZERO,
            shininess: 0.0,
            transparent: false,
            mirror: false,
            twosided: false,
            ior: 1.5,
        };
        let triangles = vec![
            Triangle {
                p0: DVec3::new(-5.0, 0.0, -5.0),
                p1: DVec3::new(5.0, 0.0, -5.0),
                p2: DVec3::new(5.0, 0.0, 5.0),
                n0: DVec3::Y,
                n1: DVec3::Y,
                n2: DVec3::Y,
                tangent: DVec3::X,
                material_tag: 1,
            },
            Triangle {
                p0: DVec3::new(-5.0, 0.0, -5.0),
                p1: DVec3::new(5.0, 0.0, 5.0),
                p2: DVec3::new(-5.0, 0.0, 5.0),
                n0: DVec3::Y,
                n1: DVec3::Y,
                n2: DVec3::Y,
                tangent: DVec3::X,
                material_tag: 1,
            },
        ];
        let intersector: Arc<dyn crate::accelerators::Intersector> = Arc::new(TriangleBvh::build(triangles));
        let light = AreaLight {
            position: DVec3::new(0.0, 3.0, 0.0),
            frame: Frame::from_normal(DVec3::new(0.0, -1.0, 0.0)),
            half_width: 1.0,
            half_depth: 1.0,
            exitance: DVec3::splat(10.0),
        };
        let lights = LightSet::new(vec![light]);
        Scene::new(vec![material], lights, intersector)
    }

    #[test]
    fn estimate_returns_finite_nonnegative_radiance() {
        let scene = floor_plus_light_scene();
        let camera = Camera::new(
            &SelectedCamera {
                position: DVec3::new(0.0, 1.0, 3.0),
                direction: DVec3::new(0.0, -0.1, -1.0),
                up: DVec3::Y,
                horizontal_fov: 60.0,
            },
            (32, 32),
        );
        let estimator = PathTracingEstimator::new(EstimatorConfig::default());
        let mut engine = RandomEngine::new(1);
        for _ in 0..16 {
            let ray = camera.generate_ray(16, 20, (0.5, 0.5));
            let sample = estimator.estimate(&scene, &camera, &mut engine, ray);
            assert!(is_finite3(sample.eye));
            assert!(sample.eye.x >= 0.0 && sample.eye.y >= 0.0 && sample.eye.z >= 0.0);
            assert!(sample.splats.is_empty());
        }
    }
}
