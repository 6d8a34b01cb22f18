//! Bidirectional path tracing: one light subpath, one eye subpath, every
//! vertex pair connected, weighted by the power heuristic.
//!
//! Grounded directly in `original_source/BPT.cpp`'s `BPTBase<Beta>`:
//! `_traceLight` builds the light subpath and its `a/A` partial sums,
//! `_traceEye` builds the eye subpath and its `c/C` partial sums while
//! connecting every eye vertex to every light vertex via `_connect`, and
//! `_connect_light` scores an eye path that lands on a light by chance.
//! `_connect1`/`_connect0` in the source are alternate, unused single-light
//! NEE strategies superseded by folding `light_path[0]` (the point directly
//! on the light) into the uniform `_connect` loop — this module does the
//! same, so there is exactly one connection function, not three.
//!
//! The one addition the grounding source itself never makes is the
//! light-subpath-to-lens connection (`s ≥ 1, t == 1`); see `camera.rs` and
//! `DESIGN.md` for why SPEC_FULL.md carries it anyway and how it reuses
//! this module's own `connect` machinery.

use glam::DVec3;

use crate::core::camera::Camera;
use crate::core::estimators::{Estimator, EstimatorConfig, PixelSample};
use crate::core::pbrt::is_finite3;
use crate::core::rng::RandomEngine;
use crate::core::scene::Scene;
use crate::core::vertex::{Edge, EyeVertex, LightVertex, MisPartials};

pub struct BidirectionalEstimator {
    config: EstimatorConfig,
}

impl BidirectionalEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }
}

impl Estimator for BidirectionalEstimator {
    fn estimate(&self, scene: &Scene, camera: &Camera, engine: &mut RandomEngine, ray: crate::core::geometry::Ray) -> PixelSample {
        let light_path = trace_light(scene, engine, self.config);
        let mut splats = Vec::new();
        for vertex in &light_path {
            if let Some((pixel, contribution)) = connect_to_lens(scene, camera, self.config.beta, vertex) {
                splats.push((pixel, contribution));
            }
        }
        let eye = trace_eye(scene, engine, self.config, ray, &light_path);
        PixelSample { eye, splats }
    }

    fn name(&self) -> &'static str {
        "bidirectional"
    }
}

fn trace_light(scene: &Scene, engine: &mut RandomEngine, config: EstimatorConfig) -> Vec<LightVertex> {
    let beta = config.beta;
    let mut path = Vec::new();

    let light = scene.lights.emit(engine, scene.bounding_sphere);
    let area_root = MisPartials::area_root(beta, light.area_density);
    let vertex0 = LightVertex {
        surface: crate::core::geometry::interaction::SurfacePoint::new(
            light.position,
            light.normal,
            crate::core::geometry::Frame::from_normal(light.normal),
            -(light.light_id as i32) - 1,
        ),
        omega: DVec3::ZERO,
        throughput: light.radiance / light.area_density,
        specular: 0.0,
        mis: area_root,
    };

    let ray = vertex0.surface.spawn_ray(light.direction);
    let hit = match scene.intersect(&ray) {
        Some(h) => h,
        None => {
            path.push(vertex0);
            return path;
        }
    };
    let surface1 = scene.query_surface(&hit, -light.direction);
    let edge0 = Edge::new(vertex0.surface.position, vertex0.surface.geometric_normal, surface1.position, surface1.geometric_normal);
    let vertex1_mis = MisPartials::extend(
        &vertex0.mis,
        beta,
        0.0,
        edge0.g_b,
        vertex0.specular,
        0.0,
        light.direction_density,
        edge0.g_f,
    );
    let vertex1 = LightVertex {
        surface: surface1,
        omega: -light.direction,
        throughput: light.radiance * edge0.cos_b / (light.area_density * light.direction_density),
        specular: 0.0,
        mis: vertex1_mis,
    };

    path.push(vertex0);
    path.push(vertex1);

    let mut path_size = 2usize;
    loop {
        let roulette = if path_size < config.min_subpath { 1.0 } else { config.roulette };
        if engine.uniform1() >= roulette {
            break;
        }

        let prv = *path.last().unwrap();
        let bsdf = match scene.query_bsdf(&prv.surface) {
            Ok(b) => b,
            Err(_) => break,
        };
        let incident_local = prv.surface.frame.to_local(prv.omega);
        let sample = match bsdf.sample(engine, incident_local) {
            Some(s) => s,
            None => break,
        };
        let direction_world = prv.surface.frame.to_world(sample.direction);
        let ray = prv.surface.spawn_ray(direction_world);
        let hit = match scene.intersect(&ray) {
            Some(h) => h,
            None => break,
        };
        let surface = scene.query_surface(&hit, -direction_world);
        let edge = Edge::new(prv.surface.position, prv.surface.geometric_normal, surface.position, surface.geometric_normal);

        let cos_prv = direction_world.dot(prv.surface.geometric_normal).abs();
        let throughput = if sample.query.forward_density > 0.0 {
            prv.throughput * sample.query.throughput * cos_prv / (sample.query.forward_density * roulette)
        } else {
            DVec3::ZERO
        };

        let itr_mis = MisPartials::extend(
            &prv.mis,
            beta,
            sample.query.reverse_density,
            edge.g_b,
            prv.specular.max(sample.query.specular),
            0.0,
            sample.query.forward_density,
            edge.g_f,
        );

        let specular = sample.query.specular;
        let itr = LightVertex {
            surface,
            omega: -direction_world,
            throughput,
            specular,
            mis: itr_mis,
        };

        if !is_finite3(itr.throughput) {
            break;
        }

        if specular == 1.0 {
            // A specular bounce overwrites the running vertex instead of
            // appending a new one — it carries no competing NEE strategy,
            // matching `BPT.cpp`'s `if (bsdf.specular()==1.0f) { path[prv]
            // = path[itr]; path.pop_back(); }`.
            *path.last_mut().unwrap() = itr;
        } else {
            path.push(itr);
        }
        path_size += 1;
    }

    path
}

fn trace_eye(scene: &Scene, engine: &mut RandomEngine, config: EstimatorConfig, ray: crate::core::geometry::Ray, light_path: &[LightVertex]) -> DVec3 {
    let beta = config.beta;
    let mut radiance = DVec3::ZERO;
    let mut ray = ray;

    let mut hit = match scene.intersect(&ray) {
        Some(h) => h,
        None => return radiance,
    };
    let mut surface = scene.query_surface(&hit, -ray.direction);
    while surface.is_light() {
        if let Some(light_id) = surface.light_id() {
            let (radiance_here, _area, _dir) = scene.lights.query_lsdf(light_id, -ray.direction);
            radiance += radiance_here;
        }
        ray = surface.spawn_ray(ray.direction);
        hit = match scene.intersect(&ray) {
            Some(h) => h,
            None => return radiance,
        };
        surface = scene.query_surface(&hit, -ray.direction);
    }

    let mut prv = EyeVertex {
        surface,
        omega: -ray.direction,
        throughput: DVec3::ONE,
        specular: 1.0,
        mis: MisPartials::default(),
    };

    let mut path_size = 2usize;
    loop {
        radiance += connect_eye_to_light_path(scene, beta, &prv, light_path);

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

        let mut itr;
        let mut march_from = prv.surface;
        loop {
            ray = march_from.spawn_ray(direction_world);
            hit = match scene.intersect(&ray) {
                Some(h) => h,
                None => return radiance,
            };
            let surface = scene.query_surface(&hit, -direction_world);
            let edge = Edge::new(prv.surface.position, prv.surface.geometric_normal, surface.position, surface.geometric_normal);

            let cos_prv = direction_world.dot(prv.surface.geometric_normal).abs();
            let throughput = if sample.query.forward_density > 0.0 {
                prv.throughput * sample.query.throughput * cos_prv / sample.query.forward_density
            } else {
                DVec3::ZERO
            };
            let itr_mis = MisPartials::extend(
                &prv.mis,
                beta,
                sample.query.reverse_density,
                edge.g_b,
                prv.specular,
                0.0,
                sample.query.forward_density,
                edge.g_f,
            );

            itr = EyeVertex {
                surface,
                omega: -direction_world,
                throughput,
                specular: sample.query.specular,
                mis: itr_mis,
            };

            if itr.surface.is_light() {
                radiance += connect_light_hit(scene, beta, &itr);
                if !is_finite3(itr.throughput) {
                    return radiance;
                }
                // Keep marching through the light quad on the same
                // direction, exactly as the opaque-surface search above.
                march_from = itr.surface;
                continue;
            }
            break;
        }

        if !is_finite3(itr.throughput) {
            return radiance;
        }
        prv = itr;

        let roulette = if path_size < config.min_subpath { 1.0 } else { config.roulette };
        if engine.uniform1() >= roulette {
            return radiance;
        }
        prv.throughput /= roulette;
        path_size += 1;
    }
}

/// `_connect_light`: the eye path's own BSDF sample happened to land on a
/// light.
fn connect_light_hit(scene: &Scene, beta: crate::core::beta::Beta, eye: &EyeVertex) -> DVec3 {
    let light_id = match eye.surface.light_id() {
        Some(id) => id,
        None => return DVec3::ZERO,
    };
    let (radiance, area_density, direction_density) = scene.lights.query_lsdf(light_id, eye.omega);
    if radiance == DVec3::ZERO {
        return DVec3::ZERO;
    }
    let cp = eye.mis.connect(beta, direction_density, eye.specular, area_density);
    radiance * eye.throughput / (cp + 1.0)
}

/// `_connect(eye, light, num)` summed over every vertex in the light path,
/// which is what `_connect(engine, eye, path)` reduces to once `_connect0`
/// is dropped.
fn connect_eye_to_light_path(scene: &Scene, beta: crate::core::beta::Beta, eye: &EyeVertex, light_path: &[LightVertex]) -> DVec3 {
    let mut radiance = DVec3::ZERO;
    for light in light_path {
        radiance += connect(scene, beta, eye, light);
    }
    radiance
}

fn connect(scene: &Scene, beta: crate::core::beta::Beta, eye: &EyeVertex, light: &LightVertex) -> DVec3 {
    let omega = (eye.surface.position - light.surface.position).normalize();

    let light_bsdf = match scene.query_bsdf(&light.surface) {
        Ok(b) => b,
        Err(_) => return DVec3::ZERO,
    };
    let eye_bsdf = match scene.query_bsdf(&eye.surface) {
        Ok(b) => b,
        Err(_) => return DVec3::ZERO,
    };

    let light_incident_local = light.surface.frame.to_local(light.omega);
    let light_outgoing_local = light.surface.frame.to_local(omega);
    let light_query = light_bsdf.query(light_incident_local, light_outgoing_local);

    let eye_incident_local = eye.surface.frame.to_local(eye.omega);
    let eye_outgoing_local = eye.surface.frame.to_local(-omega);
    let eye_query = eye_bsdf.query(eye_incident_local, eye_outgoing_local);

    if eye_query.specular == 1.0 {
        return DVec3::ZERO;
    }

    let edge = Edge::new(light.surface.position, light.surface.geometric_normal, eye.surface.position, eye.surface.geometric_normal);

    let ap = light.mis.connect(beta, light_query.reverse_density, light.specular, edge.g_b * eye_query.reverse_density);
    let cp = eye.mis.connect(beta, eye_query.forward_density, eye.specular, edge.g_f * light_query.forward_density);
    let weight_inv = ap + cp + 1.0;

    if scene.occluded(&eye.surface, light.surface.position) {
        return DVec3::ZERO;
    }

    light.throughput * light_query.throughput * eye.throughput * eye_query.throughput * edge.cos_b * edge.g_f / weight_inv
}

/// The `s ≥ 1, t == 1` strategy: connects a light-subpath vertex directly to
/// the lens and reports which pixel it lands on. See `camera::Camera::
/// sample_importance` and `DESIGN.md`.
pub(super) fn connect_to_lens(scene: &Scene, camera: &Camera, beta: crate::core::beta::Beta, light: &LightVertex) -> Option<((u32, u32), DVec3)> {
    let sample = camera.sample_importance(light.surface.position)?;

    let light_bsdf = scene.query_bsdf(&light.surface).ok()?;
    let light_incident_local = light.surface.frame.to_local(light.omega);
    let light_outgoing_local = light.surface.frame.to_local(sample.direction);
    let query = light_bsdf.query(light_incident_local, light_outgoing_local);
    if query.throughput == DVec3::ZERO {
        return None;
    }

    let cos_light = sample.direction.dot(light.surface.geometric_normal).abs();
    let g = cos_light; // the lens has no area/cosine of its own for a pinhole.

    // The lens is the fixed, non-competing endpoint `trace_eye` seeds its
    // own vertex zero with (`specular = 1.0`, zero partial sums), so the
    // only nonzero side of the connection weight is the light subpath's own.
    let ap = light.mis.connect(beta, query.reverse_density, light.specular, g * sample.direction_density);
    let weight_inv = ap + 1.0;

    if scene.occluded(&light.surface, camera.position) {
        return None;
    }

    let contribution = light.throughput * query.throughput * sample.importance * cos_light / weight_inv;
    if !is_finite3(contribution) {
        return None;
    }
    Some((sample.pixel, contribution))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Frame;
    use crate::core::light::{AreaLight, LightSet};
    use crate::core::sceneio::{Material, SelectedCamera};
    use crate::accelerators::bvh::{Triangle, TriangleBvh};
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
    fn estimate_returns_finite_nonnegative_radiance_and_splats() {
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
        let estimator = BidirectionalEstimator::new(EstimatorConfig::default());
        let mut engine = RandomEngine::new(2);
        for _ in 0..8 {
            let ray = camera.generate_ray(16, 20, (0.5, 0.5));
            let sample = estimator.estimate(&scene, &camera, &mut engine, ray);
            assert!(is_finite3(sample.eye));
            assert!(sample.eye.x >= 0.0 && sample.eye.y >= 0.0 && sample.eye.z >= 0.0);
            for (_, splat) in &sample.splats {
                assert!(is_finite3(*splat));
            }
        }
    }
}
