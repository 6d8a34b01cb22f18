//! Vertex connection and merging: one light subpath and one eye subpath
//! connected exactly as in `bpt`, plus a third strategy — merging the eye
//! path against a globally scattered photon map within a fixed radius.
//!
//! Grounded directly in `original_source/VCM.cpp`'s `VCMBase<Beta>`.
//! Reading `_traceLight(engine, size, LightVertex*)` shows the light
//! subpath's own vertex zero (the point on the light) is never stored as a
//! separate array entry the way `BPT.cpp` stores it — its area-measure root
//! is folded directly into vertex one's `a`/`A` (`path[itr].A =
//! Beta::beta(edge.bGeometry) * a / Beta::beta(light.areaDensity())`), which
//! is exactly `vertex::MisPartials::area_root` followed by `extend`. Unlike
//! `bpt`, `_connect0`/`_connect1` here are NOT dead code: `_connect(engine,
//! eye, size, path)` calls both, plus the generic per-vertex `_connect`, for
//! every eye vertex — so this module keeps all three, named after their
//! source counterparts. `_merge`/`_gather`/`_scatter` add the photon-merge
//! strategy, indexed with `spatial_index::HashGrid` exactly as
//! `original_source/HashGrid3D.hpp` is used by `_scatter`.
//!
//! `EstimatorConfig::merging_enabled`/`connections_enabled` make this one
//! estimator serve both `--VCM` and `--UPG`, matching `VCMBase`'s own
//! constructor flags: VCM runs with both `true`. UPG keeps
//! `merging_enabled` (the photon pass, `gather`, and every `β(_eta·G·D)`
//! term stay live) and sets `connections_enabled = false`, which drops
//! `_connect1`/`_connect` (`connect_next_event`/`connect_eye_to_light_path`)
//! and their light-subpath-to-lens splats — UPG's eye path still scores a
//! direct hit on a light (`_connect0`) the way every forward path tracer
//! does, but never explicitly connects to a light-subpath vertex.

use std::sync::RwLock;

use glam::DVec3;

use crate::core::beta::Beta;
use crate::core::camera::Camera;
use crate::core::estimators::bpt::connect_to_lens;
use crate::core::estimators::{Estimator, EstimatorConfig, PixelSample};
use crate::core::geometry::interaction::SurfacePoint;
use crate::core::geometry::{Frame, Ray};
use crate::core::pbrt::{is_finite3, Float, PI};
use crate::core::rng::RandomEngine;
use crate::core::scene::Scene;
use crate::core::spatial_index::{HashGrid, SpatialIndex};
use crate::core::vertex::{Edge, EyeVertex, LightPhoton, LightVertex, MisPartials};

/// Vertex connection and merging. Owns a global photon map rebuilt once per
/// frame by [`VcmEstimator::prepare_frame`] — `Estimator::estimate` only
/// ever reads it, matching how `original_source/VCM.cpp`'s `preprocess`
/// runs `_scatter` once before any `_traceEye` call.
pub struct VcmEstimator {
    config: EstimatorConfig,
    /// `_eta = numPhotons * pi * maxRadius^2`, the merge normalisation
    /// constant shared by every MIS weight that touches the merge strategy.
    eta: Float,
    photon_map: RwLock<HashGrid<LightPhoton>>,
}

impl VcmEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let eta = if config.merging_enabled {
            config.photons_per_frame as Float * PI * config.initial_radius * config.initial_radius
        } else {
            0.0
        };
        Self {
            config,
            eta,
            photon_map: RwLock::new(HashGrid::build(Vec::new(), config.initial_radius.max(1e-9))),
        }
    }

    /// Traces `config.photons_per_frame` light subpaths and rebuilds the
    /// photon map from their vertices. Grounded in `VCM.cpp`'s `_scatter`.
    /// A no-op under UPG (`merging_enabled = false`): there is no merge
    /// strategy to feed, so the photon pass is skipped entirely rather than
    /// built and then never queried.
    pub fn prepare_frame(&self, scene: &Scene, engine: &mut RandomEngine) {
        if !self.config.merging_enabled {
            return;
        }
        let mut photons = Vec::with_capacity(self.config.photons_per_frame * 2);
        for _ in 0..self.config.photons_per_frame {
            photons.extend(trace_light_photons(scene, engine, self.config, self.eta));
        }
        let grid = HashGrid::build(photons, self.config.initial_radius.max(1e-9));
        *self.photon_map.write().unwrap() = grid;
    }
}

impl Estimator for VcmEstimator {
    fn estimate(&self, scene: &Scene, camera: &Camera, engine: &mut RandomEngine, ray: Ray) -> PixelSample {
        let light_path = if self.config.connections_enabled {
            trace_light_path(scene, engine, self.config, self.eta)
        } else {
            Vec::new()
        };
        let mut splats = Vec::new();
        for vertex in &light_path {
            if let Some((pixel, contribution)) = connect_to_lens(scene, camera, self.config.beta, vertex) {
                splats.push((pixel, contribution));
            }
        }
        let photon_map = self.photon_map.read().unwrap();
        let eye = trace_eye(scene, engine, self.config, self.eta, ray, &light_path, &photon_map);
        PixelSample { eye, splats }
    }

    fn name(&self) -> &'static str {
        "vertex-connection-and-merging"
    }
}

/// A light subpath for this sample's own connections, *not* the global
/// photon map. Identical bookkeeping to `bpt::trace_light` except `extend`
/// is given a nonzero `eta` so the merge partial sum (`B`) accumulates.
fn trace_light_path(scene: &Scene, engine: &mut RandomEngine, config: EstimatorConfig, eta: Float) -> Vec<LightVertex> {
    let beta = config.beta;
    let mut path = Vec::new();

    let light = scene.lights.emit(engine, scene.bounding_sphere);
    let light_surface = SurfacePoint::new(light.position, light.normal, Frame::from_normal(light.normal), -(light.light_id as i32) - 1);
    let ray = light_surface.spawn_ray(light.direction);
    let hit = match scene.intersect(&ray) {
        Some(h) => h,
        None => return path,
    };
    let surface1 = scene.query_surface(&hit, -light.direction);
    let edge0 = Edge::new(light_surface.position, light_surface.geometric_normal, surface1.position, surface1.geometric_normal);

    let area_root = MisPartials::area_root(beta, light.area_density);
    let vertex1_mis = MisPartials::extend(&area_root, beta, 0.0, edge0.g_b, 0.0, eta, light.direction_density, edge0.g_f);
    let mut prv = LightVertex {
        surface: surface1,
        omega: -light.direction,
        throughput: light.radiance * edge0.cos_b / (light.area_density * light.direction_density),
        specular: 0.0,
        mis: vertex1_mis,
    };
    path.push(prv);

    let mut path_size = 2usize;
    loop {
        let roulette = if path_size < config.min_subpath { 1.0 } else { config.roulette };
        if engine.uniform1() >= roulette {
            break;
        }

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
            eta,
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
        prv = itr;
        if specular != 1.0 {
            path.push(prv);
        }
        path_size += 1;
    }

    path
}

/// Same walk as `trace_light_path`, but every non-specular vertex is kept
/// as a [`LightPhoton`] carrying the forward density/cosine/geometric term
/// of the edge that created it — the quantities `_merge` needs from the
/// *light* side without re-deriving them from the eye vertex being merged
/// into. Grounded in `VCM.cpp`'s `_traceLight(engine, size, LightPhoton*)`.
fn trace_light_photons(scene: &Scene, engine: &mut RandomEngine, config: EstimatorConfig, eta: Float) -> Vec<LightPhoton> {
    let beta = config.beta;
    let mut photons = Vec::new();

    let light = scene.lights.emit(engine, scene.bounding_sphere);
    let light_surface = SurfacePoint::new(light.position, light.normal, Frame::from_normal(light.normal), -(light.light_id as i32) - 1);
    let ray = light_surface.spawn_ray(light.direction);
    let hit = match scene.intersect(&ray) {
        Some(h) => h,
        None => return photons,
    };
    let surface1 = scene.query_surface(&hit, -light.direction);
    let edge0 = Edge::new(light_surface.position, light_surface.geometric_normal, surface1.position, surface1.geometric_normal);

    let area_root = MisPartials::area_root(beta, light.area_density);
    let vertex1_mis = MisPartials::extend(&area_root, beta, 0.0, edge0.g_b, 0.0, eta, light.direction_density, edge0.g_f);
    let mut prv = LightVertex {
        surface: surface1,
        omega: -light.direction,
        throughput: light.radiance * edge0.cos_b / (light.area_density * light.direction_density),
        specular: 0.0,
        mis: vertex1_mis,
    };
    photons.push(LightPhoton {
        vertex: prv,
        forward_density: light.direction_density,
        forward_cos: edge0.cos_f,
        forward_g: edge0.g_f,
    });

    let mut path_size = 2usize;
    loop {
        let roulette = if path_size < config.min_subpath { 1.0 } else { config.roulette };
        if engine.uniform1() >= roulette {
            break;
        }

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
            eta,
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
        prv = itr;
        if specular != 1.0 {
            photons.push(LightPhoton {
                vertex: prv,
                forward_density: sample.query.forward_density,
                forward_cos: edge.cos_f,
                forward_g: edge.g_f,
            });
        }
        path_size += 1;
    }

    photons
}

fn trace_eye(
    scene: &Scene,
    engine: &mut RandomEngine,
    config: EstimatorConfig,
    eta: Float,
    ray: Ray,
    light_path: &[LightVertex],
    photon_map: &HashGrid<LightPhoton>,
) -> DVec3 {
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

    let merging = config.merging_enabled;
    let connections = config.connections_enabled;
    let mut path_size = 2usize;
    loop {
        if connections {
            radiance += connect_next_event(scene, engine, beta, eta, merging, &prv);
            radiance += connect_eye_to_light_path(scene, beta, eta, merging, &prv, light_path);
        }
        if merging {
            radiance += gather(scene, beta, eta, config, &prv, photon_map);
        }

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
                eta,
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

/// `_connect0`: the eye path's own BSDF sample happened to land on a light,
/// folded through `extend` (with the merge constant `eta`) exactly as the
/// main loop above does for ordinary bounces, then scored against the
/// light's own LSDF via `connect`.
fn connect_light_hit(scene: &Scene, beta: Beta, eye: &EyeVertex) -> DVec3 {
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

/// `_connect1`: explicit next-event estimation from `eye` to a point
/// sampled directly on a light. Transcribed straight from `VCM.cpp`'s
/// formula rather than routed through `vertex::MisPartials::connect`: the
/// freshly NEE-sampled point was never reached by the light subpath's own
/// recurrence, so its `Ap` multiplies the reverse density into the
/// area-root term directly (`β(bsdf.densityRev() · edge.bGeometry /
/// light.areaDensity())`), not through an already-extended partial sum.
fn connect_next_event(
    scene: &Scene,
    engine: &mut RandomEngine,
    beta: Beta,
    eta: Float,
    merging: bool,
    eye: &EyeVertex,
) -> DVec3 {
    let light = scene.lights.sample_direct(engine, eye.surface.position);
    let omega = light.direction;
    if omega.dot(light.normal) < 0.0 {
        return DVec3::ZERO;
    }

    let eye_bsdf = match scene.query_bsdf(&eye.surface) {
        Ok(b) => b,
        Err(_) => return DVec3::ZERO,
    };
    let incident_local = eye.surface.frame.to_local(eye.omega);
    let outgoing_local = eye.surface.frame.to_local(-omega);
    let query = eye_bsdf.query(incident_local, outgoing_local);
    if query.throughput == DVec3::ZERO || query.specular == 1.0 {
        return DVec3::ZERO;
    }

    let edge = Edge::new(light.position, light.normal, eye.surface.position, eye.surface.geometric_normal);

    let ap = beta.apply(query.reverse_density * edge.g_b / light.area_density);
    let cp = eye.mis.connect(beta, query.forward_density, eye.specular, edge.g_f * light.direction_density);
    let merge_norm = if merging { beta.apply(eta * edge.g_f * light.direction_density) } else { 0.0 };
    let weight_inv = ap + cp + merge_norm + 1.0;

    if scene.occluded(&eye.surface, light.position) {
        return DVec3::ZERO;
    }

    light.radiance / light.area_density * eye.throughput * query.throughput * edge.cos_b * edge.g_f / weight_inv
}

/// `_connect(eye, light)` applied to every vertex of this sample's own light
/// subpath, plus the merge-extension term `Bp` `VCM.cpp` adds on top of
/// `BPT.cpp`'s plain `Ap`/`Cp`, and the extra `Beta::beta(_eta·G·D)`
/// normalisation term both `_connect` and `_merge` share.
fn connect_eye_to_light_path(
    scene: &Scene,
    beta: Beta,
    eta: Float,
    merging: bool,
    eye: &EyeVertex,
    light_path: &[LightVertex],
) -> DVec3 {
    let mut radiance = DVec3::ZERO;
    for light in light_path {
        radiance += connect(scene, beta, eta, merging, eye, light);
    }
    radiance
}

fn connect(scene: &Scene, beta: Beta, eta: Float, merging: bool, eye: &EyeVertex, light: &LightVertex) -> DVec3 {
    let omega = (eye.surface.position - light.surface.position).normalize();

    let light_bsdf = match scene.query_bsdf(&light.surface) {
        Ok(b) => b,
        Err(_) => return DVec3::ZERO,
    };
    let eye_bsdf = match scene.query_bsdf(&eye.surface) {
        Ok(b) => b,
        Err(_) => return DVec3::ZERO,
    };

    let light_query = light_bsdf.query(light.surface.frame.to_local(light.omega), light.surface.frame.to_local(omega));
    let eye_query = eye_bsdf.query(eye.surface.frame.to_local(eye.omega), eye.surface.frame.to_local(-omega));

    if eye_query.specular == 1.0 {
        return DVec3::ZERO;
    }

    let edge = Edge::new(light.surface.position, light.surface.geometric_normal, eye.surface.position, eye.surface.geometric_normal);

    let ap = light.mis.connect(beta, light_query.reverse_density, light.specular, edge.g_b * eye_query.reverse_density);
    let cp = eye.mis.connect(beta, eye_query.forward_density, eye.specular, edge.g_f * light_query.forward_density);
    let (bp, merge_norm) = if merging {
        (
            light.mis.connect_merge_extension(beta, light_query.reverse_density, light_query.specular, edge.g_b * eye_query.reverse_density, eta),
            beta.apply(eta * edge.g_f * light_query.forward_density),
        )
    } else {
        (0.0, 0.0)
    };
    let weight_inv = ap + bp + cp + merge_norm + 1.0;

    if scene.occluded(&eye.surface, light.surface.position) {
        return DVec3::ZERO;
    }

    light.throughput * light_query.throughput * eye.throughput * eye_query.throughput * edge.cos_b * edge.g_f / weight_inv
}

/// `_gather`/`_merge`: accumulates the merge contribution of every photon
/// within `initial_radius` of `eye`'s position, normalised by the total
/// photon count, matching `VCM.cpp`'s `_gather`'s `/ float(_numPhotons)`.
fn gather(scene: &Scene, beta: Beta, eta: Float, config: EstimatorConfig, eye: &EyeVertex, photon_map: &HashGrid<LightPhoton>) -> DVec3 {
    let mut radiance = DVec3::ZERO;
    photon_map.query_radius(eye.surface.position, config.initial_radius, |photon| {
        radiance += merge(scene, beta, eta, eye, photon, config.initial_radius);
    });
    radiance / config.photons_per_frame.max(1) as Float
}

fn merge(scene: &Scene, beta: Beta, eta: Float, eye: &EyeVertex, photon: &LightPhoton, radius: Float) -> DVec3 {
    let light = photon.vertex;
    let eye_bsdf = match scene.query_bsdf(&eye.surface) {
        Ok(b) => b,
        Err(_) => return DVec3::ZERO,
    };
    let eye_query = eye_bsdf.query(eye.surface.frame.to_local(light.omega), eye.surface.frame.to_local(eye.omega));

    let g_times_density = photon.forward_g * photon.forward_density;
    let ap = light.mis.merge_propagate(beta, g_times_density * eye_query.reverse_density);
    let bp = light.mis.merge_propagate_merge(beta, g_times_density * eye_query.reverse_density);
    let cp = eye.mis.connect(beta, eye_query.forward_density, eye.specular, g_times_density);
    let merge_norm = beta.apply(eta * g_times_density);
    let weight_inv = (ap + bp + cp + merge_norm + 1.0) / merge_norm.max(1e-30);

    light.throughput * eye.throughput * eye_query.throughput / (weight_inv * PI * radius * radius)
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn estimate_returns_finite_nonnegative_radiance_after_preparing_photons() {
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
        let mut config = EstimatorConfig::default();
        config.photons_per_frame = 256;
        config.initial_radius = 0.5;
        let estimator = VcmEstimator::new(config);
        let mut engine = RandomEngine::new(7);
        estimator.prepare_frame(&scene, &mut engine);
        for _ in 0..4 {
            let ray = camera.generate_ray(16, 20, (0.5, 0.5));
            let sample = estimator.estimate(&scene, &camera, &mut engine, ray);
            assert!(is_finite3(sample.eye));
            assert!(sample.eye.x >= 0.0 && sample.eye.y >= 0.0 && sample.eye.z >= 0.0);
        }
    }

    #[test]
    fn upg_mode_keeps_photon_gathering_but_skips_connections() {
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
        let mut config = EstimatorConfig::default();
        config.photons_per_frame = 256;
        config.initial_radius = 0.5;
        config.connections_enabled = false;
        let estimator = VcmEstimator::new(config);
        assert_ne!(estimator.eta, 0.0);
        let mut engine = RandomEngine::new(7);
        estimator.prepare_frame(&scene, &mut engine);
        assert!(!estimator.photon_map.read().unwrap().is_empty());
        for _ in 0..4 {
            let ray = camera.generate_ray(16, 20, (0.5, 0.5));
            let sample = estimator.estimate(&scene, &camera, &mut engine, ray);
            assert!(sample.splats.is_empty());
            assert!(is_finite3(sample.eye));
            assert!(sample.eye.x >= 0.0 && sample.eye.y >= 0.0 && sample.eye.z >= 0.0);
        }
    }

    #[test]
    fn upg_mode_skips_photon_pass_and_gather_when_merging_also_disabled() {
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
        let mut config = EstimatorConfig::default();
        config.photons_per_frame = 256;
        config.initial_radius = 0.5;
        config.merging_enabled = false;
        let estimator = VcmEstimator::new(config);
        assert_eq!(estimator.eta, 0.0);
        let mut engine = RandomEngine::new(7);
        estimator.prepare_frame(&scene, &mut engine);
        assert!(estimator.photon_map.read().unwrap().is_empty());
        for _ in 0..4 {
            let ray = camera.generate_ray(16, 20, (0.5, 0.5));
            let sample = estimator.estimate(&scene, &camera, &mut engine, ray);
            assert!(is_finite3(sample.eye));
            assert!(sample.eye.x >= 0.0 && sample.eye.y >= 0.0 && sample.eye.z >= 0.0);
        }
    }
}
