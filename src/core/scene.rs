//! Scene facade: intersection/visibility queries, BSDF/LSDF lookup by
//! surface, light sampling front-end, ray counters.
//!
//! Grounded in `original_source/Scene.{hpp,cpp}`: `querySurface`
//! interpolates per-vertex tangents/bitangents, orthonormalises, and
//! disambiguates the shading-normal hemisphere against the outgoing ray
//! direction; `occluded`/`intersect` offset the probe ray along the
//! geometric normal by a small epsilon to avoid self-intersection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::DVec3;

use crate::core::error::{Error, Result};
use crate::core::geometry::bounds::BoundingSphere;
use crate::core::geometry::interaction::{Hit, SurfacePoint};
use crate::core::geometry::{Frame, Ray};
use crate::core::light::LightSet;
use crate::core::reflection::{Bsdf, CameraBsdf, DiffuseBsdf, LightBsdf, PerfectReflection, PerfectTransmission, PhongBsdf};
use crate::core::rng::RandomEngine;
use crate::core::sceneio::Material;
use crate::accelerators::Intersector;

/// Ray counters, kept as atomics so every worker thread can bump them
/// without synchronising with anyone else; the statistics component reads
/// them between samples.
#[derive(Default)]
pub struct RayCounters {
    pub basic: AtomicU64,
    pub shadow: AtomicU64,
}

impl RayCounters {
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.basic.load(Ordering::Relaxed),
            self.shadow.load(Ordering::Relaxed),
        )
    }
}

pub struct Scene {
    pub materials: Vec<Material>,
    pub lights: LightSet,
    pub intersector: Arc<dyn Intersector>,
    pub bounding_sphere: BoundingSphere,
    pub counters: RayCounters,
}

impl Scene {
    pub fn new(
        materials: Vec<Material>,
        lights: LightSet,
        intersector: Arc<dyn Intersector>,
    ) -> Self {
        let bounding_sphere = intersector.bounding_sphere();
        Self {
            materials,
            lights,
            intersector,
            bounding_sphere,
            counters: RayCounters::default(),
        }
    }

    pub fn intersect(&self, ray: &Ray) -> Option<Hit> {
        self.counters.basic.fetch_add(1, Ordering::Relaxed);
        self.intersector.intersect(ray)
    }

    /// Visibility test between two surface points: true if nothing blocks
    /// the straight segment between them, excluding each endpoint's own
    /// light surface (a light does not shadow the sample point it just
    /// emitted from).
    pub fn occluded(&self, from: &SurfacePoint, to: DVec3) -> bool {
        self.counters.shadow.fetch_add(1, Ordering::Relaxed);
        let ray = from.spawn_ray_to(to);
        match self.intersector.intersect(&ray) {
            None => false,
            Some(hit) => hit.t < ray.t_max,
        }
    }

    /// Builds an oriented `SurfacePoint` from a raw `Hit`, orthonormalising
    /// the tangent frame and flipping the shading normal to face the
    /// incoming ray direction (`wo`, pointing back toward the ray origin).
    pub fn query_surface(&self, hit: &Hit, wo: DVec3) -> SurfacePoint {
        let mut shading_normal = hit.shading_normal.normalize();
        let geometric_normal = hit.geometric_normal.normalize();

        if shading_normal.dot(wo) < 0.0 && geometric_normal.dot(wo) >= 0.0 {
            // Interpolated shading normal disagrees with which side the ray
            // arrived from; trust the geometric side.
            shading_normal = -shading_normal;
        }

        let tangent = hit.tangent - shading_normal * hit.tangent.dot(shading_normal);
        let tangent = if tangent.length_squared() > 1e-12 {
            tangent.normalize()
        } else {
            Frame::from_normal(shading_normal).tangent
        };
        let bitangent = shading_normal.cross(tangent);

        let frame = Frame {
            tangent,
            normal: shading_normal,
            bitangent,
        };

        SurfacePoint::new(hit.position, geometric_normal, frame, hit.material_tag)
    }

    pub fn query_bsdf(&self, surface: &SurfacePoint) -> Result<Bsdf> {
        if surface.is_camera() {
            return Ok(Bsdf::Camera(CameraBsdf));
        }
        if let Some(light_id) = surface.light_id() {
            if light_id >= self.lights.len() {
                return Err(Error::Programming(format!(
                    "light id {light_id} out of range ({} lights)",
                    self.lights.len()
                )));
            }
            return Ok(Bsdf::Light(LightBsdf { light_id }));
        }
        let id = surface.material_id().ok_or_else(|| {
            Error::Programming("surface point has neither light nor material tag".into())
        })?;
        let material = self
            .materials
            .get(id)
            .ok_or_else(|| Error::Programming(format!("material id {id} out of range")))?;

        Ok(if material.mirror {
            Bsdf::Reflection(PerfectReflection)
        } else if material.transparent {
            Bsdf::Transmission(PerfectTransmission { eta: material.ior })
        } else if crate::core::pbrt::l1_norm(material.specular) > 1e-6 {
            Bsdf::Phong(PhongBsdf {
                diffuse: material.diffuse,
                specular: material.specular,
                exponent: material.shininess,
            })
        } else {
            Bsdf::Diffuse(DiffuseBsdf {
                albedo: material.diffuse,
            })
        })
    }

    pub fn sample_bsdf(
        &self,
        engine: &mut RandomEngine,
        surface: &SurfacePoint,
        wo_local: DVec3,
    ) -> Result<Option<crate::core::reflection::BsdfSample>> {
        Ok(self.query_bsdf(surface)?.sample(engine, wo_local))
    }
}
