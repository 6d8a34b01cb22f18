//! Raw intersection record and the oriented surface point built from it.
//!
//! `Hit` is what the external ray-scene intersector hands back (§6 "Scene
//! input" treats intersection as delegated to a ray-tracing kernel); it
//! carries just enough to let the scene facade build a [`SurfacePoint`]
//! without knowing the intersector's internals. `spawn_ray`/`spawn_ray_to`
//! keep the normal-directed epsilon offset from `original_source/Scene.cpp`'s
//! `occluded`/`intersect`, which nudge the new ray origin along the
//! geometric normal rather than along the ray direction, so a ray leaving a
//! grazing surface does not re-enter it.

use glam::DVec3;

use crate::core::geometry::{Frame, Ray};
use crate::core::pbrt::{Float, SELF_INTERSECT_EPSILON, SHADOW_EPSILON};

/// What the intersector returns for a ray/scene query: enough to locate the
/// hit and recover its material, not yet an oriented surface point.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: Float,
    pub position: DVec3,
    pub geometric_normal: DVec3,
    pub shading_normal: DVec3,
    pub tangent: DVec3,
    /// See `SurfacePoint::material_tag`: encodes camera/light/material.
    pub material_tag: i32,
}

/// A point on a surface (or light, or the camera lens) with an oriented
/// tangent frame, as produced by `Scene::query_surface`.
///
/// `material_tag` follows the convention in the data model: `0` is the
/// camera, negative values `-id-1` are area lights, positive values are
/// material-table indices.
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoint {
    pub position: DVec3,
    pub geometric_normal: DVec3,
    pub frame: Frame,
    pub material_tag: i32,
}

impl SurfacePoint {
    pub fn new(position: DVec3, geometric_normal: DVec3, frame: Frame, material_tag: i32) -> Self {
        Self {
            position,
            geometric_normal,
            frame,
            material_tag,
        }
    }

    pub fn is_light(&self) -> bool {
        self.material_tag < 0
    }

    pub fn is_camera(&self) -> bool {
        self.material_tag == 0
    }

    pub fn light_id(&self) -> Option<usize> {
        if self.material_tag < 0 {
            Some((-self.material_tag - 1) as usize)
        } else {
            None
        }
    }

    pub fn material_id(&self) -> Option<usize> {
        if self.material_tag > 0 {
            Some((self.material_tag - 1) as usize)
        } else {
            None
        }
    }

    /// New ray leaving this point in direction `d`, offset along the
    /// geometric normal on the side `d` points toward.
    pub fn spawn_ray(&self, d: DVec3) -> Ray {
        let offset = self.epsilon_offset(d);
        Ray::new(self.position + offset, d)
    }

    /// Shadow ray toward another surface point; stops just short of the
    /// target to avoid self-intersection at both ends.
    pub fn spawn_ray_to(&self, target: DVec3) -> Ray {
        let dir = target - self.position;
        let offset = self.epsilon_offset(dir);
        let origin = self.position + offset;
        let d = target - origin;
        Ray::new(origin, d).with_t_max(1.0 - SHADOW_EPSILON)
    }

    fn epsilon_offset(&self, d: DVec3) -> DVec3 {
        let sign = if d.dot(self.geometric_normal) > 0.0 {
            1.0
        } else {
            -1.0
        };
        self.geometric_normal * (sign * SELF_INTERSECT_EPSILON)
    }
}
