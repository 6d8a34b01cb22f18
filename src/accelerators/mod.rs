//! Ray-scene intersection.
//!
//! The design treats mesh I/O and ray-scene intersection as an external
//! collaborator behind a narrow interface (`Intersector`); `scene::Scene`
//! only ever calls through the trait. `bvh` is the one concrete
//! implementation shipped here, a median-split BVH over triangle soup,
//! adapted from the bounding-volume-hierarchy build in
//! `examples/hackmad-pbr-rust`'s accelerator module — recursive
//! `Arc`-linked nodes split on the longest axis of the centroid bounds,
//! simplified to a single split strategy since the richer SAH/HLBVH
//! machinery earns its keep mainly on production-scale meshes, outside
//! this component's scope.

pub mod bvh;

use glam::DVec3;

use crate::core::geometry::bounds::BoundingSphere;
use crate::core::geometry::interaction::Hit;
use crate::core::geometry::Ray;

pub trait Intersector: Send + Sync {
    fn intersect(&self, ray: &Ray) -> Option<Hit>;
    fn bounding_sphere(&self) -> BoundingSphere;
}

#[derive(Debug, Clone, Copy)]
pub struct Bounds3 {
    pub min: DVec3,
    pub max: DVec3,
}

impl Bounds3 {
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn union_point(&self, p: DVec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn centroid(&self) -> DVec3 {
        0.5 * (self.min + self.max)
    }

    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    pub fn axis(&self, i: usize) -> (f64, f64) {
        match i {
            0 => (self.min.x, self.max.x),
            1 => (self.min.y, self.max.y),
            _ => (self.min.z, self.max.z),
        }
    }

    /// Slab test; returns the entry `t` if the ray hits the box before
    /// `t_max`.
    pub fn hit(&self, ray: &Ray) -> bool {
        let mut t_min = 0.0_f64;
        let mut t_max = ray.t_max;
        for axis in 0..3 {
            let (lo, hi) = self.axis(axis);
            let origin = match axis {
                0 => ray.origin.x,
                1 => ray.origin.y,
                _ => ray.origin.z,
            };
            let dir = match axis {
                0 => ray.direction.x,
                1 => ray.direction.y,
                _ => ray.direction.z,
            };
            if dir.abs() < 1e-12 {
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}
