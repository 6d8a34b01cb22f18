//! Median-split bounding volume hierarchy over a triangle soup.

use glam::DVec3;
use std::sync::Arc;

use crate::accelerators::{Bounds3, Intersector};
use crate::core::geometry::bounds::BoundingSphere;
use crate::core::geometry::interaction::Hit;
use crate::core::geometry::Ray;

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub p0: DVec3,
    pub p1: DVec3,
    pub p2: DVec3,
    pub n0: DVec3,
    pub n1: DVec3,
    pub n2: DVec3,
    pub tangent: DVec3,
    /// See `SurfacePoint::material_tag`.
    pub material_tag: i32,
}

impl Triangle {
    fn bounds(&self) -> Bounds3 {
        Bounds3::empty()
            .union_point(self.p0)
            .union_point(self.p1)
            .union_point(self.p2)
    }

    /// Moller-Trumbore ray/triangle intersection.
    fn intersect(&self, ray: &Ray) -> Option<(f64, f64, f64)> {
        let e1 = self.p1 - self.p0;
        let e2 = self.p2 - self.p0;
        let pvec = ray.direction.cross(e2);
        let det = e1.dot(pvec);
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = ray.origin - self.p0;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(e1);
        let v = ray.direction.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(qvec) * inv_det;
        if t <= 1e-9 || t >= ray.t_max {
            return None;
        }
        Some((t, u, v))
    }

    fn shading_normal(&self, u: f64, v: f64) -> DVec3 {
        ((1.0 - u - v) * self.n0 + u * self.n1 + v * self.n2).normalize()
    }

    fn geometric_normal(&self) -> DVec3 {
        (self.p1 - self.p0).cross(self.p2 - self.p0).normalize()
    }
}

enum Node {
    Leaf {
        bounds: Bounds3,
        triangles: Vec<usize>,
    },
    Interior {
        bounds: Bounds3,
        left: Arc<Node>,
        right: Arc<Node>,
    },
}

impl Node {
    fn bounds(&self) -> Bounds3 {
        match self {
            Node::Leaf { bounds, .. } => *bounds,
            Node::Interior { bounds, .. } => *bounds,
        }
    }
}

pub struct TriangleBvh {
    triangles: Vec<Triangle>,
    root: Arc<Node>,
    bounding_sphere: BoundingSphere,
}

const LEAF_SIZE: usize = 4;

impl TriangleBvh {
    pub fn build(triangles: Vec<Triangle>) -> Self {
        let mut indices: Vec<usize> = (0..triangles.len()).collect();
        let root = if indices.is_empty() {
            Arc::new(Node::Leaf {
                bounds: Bounds3::empty(),
                triangles: Vec::new(),
            })
        } else {
            build_node(&triangles, &mut indices)
        };

        let mut world_bounds = Bounds3::empty();
        for tri in &triangles {
            world_bounds = world_bounds.union(&tri.bounds());
        }
        let center = 0.5 * (world_bounds.min + world_bounds.max);
        let radius = if triangles.is_empty() {
            0.0
        } else {
            (world_bounds.max - center).length()
        };

        Self {
            triangles,
            root,
            bounding_sphere: BoundingSphere { center, radius },
        }
    }
}

fn build_node(triangles: &[Triangle], indices: &mut [usize]) -> Arc<Node> {
    let mut bounds = Bounds3::empty();
    for &i in indices.iter() {
        bounds = bounds.union(&triangles[i].bounds());
    }

    if indices.len() <= LEAF_SIZE {
        return Arc::new(Node::Leaf {
            bounds,
            triangles: indices.to_vec(),
        });
    }

    let mut centroid_bounds = Bounds3::empty();
    for &i in indices.iter() {
        centroid_bounds = centroid_bounds.union_point(triangles[i].bounds().centroid());
    }
    let axis = centroid_bounds.longest_axis();

    indices.sort_by(|&a, &b| {
        let ca = triangles[a].bounds().centroid();
        let cb = triangles[b].bounds().centroid();
        let va = match axis {
            0 => ca.x,
            1 => ca.y,
            _ => ca.z,
        };
        let vb = match axis {
            0 => cb.x,
            1 => cb.y,
            _ => cb.z,
        };
        va.partial_cmp(&vb).unwrap()
    });

    let mid = indices.len() / 2;
    let (left_idx, right_idx) = indices.split_at_mut(mid);
    let left = build_node(triangles, left_idx);
    let right = build_node(triangles, right_idx);

    Arc::new(Node::Interior {
        bounds,
        left,
        right,
    })
}

impl Intersector for TriangleBvh {
    fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let mut best: Option<(f64, usize, f64, f64)> = None;
        let mut narrowed = *ray;
        intersect_node(&self.root, &self.triangles, &mut narrowed, &mut best);

        best.map(|(t, idx, u, v)| {
            let tri = &self.triangles[idx];
            let position = ray.at(t);
            let shading_normal = tri.shading_normal(u, v);
            Hit {
                t,
                position,
                geometric_normal: tri.geometric_normal(),
                shading_normal,
                tangent: tri.tangent,
                material_tag: tri.material_tag,
            }
        })
    }

    fn bounding_sphere(&self) -> BoundingSphere {
        self.bounding_sphere
    }
}

fn intersect_node(
    node: &Node,
    triangles: &[Triangle],
    ray: &mut Ray,
    best: &mut Option<(f64, usize, f64, f64)>,
) {
    if !node.bounds().hit(ray) {
        return;
    }
    match node {
        Node::Leaf { triangles: idxs, .. } => {
            for &i in idxs {
                if let Some((t, u, v)) = triangles[i].intersect(ray) {
                    ray.t_max = t;
                    *best = Some((t, i, u, v));
                }
            }
        }
        Node::Interior { left, right, .. } => {
            intersect_node(left, triangles, ray, best);
            intersect_node(right, triangles, ray, best);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle(tag: i32) -> Triangle {
        Triangle {
            p0: DVec3::new(-1.0, 0.0, -1.0),
            p1: DVec3::new(1.0, 0.0, -1.0),
            p2: DVec3::new(0.0, 0.0, 1.0),
            n0: DVec3::Y,
            n1: DVec3::Y,
            n2: DVec3::Y,
            tangent: DVec3::X,
            material_tag: tag,
        }
    }

    #[test]
    fn hits_triangle_from_above() {
        let bvh = TriangleBvh::build(vec![unit_triangle(1)]);
        let ray = Ray::new(DVec3::new(0.0, 5.0, 0.0), DVec3::new(0.0, -1.0, 0.0));
        let hit = bvh.intersect(&ray).expect("should hit");
        assert!((hit.position.y).abs() < 1e-9);
        assert_eq!(hit.material_tag, 1);
    }

    #[test]
    fn misses_when_ray_points_away() {
        let bvh = TriangleBvh::build(vec![unit_triangle(1)]);
        let ray = Ray::new(DVec3::new(0.0, 5.0, 0.0), DVec3::new(0.0, 1.0, 0.0));
        assert!(bvh.intersect(&ray).is_none());
    }
}
