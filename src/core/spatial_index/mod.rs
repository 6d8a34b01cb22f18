//! Radius-query spatial index over point-carrying records, used by the
//! VCM/UPG merging estimator to gather nearby light-subpath vertices.
//!
//! Two interchangeable implementations, both immutable after build and
//! both satisfying the same radius-query contract — grounded in
//! `original_source/HashGrid3D.hpp` and `KDTree3D.hpp` respectively. The
//! estimator picks one at configure time through the `SpatialIndex` trait
//! rather than depending on either concrete type.

pub mod hash_grid;
pub mod kdtree;

use glam::DVec3;

pub use hash_grid::HashGrid;
pub use kdtree::KdTree;

pub trait PositionedRecord {
    fn position(&self) -> DVec3;
}

pub trait SpatialIndex<T: PositionedRecord> {
    fn build(records: Vec<T>, max_radius: f64) -> Self;

    /// Invokes `visit` on every record within `radius` of `query`.
    /// `radius` must not exceed the radius the index was built with.
    fn query_radius(&self, query: DVec3, radius: f64, visit: impl FnMut(&T));

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::RandomEngine;

    #[derive(Clone, Copy)]
    struct Point(DVec3);

    impl PositionedRecord for Point {
        fn position(&self) -> DVec3 {
            self.0
        }
    }

    fn brute_force(points: &[Point], query: DVec3, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        for (i, p) in points.iter().enumerate() {
            if (p.position() - query).length() <= radius {
                out.push(i);
            }
        }
        out
    }

    #[test]
    fn hash_grid_and_kdtree_agree_with_brute_force() {
        let mut engine = RandomEngine::new(42);
        let points: Vec<Point> = (0..2000)
            .map(|_| {
                let (x, y) = engine.uniform2();
                let (z, _) = engine.uniform2();
                Point(DVec3::new(x, y, z) * 10.0 - DVec3::splat(5.0))
            })
            .collect();

        let radius = 0.3;
        let grid = HashGrid::build(points.clone(), radius);
        let tree = KdTree::build(points.clone(), radius);

        for _ in 0..50 {
            let (x, y) = engine.uniform2();
            let (z, _) = engine.uniform2();
            let query = DVec3::new(x, y, z) * 10.0 - DVec3::splat(5.0);

            let mut expected = brute_force(&points, query, radius);
            expected.sort_unstable();

            let mut got_grid = Vec::new();
            grid.query_radius(query, radius, |p| {
                got_grid.push(
                    points
                        .iter()
                        .position(|q| q.position() == p.position())
                        .unwrap(),
                )
            });
            got_grid.sort_unstable();
            got_grid.dedup();

            let mut got_tree = Vec::new();
            tree.query_radius(query, radius, |p| {
                got_tree.push(
                    points
                        .iter()
                        .position(|q| q.position() == p.position())
                        .unwrap(),
                )
            });
            got_tree.sort_unstable();
            got_tree.dedup();

            assert_eq!(expected, got_grid);
            assert_eq!(expected, got_tree);
        }
    }
}
