//! Widened-range hash grid. Grounded in
//! `original_source/HashGrid3D.hpp`: space is partitioned into cubes of
//! side `r`; at build time each cell's stored range is *widened* to also
//! include its `x-1` and `x+1` neighbours, so a query only has to look up
//! 9 cells (sweeping `y`/`z`) instead of the canonical 27, since each of
//! those 9 lookups already covers all three `x` neighbours.

use std::collections::HashMap;

use glam::DVec3;

use crate::core::spatial_index::{PositionedRecord, SpatialIndex};

type CellKey = (i64, i64, i64);

pub struct HashGrid<T> {
    records: Vec<T>,
    /// Index into `records`, widened per the module doc comment.
    flat: Vec<u32>,
    ranges: HashMap<CellKey, (u32, u32)>,
    cell_size: f64,
}

impl<T> HashGrid<T> {
    fn cell_of(&self, p: DVec3) -> CellKey {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }
}

impl<T: PositionedRecord> SpatialIndex<T> for HashGrid<T> {
    fn build(records: Vec<T>, max_radius: f64) -> Self {
        let cell_size = max_radius.max(1e-9);

        let mut by_cell: HashMap<CellKey, Vec<u32>> = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            let key = (
                (r.position().x / cell_size).floor() as i64,
                (r.position().y / cell_size).floor() as i64,
                (r.position().z / cell_size).floor() as i64,
            );
            by_cell.entry(key).or_default().push(i as u32);
        }

        let mut flat = Vec::with_capacity(records.len() * 3);
        let mut ranges = HashMap::with_capacity(by_cell.len());

        for &(cx, cy, cz) in by_cell.keys() {
            let start = flat.len() as u32;
            for dx in [-1, 0, 1] {
                if let Some(indices) = by_cell.get(&(cx + dx, cy, cz)) {
                    flat.extend_from_slice(indices);
                }
            }
            let end = flat.len() as u32;
            ranges.insert((cx, cy, cz), (start, end));
        }

        Self {
            records,
            flat,
            ranges,
            cell_size,
        }
    }

    fn query_radius(&self, query: DVec3, radius: f64, mut visit: impl FnMut(&T)) {
        debug_assert!(radius <= self.cell_size + 1e-9);
        let (qx, qy, qz) = self.cell_of(query);
        let r2 = radius * radius;

        for dy in [-1, 0, 1] {
            for dz in [-1, 0, 1] {
                if let Some(&(start, end)) = self.ranges.get(&(qx, qy + dy, qz + dz)) {
                    for &idx in &self.flat[start as usize..end as usize] {
                        let record = &self.records[idx as usize];
                        if (record.position() - query).length_squared() <= r2 {
                            visit(record);
                        }
                    }
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    struct P(DVec3);
    impl PositionedRecord for P {
        fn position(&self) -> DVec3 {
            self.0
        }
    }

    #[test]
    fn single_point_found_at_own_position() {
        let grid = HashGrid::build(vec![P(DVec3::ZERO)], 1.0);
        let mut found = 0;
        grid.query_radius(DVec3::ZERO, 1.0, |_| found += 1);
        assert_eq!(found, 1);
    }

    #[test]
    fn point_outside_radius_not_visited() {
        let grid = HashGrid::build(vec![P(DVec3::new(5.0, 5.0, 5.0))], 0.5);
        let mut found = 0;
        grid.query_radius(DVec3::ZERO, 0.5, |_| found += 1);
        assert_eq!(found, 0);
    }
}
