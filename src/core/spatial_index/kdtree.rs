//! Balanced kd-tree. Grounded in `original_source/KDTree3D.hpp`: at each
//! level the records are split on the longest axis of their bounding box,
//! with the median record becoming the node; the tree is therefore
//! balanced in size (each subtree holds half the remaining records) even
//! though it is not height-stabilised against adversarial duplicate
//! coordinates. The original packs the split axis into 2 bits per node
//! alongside a leaf flag to shrink the node footprint; this implementation
//! keeps the axis as a plain `u8` field since that packing is a memory
//! micro-optimisation with no effect on query results.

use glam::DVec3;

use crate::core::spatial_index::{PositionedRecord, SpatialIndex};

struct Node<T> {
    record: T,
    axis: u8,
    left: Option<Box<Node<T>>>,
    right: Option<Box<Node<T>>>,
}

pub struct KdTree<T> {
    root: Option<Box<Node<T>>>,
    len: usize,
}

fn axis_value(p: DVec3, axis: u8) -> f64 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

fn longest_axis<T: PositionedRecord>(records: &[T]) -> u8 {
    let mut lo = DVec3::splat(f64::INFINITY);
    let mut hi = DVec3::splat(f64::NEG_INFINITY);
    for r in records {
        lo = lo.min(r.position());
        hi = hi.max(r.position());
    }
    let d = hi - lo;
    if d.x >= d.y && d.x >= d.z {
        0
    } else if d.y >= d.z {
        1
    } else {
        2
    }
}

fn build<T: PositionedRecord>(mut records: Vec<T>) -> Option<Box<Node<T>>> {
    if records.is_empty() {
        return None;
    }
    if records.len() == 1 {
        let record = records.pop().unwrap();
        return Some(Box::new(Node {
            record,
            axis: 0,
            left: None,
            right: None,
        }));
    }

    let axis = longest_axis(&records);
    let mid = records.len() / 2;
    records.select_nth_unstable_by(mid, |a, b| {
        axis_value(a.position(), axis)
            .partial_cmp(&axis_value(b.position(), axis))
            .unwrap()
    });

    let right_records = records.split_off(mid + 1);
    let median = records.pop().unwrap();
    let left_records = records;

    Some(Box::new(Node {
        record: median,
        axis,
        left: build(left_records),
        right: build(right_records),
    }))
}

fn query<T: PositionedRecord>(
    node: &Node<T>,
    query_point: DVec3,
    radius: f64,
    radius2: f64,
    visit: &mut impl FnMut(&T),
) {
    if (node.record.position() - query_point).length_squared() <= radius2 {
        visit(&node.record);
    }

    let diff = axis_value(query_point, node.axis) - axis_value(node.record.position(), node.axis);

    let (near, far) = if diff <= 0.0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };

    if let Some(near) = near {
        query(near, query_point, radius, radius2, visit);
    }
    if diff * diff <= radius2 {
        if let Some(far) = far {
            query(far, query_point, radius, radius2, visit);
        }
    }
}

impl<T: PositionedRecord> SpatialIndex<T> for KdTree<T> {
    fn build(records: Vec<T>, _max_radius: f64) -> Self {
        let len = records.len();
        Self {
            root: build(records),
            len,
        }
    }

    fn query_radius(&self, query_point: DVec3, radius: f64, mut visit: impl FnMut(&T)) {
        if let Some(root) = &self.root {
            query(root, query_point, radius, radius * radius, &mut visit);
        }
    }

    fn len(&self) -> usize {
        self.len
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
    fn finds_exact_point() {
        let tree = KdTree::build(vec![P(DVec3::ZERO), P(DVec3::new(10.0, 0.0, 0.0))], 1.0);
        let mut found = 0;
        tree.query_radius(DVec3::ZERO, 0.1, |_| found += 1);
        assert_eq!(found, 1);
    }

    #[test]
    fn empty_tree_has_zero_len() {
        let tree: KdTree<P> = KdTree::build(Vec::new(), 1.0);
        assert_eq!(tree.len(), 0);
    }
}
