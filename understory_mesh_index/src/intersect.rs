// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Intersection tests against triangles, meshes, and other trees.
//!
//! The optional transform always applies to the *other* operand; this tree
//! stays in its own frame. Transformed boxes are re-bounded from their eight
//! corners, so pruning stays conservative under rotation.

use core::ops::ControlFlow;

use glam::{DAffine3, DVec3};

use crate::build::is_indexable;
use crate::error::Result;
use crate::geometry::{
    TriTriContact, Triangle, tri_tri_distance, tri_tri_intersection, tri_tri_overlap,
};
use crate::mesh::MeshAdapter;
use crate::store::{Node, NodeIdx};
use crate::tree::MeshAabbTree;
use crate::types::Aabb3;

/// Two triangles touching in a single point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointIntersection {
    /// Triangle of this tree.
    pub triangle_a: usize,
    /// Triangle of the other tree.
    pub triangle_b: usize,
    /// The contact point, in this tree's frame.
    pub point: DVec3,
}

/// Two triangles crossing along a segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentIntersection {
    /// Triangle of this tree.
    pub triangle_a: usize,
    /// Triangle of the other tree.
    pub triangle_b: usize,
    /// Segment start, in this tree's frame.
    pub start: DVec3,
    /// Segment end, in this tree's frame.
    pub end: DVec3,
}

/// Everything [`MeshAabbTree::find_intersections`] found.
///
/// Coplanar overlapping pairs have an area of contact rather than a point or
/// segment and are not listed; [`MeshAabbTree::test_intersection_tree`]
/// does report them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntersectionSet {
    /// Pairs touching in a point.
    pub points: Vec<PointIntersection>,
    /// Pairs crossing along a segment.
    pub segments: Vec<SegmentIntersection>,
}

impl IntersectionSet {
    /// Whether nothing was found.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.segments.is_empty()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.points.len() + self.segments.len()
    }
}

/// Closest triangles between two trees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrianglePair {
    /// Triangle of this tree.
    pub triangle_a: usize,
    /// Triangle of the other tree.
    pub triangle_b: usize,
    /// Closest point on `triangle_a`.
    pub point_a: DVec3,
    /// Closest point on `triangle_b`, in this tree's frame.
    pub point_b: DVec3,
    /// Squared distance between the two points.
    pub distance_squared: f64,
}

fn transform_triangle(tri: Triangle, xf: Option<&DAffine3>) -> Triangle {
    match xf {
        Some(xf) => tri.map(|v| xf.transform_point3(v)),
        None => tri,
    }
}

fn transform_box(b: &Aabb3, xf: Option<&DAffine3>) -> Aabb3 {
    match xf {
        Some(xf) => b.transformed(xf),
        None => *b,
    }
}

impl<M: MeshAdapter> MeshAabbTree<M> {
    /// Whether any triangle of the tree touches `triangle`.
    pub fn test_intersection_triangle(
        &self,
        triangle: &Triangle,
        transform: Option<&DAffine3>,
    ) -> Result<bool> {
        self.check_fresh()?;
        let tri = transform_triangle(*triangle, transform);
        Ok(self.overlaps_triangle(&tri))
    }

    fn overlaps_triangle(&self, tri: &Triangle) -> bool {
        let Some(root) = self.store.root() else {
            return false;
        };
        let bounds = Aabb3::from_triangle(tri);
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if !self.store.bounds(idx).intersects(&bounds) {
                continue;
            }
            match self.store.node(idx) {
                Node::Leaf { .. } => {
                    let hit = self
                        .store
                        .leaf_triangles(idx)
                        .iter()
                        .any(|&t| tri_tri_overlap(&self.triangle(t), tri));
                    if hit {
                        return true;
                    }
                }
                node => stack.extend(node.children()),
            }
        }
        false
    }

    /// Whether any triangle of `other` touches the tree.
    ///
    /// Scans the triangles of `other` one by one; build a second tree and use
    /// [`test_intersection_tree`](Self::test_intersection_tree) for large meshes.
    pub fn test_intersection_mesh<O: MeshAdapter + ?Sized>(
        &self,
        other: &O,
        transform: Option<&DAffine3>,
    ) -> Result<bool> {
        self.check_fresh()?;
        Ok(other
            .triangle_ids()
            .filter(|&t| is_indexable(other, t))
            .any(|t| {
                let tri = transform_triangle(other.triangle_vertices(t), transform);
                self.overlaps_triangle(&tri)
            }))
    }

    /// Whether any triangle of `other` touches this tree.
    pub fn test_intersection_tree<O: MeshAdapter>(
        &self,
        other: &MeshAabbTree<O>,
        transform: Option<&DAffine3>,
    ) -> Result<bool> {
        self.check_fresh()?;
        other.check_fresh()?;
        let found = self.co_descend(other, transform, &mut |a, b| {
            if tri_tri_overlap(a.1, b.1) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        Ok(found.is_break())
    }

    /// Enumerate every pair of crossing triangles between this tree and `other`.
    pub fn find_intersections<O: MeshAdapter>(
        &self,
        other: &MeshAabbTree<O>,
        transform: Option<&DAffine3>,
    ) -> Result<IntersectionSet> {
        self.check_fresh()?;
        other.check_fresh()?;
        let mut out = IntersectionSet::default();
        let flow = self.co_descend(other, transform, &mut |a, b| {
            match tri_tri_intersection(a.1, b.1) {
                TriTriContact::Point(point) => out.points.push(PointIntersection {
                    triangle_a: a.0,
                    triangle_b: b.0,
                    point,
                }),
                TriTriContact::Segment(start, end) => out.segments.push(SegmentIntersection {
                    triangle_a: a.0,
                    triangle_b: b.0,
                    start,
                    end,
                }),
                TriTriContact::Coplanar | TriTriContact::Disjoint => {}
            }
            ControlFlow::Continue(())
        });
        debug_assert!(flow.is_continue(), "enumeration visits every pair");
        Ok(out)
    }

    /// Walk both trees together and hand every leaf triangle pair whose boxes
    /// overlap to `visit`.
    fn co_descend<O: MeshAdapter>(
        &self,
        other: &MeshAabbTree<O>,
        transform: Option<&DAffine3>,
        visit: &mut dyn FnMut((usize, &Triangle), (usize, &Triangle)) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let (Some(a), Some(b)) = (self.store.root(), other.store.root()) else {
            return ControlFlow::Continue(());
        };
        CoDescent {
            a: self,
            b: other,
            transform,
            visit,
        }
        .descend(a, b, 0)
    }

    /// Closest pair of triangles between this tree and `other`, if any pair
    /// is closer than `max_dist`. Intersecting pairs have distance zero.
    pub fn find_nearest_triangle_pair<O: MeshAdapter>(
        &self,
        other: &MeshAabbTree<O>,
        max_dist: f64,
        transform: Option<&DAffine3>,
    ) -> Result<Option<TrianglePair>> {
        self.check_fresh()?;
        other.check_fresh()?;
        let (Some(a), Some(b)) = (self.store.root(), other.store.root()) else {
            return Ok(None);
        };
        let mut search = PairSearch {
            a: self,
            b: other,
            transform,
            bound: max_dist.max(0.0).powi(2),
            best: None,
        };
        let lb = self
            .store
            .bounds(a)
            .distance_squared_to_box(&transform_box(other.store.bounds(b), transform));
        if lb < search.bound {
            search.descend(a, b);
        }
        Ok(search.best)
    }
}

struct CoDescent<'t, 'v, M, O> {
    a: &'t MeshAabbTree<M>,
    b: &'t MeshAabbTree<O>,
    transform: Option<&'t DAffine3>,
    visit: &'v mut dyn FnMut((usize, &Triangle), (usize, &Triangle)) -> ControlFlow<()>,
}

impl<M: MeshAdapter, O: MeshAdapter> CoDescent<'_, '_, M, O> {
    fn descend(&mut self, a: NodeIdx, b: NodeIdx, depth: usize) -> ControlFlow<()> {
        let box_b = transform_box(self.b.store.bounds(b), self.transform);
        if !self.a.store.bounds(a).intersects(&box_b) {
            return ControlFlow::Continue(());
        }
        match (self.a.store.is_leaf(a), self.b.store.is_leaf(b)) {
            (true, true) => self.leaf_pair(a, b),
            // One side bottomed out: keep splitting the other.
            (true, false) => {
                for child in self.b.store.node(b).children() {
                    self.descend(a, child, depth + 1)?;
                }
                ControlFlow::Continue(())
            }
            (false, true) => {
                for child in self.a.store.node(a).children() {
                    self.descend(child, b, depth + 1)?;
                }
                ControlFlow::Continue(())
            }
            // Both internal: even depths split this tree, odd depths the other.
            (false, false) => {
                if depth % 2 == 0 {
                    for child in self.a.store.node(a).children() {
                        self.descend(child, b, depth + 1)?;
                    }
                } else {
                    for child in self.b.store.node(b).children() {
                        self.descend(a, child, depth + 1)?;
                    }
                }
                ControlFlow::Continue(())
            }
        }
    }

    fn leaf_pair(&mut self, a: NodeIdx, b: NodeIdx) -> ControlFlow<()> {
        let others: Vec<(usize, Triangle)> = self
            .b
            .store
            .leaf_triangles(b)
            .iter()
            .map(|&t| (t, transform_triangle(self.b.triangle(t), self.transform)))
            .collect();
        for &ta in self.a.store.leaf_triangles(a) {
            let tri_a = self.a.triangle(ta);
            let box_a = Aabb3::from_triangle(&tri_a);
            for (tb, tri_b) in &others {
                if box_a.intersects(&Aabb3::from_triangle(tri_b)) {
                    (self.visit)((ta, &tri_a), (*tb, tri_b))?;
                }
            }
        }
        ControlFlow::Continue(())
    }
}

struct PairSearch<'t, M, O> {
    a: &'t MeshAabbTree<M>,
    b: &'t MeshAabbTree<O>,
    transform: Option<&'t DAffine3>,
    bound: f64,
    best: Option<TrianglePair>,
}

impl<M: MeshAdapter, O: MeshAdapter> PairSearch<'_, M, O> {
    fn box_b(&self, b: NodeIdx) -> Aabb3 {
        transform_box(self.b.store.bounds(b), self.transform)
    }

    fn descend(&mut self, a: NodeIdx, b: NodeIdx) {
        let (leaf_a, leaf_b) = (self.a.store.is_leaf(a), self.b.store.is_leaf(b));
        if leaf_a && leaf_b {
            self.leaf_pair(a, b);
            return;
        }
        // Split the larger box, or whichever side still has children.
        let split_a = !leaf_a
            && (leaf_b || self.a.store.bounds(a).extent_sum() >= self.box_b(b).extent_sum());
        let mut next: Vec<(NodeIdx, NodeIdx, f64)> = if split_a {
            let box_b = self.box_b(b);
            self.a
                .store
                .node(a)
                .children()
                .map(|c| (c, b, self.a.store.bounds(c).distance_squared_to_box(&box_b)))
                .collect()
        } else {
            let box_a = *self.a.store.bounds(a);
            self.b
                .store
                .node(b)
                .children()
                .map(|c| (a, c, box_a.distance_squared_to_box(&self.box_b(c))))
                .collect()
        };
        next.sort_by(|x, y| x.2.total_cmp(&y.2));
        for (ca, cb, lb) in next {
            if lb < self.bound {
                self.descend(ca, cb);
            }
        }
    }

    fn leaf_pair(&mut self, a: NodeIdx, b: NodeIdx) {
        for &ta in self.a.store.leaf_triangles(a) {
            let tri_a = self.a.triangle(ta);
            for &tb in self.b.store.leaf_triangles(b) {
                let tri_b = transform_triangle(self.b.triangle(tb), self.transform);
                let d = tri_tri_distance(&tri_a, &tri_b);
                if d.distance_squared < self.bound {
                    self.bound = d.distance_squared;
                    self.best = Some(TrianglePair {
                        triangle_a: ta,
                        triangle_b: tb,
                        point_a: d.point_a,
                        point_b: d.point_b,
                        distance_squared: d.distance_squared,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;

    fn cube_tree(min: DVec3) -> MeshAabbTree<TriangleMesh> {
        MeshAabbTree::new(TriangleMesh::axis_box(min, min + DVec3::ONE)).unwrap()
    }

    #[test]
    fn separated_cubes_do_not_intersect() {
        let a = cube_tree(DVec3::ZERO);
        let b = cube_tree(DVec3::new(5.0, 0.0, 0.0));
        assert!(!a.test_intersection_tree(&b, None).unwrap());
        assert!(!a.test_intersection_mesh(b.mesh(), None).unwrap());
        assert!(a.find_intersections(&b, None).unwrap().is_empty());
        let pair = a.find_nearest_triangle_pair(&b, f64::INFINITY, None).unwrap().unwrap();
        assert!((pair.distance_squared - 16.0).abs() < 1e-9);
    }

    #[test]
    fn negative_pair_bound_finds_nothing() {
        let a = cube_tree(DVec3::ZERO);
        let b = cube_tree(DVec3::new(1.5, 0.0, 0.0));
        assert!(a.find_nearest_triangle_pair(&b, 1.0, None).unwrap().is_some());
        assert!(a.find_nearest_triangle_pair(&b, -1.0, None).unwrap().is_none());
    }

    #[test]
    fn transform_moves_the_other_operand() {
        let a = cube_tree(DVec3::ZERO);
        let b = cube_tree(DVec3::new(5.0, 0.0, 0.0));
        let back = DAffine3::from_translation(DVec3::new(-4.5, 0.13, 0.27));
        assert!(a.test_intersection_tree(&b, Some(&back)).unwrap());
        assert!(a.test_intersection_mesh(b.mesh(), Some(&back)).unwrap());
        let found = a.find_intersections(&b, Some(&back)).unwrap();
        assert!(!found.segments.is_empty());
        for s in &found.segments {
            assert!(s.start.x >= 0.5 - 1e-9 && s.end.x <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn single_triangle_probe() {
        let a = cube_tree(DVec3::ZERO);
        let through = [
            DVec3::new(0.5, 0.3, -1.0),
            DVec3::new(0.5, 0.3, 2.0),
            DVec3::new(0.5, 1.8, 0.5),
        ];
        assert!(a.test_intersection_triangle(&through, None).unwrap());
        let shift = DAffine3::from_translation(DVec3::new(10.0, 0.0, 0.0));
        assert!(!a.test_intersection_triangle(&through, Some(&shift)).unwrap());
    }

    #[test]
    fn stale_other_tree_is_rejected() {
        let a = cube_tree(DVec3::ZERO);
        let mut b = cube_tree(DVec3::ZERO);
        b.mesh_mut().translate(DVec3::X);
        assert!(a.test_intersection_tree(&b, None).is_err());
        assert!(a.find_intersections(&b, None).is_err());
    }
}
