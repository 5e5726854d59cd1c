// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point and ray queries.
//!
//! All queries are branch-and-bound descents: a node is skipped when its
//! box cannot beat the best result so far, and the nearer child is visited
//! first so the bound tightens early. `max_dist` is exclusive; negative
//! values find nothing.

use glam::DVec3;
use tracing::trace;

use crate::error::{Result, TreeError};
use crate::geometry::{point_triangle_distance, ray_triangle};
use crate::mesh::MeshAdapter;
use crate::store::{Node, NodeIdx};
use crate::tree::MeshAabbTree;
use crate::types::{Axis, Ray3};

/// Closest point on the mesh to a query point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NearestPoint {
    /// Triangle containing the closest point.
    pub triangle: usize,
    /// The closest point.
    pub point: DVec3,
    /// Squared distance from the query point.
    pub distance_squared: f64,
    /// Barycentric coordinates of `point` within `triangle`.
    pub barycentric: DVec3,
}

impl NearestPoint {
    /// Distance from the query point.
    pub fn distance(&self) -> f64 {
        self.distance_squared.sqrt()
    }
}

/// A ray/triangle hit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayHit {
    /// Triangle that was hit.
    pub triangle: usize,
    /// Distance along the ray.
    pub t: f64,
    /// Hit position.
    pub point: DVec3,
    /// Barycentric coordinates of `point` within `triangle`.
    pub barycentric: DVec3,
}

fn check_ray(ray: &Ray3) -> Result<()> {
    if ray.is_normalized() {
        Ok(())
    } else {
        Err(TreeError::RayNotNormalized {
            length: ray.direction.length(),
        })
    }
}

impl<M: MeshAdapter> MeshAabbTree<M> {
    /// Id of the triangle closest to `point`, or `None` if no triangle is
    /// closer than `max_dist`.
    pub fn find_nearest_triangle(&self, point: DVec3, max_dist: f64) -> Result<Option<usize>> {
        Ok(self.find_nearest_point(point, max_dist)?.map(|n| n.triangle))
    }

    /// Closest point on the mesh to `point`, if any lies closer than `max_dist`.
    pub fn find_nearest_point(&self, point: DVec3, max_dist: f64) -> Result<Option<NearestPoint>> {
        self.check_fresh()?;
        let mut best = None;
        let max_dist = max_dist.max(0.0);
        let mut bound = max_dist * max_dist;
        if let Some(root) = self.store.root() {
            if self.store.bounds(root).distance_squared(point) < bound {
                self.nearest_point_in(root, point, &mut bound, &mut best);
            }
        }
        Ok(best)
    }

    fn nearest_point_in(
        &self,
        idx: NodeIdx,
        point: DVec3,
        bound: &mut f64,
        best: &mut Option<NearestPoint>,
    ) {
        match self.store.node(idx) {
            Node::Leaf { .. } => {
                for &tid in self.store.leaf_triangles(idx) {
                    if !self.accepts(tid) {
                        continue;
                    }
                    let d = point_triangle_distance(point, &self.triangle(tid));
                    if d.distance_squared < *bound {
                        *bound = d.distance_squared;
                        *best = Some(NearestPoint {
                            triangle: tid,
                            point: d.closest,
                            distance_squared: d.distance_squared,
                            barycentric: d.barycentric,
                        });
                    }
                }
            }
            Node::Single { child } => {
                if self.store.bounds(child).distance_squared(point) < *bound {
                    self.nearest_point_in(child, point, bound, best);
                }
            }
            Node::Pair { left, right } => {
                let dl = self.store.bounds(left).distance_squared(point);
                let dr = self.store.bounds(right).distance_squared(point);
                let order = if dr < dl {
                    [(right, dr), (left, dl)]
                } else {
                    [(left, dl), (right, dr)]
                };
                for (child, d) in order {
                    if d < *bound {
                        self.nearest_point_in(child, point, bound, best);
                    }
                }
            }
        }
    }

    /// Id of the first triangle hit by `ray` closer than `max_dist`.
    ///
    /// The ray direction must be unit length.
    pub fn find_nearest_hit_triangle(&self, ray: &Ray3, max_dist: f64) -> Result<Option<usize>> {
        Ok(self.find_nearest_hit(ray, max_dist)?.map(|h| h.triangle))
    }

    /// First hit along `ray` closer than `max_dist`.
    ///
    /// The ray direction must be unit length.
    pub fn find_nearest_hit(&self, ray: &Ray3, max_dist: f64) -> Result<Option<RayHit>> {
        self.check_fresh()?;
        check_ray(ray)?;
        let mut best = None;
        let mut bound = max_dist;
        if let Some(root) = self.store.root() {
            if self.store.bounds(root).ray_entry(ray).is_some_and(|t| t < bound) {
                self.nearest_hit_in(root, ray, &mut bound, &mut best);
            }
        }
        Ok(best)
    }

    fn nearest_hit_in(&self, idx: NodeIdx, ray: &Ray3, bound: &mut f64, best: &mut Option<RayHit>) {
        match self.store.node(idx) {
            Node::Leaf { .. } => {
                for &tid in self.store.leaf_triangles(idx) {
                    if !self.accepts(tid) {
                        continue;
                    }
                    if let Some(hit) = ray_triangle(ray, &self.triangle(tid)) {
                        if hit.t < *bound {
                            *bound = hit.t;
                            *best = Some(RayHit {
                                triangle: tid,
                                t: hit.t,
                                point: ray.at(hit.t),
                                barycentric: hit.barycentric,
                            });
                        }
                    }
                }
            }
            Node::Single { child } => {
                if self.store.bounds(child).ray_entry(ray).is_some_and(|t| t < *bound) {
                    self.nearest_hit_in(child, ray, bound, best);
                }
            }
            Node::Pair { left, right } => {
                let tl = self.store.bounds(left).ray_entry(ray);
                let tr = self.store.bounds(right).ray_entry(ray);
                let mut order = [(left, tl), (right, tr)];
                if let (Some(a), Some(b)) = (tl, tr) {
                    if b < a {
                        order.swap(0, 1);
                    }
                }
                for (child, entry) in order {
                    if entry.is_some_and(|t| t < *bound) {
                        self.nearest_hit_in(child, ray, bound, best);
                    }
                }
            }
        }
    }

    /// Every hit along `ray` closer than `max_dist`, sorted by distance.
    ///
    /// The ray direction must be unit length.
    pub fn find_all_hits(&self, ray: &Ray3, max_dist: f64) -> Result<Vec<RayHit>> {
        self.check_fresh()?;
        check_ray(ray)?;
        let mut hits = Vec::new();
        self.for_each_hit(ray, max_dist, |tid, t, barycentric| {
            hits.push(RayHit {
                triangle: tid,
                t,
                point: ray.at(t),
                barycentric,
            });
        });
        hits.sort_by(|a, b| a.t.total_cmp(&b.t).then(a.triangle.cmp(&b.triangle)));
        Ok(hits)
    }

    /// Ids of every triangle hit by `ray` closer than `max_dist`, nearest first.
    ///
    /// The ray direction must be unit length.
    pub fn find_all_hit_triangles(&self, ray: &Ray3, max_dist: f64) -> Result<Vec<usize>> {
        Ok(self
            .find_all_hits(ray, max_dist)?
            .into_iter()
            .map(|h| h.triangle)
            .collect())
    }

    /// Number of triangles hit by `ray` closer than `max_dist`.
    ///
    /// The ray direction must be unit length.
    pub fn count_hit_triangles(&self, ray: &Ray3, max_dist: f64) -> Result<usize> {
        self.check_fresh()?;
        check_ray(ray)?;
        let mut count = 0;
        self.for_each_hit(ray, max_dist, |_, _, _| count += 1);
        Ok(count)
    }

    fn for_each_hit(&self, ray: &Ray3, max_dist: f64, mut f: impl FnMut(usize, f64, DVec3)) {
        let Some(root) = self.store.root() else {
            return;
        };
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if !self.store.bounds(idx).ray_entry(ray).is_some_and(|t| t < max_dist) {
                continue;
            }
            match self.store.node(idx) {
                Node::Leaf { .. } => {
                    for &tid in self.store.leaf_triangles(idx) {
                        if !self.accepts(tid) {
                            continue;
                        }
                        if let Some(hit) = ray_triangle(ray, &self.triangle(tid)) {
                            if hit.t < max_dist {
                                f(tid, hit.t, hit.barycentric);
                            }
                        }
                    }
                }
                node => stack.extend(node.children()),
            }
        }
    }

    /// Whether `point` is inside the mesh, by the parity of hits along +X.
    ///
    /// Only meaningful for closed meshes without self-intersections; the
    /// answer for other meshes is unspecified.
    pub fn is_inside(&self, point: DVec3) -> Result<bool> {
        self.is_inside_along(point, Axis::X)
    }

    /// Like [`is_inside`](Self::is_inside), casting along `axis` instead.
    ///
    /// A cast that grazes an edge or vertex is ambiguous, since the shared
    /// edge is hit once per adjacent triangle. Such casts are retried along
    /// fixed skewed directions.
    pub fn is_inside_along(&self, point: DVec3, axis: Axis) -> Result<bool> {
        self.check_fresh()?;
        let mut parity = false;
        let skewed = RECAST_DIRECTIONS.iter().map(|d| d.normalize());
        for (attempt, direction) in core::iter::once(axis.unit()).chain(skewed).enumerate() {
            let (hits, on_edge) = self.parity_cast(&Ray3::new(point, direction));
            parity = hits % 2 == 1;
            if !on_edge {
                break;
            }
            trace!(attempt, hits, "parity ray grazed an edge, recasting");
        }
        Ok(parity)
    }

    /// Count hits along `ray`, and report whether any landed on a triangle
    /// edge or vertex.
    fn parity_cast(&self, ray: &Ray3) -> (usize, bool) {
        let mut hits = 0;
        let mut on_edge = false;
        self.for_each_hit(ray, f64::INFINITY, |_, _, barycentric| {
            hits += 1;
            on_edge |= barycentric.min_element() <= EDGE_BARYCENTRIC_EPS;
        });
        (hits, on_edge)
    }
}

/// Barycentric coordinate below which a hit counts as on an edge.
const EDGE_BARYCENTRIC_EPS: f64 = 1e-9;

/// Unnormalized fallback directions for parity casts, chosen off every axis
/// and diagonal plane.
const RECAST_DIRECTIONS: [DVec3; 4] = [
    DVec3::new(1.0, 0.3713, 0.1937),
    DVec3::new(-0.2311, 1.0, 0.4127),
    DVec3::new(0.3119, -0.1709, 1.0),
    DVec3::new(-1.0, -0.6173, 0.2851),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;

    fn unit_cube() -> MeshAabbTree<TriangleMesh> {
        MeshAabbTree::new(TriangleMesh::axis_box(DVec3::ZERO, DVec3::ONE)).unwrap()
    }

    #[test]
    fn nearest_from_above_is_top_face() {
        let tree = unit_cube();
        let n = tree
            .find_nearest_point(DVec3::new(0.5, 0.5, 2.0), f64::INFINITY)
            .unwrap()
            .unwrap();
        assert!(n.triangle == 10 || n.triangle == 11);
        assert!((n.distance() - 1.0).abs() < 1e-12);
        assert!((n.point - DVec3::new(0.5, 0.5, 1.0)).length() < 1e-12);
    }

    #[test]
    fn nearest_respects_max_dist() {
        let tree = unit_cube();
        let p = DVec3::new(0.5, 0.5, 3.0);
        assert_eq!(tree.find_nearest_triangle(p, 1.5).unwrap(), None);
        assert!(tree.find_nearest_triangle(p, 2.5).unwrap().is_some());
    }

    #[test]
    fn ray_hits_front_face_first() {
        let tree = unit_cube();
        let ray = Ray3::new(DVec3::new(-1.0, 0.3, 0.6), DVec3::X);
        let hit = tree.find_nearest_hit(&ray, f64::INFINITY).unwrap().unwrap();
        assert!(hit.triangle == 0 || hit.triangle == 1);
        assert!((hit.t - 1.0).abs() < 1e-12);
        let all = tree.find_all_hits(&ray, f64::INFINITY).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].triangle, hit.triangle);
        assert!((all[1].t - 2.0).abs() < 1e-12);
        assert_eq!(tree.count_hit_triangles(&ray, 1.5).unwrap(), 1);
    }

    #[test]
    fn unnormalized_ray_is_rejected() {
        let tree = unit_cube();
        let ray = Ray3::new(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0));
        assert!(matches!(
            tree.find_nearest_hit_triangle(&ray, f64::INFINITY),
            Err(TreeError::RayNotNormalized { .. })
        ));
        assert!(tree.find_all_hit_triangles(&ray, f64::INFINITY).is_err());
    }

    #[test]
    fn inside_outside_parity() {
        let tree = unit_cube();
        let inside = DVec3::new(0.3, 0.6, 0.45);
        assert!(tree.is_inside(inside).unwrap());
        assert!(tree.is_inside_along(inside, Axis::Y).unwrap());
        assert!(tree.is_inside_along(inside, Axis::Z).unwrap());
        assert!(!tree.is_inside(DVec3::new(1.7, 0.6, 0.45)).unwrap());
        assert!(!tree.is_inside(DVec3::new(-0.7, 0.6, 0.45)).unwrap());
    }

    #[test]
    fn parity_survives_shared_diagonals() {
        let tree = unit_cube();
        // Casts from these points run through the face diagonals.
        for p in [DVec3::splat(0.5), DVec3::splat(0.3), DVec3::new(0.7, 0.2, 0.2)] {
            for axis in Axis::ALL {
                assert!(tree.is_inside_along(p, axis).unwrap(), "{p} along {axis:?}");
            }
        }
        for axis in Axis::ALL {
            assert!(!tree.is_inside_along(DVec3::new(-0.5, 0.5, 0.5), axis).unwrap());
            assert!(!tree.is_inside_along(DVec3::splat(1.5), axis).unwrap());
        }
        let ray = Ray3::along_axis(DVec3::splat(0.5), Axis::X);
        let (hits, on_edge) = tree.parity_cast(&ray);
        assert_eq!(hits, 2);
        assert!(on_edge);
    }

    #[test]
    fn negative_max_dist_finds_nothing() {
        let tree = unit_cube();
        let p = DVec3::new(0.5, 0.5, 1.5);
        assert!(tree.find_nearest_triangle(p, 1.0).unwrap().is_some());
        assert_eq!(tree.find_nearest_triangle(p, -1.0).unwrap(), None);
        let ray = Ray3::new(DVec3::new(-1.0, 0.3, 0.6), DVec3::X);
        assert_eq!(tree.find_nearest_hit_triangle(&ray, -5.0).unwrap(), None);
        assert_eq!(tree.count_hit_triangles(&ray, -5.0).unwrap(), 0);
    }

    #[test]
    fn filter_hides_triangles() {
        let mut tree = unit_cube();
        tree.set_triangle_filter(|t| t != 10 && t != 11);
        let n = tree
            .find_nearest_triangle(DVec3::new(0.5, 0.5, 2.0), 1.05)
            .unwrap();
        assert_eq!(n, None);
    }
}
