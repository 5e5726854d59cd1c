// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generic depth-first traversal, plus the statistics and validation built on it.

use core::fmt;

use crate::build::is_indexable;
use crate::error::{Result, TreeError};
use crate::mesh::MeshAdapter;
use crate::store::NodeIdx;
use crate::tree::MeshAabbTree;
use crate::types::Aabb3;

/// Callbacks for [`MeshAabbTree::do_traversal`].
pub trait TreeVisitor {
    /// Called for every node, leaves included, before its contents.
    ///
    /// The root has depth 0. Return `false` to skip the subtree.
    fn enter_box(&mut self, bounds: &Aabb3, depth: usize) -> bool {
        let _ = (bounds, depth);
        true
    }

    /// Called for every triangle of a leaf that was entered.
    fn visit_triangle(&mut self, triangle: usize);
}

/// A [`TreeVisitor`] made of two closures.
///
/// ```
/// use glam::DVec3;
/// use understory_mesh_index::{MeshAabbTree, TraversalFns, TriangleMesh};
///
/// let tree = MeshAabbTree::new(TriangleMesh::axis_box(DVec3::ZERO, DVec3::ONE)).unwrap();
/// let mut count = 0;
/// tree.do_traversal(&mut TraversalFns::new(|_, _| true, |_| count += 1)).unwrap();
/// assert_eq!(count, 12);
/// ```
pub struct TraversalFns<B, T> {
    enter: B,
    triangle: T,
}

impl<B, T> TraversalFns<B, T>
where
    B: FnMut(&Aabb3, usize) -> bool,
    T: FnMut(usize),
{
    /// Wrap a box predicate and a triangle callback.
    pub fn new(enter: B, triangle: T) -> Self {
        Self { enter, triangle }
    }
}

impl<B, T> fmt::Debug for TraversalFns<B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraversalFns").finish_non_exhaustive()
    }
}

impl<B, T> TreeVisitor for TraversalFns<B, T>
where
    B: FnMut(&Aabb3, usize) -> bool,
    T: FnMut(usize),
{
    fn enter_box(&mut self, bounds: &Aabb3, depth: usize) -> bool {
        (self.enter)(bounds, depth)
    }

    fn visit_triangle(&mut self, triangle: usize) {
        (self.triangle)(triangle);
    }
}

/// Shape summary of a built tree.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TreeStats {
    /// All nodes, leaves included.
    pub nodes: usize,
    /// Leaf nodes.
    pub leaves: usize,
    /// Triangles stored in leaves.
    pub triangles: usize,
    /// Depth of the deepest node; the root is at 0.
    pub max_depth: usize,
    /// Most triangles in one leaf.
    pub max_leaf_size: usize,
    /// Sum of node box volumes.
    pub total_volume: f64,
    /// Sum of node box half-extent sums.
    pub total_extent_sum: f64,
}

impl<M: MeshAdapter> MeshAabbTree<M> {
    /// Walk the tree depth first, left child before right.
    pub fn do_traversal(&self, visitor: &mut impl TreeVisitor) -> Result<()> {
        self.check_fresh()?;
        if let Some(root) = self.store.root() {
            self.walk(root, 0, visitor);
        }
        Ok(())
    }

    fn walk(&self, idx: NodeIdx, depth: usize, visitor: &mut impl TreeVisitor) {
        if !visitor.enter_box(self.store.bounds(idx), depth) {
            return;
        }
        for &tid in self.store.leaf_triangles(idx) {
            visitor.visit_triangle(tid);
        }
        for child in self.store.node(idx).children() {
            self.walk(child, depth + 1, visitor);
        }
    }

    /// Sum of the volumes of every node box. Lower is tighter.
    pub fn total_volume(&self) -> Result<f64> {
        let mut total = 0.0;
        self.do_traversal(&mut TraversalFns::new(
            |b: &Aabb3, _| {
                total += b.volume();
                true
            },
            |_| {},
        ))?;
        Ok(total)
    }

    /// Sum of the half-extent sums of every node box. Unlike
    /// [`total_volume`](Self::total_volume) this stays informative for flat meshes.
    pub fn total_extent_sum(&self) -> Result<f64> {
        let mut total = 0.0;
        self.do_traversal(&mut TraversalFns::new(
            |b: &Aabb3, _| {
                total += b.extent_sum();
                true
            },
            |_| {},
        ))?;
        Ok(total)
    }

    /// Node counts, depth, and box metrics.
    pub fn stats(&self) -> Result<TreeStats> {
        self.check_fresh()?;
        let mut stats = TreeStats::default();
        let Some(root) = self.store.root() else {
            return Ok(stats);
        };
        let mut stack = vec![(root, 0_usize)];
        while let Some((idx, depth)) = stack.pop() {
            let b = self.store.bounds(idx);
            stats.nodes += 1;
            stats.max_depth = stats.max_depth.max(depth);
            stats.total_volume += b.volume();
            stats.total_extent_sum += b.extent_sum();
            if self.store.is_leaf(idx) {
                let n = self.store.leaf_triangles(idx).len();
                stats.leaves += 1;
                stats.triangles += n;
                stats.max_leaf_size = stats.max_leaf_size.max(n);
            }
            stack.extend(self.store.node(idx).children().map(|c| (c, depth + 1)));
        }
        Ok(stats)
    }

    /// Check the structural invariants of the tree against the mesh.
    ///
    /// - every live triangle with finite geometry is reachable exactly once,
    /// - every leaf entry is a live triangle,
    /// - every vertex of a triangle lies inside each ancestor box, within
    ///   the build's `box_epsilon`.
    pub fn validate(&self) -> Result<()> {
        let mut v = Validator {
            tree: self,
            ancestors: Vec::new(),
            seen: vec![false; self.mesh().max_triangle_id()],
            error: None,
        };
        self.do_traversal(&mut v)?;
        if let Some(e) = v.error {
            return Err(e);
        }
        let mesh = self.mesh();
        for tid in mesh.triangle_ids() {
            if is_indexable(mesh, tid) && !v.seen[tid] {
                return Err(TreeError::Uncovered { triangle: tid });
            }
        }
        Ok(())
    }
}

struct Validator<'t, M> {
    tree: &'t MeshAabbTree<M>,
    ancestors: Vec<Aabb3>,
    seen: Vec<bool>,
    error: Option<TreeError>,
}

impl<M: MeshAdapter> TreeVisitor for Validator<'_, M> {
    fn enter_box(&mut self, bounds: &Aabb3, depth: usize) -> bool {
        self.ancestors.truncate(depth);
        self.ancestors.push(*bounds);
        self.error.is_none()
    }

    fn visit_triangle(&mut self, triangle: usize) {
        if self.error.is_some() {
            return;
        }
        let mesh = self.tree.mesh();
        if !mesh.is_triangle(triangle) || triangle >= self.seen.len() {
            self.error = Some(TreeError::UnknownTriangle { triangle });
            return;
        }
        if core::mem::replace(&mut self.seen[triangle], true) {
            self.error = Some(TreeError::DuplicateTriangle { triangle });
            return;
        }
        let eps = self.tree.options().box_epsilon;
        let verts = mesh.triangle_vertices(triangle);
        for (depth, b) in self.ancestors.iter().enumerate() {
            if !verts.iter().all(|p| b.contains_point_eps(*p, eps)) {
                self.error = Some(TreeError::VertexOutsideBox { triangle, depth });
                return;
            }
        }
    }
}
