// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mesh adapter trait and a small indexed triangle mesh.

use std::sync::Arc;

use glam::DVec3;
use smallvec::SmallVec;

use crate::error::{Result, TreeError};
use crate::types::Aabb3;

/// Read access to a triangle mesh, as needed by [`MeshAabbTree`](crate::MeshAabbTree).
///
/// Triangle and vertex ids are sparse: ids below [`max_triangle_id`] /
/// [`max_vertex_id`] may be unused, which [`is_triangle`] / [`is_vertex`]
/// report. Position lookups are only made for valid ids.
///
/// [`shape_timestamp`] must change whenever positions or connectivity change;
/// the tree compares it against the value recorded at build time.
///
/// [`max_triangle_id`]: MeshAdapter::max_triangle_id
/// [`max_vertex_id`]: MeshAdapter::max_vertex_id
/// [`is_triangle`]: MeshAdapter::is_triangle
/// [`is_vertex`]: MeshAdapter::is_vertex
/// [`shape_timestamp`]: MeshAdapter::shape_timestamp
pub trait MeshAdapter {
    /// Exclusive upper bound on triangle ids.
    fn max_triangle_id(&self) -> usize;

    /// Exclusive upper bound on vertex ids.
    fn max_vertex_id(&self) -> usize;

    /// Whether `tid` refers to a live triangle.
    fn is_triangle(&self, tid: usize) -> bool;

    /// Whether `vid` refers to a live vertex.
    fn is_vertex(&self, vid: usize) -> bool;

    /// The three vertex positions of a live triangle.
    fn triangle_vertices(&self, tid: usize) -> [DVec3; 3];

    /// Append the ids of the triangles incident to vertex `vid` (its one-ring) to `out`.
    fn vertex_triangles(&self, vid: usize, out: &mut Vec<usize>);

    /// Modification counter for geometry and connectivity.
    fn shape_timestamp(&self) -> u64;

    /// Bounding box of a live triangle.
    fn triangle_bounds(&self, tid: usize) -> Aabb3 {
        Aabb3::from_triangle(&self.triangle_vertices(tid))
    }

    /// Centroid of a live triangle.
    fn triangle_centroid(&self, tid: usize) -> DVec3 {
        let [a, b, c] = self.triangle_vertices(tid);
        (a + b + c) / 3.0
    }

    /// Iterate live triangle ids in increasing order.
    fn triangle_ids<'a>(&'a self) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new((0..self.max_triangle_id()).filter(move |&t| self.is_triangle(t)))
    }

    /// Iterate live vertex ids in increasing order.
    fn vertex_ids<'a>(&'a self) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new((0..self.max_vertex_id()).filter(move |&v| self.is_vertex(v)))
    }
}

macro_rules! forward_mesh_adapter {
    ($($ty:ty),*) => {$(
        impl<M: MeshAdapter + ?Sized> MeshAdapter for $ty {
            fn max_triangle_id(&self) -> usize {
                (**self).max_triangle_id()
            }
            fn max_vertex_id(&self) -> usize {
                (**self).max_vertex_id()
            }
            fn is_triangle(&self, tid: usize) -> bool {
                (**self).is_triangle(tid)
            }
            fn is_vertex(&self, vid: usize) -> bool {
                (**self).is_vertex(vid)
            }
            fn triangle_vertices(&self, tid: usize) -> [DVec3; 3] {
                (**self).triangle_vertices(tid)
            }
            fn vertex_triangles(&self, vid: usize, out: &mut Vec<usize>) {
                (**self).vertex_triangles(vid, out);
            }
            fn shape_timestamp(&self) -> u64 {
                (**self).shape_timestamp()
            }
            fn triangle_bounds(&self, tid: usize) -> Aabb3 {
                (**self).triangle_bounds(tid)
            }
            fn triangle_centroid(&self, tid: usize) -> DVec3 {
                (**self).triangle_centroid(tid)
            }
            fn triangle_ids<'a>(&'a self) -> Box<dyn Iterator<Item = usize> + 'a> {
                (**self).triangle_ids()
            }
            fn vertex_ids<'a>(&'a self) -> Box<dyn Iterator<Item = usize> + 'a> {
                (**self).vertex_ids()
            }
        }
    )*};
}

forward_mesh_adapter!(&M, Arc<M>);

/// Indexed triangle mesh with sparse ids and vertex one-rings.
///
/// Every mutation bumps the shape timestamp, so trees built over the mesh
/// report [`TreeError::Stale`] until rebuilt.
#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
    vertices: Vec<Option<DVec3>>,
    triangles: Vec<Option<[usize; 3]>>,
    one_rings: Vec<SmallVec<[usize; 8]>>,
    timestamp: u64,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh from vertex positions and index triples.
    pub fn from_indexed(
        positions: impl IntoIterator<Item = DVec3>,
        triangles: impl IntoIterator<Item = [usize; 3]>,
    ) -> Result<Self> {
        let mut mesh = Self::new();
        for p in positions {
            mesh.append_vertex(p);
        }
        for tri in triangles {
            mesh.append_triangle(tri)?;
        }
        Ok(mesh)
    }

    /// Axis-aligned closed box with outward-facing triangles.
    ///
    /// Vertex `i` is the box corner whose bits 0/1/2 select max x/y/z.
    /// Triangles come in face pairs: -X, +X, -Y, +Y, -Z, +Z.
    pub fn axis_box(min: DVec3, max: DVec3) -> Self {
        let bounds = Aabb3::new(min, max);
        let corners = (0..8).map(|i| bounds.corner(i));
        const FACES: [[usize; 3]; 12] = [
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
        ];
        Self::from_indexed(corners, FACES).expect("box faces use existing corners")
    }

    /// Closed UV sphere with `slices` segments around Z and `stacks` bands
    /// from pole to pole. Counts are raised to at least 3 and 2.
    pub fn uv_sphere(center: DVec3, radius: f64, slices: usize, stacks: usize) -> Self {
        let slices = slices.max(3);
        let stacks = stacks.max(2);
        let mut mesh = Self::new();
        let north = mesh.append_vertex(center + DVec3::Z * radius);
        let mut rings = Vec::with_capacity(stacks - 1);
        for i in 1..stacks {
            let phi = core::f64::consts::PI * i as f64 / stacks as f64;
            let (sp, cp) = phi.sin_cos();
            let first = mesh.vertices.len();
            for j in 0..slices {
                let theta = core::f64::consts::TAU * j as f64 / slices as f64;
                let (st, ct) = theta.sin_cos();
                mesh.append_vertex(center + radius * DVec3::new(sp * ct, sp * st, cp));
            }
            rings.push(first);
        }
        let south = mesh.append_vertex(center - DVec3::Z * radius);

        let at = |ring: usize, j: usize| ring + j % slices;
        let mut faces = Vec::with_capacity(2 * slices * (stacks - 1));
        for j in 0..slices {
            faces.push([north, at(rings[0], j), at(rings[0], j + 1)]);
        }
        for w in rings.windows(2) {
            let (upper, lower) = (w[0], w[1]);
            for j in 0..slices {
                let (a, b) = (at(upper, j), at(upper, j + 1));
                let (c, d) = (at(lower, j), at(lower, j + 1));
                faces.push([a, c, d]);
                faces.push([a, d, b]);
            }
        }
        let last = rings[rings.len() - 1];
        for j in 0..slices {
            faces.push([south, at(last, j + 1), at(last, j)]);
        }
        for f in faces {
            mesh.append_triangle(f).expect("sphere faces use existing vertices");
        }
        mesh
    }

    fn touch(&mut self) {
        self.timestamp = self.timestamp.wrapping_add(1);
    }

    /// Add a vertex and return its id.
    pub fn append_vertex(&mut self, position: DVec3) -> usize {
        self.vertices.push(Some(position));
        self.one_rings.push(SmallVec::new());
        self.touch();
        self.vertices.len() - 1
    }

    /// Add a triangle and return its id.
    pub fn append_triangle(&mut self, tri: [usize; 3]) -> Result<usize> {
        if let Some(&vertex) = tri.iter().find(|&&v| !self.is_vertex(v)) {
            return Err(TreeError::InvalidVertex { vertex });
        }
        let tid = self.triangles.len();
        self.triangles.push(Some(tri));
        for v in tri {
            if !self.one_rings[v].contains(&tid) {
                self.one_rings[v].push(tid);
            }
        }
        self.touch();
        Ok(tid)
    }

    /// Remove a triangle. Returns `false` if it did not exist.
    ///
    /// The id is not reused.
    pub fn remove_triangle(&mut self, tid: usize) -> bool {
        let Some(tri) = self.triangles.get_mut(tid).and_then(Option::take) else {
            return false;
        };
        for v in tri {
            self.one_rings[v].retain(|t| *t != tid);
        }
        self.touch();
        true
    }

    /// Move a vertex.
    pub fn set_vertex(&mut self, vid: usize, position: DVec3) -> Result<()> {
        match self.vertices.get_mut(vid) {
            Some(Some(p)) => {
                *p = position;
                self.touch();
                Ok(())
            }
            _ => Err(TreeError::InvalidVertex { vertex: vid }),
        }
    }

    /// Move every vertex by `offset`.
    pub fn translate(&mut self, offset: DVec3) {
        for p in self.vertices.iter_mut().flatten() {
            *p += offset;
        }
        self.touch();
    }

    /// Position of a vertex.
    pub fn vertex(&self, vid: usize) -> Option<DVec3> {
        self.vertices.get(vid).copied().flatten()
    }

    /// Vertex ids of a triangle.
    pub fn triangle(&self, tid: usize) -> Option<[usize; 3]> {
        self.triangles.get(tid).copied().flatten()
    }

    /// Number of live vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.iter().flatten().count()
    }

    /// Number of live triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.iter().flatten().count()
    }

    /// Bounding box of all live vertices; [`Aabb3::EMPTY`] for an empty mesh.
    pub fn bounds(&self) -> Aabb3 {
        let mut b = Aabb3::EMPTY;
        for p in self.vertices.iter().flatten() {
            b.include_point(*p);
        }
        b
    }
}

impl MeshAdapter for TriangleMesh {
    fn max_triangle_id(&self) -> usize {
        self.triangles.len()
    }

    fn max_vertex_id(&self) -> usize {
        self.vertices.len()
    }

    fn is_triangle(&self, tid: usize) -> bool {
        matches!(self.triangles.get(tid), Some(Some(_)))
    }

    fn is_vertex(&self, vid: usize) -> bool {
        matches!(self.vertices.get(vid), Some(Some(_)))
    }

    /// Removed or unknown triangles resolve to NaN positions, which every
    /// geometric test treats as a miss.
    fn triangle_vertices(&self, tid: usize) -> [DVec3; 3] {
        match self.triangle(tid) {
            Some(ids) => ids.map(|v| self.vertex(v).unwrap_or(DVec3::NAN)),
            None => [DVec3::NAN; 3],
        }
    }

    fn vertex_triangles(&self, vid: usize, out: &mut Vec<usize>) {
        if let Some(ring) = self.one_rings.get(vid) {
            out.extend_from_slice(ring);
        }
    }

    fn shape_timestamp(&self) -> u64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_box_is_closed_and_outward() {
        let mesh = TriangleMesh::axis_box(DVec3::ZERO, DVec3::ONE);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        let center = DVec3::splat(0.5);
        for tid in mesh.triangle_ids() {
            let [a, b, c] = mesh.triangle_vertices(tid);
            let n = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(n.dot(centroid - center) > 0.0, "triangle {tid} faces inward");
        }
        // Corners on a face diagonal touch six triangles, the others four.
        for vid in mesh.vertex_ids() {
            let mut ring = Vec::new();
            mesh.vertex_triangles(vid, &mut ring);
            assert!((4..=6).contains(&ring.len()));
        }
    }

    #[test]
    fn sphere_is_outward() {
        let center = DVec3::new(1.0, -2.0, 0.5);
        let mesh = TriangleMesh::uv_sphere(center, 2.0, 12, 8);
        assert_eq!(mesh.triangle_count(), 2 * 12 * 7);
        for tid in mesh.triangle_ids() {
            let [a, b, c] = mesh.triangle_vertices(tid);
            let n = (b - a).cross(c - a);
            assert!(n.dot((a + b + c) / 3.0 - center) > 0.0);
        }
    }

    #[test]
    fn edits_bump_timestamp() {
        let mut mesh = TriangleMesh::axis_box(DVec3::ZERO, DVec3::ONE);
        let t0 = mesh.shape_timestamp();
        mesh.set_vertex(0, DVec3::splat(-0.1)).unwrap();
        assert!(mesh.shape_timestamp() != t0);
        let t1 = mesh.shape_timestamp();
        assert!(mesh.remove_triangle(3));
        assert!(!mesh.remove_triangle(3));
        assert!(mesh.shape_timestamp() != t1);
        assert!(!mesh.is_triangle(3));
        assert_eq!(mesh.triangle_ids().count(), 11);
        assert!(mesh.triangle_vertices(3)[0].is_nan());
    }

    #[test]
    fn rejects_missing_vertices() {
        let mut mesh = TriangleMesh::new();
        mesh.append_vertex(DVec3::ZERO);
        assert_eq!(
            mesh.append_triangle([0, 1, 2]),
            Err(TreeError::InvalidVertex { vertex: 1 })
        );
        assert_eq!(
            mesh.set_vertex(9, DVec3::ONE),
            Err(TreeError::InvalidVertex { vertex: 9 })
        );
    }

    #[test]
    fn adapters_forward_through_references() {
        let mesh = Arc::new(TriangleMesh::axis_box(DVec3::ZERO, DVec3::ONE));
        let by_ref: &TriangleMesh = &mesh;
        assert_eq!(MeshAdapter::max_triangle_id(&by_ref), 12);
        assert_eq!(mesh.triangle_ids().count(), 12);
        assert_eq!(
            mesh.triangle_centroid(0),
            by_ref.triangle_centroid(0)
        );
    }
}
