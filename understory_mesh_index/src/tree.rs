// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`MeshAabbTree`] facade: build, rebuild, and staleness tracking.

use core::fmt;
use std::sync::Arc;

use tracing::{debug, debug_span, trace};

use crate::build::build_store;
use crate::config::BuildOptions;
use crate::error::{Result, TreeError};
use crate::geometry::Triangle;
use crate::mesh::MeshAdapter;
use crate::store::NodeStore;

/// Predicate deciding which triangles point and ray queries may return.
pub type TriangleFilter = Arc<dyn Fn(usize) -> bool + Send + Sync>;

/// Bounding-box hierarchy over the triangles of a mesh.
///
/// The tree owns its mesh adapter `M`. Pass `&TriangleMesh` or
/// `Arc<TriangleMesh>` to share a mesh, or move the mesh in and edit it through
/// [`mesh_mut`](Self::mesh_mut).
///
/// The tree is a snapshot: it records the mesh's
/// [`shape_timestamp`](MeshAdapter::shape_timestamp) when built, and every query
/// fails with [`TreeError::Stale`] once the mesh has moved on. Call
/// [`rebuild`](Self::rebuild) to refresh it; there are no incremental updates.
///
/// ```
/// use glam::DVec3;
/// use understory_mesh_index::{MeshAabbTree, TreeError, TriangleMesh};
///
/// let mut tree = MeshAabbTree::new(TriangleMesh::axis_box(DVec3::ZERO, DVec3::ONE)).unwrap();
/// tree.mesh_mut().translate(DVec3::X);
/// assert!(matches!(
///     tree.find_nearest_triangle(DVec3::ZERO, f64::INFINITY),
///     Err(TreeError::Stale { .. })
/// ));
/// tree.rebuild();
/// assert!(tree.find_nearest_triangle(DVec3::ZERO, f64::INFINITY).unwrap().is_some());
/// ```
pub struct MeshAabbTree<M> {
    mesh: M,
    options: BuildOptions,
    pub(crate) store: NodeStore,
    built_timestamp: u64,
    filter: Option<TriangleFilter>,
}

impl<M> fmt::Debug for MeshAabbTree<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshAabbTree")
            .field("options", &self.options)
            .field("nodes", &self.store.node_count())
            .field("leaves", &self.store.leaf_count())
            .field("triangles", &self.store.triangle_count())
            .field("built_timestamp", &self.built_timestamp)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

fn build_logged<M: MeshAdapter + ?Sized>(mesh: &M, options: &BuildOptions) -> NodeStore {
    let _span = debug_span!(
        "build",
        strategy = ?options.strategy,
        policy = ?options.cluster_policy
    )
    .entered();
    let store = build_store(mesh, options);
    debug!(
        nodes = store.node_count(),
        leaves = store.leaf_count(),
        triangles = store.triangle_count(),
        "built mesh AABB tree"
    );
    store
}

impl<M: MeshAdapter> MeshAabbTree<M> {
    /// Build with [`BuildOptions::default`].
    pub fn new(mesh: M) -> Result<Self> {
        Self::build(mesh, BuildOptions::default())
    }

    /// Build a tree over `mesh`.
    pub fn build(mesh: M, options: BuildOptions) -> Result<Self> {
        options.validate()?;
        let built_timestamp = mesh.shape_timestamp();
        let store = build_logged(&mesh, &options);
        Ok(Self {
            mesh,
            options,
            store,
            built_timestamp,
            filter: None,
        })
    }

    /// Rebuild from scratch with the current options.
    pub fn rebuild(&mut self) {
        self.built_timestamp = self.mesh.shape_timestamp();
        self.store = build_logged(&self.mesh, &self.options);
    }

    /// Rebuild from scratch with new options.
    pub fn rebuild_with(&mut self, options: BuildOptions) -> Result<()> {
        options.validate()?;
        self.options = options;
        self.rebuild();
        Ok(())
    }

    /// The indexed mesh.
    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    /// Mutable access to the mesh. Edits that bump its timestamp make the
    /// tree stale.
    pub fn mesh_mut(&mut self) -> &mut M {
        &mut self.mesh
    }

    /// Give the mesh back.
    pub fn into_mesh(self) -> M {
        self.mesh
    }

    /// Options used for the current build.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Mesh timestamp recorded at the last build.
    pub fn built_timestamp(&self) -> u64 {
        self.built_timestamp
    }

    /// Whether the mesh changed since the last build.
    pub fn is_stale(&self) -> bool {
        self.mesh.shape_timestamp() != self.built_timestamp
    }

    /// Whether the tree holds no triangles.
    pub fn is_empty(&self) -> bool {
        self.store.root().is_none()
    }

    /// Hide triangles rejected by `filter` from point and ray queries.
    ///
    /// The tree is not rebuilt; filtered triangles are skipped at the leaves.
    pub fn set_triangle_filter(&mut self, filter: impl Fn(usize) -> bool + Send + Sync + 'static) {
        self.filter = Some(Arc::new(filter));
    }

    /// Remove the triangle filter.
    pub fn clear_triangle_filter(&mut self) {
        self.filter = None;
    }

    pub(crate) fn check_fresh(&self) -> Result<()> {
        let current = self.mesh.shape_timestamp();
        if current == self.built_timestamp {
            Ok(())
        } else {
            trace!(built = self.built_timestamp, current, "rejecting query on stale tree");
            Err(TreeError::Stale {
                built: self.built_timestamp,
                current,
            })
        }
    }

    pub(crate) fn accepts(&self, tid: usize) -> bool {
        self.filter.as_ref().is_none_or(|f| (**f)(tid))
    }

    pub(crate) fn triangle(&self, tid: usize) -> Triangle {
        self.mesh.triangle_vertices(tid)
    }
}
