// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Mesh Index: an axis-aligned bounding-box tree over triangle meshes.
//!
//! Understory Mesh Index answers nearest-point, ray, containment, and
//! mesh-vs-mesh intersection queries over a large triangle mesh without
//! scanning every triangle.
//!
//! - Build with a top-down split ([`BuildStrategy::TopDownMidpoint`],
//!   [`BuildStrategy::TopDownMedian`]) or bottom-up from vertex one-rings
//!   ([`BuildStrategy::BottomUpFromOneRings`]) with a [`ClusterPolicy`].
//! - Query the nearest triangle or point, the first or every ray hit, and
//!   inside/outside by ray parity.
//! - Test or enumerate intersections with a triangle, another mesh, or
//!   another tree, optionally under a rigid or affine transform.
//! - Walk the hierarchy with a [`TreeVisitor`] for custom queries and metrics.
//!
//! Meshes are read through the [`MeshAdapter`] trait; [`TriangleMesh`] is a
//! small indexed implementation. A tree is a snapshot of its mesh: once the
//! mesh's shape timestamp moves, queries return [`TreeError::Stale`] until the
//! tree is rebuilt. There are no incremental updates.
//!
//! # Example
//!
//! ```rust
//! use glam::DVec3;
//! use understory_mesh_index::{BuildOptions, BuildStrategy, MeshAabbTree, Ray3, TriangleMesh};
//!
//! // Index a unit cube.
//! let cube = TriangleMesh::axis_box(DVec3::ZERO, DVec3::ONE);
//! let tree = MeshAabbTree::build(cube, BuildOptions::new(BuildStrategy::TopDownMedian)).unwrap();
//!
//! // The closest point to a probe above the cube is on the top face.
//! let nearest = tree
//!     .find_nearest_point(DVec3::new(0.5, 0.5, 2.0), f64::INFINITY)
//!     .unwrap()
//!     .unwrap();
//! assert!((nearest.distance() - 1.0).abs() < 1e-12);
//!
//! // A ray through the cube enters and leaves once.
//! let ray = Ray3::new(DVec3::new(-1.0, 0.3, 0.6), DVec3::X);
//! assert_eq!(tree.find_all_hit_triangles(&ray, f64::INFINITY).unwrap().len(), 2);
//! assert!(tree.is_inside(DVec3::new(0.3, 0.6, 0.45)).unwrap());
//! ```
//!
//! Two trees can be intersected directly:
//!
//! ```rust
//! use glam::DVec3;
//! use understory_mesh_index::{MeshAabbTree, TriangleMesh};
//!
//! let a = MeshAabbTree::new(TriangleMesh::axis_box(DVec3::ZERO, DVec3::ONE)).unwrap();
//! let b = MeshAabbTree::new(TriangleMesh::axis_box(
//!     DVec3::new(0.5, 0.1, 0.2),
//!     DVec3::new(1.5, 1.1, 1.2),
//! ))
//! .unwrap();
//! assert!(a.test_intersection_tree(&b, None).unwrap());
//! let found = a.find_intersections(&b, None).unwrap();
//! assert!(!found.segments.is_empty());
//! ```
//!
//! ## Choosing a strategy
//!
//! - `TopDownMidpoint` (default): fast to build, adapts to uneven triangle density.
//! - `TopDownMedian`: balanced depth regardless of distribution.
//! - `BottomUpFromOneRings`: leaves follow mesh connectivity; the cluster
//!   policy trades build time (`Fastest`) for tighter boxes (`MinimalVolume`).
//!
//! ### Float semantics
//!
//! Triangles whose vertices or centroid are not finite are left out of the
//! tree at build time and are never returned by queries.
//! `max_dist` bounds are exclusive.
//!
//! ## Features
//!
//! - `parallel` (default): compute bottom-up layer boxes on the rayon pool.

pub mod config;
pub mod error;
pub mod geometry;
pub mod intersect;
pub mod mesh;
pub mod query;
pub mod traverse;
pub mod tree;
pub mod types;

mod build;
mod store;

pub use config::{BuildOptions, BuildStrategy, ClusterPolicy};
pub use error::{Result, TreeError};
pub use geometry::Triangle;
pub use intersect::{IntersectionSet, PointIntersection, SegmentIntersection, TrianglePair};
pub use mesh::{MeshAdapter, TriangleMesh};
pub use query::{NearestPoint, RayHit};
pub use traverse::{TraversalFns, TreeStats, TreeVisitor};
pub use tree::{MeshAabbTree, TriangleFilter};
pub use types::{Aabb3, Axis, Ray3};
