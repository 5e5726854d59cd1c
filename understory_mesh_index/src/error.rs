// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for tree construction, queries, and validation.

use thiserror::Error;

/// Errors reported by [`MeshAabbTree`](crate::MeshAabbTree) and [`TriangleMesh`](crate::TriangleMesh).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// The mesh changed since the tree was built.
    #[error("tree is stale: built at mesh timestamp {built}, mesh is now at {current}")]
    Stale {
        /// Timestamp recorded at build time.
        built: u64,
        /// Current mesh timestamp.
        current: u64,
    },

    /// A ray query was given a direction that is not unit length.
    #[error("ray direction must be normalized (length {length})")]
    RayNotNormalized {
        /// Length of the offending direction.
        length: f64,
    },

    /// Build options are out of range.
    #[error("invalid build options: {message}")]
    InvalidOptions {
        /// Description of the problem.
        message: &'static str,
    },

    /// A triangle referenced a vertex id that does not exist.
    #[error("vertex {vertex} does not exist")]
    InvalidVertex {
        /// The missing vertex id.
        vertex: usize,
    },

    /// Validation: a live triangle with finite geometry is not in any leaf.
    #[error("triangle {triangle} is not reachable from the root")]
    Uncovered {
        /// The unreachable triangle.
        triangle: usize,
    },

    /// Validation: a triangle appears in more than one leaf slot.
    #[error("triangle {triangle} is stored more than once")]
    DuplicateTriangle {
        /// The repeated triangle.
        triangle: usize,
    },

    /// Validation: a leaf refers to an id the mesh does not consider a triangle.
    #[error("leaf refers to unknown triangle {triangle}")]
    UnknownTriangle {
        /// The unknown id.
        triangle: usize,
    },

    /// Validation: a triangle vertex lies outside an ancestor box.
    #[error("triangle {triangle} leaves its ancestor box at depth {depth}")]
    VertexOutsideBox {
        /// The offending triangle.
        triangle: usize,
        /// Depth of the ancestor whose box does not contain it.
        depth: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = TreeError> = core::result::Result<T, E>;
