// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree construction.
//!
//! All strategies produce the same [`NodeStore`] layout; they differ only in
//! how triangles are grouped into leaves and how leaves are paired.

mod bottom_up;
mod cluster;
mod top_down;

use tracing::warn;

use crate::config::{BuildOptions, BuildStrategy};
use crate::mesh::MeshAdapter;
use crate::store::NodeStore;
use crate::types::Aabb3;

use top_down::SplitRule;

/// Build a node store over every indexable triangle of `mesh`.
pub(crate) fn build_store<M: MeshAdapter + ?Sized>(mesh: &M, options: &BuildOptions) -> NodeStore {
    match options.strategy {
        BuildStrategy::TopDownMidpoint => top_down::build(mesh, options, SplitRule::Midpoint),
        BuildStrategy::TopDownMedian => top_down::build(mesh, options, SplitRule::Median),
        BuildStrategy::BottomUpFromOneRings => bottom_up::build(mesh, options),
    }
}

/// Whether a live triangle has finite geometry and so belongs in the tree.
///
/// Triangles failing this are left out of every leaf.
pub(crate) fn is_indexable<M: MeshAdapter + ?Sized>(mesh: &M, tid: usize) -> bool {
    mesh.triangle_vertices(tid).iter().all(|v| v.is_finite()) && mesh.triangle_centroid(tid).is_finite()
}

/// Leaf box: union of member triangle bounds, inflated by `eps`.
fn leaf_bounds<M: MeshAdapter + ?Sized>(mesh: &M, tris: &[usize], eps: f64) -> Aabb3 {
    tris.iter()
        .fold(Aabb3::EMPTY, |acc, &t| acc.union(&mesh.triangle_bounds(t)))
        .inflated(eps)
}

fn report_dropped(dropped: usize) {
    if dropped > 0 {
        warn!(dropped, "skipping triangles with non-finite geometry");
    }
}
