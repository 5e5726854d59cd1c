// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bottom-up construction: one-ring leaves, then layered clustering.

use tracing::debug;

use super::{cluster, is_indexable, leaf_bounds, report_dropped};
use crate::config::BuildOptions;
use crate::mesh::MeshAdapter;
use crate::store::{ChildRef, NodeStore, StoreBuilder};

struct Seeder<'m, M: ?Sized> {
    mesh: &'m M,
    claimed: Vec<bool>,
    ring: Vec<usize>,
    free: Vec<usize>,
    eps: f64,
}

impl<M: MeshAdapter + ?Sized> Seeder<'_, M> {
    /// Collect the unclaimed triangles around `vid` into `self.free`.
    fn gather(&mut self, vid: usize) {
        self.ring.clear();
        self.mesh.vertex_triangles(vid, &mut self.ring);
        self.free.clear();
        let claimed = &self.claimed;
        self.free.extend(
            self.ring
                .iter()
                .copied()
                .filter(|&t| t < claimed.len() && !claimed[t]),
        );
        self.free.sort_unstable();
        self.free.dedup();
    }

    /// Claim `self.free` as a new leaf.
    fn emit(&mut self, builder: &mut StoreBuilder) -> ChildRef {
        for &t in &self.free {
            self.claimed[t] = true;
        }
        let bounds = leaf_bounds(self.mesh, &self.free, self.eps);
        builder.push_leaf(&self.free, bounds)
    }
}

pub(super) fn build<M: MeshAdapter + ?Sized>(mesh: &M, options: &BuildOptions) -> NodeStore {
    let max_tid = mesh.max_triangle_id();
    // Dead ids and non-finite triangles start out claimed so no leaf takes them.
    let mut claimed = vec![true; max_tid];
    let mut dropped = 0;
    for tid in mesh.triangle_ids() {
        if is_indexable(mesh, tid) {
            claimed[tid] = false;
        } else {
            dropped += 1;
        }
    }
    report_dropped(dropped);

    let mut seeder = Seeder {
        mesh,
        claimed,
        ring: Vec::new(),
        free: Vec::new(),
        eps: options.box_epsilon,
    };
    let mut builder = StoreBuilder::with_capacity(max_tid);
    let mut layer = Vec::new();

    // Seed leaves from one-rings with at least three free triangles.
    let mut spill = Vec::new();
    for vid in mesh.vertex_ids() {
        seeder.gather(vid);
        if seeder.free.len() >= 3 {
            layer.push(seeder.emit(&mut builder));
        } else {
            spill.push(vid);
        }
    }

    // Deferred vertices take whatever is left around them.
    for vid in spill {
        seeder.gather(vid);
        if !seeder.free.is_empty() {
            layer.push(seeder.emit(&mut builder));
        }
    }

    // Triangles the one-rings never mentioned.
    let orphans: Vec<usize> = (0..max_tid).filter(|&t| !seeder.claimed[t]).collect();
    if !orphans.is_empty() {
        debug!(count = orphans.len(), "triangles missing from vertex one-rings");
        for chunk in orphans.chunks(options.leaf_max_tri_count.max(2) - 1) {
            seeder.free.clear();
            seeder.free.extend_from_slice(chunk);
            layer.push(seeder.emit(&mut builder));
        }
    }

    let root = cluster::cluster_layers(&mut builder, layer, options);
    builder.finish(root)
}
