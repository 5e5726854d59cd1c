// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layered pairwise clustering for bottom-up builds.
//!
//! Each round sorts the current layer by box minimum along X, groups the
//! entries into pairs (plus at most one pass-through single), and appends
//! one parent per group. Rounds repeat until a single root remains.

use tracing::{debug, trace};

use crate::config::{BuildOptions, ClusterPolicy};
use crate::store::{ChildRef, StoreBuilder};
use crate::types::Aabb3;

/// Layers at least this large compute parent boxes on the rayon pool.
#[cfg(feature = "parallel")]
const PARALLEL_LAYER_MIN: usize = 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Group {
    Pair(usize, usize),
    Single(usize),
}

type Entry = (ChildRef, Aabb3);

/// Cluster `layer` into a tree and return its root.
pub(super) fn cluster_layers(
    builder: &mut StoreBuilder,
    layer: Vec<ChildRef>,
    options: &BuildOptions,
) -> Option<ChildRef> {
    let mut layer = layer;
    let mut round = 0_usize;
    while layer.len() > 1 {
        let mut entries: Vec<Entry> = layer.iter().map(|&c| (c, builder.bounds(c))).collect();
        entries.sort_by(|a, b| a.1.min.x.total_cmp(&b.1.min.x));

        let groups = group_layer(&entries, options);
        let bounds = group_bounds(&entries, &groups);
        layer = groups
            .iter()
            .zip(bounds)
            .map(|(g, b)| match *g {
                Group::Pair(i, j) => builder.push_pair_with_bounds(entries[i].0, entries[j].0, b),
                Group::Single(i) => builder.push_single(entries[i].0),
            })
            .collect();
        trace!(round, width = layer.len(), "clustered layer");
        round += 1;
    }
    layer.first().copied()
}

fn group_layer(entries: &[Entry], options: &BuildOptions) -> Vec<Group> {
    match options.cluster_policy {
        ClusterPolicy::Fastest => pair_sequential(entries.len()),
        ClusterPolicy::FastVolumeMetric => pair_lookahead(entries, options.cluster_lookahead),
        ClusterPolicy::MinimalVolume if entries.len() > options.minimal_volume_layer_limit => {
            debug!(
                width = entries.len(),
                limit = options.minimal_volume_layer_limit,
                "layer too wide for full pair table, using lookahead pairing"
            );
            pair_lookahead(entries, options.cluster_lookahead)
        }
        ClusterPolicy::MinimalVolume => pair_minimal(entries),
    }
}

fn pair_sequential(n: usize) -> Vec<Group> {
    let mut groups: Vec<Group> = (0..n / 2).map(|k| Group::Pair(2 * k, 2 * k + 1)).collect();
    if n % 2 == 1 {
        groups.push(Group::Single(n - 1));
    }
    groups
}

fn union_volume(a: &Entry, b: &Entry) -> f64 {
    a.1.union(&b.1).volume()
}

/// Each unpaired entry scans the next `lookahead` unpaired entries and takes
/// the one giving the smallest union volume.
fn pair_lookahead(entries: &[Entry], lookahead: usize) -> Vec<Group> {
    let n = entries.len();
    let mut paired = vec![false; n];
    let mut groups = Vec::with_capacity(n / 2 + 1);
    for i in 0..n {
        if paired[i] {
            continue;
        }
        paired[i] = true;
        let best = (i + 1..n)
            .filter(|&j| !paired[j])
            .take(lookahead.max(1))
            .map(|j| (j, union_volume(&entries[i], &entries[j])))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((j, _)) => {
                paired[j] = true;
                groups.push(Group::Pair(i, j));
            }
            None => groups.push(Group::Single(i)),
        }
    }
    groups
}

/// Greedy global pairing: take candidate pairs in order of increasing union
/// volume, skipping any that reuse an entry.
fn pair_minimal(entries: &[Entry]) -> Vec<Group> {
    let n = entries.len();
    let mut candidates = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            candidates.push((union_volume(&entries[i], &entries[j]), i, j));
        }
    }
    candidates.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut paired = vec![false; n];
    let mut groups = Vec::with_capacity(n / 2 + 1);
    for (_, i, j) in candidates {
        if !paired[i] && !paired[j] {
            paired[i] = true;
            paired[j] = true;
            groups.push(Group::Pair(i, j));
        }
    }
    if let Some(i) = paired.iter().position(|p| !p) {
        groups.push(Group::Single(i));
    }
    groups
}

fn group_bound(entries: &[Entry], group: &Group) -> Aabb3 {
    match *group {
        Group::Pair(i, j) => entries[i].1.union(&entries[j].1),
        Group::Single(i) => entries[i].1,
    }
}

#[cfg(feature = "parallel")]
fn group_bounds(entries: &[Entry], groups: &[Group]) -> Vec<Aabb3> {
    use rayon::prelude::*;

    if groups.len() >= PARALLEL_LAYER_MIN {
        groups.par_iter().map(|g| group_bound(entries, g)).collect()
    } else {
        groups.iter().map(|g| group_bound(entries, g)).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn group_bounds(entries: &[Entry], groups: &[Group]) -> Vec<Aabb3> {
    groups.iter().map(|g| group_bound(entries, g)).collect()
}
