// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recursive spatial-median and midpoint splitting.

use glam::DVec3;

use super::{is_indexable, leaf_bounds, report_dropped};
use crate::config::BuildOptions;
use crate::mesh::MeshAdapter;
use crate::store::{ChildRef, NodeStore, StoreBuilder};
use crate::types::Axis;

/// Where a top-down split falls along the current axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SplitRule {
    /// Midpoint of the centroid interval.
    Midpoint,
    /// Median centroid.
    Median,
}

type Item = (usize, DVec3);

struct Ctx<'m, M: ?Sized> {
    mesh: &'m M,
    rule: SplitRule,
    leaf_max: usize,
    eps: f64,
}

pub(super) fn build<M: MeshAdapter + ?Sized>(
    mesh: &M,
    options: &BuildOptions,
    rule: SplitRule,
) -> NodeStore {
    let mut items: Vec<Item> = Vec::with_capacity(mesh.max_triangle_id());
    let mut dropped = 0;
    for tid in mesh.triangle_ids() {
        if is_indexable(mesh, tid) {
            items.push((tid, mesh.triangle_centroid(tid)));
        } else {
            dropped += 1;
        }
    }
    report_dropped(dropped);

    let ctx = Ctx {
        mesh,
        rule,
        leaf_max: options.leaf_max_tri_count.max(2),
        eps: options.box_epsilon,
    };
    let mut builder = StoreBuilder::with_capacity(items.len());
    let root = (!items.is_empty()).then(|| split(&ctx, &mut builder, &mut items, 0));
    builder.finish(root)
}

fn split<M: MeshAdapter + ?Sized>(
    ctx: &Ctx<'_, M>,
    builder: &mut StoreBuilder,
    items: &mut [Item],
    depth: usize,
) -> ChildRef {
    if items.len() < ctx.leaf_max {
        let tris: Vec<usize> = items.iter().map(|(t, _)| *t).collect();
        let bounds = leaf_bounds(ctx.mesh, &tris, ctx.eps);
        return builder.push_leaf(&tris, bounds);
    }
    let axis = Axis::cycle(depth).index();
    let mid = match ctx.rule {
        SplitRule::Midpoint => partition_midpoint(items, axis),
        SplitRule::Median => partition_median(items, axis),
    };
    let (lo, hi) = items.split_at_mut(mid);
    let left = split(ctx, builder, lo, depth + 1);
    let right = split(ctx, builder, hi, depth + 1);
    builder.push_pair(left, right)
}

/// Partition around the midpoint of the centroid interval on `axis`.
///
/// Returns the split position; falls back to `n / 2` when the interval is
/// degenerate or one side would be empty.
fn partition_midpoint(items: &mut [Item], axis: usize) -> usize {
    let n = items.len();
    let (lo, hi) = items
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, c)| {
            (lo.min(c[axis]), hi.max(c[axis]))
        });
    if hi <= lo {
        return n / 2;
    }
    let mid = 0.5 * (lo + hi);
    let (mut i, mut j) = (0, n);
    while i < j {
        if items[i].1[axis] < mid {
            i += 1;
        } else {
            j -= 1;
            items.swap(i, j);
        }
    }
    if i == 0 || i == n { n / 2 } else { i }
}

fn partition_median(items: &mut [Item], axis: usize) -> usize {
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| a.1[axis].total_cmp(&b.1[axis]));
    mid
}
