// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree-vs-tree queries and concurrent use.

use glam::{DAffine3, DVec3};
use rayon::prelude::*;
use understory_mesh_index::geometry::{tri_tri_distance, tri_tri_overlap};
use understory_mesh_index::{
    BuildOptions, BuildStrategy, ClusterPolicy, IntersectionSet, MeshAabbTree, MeshAdapter,
    TriangleMesh,
};

const OFFSET: DVec3 = DVec3::new(0.37, 0.21, 0.13);

fn sphere_pair() -> (TriangleMesh, TriangleMesh) {
    (
        TriangleMesh::uv_sphere(DVec3::ZERO, 1.0, 18, 11),
        TriangleMesh::uv_sphere(OFFSET, 0.9, 15, 9),
    )
}

/// Segments longer than `min_len`, keyed by (triangle of A, triangle of B).
fn long_segments(set: &IntersectionSet, swap: bool, min_len: f64) -> Vec<((usize, usize), DVec3, DVec3)> {
    let mut out: Vec<_> = set
        .segments
        .iter()
        .filter(|s| s.start.distance(s.end) > min_len)
        .map(|s| {
            let key = if swap {
                (s.triangle_b, s.triangle_a)
            } else {
                (s.triangle_a, s.triangle_b)
            };
            (key, s.start, s.end)
        })
        .collect();
    out.sort_by_key(|(k, _, _)| *k);
    out
}

/// Point records keyed by (triangle of A, triangle of B).
fn point_records(set: &IntersectionSet, swap: bool) -> Vec<((usize, usize), DVec3)> {
    let mut out: Vec<_> = set
        .points
        .iter()
        .map(|p| {
            let key = if swap {
                (p.triangle_b, p.triangle_a)
            } else {
                (p.triangle_a, p.triangle_b)
            };
            (key, p.point)
        })
        .collect();
    out.sort_by_key(|(k, _)| *k);
    out
}

#[test]
fn intersections_are_symmetric() {
    let (ma, mb) = sphere_pair();
    let opts = [
        BuildOptions::new(BuildStrategy::TopDownMidpoint),
        BuildOptions::new(BuildStrategy::BottomUpFromOneRings)
            .with_cluster_policy(ClusterPolicy::MinimalVolume),
    ];
    for (oa, ob) in [(opts[0], opts[1]), (opts[1], opts[0])] {
        let a = MeshAabbTree::build(&ma, oa).unwrap();
        let b = MeshAabbTree::build(&mb, ob).unwrap();
        let ab = a.find_intersections(&b, None).unwrap();
        let ba = b.find_intersections(&a, None).unwrap();
        assert!(!ab.segments.is_empty());

        let fwd = long_segments(&ab, false, 1e-6);
        let rev = long_segments(&ba, true, 1e-6);
        let keys = |v: &[((usize, usize), DVec3, DVec3)]| v.iter().map(|e| e.0).collect::<Vec<_>>();
        assert_eq!(keys(&fwd), keys(&rev));
        for ((key, s0, e0), (_, s1, e1)) in fwd.iter().zip(&rev) {
            let same = s0.distance(*s1) < 1e-9 && e0.distance(*e1) < 1e-9;
            let flipped = s0.distance(*e1) < 1e-9 && e0.distance(*s1) < 1e-9;
            assert!(same || flipped, "pair {key:?} disagrees");
        }

        let fwd_points = point_records(&ab, false);
        let rev_points = point_records(&ba, true);
        assert_eq!(
            fwd_points.iter().map(|e| e.0).collect::<Vec<_>>(),
            rev_points.iter().map(|e| e.0).collect::<Vec<_>>()
        );
        for ((key, p0), (_, p1)) in fwd_points.iter().zip(&rev_points) {
            assert!(p0.distance(*p1) < 1e-9, "point {key:?} disagrees");
        }
    }
}

#[test]
fn intersection_pairs_match_brute_force() {
    let (ma, mb) = sphere_pair();
    let a = MeshAabbTree::new(&ma).unwrap();
    let b = MeshAabbTree::new(&mb).unwrap();
    let found = a.find_intersections(&b, None).unwrap();
    let mut tree_pairs: Vec<(usize, usize)> = found
        .segments
        .iter()
        .map(|s| (s.triangle_a, s.triangle_b))
        .chain(found.points.iter().map(|p| (p.triangle_a, p.triangle_b)))
        .collect();
    tree_pairs.sort_unstable();
    tree_pairs.dedup();

    let mut brute = Vec::new();
    for ta in ma.triangle_ids() {
        let tri_a = ma.triangle_vertices(ta);
        for tb in mb.triangle_ids() {
            if tri_tri_overlap(&tri_a, &mb.triangle_vertices(tb)) {
                brute.push((ta, tb));
            }
        }
    }
    brute.sort_unstable();
    assert_eq!(tree_pairs, brute);
    assert_eq!(a.test_intersection_tree(&b, None).unwrap(), !brute.is_empty());
}

#[test]
fn nearest_pair_matches_brute_force() {
    let ma = TriangleMesh::uv_sphere(DVec3::ZERO, 1.0, 12, 7);
    let mb = TriangleMesh::uv_sphere(DVec3::ZERO, 0.7, 10, 6);
    let shift = DAffine3::from_translation(DVec3::new(2.3, 0.4, -0.2));
    let a = MeshAabbTree::new(&ma).unwrap();
    let b = MeshAabbTree::build(&mb, BuildOptions::new(BuildStrategy::BottomUpFromOneRings))
        .unwrap();

    let pair = a
        .find_nearest_triangle_pair(&b, f64::INFINITY, Some(&shift))
        .unwrap()
        .unwrap();
    let mut best = f64::INFINITY;
    for ta in ma.triangle_ids() {
        for tb in mb.triangle_ids() {
            let tri_b = mb.triangle_vertices(tb).map(|v| shift.transform_point3(v));
            best = best.min(tri_tri_distance(&ma.triangle_vertices(ta), &tri_b).distance_squared);
        }
    }
    assert!((pair.distance_squared - best).abs() < 1e-12);
    assert!((pair.point_a.distance_squared(pair.point_b) - best).abs() < 1e-9);

    // Nothing within a bound tighter than the gap.
    let tight = 0.5 * best.sqrt();
    assert!(a.find_nearest_triangle_pair(&b, tight, Some(&shift)).unwrap().is_none());
}

#[test]
fn overlapping_trees_have_zero_pair_distance() {
    let (ma, mb) = sphere_pair();
    let a = MeshAabbTree::new(&ma).unwrap();
    let b = MeshAabbTree::new(&mb).unwrap();
    let pair = a.find_nearest_triangle_pair(&b, f64::INFINITY, None).unwrap().unwrap();
    assert_eq!(pair.distance_squared, 0.0);
}

#[test]
fn queries_run_concurrently() {
    let mesh = TriangleMesh::uv_sphere(DVec3::ZERO, 1.0, 32, 16);
    let tree = MeshAabbTree::new(mesh).unwrap();
    let probes: Vec<DVec3> = (0..512)
        .map(|i| {
            let t = f64::from(i) * 0.1;
            DVec3::new(t.sin() * 1.7, (1.3 * t).cos() * 1.4, (0.7 * t).sin() * 1.9)
        })
        .collect();
    let sequential: Vec<_> = probes
        .iter()
        .map(|p| tree.find_nearest_triangle(*p, f64::INFINITY).unwrap())
        .collect();
    let parallel: Vec<_> = probes
        .par_iter()
        .map(|p| tree.find_nearest_triangle(*p, f64::INFINITY).unwrap())
        .collect();
    assert_eq!(sequential, parallel);
    let inside: Vec<bool> = probes.par_iter().map(|p| tree.is_inside(*p).unwrap()).collect();
    assert_eq!(inside.len(), probes.len());
}
