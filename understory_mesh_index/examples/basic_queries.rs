// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Understory Mesh Index: build, query, intersect, and rebuild.

use glam::{DAffine3, DVec3};
use understory_mesh_index::{
    BuildOptions, BuildStrategy, ClusterPolicy, MeshAabbTree, Ray3, TriangleMesh,
};

fn main() {
    let sphere = TriangleMesh::uv_sphere(DVec3::ZERO, 1.0, 32, 16);
    let opts = BuildOptions::new(BuildStrategy::BottomUpFromOneRings)
        .with_cluster_policy(ClusterPolicy::FastVolumeMetric);
    let mut tree = MeshAabbTree::build(sphere, opts).unwrap();
    println!("stats: {:?}", tree.stats().unwrap());

    // Nearest point to a probe outside the sphere
    let probe = DVec3::new(0.3, 2.0, -0.4);
    let nearest = tree.find_nearest_point(probe, f64::INFINITY).unwrap();
    println!("nearest to {probe}: {nearest:?}");

    // First hit and every hit along +X
    let ray = Ray3::new(DVec3::new(-3.0, 0.1, 0.05), DVec3::X);
    let first = tree.find_nearest_hit(&ray, f64::INFINITY).unwrap();
    let count = tree.count_hit_triangles(&ray, f64::INFINITY).unwrap();
    println!("first hit: {first:?}, {count} hits total");
    println!("origin inside: {}", tree.is_inside(DVec3::ZERO).unwrap());

    // Intersect with a cube pushed halfway into the sphere
    let cube = MeshAabbTree::new(TriangleMesh::axis_box(DVec3::splat(-0.5), DVec3::splat(0.5)))
        .unwrap();
    let shift = DAffine3::from_translation(DVec3::new(0.9, 0.0, 0.0));
    let found = tree.find_intersections(&cube, Some(&shift)).unwrap();
    println!(
        "intersections: {} segments, {} points",
        found.segments.len(),
        found.points.len()
    );

    // Moving the mesh makes the tree stale until it is rebuilt
    tree.mesh_mut().translate(DVec3::new(0.0, 0.0, 5.0));
    println!("after move: {:?}", tree.find_nearest_triangle(probe, 1.0));
    tree.rebuild();
    println!(
        "after rebuild: {:?}",
        tree.find_nearest_triangle(probe, f64::INFINITY)
    );
}
