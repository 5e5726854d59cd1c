// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::{DAffine3, DVec3};
use understory_mesh_index::{
    BuildOptions, BuildStrategy, ClusterPolicy, MeshAabbTree, Ray3, TriangleMesh,
};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
    fn next_signed(&mut self) -> f64 {
        2.0 * self.next_f64() - 1.0
    }
}

fn gen_probes(count: usize, spread: f64) -> Vec<DVec3> {
    let mut rng = Rng::new(0xBADC_F00D_1234_5678);
    (0..count)
        .map(|_| {
            DVec3::new(rng.next_signed(), rng.next_signed(), rng.next_signed()) * spread
        })
        .collect()
}

fn gen_rays(count: usize) -> Vec<Ray3> {
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let d = DVec3::new(rng.next_signed(), rng.next_signed(), rng.next_signed());
        if d.length() < 0.1 {
            continue;
        }
        let origin = -2.0 * d.normalize();
        out.push(Ray3::new(origin, d.normalize()));
    }
    out
}

fn all_options() -> Vec<(&'static str, BuildOptions)> {
    vec![
        ("midpoint", BuildOptions::new(BuildStrategy::TopDownMidpoint)),
        ("median", BuildOptions::new(BuildStrategy::TopDownMedian)),
        (
            "one_rings_fastest",
            BuildOptions::new(BuildStrategy::BottomUpFromOneRings)
                .with_cluster_policy(ClusterPolicy::Fastest),
        ),
        (
            "one_rings_volume_metric",
            BuildOptions::new(BuildStrategy::BottomUpFromOneRings)
                .with_cluster_policy(ClusterPolicy::FastVolumeMetric),
        ),
        (
            "one_rings_minimal_volume",
            BuildOptions::new(BuildStrategy::BottomUpFromOneRings)
                .with_cluster_policy(ClusterPolicy::MinimalVolume),
        ),
    ]
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &(slices, stacks) in &[(64usize, 32usize), (256, 128)] {
        let mesh = TriangleMesh::uv_sphere(DVec3::ZERO, 1.0, slices, stacks);
        group.throughput(Throughput::Elements(mesh.triangle_count() as u64));
        for (name, opts) in all_options() {
            group.bench_function(format!("{}_t{}", name, mesh.triangle_count()), |b| {
                b.iter_batched(
                    || mesh.clone(),
                    |m| {
                        let tree = MeshAabbTree::build(m, opts).unwrap();
                        black_box(tree.is_empty())
                    },
                    BatchSize::LargeInput,
                );
            });
        }
    }
    group.finish();
}

fn bench_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest");
    let mesh = TriangleMesh::uv_sphere(DVec3::ZERO, 1.0, 128, 64);
    let probes = gen_probes(1024, 1.8);
    group.throughput(Throughput::Elements(probes.len() as u64));
    for (name, opts) in all_options() {
        let tree = MeshAabbTree::build(&mesh, opts).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut acc = 0.0;
                for p in &probes {
                    if let Some(n) = tree.find_nearest_point(*p, f64::INFINITY).unwrap() {
                        acc += n.distance_squared;
                    }
                }
                black_box(acc)
            });
        });
    }
    group.finish();
}

fn bench_rays(c: &mut Criterion) {
    let mut group = c.benchmark_group("rays");
    let mesh = TriangleMesh::uv_sphere(DVec3::ZERO, 1.0, 128, 64);
    let tree = MeshAabbTree::new(&mesh).unwrap();
    let rays = gen_rays(1024);
    let probes = gen_probes(1024, 1.2);
    group.throughput(Throughput::Elements(rays.len() as u64));
    group.bench_function("nearest_hit", |b| {
        b.iter(|| {
            let hits = rays
                .iter()
                .filter(|r| tree.find_nearest_hit_triangle(r, f64::INFINITY).unwrap().is_some())
                .count();
            black_box(hits)
        });
    });
    group.bench_function("count_hits", |b| {
        b.iter(|| {
            let total: usize = rays
                .iter()
                .map(|r| tree.count_hit_triangles(r, f64::INFINITY).unwrap())
                .sum();
            black_box(total)
        });
    });
    group.bench_function("is_inside", |b| {
        b.iter(|| {
            let inside = probes
                .iter()
                .filter(|p| tree.is_inside(**p).unwrap())
                .count();
            black_box(inside)
        });
    });
    group.finish();
}

fn bench_intersections(c: &mut Criterion) {
    let mut group = c.benchmark_group("intersections");
    let a_mesh = TriangleMesh::uv_sphere(DVec3::ZERO, 1.0, 96, 48);
    let b_mesh = TriangleMesh::uv_sphere(DVec3::ZERO, 0.9, 80, 40);
    let shift = DAffine3::from_translation(DVec3::new(0.37, 0.21, 0.13));
    let far = DAffine3::from_translation(DVec3::new(2.5, 0.0, 0.0));
    for (name, opts) in all_options() {
        let a = MeshAabbTree::build(&a_mesh, opts).unwrap();
        let b = MeshAabbTree::build(&b_mesh, opts).unwrap();
        group.bench_function(format!("find_{}", name), |bench| {
            bench.iter(|| black_box(a.find_intersections(&b, Some(&shift)).unwrap().len()));
        });
        group.bench_function(format!("test_{}", name), |bench| {
            bench.iter(|| black_box(a.test_intersection_tree(&b, Some(&shift)).unwrap()));
        });
        group.bench_function(format!("nearest_pair_{}", name), |bench| {
            bench.iter(|| {
                black_box(
                    a.find_nearest_triangle_pair(&b, f64::INFINITY, Some(&far))
                        .unwrap()
                        .map(|p| p.distance_squared),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_nearest,
    bench_rays,
    bench_intersections
);
criterion_main!(benches);
