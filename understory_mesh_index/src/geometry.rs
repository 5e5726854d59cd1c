// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exact per-primitive tests used at the leaves of the tree.
//!
//! - [`point_triangle_distance`]: closest point and barycentrics (Ericson's
//!   Voronoi-region walk).
//! - [`ray_triangle`]: two-sided Möller–Trumbore, accepting `t >= 0`.
//! - [`tri_tri_intersection`] / [`tri_tri_overlap`]: slice one triangle by the
//!   other's plane, then clip the slice to the other triangle in 2D.
//! - [`tri_tri_distance`] and [`segment_segment_closest`] for nearest-pair
//!   queries.
//!
//! Ray/box and box/box tests live on [`Aabb3`](crate::Aabb3).

use glam::{DVec2, DVec3};

use crate::types::Ray3;

/// Three vertex positions.
pub type Triangle = [DVec3; 3];

const RELATIVE_EPS: f64 = 1e-12;

/// Closest-point record for a point/triangle pair.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointTriangleDistance {
    /// Squared distance from the query point to `closest`.
    pub distance_squared: f64,
    /// Closest point on the triangle.
    pub closest: DVec3,
    /// Barycentric coordinates of `closest` with respect to the triangle vertices.
    pub barycentric: DVec3,
}

/// Ray/triangle hit record.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayTriangleHit {
    /// Ray parameter of the hit (`origin + t * direction`).
    pub t: f64,
    /// Barycentric coordinates of the hit point.
    pub barycentric: DVec3,
}

/// Result of intersecting two triangles.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TriTriContact {
    /// No common point.
    Disjoint,
    /// The triangles touch in a single point.
    Point(DVec3),
    /// The triangles cross along a segment.
    Segment(DVec3, DVec3),
    /// The triangles lie in the same plane and overlap.
    ///
    /// The overlap region is a polygon; it is not computed.
    Coplanar,
}

/// Closest points between two triangles.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TriangleDistance {
    /// Squared distance between the triangles; zero when they intersect.
    pub distance_squared: f64,
    /// Closest point on the first triangle.
    pub point_a: DVec3,
    /// Closest point on the second triangle.
    pub point_b: DVec3,
}

#[inline]
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

/// Closest point on segment `[a, b]` to `p`, with its parameter.
pub fn closest_point_on_segment(p: DVec3, a: DVec3, b: DVec3) -> (DVec3, f64) {
    let ab = b - a;
    let t = ratio((p - a).dot(ab), ab.length_squared()).clamp(0.0, 1.0);
    (a + t * ab, t)
}

/// Distance from `p` to a triangle, with closest point and barycentrics.
pub fn point_triangle_distance(p: DVec3, tri: &Triangle) -> PointTriangleDistance {
    let [a, b, c] = *tri;
    let finish = |closest: DVec3, barycentric: DVec3| PointTriangleDistance {
        distance_squared: p.distance_squared(closest),
        closest,
        barycentric,
    };

    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return finish(a, DVec3::X);
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return finish(b, DVec3::Y);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = ratio(d1, d1 - d3);
        return finish(a + v * ab, DVec3::new(1.0 - v, v, 0.0));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return finish(c, DVec3::Z);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = ratio(d2, d2 - d6);
        return finish(a + w * ac, DVec3::new(1.0 - w, 0.0, w));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = ratio(d4 - d3, (d4 - d3) + (d5 - d6));
        return finish(b + w * (c - b), DVec3::new(0.0, 1.0 - w, w));
    }

    let sum = va + vb + vc;
    if sum > 0.0 {
        let v = vb / sum;
        let w = vc / sum;
        return finish(a + v * ab + w * ac, DVec3::new(1.0 - v - w, v, w));
    }

    // Collinear vertices: the closest point is on one of the edges.
    let (pab, tab) = closest_point_on_segment(p, a, b);
    let (pbc, tbc) = closest_point_on_segment(p, b, c);
    let (pca, tca) = closest_point_on_segment(p, c, a);
    let candidates = [
        (pab, DVec3::new(1.0 - tab, tab, 0.0)),
        (pbc, DVec3::new(0.0, 1.0 - tbc, tbc)),
        (pca, DVec3::new(tca, 0.0, 1.0 - tca)),
    ];
    let mut best = finish(candidates[0].0, candidates[0].1);
    for (q, bary) in &candidates[1..] {
        let cand = finish(*q, *bary);
        if cand.distance_squared < best.distance_squared {
            best = cand;
        }
    }
    best
}

/// Two-sided ray/triangle test. Hits behind the origin (`t < 0`) are rejected.
pub fn ray_triangle(ray: &Ray3, tri: &Triangle) -> Option<RayTriangleHit> {
    let [a, b, c] = *tri;
    let e1 = b - a;
    let e2 = c - a;
    let pvec = ray.direction.cross(e2);
    let det = e1.dot(pvec);
    let scale = e1.length() * e2.length() * ray.direction.length();
    if !det.is_finite() || det.abs() <= RELATIVE_EPS * scale {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(e1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    if t < 0.0 {
        return None;
    }
    Some(RayTriangleHit {
        t,
        barycentric: DVec3::new(1.0 - u - v, u, v),
    })
}

/// Whether two triangles share at least one point, including coplanar overlap.
pub fn tri_tri_overlap(a: &Triangle, b: &Triangle) -> bool {
    !matches!(tri_tri_intersection(a, b), TriTriContact::Disjoint)
}

/// Intersect two triangles.
///
/// Non-coplanar pairs yield a point or a segment. Coplanar overlapping pairs
/// yield [`TriTriContact::Coplanar`]. If both triangles are degenerate
/// (zero area) the result is [`TriTriContact::Disjoint`].
pub fn tri_tri_intersection(a: &Triangle, b: &Triangle) -> TriTriContact {
    let eps = tolerance(a, b);
    let (tri, other, n) = match (unit_normal(a), unit_normal(b)) {
        (Some(n), _) => (a, b, n),
        (None, Some(n)) => (b, a, n),
        (None, None) => return TriTriContact::Disjoint,
    };
    match slice_by_plane(other, n, tri[0], eps) {
        Slice::Empty => TriTriContact::Disjoint,
        Slice::Coplanar => {
            if coplanar_overlap(tri, other, n, eps) {
                TriTriContact::Coplanar
            } else {
                TriTriContact::Disjoint
            }
        }
        Slice::Point(p) => {
            let proj = Projection::new(n);
            if proj.contains(tri, p, eps) {
                TriTriContact::Point(p)
            } else {
                TriTriContact::Disjoint
            }
        }
        Slice::Segment(p, q) => match clip_segment(p, q, tri, n, eps) {
            None => TriTriContact::Disjoint,
            Some((s, e)) if s.distance_squared(e) <= eps * eps => {
                TriTriContact::Point(s.lerp(e, 0.5))
            }
            Some((s, e)) => TriTriContact::Segment(s, e),
        },
    }
}

/// Closest points between segments `[p1, q1]` and `[p2, q2]`.
///
/// Returns the squared distance and the closest point on each segment.
pub fn segment_segment_closest(p1: DVec3, q1: DVec3, p2: DVec3, q2: DVec3) -> (f64, DVec3, DVec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (s, t) = if a <= f64::EPSILON && e <= f64::EPSILON {
        (0.0, 0.0)
    } else if a <= f64::EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= f64::EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    let c1 = p1 + s * d1;
    let c2 = p2 + t * d2;
    (c1.distance_squared(c2), c1, c2)
}

/// Distance between two triangles.
pub fn tri_tri_distance(a: &Triangle, b: &Triangle) -> TriangleDistance {
    match tri_tri_intersection(a, b) {
        TriTriContact::Point(p) | TriTriContact::Segment(p, _) => {
            return TriangleDistance {
                distance_squared: 0.0,
                point_a: p,
                point_b: p,
            };
        }
        TriTriContact::Coplanar | TriTriContact::Disjoint => {}
    }

    let mut best = TriangleDistance {
        distance_squared: f64::INFINITY,
        point_a: a[0],
        point_b: b[0],
    };
    let mut consider = |d2: f64, pa: DVec3, pb: DVec3| {
        if d2 < best.distance_squared {
            best = TriangleDistance {
                distance_squared: d2,
                point_a: pa,
                point_b: pb,
            };
        }
    };
    for v in a {
        let d = point_triangle_distance(*v, b);
        consider(d.distance_squared, *v, d.closest);
    }
    for v in b {
        let d = point_triangle_distance(*v, a);
        consider(d.distance_squared, d.closest, *v);
    }
    for i in 0..3 {
        for j in 0..3 {
            let (d2, ca, cb) =
                segment_segment_closest(a[i], a[(i + 1) % 3], b[j], b[(j + 1) % 3]);
            consider(d2, ca, cb);
        }
    }
    best
}

fn tolerance(a: &Triangle, b: &Triangle) -> f64 {
    let m = a
        .iter()
        .chain(b.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs().max_element()));
    RELATIVE_EPS * (1.0 + m)
}

fn unit_normal(tri: &Triangle) -> Option<DVec3> {
    let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
    let len = n.length();
    (len > 0.0 && len.is_finite()).then(|| n / len)
}

/// Part of a triangle lying in a plane.
enum Slice {
    Empty,
    Point(DVec3),
    Segment(DVec3, DVec3),
    Coplanar,
}

fn slice_by_plane(tri: &Triangle, n: DVec3, origin: DVec3, eps: f64) -> Slice {
    let d = tri.map(|v| {
        let s = n.dot(v - origin);
        if s.abs() <= eps { 0.0 } else { s }
    });
    let pos = d.iter().filter(|s| **s > 0.0).count();
    let neg = d.iter().filter(|s| **s < 0.0).count();
    let crossing = |i: usize, j: usize| tri[i] + (d[i] / (d[i] - d[j])) * (tri[j] - tri[i]);

    match 3 - pos - neg {
        3 => Slice::Coplanar,
        2 => {
            let i = (0..3).find(|&i| d[i] != 0.0).unwrap_or(0);
            Slice::Segment(tri[(i + 1) % 3], tri[(i + 2) % 3])
        }
        1 => {
            let i = (0..3).find(|&i| d[i] == 0.0).unwrap_or(0);
            let (j, k) = ((i + 1) % 3, (i + 2) % 3);
            if d[j] * d[k] > 0.0 {
                Slice::Point(tri[i])
            } else {
                Slice::Segment(tri[i], crossing(j, k))
            }
        }
        _ => {
            if pos == 3 || neg == 3 {
                return Slice::Empty;
            }
            // The vertex alone on its side of the plane.
            let lone_positive = pos == 1;
            let i = (0..3)
                .find(|&i| (d[i] > 0.0) == lone_positive)
                .unwrap_or(0);
            let (j, k) = ((i + 1) % 3, (i + 2) % 3);
            Slice::Segment(crossing(i, j), crossing(i, k))
        }
    }
}

/// Drop-the-dominant-axis projection onto a triangle's plane.
struct Projection {
    i0: usize,
    i1: usize,
}

impl Projection {
    fn new(n: DVec3) -> Self {
        let a = n.abs();
        let (i0, i1) = if a.x >= a.y && a.x >= a.z {
            (1, 2)
        } else if a.y >= a.z {
            (0, 2)
        } else {
            (0, 1)
        };
        Self { i0, i1 }
    }

    fn apply(&self, v: DVec3) -> DVec2 {
        DVec2::new(v[self.i0], v[self.i1])
    }

    fn triangle(&self, tri: &Triangle) -> [DVec2; 3] {
        tri.map(|v| self.apply(v))
    }

    fn contains(&self, tri: &Triangle, p: DVec3, eps: f64) -> bool {
        point_in_triangle_2d(self.apply(p), &self.triangle(tri), eps)
    }
}

/// Signed distance of `x` from edge `a -> b`, positive on the inner side.
fn edge_side(a: DVec2, b: DVec2, orient: f64, x: DVec2) -> Option<f64> {
    let edge = b - a;
    let len = edge.length();
    (len > 0.0).then(|| orient * edge.perp_dot(x - a) / len)
}

fn orientation(t: &[DVec2; 3]) -> f64 {
    (t[1] - t[0]).perp_dot(t[2] - t[0]).signum()
}

fn point_in_triangle_2d(p: DVec2, t: &[DVec2; 3], eps: f64) -> bool {
    let orient = orientation(t);
    (0..3).all(|e| edge_side(t[e], t[(e + 1) % 3], orient, p).is_none_or(|s| s >= -eps))
}

/// Clip segment `[p, q]` (lying in the triangle's plane) to the triangle.
fn clip_segment(p: DVec3, q: DVec3, tri: &Triangle, n: DVec3, eps: f64) -> Option<(DVec3, DVec3)> {
    let proj = Projection::new(n);
    let t2 = proj.triangle(tri);
    let orient = orientation(&t2);
    let (p2, q2) = (proj.apply(p), proj.apply(q));
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    for e in 0..3 {
        let a = t2[e];
        let b = t2[(e + 1) % 3];
        let (Some(fp), Some(fq)) = (edge_side(a, b, orient, p2), edge_side(a, b, orient, q2)) else {
            continue;
        };
        if fp < -eps && fq < -eps {
            return None;
        }
        if fp < -eps {
            lo = lo.max(fp / (fp - fq));
        } else if fq < -eps {
            hi = hi.min(fp / (fp - fq));
        }
    }
    (lo <= hi).then(|| (p.lerp(q, lo), p.lerp(q, hi)))
}

fn segments_intersect_2d(p1: DVec2, p2: DVec2, q1: DVec2, q2: DVec2, eps: f64) -> bool {
    let orient = |a: DVec2, b: DVec2, c: DVec2| (b - a).perp_dot(c - a);
    let on_segment = |a: DVec2, b: DVec2, c: DVec2| {
        c.x >= a.x.min(b.x) - eps
            && c.x <= a.x.max(b.x) + eps
            && c.y >= a.y.min(b.y) - eps
            && c.y <= a.y.max(b.y) + eps
    };
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);
    let straddles = |u: f64, v: f64| (u > eps && v < -eps) || (u < -eps && v > eps);
    if straddles(d1, d2) && straddles(d3, d4) {
        return true;
    }
    (d1.abs() <= eps && on_segment(q1, q2, p1))
        || (d2.abs() <= eps && on_segment(q1, q2, p2))
        || (d3.abs() <= eps && on_segment(p1, p2, q1))
        || (d4.abs() <= eps && on_segment(p1, p2, q2))
}

fn coplanar_overlap(a: &Triangle, b: &Triangle, n: DVec3, eps: f64) -> bool {
    let proj = Projection::new(n);
    let ta = proj.triangle(a);
    let tb = proj.triangle(b);
    for i in 0..3 {
        for j in 0..3 {
            if segments_intersect_2d(ta[i], ta[(i + 1) % 3], tb[j], tb[(j + 1) % 3], eps) {
                return true;
            }
        }
    }
    point_in_triangle_2d(ta[0], &tb, eps) || point_in_triangle_2d(tb[0], &ta, eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64, z: f64) -> DVec3 {
        DVec3::new(x, y, z)
    }

    fn xy_triangle() -> Triangle {
        [v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0)]
    }

    #[test]
    fn point_triangle_regions() {
        let tri = xy_triangle();
        let above = point_triangle_distance(v(0.25, 0.25, 2.0), &tri);
        assert_eq!(above.distance_squared, 4.0);
        assert_eq!(above.closest, v(0.25, 0.25, 0.0));
        assert!((above.barycentric - v(0.5, 0.25, 0.25)).length() < 1e-12);

        let vertex = point_triangle_distance(v(-1.0, -1.0, 0.0), &tri);
        assert_eq!(vertex.closest, tri[0]);
        assert_eq!(vertex.barycentric, DVec3::X);

        let edge = point_triangle_distance(v(1.0, 1.0, 0.0), &tri);
        assert!((edge.closest - v(0.5, 0.5, 0.0)).length() < 1e-12);
        assert!((edge.distance_squared - 0.5).abs() < 1e-12);
    }

    #[test]
    fn point_triangle_degenerate_is_finite() {
        let tri = [v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(2.0, 0.0, 0.0)];
        let d = point_triangle_distance(v(1.5, 1.0, 0.0), &tri);
        assert!(d.distance_squared.is_finite());
        assert!((d.distance_squared - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ray_triangle_front_back_and_behind() {
        let tri = xy_triangle();
        let down = Ray3::new(v(0.2, 0.2, 1.0), -DVec3::Z);
        let hit = ray_triangle(&down, &tri).expect("ray hits from above");
        assert!((hit.t - 1.0).abs() < 1e-12);
        let up = Ray3::new(v(0.2, 0.2, -1.0), DVec3::Z);
        assert!(ray_triangle(&up, &tri).is_some(), "two-sided");
        let away = Ray3::new(v(0.2, 0.2, 1.0), DVec3::Z);
        assert!(ray_triangle(&away, &tri).is_none());
        let parallel = Ray3::new(v(-1.0, 0.2, 0.0), DVec3::X);
        assert!(ray_triangle(&parallel, &tri).is_none());
    }

    #[test]
    fn crossing_triangles_give_segment() {
        let a = [v(-1.0, -1.0, 0.0), v(2.0, -1.0, 0.0), v(-1.0, 2.0, 0.0)];
        let b = [v(0.0, 0.0, -1.0), v(0.0, 0.0, 1.0), v(0.5, 0.5, 0.0)];
        match tri_tri_intersection(&a, &b) {
            TriTriContact::Segment(p, q) => {
                assert!(p.z.abs() < 1e-12 && q.z.abs() < 1e-12);
                assert!((p.distance(q) - 0.5_f64.sqrt()).abs() < 1e-9);
            }
            other => panic!("expected a segment, got {other:?}"),
        }
        assert!(tri_tri_overlap(&a, &b));
        assert!(tri_tri_overlap(&b, &a));
    }

    #[test]
    fn touching_vertex_gives_point() {
        let a = xy_triangle();
        let b = [v(0.25, 0.25, 0.0), v(0.0, 0.0, 1.0), v(1.0, 0.0, 1.0)];
        match tri_tri_intersection(&a, &b) {
            TriTriContact::Point(p) => assert!((p - v(0.25, 0.25, 0.0)).length() < 1e-12),
            other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn separated_and_coplanar_cases() {
        let a = xy_triangle();
        let lifted = a.map(|p| p + DVec3::Z);
        assert_eq!(tri_tri_intersection(&a, &lifted), TriTriContact::Disjoint);
        let shifted = a.map(|p| p + v(0.25, 0.25, 0.0));
        assert_eq!(tri_tri_intersection(&a, &shifted), TriTriContact::Coplanar);
        let apart = a.map(|p| p + v(5.0, 0.0, 0.0));
        assert_eq!(tri_tri_intersection(&a, &apart), TriTriContact::Disjoint);
    }

    #[test]
    fn segment_distances() {
        let (d2, c1, c2) =
            segment_segment_closest(v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.5, -1.0, 1.0), v(0.5, 1.0, 1.0));
        assert!((d2 - 1.0).abs() < 1e-12);
        assert!((c1 - v(0.5, 0.0, 0.0)).length() < 1e-12);
        assert!((c2 - v(0.5, 0.0, 1.0)).length() < 1e-12);
    }

    #[test]
    fn triangle_distance_matches_gap() {
        let a = xy_triangle();
        let b = a.map(|p| p + v(0.0, 0.0, 3.0));
        let d = tri_tri_distance(&a, &b);
        assert!((d.distance_squared - 9.0).abs() < 1e-12);
        let crossing = [v(0.2, 0.2, -1.0), v(0.2, 0.2, 1.0), v(0.3, 0.1, 0.0)];
        assert_eq!(tri_tri_distance(&a, &crossing).distance_squared, 0.0);
    }
}
