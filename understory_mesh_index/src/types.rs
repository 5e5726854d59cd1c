// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use glam::{DAffine3, DVec3};

/// Coordinate axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis.
    Z,
}

impl Axis {
    /// All axes in X, Y, Z order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Component index of this axis (0, 1 or 2).
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Unit vector pointing along the positive axis.
    pub const fn unit(self) -> DVec3 {
        match self {
            Self::X => DVec3::X,
            Self::Y => DVec3::Y,
            Self::Z => DVec3::Z,
        }
    }

    /// Axis used at a given recursion depth, cycling X → Y → Z.
    pub(crate) const fn cycle(depth: usize) -> Self {
        Self::ALL[depth % 3]
    }
}

/// Axis-aligned bounding box in 3D.
///
/// Stored as min/max corners; [`Aabb3::center`] and [`Aabb3::half_extents`]
/// give the center/half-extent description.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb3 {
    /// The empty (inverted) box. Union identity.
    pub const EMPTY: Self = Self {
        min: DVec3::INFINITY,
        max: DVec3::NEG_INFINITY,
    };

    /// Create a new AABB from min/max corners.
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from a center and half-extents.
    pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Tight box around a triangle.
    pub fn from_triangle(tri: &[DVec3; 3]) -> Self {
        Self {
            min: tri[0].min(tri[1]).min(tri[2]),
            max: tri[0].max(tri[1]).max(tri[2]),
        }
    }

    /// Center of the box.
    pub fn center(&self) -> DVec3 {
        0.5 * (self.min + self.max)
    }

    /// Half-extents of the box. Zero for empty boxes.
    pub fn half_extents(&self) -> DVec3 {
        (0.5 * (self.max - self.min)).max(DVec3::ZERO)
    }

    /// Return true if the box is empty or inverted. Assumes no NaN.
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// Return true if both corners are finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow the box to contain a point.
    pub fn include_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Box grown by `eps` on every side.
    pub fn inflated(&self, eps: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(eps),
            max: self.max + DVec3::splat(eps),
        }
    }

    /// Whether this box contains the point (boundary inclusive).
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Whether this box, grown by `eps`, contains the point.
    pub fn contains_point_eps(&self, p: DVec3, eps: f64) -> bool {
        self.inflated(eps).contains_point(p)
    }

    /// Whether two boxes overlap (touching counts).
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Volume of the box; zero when empty.
    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.max - self.min;
        d.x * d.y * d.z
    }

    /// Sum of the half-extents, a cheap size metric.
    pub fn extent_sum(&self) -> f64 {
        self.half_extents().element_sum()
    }

    /// Squared distance from a point to the box; zero inside.
    pub fn distance_squared(&self, p: DVec3) -> f64 {
        let d = (self.min - p).max(p - self.max).max(DVec3::ZERO);
        d.length_squared()
    }

    /// Squared distance between two boxes; zero when they overlap.
    pub fn distance_squared_to_box(&self, other: &Self) -> f64 {
        let d = (self.min - other.max)
            .max(other.min - self.max)
            .max(DVec3::ZERO);
        d.length_squared()
    }

    /// Corner `i` of the box, with bit 0/1/2 selecting max x/y/z.
    pub fn corner(&self, i: usize) -> DVec3 {
        DVec3::new(
            if i & 1 == 0 { self.min.x } else { self.max.x },
            if i & 2 == 0 { self.min.y } else { self.max.y },
            if i & 4 == 0 { self.min.z } else { self.max.z },
        )
    }

    /// Box around the eight transformed corners.
    pub fn transformed(&self, xf: &DAffine3) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::EMPTY;
        for i in 0..8 {
            out.include_point(xf.transform_point3(self.corner(i)));
        }
        out
    }

    /// Slab test. Returns the ray parameter where the ray enters the box,
    /// clamped to zero when the origin is inside, or `None` on a miss.
    pub fn ray_entry(&self, ray: &Ray3) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let mut t_min = 0.0_f64;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let o = ray.origin[axis];
            let d = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if d == 0.0 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (lo - o) * inv;
            let mut t1 = (hi - o) * inv;
            if t0 > t1 {
                core::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// A ray with an origin and a direction.
///
/// Tree queries require a unit-length direction so that hit parameters are
/// distances.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray3 {
    /// Ray origin.
    pub origin: DVec3,
    /// Ray direction.
    pub direction: DVec3,
}

impl Ray3 {
    /// Create a ray. The direction is stored as given.
    pub const fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    /// Create a ray along a coordinate axis.
    pub const fn along_axis(origin: DVec3, axis: Axis) -> Self {
        Self {
            origin,
            direction: axis.unit(),
        }
    }

    /// Point at parameter `t`.
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + t * self.direction
    }

    /// Whether the direction is unit length (within glam's tolerance).
    pub fn is_normalized(&self) -> bool {
        self.direction.is_normalized()
    }
}
