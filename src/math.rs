//! Integer and floating point geometry primitives shared by the builders.
//!
//! All per-voxel comparisons in the pipeline are done in integer space; float
//! equality is never relied upon for topological decisions.

use glam::{IVec2, Vec3A};

/// An axis-aligned bounding box on the xz-plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2d {
    /// The minimum corner.
    pub min: glam::Vec2,
    /// The maximum corner.
    pub max: glam::Vec2,
}

/// A 3D axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3d {
    /// The minimum corner.
    pub min: Vec3A,
    /// The maximum corner.
    pub max: Vec3A,
}

impl Aabb3d {
    /// Builds the bounding box enclosing `vertices`, or `None` if it's empty.
    pub fn from_verts(vertices: &[Vec3A]) -> Option<Self> {
        let mut iter = vertices.iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), &v| (min.min(v), max.max(v)));
        Some(Self { min, max })
    }
}

/// Gets the standard width (x-axis) offset for the specified direction.
///
/// `direction` is taken modulo 4.
pub fn dir_offset_x(direction: u8) -> i32 {
    const OFFSET: [i32; 4] = [-1, 0, 1, 0];
    OFFSET[direction as usize & 0x3]
}

/// Gets the standard height (z-axis) offset for the specified direction.
///
/// `direction` is taken modulo 4.
pub fn dir_offset_z(direction: u8) -> i32 {
    const OFFSET: [i32; 4] = [0, 1, 0, -1];
    OFFSET[direction as usize & 0x3]
}

/// Rotates `direction` one step clockwise.
pub fn rotate_cw(direction: u8) -> u8 {
    (direction + 1) & 0x3
}

/// Rotates `direction` one step counter-clockwise.
pub fn rotate_ccw(direction: u8) -> u8 {
    (direction + 3) & 0x3
}

/// Strictly-left turn test for the triangle `(a, b, c)` on the xz-plane.
pub fn left(a: IVec2, b: IVec2, c: IVec2) -> bool {
    area2(a, b, c) < 0
}

/// Non-strict left turn test: left of or collinear with `a -> b`.
pub fn left_on(a: IVec2, b: IVec2, c: IVec2) -> bool {
    area2(a, b, c) <= 0
}

/// Whether `a`, `b`, `c` are collinear.
pub fn collinear(a: IVec2, b: IVec2, c: IVec2) -> bool {
    area2(a, b, c) == 0
}

/// Twice the signed area of the triangle `(a, b, c)`.
pub fn area2(a: IVec2, b: IVec2, c: IVec2) -> i64 {
    let a = a.as_i64vec2();
    let b = b.as_i64vec2();
    let c = c.as_i64vec2();
    (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
}

/// Proper segment intersection test: `(a, b)` and `(c, d)` cross at a point
/// interior to both segments.
pub fn intersect_prop(a: IVec2, b: IVec2, c: IVec2, d: IVec2) -> bool {
    if collinear(a, b, c) || collinear(a, b, d) || collinear(c, d, a) || collinear(c, d, b) {
        return false;
    }
    (left(a, b, c) ^ left(a, b, d)) && (left(c, d, a) ^ left(c, d, b))
}

fn between(a: IVec2, b: IVec2, c: IVec2) -> bool {
    if !collinear(a, b, c) {
        return false;
    }
    if a.x != b.x {
        (a.x <= c.x && c.x <= b.x) || (a.x >= c.x && c.x >= b.x)
    } else {
        (a.y <= c.y && c.y <= b.y) || (a.y >= c.y && c.y >= b.y)
    }
}

/// Improper intersection test: like [`intersect_prop`] but also true when an
/// endpoint of one segment lies on the other.
pub fn intersect(a: IVec2, b: IVec2, c: IVec2, d: IVec2) -> bool {
    if intersect_prop(a, b, c, d) {
        return true;
    }
    between(a, b, c) || between(a, b, d) || between(c, d, a) || between(c, d, b)
}

/// Squared perpendicular distance from `point` to the infinite line through
/// `a` and `b`, projected onto the xz-plane.
pub fn point_segment_distance_squared(point: (i32, i32), a: (i32, i32), b: (i32, i32)) -> f64 {
    let (px, pz) = (point.0 as f64, point.1 as f64);
    let (ax, az) = (a.0 as f64, a.1 as f64);
    let (bx, bz) = (b.0 as f64, b.1 as f64);
    let dx = bx - ax;
    let dz = bz - az;
    let mut t = ((px - ax) * dx + (pz - az) * dz) / (dx * dx + dz * dz).max(f64::EPSILON);
    t = t.clamp(0.0, 1.0);
    let cx = ax + t * dx;
    let cz = az + t * dz;
    (px - cx) * (px - cx) + (pz - cz) * (pz - cz)
}

/// Whether the segment from `contour[at]` to `point` lies within the
/// interior cone formed by the contour at vertex `at`.
pub fn in_cone_outline(contour: &[glam::IVec4], at: usize, point: glam::IVec4) -> bool {
    let n = contour.len();
    let prev = contour[(at + n - 1) % n];
    let cur = contour[at];
    let next = contour[(at + 1) % n];

    let p = IVec2::new(prev.x, prev.z);
    let c = IVec2::new(cur.x, cur.z);
    let nx = IVec2::new(next.x, next.z);
    let target = IVec2::new(point.x, point.z);

    if left_on(p, c, nx) {
        left(c, target, p) && left(target, c, nx)
    } else {
        !(left_on(c, target, nx) && left_on(target, c, p))
    }
}

/// Whether the segment from `contour[at]` to `point` properly crosses any
/// edge of `contour` other than the ones incident to `at`.
pub fn intersect_segment_contour(contour: &[glam::IVec4], at: usize, point: glam::IVec4) -> bool {
    let n = contour.len();
    let d0 = IVec2::new(contour[at].x, contour[at].z);
    let d1 = IVec2::new(point.x, point.z);

    for i in 0..n {
        let next = (i + 1) % n;
        if i == at || next == at {
            continue;
        }
        let e0 = IVec2::new(contour[i].x, contour[i].z);
        let e1 = IVec2::new(contour[next].x, contour[next].z);
        if e0 == d0 || e0 == d1 || e1 == d0 || e1 == d1 {
            continue;
        }
        if intersect(d0, d1, e0, e1) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_detects_orientation() {
        let a = IVec2::new(0, 0);
        let b = IVec2::new(10, 0);
        let c = IVec2::new(5, 5);
        assert!(left(a, b, c));
        assert!(!left(a, c, b));
        assert!(collinear(a, b, IVec2::new(20, 0)));
    }

    #[test]
    fn intersect_prop_detects_crossing_segments() {
        let a = IVec2::new(0, 0);
        let b = IVec2::new(10, 10);
        let c = IVec2::new(0, 10);
        let d = IVec2::new(10, 0);
        assert!(intersect_prop(a, b, c, d));
        assert!(!intersect_prop(a, b, a, c));
    }
}
