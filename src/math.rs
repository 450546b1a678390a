//! Math primitives: a grid point type, the direction constants the
//! pathfinder walks, and the dense byte tensor voxels live in.

use glam::{IVec3, Vec3};

/// An immutable `(x, y, z)` grid coordinate.
///
/// Thin wrapper over [`glam::IVec3`] rather than a bare type alias, so that
/// `Direction` (a restricted set of unit-step `Point`s) reads as its own
/// vocabulary instead of "just another IVec3".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point(pub IVec3);

impl Point {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }

    pub fn x(&self) -> i32 {
        self.0.x
    }

    pub fn y(&self) -> i32 {
        self.0.y
    }

    pub fn z(&self) -> i32 {
        self.0.z
    }

    pub fn distance_squared(&self, other: Point) -> i64 {
        let d = self.0 - other.0;
        let d = d.as_i64vec3();
        d.x * d.x + d.y * d.y + d.z * d.z
    }

    pub fn distance(&self, other: Point) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    pub fn as_vec3(&self) -> Vec3 {
        self.0.as_vec3()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point(-self.0)
    }
}

impl From<(i32, i32, i32)> for Point {
    fn from(v: (i32, i32, i32)) -> Self {
        Point::new(v.0, v.1, v.2)
    }
}

/// Named unit-step directions. Modeled as a namespace of `Point` constants
/// rather than a `Point` subtype (see DESIGN.md) — Rust has no inheritance
/// and a newtype-of-newtype would only add indirection.
pub mod direction {
    use super::Point;

    pub const UP: Point = Point::new(0, 1, 0);
    pub const DOWN: Point = Point::new(0, -1, 0);

    pub const N: Point = Point::new(0, 0, -1);
    pub const NE: Point = Point::new(1, 0, -1);
    pub const E: Point = Point::new(1, 0, 0);
    pub const SE: Point = Point::new(1, 0, 1);
    pub const S: Point = Point::new(0, 0, 1);
    pub const SW: Point = Point::new(-1, 0, 1);
    pub const W: Point = Point::new(-1, 0, 0);
    pub const NW: Point = Point::new(-1, 0, -1);

    /// Clockwise from north. Load-bearing order: the pathfinder's blocked-
    /// diagonal mask (`pathfind::blocked_diagonal_mask`) assumes a cardinal
    /// direction's two neighbors in this array are its adjacent diagonals.
    pub const ALL: [Point; 8] = [N, NE, E, SE, S, SW, W, NW];

    pub const CARDINAL: [Point; 4] = [N, E, S, W];
    pub const DIAGONAL: [Point; 4] = [NE, SE, SW, NW];
}

/// Dense 3D buffer of `u8` block ids, shape `(x, y, z)`, X-major linear
/// stride `(1, x, x*y)`.
#[derive(Debug, Clone)]
pub struct Tensor3 {
    shape: [u32; 3],
    data: Vec<u8>,
}

impl Tensor3 {
    pub fn new(shape: [u32; 3]) -> Self {
        let len = (shape[0] as usize) * (shape[1] as usize) * (shape[2] as usize);
        Self {
            shape,
            data: vec![0u8; len],
        }
    }

    pub fn filled(shape: [u32; 3], value: u8) -> Self {
        let len = (shape[0] as usize) * (shape[1] as usize) * (shape[2] as usize);
        Self {
            shape,
            data: vec![value; len],
        }
    }

    pub fn shape(&self) -> [u32; 3] {
        self.shape
    }

    #[inline]
    pub fn linearize(&self, x: u32, y: u32, z: u32) -> usize {
        (x as usize) + (y as usize) * (self.shape[0] as usize)
            + (z as usize) * (self.shape[0] as usize) * (self.shape[1] as usize)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32, z: u32) -> u8 {
        self.data[self.linearize(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, z: u32, value: u8) {
        let idx = self.linearize(x, y, z);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_add_sub_roundtrip() {
        let a = Point::new(1, 2, 3);
        let b = Point::new(-4, 5, 0);
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn direction_order_is_clockwise_with_adjacent_diagonals() {
        use direction::*;
        // N's array neighbors are NW (index 7, wrapping) and NE (index 1):
        // the pathfinder relies on this adjacency to mark blocked diagonals.
        assert_eq!(ALL[0], N);
        assert_eq!(ALL[1], NE);
        assert_eq!(ALL[7], NW);
    }

    #[test]
    fn tensor3_linearize_is_x_major() {
        let t = Tensor3::new([4, 5, 6]);
        assert_eq!(t.linearize(0, 0, 0), 0);
        assert_eq!(t.linearize(1, 0, 0), 1);
        assert_eq!(t.linearize(0, 1, 0), 4);
        assert_eq!(t.linearize(0, 0, 1), 4 * 5);
    }

    #[test]
    fn distance_squared_matches_euclidean() {
        let a = Point::new(0, 0, 0);
        let b = Point::new(3, 4, 0);
        assert_eq!(a.distance_squared(b), 25);
        assert_eq!(a.distance(b), 5.0);
    }
}
