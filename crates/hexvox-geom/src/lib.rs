//! Minimal geometry types for the import crates: float and integer vectors,
//! integer boxes and row-vector affine matrices.
#![forbid(unsafe_code)]

use core::fmt;
use core::ops::{Add, Mul, Neg, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v, z: v }
    }

    #[inline]
    pub fn abs(self) -> Vec3 {
        Vec3::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    #[inline]
    pub fn floor(self) -> Vec3 {
        Vec3::new(self.x.floor(), self.y.floor(), self.z.floor())
    }

    /// Fractional part as `v - floor(v)`, so negative inputs land in `[0, 1)`.
    #[inline]
    pub fn fract(self) -> Vec3 {
        self - self.floor()
    }

    /// Converts by truncation toward zero, saturating at the `i32` range.
    #[inline]
    pub fn truncate(self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    #[inline]
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct IVec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl IVec3 {
    pub const ZERO: IVec3 = IVec3 { x: 0, y: 0, z: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn min(self, rhs: IVec3) -> IVec3 {
        IVec3::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    #[inline]
    pub fn max(self, rhs: IVec3) -> IVec3 {
        IVec3::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    #[inline]
    pub fn max_element(self) -> i32 {
        self.x.max(self.y).max(self.z)
    }

    #[inline]
    pub fn le_all(self, rhs: IVec3) -> bool {
        self.x <= rhs.x && self.y <= rhs.y && self.z <= rhs.z
    }

    #[inline]
    pub fn as_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Component by axis index (0 = x, 1 = y, anything else = z).
    #[inline]
    pub fn axis(self, axis: usize) -> i32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    #[inline]
    pub fn with_axis(mut self, axis: usize, value: i32) -> IVec3 {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
        self
    }
}

impl Add for IVec3 {
    type Output = IVec3;
    #[inline]
    fn add(self, rhs: IVec3) -> IVec3 {
        IVec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for IVec3 {
    type Output = IVec3;
    #[inline]
    fn sub(self, rhs: IVec3) -> IVec3 {
        IVec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for IVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Axis-aligned integer box, `max` exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntBox {
    pub min: IVec3,
    pub max: IVec3,
}

impl IntBox {
    #[inline]
    pub fn new(min: IVec3, max: IVec3) -> Self {
        debug_assert!(min.le_all(max), "IntBox min {min} exceeds max {max}");
        Self { min, max }
    }

    /// Box spanning `[0, size)`.
    #[inline]
    pub fn from_size(size: IVec3) -> Self {
        Self::new(IVec3::ZERO, size)
    }

    #[inline]
    pub fn size(&self) -> IVec3 {
        self.max - self.min
    }

    /// Number of cells; zero for degenerate boxes.
    #[inline]
    pub fn count(&self) -> usize {
        let s = self.size();
        if s.x <= 0 || s.y <= 0 || s.z <= 0 {
            return 0;
        }
        s.x as usize * s.y as usize * s.z as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    #[inline]
    pub fn union(&self, other: &IntBox) -> IntBox {
        IntBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn contains(&self, other: &IntBox) -> bool {
        self.min.le_all(other.min) && other.max.le_all(self.max)
    }

    #[inline]
    pub fn contains_point(&self, p: IVec3) -> bool {
        self.min.le_all(p) && p.x < self.max.x && p.y < self.max.y && p.z < self.max.z
    }

    #[inline]
    pub fn intersects(&self, other: &IntBox) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }
}

impl fmt::Display for IntBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {})", self.min, self.max)
    }
}

/// 4x4 affine matrix in row-vector convention: `p' = p * M`, translation in
/// row 3.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4 {
    pub m: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4::from_rows([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    #[inline]
    pub const fn from_rows(m: [[f32; 4]; 4]) -> Self {
        Self { m }
    }

    /// Builds from sixteen components ordered `m00, m01, .., m33`.
    pub fn from_array(c: [f32; 16]) -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, v) in c.into_iter().enumerate() {
            m[i / 4][i % 4] = v;
        }
        Self { m }
    }

    pub fn from_translation(t: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.m[3][0] = t.x;
        out.m[3][1] = t.y;
        out.m[3][2] = t.z;
        out
    }

    #[inline]
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.m[3][0], self.m[3][1], self.m[3][2])
    }

    #[inline]
    pub fn with_translation(mut self, t: Vec3) -> Self {
        self.m[3][0] = t.x;
        self.m[3][1] = t.y;
        self.m[3][2] = t.z;
        self
    }

    /// Applies the linear part only.
    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            v.x * m[0][0] + v.y * m[1][0] + v.z * m[2][0],
            v.x * m[0][1] + v.y * m[1][1] + v.z * m[2][1],
            v.x * m[0][2] + v.y * m[1][2] + v.z * m[2][2],
        )
    }

    #[inline]
    pub fn transform_position(&self, p: Vec3) -> Vec3 {
        self.transform_vector(p) + self.translation()
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut m = [[0.0; 4]; 4];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[r][k] * rhs.m[k][c]).sum();
            }
        }
        Mat4 { m }
    }
}

impl fmt::Display for Mat4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.m.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "[{} {} {} {}]", row[0], row[1], row[2], row[3])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn min_never_exceeds_max(a: IVec3, b: IVec3) {
            prop_assert!(a.min(b).le_all(a.max(b)));
        }

        #[test]
        fn with_axis_roundtrips(v: IVec3, axis in 0usize..3, value: i32) {
            prop_assert_eq!(v.with_axis(axis, value).axis(axis), value);
        }

        #[test]
        fn fract_stays_in_unit_range(x in -1e5f32..1e5, y in -1e5f32..1e5, z in -1e5f32..1e5) {
            let f = Vec3::new(x, y, z).fract();
            prop_assert!((0.0..=1.0).contains(&f.x));
            prop_assert!((0.0..=1.0).contains(&f.y));
            prop_assert!((0.0..=1.0).contains(&f.z));
        }
    }

    #[test]
    fn from_array_is_row_major() {
        let m = Mat4::from_array([
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
        ]);
        assert_eq!(m.m[0], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m.m[3], [13.0, 14.0, 15.0, 16.0]);
        assert_eq!(m.translation(), Vec3::new(13.0, 14.0, 15.0));
    }
}
