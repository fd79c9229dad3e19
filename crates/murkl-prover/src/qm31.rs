//! CM31 and QM31 extensions of M31
//!
//! CM31 = M31[i] with i² = -1
//! QM31 = CM31[u] with u² = 2 + i
//!
//! A QM31 element is stored as (a + bi) + (c + di)u and encodes on the wire
//! as four little-endian u32 limbs `a, b, c, d`. Out-of-domain samples, FRI
//! folding challenges and every committed evaluation live in QM31.

use crate::m31::M31;
use core::fmt;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Size of one encoded QM31 element
pub const QM31_BYTES: usize = 16;

/// Complex extension element a + bi
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CM31 {
    pub a: M31,
    pub b: M31,
}

impl CM31 {
    pub const ZERO: Self = Self::new(M31::ZERO, M31::ZERO);
    pub const ONE: Self = Self::new(M31::ONE, M31::ZERO);

    #[inline]
    pub const fn new(a: M31, b: M31) -> Self {
        Self { a, b }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.a.is_zero() && self.b.is_zero()
    }

    /// a - bi
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(self.a, -self.b)
    }

    /// a² + b², an element of the base field
    #[inline]
    pub fn norm(&self) -> M31 {
        self.a.square() + self.b.square()
    }

    /// Inverse; zero maps to zero.
    pub fn inverse(&self) -> Self {
        let n = self.norm().inverse();
        Self::new(self.a * n, -self.b * n)
    }
}

impl Add for CM31 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.a + rhs.a, self.b + rhs.b)
    }
}

impl Sub for CM31 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.a - rhs.a, self.b - rhs.b)
    }
}

impl Neg for CM31 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.a, -self.b)
    }
}

impl Mul for CM31 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.a * rhs.a - self.b * rhs.b,
            self.a * rhs.b + self.b * rhs.a,
        )
    }
}

/// The non-residue u² = 2 + i
const U_SQUARED: CM31 = CM31::new(M31::new(2), M31::ONE);

/// QM31 extension field element (a + bi) + (c + di)u
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QM31 {
    /// Coefficient of 1
    pub a: M31,
    /// Coefficient of i
    pub b: M31,
    /// Coefficient of u
    pub c: M31,
    /// Coefficient of iu
    pub d: M31,
}

impl QM31 {
    pub const ZERO: Self = Self::new(M31::ZERO, M31::ZERO, M31::ZERO, M31::ZERO);
    pub const ONE: Self = Self::new(M31::ONE, M31::ZERO, M31::ZERO, M31::ZERO);

    #[inline]
    pub const fn new(a: M31, b: M31, c: M31, d: M31) -> Self {
        Self { a, b, c, d }
    }

    /// Create from raw u32 values, reducing each limb
    #[inline]
    pub const fn from_u32(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self::new(M31::new(a), M31::new(b), M31::new(c), M31::new(d))
    }

    /// Embed a base field element
    #[inline]
    pub const fn from_m31(x: M31) -> Self {
        Self::new(x, M31::ZERO, M31::ZERO, M31::ZERO)
    }

    /// Embed a CM31 element
    #[inline]
    pub const fn from_cm31(x: CM31) -> Self {
        Self::new(x.a, x.b, M31::ZERO, M31::ZERO)
    }

    #[inline]
    fn halves(&self) -> (CM31, CM31) {
        (CM31::new(self.a, self.b), CM31::new(self.c, self.d))
    }

    #[inline]
    fn from_halves(lo: CM31, hi: CM31) -> Self {
        Self::new(lo.a, lo.b, hi.a, hi.b)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.a.is_zero() && self.b.is_zero() && self.c.is_zero() && self.d.is_zero()
    }

    #[inline]
    pub fn square(self) -> Self {
        self * self
    }

    #[inline]
    pub fn double(self) -> Self {
        self + self
    }

    /// Multiply by a base field element
    #[inline]
    pub fn mul_m31(self, k: M31) -> Self {
        Self::new(self.a * k, self.b * k, self.c * k, self.d * k)
    }

    /// Compute self^exp using square-and-multiply
    pub fn pow(self, mut exp: u64) -> Self {
        let mut base = self;
        let mut result = Self::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                result *= base;
            }
            base = base.square();
            exp >>= 1;
        }
        result
    }

    /// Inverse; zero maps to zero.
    ///
    /// With x = x0 + x1·u, x · (x0 - x1·u) = x0² - x1²·(2 + i) lies in CM31,
    /// so one CM31 inversion suffices.
    pub fn inverse(&self) -> Self {
        let (x0, x1) = self.halves();
        let denom = x0 * x0 - x1 * x1 * U_SQUARED;
        let denom_inv = denom.inverse();
        Self::from_halves(x0 * denom_inv, -x1 * denom_inv)
    }

    /// Serialize to bytes (16 bytes, little-endian limbs)
    #[inline]
    pub fn to_bytes(&self) -> [u8; QM31_BYTES] {
        let mut bytes = [0u8; QM31_BYTES];
        bytes[0..4].copy_from_slice(&self.a.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.b.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.c.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.d.to_le_bytes());
        bytes
    }

    /// Decode four canonical little-endian limbs.
    ///
    /// Returns `None` if any limb is `>= p`.
    pub fn from_canonical_bytes(bytes: &[u8; QM31_BYTES]) -> Option<Self> {
        let limb = |i: usize| {
            M31::from_canonical(u32::from_le_bytes([
                bytes[i],
                bytes[i + 1],
                bytes[i + 2],
                bytes[i + 3],
            ]))
        };
        Some(Self::new(limb(0)?, limb(4)?, limb(8)?, limb(12)?))
    }
}

impl fmt::Display for QM31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} + {}i) + ({} + {}i)u", self.a, self.b, self.c, self.d)
    }
}

impl From<M31> for QM31 {
    #[inline]
    fn from(x: M31) -> Self {
        Self::from_m31(x)
    }
}

impl From<CM31> for QM31 {
    #[inline]
    fn from(x: CM31) -> Self {
        Self::from_cm31(x)
    }
}

impl Add for QM31 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.a + rhs.a, self.b + rhs.b, self.c + rhs.c, self.d + rhs.d)
    }
}

impl Sub for QM31 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.a - rhs.a, self.b - rhs.b, self.c - rhs.c, self.d - rhs.d)
    }
}

impl Neg for QM31 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.a, -self.b, -self.c, -self.d)
    }
}

impl Mul for QM31 {
    type Output = Self;

    /// (x0 + x1·u)(y0 + y1·u) = x0·y0 + x1·y1·(2 + i) + (x0·y1 + x1·y0)·u
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let (x0, x1) = self.halves();
        let (y0, y1) = rhs.halves();
        Self::from_halves(x0 * y0 + x1 * y1 * U_SQUARED, x0 * y1 + x1 * y0)
    }
}

impl AddAssign for QM31 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for QM31 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for QM31 {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl core::iter::Sum for QM31 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}
