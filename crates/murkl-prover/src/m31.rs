//! M31 (Mersenne-31) prime field
//!
//! The Mersenne-31 prime: p = 2^31 - 1 = 2147483647
//!
//! Every trace cell, public input and hash-derived secret in Murkl is an
//! element of this field. Products of two elements fit in a `u64` and reduce
//! with two shifts and an add.

use bytemuck::{Pod, Zeroable};
use core::fmt::{self, Display};
use core::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// The Mersenne-31 prime: 2^31 - 1
pub const M31_PRIME: u32 = (1 << 31) - 1;

/// An element of the M31 field, always kept in canonical form `[0, p)`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct M31(u32);

impl M31 {
    /// Zero element
    pub const ZERO: Self = Self(0);

    /// One element (multiplicative identity)
    pub const ONE: Self = Self(1);

    /// Create a new M31 element from any u32, reducing modulo p
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self::reduce(value as u64)
    }

    /// Accept a value only if it is already canonical.
    ///
    /// Used by the wire decoder: a proof that encodes `p` instead of `0`
    /// is malformed, not equivalent.
    #[inline]
    pub const fn from_canonical(value: u32) -> Option<Self> {
        if value < M31_PRIME {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Reduce a 64-bit value modulo p.
    ///
    /// Valid for any `x < 2^62`, which covers every product of two
    /// canonical elements.
    #[inline]
    pub const fn reduce(x: u64) -> Self {
        let folded = (x & M31_PRIME as u64) + (x >> 31);
        let folded = (folded & M31_PRIME as u64) + (folded >> 31);
        let v = folded as u32;
        Self(if v >= M31_PRIME { v - M31_PRIME } else { v })
    }

    #[inline]
    pub const fn square(self) -> Self {
        Self::reduce(self.0 as u64 * self.0 as u64)
    }

    #[inline]
    pub const fn double(self) -> Self {
        let v = self.0 << 1;
        Self(if v >= M31_PRIME { v - M31_PRIME } else { v })
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

    /// Multiplicative inverse via Fermat: a^(p-2).
    ///
    /// Returns `None` for zero.
    pub fn try_inverse(self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(self.pow(M31_PRIME as u64 - 2))
        }
    }

    /// Multiplicative inverse. Zero maps to zero.
    #[inline]
    pub fn inverse(self) -> Self {
        self.try_inverse().unwrap_or(Self::ZERO)
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Get the canonical representative
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Little-endian encoding of the canonical representative
    #[inline]
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Decode a little-endian u32, reducing modulo p
    #[inline]
    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self::new(u32::from_le_bytes(bytes))
    }
}

/// Invert a batch of elements with a single field inversion (Montgomery's trick).
///
/// Zero entries stay zero.
pub fn batch_inverse(values: &[M31]) -> Vec<M31> {
    let mut prefix = Vec::with_capacity(values.len());
    let mut acc = M31::ONE;
    for v in values {
        prefix.push(acc);
        if !v.is_zero() {
            acc *= *v;
        }
    }

    let mut inv = acc.inverse();
    let mut out = vec![M31::ZERO; values.len()];
    for (i, v) in values.iter().enumerate().rev() {
        if v.is_zero() {
            continue;
        }
        out[i] = inv * prefix[i];
        inv *= *v;
    }
    out
}

impl Display for M31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for M31 {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<M31> for u32 {
    #[inline]
    fn from(value: M31) -> Self {
        value.0
    }
}

impl Add for M31 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        // Both operands < 2^31, so the sum fits in u32.
        let sum = self.0 + rhs.0;
        Self(if sum >= M31_PRIME { sum - M31_PRIME } else { sum })
    }
}

impl Sub for M31 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        if self.0 >= rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self(self.0 + M31_PRIME - rhs.0)
        }
    }
}

impl Mul for M31 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::reduce(self.0 as u64 * rhs.0 as u64)
    }
}

impl Div for M31 {
    type Output = Self;

    #[inline]
    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, rhs: Self) -> Self {
        self * rhs.inverse()
    }
}

impl Neg for M31 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        if self.0 == 0 {
            self
        } else {
            Self(M31_PRIME - self.0)
        }
    }
}

impl AddAssign for M31 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for M31 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for M31 {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl core::iter::Sum for M31 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl core::iter::Product for M31 {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ONE, |acc, x| acc * x)
    }
}
