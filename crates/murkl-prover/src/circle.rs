//! Circle group over M31 and the evaluation domains built from it
//!
//! The circle curve x² + y² = 1 over M31 has p + 1 = 2^31 points and is
//! cyclic. Identifying (x, y) with x + yi ∈ CM31, the group law is complex
//! multiplication, so every power-of-two subgroup and its cosets are
//! multiplicative subsets of CM31. The AIR and FRI treat polynomials as
//! univariate in that complex coordinate.

use crate::m31::M31;
use crate::qm31::{CM31, QM31};
use core::fmt;

/// log2 of the circle group order
pub const CIRCLE_LOG_ORDER: u32 = 31;

/// A point on the circle x² + y² = 1 over M31
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CirclePoint {
    pub x: M31,
    pub y: M31,
}

/// Generator of the full circle group (order 2^31)
pub const CIRCLE_GENERATOR: CirclePoint = CirclePoint {
    x: M31::new(2),
    y: M31::new(1_268_011_823),
};

impl fmt::Debug for CirclePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CirclePoint({}, {})", self.x.value(), self.y.value())
    }
}

impl CirclePoint {
    /// The identity element (1, 0)
    pub const IDENTITY: Self = Self {
        x: M31::ONE,
        y: M31::ZERO,
    };

    /// Create a point, checking it lies on the circle
    pub fn new(x: M31, y: M31) -> Option<Self> {
        let point = Self { x, y };
        point.is_on_circle().then_some(point)
    }

    #[inline]
    pub fn is_on_circle(&self) -> bool {
        self.x.square() + self.y.square() == M31::ONE
    }

    /// Group operation: (x1·x2 - y1·y2, x1·y2 + y1·x2)
    #[inline]
    pub fn mul(self, other: Self) -> Self {
        Self {
            x: self.x * other.x - self.y * other.y,
            y: self.x * other.y + self.y * other.x,
        }
    }

    /// Group inverse: (x, -y)
    #[inline]
    pub fn conjugate(self) -> Self {
        Self {
            x: self.x,
            y: -self.y,
        }
    }

    /// Antipodal point (-x, -y), i.e. the product with the order-2 element
    #[inline]
    pub fn antipode(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }

    /// Squaring in the group: (2x² - 1, 2xy)
    #[inline]
    pub fn double(self) -> Self {
        Self {
            x: self.x.square().double() - M31::ONE,
            y: (self.x * self.y).double(),
        }
    }

    pub fn repeated_double(self, n: u32) -> Self {
        (0..n).fold(self, |p, _| p.double())
    }

    /// Scalar exponentiation in the group
    pub fn pow(self, mut exp: u64) -> Self {
        let mut base = self;
        let mut acc = Self::IDENTITY;
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc.mul(base);
            }
            base = base.double();
            exp >>= 1;
        }
        acc
    }

    /// The point as the complex number x + yi
    #[inline]
    pub fn to_cm31(self) -> CM31 {
        CM31::new(self.x, self.y)
    }

    #[inline]
    pub fn to_qm31(self) -> QM31 {
        QM31::from_cm31(self.to_cm31())
    }
}

/// Generator of the unique subgroup of order 2^log_size
pub fn subgroup_generator(log_size: u32) -> CirclePoint {
    assert!(log_size <= CIRCLE_LOG_ORDER, "subgroup larger than the circle");
    CIRCLE_GENERATOR.repeated_double(CIRCLE_LOG_ORDER - log_size)
}

/// A coset `offset · <step>` of size 2^log_size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coset {
    pub offset: CirclePoint,
    pub step: CirclePoint,
    pub log_size: u32,
}

impl Coset {
    /// The subgroup of order 2^log_size itself
    pub fn subgroup(log_size: u32) -> Self {
        Self {
            offset: CirclePoint::IDENTITY,
            step: subgroup_generator(log_size),
            log_size,
        }
    }

    /// The subgroup of order 2^log_size shifted by a generator of order
    /// 2^(log_size + 1).
    ///
    /// Disjoint from every subgroup of order <= 2^log_size, so vanishing
    /// polynomials of smaller subgroups never hit zero on it.
    pub fn odds(log_size: u32) -> Self {
        Self {
            offset: subgroup_generator(log_size + 1),
            step: subgroup_generator(log_size),
            log_size,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        1 << self.log_size
    }

    /// The i-th point, `offset · step^i`
    pub fn at(&self, index: usize) -> CirclePoint {
        self.offset.mul(self.step.pow(index as u64))
    }

    /// All points in index order
    pub fn points(&self) -> Vec<CirclePoint> {
        let mut out = Vec::with_capacity(self.size());
        let mut cur = self.offset;
        for _ in 0..self.size() {
            out.push(cur);
            cur = cur.mul(self.step);
        }
        out
    }

    /// Image under squaring: a coset of half the size.
    ///
    /// Point `i` of the result is the square of point `i` (and of point
    /// `i + size/2`) of `self`.
    pub fn squared(&self) -> Self {
        Self {
            offset: self.offset.double(),
            step: self.step.double(),
            log_size: self.log_size - 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_order() {
        assert!(CIRCLE_GENERATOR.is_on_circle());
        let half = CIRCLE_GENERATOR.repeated_double(30);
        assert_ne!(half, CirclePoint::IDENTITY);
        assert_eq!(half.double(), CirclePoint::IDENTITY);
    }

    #[test]
    fn test_double_matches_mul() {
        let p = CIRCLE_GENERATOR.pow(12345);
        assert_eq!(p.double(), p.mul(p));
        assert!(p.is_on_circle());
    }

    #[test]
    fn test_complex_embedding_is_homomorphic() {
        let p = CIRCLE_GENERATOR.pow(77);
        let q = CIRCLE_GENERATOR.pow(1000);
        assert_eq!(p.mul(q).to_cm31(), p.to_cm31() * q.to_cm31());
    }

    #[test]
    fn test_coset_halves_are_antipodal() {
        let coset = Coset::odds(6);
        let pts = coset.points();
        let half = pts.len() / 2;
        for i in 0..half {
            assert_eq!(pts[i + half], pts[i].antipode());
        }
    }

    #[test]
    fn test_squared_coset() {
        let coset = Coset::odds(6);
        let sq = coset.squared();
        assert_eq!(sq.size(), 32);
        for i in 0..sq.size() {
            assert_eq!(sq.at(i), coset.at(i).double());
        }
    }

    #[test]
    fn test_odds_disjoint_from_subgroup() {
        let trace: Vec<_> = Coset::subgroup(4).points();
        for p in Coset::odds(6).points() {
            assert!(!trace.contains(&p));
        }
    }
}
