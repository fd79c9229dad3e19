//! Univariate polynomials over QM31 in the complex coordinate of the circle
//!
//! Domains here are small (at most 64 points), so interpolation is a direct
//! O(n²) inverse DFT over the coset.

use crate::circle::Coset;
use crate::m31::M31;
use crate::qm31::QM31;

/// Horner evaluation of `coeffs` (lowest degree first) at `x`
pub fn evaluate(coeffs: &[QM31], x: QM31) -> QM31 {
    coeffs.iter().rev().fold(QM31::ZERO, |acc, c| acc * x + *c)
}

/// Evaluate at every point of a coset, in index order
pub fn evaluate_on(coeffs: &[QM31], coset: &Coset) -> Vec<QM31> {
    coset
        .points()
        .into_iter()
        .map(|p| evaluate(coeffs, p.to_qm31()))
        .collect()
}

/// Coefficients of the unique polynomial of degree < n taking `values[i]`
/// at `coset.at(i)`.
///
/// With points h·w^i the inverse DFT yields coefficients in Y = X / h; each
/// coefficient k is then divided by h^k.
pub fn interpolate(values: &[QM31], coset: &Coset) -> Vec<QM31> {
    let n = coset.size();
    debug_assert_eq!(values.len(), n);
    let w_inv = coset.step.conjugate().to_qm31();
    let n_inv = QM31::from_m31(M31::new(n as u32).inverse());
    let h_inv = coset.offset.conjugate().to_qm31();

    let mut coeffs = Vec::with_capacity(n);
    let mut step = QM31::ONE; // w^-k
    let mut h_pow = QM31::ONE; // h^-k
    for _ in 0..n {
        let mut acc = QM31::ZERO;
        let mut cur = QM31::ONE; // w^-ik
        for v in values {
            acc += *v * cur;
            cur *= step;
        }
        coeffs.push(acc * n_inv * h_pow);
        step *= w_inv;
        h_pow *= h_inv;
    }
    coeffs
}

/// Degree of the polynomial, `None` for zero
pub fn degree(coeffs: &[QM31]) -> Option<usize> {
    coeffs.iter().rposition(|c| !c.is_zero())
}
