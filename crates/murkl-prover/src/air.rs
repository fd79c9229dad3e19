//! Murkl AIR (Algebraic Intermediate Representation)
//!
//! The execution trace has [`N_COLUMNS`] columns and [`TRACE_SIZE`] rows:
//!
//! | Column | Content                                                   |
//! |--------|-----------------------------------------------------------|
//! | 0      | public-input felts at rows 0..4, witness stream elsewhere |
//! | 1, 2   | witness stream                                            |
//! | 3      | (t0 + t1) · t2                                            |
//!
//! Two constraints make up the composition polynomial:
//!
//! - transition, on every row: `t3 - (t0 + t1)·t2 = 0`
//! - boundary, on rows 0..4: `t0 = I(x)` where `I` interpolates the
//!   public inputs (commitment, nullifier, merkle root, recipient)
//!
//! The witness stream is keyed by the secret and a per-proof salt, so the
//! out-of-domain samples reveal nothing reusable about either.
//!
//! No constraint ties the commitment or nullifier felt to the witness
//! columns. The keccak relation between them and the secret is checked by
//! the prover before a trace is built, not by this AIR. A column has
//! [`TRACE_SIZE`] rows and a proof opens it at up to twice
//! [`crate::fri::N_QUERIES`] points, which generally determines the whole
//! polynomial, so a secret placed in the trace would be published with it.

use crate::circle::Coset;
use crate::hash::{domain, hash_to_m31, keccak_hash};
use crate::m31::M31;
use crate::qm31::QM31;
use crate::types::Witness;

/// log2 of the number of trace rows
pub const LOG_TRACE_SIZE: u32 = 4;

/// Number of trace rows
pub const TRACE_SIZE: usize = 1 << LOG_TRACE_SIZE;

/// log2 of the Reed-Solomon blowup
pub const LOG_BLOWUP: u32 = 2;

/// log2 of the evaluation domain size
pub const LOG_EVAL_SIZE: u32 = LOG_TRACE_SIZE + LOG_BLOWUP;

/// Number of points in the evaluation domain
pub const EVAL_SIZE: usize = 1 << LOG_EVAL_SIZE;

/// Number of trace columns
pub const N_COLUMNS: usize = 4;

/// Number of public-input rows pinned in column 0
pub const N_PUBLIC_ROWS: usize = 4;

/// One trace row, or the trace polynomials evaluated at one point
pub type TraceRow = [QM31; N_COLUMNS];

/// The domain the trace is interpolated over
pub fn trace_domain() -> Coset {
    Coset::subgroup(LOG_TRACE_SIZE)
}

/// The blown-up domain everything is committed over
pub fn eval_domain() -> Coset {
    Coset::odds(LOG_EVAL_SIZE)
}

/// Column-major trace
pub struct Trace {
    pub columns: [Vec<M31>; N_COLUMNS],
}

impl Trace {
    /// Fill the trace for a witness and its public-input felts
    pub fn generate(witness: &Witness, public_felts: &[M31; N_PUBLIC_ROWS]) -> Self {
        let stream = |column: u8, row: usize| -> M31 {
            hash_to_m31(&keccak_hash(&[
                domain::TRACE,
                &witness.salt,
                &witness.secret.id_hash.to_le_bytes(),
                &witness.secret.secret.to_le_bytes(),
                &[column],
                &(row as u32).to_le_bytes(),
            ]))
        };

        let mut columns: [Vec<M31>; N_COLUMNS] = Default::default();
        for row in 0..TRACE_SIZE {
            let t0 = if row < N_PUBLIC_ROWS {
                public_felts[row]
            } else {
                stream(0, row)
            };
            let t1 = stream(1, row);
            let t2 = stream(2, row);
            columns[0].push(t0);
            columns[1].push(t1);
            columns[2].push(t2);
            columns[3].push((t0 + t1) * t2);
        }
        Self { columns }
    }

    /// Check both constraints directly on the rows
    pub fn is_satisfied(&self, public_felts: &[M31; N_PUBLIC_ROWS]) -> bool {
        let transition = (0..TRACE_SIZE).all(|r| {
            let c = &self.columns;
            c[3][r] == (c[0][r] + c[1][r]) * c[2][r]
        });
        let boundary = (0..N_PUBLIC_ROWS).all(|r| self.columns[0][r] == public_felts[r]);
        transition && boundary
    }
}

/// x^TRACE_SIZE - 1, zero exactly on the trace domain
pub fn trace_vanishing(x: QM31) -> QM31 {
    x.pow(TRACE_SIZE as u64) - QM31::ONE
}

/// Trace-domain points carrying public inputs
pub fn boundary_points() -> [QM31; N_PUBLIC_ROWS] {
    let domain = trace_domain();
    core::array::from_fn(|k| domain.at(k).to_qm31())
}

/// Product of (x - b) over the boundary points
pub fn boundary_vanishing(x: QM31) -> QM31 {
    boundary_points().iter().fold(QM31::ONE, |acc, b| acc * (x - *b))
}

/// Lagrange interpolant of the public-input felts over the boundary points
pub fn boundary_interpolant(public_felts: &[M31; N_PUBLIC_ROWS], x: QM31) -> QM31 {
    let points = boundary_points();
    let mut acc = QM31::ZERO;
    for k in 0..N_PUBLIC_ROWS {
        let mut num = QM31::ONE;
        let mut den = QM31::ONE;
        for m in 0..N_PUBLIC_ROWS {
            if m != k {
                num *= x - points[m];
                den *= points[k] - points[m];
            }
        }
        acc += (num * den.inverse()).mul_m31(public_felts[k]);
    }
    acc
}

/// Composition polynomial evaluated from the trace polynomials at `x`
pub fn composition_at(
    row: &TraceRow,
    alpha: QM31,
    x: QM31,
    public_felts: &[M31; N_PUBLIC_ROWS],
) -> QM31 {
    let transition = row[3] - (row[0] + row[1]) * row[2];
    let boundary = row[0] - boundary_interpolant(public_felts, x);
    transition * trace_vanishing(x).inverse() + alpha * boundary * boundary_vanishing(x).inverse()
}

/// Merkle leaf of the trace commitment: the rows at an antipodal pair
pub fn trace_leaf(row: &TraceRow, antipode: &TraceRow) -> Vec<u8> {
    row.iter()
        .chain(antipode.iter())
        .flat_map(|v| v.to_bytes())
        .collect()
}

/// Values at the out-of-domain point, shared by the DEEP quotient
#[derive(Clone, Copy, Debug)]
pub struct OodsSample {
    pub point: QM31,
    pub trace: TraceRow,
    pub composition: QM31,
    pub gamma: QM31,
}

impl OodsSample {
    /// DEEP quotient at a domain point `x`:
    /// Σ γ^j (t_j(x) - t_j(z)) / (x - z) + γ^4 (C(x) - C(z)) / (x - z)
    pub fn deep_quotient(&self, x: QM31, trace_x: &TraceRow, composition_x: QM31) -> QM31 {
        let den = (x - self.point).inverse();
        let mut acc = QM31::ZERO;
        let mut gamma_pow = QM31::ONE;
        for j in 0..N_COLUMNS {
            acc += gamma_pow * (trace_x[j] - self.trace[j]) * den;
            gamma_pow *= self.gamma;
        }
        acc + gamma_pow * (composition_x - self.composition) * den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Secret;
    use crate::poly;

    fn witness() -> Witness {
        Witness::new(Secret::from_credentials("@alice", "pw"), 0, [7u8; 32])
    }

    fn felts() -> [M31; 4] {
        [M31::new(10), M31::new(20), M31::new(30), M31::new(40)]
    }

    #[test]
    fn test_trace_satisfies_constraints() {
        let trace = Trace::generate(&witness(), &felts());
        assert!(trace.is_satisfied(&felts()));
        assert!(!trace.is_satisfied(&[M31::ONE; 4]));
    }

    #[test]
    fn test_salt_changes_witness_columns() {
        let a = Trace::generate(&witness(), &felts());
        let mut w = witness();
        w.salt = [8u8; 32];
        let b = Trace::generate(&w, &felts());
        assert_ne!(a.columns[1], b.columns[1]);
        assert_eq!(a.columns[0][..4], b.columns[0][..4]);
    }

    #[test]
    fn test_boundary_interpolant_hits_public_inputs() {
        let points = boundary_points();
        for (k, p) in points.iter().enumerate() {
            assert_eq!(boundary_interpolant(&felts(), *p), QM31::from_m31(felts()[k]));
        }
    }

    #[test]
    fn test_composition_is_low_degree() {
        let trace = Trace::generate(&witness(), &felts());
        let td = trace_domain();
        let coeffs: Vec<Vec<QM31>> = trace
            .columns
            .iter()
            .map(|c| poly::interpolate(&c.iter().map(|v| QM31::from_m31(*v)).collect::<Vec<_>>(), &td))
            .collect();

        let alpha = QM31::from_u32(3, 1, 4, 1);
        let ed = eval_domain();
        let comp: Vec<QM31> = ed
            .points()
            .iter()
            .map(|p| {
                let x = p.to_qm31();
                let row: TraceRow = core::array::from_fn(|j| poly::evaluate(&coeffs[j], x));
                composition_at(&row, alpha, x, &felts())
            })
            .collect();
        let c = poly::interpolate(&comp, &ed);
        assert!(poly::degree(&c).unwrap() < TRACE_SIZE);
    }
}
