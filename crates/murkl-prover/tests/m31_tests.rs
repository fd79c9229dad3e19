//! Field arithmetic tests for M31 and its extensions

use murkl_prover::m31::{batch_inverse, M31, M31_PRIME};
use murkl_prover::qm31::{CM31, QM31, QM31_BYTES};
use proptest::prelude::*;

fn m31() -> impl Strategy<Value = M31> {
    (0..M31_PRIME).prop_map(M31::new)
}

fn qm31() -> impl Strategy<Value = QM31> {
    (m31(), m31(), m31(), m31()).prop_map(|(a, b, c, d)| QM31::new(a, b, c, d))
}

// === M31 basics ===

#[test]
fn test_prime_reduces_to_zero() {
    assert_eq!(M31::new(M31_PRIME), M31::ZERO);
    assert_eq!(M31::new(M31_PRIME + 5).value(), 5);
    assert_eq!(M31::reduce(u64::from(M31_PRIME) * 3 + 7).value(), 7);
}

#[test]
fn test_from_canonical_rejects_p() {
    assert_eq!(M31::from_canonical(M31_PRIME - 1), Some(M31::new(M31_PRIME - 1)));
    assert_eq!(M31::from_canonical(M31_PRIME), None);
    assert_eq!(M31::from_canonical(u32::MAX), None);
}

#[test]
fn test_negation_and_subtraction() {
    let a = M31::new(10);
    assert_eq!(-a + a, M31::ZERO);
    assert_eq!(M31::new(3) - M31::new(5), M31::new(M31_PRIME - 2));
    assert_eq!(-M31::ZERO, M31::ZERO);
}

#[test]
fn test_fermat() {
    let a = M31::new(123_456_789);
    assert_eq!(a.pow(u64::from(M31_PRIME) - 1), M31::ONE);
}

#[test]
fn test_zero_has_no_inverse() {
    assert_eq!(M31::ZERO.try_inverse(), None);
    assert_eq!(M31::ZERO.inverse(), M31::ZERO);
}

#[test]
fn test_batch_inverse_matches_single() {
    let values: Vec<M31> = (1..50).map(|i| M31::new(i * 7919)).collect();
    let inverses = batch_inverse(&values);
    for (v, inv) in values.iter().zip(&inverses) {
        assert_eq!(*v * *inv, M31::ONE, "inverse of {v}");
    }
}

#[test]
fn test_le_bytes() {
    let a = M31::new(0x1234_5678);
    assert_eq!(a.to_le_bytes(), [0x78, 0x56, 0x34, 0x12]);
    assert_eq!(M31::from_le_bytes(a.to_le_bytes()), a);
}

#[test]
fn test_sum_and_product() {
    let values = [M31::new(2), M31::new(3), M31::new(4)];
    assert_eq!(values.iter().copied().sum::<M31>(), M31::new(9));
    assert_eq!(values.iter().copied().product::<M31>(), M31::new(24));
}

// === Extension fields ===

#[test]
fn test_cm31_i_squared() {
    let i = CM31::new(M31::ZERO, M31::ONE);
    assert_eq!(i * i, -CM31::ONE);
}

#[test]
fn test_qm31_embeds_m31() {
    let a = M31::new(77);
    let b = M31::new(91);
    assert_eq!(QM31::from_m31(a) * QM31::from_m31(b), QM31::from_m31(a * b));
    assert_eq!(QM31::from(a) + QM31::from(b), QM31::from_m31(a + b));
}

#[test]
fn test_qm31_bytes_layout() {
    let x = QM31::from_u32(1, 2, 3, 4);
    let bytes = x.to_bytes();
    assert_eq!(bytes.len(), QM31_BYTES);
    assert_eq!(&bytes[..4], &1u32.to_le_bytes());
    assert_eq!(&bytes[12..], &4u32.to_le_bytes());
    assert_eq!(QM31::from_canonical_bytes(&bytes), Some(x));

    let mut bad = bytes;
    bad[8..12].copy_from_slice(&M31_PRIME.to_le_bytes());
    assert_eq!(QM31::from_canonical_bytes(&bad), None);
}

proptest! {
    #[test]
    fn prop_m31_field_laws(a in m31(), b in m31(), c in m31()) {
        prop_assert_eq!(a + b, b + a);
        prop_assert_eq!(a * b, b * a);
        prop_assert_eq!((a + b) * c, a * c + b * c);
        prop_assert_eq!(a - b + b, a);
        prop_assert_eq!(a.square(), a * a);
        prop_assert_eq!(a.double(), a + a);
    }

    #[test]
    fn prop_m31_inverse(a in 1..M31_PRIME) {
        let a = M31::new(a);
        prop_assert_eq!(a * a.inverse(), M31::ONE);
        prop_assert_eq!(a / a, M31::ONE);
    }

    #[test]
    fn prop_qm31_field_laws(a in qm31(), b in qm31(), c in qm31()) {
        prop_assert_eq!(a * b, b * a);
        prop_assert_eq!((a * b) * c, a * (b * c));
        prop_assert_eq!(a * (b + c), a * b + a * c);
        prop_assert_eq!(a.square(), a * a);
    }

    #[test]
    fn prop_qm31_inverse(a in qm31()) {
        prop_assume!(!a.is_zero());
        prop_assert_eq!(a * a.inverse(), QM31::ONE);
    }
}
