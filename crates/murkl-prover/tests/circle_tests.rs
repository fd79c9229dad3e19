//! Circle group, coset and polynomial tests

use murkl_prover::air::{eval_domain, trace_domain, EVAL_SIZE, TRACE_SIZE};
use murkl_prover::circle::{subgroup_generator, CirclePoint, Coset, CIRCLE_GENERATOR};
use murkl_prover::fri::{fold_layer, layer_domain, FRI_LAYERS, LAST_LAYER_SIZE};
use murkl_prover::m31::M31;
use murkl_prover::poly;
use murkl_prover::qm31::QM31;

// === Group law ===

#[test]
fn test_identity() {
    let g = CIRCLE_GENERATOR;
    assert_eq!(g.mul(CirclePoint::IDENTITY), g);
    assert_eq!(g.mul(g.conjugate()), CirclePoint::IDENTITY);
}

#[test]
fn test_new_rejects_off_circle() {
    assert!(CirclePoint::new(M31::new(2), M31::new(3)).is_none());
    assert!(CirclePoint::new(M31::ONE, M31::ZERO).is_some());
}

#[test]
fn test_pow_matches_repeated_mul() {
    let g = CIRCLE_GENERATOR;
    let mut acc = CirclePoint::IDENTITY;
    for _ in 0..13 {
        acc = acc.mul(g);
    }
    assert_eq!(g.pow(13), acc);
}

#[test]
fn test_subgroup_generator_order() {
    for log in [1, 4, 6, 10] {
        let g = subgroup_generator(log);
        assert_ne!(g.repeated_double(log - 1), CirclePoint::IDENTITY, "log {log}");
        assert_eq!(g.repeated_double(log), CirclePoint::IDENTITY, "log {log}");
    }
}

#[test]
fn test_antipode_is_negation() {
    let p = CIRCLE_GENERATOR.pow(12345);
    let q = p.antipode();
    assert_eq!(q.x, -p.x);
    assert_eq!(q.y, -p.y);
    assert_eq!(q.to_qm31(), -p.to_qm31());
}

// === Domains ===

#[test]
fn test_protocol_domains() {
    assert_eq!(trace_domain().size(), TRACE_SIZE);
    assert_eq!(eval_domain().size(), EVAL_SIZE);

    let trace: Vec<_> = trace_domain().points();
    let eval = eval_domain().points();
    assert!(eval.iter().all(|p| !trace.contains(p)));
    assert!(eval.iter().all(CirclePoint::is_on_circle));
}

#[test]
fn test_coset_points_are_distinct() {
    let points = Coset::odds(6).points();
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_layer_domains_shrink_by_squaring() {
    for k in 0..FRI_LAYERS {
        let domain = layer_domain(k);
        let next = layer_domain(k + 1);
        assert_eq!(domain.squared(), next);
        assert_eq!(domain.at(3).double(), next.at(3));
    }
}

// === Polynomials ===

#[test]
fn test_interpolate_then_evaluate() {
    let domain = trace_domain();
    let values: Vec<QM31> = (0..TRACE_SIZE as u32).map(|i| QM31::from_u32(i * i, i, 0, 7)).collect();
    let coeffs = poly::interpolate(&values, &domain);
    assert_eq!(poly::evaluate_on(&coeffs, &domain), values);
    for (i, point) in domain.points().into_iter().enumerate() {
        assert_eq!(poly::evaluate(&coeffs, point.to_qm31()), values[i]);
    }
}

#[test]
fn test_low_degree_extension_keeps_degree() {
    let coeffs: Vec<QM31> = (1..=TRACE_SIZE as u32).map(|i| QM31::from_u32(i, 0, 0, 0)).collect();
    let extended = poly::evaluate_on(&coeffs, &eval_domain());
    let back = poly::interpolate(&extended, &eval_domain());
    assert_eq!(poly::degree(&back), Some(TRACE_SIZE - 1));
    assert_eq!(&back[..TRACE_SIZE], &coeffs[..]);
}

#[test]
fn test_folding_halves_degree() {
    let coeffs: Vec<QM31> = (1..=TRACE_SIZE as u32).map(|i| QM31::from_u32(i, i + 1, 0, 0)).collect();
    let mut values = poly::evaluate_on(&coeffs, &layer_domain(0));
    let beta = QM31::from_u32(3, 1, 4, 1);
    for k in 0..FRI_LAYERS {
        values = fold_layer(&values, &layer_domain(k), beta);
    }
    let last = poly::interpolate(&values, &layer_domain(FRI_LAYERS));
    assert!(poly::degree(&last).map_or(true, |d| d < LAST_LAYER_SIZE));
}
