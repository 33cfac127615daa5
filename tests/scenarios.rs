//! End-to-end coverage of the literal scenarios a complete
//! implementation of this generator is expected to satisfy: constraint
//! soundness under strict and non-strict mode, determinism across
//! repeated seeded compiles, uniqueness budgets, cross-field aggregate
//! correctness, and weighted-superposition convergence.

use pretty_assertions::assert_eq;
use vague::{compile, CompileOptions, VagueError, Warning};

fn options(seed: u64, strict: bool) -> CompileOptions {
    CompileOptions {
        seed: Some(seed),
        strict,
        ..Default::default()
    }
}

/// S1: an assumption that can never hold raises `ConstraintSatisfactionError`
/// under strict mode.
#[test]
fn s1_unsatisfiable_assumption_raises_under_strict_mode() {
    let source = r#"
        schema S { x: int in 1..10, assume x > 100 }
        dataset D { items: 1 of S }
    "#;
    let err = compile(source, options(1, true)).expect_err("assumption can never hold");
    match err {
        VagueError::ConstraintSatisfaction(e) => {
            assert_eq!(e.subject, "S");
            assert_eq!(e.mode, "satisfying");
            assert!(e.attempts >= 1);
        }
        other => panic!("expected ConstraintSatisfaction, got {other:?}"),
    }
}

/// S2: the same unsatisfiable assumption under non-strict mode keeps the
/// last attempt and records a `ConstraintRetryLimit` warning instead of
/// failing.
#[test]
fn s2_unsatisfiable_assumption_warns_under_non_strict_mode() {
    let source = r#"
        schema S { x: int in 1..10, assume x > 100 }
        dataset D { items: 1 of S }
    "#;
    let output = compile(source, options(1, false)).expect("non-strict keeps last attempt");
    let items = output.dataset.get("items").expect("items collection present");
    assert_eq!(items.len(), 1);
    let x = items[0].get("x").and_then(|v| v.as_f64()).expect("x is numeric");
    assert!((1.0..=10.0).contains(&x));
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::ConstraintRetryLimit { subject, mode, .. } if subject == "S" && *mode == "satisfying")));
}

/// S3: compiling the same source with the same seed twice yields
/// byte-identical output.
#[test]
fn s3_same_seed_is_deterministic() {
    let source = r#"
        schema Item { x: int in 1..1000 }
        dataset D { items: 10 of Item }
    "#;
    let opts = options(12345, false);
    let first = compile(source, opts).unwrap();
    let second = compile(source, opts).unwrap();
    assert_eq!(first.dataset, second.dataset);
}

/// S4: `unique(key, expr)` never repeats a value within the namespace's
/// value space when the requested count fits inside it.
#[test]
fn s4_unique_field_produces_distinct_values_within_range() {
    let source = r#"
        schema U { id: unique("u.id", int in 1..5) }
        dataset D { items: 5 of U }
    "#;
    let output = compile(source, options(2, false)).expect("five distinct ids fit in 1..5");
    let items = output.dataset.get("items").unwrap();
    assert_eq!(items.len(), 5);
    let mut ids: Vec<i64> = items
        .iter()
        .map(|r| match r.get("id") {
            Some(vague::Value::Int(i)) => *i,
            other => panic!("expected Int id, got {other:?}"),
        })
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5, "all five ids must be distinct");
    assert!(ids.iter().all(|id| (1..=5).contains(id)));
}

/// S4b: pushing uniqueness past the exhaustible range records the
/// exhaustion warning and still returns a value instead of failing.
#[test]
fn s4b_unique_field_exhaustion_emits_warning_when_range_too_small() {
    let source = r#"
        schema U { id: unique("u.id", int in 1..2) }
        dataset D { items: 6 of U }
    "#;
    let output = compile(source, options(2, false)).expect("exhaustion warns, does not fail");
    let items = output.dataset.get("items").unwrap();
    assert_eq!(items.len(), 6);
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::UniqueValueExhaustion { key, .. } if key == "u.id")));
}

/// S5: a computed field aggregating a sibling collection always sees
/// that collection's already-generated values, exactly.
#[test]
fn s5_computed_aggregate_matches_sum_of_generated_collection() {
    let source = r#"
        schema Line { amount: decimal in 1..10 }
        schema Inv {
            amount: decimal in 100..1000,
            lines: 3 of Line,
            total: = sum(lines.amount)
        }
        dataset D { invoices: 25 of Inv }
    "#;
    let output = compile(source, options(9, false)).expect("valid source");
    let invoices = output.dataset.get("invoices").unwrap();
    assert_eq!(invoices.len(), 25);
    for invoice in invoices {
        let total = match invoice.get("total") {
            Some(v) => v.as_f64().expect("total is numeric"),
            None => panic!("invoice missing computed total"),
        };
        let lines = match invoice.get("lines") {
            Some(vague::Value::List(items)) => items,
            other => panic!("expected lines list, got {other:?}"),
        };
        assert_eq!(lines.len(), 3);
        let expected: f64 = lines
            .iter()
            .map(|line| match line {
                vague::Value::Record(r) => r.get("amount").and_then(|v| v.as_f64()).unwrap(),
                other => panic!("expected line record, got {other:?}"),
            })
            .sum();
        assert!((total - expected).abs() < 1e-9, "total {total} != sum of lines {expected}");
    }
}

/// S7: a schema's `constraints` block rejects every record that violates
/// it, exactly like `assume`, but with no `if` gate to opt out of.
#[test]
fn s7_constraints_block_rejects_violating_records() {
    let source = r#"
        schema S {
            price: int in 1..10,
            constraints { price > 5 }
        }
        dataset D { items: 20 of S }
    "#;
    let output = compile(source, options(4, false)).expect("valid source");
    let items = output.dataset.get("items").unwrap();
    assert_eq!(items.len(), 20);
    for item in items {
        let price = item.get("price").and_then(|v| v.as_f64()).expect("price is numeric");
        assert!(price > 5.0, "constraints block should have rejected price {price}");
    }
}

/// S7b: an unsatisfiable `constraints` block is fatal under strict mode,
/// the same as an unsatisfiable `assume`.
#[test]
fn s7b_unsatisfiable_constraints_raises_under_strict_mode() {
    let source = r#"
        schema S {
            price: int in 1..10,
            constraints { price > 100 }
        }
        dataset D { items: 1 of S }
    "#;
    let err = compile(source, options(4, true)).expect_err("constraint can never hold");
    match err {
        VagueError::ConstraintSatisfaction(e) => assert_eq!(e.subject, "S"),
        other => panic!("expected ConstraintSatisfaction, got {other:?}"),
    }
}

/// S8: a nullable (`?`) field samples `null` with nonzero frequency
/// across many draws, instead of always producing a type-directed value.
#[test]
fn s8_nullable_field_sometimes_samples_null() {
    let source = r#"
        schema S { x: int in 1..10 ? }
        dataset D { items: 2000 of S }
    "#;
    let output = compile(source, options(5, false)).expect("valid source");
    let items = output.dataset.get("items").unwrap();
    assert_eq!(items.len(), 2000);
    let nulls = items.iter().filter(|r| matches!(r.get("x"), Some(vague::Value::Null))).count();
    let non_nulls = items.iter().filter(|r| matches!(r.get("x"), Some(vague::Value::Int(_)))).count();
    assert!(nulls > 0, "expected at least one null among 2000 draws");
    assert!(non_nulls > 0, "expected at least one non-null among 2000 draws");
}

/// S6: over many samples with a fixed seed, a weighted superposition's
/// empirical frequencies converge to `weight / sum(weights)` within a
/// statistical tolerance.
#[test]
fn s6_weighted_superposition_converges_to_declared_weights() {
    let source = r#"
        schema A { s: 0.8: "active" | 0.2: "inactive" }
        dataset D { items: 10000 of A }
    "#;
    let output = compile(source, options(77, false)).expect("valid source");
    let items = output.dataset.get("items").unwrap();
    assert_eq!(items.len(), 10000);
    let active = items
        .iter()
        .filter(|r| matches!(r.get("s"), Some(vague::Value::String(s)) if s == "active"))
        .count();
    let frequency = active as f64 / items.len() as f64;
    assert!(
        (0.78..=0.82).contains(&frequency),
        "observed active frequency {frequency} outside [0.78, 0.82]"
    );
}
