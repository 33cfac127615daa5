//! Core evaluation logic: `evaluate(expr, ctx, run) -> Result<Value, EvaluationError>`
//! (spec.md §4.3).

use crate::ast::{
    AGGREGATE_FUNCTIONS, BinaryOp, Expr, Literal, LogicalOp, MatchArm, Pattern, PrimitiveType, UnaryOp,
    WeightedOption,
};
use crate::builtins;
use crate::context::{EvalContext, RunState};
use crate::error::{EvaluationError, ResolutionError, Warning};
use crate::value::Value;

/// Evaluates `expr` against `ctx`, threading `run`'s mutable PRNG,
/// warnings collector and uniqueness/sequence state.
pub fn evaluate(expr: &Expr, ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Identifier(name) => resolve_identifier(name, ctx, run),
        Expr::QualifiedName(parts) => resolve_qualified(parts, ctx, run),
        Expr::ParentReference(parts) => Ok(resolve_parent(parts, ctx)),
        Expr::Binary { left, op, right } => eval_binary(left, *op, right, ctx, run),
        Expr::Unary { op, operand } => eval_unary(*op, operand, ctx, run),
        Expr::Logical { left, op, right } => eval_logical(left, *op, right, ctx, run),
        Expr::Not(e) => Ok(Value::Bool(!evaluate(e, ctx, run)?.is_truthy())),
        Expr::Ternary {
            condition,
            then_branch,
            else_branch,
        } => {
            if evaluate(condition, ctx, run)?.is_truthy() {
                evaluate(then_branch, ctx, run)
            } else {
                evaluate(else_branch, ctx, run)
            }
        }
        Expr::Range { min, max } => eval_range_value(min, max, ctx, run),
        Expr::TypedRange { base, min, max } => eval_typed_range(*base, min, max, ctx, run),
        Expr::Superposition(opts) => eval_superposition(opts, ctx, run),
        Expr::AnyOf {
            collection,
            predicate,
        } => eval_any_of(collection, predicate.as_deref(), ctx, run),
        Expr::Match { scrutinee, arms } => eval_match(scrutinee, arms, ctx, run),
        Expr::List(items) => items
            .iter()
            .map(|i| evaluate(i, ctx, run))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Call { callee, args } => eval_call(callee, args, ctx, run),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(i) => Value::Int(*i),
        Literal::Decimal(d) => Value::Decimal(*d),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

/// Identifier resolution order: current record, parent record, visible
/// collections, let-bindings, named distributions (spec.md §4.3).
/// Context-application bindings are folded into `ctx.bindings` by the
/// generator before a schema body runs, so they share the bindings
/// lookup. A name matching a top-level `distribution` statement is
/// resolved last, by weight-sampling its buckets.
pub fn resolve_identifier(name: &str, ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    if let Some(cur) = &ctx.current {
        if let Some(v) = cur.get(name) {
            return Ok(v.clone());
        }
    }
    if let Some(parent) = &ctx.parent {
        if let Some(v) = parent.get(name) {
            return Ok(v.clone());
        }
    }
    if let Some(items) = ctx.collections.get(name) {
        return Ok(Value::List(items.iter().cloned().map(Value::Record).collect()));
    }
    if let Some(v) = ctx.bindings.get(name) {
        return Ok(v.clone());
    }
    if let Some(dist) = run.distributions.get(name).cloned() {
        return eval_superposition(&dist.buckets, ctx, run);
    }
    Err(EvaluationError::Resolution(ResolutionError::UnknownIdentifier(name.to_string())))
}

fn resolve_qualified(parts: &[String], ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    let mut value = resolve_identifier(&parts[0], ctx, run)?;
    for part in &parts[1..] {
        value = project_field(&value, part);
    }
    Ok(value)
}

fn resolve_parent(parts: &[String], ctx: &EvalContext) -> Value {
    let Some(parent) = &ctx.parent else {
        return Value::Null;
    };
    let mut value = parent.get(&parts[0]).cloned().unwrap_or(Value::Null);
    for part in &parts[1..] {
        value = project_field(&value, part);
    }
    value
}

/// Projects `field` out of a record, or maps it over a list of records
/// (used by qualified names like `lines.amount` feeding an aggregate).
fn project_field(value: &Value, field: &str) -> Value {
    match value {
        Value::Record(r) => r.get(field).cloned().unwrap_or(Value::Null),
        Value::List(items) => Value::List(items.iter().map(|i| project_field(i, field)).collect()),
        _ => Value::Null,
    }
}

fn type_mismatch(expected: &str, found: &Value) -> EvaluationError {
    EvaluationError::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

fn eval_binary(left: &Expr, op: BinaryOp, right: &Expr, ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    let l = evaluate(left, ctx, run)?;
    let r = evaluate(right, ctx, run)?;
    match op {
        BinaryOp::Add => add_values(l, r),
        BinaryOp::Sub => numeric_binary(l, r, |a, b| a - b, |a, b| a - b),
        BinaryOp::Mul => numeric_binary(l, r, |a, b| a * b, |a, b| a * b),
        BinaryOp::Div => divide(l, r),
        BinaryOp::Mod => modulo(l, r),
        BinaryOp::Eq => Ok(Value::Bool(l == r)),
        BinaryOp::Ne => Ok(Value::Bool(l != r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare_values(l, r, op),
    }
}

/// Exposed for the `+=` mutation operator in `then` blocks (spec.md
/// §4.4), which shares the same int/decimal-promoting, string-concatenating
/// semantics as the `+` operator.
pub fn add_values(l: Value, r: Value) -> Result<Value, EvaluationError> {
    let either_string = matches!(l, Value::String(_)) || matches!(r, Value::String(_));
    if either_string {
        return Ok(Value::String(format!("{l}{r}")));
    }
    numeric_binary(l, r, |a, b| a + b, |a, b| a + b)
}

fn numeric_binary(
    l: Value,
    r: Value,
    f_i: impl Fn(i64, i64) -> i64,
    f_d: impl Fn(f64, f64) -> f64,
) -> Result<Value, EvaluationError> {
    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        return Ok(Value::Int(f_i(*a, *b)));
    }
    let a = l.as_f64().ok_or_else(|| type_mismatch("number", &l))?;
    let b = r.as_f64().ok_or_else(|| type_mismatch("number", &r))?;
    Ok(Value::Decimal(f_d(a, b)))
}

fn divide(l: Value, r: Value) -> Result<Value, EvaluationError> {
    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        if *b == 0 {
            return Err(EvaluationError::DivisionByZero);
        }
        if a % b == 0 {
            return Ok(Value::Int(a / b));
        }
        return Ok(Value::Decimal(*a as f64 / *b as f64));
    }
    let a = l.as_f64().ok_or_else(|| type_mismatch("number", &l))?;
    let b = r.as_f64().ok_or_else(|| type_mismatch("number", &r))?;
    if b == 0.0 {
        return Err(EvaluationError::DivisionByZero);
    }
    Ok(Value::Decimal(a / b))
}

fn modulo(l: Value, r: Value) -> Result<Value, EvaluationError> {
    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        if *b == 0 {
            return Err(EvaluationError::DivisionByZero);
        }
        return Ok(Value::Int(a % b));
    }
    let a = l.as_f64().ok_or_else(|| type_mismatch("number", &l))?;
    let b = r.as_f64().ok_or_else(|| type_mismatch("number", &r))?;
    if b == 0.0 {
        return Err(EvaluationError::DivisionByZero);
    }
    Ok(Value::Decimal(a % b))
}

fn compare_values(l: Value, r: Value, op: BinaryOp) -> Result<Value, EvaluationError> {
    let ordering = match (&l, &r) {
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        _ => {
            let a = l.as_f64().ok_or_else(|| type_mismatch("number or string", &l))?;
            let b = r.as_f64().ok_or_else(|| type_mismatch("number or string", &r))?;
            a.partial_cmp(&b)
        }
    };
    let Some(ord) = ordering else {
        return Err(EvaluationError::TypeMismatch {
            expected: "comparable values".to_string(),
            found: format!("{} vs {}", l.type_name(), r.type_name()),
        });
    };
    let result = match op {
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::Le => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        BinaryOp::Ge => ord.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn eval_unary(op: UnaryOp, operand: &Expr, ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    let v = evaluate(operand, ctx, run)?;
    match op {
        UnaryOp::Neg => match v {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Decimal(d) => Ok(Value::Decimal(-d)),
            other => Err(type_mismatch("number", &other)),
        },
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
    }
}

fn eval_logical(left: &Expr, op: LogicalOp, right: &Expr, ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    let l = evaluate(left, ctx, run)?;
    match op {
        LogicalOp::And => {
            if !l.is_truthy() {
                Ok(l)
            } else {
                evaluate(right, ctx, run)
            }
        }
        LogicalOp::Or => {
            if l.is_truthy() {
                Ok(l)
            } else {
                evaluate(right, ctx, run)
            }
        }
    }
}

fn eval_range_value(min: &Expr, max: &Expr, ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    let lo = evaluate(min, ctx, run)?;
    let hi = evaluate(max, ctx, run)?;
    if let (Value::Int(a), Value::Int(b)) = (&lo, &hi) {
        if b < a {
            return Err(EvaluationError::InvalidRange {
                min: a.to_string(),
                max: b.to_string(),
            });
        }
        return Ok(Value::Int(run.rng.range_i64(*a, *b)));
    }
    let a = lo.as_f64().ok_or_else(|| type_mismatch("number", &lo))?;
    let b = hi.as_f64().ok_or_else(|| type_mismatch("number", &hi))?;
    if b < a {
        return Err(EvaluationError::InvalidRange {
            min: a.to_string(),
            max: b.to_string(),
        });
    }
    Ok(Value::Decimal(run.rng.range_f64(a, b)))
}

/// `base in min..max` used as a plain expression (spec.md §4.4, §4.6) —
/// the same type-directed draw `generator::record::generate_range` uses
/// for a field's own `Range` type, reached here so it can also appear as
/// `unique`'s lazily-evaluated second argument.
fn eval_typed_range(
    base: PrimitiveType,
    min: &Expr,
    max: &Expr,
    ctx: &mut EvalContext,
    run: &mut RunState,
) -> Result<Value, EvaluationError> {
    let lo = evaluate(min, ctx, run)?;
    let hi = evaluate(max, ctx, run)?;
    match base {
        PrimitiveType::Int => {
            let a = lo.as_f64().ok_or_else(|| type_mismatch("number", &lo))? as i64;
            let b = hi.as_f64().ok_or_else(|| type_mismatch("number", &hi))? as i64;
            if b < a {
                return Err(EvaluationError::InvalidRange {
                    min: a.to_string(),
                    max: b.to_string(),
                });
            }
            Ok(Value::Int(run.rng.range_i64(a, b)))
        }
        PrimitiveType::Decimal => {
            let a = lo.as_f64().ok_or_else(|| type_mismatch("number", &lo))?;
            let b = hi.as_f64().ok_or_else(|| type_mismatch("number", &hi))?;
            if b < a {
                return Err(EvaluationError::InvalidRange {
                    min: a.to_string(),
                    max: b.to_string(),
                });
            }
            Ok(Value::Decimal(run.rng.range_f64(a, b)))
        }
        PrimitiveType::Date => builtins::date::call("dateBetween", &[lo, hi], run)
            .unwrap_or(Ok(Value::Null)),
        PrimitiveType::String | PrimitiveType::Boolean => Err(type_mismatch("int, decimal, or date", &lo)),
    }
}

/// Draws one option using weighted sampling and evaluates it (spec.md
/// §3, §4.3, §8 property 8).
pub fn eval_superposition(opts: &[WeightedOption], ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    if opts.is_empty() {
        return Err(EvaluationError::EmptySuperposition);
    }
    let mut weights = Vec::with_capacity(opts.len());
    for o in opts {
        let w = match &o.weight {
            Some(e) => evaluate(e, ctx, run)?.as_f64().unwrap_or(1.0),
            None => 1.0,
        };
        weights.push(w);
    }
    let idx = run.rng.weighted_index(&weights);
    evaluate(&opts[idx].value, ctx, run)
}

fn eval_any_of(
    collection: &str,
    predicate: Option<&Expr>,
    ctx: &mut EvalContext,
    run: &mut RunState,
) -> Result<Value, EvaluationError> {
    let items = ctx.collections.get(collection).cloned().unwrap_or_default();
    let mut candidates = Vec::new();
    for item in &items {
        let keep = match predicate {
            None => true,
            Some(pred) => {
                let v = ctx.with_current(Some(item.clone()), |c| evaluate(pred, c, run))?;
                v.is_truthy()
            }
        };
        if keep {
            candidates.push(item.clone());
        }
    }
    if candidates.is_empty() {
        run.emit_warning(Warning::EmptyCollectionReference {
            collection: collection.to_string(),
        });
        return Ok(Value::Null);
    }
    let idx = run.rng.index(candidates.len());
    Ok(Value::Record(candidates[idx].clone()))
}

fn eval_match(scrutinee: &Expr, arms: &[MatchArm], ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    let scrutinee_value = evaluate(scrutinee, ctx, run)?;
    for arm in arms {
        let matched = match &arm.pattern {
            Pattern::Wildcard => true,
            Pattern::Value(e) => evaluate(e, ctx, run)? == scrutinee_value,
        };
        if matched {
            return evaluate(&arm.result, ctx, run);
        }
    }
    run.emit_warning(Warning::NonExhaustiveMatch);
    Ok(Value::Null)
}

fn eval_call(callee: &str, args: &[Expr], ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    if AGGREGATE_FUNCTIONS.contains(&callee) {
        return eval_aggregate(callee, args, ctx, run);
    }
    if matches!(callee, "all" | "some" | "none") {
        return builtins::predicates::call(callee, args, ctx, run);
    }
    if callee == "unique" {
        return builtins::sequence::call_unique(args, ctx, run);
    }
    if callee == "previous" {
        return builtins::sequence::call_previous(args, ctx);
    }

    let mut evaluated = Vec::with_capacity(args.len());
    for a in args {
        evaluated.push(evaluate(a, ctx, run)?);
    }

    if let Some(result) = builtins::dispatch(callee, &evaluated, ctx, run)? {
        return Ok(result);
    }

    if let Some(registry) = run.plugins {
        if let Some(result) = registry.call(callee, &evaluated, ctx, args) {
            return result;
        }
    }

    Err(EvaluationError::Resolution(ResolutionError::UnknownCallable(
        callee.to_string(),
    )))
}

fn eval_aggregate(name: &str, args: &[Expr], ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(EvaluationError::ArityMismatch {
            name: name.to_string(),
            expected: "1".to_string(),
            found: args.len(),
        });
    }
    let projected = evaluate(&args[0], ctx, run)?;
    let items = match projected {
        Value::List(items) => items,
        other => vec![other],
    };
    let numeric: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();

    Ok(match name {
        "count" => Value::Int(items.len() as i64),
        "first" => items.first().cloned().unwrap_or(Value::Null),
        "last" => items.last().cloned().unwrap_or(Value::Null),
        "sum" => Value::Decimal(numeric.iter().sum()),
        "product" => Value::Decimal(numeric.iter().product()),
        "avg" => {
            if numeric.is_empty() {
                Value::Null
            } else {
                Value::Decimal(numeric.iter().sum::<f64>() / numeric.len() as f64)
            }
        }
        "median" => median(&numeric),
        "min" => numeric
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        "max" => numeric
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        _ => unreachable!("{name} is not in AGGREGATE_FUNCTIONS"),
    })
}

fn median(numeric: &[f64]) -> Value {
    if numeric.is_empty() {
        return Value::Null;
    }
    let mut sorted = numeric.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Value::Decimal((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Value::Decimal(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CompileOptions;
    use crate::value::Record;
    use std::collections::HashMap;

    fn run_state() -> RunState<'static> {
        RunState::new(
            CompileOptions {
                seed: Some(1),
                ..Default::default()
            },
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            None,
            None,
        )
    }

    #[test]
    fn adds_integers_without_promotion() {
        let mut ctx = EvalContext::new();
        let mut run = run_state();
        let expr = Expr::Binary {
            left: Box::new(Expr::Literal(Literal::Int(2))),
            op: BinaryOp::Add,
            right: Box::new(Expr::Literal(Literal::Int(3))),
        };
        assert_eq!(evaluate(&expr, &mut ctx, &mut run).unwrap(), Value::Int(5));
    }

    #[test]
    fn adds_mixed_int_and_decimal_by_promotion() {
        let mut ctx = EvalContext::new();
        let mut run = run_state();
        let expr = Expr::Binary {
            left: Box::new(Expr::Literal(Literal::Int(2))),
            op: BinaryOp::Add,
            right: Box::new(Expr::Literal(Literal::Decimal(0.5))),
        };
        assert_eq!(evaluate(&expr, &mut ctx, &mut run).unwrap(), Value::Decimal(2.5));
    }

    #[test]
    fn string_concatenation_with_plus() {
        let mut ctx = EvalContext::new();
        let mut run = run_state();
        let expr = Expr::Binary {
            left: Box::new(Expr::Literal(Literal::String("a".into()))),
            op: BinaryOp::Add,
            right: Box::new(Expr::Literal(Literal::String("b".into()))),
        };
        assert_eq!(
            evaluate(&expr, &mut ctx, &mut run).unwrap(),
            Value::String("ab".into())
        );
    }

    #[test]
    fn division_by_zero_errors() {
        let mut ctx = EvalContext::new();
        let mut run = run_state();
        let expr = Expr::Binary {
            left: Box::new(Expr::Literal(Literal::Int(1))),
            op: BinaryOp::Div,
            right: Box::new(Expr::Literal(Literal::Int(0))),
        };
        assert!(matches!(
            evaluate(&expr, &mut ctx, &mut run),
            Err(EvaluationError::DivisionByZero)
        ));
    }

    #[test]
    fn identifier_resolves_against_current_record_first() {
        let mut rec = Record::new();
        rec.set("x", Value::Int(7));
        let mut ctx = EvalContext {
            current: Some(rec),
            ..EvalContext::new()
        };
        let mut run = run_state();
        let expr = Expr::Identifier("x".to_string());
        assert_eq!(evaluate(&expr, &mut ctx, &mut run).unwrap(), Value::Int(7));
    }

    #[test]
    fn unresolved_identifier_is_a_resolution_error() {
        let mut ctx = EvalContext::new();
        let mut run = run_state();
        let expr = Expr::Identifier("nope".to_string());
        assert!(matches!(
            evaluate(&expr, &mut ctx, &mut run),
            Err(EvaluationError::Resolution(ResolutionError::UnknownIdentifier(_)))
        ));
    }

    #[test]
    fn identifier_falls_back_to_a_named_distribution() {
        use crate::ast::{DistributionDef, Span, WeightedOption};

        let mut distributions = HashMap::new();
        distributions.insert(
            "OnlyOption".to_string(),
            DistributionDef {
                name: "OnlyOption".to_string(),
                buckets: vec![WeightedOption {
                    weight: None,
                    value: Expr::Literal(Literal::String("active".into())),
                }],
                span: Span::default(),
            },
        );
        let mut run = RunState::new(
            CompileOptions {
                seed: Some(1),
                ..Default::default()
            },
            HashMap::new(),
            HashMap::new(),
            distributions,
            None,
            None,
        );
        let mut ctx = EvalContext::new();
        let expr = Expr::Identifier("OnlyOption".to_string());
        assert_eq!(
            evaluate(&expr, &mut ctx, &mut run).unwrap(),
            Value::String("active".into())
        );
    }

    #[test]
    fn match_falls_through_to_null_with_warning() {
        let mut ctx = EvalContext::new();
        let mut run = run_state();
        let expr = Expr::Match {
            scrutinee: Box::new(Expr::Literal(Literal::Int(1))),
            arms: vec![MatchArm {
                pattern: Pattern::Value(Expr::Literal(Literal::Int(2))),
                result: Expr::Literal(Literal::String("nope".into())),
            }],
        };
        assert_eq!(evaluate(&expr, &mut ctx, &mut run).unwrap(), Value::Null);
        assert_eq!(run.warnings.len(), 1);
    }

    #[test]
    fn ternary_short_circuits() {
        let mut ctx = EvalContext::new();
        let mut run = run_state();
        let expr = Expr::Ternary {
            condition: Box::new(Expr::Literal(Literal::Bool(true))),
            then_branch: Box::new(Expr::Literal(Literal::Int(1))),
            else_branch: Box::new(Expr::Literal(Literal::Int(2))),
        };
        assert_eq!(evaluate(&expr, &mut ctx, &mut run).unwrap(), Value::Int(1));
    }

    #[test]
    fn sum_aggregate_over_projected_list() {
        let mut r1 = Record::new();
        r1.set("amount", Value::Decimal(1.5));
        let mut r2 = Record::new();
        r2.set("amount", Value::Decimal(2.5));
        let mut ctx = EvalContext::new();
        ctx.collections.insert("lines".to_string(), vec![r1, r2]);
        let mut run = run_state();
        let expr = Expr::Call {
            callee: "sum".to_string(),
            args: vec![Expr::QualifiedName(vec!["lines".into(), "amount".into()])],
        };
        assert_eq!(evaluate(&expr, &mut ctx, &mut run).unwrap(), Value::Decimal(4.0));
    }
}
