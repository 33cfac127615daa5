//! `sequence`/`sequenceInt` (eagerly-evaluated) and `previous`/`unique`
//! (raw-AST, dispatched directly by the interpreter) — spec.md §4.6, §9.

use crate::ast::Expr;
use crate::context::{EvalContext, RunState};
use crate::error::{EvaluationError, Warning};
use crate::eval::evaluate;
use crate::value::Value;

pub fn call(name: &str, args: &[Value], run: &mut RunState) -> Option<Result<Value, EvaluationError>> {
    if !matches!(name, "sequence" | "sequenceInt") {
        return None;
    }
    Some(sequence(args, run))
}

fn sequence(args: &[Value], run: &mut RunState) -> Result<Value, EvaluationError> {
    let name = match args.first() {
        Some(Value::String(s)) => s.clone(),
        other => {
            return Err(EvaluationError::TypeMismatch {
                expected: "string".to_string(),
                found: other.map(Value::type_name).unwrap_or("nothing").to_string(),
            })
        }
    };
    let start = args.get(1).and_then(Value::as_f64).unwrap_or(0.0) as i64;
    let step = args.get(2).and_then(Value::as_f64).unwrap_or(1.0) as i64;
    Ok(Value::Int(run.next_sequence(&name, start, step)))
}

/// `previous(fieldExpr)` — `fieldExpr` names a field on the previous
/// record in the same collection; `null` at the head (spec.md §4.6).
pub fn call_previous(args: &[Expr], ctx: &EvalContext) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(EvaluationError::ArityMismatch {
            name: "previous".to_string(),
            expected: "1".to_string(),
            found: args.len(),
        });
    }
    let field = match &args[0] {
        Expr::Identifier(name) => name.clone(),
        Expr::QualifiedName(parts) => parts.join("."),
        _ => {
            return Err(EvaluationError::TypeMismatch {
                expected: "field reference".to_string(),
                found: "expression".to_string(),
            })
        }
    };
    Ok(ctx.previous.as_ref().and_then(|r| r.get(&field)).cloned().unwrap_or(Value::Null))
}

/// `unique(key, expr)` — retries `expr` up to the run's unique retry
/// budget until a not-yet-seen value under `key` is produced, emitting
/// `UniqueValueExhaustion` and returning the last attempt otherwise.
pub fn call_unique(args: &[Expr], ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(EvaluationError::ArityMismatch {
            name: "unique".to_string(),
            expected: "2".to_string(),
            found: args.len(),
        });
    }
    let key = match evaluate(&args[0], ctx, run)? {
        Value::String(s) => s,
        other => other.to_string(),
    };
    let limit = run.options.retry_limits.unique;
    let mut last = Value::Null;
    for attempt in 1..=limit {
        let candidate = evaluate(&args[1], ctx, run)?;
        last = candidate.clone();
        if run.try_reserve_unique(&key, &candidate) {
            return Ok(candidate);
        }
        if attempt == limit {
            run.emit_warning(Warning::UniqueValueExhaustion { key: key.clone(), attempts: limit });
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::options::CompileOptions;
    use crate::value::Record;
    use std::collections::HashMap;

    fn run_state() -> RunState<'static> {
        RunState::new(
            CompileOptions::default(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            None,
            None,
        )
    }

    #[test]
    fn sequence_increments_per_name() {
        let mut run = run_state();
        let args = vec![Value::String("id".into())];
        assert_eq!(sequence(&args, &mut run).unwrap(), Value::Int(0));
        assert_eq!(sequence(&args, &mut run).unwrap(), Value::Int(1));
    }

    #[test]
    fn previous_is_null_at_head() {
        let ctx = EvalContext::new();
        let args = vec![Expr::Identifier("amount".into())];
        assert_eq!(call_previous(&args, &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn previous_reads_the_prior_record() {
        let mut prior = Record::new();
        prior.set("amount", Value::Int(42));
        let ctx = EvalContext {
            previous: Some(prior),
            ..EvalContext::new()
        };
        let args = vec![Expr::Identifier("amount".into())];
        assert_eq!(call_previous(&args, &ctx).unwrap(), Value::Int(42));
    }

    #[test]
    fn unique_retries_until_distinct_then_exhausts() {
        let mut ctx = EvalContext::new();
        let mut run = run_state();
        let args = vec![
            Expr::Literal(Literal::String("k".into())),
            Expr::Literal(Literal::Int(1)),
        ];
        assert_eq!(call_unique(&args, &mut ctx, &mut run).unwrap(), Value::Int(1));
        // Same constant again: every attempt collides, budget exhausts.
        let result = call_unique(&args, &mut ctx, &mut run).unwrap();
        assert_eq!(result, Value::Int(1));
        assert_eq!(run.warnings.len(), 1);
    }
}
