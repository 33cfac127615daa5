//! `all`/`some`/`none` (spec.md §4.6, §9): the predicate argument is
//! raw AST, re-evaluated once per element with `current` set to that
//! element so `.field` resolves on it.

use crate::ast::Expr;
use crate::context::{EvalContext, RunState};
use crate::error::EvaluationError;
use crate::eval::evaluate;
use crate::value::Value;

pub fn call(name: &str, args: &[Expr], ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(EvaluationError::ArityMismatch {
            name: name.to_string(),
            expected: "2".to_string(),
            found: args.len(),
        });
    }
    let list_value = evaluate(&args[0], ctx, run)?;
    let items = match list_value {
        Value::List(items) => items,
        other => vec![other],
    };
    let predicate = &args[1];

    let mut truths = Vec::with_capacity(items.len());
    for item in &items {
        let current = match item {
            Value::Record(r) => Some(r.clone()),
            _ => None,
        };
        let result = ctx.with_current(current, |c| evaluate(predicate, c, run))?;
        truths.push(result.is_truthy());
    }

    Ok(Value::Bool(match name {
        "all" => truths.iter().all(|&b| b),
        "some" => truths.iter().any(|&b| b),
        "none" => !truths.iter().any(|&b| b),
        _ => unreachable!("{name} is not a predicate built-in"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Literal};
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

    fn positive_amount_predicate() -> Vec<Expr> {
        vec![
            Expr::Identifier("items".into()),
            Expr::Binary {
                left: Box::new(Expr::Identifier("amount".into())),
                op: BinaryOp::Gt,
                right: Box::new(Expr::Literal(Literal::Int(0))),
            },
        ]
    }

    #[test]
    fn all_is_true_for_empty_list() {
        let mut ctx = EvalContext::new();
        ctx.bindings.insert("items".to_string(), Value::List(vec![]));
        let mut run = run_state();
        assert_eq!(call("all", &positive_amount_predicate(), &mut ctx, &mut run).unwrap(), Value::Bool(true));
    }

    #[test]
    fn some_finds_a_matching_record() {
        let mut negative = Record::new();
        negative.set("amount", Value::Int(-1));
        let mut positive = Record::new();
        positive.set("amount", Value::Int(5));
        let mut ctx = EvalContext::new();
        ctx.bindings.insert(
            "items".to_string(),
            Value::List(vec![Value::Record(negative), Value::Record(positive)]),
        );
        let mut run = run_state();
        assert_eq!(call("some", &positive_amount_predicate(), &mut ctx, &mut run).unwrap(), Value::Bool(true));
        assert_eq!(call("none", &positive_amount_predicate(), &mut ctx, &mut run).unwrap(), Value::Bool(false));
    }
}
