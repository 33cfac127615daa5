//! Applies `affects`/`with Ctx(args)` context applications by folding a
//! context's parameter and `let` bindings into [`EvalContext::bindings`]
//! for the duration of a closure (spec.md §3 ContextDef, §4.2).
//!
//! Schemas, collections and datasets all reference contexts the same
//! way, so this is shared by [`crate::generator::record`] and
//! [`crate::generator::dataset`].

use crate::ast::ContextApplication;
use crate::context::{EvalContext, RunState};
use crate::error::{EvaluationError, ResolutionError};
use crate::eval::evaluate;

/// Evaluates every applied context's parameter bindings and `let` body,
/// inserts them into `ctx.bindings`, runs `f`, then restores whatever was
/// shadowed. Contexts are applied left to right, so a later application's
/// bindings can see an earlier one's.
pub fn with_applied_contexts<T>(
    applications: &[ContextApplication],
    ctx: &mut EvalContext,
    run: &mut RunState,
    f: impl FnOnce(&mut EvalContext, &mut RunState) -> Result<T, EvaluationError>,
) -> Result<T, EvaluationError> {
    let mut saved: Vec<(String, Option<crate::value::Value>)> = Vec::new();
    for app in applications {
        let def = run
            .contexts
            .get(&app.name)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownContext(app.name.clone()))?;
        for (param, arg_expr) in def.params.iter().zip(app.args.iter()) {
            let value = evaluate(arg_expr, ctx, run)?;
            saved.push((param.clone(), ctx.bindings.insert(param.clone(), value)));
        }
        for binding in &def.bindings {
            let value = evaluate(&binding.value, ctx, run)?;
            saved.push((binding.name.clone(), ctx.bindings.insert(binding.name.clone(), value)));
        }
    }

    let result = f(ctx, run);

    for (name, prior) in saved.into_iter().rev() {
        match prior {
            Some(v) => {
                ctx.bindings.insert(name, v);
            }
            None => {
                ctx.bindings.remove(&name);
            }
        }
    }

    result
}
