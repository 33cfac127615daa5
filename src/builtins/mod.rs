//! Core built-in callables (spec.md §4.6): math, string, date,
//! distribution, sequence and markov-text generators, plus the lazy
//! predicate built-ins. Looked up after aggregates and before the
//! plugin registry (spec.md §4.3).
//!
//! `all`/`some`/`none`/`unique`/`previous` need the raw, unevaluated
//! call arguments (spec.md §9) and are dispatched directly by
//! [`crate::eval::interpreter::evaluate`] rather than through
//! [`dispatch`].

pub mod date;
pub mod distributions;
pub mod markov;
pub mod math;
pub mod predicates;
pub mod sequence;
pub mod string;

use crate::context::{EvalContext, RunState};
use crate::error::EvaluationError;
use crate::value::Value;

/// Tries every category of eagerly-evaluated built-in in turn. Returns
/// `Ok(None)` if `name` matches none of them, so the caller can fall
/// through to the plugin registry.
pub fn dispatch(
    name: &str,
    args: &[Value],
    ctx: &mut EvalContext,
    run: &mut RunState,
) -> Result<Option<Value>, EvaluationError> {
    if let Some(result) = math::call(name, args) {
        return result.map(Some);
    }
    if let Some(result) = string::call(name, args) {
        return result.map(Some);
    }
    if let Some(result) = date::call(name, args, run) {
        return result.map(Some);
    }
    if let Some(result) = distributions::call(name, args, run) {
        return result.map(Some);
    }
    if let Some(result) = sequence::call(name, args, run) {
        return result.map(Some);
    }
    if let Some(result) = markov::call(name, args, run) {
        return result.map(Some);
    }
    let _ = ctx;
    Ok(None)
}
