//! Dataset generator (spec.md §4.5): drives a `dataset` block's
//! collections in source order, building up [`Dataset`] and retrying the
//! whole dataset against its `validate` block under the same rejection
//! sampling discipline as a schema's `assume` clause.

use std::collections::HashMap;

use crate::ast::{CollectionDef, DatasetDef};
use crate::context::{EvalContext, RunState};
use crate::error::{ConstraintSatisfactionError, ResolutionError, VagueError, Warning};
use crate::eval::evaluate;
use crate::value::{Dataset, Record, Value};

use super::context_apply::with_applied_contexts;
use super::record::generate_n_records;

/// Generates one dataset, retrying the full collection set up to the
/// dataset retry budget whenever its `validate` block is not satisfied
/// (spec.md §4.5 step 4). `top_level_bindings` carries the source
/// file's `let` statements, evaluated once by [`crate::compile`] and
/// seeded into every attempt's context.
pub fn generate_dataset(
    def: &DatasetDef,
    top_level_bindings: &HashMap<String, Value>,
    run: &mut RunState,
) -> Result<Dataset, VagueError> {
    let limit = run.options.retry_limits.dataset;
    let mut last = Dataset::new();
    for attempt in 1..=limit {
        let mut ctx = EvalContext::new();
        ctx.bindings = top_level_bindings.clone();
        ctx.violating = def.violating;
        let candidate = build_dataset_once(def, &mut ctx, run)?;
        let ok = validate_passes(def, &candidate, &mut ctx, run);
        last = candidate;
        if ok {
            return Ok(last);
        }
        if attempt == limit {
            if run.options.strict {
                return Err(ConstraintSatisfactionError {
                    subject: def.name.clone(),
                    attempts: limit,
                    mode: dataset_mode(def),
                }
                .into());
            }
            run.emit_warning(Warning::ConstraintRetryLimit {
                subject: def.name.clone(),
                attempts: limit,
                mode: dataset_mode(def),
            });
            return Ok(last);
        }
    }
    Ok(last)
}

fn dataset_mode(def: &DatasetDef) -> &'static str {
    if def.violating {
        "violating"
    } else {
        "satisfying"
    }
}

/// Builds one candidate dataset: applies the dataset's own `with`
/// contexts, then runs every collection in source order, installing
/// each one into `ctx.collections` before the next runs so later
/// collections can reference earlier ones via `any of`/aggregates
/// (spec.md §4.5 steps 2-3).
fn build_dataset_once(def: &DatasetDef, ctx: &mut EvalContext, run: &mut RunState) -> Result<Dataset, VagueError> {
    with_applied_contexts(&def.contexts, ctx, run, |ctx, run| {
        let mut dataset = Dataset::new();
        for collection in &def.collections {
            let records = generate_collection(collection, ctx, run).map_err(into_eval_error)?;
            ctx.collections.insert(collection.name.clone(), records.clone());
            dataset.insert(collection.name.clone(), records);
        }
        Ok(dataset)
    })
    .map_err(VagueError::from)
}

fn into_eval_error(e: VagueError) -> crate::error::EvaluationError {
    match e {
        VagueError::Evaluation(inner) => inner,
        VagueError::Resolution(inner) => crate::error::EvaluationError::Resolution(inner),
        other => crate::error::EvaluationError::Other(other.to_string()),
    }
}

/// Generates one `dataset` collection (spec.md §4.5 step 2). With no
/// `per parent_field` the collection is generated flat, sharing no
/// particular parent. With `per_parent`, one fan-out of `cardinality`
/// children is produced per record of the named, already-generated
/// collection, each parented by that record.
fn generate_collection(def: &CollectionDef, ctx: &mut EvalContext, run: &mut RunState) -> Result<Vec<Record>, VagueError> {
    with_applied_contexts(&def.contexts, ctx, run, |ctx, run| {
        let schema = run
            .schemas
            .get(&def.schema)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownSchema(def.schema.clone()))?;

        match &def.per_parent {
            None => {
                let count = resolve_cardinality(&def.cardinality, ctx, run)?;
                generate_n_records(&schema, count, None, &def.field_overrides, ctx, run).map_err(into_eval_error)
            }
            Some(parent_collection) => {
                let parents = ctx
                    .collections
                    .get(parent_collection.as_str())
                    .cloned()
                    .ok_or_else(|| ResolutionError::UnknownCollection(parent_collection.clone()))?;
                let mut all = Vec::new();
                for parent in parents {
                    let count = ctx.with_parent(Some(parent.clone()), |ctx| resolve_cardinality(&def.cardinality, ctx, run))?;
                    let children =
                        generate_n_records(&schema, count, Some(parent), &def.field_overrides, ctx, run).map_err(into_eval_error)?;
                    all.extend(children);
                }
                Ok(all)
            }
        }
    })
    .map_err(VagueError::from)
}

fn resolve_cardinality(expr: &crate::ast::Expr, ctx: &mut EvalContext, run: &mut RunState) -> Result<usize, crate::error::EvaluationError> {
    let v = evaluate(expr, ctx, run)?;
    let n = v.as_f64().ok_or_else(|| crate::error::EvaluationError::TypeMismatch {
        expected: "number".to_string(),
        found: v.type_name().to_string(),
    })?;
    Ok(n.max(0.0).round() as usize)
}

/// Evaluates the dataset's `validate` block against the full assembled
/// dataset (spec.md §4.5 step 4), with every collection visible through
/// `ctx.collections` and `any of`.
fn validate_passes(def: &DatasetDef, dataset: &Dataset, ctx: &mut EvalContext, run: &mut RunState) -> bool {
    if def.validate.is_empty() {
        return true;
    }
    for (name, records) in dataset.iter() {
        ctx.collections.insert(name.to_string(), records.to_vec());
    }
    let all_ok = def.validate.iter().all(|expr| match evaluate(expr, ctx, run) {
        Ok(v) => v.is_truthy(),
        Err(e) => {
            run.emit_warning(Warning::ConstraintEvaluationError {
                subject: def.name.clone(),
                error: e.to_string(),
            });
            false
        }
    });
    if ctx.violating {
        !all_ok
    } else {
        all_ok
    }
}

/// Merges the collections produced by every top-level `dataset`
/// statement in a source file into a single combined [`Dataset`], the
/// shape [`crate::compile`] exposes to callers. A later statement's
/// collection of the same name appends to, rather than replacing, an
/// earlier one.
pub fn merge_datasets(parts: Vec<Dataset>) -> Dataset {
    let mut merged = Dataset::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut combined: Vec<(String, Vec<Record>)> = Vec::new();
    for part in parts {
        for (name, records) in part.iter() {
            match index.get(name) {
                Some(&i) => combined[i].1.extend(records.iter().cloned()),
                None => {
                    index.insert(name.to_string(), combined.len());
                    combined.push((name.to_string(), records.to_vec()));
                }
            }
        }
    }
    for (name, records) in combined {
        merged.insert(name, records);
    }
    merged
}
