//! Record generator (spec.md §4.4): produces a single record for a
//! schema, enforcing field ordering, `assume`-gated rejection sampling,
//! uniqueness, and `then`-block mutations.

use crate::ast::{
    AssumeClause, Expr, FieldDef, FieldType, Mutation, MutationOp, PrimitiveType, SchemaDef,
};
use crate::builtins;
use crate::context::{EvalContext, RunState};
use crate::error::{ConstraintSatisfactionError, EvaluationError, ResolutionError, VagueError, Warning};
use crate::eval::{add_values, eval_superposition, evaluate};
use crate::registry::ImportedField;
use crate::value::{Record, Value};

use super::context_apply::with_applied_contexts;

/// Generates one record for `schema_name`, retrying the whole record up
/// to the schema retry budget whenever its `assume` clauses are not
/// satisfied (spec.md §4.4).
pub fn generate_record(schema_name: &str, ctx: &mut EvalContext, run: &mut RunState) -> Result<Record, VagueError> {
    let schema = run
        .schemas
        .get(schema_name)
        .cloned()
        .ok_or_else(|| ResolutionError::UnknownSchema(schema_name.to_string()))?;
    generate_record_with_retries(&schema, ctx, run)
}

/// Same as [`generate_record`] but takes an already-resolved schema, for
/// callers (collection generation) that looked it up once already.
pub fn generate_record_with_retries(
    schema: &SchemaDef,
    ctx: &mut EvalContext,
    run: &mut RunState,
) -> Result<Record, VagueError> {
    let limit = run.options.retry_limits.schema;
    let mode = if ctx.violating { "violating" } else { "satisfying" };
    let mut last = Record::new();
    for attempt in 1..=limit {
        let candidate = build_record_once(schema, ctx, run)?;
        last = candidate;
        if assumes_satisfied(schema, ctx, run) {
            return Ok(last);
        }
        if attempt == limit {
            if run.options.strict {
                return Err(ConstraintSatisfactionError {
                    subject: schema.name.clone(),
                    attempts: limit,
                    mode,
                }
                .into());
            }
            run.emit_warning(Warning::ConstraintRetryLimit {
                subject: schema.name.clone(),
                attempts: limit,
                mode,
            });
            return Ok(last);
        }
    }
    Ok(last)
}

/// Builds one candidate record: applies the schema's own contexts,
/// inherits an imported base schema's fields, generates every declared
/// field in tier order, then runs the `then` block. Errors here (outside
/// `assume`/`where`) are fatal per spec.md §7.
fn build_record_once(schema: &SchemaDef, ctx: &mut EvalContext, run: &mut RunState) -> Result<Record, VagueError> {
    with_applied_contexts(&schema.contexts, ctx, run, |ctx, run| {
        let mut working = Record::new();
        ctx.current = Some(working.clone());

        if let Some(base) = &schema.base {
            let imported = run
                .imports
                .and_then(|reg| reg.fields_of(base))
                .ok_or_else(|| ResolutionError::UnknownImportedSchema(base.clone()))?
                .to_vec();
            for field in &imported {
                let value = default_for_imported_field(schema, field, run);
                working.set(field.name.clone(), value);
            }
            ctx.current = Some(working.clone());
        }

        let mut ordered: Vec<&FieldDef> = schema.fields.iter().collect();
        ordered.sort_by_key(|f| f.tier());
        for field in ordered {
            generate_field(field, &mut working, ctx, run)?;
        }

        for mutation in &schema.then {
            apply_mutation(mutation, &mut working, ctx, run)?;
        }

        Ok(strip_private_fields(schema, working))
    })
    .map_err(VagueError::from)
}

fn strip_private_fields(schema: &SchemaDef, working: Record) -> Record {
    let private: std::collections::HashSet<&str> = schema
        .fields
        .iter()
        .filter(|f| f.flags.private)
        .map(|f| f.name.as_str())
        .collect();
    if private.is_empty() {
        return working;
    }
    let mut visible = Record::new();
    for (name, value) in working.iter() {
        if !private.contains(name) {
            visible.set(name, value.clone());
        }
    }
    visible
}

/// Evaluates every `assume` clause (each gated by its own `if`, if any)
/// and every `constraints` expression (always gated, unlike `assume`)
/// against the just-generated record and decides acceptance per
/// satisfying/violating mode (spec.md §1, §2, §4.4, §4.5 step 1).
fn assumes_satisfied(schema: &SchemaDef, ctx: &mut EvalContext, run: &mut RunState) -> bool {
    if schema.assumes.is_empty() && schema.constraints.is_empty() {
        return true;
    }
    let mut any_failed = false;
    for assume in &schema.assumes {
        if !assume_condition_holds(assume, ctx, run) {
            continue;
        }
        if !assume_passes(schema, assume, ctx, run) {
            any_failed = true;
        }
    }
    if !constraints_pass(schema, ctx, run) {
        any_failed = true;
    }
    if ctx.violating {
        any_failed
    } else {
        !any_failed
    }
}

/// Evaluates a schema's `constraints { exprs }` block, a record-level
/// check distinct from `assume` (no `if` gate), demoting evaluation
/// errors to a `ConstraintEvaluationError` warning exactly as `assume`
/// clauses do (spec.md §7).
fn constraints_pass(schema: &SchemaDef, ctx: &mut EvalContext, run: &mut RunState) -> bool {
    schema.constraints.iter().all(|expr| match evaluate(expr, ctx, run) {
        Ok(v) => v.is_truthy(),
        Err(e) => {
            run.emit_warning(Warning::ConstraintEvaluationError {
                subject: schema.name.clone(),
                error: e.to_string(),
            });
            false
        }
    })
}

fn assume_condition_holds(assume: &AssumeClause, ctx: &mut EvalContext, run: &mut RunState) -> bool {
    match &assume.condition {
        None => true,
        Some(cond) => evaluate(cond, ctx, run).map(|v| v.is_truthy()).unwrap_or(false),
    }
}

fn assume_passes(schema: &SchemaDef, assume: &AssumeClause, ctx: &mut EvalContext, run: &mut RunState) -> bool {
    assume.exprs.iter().all(|expr| match evaluate(expr, ctx, run) {
        Ok(v) => v.is_truthy(),
        Err(e) => {
            run.emit_warning(Warning::ConstraintEvaluationError {
                subject: schema.name.clone(),
                error: e.to_string(),
            });
            false
        }
    })
}

/// Runs the per-field procedure of spec.md §4.4: `when`-gating,
/// `??`-optionality, type-directed generation, and `where`-gated
/// rejection sampling.
fn generate_field(field: &FieldDef, working: &mut Record, ctx: &mut EvalContext, run: &mut RunState) -> Result<(), EvaluationError> {
    if let Some(cond) = &field.when {
        ctx.current = Some(working.clone());
        if !evaluate(cond, ctx, run)?.is_truthy() {
            return Ok(());
        }
    } else if field.flags.optional && !run.rng.bool_with_probability(run.options.optional_field_probability) {
        return Ok(());
    }

    if field.flags.nullable && run.rng.bool_with_probability(run.options.null_field_probability) {
        working.set(field.name.clone(), Value::Null);
        ctx.current = Some(working.clone());
        return Ok(());
    }

    let limit = run.options.retry_limits.field;
    let mut candidate = Value::Null;
    for attempt in 1..=limit {
        ctx.current = Some(working.clone());
        candidate = generate_field_value(field, ctx, run)?;

        if field.where_clauses.is_empty() {
            break;
        }
        let mut trial = working.clone();
        trial.set(field.name.clone(), candidate.clone());
        ctx.current = Some(trial);
        let ok = field.where_clauses.iter().all(|clause| match evaluate(clause, ctx, run) {
            Ok(v) => v.is_truthy(),
            Err(e) => {
                run.emit_warning(Warning::ConstraintEvaluationError {
                    subject: field.name.clone(),
                    error: e.to_string(),
                });
                false
            }
        });
        if ok || attempt == limit {
            break;
        }
    }

    working.set(field.name.clone(), candidate);
    ctx.current = Some(working.clone());
    Ok(())
}

/// Type-directed candidate generation (spec.md §4.4). A `~` distribution
/// annotation, when present, overrides the type's own default.
fn generate_field_value(field: &FieldDef, ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    if let Some(dist) = &field.distribution {
        return evaluate(dist, ctx, run);
    }
    match &field.ty {
        FieldType::Primitive(p) => Ok(primitive_default(*p, run)),
        FieldType::Range { base, min, max } => generate_range(*base, min.as_deref(), max.as_deref(), ctx, run),
        FieldType::Superposition(opts) => eval_superposition(opts, ctx, run),
        FieldType::Reference(name) => generate_reference(name, ctx, run),
        FieldType::Collection {
            cardinality,
            element,
            per_parent,
        } => generate_collection_field(cardinality, element, per_parent.as_deref(), working_snapshot(ctx), ctx, run)
            .map(|records| Value::List(records.into_iter().map(Value::Record).collect())),
        FieldType::Generator { name, args } => evaluate(
            &Expr::Call {
                callee: name.clone(),
                args: args.clone(),
            },
            ctx,
            run,
        ),
        FieldType::Expression(e) => evaluate(e, ctx, run),
    }
}

fn working_snapshot(ctx: &EvalContext) -> Record {
    ctx.current.clone().unwrap_or_default()
}

fn primitive_default(p: PrimitiveType, run: &mut RunState) -> Value {
    match p {
        PrimitiveType::Int => Value::Int(run.rng.range_i64(0, 1000)),
        PrimitiveType::Decimal => Value::Decimal(run.rng.range_f64(0.0, 1000.0)),
        PrimitiveType::String => builtins::markov::call("word", &[], run)
            .and_then(Result::ok)
            .unwrap_or_else(|| Value::String(String::new())),
        PrimitiveType::Date => {
            let today = builtins::date::call("today", &[], run)
                .and_then(Result::ok)
                .unwrap_or(Value::Date("2020-01-01".to_string()));
            builtins::date::call("dateBetween", &[Value::Date("2020-01-01".to_string()), today], run)
                .and_then(Result::ok)
                .unwrap_or(Value::Date("2020-01-01".to_string()))
        }
        PrimitiveType::Boolean => Value::Bool(run.rng.bool()),
    }
}

fn default_range_bounds(base: PrimitiveType, run: &mut RunState) -> (Value, Value) {
    match base {
        PrimitiveType::Date => {
            let today = builtins::date::call("today", &[], run)
                .and_then(Result::ok)
                .unwrap_or(Value::Date("2020-01-01".to_string()));
            (Value::Date("2020-01-01".to_string()), today)
        }
        _ => (Value::Int(0), Value::Int(1000)),
    }
}

fn generate_range(
    base: PrimitiveType,
    min: Option<&Expr>,
    max: Option<&Expr>,
    ctx: &mut EvalContext,
    run: &mut RunState,
) -> Result<Value, EvaluationError> {
    let (lo, hi) = match (min, max) {
        (Some(mn), Some(mx)) => (evaluate(mn, ctx, run)?, evaluate(mx, ctx, run)?),
        _ => default_range_bounds(base, run),
    };
    match base {
        PrimitiveType::Int => {
            let a = numeric_of(&lo)?;
            let b = numeric_of(&hi)?;
            if b < a {
                return Err(EvaluationError::InvalidRange {
                    min: a.to_string(),
                    max: b.to_string(),
                });
            }
            Ok(Value::Int(run.rng.range_i64(a as i64, b as i64)))
        }
        PrimitiveType::Decimal => {
            let a = numeric_of(&lo)?;
            let b = numeric_of(&hi)?;
            if b < a {
                return Err(EvaluationError::InvalidRange {
                    min: a.to_string(),
                    max: b.to_string(),
                });
            }
            Ok(Value::Decimal(run.rng.range_f64(a, b)))
        }
        PrimitiveType::Date => builtins::date::call("dateBetween", &[lo, hi], run).unwrap_or(Ok(Value::Null)),
        PrimitiveType::String | PrimitiveType::Boolean => Ok(primitive_default(base, run)),
    }
}

fn numeric_of(v: &Value) -> Result<f64, EvaluationError> {
    v.as_f64().ok_or_else(|| EvaluationError::TypeMismatch {
        expected: "number".to_string(),
        found: v.type_name().to_string(),
    })
}

/// Dereferences an imported schema into a sub-record (spec.md §4.4,
/// FieldType::Reference). Each external field is generated with the
/// defaulted rule matching its declared type name.
fn generate_reference(name: &str, _ctx: &mut EvalContext, run: &mut RunState) -> Result<Value, EvaluationError> {
    let fields = run
        .imports
        .and_then(|reg| reg.fields_of(name))
        .ok_or_else(|| ResolutionError::UnknownImportedSchema(name.to_string()))?
        .to_vec();
    let mut record = Record::new();
    for field in &fields {
        let value = default_for_imported_field_named(name, field, run);
        record.set(field.name.clone(), value);
    }
    Ok(Value::Record(record))
}

fn default_for_imported_field(schema: &SchemaDef, field: &ImportedField, run: &mut RunState) -> Value {
    default_for_imported_field_named(&schema.name, field, run)
}

/// Maps an imported field's `type_name` string onto the same defaults
/// [`primitive_default`] uses; an unrecognized type name falls back to a
/// Markov string and records [`Warning::UnknownFieldInImportedSchema`]
/// (spec.md §7) since the generator cannot infer its shape.
fn default_for_imported_field_named(schema_name: &str, field: &ImportedField, run: &mut RunState) -> Value {
    let prim = match field.type_name.as_str() {
        "int" => Some(PrimitiveType::Int),
        "decimal" => Some(PrimitiveType::Decimal),
        "string" => Some(PrimitiveType::String),
        "date" => Some(PrimitiveType::Date),
        "boolean" => Some(PrimitiveType::Boolean),
        _ => None,
    };
    match prim {
        Some(p) => primitive_default(p, run),
        None => {
            run.emit_warning(Warning::UnknownFieldInImportedSchema {
                schema: schema_name.to_string(),
                field: field.name.clone(),
            });
            primitive_default(PrimitiveType::String, run)
        }
    }
}

/// Generates a field-typed collection (spec.md §4.4 `Collection`). With
/// no `per parent_field`, `cardinality` children are generated with
/// `working` as their shared parent. With `per_parent`, `cardinality` is
/// evaluated (and the children generated) once per element of the
/// sibling collection field named by `per_parent`, which must already be
/// populated in `working` (tier 2 runs in source order).
fn generate_collection_field(
    cardinality: &Expr,
    element: &str,
    per_parent: Option<&str>,
    working: Record,
    ctx: &mut EvalContext,
    run: &mut RunState,
) -> Result<Vec<Record>, EvaluationError> {
    let schema = run
        .schemas
        .get(element)
        .cloned()
        .ok_or_else(|| ResolutionError::UnknownSchema(element.to_string()))?;

    match per_parent {
        None => {
            let count = resolve_cardinality(cardinality, ctx, run)?;
            generate_n_records(&schema, count, Some(working), &[], ctx, run).map_err(unwrap_eval_error)
        }
        Some(parent_field) => {
            let parents = match working.get(parent_field) {
                Some(Value::List(items)) => items
                    .iter()
                    .filter_map(|v| match v {
                        Value::Record(r) => Some(r.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
                _ => Vec::new(),
            };
            let mut all = Vec::new();
            for parent in parents {
                let count = ctx.with_parent(Some(parent.clone()), |ctx| resolve_cardinality(cardinality, ctx, run))?;
                let children =
                    generate_n_records(&schema, count, Some(parent), &[], ctx, run).map_err(unwrap_eval_error)?;
                all.extend(children);
            }
            Ok(all)
        }
    }
}

/// [`generate_record_with_retries`] returns [`VagueError`] so it can
/// surface [`ConstraintSatisfactionError`] in strict mode; callers inside
/// a single field/record build need a plain [`EvaluationError`] to
/// propagate with `?`. A [`VagueError::ConstraintSatisfaction`] reaching
/// here means a nested schema's own retry budget was exhausted under
/// strict mode, which is itself fatal to the outer generation.
fn unwrap_eval_error(e: VagueError) -> EvaluationError {
    match e {
        VagueError::Evaluation(inner) => inner,
        VagueError::Resolution(inner) => EvaluationError::Resolution(inner),
        other => EvaluationError::Other(other.to_string()),
    }
}

fn resolve_cardinality(expr: &Expr, ctx: &mut EvalContext, run: &mut RunState) -> Result<usize, EvaluationError> {
    let v = evaluate(expr, ctx, run)?;
    let n = numeric_of(&v)?;
    Ok(n.max(0.0).round() as usize)
}

/// Generates `count` records of `schema`, each parented by `parent`
/// (shared for every child) and chained through `previous` so
/// `previous(field)` sees the prior sibling (spec.md §4.4, §4.6). Each
/// child runs through the schema's own assume-retry loop.
pub fn generate_n_records(
    schema: &SchemaDef,
    count: usize,
    parent: Option<Record>,
    overrides: &[(String, Expr)],
    ctx: &mut EvalContext,
    run: &mut RunState,
) -> Result<Vec<Record>, VagueError> {
    let mut out = Vec::with_capacity(count);
    let mut previous: Option<Record> = None;
    for _ in 0..count {
        let mut record = ctx.with_parent(parent.clone(), |ctx| {
            ctx.with_previous(previous.clone(), |ctx| generate_record_with_retries(schema, ctx, run))
        })?;
        for (name, expr) in overrides {
            ctx.current = Some(record.clone());
            let value = evaluate(expr, ctx, run)?;
            record.set(name.clone(), value);
        }
        previous = Some(record.clone());
        out.push(record);
    }
    Ok(out)
}

/// Applies one `then`-block mutation (spec.md §4.4). The target is
/// either a plain field on `working`, or a dotted path whose first
/// segment names a binding holding a record (a cross-record mutation);
/// unresolvable targets are skipped with a warning rather than failing
/// the run.
fn apply_mutation(mutation: &Mutation, working: &mut Record, ctx: &mut EvalContext, run: &mut RunState) -> Result<(), EvaluationError> {
    ctx.current = Some(working.clone());
    let new_value = evaluate(&mutation.value, ctx, run)?;

    let applied = match &mutation.target {
        Expr::Identifier(name) => apply_to_record(working, name, mutation.op, new_value.clone()),
        Expr::QualifiedName(parts) if parts.len() == 1 => apply_to_record(working, &parts[0], mutation.op, new_value.clone()),
        Expr::QualifiedName(parts) => apply_to_binding(ctx, &parts[0], &parts[1..], mutation.op, new_value.clone())?,
        _ => false,
    };

    if !applied {
        run.emit_warning(Warning::MutationTargetNotFound {
            target: mutation_target_name(&mutation.target),
        });
    } else if matches!(mutation.target, Expr::Identifier(_)) || matches!(&mutation.target, Expr::QualifiedName(p) if p.len() == 1) {
        ctx.current = Some(working.clone());
    }
    Ok(())
}

fn mutation_target_name(target: &Expr) -> String {
    match target {
        Expr::Identifier(name) => name.clone(),
        Expr::QualifiedName(parts) => parts.join("."),
        _ => "<expr>".to_string(),
    }
}

fn apply_to_record(record: &mut Record, field: &str, op: MutationOp, new_value: Value) -> bool {
    if !record.contains(field) && op == MutationOp::AddAssign {
        return false;
    }
    match op {
        MutationOp::Assign => {
            record.set(field, new_value);
            true
        }
        MutationOp::AddAssign => {
            let existing = record.get(field).cloned().unwrap_or(Value::Null);
            match add_values(existing, new_value) {
                Ok(combined) => {
                    record.set(field, combined);
                    true
                }
                Err(_) => false,
            }
        }
    }
}

/// Mutates a field on a record held by a `let`/context binding, e.g.
/// `order.total += amount` where `order` is bound to a specific record.
fn apply_to_binding(
    ctx: &mut EvalContext,
    binding_name: &str,
    rest: &[String],
    op: MutationOp,
    new_value: Value,
) -> Result<bool, EvaluationError> {
    let Some(Value::Record(mut record)) = ctx.bindings.get(binding_name).cloned() else {
        return Ok(false);
    };
    let field = match rest.last() {
        Some(f) => f,
        None => return Ok(false),
    };
    let applied = apply_to_record(&mut record, field, op, new_value);
    if applied {
        ctx.bindings.insert(binding_name.to_string(), Value::Record(record));
    }
    Ok(applied)
}
