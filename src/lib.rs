//! # Vague
//!
//! Vague is a declarative language for generating realistic,
//! constraint-satisfying synthetic datasets. A source file declares
//! record shapes (`schema`), distributions over their fields,
//! relationships between records, aggregate/computed fields, and
//! assertions (`assume`, `validate`) that generated data must satisfy.
//! Compiling a source produces a [`Dataset`]: a mapping from collection
//! name to an ordered sequence of [`Record`]s.
//!
//! ## Quick start
//!
//! ```rust
//! use vague::{compile, CompileOptions};
//!
//! let source = r#"
//! schema Item {
//!     id: int in 1..1000,
//!     price: decimal in 1..100
//! }
//!
//! dataset Catalog {
//!     items: 5 of Item
//! }
//! "#;
//!
//! let options = CompileOptions { seed: Some(42), ..Default::default() };
//! let output = compile(source, options).expect("valid source");
//! let items = output.dataset.get("items").unwrap();
//! assert_eq!(items.len(), 5);
//! ```
//!
//! ## Modules
//!
//! - [`lexer`] / [`token`]: source text → tokens (see [`Lexer`]).
//! - [`parser`] / [`pratt`]: tokens → [`ast::Program`] (see [`Parser`]).
//! - [`ast`]: the tagged-variant AST shared by the parser and evaluator.
//! - [`eval`]: pure expression evaluation against an [`EvalContext`].
//! - [`generator`]: the constraint-aware record and dataset generator.
//! - [`builtins`]: date/string/math/distribution/sequence/predicate/
//!   Markov-text callables.
//! - [`rng`]: the seeded PRNG and its derived distributions.
//! - [`registry`]: the abstract plugin/imported-schema collaborator traits.
//! - [`context`]: the scoped evaluation context and run-wide mutable state.
//! - [`options`]: [`CompileOptions`] and [`RetryLimits`].
//! - [`error`]: the per-stage error/warning taxonomy, unified by [`VagueError`].
//! - [`value`]: the runtime [`Value`]/[`Record`]/[`Dataset`] domain.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ast;
pub mod builtins;
pub mod context;
pub mod error;
pub mod eval;
pub mod generator;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod pratt;
pub mod registry;
pub mod rng;
pub mod span;
pub mod token;
pub mod value;

use std::collections::HashMap;

pub use ast::{Program, Statement};
pub use error::{
    ConstraintSatisfactionError, EvaluationError, LexError, ParseError, ResolutionError,
    VagueError, Warning,
};
pub use eval::evaluate;
pub use lexer::Lexer;
pub use options::{CompileOptions, RetryLimits};
pub use parser::Parser;
pub use registry::{EmptyImportRegistry, EmptyPluginRegistry, ImportRegistry, ImportedField, PluginRegistry};
pub use rng::Rng;
pub use token::{Token, TokenKind};
pub use value::{Dataset, Record, Value};

use ast::DistributionDef;
use context::{EvalContext, RunState};
use generator::{generate_dataset, merge_datasets};

/// The result of a successful [`compile`]/[`compile_with`] call: the
/// combined dataset produced by every top-level `dataset` statement in
/// the source, plus every non-fatal [`Warning`] recorded along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// The generated dataset. When a source declares more than one
    /// top-level `dataset` statement, their collections are merged
    /// (spec.md §4.5; a later statement's same-named collection appends
    /// to an earlier one).
    pub dataset: Dataset,
    /// Non-fatal conditions recorded during generation, in the order
    /// they occurred.
    pub warnings: Vec<Warning>,
}

/// Compiles a Vague source string into a [`CompileOutput`], using no
/// plugin registry and no imported-schema registry.
///
/// See [`compile_with`] to supply either.
pub fn compile(source: &str, options: CompileOptions) -> Result<CompileOutput, VagueError> {
    compile_with(source, options, None, None)
}

/// Compiles a Vague source string, consulting `plugins` for additional
/// callables/keywords and `imports` for `Reference`/`base`-schema field
/// lists (spec.md §6).
///
/// Lexing and parsing both run in batch mode: if either stage collects
/// one or more diagnostics, compilation stops and returns
/// [`VagueError::LexErrors`]/[`VagueError::ParseErrors`] rather than
/// running generation against a partial AST.
pub fn compile_with(
    source: &str,
    options: CompileOptions,
    plugins: Option<&dyn PluginRegistry>,
    imports: Option<&dyn ImportRegistry>,
) -> Result<CompileOutput, VagueError> {
    let (tokens, lex_errors) = Lexer::with_registry(source, plugins).tokenize();
    if !lex_errors.is_empty() {
        return Err(VagueError::LexErrors(lex_errors));
    }

    let (program, parse_errors) = Parser::new(tokens).parse_program();
    if !parse_errors.is_empty() {
        return Err(VagueError::ParseErrors(parse_errors));
    }

    let mut schemas = HashMap::new();
    let mut contexts = HashMap::new();
    let mut distributions: HashMap<String, DistributionDef> = HashMap::new();
    let mut dataset_defs = Vec::new();
    let mut let_stmts = Vec::new();

    for statement in program.statements {
        match statement {
            Statement::Import(_) => {
                // Resolution happens lazily through `imports` at
                // generation time; nothing to register up front.
            }
            Statement::Let(let_stmt) => let_stmts.push(let_stmt),
            Statement::Schema(schema) => {
                schemas.insert(schema.name.clone(), schema);
            }
            Statement::Context(context_def) => {
                contexts.insert(context_def.name.clone(), context_def);
            }
            Statement::Distribution(dist) => {
                distributions.insert(dist.name.clone(), dist);
            }
            Statement::Dataset(dataset_def) => dataset_defs.push(dataset_def),
        }
    }

    let mut run = RunState::new(options, schemas, contexts, distributions, plugins, imports);

    let mut top_level_bindings: HashMap<String, Value> = HashMap::new();
    let mut top_ctx = EvalContext::new();
    for let_stmt in &let_stmts {
        top_ctx.bindings = top_level_bindings.clone();
        let value = evaluate(&let_stmt.value, &mut top_ctx, &mut run)?;
        top_level_bindings.insert(let_stmt.name.clone(), value);
    }

    let mut parts = Vec::with_capacity(dataset_defs.len());
    for dataset_def in &dataset_defs {
        parts.push(generate_dataset(dataset_def, &top_level_bindings, &mut run)?);
    }

    Ok(CompileOutput {
        dataset: merge_datasets(parts),
        warnings: run.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_flat_schema_and_dataset() {
        let source = r#"
            schema Item {
                id: int in 1..1000,
                price: decimal in 1..100
            }

            dataset Catalog {
                items: 5 of Item
            }
        "#;
        let options = CompileOptions {
            seed: Some(7),
            ..Default::default()
        };
        let output = compile(source, options).expect("valid source compiles");
        let items = output.dataset.get("items").expect("items collection present");
        assert_eq!(items.len(), 5);
        for item in items {
            assert!(item.get("id").is_some());
            assert!(item.get("price").is_some());
        }
    }

    #[test]
    fn same_seed_is_deterministic() {
        let source = r#"
            schema Item { id: int in 1..1000 }
            dataset D { items: 10 of Item }
        "#;
        let options = CompileOptions {
            seed: Some(12345),
            ..Default::default()
        };
        let first = compile(source, options).unwrap();
        let second = compile(source, options).unwrap();
        assert_eq!(first.dataset, second.dataset);
    }

    #[test]
    fn strict_mode_raises_on_unsatisfiable_assumption() {
        let source = r#"
            schema S { x: int in 1..10, assume x > 100 }
            dataset D { items: 1 of S }
        "#;
        let options = CompileOptions {
            seed: Some(1),
            strict: true,
            ..Default::default()
        };
        let err = compile(source, options).expect_err("assumption can never hold");
        assert!(matches!(err, VagueError::ConstraintSatisfaction(_)));
    }

    #[test]
    fn non_strict_mode_warns_instead_of_failing() {
        let source = r#"
            schema S { x: int in 1..10, assume x > 100 }
            dataset D { items: 1 of S }
        "#;
        let options = CompileOptions {
            seed: Some(1),
            strict: false,
            ..Default::default()
        };
        let output = compile(source, options).expect("non-strict keeps last attempt");
        assert!(output.warnings.iter().any(|w| matches!(w, Warning::ConstraintRetryLimit { .. })));
    }

    #[test]
    fn batch_mode_reports_parse_errors_without_panicking() {
        let source = "schema { }";
        let options = CompileOptions::default();
        let err = compile(source, options).expect_err("missing schema name");
        assert!(matches!(err, VagueError::ParseErrors(_)));
    }
}
