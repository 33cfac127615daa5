//! Error and warning taxonomy (spec.md §7).
//!
//! Every fallible stage of the pipeline has its own `thiserror`-derived
//! error enum, matching the per-stage error types `metadol` uses
//! (`LexError`, `TypeError`, `ValidationError`). [`VagueError`] unifies
//! them for [`crate::compile`]'s return type.

use crate::span::Span;
use crate::token::TokenKind;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors raised while tokenizing source text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LexError {
    /// A byte that does not begin any valid token.
    #[error("unexpected character '{ch}' at line {}, column {}", span.line, span.column)]
    UnexpectedChar { ch: char, span: Span },
    /// A double-quoted string with no closing quote before a newline or EOF.
    #[error("unterminated string starting at line {}, column {}", span.line, span.column)]
    UnterminatedString { span: Span },
    /// A number literal was malformed (e.g. a bare `.`).
    #[error("malformed number at line {}, column {}", span.line, span.column)]
    MalformedNumber { span: Span },
    /// An escape sequence inside a string that is not one of `\n \t \\ \"`.
    #[error("invalid escape sequence '\\{ch}' at line {}, column {}", span.line, span.column)]
    InvalidEscape { ch: char, span: Span },
}

impl LexError {
    /// The span this error occurred at.
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::MalformedNumber { span }
            | LexError::InvalidEscape { span, .. } => *span,
        }
    }
}

/// Errors raised while parsing a token stream into an AST.
///
/// In recovery mode the parser accumulates these rather than aborting at
/// the first one (spec.md §4.2, §8 property 4).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[error("{message}")]
pub struct ParseError {
    /// Human-readable description of the problem.
    pub message: String,
    /// The kind of token actually found.
    pub found: TokenKind,
    /// The kind of token that would have been acceptable, if known.
    pub expected: Option<TokenKind>,
    /// Where the offending token sits in the source.
    pub span: Span,
    /// A short excerpt of the source line, if available, for display.
    pub snippet: Option<String>,
}

impl ParseError {
    /// Builds a parse error without a specific expected token.
    pub fn new(message: impl Into<String>, found: TokenKind, span: Span) -> Self {
        Self {
            message: message.into(),
            found,
            expected: None,
            span,
            snippet: None,
        }
    }

    /// Builds a parse error reporting what kind of token was expected.
    pub fn expected(expected: TokenKind, found: TokenKind, span: Span) -> Self {
        Self {
            message: format!("expected {expected}, found {found}"),
            found,
            expected: Some(expected),
            span,
            snippet: None,
        }
    }

    /// Attaches a source snippet for nicer diagnostics.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Fatal: an identifier, schema, context or plugin name that does not
/// resolve at generation time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResolutionError {
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),
    #[error("unknown context '{0}'")]
    UnknownContext(String),
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("unknown plugin or builtin function '{0}'")]
    UnknownCallable(String),
    #[error("unknown imported schema '{0}'")]
    UnknownImportedSchema(String),
}

/// Raised by the expression evaluator for type mismatches, division by
/// zero, or an invalid range. Inside a constraint this is caught and
/// demoted to a [`Warning::ConstraintEvaluationError`]; outside a
/// constraint it is fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EvaluationError {
    #[error("type error: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid range {min}..{max}: min is greater than max")]
    InvalidRange { min: String, max: String },
    #[error("empty superposition: no options to choose from")]
    EmptySuperposition,
    #[error("{0}")]
    Resolution(#[from] ResolutionError),
    #[error("wrong number of arguments to '{name}': expected {expected}, found {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("{0}")]
    Other(String),
}

/// Raised when a schema's or dataset's retry budget is exhausted under
/// `strict` mode (spec.md §4.4, §4.5).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[error("constraint satisfaction failed for {subject} after {attempts} attempts ({mode} mode)")]
pub struct ConstraintSatisfactionError {
    /// The schema or dataset name this retry budget belonged to.
    pub subject: String,
    /// How many generation attempts were made.
    pub attempts: u32,
    /// `"satisfying"` or `"violating"`.
    pub mode: &'static str,
}

/// Non-fatal conditions collected during one compilation and mirrored to
/// standard error as they are recorded (spec.md §7).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Warning {
    /// `unique(key, ...)` could not find an unused value within 100 attempts.
    UniqueValueExhaustion { key: String, attempts: u32 },
    /// A schema's or dataset's retry budget was exhausted in non-strict mode.
    ConstraintRetryLimit {
        subject: String,
        attempts: u32,
        mode: &'static str,
    },
    /// An [`EvaluationError`] occurred while evaluating a constraint.
    ConstraintEvaluationError { subject: String, error: String },
    /// A `then` block mutation's target could not be resolved.
    MutationTargetNotFound { target: String },
    /// `any of` filtered a collection down to zero candidates.
    EmptyCollectionReference { collection: String },
    /// A `Reference` field named a field absent from the imported schema.
    UnknownFieldInImportedSchema { schema: String, field: String },
    /// A `match` expression fell through every arm. Per spec.md §9 open
    /// question (b), this yields `null` rather than a fatal error.
    NonExhaustiveMatch,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UniqueValueExhaustion { key, attempts } => write!(
                f,
                "warning: unique(\"{key}\") exhausted its {attempts}-attempt budget"
            ),
            Warning::ConstraintRetryLimit {
                subject,
                attempts,
                mode,
            } => write!(
                f,
                "warning: {subject} exhausted its retry budget after {attempts} attempts ({mode} mode); keeping last attempt"
            ),
            Warning::ConstraintEvaluationError { subject, error } => {
                write!(f, "warning: constraint on {subject} failed to evaluate: {error}")
            }
            Warning::MutationTargetNotFound { target } => {
                write!(f, "warning: mutation target '{target}' not found")
            }
            Warning::EmptyCollectionReference { collection } => write!(
                f,
                "warning: 'any of {collection}' found no candidates; returning null"
            ),
            Warning::UnknownFieldInImportedSchema { schema, field } => write!(
                f,
                "warning: imported schema '{schema}' has no field '{field}'"
            ),
            Warning::NonExhaustiveMatch => {
                write!(f, "warning: match fell through all arms; returning null")
            }
        }
    }
}

/// The top-level error type returned by [`crate::compile`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VagueError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Resolution(#[from] ResolutionError),
    #[error("{0}")]
    Evaluation(#[from] EvaluationError),
    #[error("{0}")]
    ConstraintSatisfaction(#[from] ConstraintSatisfactionError),
    /// Parsing failed with one or more recovered diagnostics (batch mode).
    #[error("{} parse error(s)", .0.len())]
    ParseErrors(Vec<ParseError>),
    /// Lexing failed with one or more recovered diagnostics (batch mode).
    #[error("{} lex error(s)", .0.len())]
    LexErrors(Vec<LexError>),
}
