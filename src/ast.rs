//! Abstract syntax tree for Vague source text (spec.md §3).
//!
//! The AST is a set of tagged-variant node definitions; there is no class
//! hierarchy. The parser and the evaluator both pattern-match these
//! variants for type-directed dispatch (spec.md §9).

pub use crate::span::Span;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Aggregate callables recognized over a projected list (spec.md §4.3,
/// §4.6). Referencing one of these in a field's expression implies a
/// dependency on sibling/collection fields, forcing that field into the
/// computed generation tier (spec.md §4.4).
pub const AGGREGATE_FUNCTIONS: &[&str] = &[
    "sum", "count", "min", "max", "avg", "median", "first", "last", "product",
];

/// A parsed Vague source file: an ordered sequence of top-level statements.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Statement {
    Import(ImportStmt),
    Let(LetStmt),
    Schema(SchemaDef),
    Context(ContextDef),
    Distribution(DistributionDef),
    Dataset(DatasetDef),
}

/// `import a, b from "path"`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImportStmt {
    pub names: Vec<String>,
    pub path: String,
    pub span: Span,
}

/// `let name = expr`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LetStmt {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// An applied context, e.g. `with Ctx(arg1, arg2)` or a schema-level
/// `affects Ctx(args)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContextApplication {
    pub name: String,
    pub args: Vec<Expr>,
    pub span: Span,
}

/// `schema Name (from Base)? { fields assume? constraints? then? }`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchemaDef {
    pub name: String,
    pub base: Option<String>,
    pub contexts: Vec<ContextApplication>,
    pub fields: Vec<FieldDef>,
    pub assumes: Vec<AssumeClause>,
    pub constraints: Vec<Expr>,
    pub then: Vec<Mutation>,
    pub span: Span,
}

/// `assume (if cond)? { exprs }`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssumeClause {
    pub condition: Option<Expr>,
    pub exprs: Vec<Expr>,
    pub span: Span,
}

/// Flags attached to a field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldFlags {
    /// `??` — the key itself may be omitted, sampled by
    /// `optional_field_probability`.
    pub optional: bool,
    /// `?` — the value may be null.
    pub nullable: bool,
    /// Declared with `=` or otherwise depending on aggregates/other
    /// fields/parent references; generated in the third field tier.
    pub computed: bool,
    /// `private` — excluded from the externally-visible record (still
    /// usable by `then` mutations and sibling computed fields).
    pub private: bool,
    /// The field's value must be unique within its own `key` namespace,
    /// set when the field type is a `unique(key, ...)` call.
    pub unique: bool,
}

/// A single field in a schema body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub flags: FieldFlags,
    pub when: Option<Expr>,
    pub distribution: Option<Expr>,
    pub where_clauses: Vec<Expr>,
    pub span: Span,
}

/// The primitive scalar types (spec.md §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PrimitiveType {
    Int,
    Decimal,
    String,
    Date,
    Boolean,
}

/// One option in a weighted superposition, `weight: value`. Weight
/// defaults to `1` when omitted.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeightedOption {
    pub weight: Option<Expr>,
    pub value: Expr,
}

/// The type of a field, or of an inline expression-typed value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldType {
    Primitive(PrimitiveType),
    /// `base in min..max`
    Range {
        base: PrimitiveType,
        min: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    Superposition(Vec<WeightedOption>),
    /// A reference to an imported schema's qualified name.
    Reference(String),
    /// `cardinality of Element (per parent_field)?`
    Collection {
        cardinality: Box<Expr>,
        element: String,
        per_parent: Option<String>,
    },
    /// `name(args)` resolved against plugins/built-ins at generation time.
    Generator { name: String, args: Vec<Expr> },
    /// A field whose value is simply an expression, e.g. `= sum(x.y)`.
    Expression(Box<Expr>),
}

/// An expression (spec.md §3, §4.3).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    /// A dotted name, e.g. `line_items.amount`.
    QualifiedName(Vec<String>),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Superposition(Vec<WeightedOption>),
    /// `min..max`, used as a value expression (uniform draw) rather than a
    /// field-type annotation.
    Range {
        min: Box<Expr>,
        max: Box<Expr>,
    },
    /// `^name.part...` — forces a parent-record lookup.
    ParentReference(Vec<String>),
    /// `any of collection (where pred)?`
    AnyOf {
        collection: String,
        predicate: Option<Box<Expr>>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `[a, b, c]` — an ordered sequence, used for ordered distributions
    /// and list literals.
    List(Vec<Expr>),
    /// `base in min..max` appearing as a plain expression rather than a
    /// field-type annotation — e.g. the lazily-evaluated second argument
    /// to `unique(key, int in 1..5)` (spec.md §4.4, §4.6).
    TypedRange {
        base: PrimitiveType,
        min: Box<Expr>,
        max: Box<Expr>,
    },
}

/// A literal value embedded in an expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Literal {
    Int(i64),
    Decimal(f64),
    String(String),
    Bool(bool),
    Null,
}

/// One arm of a `match` expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchArm {
    pub pattern: Pattern,
    pub result: Expr,
}

/// A `match` pattern. Patterns are compared against the scrutinee by deep
/// structural equality; `_` (or no pattern on the last arm) is a wildcard.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pattern {
    Wildcard,
    Value(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A mutation applied by a schema's `then` block, in source order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mutation {
    /// An lvalue: an identifier or dotted path rooted at the current
    /// record (or another record reached through a binding).
    pub target: Expr,
    pub op: MutationOp,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MutationOp {
    Assign,
    AddAssign,
}

/// `context Name(params) { bindings }`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContextDef {
    pub name: String,
    pub params: Vec<String>,
    pub bindings: Vec<LetStmt>,
    pub span: Span,
}

/// `distribution Name { weighted buckets }`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistributionDef {
    pub name: String,
    pub buckets: Vec<WeightedOption>,
    pub span: Span,
}

/// One collection inside a `dataset` body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollectionDef {
    pub name: String,
    /// Evaluated to an integer count; may itself be a `min..max` range
    /// (uniform draw) or an arbitrary dynamic expression.
    pub cardinality: Expr,
    pub per_parent: Option<String>,
    pub schema: String,
    pub contexts: Vec<ContextApplication>,
    pub field_overrides: Vec<(String, Expr)>,
    pub span: Span,
}

/// `dataset Name (violating)? with Ctx(args) { collections validate? }`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DatasetDef {
    pub name: String,
    pub violating: bool,
    pub contexts: Vec<ContextApplication>,
    pub collections: Vec<CollectionDef>,
    pub validate: Vec<Expr>,
    pub span: Span,
}

impl FieldDef {
    /// Classifies which of the three field-ordering tiers this field
    /// belongs to (spec.md §4.4): 1 = scalar/primitive/range/generator/
    /// superposition, 2 = collection, 3 = computed.
    pub fn tier(&self) -> u8 {
        if self.flags.computed || self.ty.references_dependencies() {
            3
        } else if matches!(self.ty, FieldType::Collection { .. }) {
            2
        } else {
            1
        }
    }
}

impl FieldType {
    fn references_dependencies(&self) -> bool {
        match self {
            FieldType::Expression(e) => {
                let _ = e;
                true
            }
            FieldType::Primitive(_) | FieldType::Reference(_) => false,
            FieldType::Range { min, max, .. } => {
                min.as_ref().is_some_and(|e| e.references_dependencies())
                    || max.as_ref().is_some_and(|e| e.references_dependencies())
            }
            FieldType::Superposition(opts) => opts.iter().any(|o| {
                o.weight.as_ref().is_some_and(|w| w.references_dependencies())
                    || o.value.references_dependencies()
            }),
            FieldType::Collection { cardinality, .. } => cardinality.references_dependencies(),
            FieldType::Generator { args, .. } => args.iter().any(|a| a.references_dependencies()),
        }
    }
}

impl Expr {
    fn references_dependencies(&self) -> bool {
        match self {
            Expr::ParentReference(_) => true,
            Expr::QualifiedName(parts) => parts.len() > 1,
            Expr::Call { callee, args } => {
                AGGREGATE_FUNCTIONS.contains(&callee.as_str())
                    || args.iter().any(|a| a.references_dependencies())
            }
            Expr::Binary { left, right, .. } => {
                left.references_dependencies() || right.references_dependencies()
            }
            Expr::Unary { operand, .. } => operand.references_dependencies(),
            Expr::Logical { left, right, .. } => {
                left.references_dependencies() || right.references_dependencies()
            }
            Expr::Not(e) => e.references_dependencies(),
            Expr::Superposition(opts) => opts.iter().any(|o| {
                o.weight.as_ref().is_some_and(|w| w.references_dependencies())
                    || o.value.references_dependencies()
            }),
            Expr::Range { min, max } => {
                min.references_dependencies() || max.references_dependencies()
            }
            Expr::AnyOf { predicate, .. } => predicate
                .as_ref()
                .is_some_and(|p| p.references_dependencies()),
            Expr::Match { scrutinee, arms } => {
                scrutinee.references_dependencies()
                    || arms.iter().any(|a| a.result.references_dependencies())
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.references_dependencies()
                    || then_branch.references_dependencies()
                    || else_branch.references_dependencies()
            }
            Expr::List(items) => items.iter().any(|i| i.references_dependencies()),
            Expr::TypedRange { min, max, .. } => {
                min.references_dependencies() || max.references_dependencies()
            }
            Expr::Literal(_) | Expr::Identifier(_) => false,
        }
    }
}
