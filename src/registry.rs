//! Abstract collaborator interfaces the generator consumes but does not
//! implement: a plugin registry and an imported-schema registry
//! (spec.md §6). Filesystem discovery, a real plugin loader, and a real
//! schema-import resolver are external collaborators out of scope here;
//! callers supply implementations of these traits.

use crate::ast::Expr;
use crate::context::EvalContext;
use crate::error::EvaluationError;
use crate::value::Value;

/// A field descriptor from an imported schema's external field list.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedField {
    pub name: String,
    pub type_name: String,
}

/// `qualifiedName → ordered list of {name, type}` (spec.md §6).
pub trait ImportRegistry {
    fn fields_of(&self, qualified_name: &str) -> Option<&[ImportedField]>;
}

/// `name → fn(evaluatedArgs, context, rawCallAst?) → value` (spec.md §6).
///
/// A registry may also contribute keywords that participate in lexer
/// keyword lookup (spec.md §4.1); those must not collide with the fixed
/// built-in table.
pub trait PluginRegistry {
    /// Additional keywords this registry contributes to the lexer.
    fn keywords(&self) -> &[String] {
        &[]
    }

    /// Returns `Some(name)` if this registry can service a call, even if
    /// the call itself fails. `raw_args` lets lazy/predicate-style
    /// plugins re-evaluate their arguments per element.
    fn call(
        &self,
        name: &str,
        args: &[Value],
        context: &EvalContext,
        raw_args: &[Expr],
    ) -> Option<Result<Value, EvaluationError>>;
}

/// An [`ImportRegistry`] with nothing registered, for callers that do not
/// use imported schemas.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyImportRegistry;

impl ImportRegistry for EmptyImportRegistry {
    fn fields_of(&self, _qualified_name: &str) -> Option<&[ImportedField]> {
        None
    }
}

/// A [`PluginRegistry`] with nothing registered, for callers that use
/// only the built-in callables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyPluginRegistry;

impl PluginRegistry for EmptyPluginRegistry {
    fn call(
        &self,
        _name: &str,
        _args: &[Value],
        _context: &EvalContext,
        _raw_args: &[Expr],
    ) -> Option<Result<Value, EvaluationError>> {
        None
    }
}
