//! Evaluation context and run-wide mutable state (spec.md §4.3, §5).
//!
//! [`EvalContext`] carries the scoped pointers (current/parent/previous
//! record, visible collections, let-bindings) that are saved and restored
//! around every scoped iteration, per the "Shared state" discipline in
//! spec.md §5. [`RunState`] carries the run-wide mutable singletons (PRNG,
//! warning collector, uniqueness sets, sequence counters) that spec.md §9
//! calls out as process-global in the reference behaviour but which must
//! be instanced per compilation for correct concurrent use.

use std::collections::{HashMap, HashSet};

use crate::ast::{ContextDef, DistributionDef, SchemaDef};
use crate::error::Warning;
use crate::options::CompileOptions;
use crate::registry::{ImportRegistry, PluginRegistry};
use crate::rng::Rng;
use crate::value::{Record, Value};

/// The scoped evaluation context threaded through expression evaluation
/// and record generation.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub current: Option<Record>,
    pub parent: Option<Record>,
    pub previous: Option<Record>,
    /// Collections completed so far in the dataset, visible to later
    /// collections and to `any of` / aggregate expressions.
    pub collections: HashMap<String, Vec<Record>>,
    /// `let` bindings and context-application parameter bindings in
    /// scope, innermost last.
    pub bindings: HashMap<String, Value>,
    /// Set for the duration of violating-mode dataset generation
    /// (spec.md §4.5 step 1).
    pub violating: bool,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with `current` temporarily replaced, restoring the prior
    /// value on every exit path (spec.md §5).
    pub fn with_current<T>(&mut self, value: Option<Record>, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.current, value);
        let result = f(self);
        self.current = saved;
        result
    }

    /// Runs `f` with `parent` temporarily replaced, restoring the prior
    /// value on every exit path (spec.md §5).
    pub fn with_parent<T>(&mut self, value: Option<Record>, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.parent, value);
        let result = f(self);
        self.parent = saved;
        result
    }

    /// Runs `f` with `previous` temporarily replaced, restoring the prior
    /// value on every exit path.
    pub fn with_previous<T>(&mut self, value: Option<Record>, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.previous, value);
        let result = f(self);
        self.previous = saved;
        result
    }

    /// Runs `f` with one extra binding temporarily in scope.
    pub fn with_binding<T>(&mut self, name: impl Into<String>, value: Value, f: impl FnOnce(&mut Self) -> T) -> T {
        let name = name.into();
        let saved = self.bindings.insert(name.clone(), value);
        let result = f(self);
        match saved {
            Some(prev) => {
                self.bindings.insert(name, prev);
            }
            None => {
                self.bindings.remove(&name);
            }
        }
        result
    }
}

/// Run-wide mutable state: one instance per [`crate::compile`] call, never
/// shared across concurrent compilations (spec.md §5, §9).
pub struct RunState<'a> {
    pub rng: Rng,
    pub options: CompileOptions,
    pub warnings: Vec<Warning>,
    /// `unique(key, ...)` namespaces: key name -> set of already-produced
    /// value keys (spec.md §4.4).
    unique_sets: HashMap<String, HashSet<String>>,
    /// `sequence`/`sequenceInt` counters, keyed by sequence name.
    sequences: HashMap<String, i64>,
    pub schemas: HashMap<String, SchemaDef>,
    pub contexts: HashMap<String, ContextDef>,
    pub distributions: HashMap<String, DistributionDef>,
    pub plugins: Option<&'a dyn PluginRegistry>,
    pub imports: Option<&'a dyn ImportRegistry>,
}

impl<'a> RunState<'a> {
    pub fn new(
        options: CompileOptions,
        schemas: HashMap<String, SchemaDef>,
        contexts: HashMap<String, ContextDef>,
        distributions: HashMap<String, DistributionDef>,
        plugins: Option<&'a dyn PluginRegistry>,
        imports: Option<&'a dyn ImportRegistry>,
    ) -> Self {
        let rng = match options.seed {
            Some(seed) => Rng::new(seed),
            None => Rng::from_platform_entropy(),
        };
        Self {
            rng,
            options,
            warnings: Vec::new(),
            unique_sets: HashMap::new(),
            sequences: HashMap::new(),
            schemas,
            contexts,
            distributions,
            plugins,
            imports,
        }
    }

    /// Records a warning and mirrors it to standard error as it is
    /// recorded (spec.md §7).
    pub fn emit_warning(&mut self, warning: Warning) {
        eprintln!("{warning}");
        self.warnings.push(warning);
    }

    /// Tries to reserve `candidate` under `key`'s uniqueness namespace,
    /// returning `true` if it was not already taken.
    pub fn try_reserve_unique(&mut self, key: &str, candidate: &Value) -> bool {
        let set = self.unique_sets.entry(key.to_string()).or_default();
        set.insert(candidate.unique_key())
    }

    /// Advances and returns the next value of a named sequence.
    pub fn next_sequence(&mut self, name: &str, start: i64, step: i64) -> i64 {
        let entry = self.sequences.entry(name.to_string()).or_insert(start - step);
        *entry += step;
        *entry
    }
}
