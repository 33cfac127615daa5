//! Compilation options (spec.md §6).

/// Per-stage retry budgets (spec.md §4.4, §4.5, §5). All default to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryLimits {
    /// Rejection-sampling attempts for a single `where` clause.
    pub field: u32,
    /// Rejection-sampling attempts for a schema's `assume` clauses.
    pub schema: u32,
    /// Rejection-sampling attempts for a dataset's `validate` block.
    pub dataset: u32,
    /// Attempts to find an unused value for `unique(key, expr)`.
    pub unique: u32,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            field: 100,
            schema: 100,
            dataset: 100,
            unique: 100,
        }
    }
}

/// Options controlling one [`crate::compile`] invocation (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompileOptions {
    /// Seeds the run's PRNG. `None` draws from the platform random source.
    pub seed: Option<u64>,
    /// When a retry budget is exhausted: `true` raises
    /// [`crate::error::ConstraintSatisfactionError`]; `false` keeps the
    /// last attempt and records a warning.
    pub strict: bool,
    /// Probability an `optional` (`??`) field's key is present at all.
    pub optional_field_probability: f64,
    /// Probability a `nullable` (`?`) field's value is sampled as `null`
    /// instead of its type-directed candidate.
    pub null_field_probability: f64,
    pub retry_limits: RetryLimits,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            seed: None,
            strict: false,
            optional_field_probability: 0.5,
            null_field_probability: 0.1,
            retry_limits: RetryLimits::default(),
        }
    }
}
