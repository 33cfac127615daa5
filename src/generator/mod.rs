//! Record and dataset generation (spec.md §4.4, §4.5): the
//! constraint-aware layer built on top of [`crate::eval`] that turns a
//! resolved [`crate::ast::SchemaDef`]/[`crate::ast::DatasetDef`] into
//! concrete [`crate::value::Record`]/[`crate::value::Dataset`] values.

pub mod context_apply;
pub mod dataset;
pub mod record;

pub use dataset::{generate_dataset, merge_datasets};
pub use record::generate_record;
