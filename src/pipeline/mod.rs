//! Pipeline registry
//!
//! A pipeline names one report shape: what to request from the provider, how
//! to validate each row, and the schema of the table the rows land in. The
//! set is static; the dispatcher runs every registered pipeline for every
//! discovered account.

mod registry;
mod types;

pub use registry::{PipelineRegistry, ATTRIBUTION_WINDOWS};
pub use types::{
    FieldKind, FieldRule, PipelineDefinition, TableField, TableSchema, UnknownFields, BATCHED_AT,
};

#[cfg(test)]
mod tests;
