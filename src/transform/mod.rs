//! Record transformation
//!
//! Every provider row is validated once, at the boundary, against its
//! pipeline's rules and turned into an [`EnrichedRecord`] that carries the
//! pipeline name and the ingestion timestamp. Nothing downstream inspects raw
//! provider rows.

mod transformer;

pub use transformer::{EnrichedRecord, Transformer};
