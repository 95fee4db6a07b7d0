//! Raw snapshot ingestion: vendor field resolution and normalisation.

pub mod fields;
pub mod normalize;

pub use normalize::{normalize, Constituent, NormalizedTable};
