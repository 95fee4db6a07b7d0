pub mod config;
pub mod error;
pub mod ingest;
pub mod io;
pub mod types;
pub mod weighting;

#[cfg(feature = "reporting")]
pub mod reporting;

pub use error::IndexCappingError;
pub use types::*;

/// Standard result type for all index capping computations
pub type IndexCappingResult<T> = Result<T, IndexCappingError>;
