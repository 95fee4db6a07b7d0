use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexCappingError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations")]
    ConvergenceFailure { function: String, iterations: u32 },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for IndexCappingError {
    fn from(e: serde_json::Error) -> Self {
        IndexCappingError::SerializationError(e.to_string())
    }
}
