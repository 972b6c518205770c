use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EssEconError {
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Calculation failure: {0}")]
    CalculationFailure(String),

    #[error("Base case calculation failed: {0}")]
    BaseCaseFailure(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for EssEconError {
    fn from(e: serde_json::Error) -> Self {
        EssEconError::SerializationError(e.to_string())
    }
}
