pub mod error;
pub mod financing;
pub mod time_value;
pub mod types;

#[cfg(feature = "engine")]
pub mod engine;

#[cfg(feature = "engine")]
pub mod params;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

pub use error::EssEconError;
pub use types::*;

/// Standard result type for all ess-econ operations
pub type EssEconResult<T> = Result<T, EssEconError>;
