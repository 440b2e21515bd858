//! Error types for the search strategies and the orchestrator.

use thiserror::Error;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while searching for a counterfactual.
///
/// Apart from [`SearchError::OracleUnavailable`] and an invalid original class,
/// the orchestrator records these per method instead of returning them.
#[derive(Error, Debug)]
pub enum SearchError {
    /// No scoring oracle was configured.
    #[error("No scoring oracle configured")]
    OracleUnavailable,

    /// Search parameters violate a precondition.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The oracle did not produce a gradient for the input.
    #[error("Gradient unavailable at iteration {iteration}")]
    GradientUnavailable {
        /// Iteration at which backpropagation failed.
        iteration: usize,
    },

    /// Loss or gradient turned NaN or infinite.
    #[error("Non-finite {what} at iteration {iteration}")]
    NonFinite {
        /// Which quantity went non-finite.
        what: &'static str,
        /// Iteration at which it happened.
        iteration: usize,
    },

    /// Configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Core error (oracle failure, shape problems, bad class index).
    #[error("Core error: {0}")]
    CoreError(#[from] cfx_core::CoreError),
}
