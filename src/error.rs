//! Error types for the graph analyses.

use thiserror::Error;

/// Precondition violations raised by the analysis engine.
///
/// Graph construction and the cycle / level analyses are total; only the
/// neighborhood query can reject its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The requested module is not part of the graph.
    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// An argument was outside its accepted domain (e.g. a negative depth).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// A specialized Result type for engine operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;
