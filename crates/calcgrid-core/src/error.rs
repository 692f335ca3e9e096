//! Error types for calcgrid-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while addressing, editing or calculating cells
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed address or reference argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Formula text failed to compile or failed while evaluating
    #[error("Invalid formula '{input}': {message}")]
    InvalidFormula {
        /// The cell input that produced the formula
        input: String,
        /// What went wrong
        message: String,
    },

    /// A cell transitively depends on itself
    #[error("Circular reference detected at {address} ('{input}')")]
    CircularReference {
        /// Stable address of the cell found already under calculation
        address: String,
        /// That cell's input text
        input: String,
    },

    /// Id or index addressing violation
    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    /// Operation not allowed in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a circular reference error
    pub fn is_circular_reference(&self) -> bool {
        matches!(self, Error::CircularReference { .. })
    }
}
