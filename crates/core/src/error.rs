//! Error types shared by the encoding, hashing and signature layers.

use thiserror::Error;

/// Result alias for fallible core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while interpreting bytes that came from outside the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Bad hex, a wrong-length signature, truncated calldata, or an
    /// out-of-range quantity.
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

impl CoreError {
    /// Shorthand for building a [`CoreError::MalformedInput`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput(reason.into())
    }
}

impl From<alloy_sol_types::Error> for CoreError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::MalformedInput(format!("abi decode: {err}"))
    }
}
