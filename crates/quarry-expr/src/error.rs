//! Expression environment error types.

use thiserror::Error;

/// Error that can occur while compiling or evaluating an expression.
#[derive(Debug, Error)]
pub enum ExprError {
    /// The expression failed to compile.
    #[error("failed to compile expression {expr:?}: {message}")]
    Compile { expr: String, message: String },

    /// The expression failed at evaluation time, including errors raised
    /// by extension functions.
    #[error("failed to evaluate expression {expr:?}: {message}")]
    Eval { expr: String, message: String },

    /// The evaluated value had an unexpected type.
    #[error("expected {expected}, got {actual}")]
    Type {
        expected: &'static str,
        actual: String,
    },
}

/// Result type for expression operations.
pub type ExprResult<T> = Result<T, ExprError>;
