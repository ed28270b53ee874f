//! Error handling for the iGEMM code generator
//! 
//! Input validation errors are recoverable by the caller choosing different
//! parameters. `Internal` marks a logic defect in the generator itself and
//! `Misuse` marks a call through an entry point that must not be used.

use crate::types::Precision;
use thiserror::Error;

/// Main error type for every generation phase
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("Invalid transpose shape {rows}x{cols}: rows and cols must both be greater than 1")]
    InvalidShape { rows: usize, cols: usize },

    #[error("Width mismatch: d1 length {length} must equal vector width {vector}")]
    WidthMismatch { length: u32, vector: u32 },

    #[error("Unsupported precision: {0}")]
    UnsupportedPrecision(Precision),

    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    #[error("Unsupported access width: {0} bytes")]
    UnsupportedWidth(u32),

    #[error("Misuse: {0}")]
    Misuse(String),

    #[error("Internal code generator error: {0}")]
    Internal(String),
}

impl CodegenError {
    /// Create an internal-consistency error
    pub fn internal(message: impl Into<String>) -> Self {
        CodegenError::Internal(message.into())
    }

    /// Create a misuse error
    pub fn misuse(message: impl Into<String>) -> Self {
        CodegenError::Misuse(message.into())
    }

    /// True for errors that indicate a defect rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(self, CodegenError::Internal(_))
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, CodegenError::Misuse(_))
    }
}
