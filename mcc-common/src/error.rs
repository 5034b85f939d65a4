//! Error handling for IR construction
//!
//! All misuse of the IR construction API is detected at the point of misuse
//! and reported as an `IrError`. Construction is deterministic, so none of
//! these errors is retryable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Flat classification of construction errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    BlockAlreadyTerminated,
    TypeMismatch,
    InvalidFirstIndexTarget,
    SignatureArityMismatch,
    UnknownFunction,
    NoInsertionPoint,
    UnknownBlock,
    ValueOutOfScope,
    MissingTerminator,
    FunctionSealed,
    DuplicateFunction,
    UnsupportedBitWidth,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::BlockAlreadyTerminated => "block already terminated",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::InvalidFirstIndexTarget => "invalid first index target",
            ErrorKind::SignatureArityMismatch => "signature arity mismatch",
            ErrorKind::UnknownFunction => "unknown function",
            ErrorKind::NoInsertionPoint => "no insertion point",
            ErrorKind::UnknownBlock => "unknown block",
            ErrorKind::ValueOutOfScope => "value out of scope",
            ErrorKind::MissingTerminator => "missing terminator",
            ErrorKind::FunctionSealed => "function sealed",
            ErrorKind::DuplicateFunction => "duplicate function",
            ErrorKind::UnsupportedBitWidth => "unsupported bit width",
        };
        write!(f, "{name}")
    }
}

/// Error raised while constructing IR
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    #[error("Block '{block}' in function '{function}' already has a terminator")]
    BlockAlreadyTerminated { function: String, block: String },

    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("GEP base must be a pointer, got {found}")]
    InvalidFirstIndexTarget { found: String },

    #[error("Function '{function}' takes {expected} parameter(s), {found} requested")]
    SignatureArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("No insertion point: position the builder at a block first")]
    NoInsertionPoint,

    #[error("Unknown block {block} in function '{function}'")]
    UnknownBlock { function: String, block: u32 },

    #[error("Value {value} is not in scope in function '{function}'")]
    ValueOutOfScope { function: String, value: String },

    #[error("Block '{block}' in function '{function}' has no terminator")]
    MissingTerminator { function: String, block: String },

    #[error("Function '{function}' is sealed")]
    FunctionSealed { function: String },

    #[error("Function '{name}' is already declared")]
    DuplicateFunction { name: String },

    #[error("Unsupported integer width i{bits} (expected 1..=64)")]
    UnsupportedBitWidth { bits: u32 },
}

impl IrError {
    /// Get the flat kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            IrError::BlockAlreadyTerminated { .. } => ErrorKind::BlockAlreadyTerminated,
            IrError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            IrError::InvalidFirstIndexTarget { .. } => ErrorKind::InvalidFirstIndexTarget,
            IrError::SignatureArityMismatch { .. } => ErrorKind::SignatureArityMismatch,
            IrError::UnknownFunction { .. } => ErrorKind::UnknownFunction,
            IrError::NoInsertionPoint => ErrorKind::NoInsertionPoint,
            IrError::UnknownBlock { .. } => ErrorKind::UnknownBlock,
            IrError::ValueOutOfScope { .. } => ErrorKind::ValueOutOfScope,
            IrError::MissingTerminator { .. } => ErrorKind::MissingTerminator,
            IrError::FunctionSealed { .. } => ErrorKind::FunctionSealed,
            IrError::DuplicateFunction { .. } => ErrorKind::DuplicateFunction,
            IrError::UnsupportedBitWidth { .. } => ErrorKind::UnsupportedBitWidth,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        IrError::TypeMismatch {
            message: message.into(),
        }
    }
}
