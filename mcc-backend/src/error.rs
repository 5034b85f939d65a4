//! Backend errors
//!
//! Verification, execution and serialization fail independently, so each
//! gets its own error type.

use mcc_common::IrError;
use thiserror::Error;

/// Structural verification failed; `report` lists every problem found
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Module verification failed with {count} problem(s):\n{report}")]
pub struct VerifyError {
    pub count: usize,
    pub report: String,
}

/// Runtime fault while executing IR
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Ir(#[from] IrError),

    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("Function '{name}' has signature {found}, requested {expected}")]
    SignatureMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Argument {index} of '{function}': {message}")]
    ArgumentMismatch {
        function: String,
        index: usize,
        message: String,
    },

    #[error("Out of bounds access of {len} byte(s) at {addr:#x}")]
    OutOfBounds { addr: u64, len: u64 },

    #[error("Out of memory: {requested} byte(s) requested with {in_use} of {limit} in use")]
    OutOfMemory { requested: u64, in_use: u64, limit: u64 },

    #[error("Free of {addr:#x}, which is not the start of a host allocation")]
    InvalidFree { addr: u64 },

    #[error("Call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("Value {value} used before definition in '{function}'")]
    UndefinedValue { function: String, value: String },

    #[error("Malformed function '{function}': {message}")]
    Malformed { function: String, message: String },
}

/// Failure to write or read a binary artifact
#[derive(Error, Debug)]
pub enum BitcodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Not a bitcode file (bad magic)")]
    BadMagic,

    #[error("Unsupported bitcode version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Bitcode truncated: {len} byte(s)")]
    Truncated { len: usize },
}
