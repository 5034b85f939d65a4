//! Minimal C-like Compiler - Backend
//!
//! This crate consumes finished IR modules from `mcc-frontend`:
//! - verify: structural verification with a full diagnostics report
//! - engine: execution of named functions over a checked byte memory
//! - bitcode: binary serialization of a module

pub mod bitcode;
pub mod engine;
pub mod error;
pub mod memory;
pub mod verify;

// Re-export IR types from frontend for convenience
pub use mcc_frontend::ir::{Module, Signature};

pub use bitcode::{read_bitcode, read_bitcode_file, write_bitcode, write_bitcode_to_file};
pub use engine::{EntryPoint, ExecutionEngine, RtValue};
pub use error::{BitcodeError, EngineError, VerifyError};
pub use verify::{check_module, verify_module, Diagnostic, Report};

use serde::{Deserialize, Serialize};

/// Options for the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Upper bound on live bytes across host buffers and stack slots
    pub memory_limit: u64,
    /// Maximum number of simultaneously active frames
    pub max_call_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            memory_limit: 1 << 20,
            max_call_depth: 4096,
        }
    }
}

/// What a backend must offer for a finished module
pub trait IrConsumer {
    /// Structural check; the error carries every diagnostic
    fn verify(&self, module: &Module) -> Result<(), VerifyError>;

    /// Produce the binary artifact for a module
    fn serialize(&self, module: &Module) -> Result<Vec<u8>, BitcodeError>;

    /// Reconstruct a module from `serialize` output
    fn deserialize(&self, bytes: &[u8]) -> Result<Module, BitcodeError>;
}

/// The in-process backend: verifier, interpreter and bincode artifacts
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBackend {
    pub options: EngineOptions,
}

impl ReferenceBackend {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    /// Bind an execution engine to `module`; verifies first
    pub fn engine<'m>(&self, module: &'m Module) -> Result<ExecutionEngine<'m>, EngineError> {
        ExecutionEngine::new(module, self.options)
    }
}

impl IrConsumer for ReferenceBackend {
    fn verify(&self, module: &Module) -> Result<(), VerifyError> {
        verify_module(module)
    }

    fn serialize(&self, module: &Module) -> Result<Vec<u8>, BitcodeError> {
        write_bitcode(module)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Module, BitcodeError> {
        read_bitcode(bytes)
    }
}
