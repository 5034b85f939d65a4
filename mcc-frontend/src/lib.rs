//! Minimal C-like Compiler - Frontend
//!
//! This crate provides the IR-construction half of the compiler:
//! - IR: typed values, instructions and basic blocks behind a cursor builder
//! - GEP: address computation through pointer, struct and array types
//! - Codegen: lowering routines for the demo functions (`sum`, `fib`,
//!   `loop`, `get_snd_int`, `munge`)

pub mod ir;
pub mod codegen;

pub use ir::{IrBuilder, IrType, Module, Signature, TypeRegistry, Value};
pub use codegen::{build_demo_module, CodegenOptions, LoopBound};
