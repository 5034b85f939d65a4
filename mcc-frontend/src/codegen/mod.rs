//! Function assemblers
//!
//! Each assembler declares one function in a module, lays out every block
//! it needs, then fills the blocks through an `IrBuilder`. Assemblers only
//! build IR; running it is the backend's business.
//!
//! All assemblers share the shape
//! `fn(&mut Module, name, bits) -> Result<FunctionId, IrError>`, where
//! `bits` selects the integer width the function computes in.

mod array_loop;
mod fib;
mod munge;
mod sum;

pub use array_loop::create_loop_fn;
pub use fib::create_fib_fn;
pub use munge::{create_get_snd_int_fn, create_munge_fn, munger_struct_type};
pub use sum::create_int_sum_fn;

use log::debug;
use mcc_common::IrError;
use serde::{Deserialize, Serialize};
use crate::ir::Module;

/// Loop exit comparison used by `create_loop_fn`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopBound {
    /// `i <= length`: runs `length + 1` iterations and touches one element
    /// past the end of every buffer
    #[default]
    Inclusive,
    /// `i < length`: the C loop the function is named after
    Exclusive,
}

/// Options for code generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenOptions {
    /// Integer width for `sum`, `fib`, `get_snd_int` and `munge`
    pub int_bits: u32,
    pub loop_bound: LoopBound,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            int_bits: 32,
            loop_bound: LoopBound::default(),
        }
    }
}

/// Width of the loop counter and length parameter (`size_t`)
pub const LOOP_INDEX_BITS: u32 = 64;

/// Build `my_module` with every demo function
pub fn build_demo_module(options: &CodegenOptions) -> Result<Module, IrError> {
    let mut module = Module::new("my_module");

    create_int_sum_fn(&mut module, "sum", options.int_bits)?;
    create_fib_fn(&mut module, "fib", options.int_bits)?;
    create_loop_fn(&mut module, "loop", LOOP_INDEX_BITS, options.loop_bound)?;
    create_get_snd_int_fn(&mut module, "get_snd_int", options.int_bits)?;
    create_munge_fn(&mut module, "munge", options.int_bits)?;

    debug!(
        "Built module '{}' with {} function(s)",
        module.name,
        module.functions.len()
    );
    Ok(module)
}
