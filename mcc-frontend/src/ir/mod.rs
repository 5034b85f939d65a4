//! Control-flow-graph Intermediate Representation
//!
//! Typed values, instructions and basic blocks, built through an explicit
//! cursor and handed to a backend once every function is sealed.
//!
//! ## Architecture
//!
//! The module is structured as follows:
//! - `types` - Interned type universe and data layout (IrType, TypeRegistry)
//! - `values` - Value handles (constants, parameters, instruction results)
//! - `ops` - Arithmetic operations and integer predicates
//! - `instructions` - IR instructions
//! - `blocks` - Basic block management
//! - `function` - Function definitions and signatures
//! - `module` - Module owning functions and types
//! - `gep` - Address resolution through aggregate types
//! - `builder` - Cursor-based IR construction
//! - `printer` - Textual listing

// Public exports - clean API surface
pub use self::types::{int_storage_bytes, IrType, TypeRegistry};
pub use self::values::Value;
pub use self::ops::{BinaryOp, IntPredicate};
pub use self::instructions::{InstKind, Instruction};
pub use self::blocks::BasicBlock;
pub use self::function::{Function, Linkage, Signature};
pub use self::module::Module;
pub use self::builder::{BlockRef, Cursor, IrBuilder};
pub use self::printer::{FunctionDisplay, ModuleDisplay};

// Internal modules
mod types;
mod values;
pub mod ops;
mod instructions;
mod blocks;
mod function;
mod module;
pub mod gep;
mod builder;
mod printer;

#[cfg(test)]
mod tests;
