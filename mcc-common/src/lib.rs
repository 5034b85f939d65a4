//! Minimal C-like code generator - Common Types and Errors
//!
//! This crate contains the id handles and the construction error type
//! shared by the IR frontend, the reference backend and the driver.

pub mod error;
pub mod types;

pub use error::{ErrorKind, IrError};
pub use types::*;
