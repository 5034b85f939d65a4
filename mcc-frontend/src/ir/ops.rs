//! IR Operations
//!
//! Defines the arithmetic operations and integer comparison predicates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary arithmetic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    FMul,
}

impl BinaryOp {
    /// Whether the operation works on doubles rather than integers
    pub fn is_float(&self) -> bool {
        matches!(self, BinaryOp::FMul)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::FMul => "fmul",
        };
        write!(f, "{op_str}")
    }
}

/// Integer comparison predicates (result is i1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt, Sle, Sgt, Sge, // Signed comparisons
    Ult, Ule, Ugt, Uge, // Unsigned comparisons
}

impl IntPredicate {
    /// Evaluate the predicate on two values of the given bit width.
    /// Operands are raw bits; signed predicates sign-extend them first.
    pub fn evaluate(&self, lhs: u64, rhs: u64, bits: u32) -> bool {
        let (sl, sr) = (sign_extend(lhs, bits), sign_extend(rhs, bits));
        let (ul, ur) = (truncate(lhs, bits), truncate(rhs, bits));
        match self {
            IntPredicate::Eq => ul == ur,
            IntPredicate::Ne => ul != ur,
            IntPredicate::Slt => sl < sr,
            IntPredicate::Sle => sl <= sr,
            IntPredicate::Sgt => sl > sr,
            IntPredicate::Sge => sl >= sr,
            IntPredicate::Ult => ul < ur,
            IntPredicate::Ule => ul <= ur,
            IntPredicate::Ugt => ul > ur,
            IntPredicate::Uge => ul >= ur,
        }
    }
}

impl fmt::Display for IntPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pred_str = match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
        };
        write!(f, "{pred_str}")
    }
}

/// Keep the low `bits` bits of a value
pub fn truncate(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Interpret the low `bits` bits of a value as a two's complement integer
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits >= 64 {
        value as i64
    } else {
        let shift = 64 - bits;
        ((value << shift) as i64) >> shift
    }
}
