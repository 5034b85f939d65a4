//! IR Value Representations
//!
//! A `Value` is a small typed handle. It is produced exactly once (a constant
//! literal, a bound function parameter, or the result of one instruction)
//! and is referenced by identity from the instructions that use it.

use mcc_common::{FunctionId, InstId, TypeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// IR Value - an operand of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Constant; integers are stored truncated to their width, doubles as
    /// their IEEE-754 bit pattern
    Const { ty: TypeId, bits: u64 },

    /// Function parameter bound to an argument position
    Param {
        func: FunctionId,
        index: u32,
        ty: TypeId,
    },

    /// Result of an instruction
    Inst {
        func: FunctionId,
        id: InstId,
        ty: TypeId,
    },
}

impl Value {
    pub fn ty(&self) -> TypeId {
        match self {
            Value::Const { ty, .. } | Value::Param { ty, .. } | Value::Inst { ty, .. } => *ty,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Const { .. })
    }

    /// Raw bits of a constant
    pub fn const_bits(&self) -> Option<u64> {
        match self {
            Value::Const { bits, .. } => Some(*bits),
            _ => None,
        }
    }

    /// The function this value is local to; constants belong to none
    pub fn owner(&self) -> Option<FunctionId> {
        match self {
            Value::Const { .. } => None,
            Value::Param { func, .. } | Value::Inst { func, .. } => Some(*func),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const { bits, .. } => write!(f, "{}", *bits as i64),
            Value::Param { index, .. } => write!(f, "%arg{index}"),
            Value::Inst { id, .. } => write!(f, "%{id}"),
        }
    }
}
