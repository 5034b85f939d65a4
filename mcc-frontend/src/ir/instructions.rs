//! IR Instructions
//!
//! Defines all instruction kinds available in the IR. Result types are
//! computed by the builder when the instruction is emitted and stored with
//! it; instructions producing nothing carry no result type.

use mcc_common::{BlockId, FunctionId, InstId, TypeId};
use serde::{Deserialize, Serialize};
use crate::ir::{BinaryOp, IntPredicate, Value};

/// Instruction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstKind {
    /// Arithmetic: result = op ty lhs, rhs
    Binary {
        op: BinaryOp,
        ty: TypeId,
        lhs: Value,
        rhs: Value,
    },

    /// Integer comparison: result = icmp pred lhs, rhs
    ICmp {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },

    /// Load from memory: result = load ty, ptr
    Load { ty: TypeId, ptr: Value },

    /// Store to memory: store value, ptr
    Store { value: Value, ptr: Value },

    /// Stack slot for one value of `ty`: result = alloca ty
    Alloca { ty: TypeId },

    /// Address computation: result = getelementptr base_ty, ptr, indices...
    /// Never touches memory. `inbounds` is metadata for the consumer.
    GetElementPtr {
        base_ty: TypeId,
        ptr: Value,
        indices: Vec<Value>,
        inbounds: bool,
    },

    /// Direct call; `tail` is an advisory hint, not a guarantee
    Call {
        callee: FunctionId,
        args: Vec<Value>,
        tail: bool,
    },

    /// Unconditional branch: br label
    Branch { target: BlockId },

    /// Conditional branch: br cond, then_block, else_block
    CondBranch {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },

    /// Return: ret value or ret void
    Return { value: Option<Value> },
}

impl InstKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Branch { .. } | InstKind::CondBranch { .. } | InstKind::Return { .. }
        )
    }

    /// Values read by this instruction, in operand order
    pub fn operands(&self) -> Vec<Value> {
        match self {
            InstKind::Binary { lhs, rhs, .. } | InstKind::ICmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::Load { ptr, .. } => vec![*ptr],
            InstKind::Store { value, ptr } => vec![*value, *ptr],
            InstKind::Alloca { .. } | InstKind::Branch { .. } => Vec::new(),
            InstKind::GetElementPtr { ptr, indices, .. } => {
                let mut operands = vec![*ptr];
                operands.extend(indices.iter().copied());
                operands
            }
            InstKind::Call { args, .. } => args.clone(),
            InstKind::CondBranch { cond, .. } => vec![*cond],
            InstKind::Return { value } => value.iter().copied().collect(),
        }
    }

    /// Blocks control may transfer to after this instruction
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Branch { target } => vec![*target],
            InstKind::CondBranch { then_block, else_block, .. } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }
}

/// IR Instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstId,
    pub kind: InstKind,
    pub result_ty: Option<TypeId>,
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        self.kind.is_terminator()
    }

    /// The value this instruction defines, if any
    pub fn result(&self, func: FunctionId) -> Option<Value> {
        self.result_ty.map(|ty| Value::Inst { func, id: self.id, ty })
    }

    pub fn operands(&self) -> Vec<Value> {
        self.kind.operands()
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.kind.successors()
    }
}
