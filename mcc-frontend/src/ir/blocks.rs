//! Basic Block Management
//!
//! Defines basic blocks - sequences of instructions with single entry and a
//! single terminator. Blocks live in their function's block table and are
//! referred to by `BlockId`.

use mcc_common::BlockId;
use serde::{Deserialize, Serialize};
use crate::ir::Instruction;

/// Basic Block - a sequence of instructions ending in one terminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub label: String,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(id: BlockId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            instructions: Vec::new(),
        }
    }

    pub(crate) fn insert_instruction(&mut self, index: usize, instr: Instruction) {
        self.instructions.insert(index, instr);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn has_terminator(&self) -> bool {
        self.instructions.iter().any(Instruction::is_terminator)
    }

    /// The block's terminator, if it is in last position
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|instr| instr.is_terminator())
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator().map(Instruction::successors).unwrap_or_default()
    }
}
