//! Function Definitions
//!
//! Defines IR functions with their signatures, block tables, and linkage.

use mcc_common::{BlockId, FunctionId, InstId, TypeId};
use serde::{Deserialize, Serialize};
use crate::ir::BasicBlock;

/// Linkage types for functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Linkage {
    #[default]
    External, // Visible to other modules
    Internal, // Only visible within this module (static)
}

/// Typed function signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

impl Signature {
    pub fn new(params: Vec<TypeId>, ret: TypeId) -> Self {
        Self { params, ret }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Function in IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub signature: Signature,
    pub blocks: Vec<BasicBlock>,
    pub linkage: Linkage,
    pub sealed: bool,
    next_inst: u32,
}

impl Function {
    pub fn new(id: FunctionId, name: String, signature: Signature) -> Self {
        Self {
            id,
            name,
            signature,
            blocks: Vec::new(),
            linkage: Linkage::External,
            sealed: false,
            next_inst: 0,
        }
    }

    /// A function without blocks is only a declaration
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id, label));
        id
    }

    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    pub fn get_block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.index())
    }

    pub fn block_by_label(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Allocate the id for the next emitted instruction
    pub(crate) fn next_inst_id(&mut self) -> InstId {
        let id = InstId(self.next_inst);
        self.next_inst += 1;
        id
    }

    /// Whether an instruction id has been handed out in this function
    pub fn defines(&self, id: InstId) -> bool {
        id.0 < self.next_inst
    }

    /// Number of instruction ids handed out so far
    pub fn inst_count(&self) -> usize {
        self.next_inst as usize
    }

    /// Blocks whose terminator targets `id`
    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.successors().contains(&id))
            .map(|b| b.id)
            .collect()
    }
}
