//! Structural verifier
//!
//! Re-checks a finished module without trusting the builder: block shape,
//! branch targets, operand typing, call signatures and SSA dominance.
//! Every problem is collected; verification does not stop at the first.
//!
//! Tail-call hints on calls that are not followed by a return of their
//! result are reported as notes, never as errors.

use log::{debug, warn};
use mcc_common::{BlockId, InstId, TypeId};
use mcc_frontend::ir::{gep, BasicBlock, Function, InstKind, Instruction, IrType, Module, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use crate::error::VerifyError;

/// One problem found by the verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub function: String,
    pub block: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.block {
            Some(block) => write!(f, "{}:{}: {}", self.function, block, self.message),
            None => write!(f, "{}: {}", self.function, self.message),
        }
    }
}

/// Everything the verifier found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub errors: Vec<Diagnostic>,
    /// Advisory findings (misplaced tail-call hints)
    pub notes: Vec<Diagnostic>,
}

impl Report {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Verify a module, logging notes and failing on any error
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    let report = check_module(module);
    for note in &report.notes {
        warn!("{note}");
    }
    if report.is_ok() {
        debug!(
            "Verified module '{}' ({} function(s))",
            module.name,
            module.functions.len()
        );
        return Ok(());
    }
    let lines: Vec<String> = report.errors.iter().map(|d| d.to_string()).collect();
    Err(VerifyError {
        count: lines.len(),
        report: lines.join("\n"),
    })
}

/// Collect every diagnostic for a module
pub fn check_module(module: &Module) -> Report {
    let mut report = Report::default();

    check_types(module, &mut report);
    if !report.is_ok() {
        // Instruction checks walk the registry and need it well formed
        return report;
    }

    for (index, function) in module.functions.iter().enumerate() {
        if function.id.index() != index {
            report.errors.push(Diagnostic {
                function: function.name.clone(),
                block: None,
                message: format!("id {} does not match position {index}", function.id),
            });
            continue;
        }
        FunctionVerifier::new(module, function, &mut report).run();
    }
    report
}

/// Components must be interned before the types that use them, which also
/// rules out cycles
fn check_types(module: &Module, report: &mut Report) {
    for (id, ty) in module.types.iter() {
        let children: Vec<TypeId> = match ty {
            IrType::Ptr(pointee) => vec![*pointee],
            IrType::Array { elem, .. } => vec![*elem],
            IrType::Struct { fields } => fields.clone(),
            IrType::Void | IrType::Int(_) | IrType::F64 => Vec::new(),
        };
        let valid_width = !matches!(ty, IrType::Int(bits) if *bits == 0 || *bits > 64);
        if !valid_width || children.iter().any(|child| child.0 >= id.0) {
            report.errors.push(Diagnostic {
                function: module.name.clone(),
                block: None,
                message: format!("malformed type {id}: {ty:?}"),
            });
        }
    }
}

struct FunctionVerifier<'a> {
    module: &'a Module,
    function: &'a Function,
    report: &'a mut Report,
    /// Defining block, position and result type of every instruction
    defs: HashMap<InstId, (BlockId, usize, Option<TypeId>)>,
    /// Dominator set per block, `None` for unreachable blocks
    dominators: Vec<Option<BTreeSet<BlockId>>>,
}

impl<'a> FunctionVerifier<'a> {
    fn new(module: &'a Module, function: &'a Function, report: &'a mut Report) -> Self {
        Self {
            module,
            function,
            report,
            defs: HashMap::new(),
            dominators: Vec::new(),
        }
    }

    fn run(mut self) {
        let function = self.function;
        let module = self.module;
        let types = &module.types;
        let signature = &function.signature;
        if signature
            .params
            .iter()
            .chain(std::iter::once(&signature.ret))
            .any(|&ty| types.try_get(ty).is_none())
        {
            self.error(None, "signature refers to an unknown type".to_string());
            return;
        }
        if function.is_declaration() {
            return;
        }

        for (index, block) in function.blocks.iter().enumerate() {
            if block.id.index() != index {
                self.error(Some(block), format!("id {} does not match position {index}", block.id));
            }
            for (pos, instr) in block.instructions.iter().enumerate() {
                if self.defs.insert(instr.id, (block.id, pos, instr.result_ty)).is_some() {
                    self.error(Some(block), format!("instruction id {} defined twice", instr.id));
                }
            }
        }

        for block in &function.blocks {
            self.check_block_shape(block);
        }
        self.dominators = compute_dominators(function);

        for block in &function.blocks {
            for (pos, instr) in block.instructions.iter().enumerate() {
                self.check_instruction(block, pos, instr);
            }
        }
    }

    fn check_block_shape(&mut self, block: &BasicBlock) {
        if block.is_empty() {
            self.error(Some(block), "block is empty".to_string());
            return;
        }
        let terminators = block.instructions.iter().filter(|i| i.is_terminator()).count();
        if terminators > 1 {
            self.error(Some(block), format!("block has {terminators} terminators"));
        }
        if block.terminator().is_none() {
            self.error(Some(block), "block does not end with a terminator".to_string());
        }
        for instr in block.instructions.iter().filter(|i| i.is_terminator()) {
            for target in instr.successors() {
                if self.function.get_block(target).is_none() {
                    self.error(Some(block), format!("branch to unknown block {target}"));
                }
            }
        }
    }

    fn check_instruction(&mut self, block: &BasicBlock, pos: usize, instr: &Instruction) {
        let operands = instr.operands();
        for &operand in &operands {
            self.check_operand(block, pos, operand);
        }
        if operands
            .iter()
            .any(|v| self.module.types.try_get(v.ty()).is_none())
        {
            self.error(Some(block), format!("%{} has an operand of unknown type", instr.id));
            return;
        }

        match self.expected_result(block, pos, instr) {
            Ok(expected) if expected == instr.result_ty => {}
            Ok(expected) => {
                let show = |ty: Option<TypeId>| {
                    ty.map(|t| self.module.types.display(t))
                        .unwrap_or_else(|| "none".to_string())
                };
                let message = format!(
                    "%{} has result type {}, expected {}",
                    instr.id,
                    show(instr.result_ty),
                    show(expected)
                );
                self.error(Some(block), message);
            }
            Err(message) => self.error(Some(block), format!("%{}: {message}", instr.id)),
        }
    }

    /// Result type the instruction must have, or why it is ill-typed
    fn expected_result(
        &mut self,
        block: &BasicBlock,
        pos: usize,
        instr: &Instruction,
    ) -> Result<Option<TypeId>, String> {
        let module = self.module;
        let function = self.function;
        let types = &module.types;
        let show = |ty: TypeId| types.display(ty);
        let pointer_to = |ty: TypeId| {
            types
                .find(&IrType::Ptr(ty))
                .ok_or_else(|| format!("pointer to {} is not registered", show(ty)))
        };
        let sized = |ty: TypeId| types.try_get(ty).is_some() && types.size_of(ty).is_some();

        match &instr.kind {
            InstKind::Binary { op, ty, lhs, rhs } => {
                if lhs.ty() != *ty || rhs.ty() != *ty {
                    return Err(format!("operands of {op} must both be {}", show(*ty)));
                }
                match (op.is_float(), types.try_get(*ty)) {
                    (true, Some(IrType::F64)) | (false, Some(IrType::Int(_))) => Ok(Some(*ty)),
                    _ => Err(format!("{op} is not defined on {}", show(*ty))),
                }
            }
            InstKind::ICmp { lhs, rhs, .. } => {
                if lhs.ty() != rhs.ty() || !matches!(types.try_get(lhs.ty()), Some(IrType::Int(_))) {
                    return Err("icmp needs two integers of the same type".to_string());
                }
                types
                    .find(&IrType::Int(1))
                    .map(Some)
                    .ok_or_else(|| "i1 is not registered".to_string())
            }
            InstKind::Load { ty, ptr } => {
                if !types.is_scalar(*ty) || types.pointee(ptr.ty()) != Some(*ty) {
                    return Err(format!("cannot load {} through {}", show(*ty), show(ptr.ty())));
                }
                Ok(Some(*ty))
            }
            InstKind::Store { value, ptr } => {
                if !types.is_scalar(value.ty()) || types.pointee(ptr.ty()) != Some(value.ty()) {
                    return Err(format!(
                        "cannot store {} through {}",
                        show(value.ty()),
                        show(ptr.ty())
                    ));
                }
                Ok(None)
            }
            InstKind::Alloca { ty } => {
                if !sized(*ty) {
                    return Err(format!("cannot allocate {}", show(*ty)));
                }
                pointer_to(*ty).map(Some)
            }
            InstKind::GetElementPtr { base_ty, ptr, indices, .. } => {
                if types.try_get(*base_ty).is_none() {
                    return Err("GEP base type is not registered".to_string());
                }
                let path = gep::resolve(types, *base_ty, ptr.ty(), indices).map_err(|e| e.to_string())?;
                pointer_to(path.target).map(Some)
            }
            InstKind::Call { callee, args, tail } => {
                let target = module
                    .function(*callee)
                    .map_err(|_| format!("call to unknown function {callee}"))?;
                let signature = &target.signature;
                if args.len() != signature.arity() {
                    return Err(format!(
                        "'{}' takes {} argument(s), {} given",
                        target.name,
                        signature.arity(),
                        args.len()
                    ));
                }
                if let Some(i) = args
                    .iter()
                    .zip(&signature.params)
                    .position(|(arg, &param)| arg.ty() != param)
                {
                    return Err(format!("argument {i} of call to '{}' has the wrong type", target.name));
                }
                if *tail && !is_tail_shaped(block, pos, instr, function) {
                    let note = Diagnostic {
                        function: function.name.clone(),
                        block: Some(block.label.clone()),
                        message: format!(
                            "tail call hint on %{} ignored: result is not returned directly",
                            instr.id
                        ),
                    };
                    self.report.notes.push(note);
                }
                let ret = signature.ret;
                Ok((!matches!(types.try_get(ret), Some(IrType::Void))).then_some(ret))
            }
            InstKind::Branch { .. } => Ok(None),
            InstKind::CondBranch { cond, .. } => {
                if types.try_get(cond.ty()) != Some(&IrType::Int(1)) {
                    return Err(format!("branch condition is {}, expected i1", show(cond.ty())));
                }
                Ok(None)
            }
            InstKind::Return { value } => {
                let ret = function.signature.ret;
                let returns_void = matches!(types.try_get(ret), Some(IrType::Void));
                match value {
                    Some(v) if returns_void || v.ty() != ret => Err(format!(
                        "returns {} from a function returning {}",
                        show(v.ty()),
                        show(ret)
                    )),
                    None if !returns_void => Err(format!("ret void from a function returning {}", show(ret))),
                    _ => Ok(None),
                }
            }
        }
    }

    fn check_operand(&mut self, block: &BasicBlock, pos: usize, value: Value) {
        let message = match value {
            Value::Const { ty, .. } => self
                .module
                .types
                .try_get(ty)
                .is_none()
                .then(|| format!("constant {value} has an unknown type")),
            Value::Param { func, index, ty } => (func != self.function.id
                || self.function.signature.params.get(index as usize) != Some(&ty))
            .then(|| format!("{value} is not a parameter of this function")),
            Value::Inst { func, id, ty } => {
                if func != self.function.id {
                    Some(format!("{value} belongs to another function"))
                } else {
                    match self.defs.get(&id).copied() {
                        None => Some(format!("{value} is never defined")),
                        Some((_, _, def_ty)) if def_ty != Some(ty) => {
                            Some(format!("{value} is used with a type other than its definition"))
                        }
                        Some((def_block, def_pos, _)) if !self.dominates(def_block, def_pos, block.id, pos) => {
                            Some(format!("{value} does not dominate its use"))
                        }
                        Some(_) => None,
                    }
                }
            }
        };
        if let Some(message) = message {
            self.error(Some(block), message);
        }
    }

    fn dominates(&self, def_block: BlockId, def_pos: usize, use_block: BlockId, use_pos: usize) -> bool {
        if def_block == use_block {
            return def_pos < use_pos;
        }
        match self.dominators.get(use_block.index()) {
            Some(Some(doms)) => doms.contains(&def_block),
            // Uses in unreachable blocks never execute
            _ => true,
        }
    }

    fn error(&mut self, block: Option<&BasicBlock>, message: String) {
        self.report.errors.push(Diagnostic {
            function: self.function.name.clone(),
            block: block.map(|b| b.label.clone()),
            message,
        });
    }
}

/// A call is in tail position when the next instruction returns its result
fn is_tail_shaped(block: &BasicBlock, pos: usize, call: &Instruction, function: &Function) -> bool {
    let Some(next) = block.instructions.get(pos + 1) else {
        return false;
    };
    match (&next.kind, call.result(function.id)) {
        (InstKind::Return { value: Some(v) }, Some(result)) => *v == result,
        (InstKind::Return { value: None }, None) => true,
        _ => false,
    }
}

/// Iterative dominator sets; the entry block is the first block
fn compute_dominators(function: &Function) -> Vec<Option<BTreeSet<BlockId>>> {
    let n = function.blocks.len();
    let mut reachable = vec![false; n];
    let mut stack = vec![BlockId(0)];
    while let Some(block) = stack.pop() {
        let index = block.index();
        if index >= n || reachable[index] {
            continue;
        }
        reachable[index] = true;
        stack.extend(function.blocks[index].successors());
    }

    let predecessors: Vec<Vec<BlockId>> = (0..n)
        .map(|i| function.predecessors(BlockId(i as u32)))
        .collect();
    let all: BTreeSet<BlockId> = (0..n)
        .filter(|&i| reachable[i])
        .map(|i| BlockId(i as u32))
        .collect();

    let mut dominators: Vec<Option<BTreeSet<BlockId>>> = (0..n)
        .map(|i| {
            reachable[i].then(|| {
                if i == 0 {
                    BTreeSet::from([BlockId(0)])
                } else {
                    all.clone()
                }
            })
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for i in 1..n {
            if !reachable[i] {
                continue;
            }
            let mut new: Option<BTreeSet<BlockId>> = None;
            for pred in &predecessors[i] {
                if let Some(Some(pred_doms)) = dominators.get(pred.index()) {
                    new = Some(match new {
                        None => pred_doms.clone(),
                        Some(acc) => acc.intersection(pred_doms).copied().collect(),
                    });
                }
            }
            let mut new = new.unwrap_or_default();
            new.insert(BlockId(i as u32));
            if dominators[i].as_ref() != Some(&new) {
                dominators[i] = Some(new);
                changed = true;
            }
        }
    }
    dominators
}
