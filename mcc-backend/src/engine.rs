//! Execution engine
//!
//! Interprets verified IR over a byte-addressed `Memory`. Calls run on an
//! explicit frame stack, so recursion depth is bounded by
//! `EngineOptions::max_call_depth` rather than by the host stack.
//!
//! Values are kept as raw 64-bit patterns: integers truncated to their
//! width, doubles as IEEE-754 bits, pointers as addresses. Tail-call hints
//! are ignored; every call gets its own frame.

use log::{debug, trace};
use mcc_common::{BlockId, FunctionId, TypeId};
use mcc_frontend::ir::ops::{sign_extend, truncate};
use mcc_frontend::ir::{gep, int_storage_bytes, BinaryOp, Function, InstKind, Instruction, IrType, Module, Signature, TypeRegistry, Value};
use mcc_frontend::ir::gep::GepStep;
use crate::error::EngineError;
use crate::memory::{Memory, RegionKind};
use crate::verify::verify_module;
use crate::EngineOptions;

/// Host-side view of a runtime value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RtValue {
    Int(i64),
    F64(f64),
    Ptr(u64),
}

/// A function resolved by name and signature, ready to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    function: FunctionId,
}

impl EntryPoint {
    pub fn function(&self) -> FunctionId {
        self.function
    }
}

/// Activation record of one call
struct Frame {
    function: FunctionId,
    block: BlockId,
    pc: usize,
    args: Vec<u64>,
    values: Vec<Option<u64>>,
    allocas: Vec<u64>,
}

impl Frame {
    fn new(function: &Function, args: Vec<u64>) -> Self {
        Self {
            function: function.id,
            block: BlockId(0),
            pc: 0,
            args,
            values: vec![None; function.inst_count()],
            allocas: Vec::new(),
        }
    }
}

/// What executing one instruction asks the interpreter loop to do next
enum Step {
    Next,
    Jump(BlockId),
    Call { callee: FunctionId, args: Vec<u64> },
    Return(Option<u64>),
}

pub struct ExecutionEngine<'m> {
    module: &'m Module,
    memory: Memory,
    options: EngineOptions,
}

impl<'m> ExecutionEngine<'m> {
    /// Verify `module` and prepare to run it
    pub fn new(module: &'m Module, options: EngineOptions) -> Result<Self, EngineError> {
        verify_module(module)?;
        debug!(
            "Created execution engine for '{}' ({} byte memory limit)",
            module.name, options.memory_limit
        );
        Ok(Self {
            module,
            memory: Memory::new(options.memory_limit),
            options,
        })
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Resolve `name`, provided its signature is exactly `signature`
    pub fn get_function(&self, name: &str, signature: &Signature) -> Result<EntryPoint, EngineError> {
        let function = self
            .module
            .get_function(name)
            .ok_or_else(|| EngineError::UnknownFunction {
                name: name.to_string(),
            })?;
        if function.is_declaration() {
            return Err(EngineError::UnknownFunction {
                name: name.to_string(),
            });
        }
        if function.signature != *signature {
            return Err(EngineError::SignatureMismatch {
                name: name.to_string(),
                expected: self.display_signature(signature),
                found: self.display_signature(&function.signature),
            });
        }
        Ok(EntryPoint {
            function: function.id,
        })
    }

    /// Run `entry` to completion. Returns `None` for void functions.
    pub fn call(&mut self, entry: EntryPoint, args: &[RtValue]) -> Result<Option<RtValue>, EngineError> {
        let module = self.module;
        let function = module.function(entry.function)?;
        let signature = &function.signature;
        if args.len() != signature.arity() {
            return Err(EngineError::ArgumentMismatch {
                function: function.name.clone(),
                index: args.len().min(signature.arity()),
                message: format!("{} argument(s) expected, {} given", signature.arity(), args.len()),
            });
        }

        let raw_args = args
            .iter()
            .zip(&signature.params)
            .enumerate()
            .map(|(index, (arg, &ty))| self.to_raw(function, index, *arg, ty))
            .collect::<Result<Vec<u64>, EngineError>>()?;

        trace!("call {}({:?})", function.name, args);
        let result = self.run(function, raw_args)?;
        Ok(result.map(|raw| self.from_raw(raw, signature.ret)))
    }

    // === Host memory helpers ===

    /// Zeroed host buffer of `size` bytes
    pub fn alloc_bytes(&mut self, size: u64) -> Result<u64, EngineError> {
        self.memory.allocate(size, RegionKind::Host)
    }

    pub fn free(&mut self, addr: u64) -> Result<(), EngineError> {
        self.memory.release(addr, RegionKind::Host)
    }

    /// Host buffer holding `values`, sized for exactly that many doubles
    pub fn alloc_f64s(&mut self, values: &[f64]) -> Result<u64, EngineError> {
        let addr = self.alloc_bytes(values.len() as u64 * 8)?;
        for (i, value) in values.iter().enumerate() {
            self.memory.write_u64(addr + i as u64 * 8, 8, value.to_bits())?;
        }
        Ok(addr)
    }

    pub fn read_f64s(&self, addr: u64, count: usize) -> Result<Vec<f64>, EngineError> {
        (0..count as u64)
            .map(|i| self.memory.read_u64(addr + i * 8, 8).map(f64::from_bits))
            .collect()
    }

    /// Store an integer of width `bits` with the same layout the IR uses
    pub fn write_int(&mut self, addr: u64, bits: u32, value: i64) -> Result<(), EngineError> {
        let size = int_storage_bytes(bits);
        self.memory.write_u64(addr, size, truncate(value as u64, bits))
    }

    pub fn read_int(&self, addr: u64, bits: u32) -> Result<i64, EngineError> {
        let raw = self.memory.read_u64(addr, int_storage_bytes(bits))?;
        Ok(sign_extend(raw, bits))
    }

    // === Interpreter ===

    fn run(&mut self, entry: &'m Function, args: Vec<u64>) -> Result<Option<u64>, EngineError> {
        let mut stack = vec![Frame::new(entry, args)];
        let result = self.interpret(&mut stack);

        // A fault leaves frames behind; their stack slots are still live
        for frame in stack.iter().rev() {
            for addr in frame.allocas.iter().rev() {
                self.memory.release(*addr, RegionKind::Stack)?;
            }
        }
        result
    }

    fn interpret(&mut self, stack: &mut Vec<Frame>) -> Result<Option<u64>, EngineError> {
        let module = self.module;

        loop {
            let Some(frame) = stack.last_mut() else {
                return Ok(None);
            };
            let function = module.function(frame.function)?;
            let instr = current_instruction(function, frame)?;

            match self.execute(function, frame, instr)? {
                Step::Next => frame.pc += 1,
                Step::Jump(target) => {
                    frame.block = target;
                    frame.pc = 0;
                }
                Step::Call { callee, args } => {
                    if stack.len() >= self.options.max_call_depth {
                        return Err(EngineError::CallDepthExceeded {
                            limit: self.options.max_call_depth,
                        });
                    }
                    let callee = module.function(callee)?;
                    trace!("{} -> {} (depth {})", function.name, callee.name, stack.len() + 1);
                    stack.push(Frame::new(callee, args));
                }
                Step::Return(value) => {
                    let Some(done) = stack.pop() else {
                        return Ok(value);
                    };
                    for addr in done.allocas.iter().rev() {
                        self.memory.release(*addr, RegionKind::Stack)?;
                    }
                    let Some(caller) = stack.last_mut() else {
                        return Ok(value);
                    };
                    // The caller is parked on its call instruction
                    let caller_fn = module.function(caller.function)?;
                    let call = current_instruction(caller_fn, caller)?;
                    if let (Some(slot), Some(value)) = (caller.values.get_mut(call.id.index()), value) {
                        *slot = Some(value);
                    }
                    caller.pc += 1;
                }
            }
        }
    }

    fn execute(&mut self, function: &Function, frame: &mut Frame, instr: &Instruction) -> Result<Step, EngineError> {
        let module = self.module;
        let types = &module.types;

        let result = match &instr.kind {
            InstKind::Binary { op, ty, lhs, rhs } => {
                let (a, b) = (self.eval(function, frame, lhs)?, self.eval(function, frame, rhs)?);
                let raw = match op {
                    BinaryOp::FMul => (f64::from_bits(a) * f64::from_bits(b)).to_bits(),
                    BinaryOp::Add => truncate(a.wrapping_add(b), int_width(types, *ty)),
                    BinaryOp::Sub => truncate(a.wrapping_sub(b), int_width(types, *ty)),
                    BinaryOp::Mul => truncate(a.wrapping_mul(b), int_width(types, *ty)),
                };
                Some(raw)
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                let (a, b) = (self.eval(function, frame, lhs)?, self.eval(function, frame, rhs)?);
                Some(pred.evaluate(a, b, int_width(types, lhs.ty())) as u64)
            }
            InstKind::Load { ty, ptr } => {
                let addr = self.eval(function, frame, ptr)?;
                let raw = self.memory.read_u64(addr, self.scalar_size(function, *ty)?)?;
                Some(match types.int_width(*ty) {
                    Some(bits) => truncate(raw, bits),
                    None => raw,
                })
            }
            InstKind::Store { value, ptr } => {
                let raw = self.eval(function, frame, value)?;
                let addr = self.eval(function, frame, ptr)?;
                let size = self.scalar_size(function, value.ty())?;
                self.memory.write_u64(addr, size, raw)?;
                None
            }
            InstKind::Alloca { ty } => {
                let size = self.size_of(function, *ty)?;
                let addr = self.memory.allocate(size, RegionKind::Stack)?;
                frame.allocas.push(addr);
                Some(addr)
            }
            InstKind::GetElementPtr { base_ty, ptr, indices, .. } => {
                Some(self.address_of(function, frame, *base_ty, ptr, indices)?)
            }
            InstKind::Call { callee, args, .. } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(function, frame, arg))
                    .collect::<Result<Vec<u64>, EngineError>>()?;
                return Ok(Step::Call { callee: *callee, args });
            }
            InstKind::Branch { target } => return Ok(Step::Jump(*target)),
            InstKind::CondBranch { cond, then_block, else_block } => {
                let taken = if self.eval(function, frame, cond)? & 1 == 1 {
                    *then_block
                } else {
                    *else_block
                };
                return Ok(Step::Jump(taken));
            }
            InstKind::Return { value } => {
                let value = value
                    .as_ref()
                    .map(|v| self.eval(function, frame, v))
                    .transpose()?;
                return Ok(Step::Return(value));
            }
        };

        if let (Some(raw), Some(slot)) = (result, frame.values.get_mut(instr.id.index())) {
            *slot = Some(raw);
        }
        Ok(Step::Next)
    }

    /// Effective address of a GEP; computed without touching memory
    fn address_of(
        &self,
        function: &Function,
        frame: &Frame,
        base_ty: TypeId,
        ptr: &Value,
        indices: &[Value],
    ) -> Result<u64, EngineError> {
        let types = &self.module.types;
        let path = gep::resolve(types, base_ty, ptr.ty(), indices)?;
        let mut addr = self.eval(function, frame, ptr)?;

        for step in &path.steps {
            let offset = match step {
                GepStep::Pointer { stride: ty, index } | GepStep::Element { elem: ty, index } => {
                    let raw = self.eval(function, frame, index)?;
                    let index = sign_extend(raw, int_width(types, index.ty()));
                    index.wrapping_mul(self.size_of(function, *ty)? as i64) as u64
                }
                GepStep::Field { struct_ty, field } => types
                    .field_offset(*struct_ty, *field)
                    .ok_or_else(|| malformed(function, format!("no field {field} in {}", types.display(*struct_ty))))?,
            };
            addr = addr.wrapping_add(offset);
        }
        trace!("gep {} -> {addr:#x}", types.display(base_ty));
        Ok(addr)
    }

    fn eval(&self, function: &Function, frame: &Frame, value: &Value) -> Result<u64, EngineError> {
        let raw = match value {
            Value::Const { bits, .. } => Some(*bits),
            Value::Param { index, .. } => frame.args.get(*index as usize).copied(),
            Value::Inst { id, .. } => frame.values.get(id.index()).copied().flatten(),
        };
        raw.ok_or_else(|| EngineError::UndefinedValue {
            function: function.name.clone(),
            value: value.to_string(),
        })
    }

    fn size_of(&self, function: &Function, ty: TypeId) -> Result<u64, EngineError> {
        self.module
            .types
            .size_of(ty)
            .ok_or_else(|| malformed(function, format!("{} has no size", self.module.types.display(ty))))
    }

    /// Size of a value one load or store moves
    fn scalar_size(&self, function: &Function, ty: TypeId) -> Result<u64, EngineError> {
        if !self.module.types.is_scalar(ty) {
            let message = format!("{} is not a scalar", self.module.types.display(ty));
            return Err(malformed(function, message));
        }
        self.size_of(function, ty)
    }

    fn to_raw(&self, function: &Function, index: usize, arg: RtValue, ty: TypeId) -> Result<u64, EngineError> {
        let types = &self.module.types;
        match (arg, types.get(ty)) {
            (RtValue::Int(v), IrType::Int(bits)) => Ok(truncate(v as u64, *bits)),
            (RtValue::F64(v), IrType::F64) => Ok(v.to_bits()),
            (RtValue::Ptr(addr), IrType::Ptr(_)) => Ok(addr),
            (arg, _) => Err(EngineError::ArgumentMismatch {
                function: function.name.clone(),
                index,
                message: format!("{arg:?} passed for a parameter of type {}", types.display(ty)),
            }),
        }
    }

    fn from_raw(&self, raw: u64, ty: TypeId) -> RtValue {
        match self.module.types.get(ty) {
            IrType::Int(bits) => RtValue::Int(sign_extend(raw, *bits)),
            IrType::F64 => RtValue::F64(f64::from_bits(raw)),
            _ => RtValue::Ptr(raw),
        }
    }

    fn display_signature(&self, signature: &Signature) -> String {
        let types = &self.module.types;
        let params: Vec<String> = signature.params.iter().map(|&p| types.display(p)).collect();
        format!("{} ({})", types.display(signature.ret), params.join(", "))
    }
}

fn current_instruction<'f>(function: &'f Function, frame: &Frame) -> Result<&'f Instruction, EngineError> {
    function
        .get_block(frame.block)
        .and_then(|block| block.instructions.get(frame.pc))
        .ok_or_else(|| malformed(function, format!("fell off the end of {}", frame.block)))
}

fn malformed(function: &Function, message: String) -> EngineError {
    EngineError::Malformed {
        function: function.name.clone(),
        message,
    }
}

/// Width of an integer type; verified modules only ask this of integers
fn int_width(types: &TypeRegistry, ty: TypeId) -> u32 {
    types.int_width(ty).unwrap_or(64)
}
