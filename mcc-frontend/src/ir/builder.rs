//! IR Builder
//!
//! Appends instructions at an explicit cursor. The cursor belongs to the
//! builder, and the builder holds the only mutable borrow of its module for
//! the whole construction session, so independent sessions cannot
//! interfere with each other.
//!
//! Bodies are built by creating every block a function needs up front and
//! then filling them one at a time with `position_at_end`; forward branch
//! targets therefore always exist before they are referenced.

use log::{debug, trace};
use mcc_common::{BlockId, FunctionId, InstId, IrError, TypeId};
use crate::ir::gep;
use crate::ir::{BinaryOp, InstKind, Instruction, IntPredicate, Module, Value};

/// Handle to a block of a specific function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub function: FunctionId,
    pub block: BlockId,
}

/// Emission position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub function: FunctionId,
    pub block: BlockId,
    pub insertion_point: usize,
}

/// Builder for constructing IR
pub struct IrBuilder<'m> {
    module: &'m mut Module,
    cursor: Option<Cursor>,
}

impl<'m> IrBuilder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Self {
            module,
            cursor: None,
        }
    }

    pub fn module(&self) -> &Module {
        &*self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut *self.module
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn clear_cursor(&mut self) {
        self.cursor = None;
    }

    /// Append a new, empty block to `func`
    pub fn create_block(&mut self, func: FunctionId, label: &str) -> Result<BlockRef, IrError> {
        let function = self.module.function_mut(func)?;
        if function.sealed {
            return Err(IrError::FunctionSealed {
                function: function.name.clone(),
            });
        }
        let block = function.add_block(label);
        debug!("Created block '{label}' ({block}) in '{}'", function.name);
        Ok(BlockRef {
            function: func,
            block,
        })
    }

    /// Move the cursor to the end of `block`
    pub fn position_at_end(&mut self, block: BlockRef) -> Result<(), IrError> {
        let function = self.module.function(block.function)?;
        let bb = function
            .get_block(block.block)
            .ok_or_else(|| IrError::UnknownBlock {
                function: function.name.clone(),
                block: block.block.0,
            })?;
        self.cursor = Some(Cursor {
            function: block.function,
            block: block.block,
            insertion_point: bb.len(),
        });
        Ok(())
    }

    // === Arithmetic ===

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Result<Value, IrError> {
        self.build_int_binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value) -> Result<Value, IrError> {
        self.build_int_binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Result<Value, IrError> {
        self.build_int_binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn fmul(&mut self, lhs: Value, rhs: Value) -> Result<Value, IrError> {
        let ty = lhs.ty();
        if !self.module.types.is_f64(ty) || rhs.ty() != ty {
            return Err(self.operand_mismatch("fmul", lhs, rhs));
        }
        self.emit_value(InstKind::Binary { op: BinaryOp::FMul, ty, lhs, rhs }, ty)
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Result<Value, IrError> {
        let ty = lhs.ty();
        if !self.module.types.is_int(ty) || rhs.ty() != ty {
            return Err(self.operand_mismatch("icmp", lhs, rhs));
        }
        let bool_ty = self.module.types.bool();
        self.emit_value(InstKind::ICmp { pred, lhs, rhs }, bool_ty)
    }

    fn build_int_binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, IrError> {
        let ty = lhs.ty();
        if !self.module.types.is_int(ty) || rhs.ty() != ty {
            return Err(self.operand_mismatch(&op.to_string(), lhs, rhs));
        }
        self.emit_value(InstKind::Binary { op, ty, lhs, rhs }, ty)
    }

    // === Memory ===

    /// Reserve a stack slot for one `ty`; yields a `ty*`
    pub fn alloca(&mut self, ty: TypeId) -> Result<Value, IrError> {
        if self.module.types.size_of(ty).is_none() {
            return Err(IrError::type_mismatch(format!(
                "cannot allocate unsized type {}",
                self.module.types.display(ty)
            )));
        }
        let ptr_ty = self.module.types.ptr_to(ty);
        self.emit_value(InstKind::Alloca { ty }, ptr_ty)
    }

    /// Load a scalar; aggregates are reached field by field through `gep`
    pub fn load(&mut self, ty: TypeId, ptr: Value) -> Result<Value, IrError> {
        if !self.module.types.is_scalar(ty) || self.module.types.pointee(ptr.ty()) != Some(ty) {
            return Err(IrError::type_mismatch(format!(
                "load of {} through {}",
                self.module.types.display(ty),
                self.module.types.display(ptr.ty())
            )));
        }
        self.emit_value(InstKind::Load { ty, ptr }, ty)
    }

    pub fn store(&mut self, value: Value, ptr: Value) -> Result<(), IrError> {
        let types = &self.module.types;
        if !types.is_scalar(value.ty()) || types.pointee(ptr.ty()) != Some(value.ty()) {
            return Err(IrError::type_mismatch(format!(
                "store of {} through {}",
                types.display(value.ty()),
                types.display(ptr.ty())
            )));
        }
        self.emit(InstKind::Store { value, ptr }, None).map(|_| ())
    }

    // === Address computation ===

    pub fn gep(&mut self, base_ty: TypeId, ptr: Value, indices: &[Value]) -> Result<Value, IrError> {
        self.build_gep(base_ty, ptr, indices, false)
    }

    pub fn inbounds_gep(
        &mut self,
        base_ty: TypeId,
        ptr: Value,
        indices: &[Value],
    ) -> Result<Value, IrError> {
        self.build_gep(base_ty, ptr, indices, true)
    }

    /// Address of field `field` of the struct `ptr` points at
    pub fn struct_gep(&mut self, struct_ty: TypeId, ptr: Value, field: u32) -> Result<Value, IrError> {
        let i32_ty = self.module.types.int(32)?;
        let indices = [
            self.module.const_int(i32_ty, 0)?,
            self.module.const_int(i32_ty, field as i64)?,
        ];
        self.build_gep(struct_ty, ptr, &indices, true)
    }

    fn build_gep(
        &mut self,
        base_ty: TypeId,
        ptr: Value,
        indices: &[Value],
        inbounds: bool,
    ) -> Result<Value, IrError> {
        let path = gep::resolve(&self.module.types, base_ty, ptr.ty(), indices)?;
        let result_ty = self.module.types.ptr_to(path.target);
        self.emit_value(
            InstKind::GetElementPtr {
                base_ty,
                ptr,
                indices: indices.to_vec(),
                inbounds,
            },
            result_ty,
        )
    }

    // === Calls ===

    pub fn call(&mut self, callee: FunctionId, args: &[Value]) -> Result<Option<Value>, IrError> {
        self.build_call(callee, args, false)
    }

    /// Call marked with the tail-call hint. The hint is advisory: a consumer
    /// may ignore it or reject it when the call is not in tail position.
    pub fn tail_call(&mut self, callee: FunctionId, args: &[Value]) -> Result<Option<Value>, IrError> {
        self.build_call(callee, args, true)
    }

    fn build_call(
        &mut self,
        callee: FunctionId,
        args: &[Value],
        tail: bool,
    ) -> Result<Option<Value>, IrError> {
        let target = self.module.function(callee)?;
        let signature = target.signature.clone();
        if signature.arity() != args.len() {
            return Err(IrError::SignatureArityMismatch {
                function: target.name.clone(),
                expected: signature.arity(),
                found: args.len(),
            });
        }
        for (i, (arg, &param)) in args.iter().zip(&signature.params).enumerate() {
            if arg.ty() != param {
                return Err(IrError::type_mismatch(format!(
                    "argument {i} of call to '{}' is {}, expected {}",
                    target.name,
                    self.module.types.display(arg.ty()),
                    self.module.types.display(param)
                )));
            }
        }

        let result_ty = (!self.module.types.is_void(signature.ret)).then_some(signature.ret);
        let kind = InstKind::Call {
            callee,
            args: args.to_vec(),
            tail,
        };
        let (func, id) = self.emit(kind, result_ty)?;
        Ok(result_ty.map(|ty| Value::Inst { func, id, ty }))
    }

    // === Terminators ===

    pub fn br(&mut self, target: BlockRef) -> Result<(), IrError> {
        let target = self.branch_target(target)?;
        self.emit(InstKind::Branch { target }, None).map(|_| ())
    }

    pub fn cond_br(&mut self, cond: Value, then_block: BlockRef, else_block: BlockRef) -> Result<(), IrError> {
        if self.module.types.int_width(cond.ty()) != Some(1) {
            return Err(IrError::type_mismatch(format!(
                "branch condition must be i1, got {}",
                self.module.types.display(cond.ty())
            )));
        }
        let then_block = self.branch_target(then_block)?;
        let else_block = self.branch_target(else_block)?;
        self.emit(InstKind::CondBranch { cond, then_block, else_block }, None)
            .map(|_| ())
    }

    pub fn ret(&mut self, value: Value) -> Result<(), IrError> {
        let ret_ty = self.current_signature_ret()?;
        if self.module.types.is_void(ret_ty) || value.ty() != ret_ty {
            return Err(IrError::type_mismatch(format!(
                "returning {} from function returning {}",
                self.module.types.display(value.ty()),
                self.module.types.display(ret_ty)
            )));
        }
        self.emit(InstKind::Return { value: Some(value) }, None).map(|_| ())
    }

    pub fn ret_void(&mut self) -> Result<(), IrError> {
        let ret_ty = self.current_signature_ret()?;
        if !self.module.types.is_void(ret_ty) {
            return Err(IrError::type_mismatch(format!(
                "ret void in function returning {}",
                self.module.types.display(ret_ty)
            )));
        }
        self.emit(InstKind::Return { value: None }, None).map(|_| ())
    }

    /// Mark emission of `func` complete. Every block must be terminated.
    pub fn seal(&mut self, func: FunctionId) -> Result<(), IrError> {
        let function = self.module.function_mut(func)?;
        if let Some(open) = function.blocks.iter().find(|b| !b.has_terminator()) {
            return Err(IrError::MissingTerminator {
                function: function.name.clone(),
                block: open.label.clone(),
            });
        }
        function.sealed = true;
        debug!(
            "Sealed function '{}' with {} block(s)",
            function.name,
            function.blocks.len()
        );
        if self.cursor.is_some_and(|c| c.function == func) {
            self.cursor = None;
        }
        Ok(())
    }

    // === Internals ===

    /// The cursor, provided it points at a block that can take instructions
    fn insertion_cursor(&self) -> Result<Cursor, IrError> {
        let cursor = self.cursor.ok_or(IrError::NoInsertionPoint)?;
        let function = self.module.function(cursor.function)?;
        if function.sealed {
            return Err(IrError::FunctionSealed {
                function: function.name.clone(),
            });
        }
        let block = function
            .get_block(cursor.block)
            .ok_or_else(|| IrError::UnknownBlock {
                function: function.name.clone(),
                block: cursor.block.0,
            })?;
        if block.has_terminator() {
            return Err(IrError::BlockAlreadyTerminated {
                function: function.name.clone(),
                block: block.label.clone(),
            });
        }
        Ok(cursor)
    }

    fn current_signature_ret(&self) -> Result<TypeId, IrError> {
        let cursor = self.cursor.ok_or(IrError::NoInsertionPoint)?;
        Ok(self.module.function(cursor.function)?.signature.ret)
    }

    fn branch_target(&self, target: BlockRef) -> Result<BlockId, IrError> {
        let cursor = self.cursor.ok_or(IrError::NoInsertionPoint)?;
        let function = self.module.function(cursor.function)?;
        if target.function != cursor.function || function.get_block(target.block).is_none() {
            return Err(IrError::UnknownBlock {
                function: function.name.clone(),
                block: target.block.0,
            });
        }
        Ok(target.block)
    }

    /// Operands must be constants or values already defined in the function
    /// being built
    fn check_operand(&self, cursor: &Cursor, value: Value) -> Result<(), IrError> {
        let function = self.module.function(cursor.function)?;
        let in_scope = match value {
            Value::Const { ty, .. } => self.module.types.try_get(ty).is_some(),
            Value::Param { func, index, ty } => {
                func == cursor.function
                    && function.signature.params.get(index as usize) == Some(&ty)
            }
            Value::Inst { func, id, .. } => func == cursor.function && function.defines(id),
        };
        if in_scope {
            Ok(())
        } else {
            Err(IrError::ValueOutOfScope {
                function: function.name.clone(),
                value: value.to_string(),
            })
        }
    }

    fn emit(&mut self, kind: InstKind, result_ty: Option<TypeId>) -> Result<(FunctionId, InstId), IrError> {
        let cursor = self.insertion_cursor()?;
        for operand in kind.operands() {
            self.check_operand(&cursor, operand)?;
        }

        let function = self.module.function_mut(cursor.function)?;
        let id = function.next_inst_id();
        trace!(
            "{}:{} emit %{id} = {:?} at {}",
            function.name,
            cursor.block,
            kind,
            cursor.insertion_point
        );
        let name = function.name.clone();
        let block = function
            .get_block_mut(cursor.block)
            .ok_or(IrError::UnknownBlock {
                function: name,
                block: cursor.block.0,
            })?;
        block.insert_instruction(cursor.insertion_point, Instruction { id, kind, result_ty });

        if let Some(c) = self.cursor.as_mut() {
            c.insertion_point += 1;
        }
        Ok((cursor.function, id))
    }

    fn emit_value(&mut self, kind: InstKind, ty: TypeId) -> Result<Value, IrError> {
        let (func, id) = self.emit(kind, Some(ty))?;
        Ok(Value::Inst { func, id, ty })
    }

    fn operand_mismatch(&self, op: &str, lhs: Value, rhs: Value) -> IrError {
        IrError::type_mismatch(format!(
            "{op} operands {} and {}",
            self.module.types.display(lhs.ty()),
            self.module.types.display(rhs.ty())
        ))
    }
}
