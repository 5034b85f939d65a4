//! Module
//!
//! The module owns its type registry and every function built for it.
//! Functions are only ever appended, so a `FunctionId` stays valid for the
//! module's whole lifetime and can be used as a call target.

use log::debug;
use mcc_common::{FunctionId, IrError, TypeId};
use serde::{Deserialize, Serialize};
use crate::ir::ops::truncate;
use crate::ir::{Function, IrType, Signature, TypeRegistry, Value};

/// IR Module - one construction session's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub types: TypeRegistry,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: TypeRegistry::new(),
            functions: Vec::new(),
        }
    }

    /// Declare a function and register it in the module
    pub fn declare_function(
        &mut self,
        name: &str,
        signature: Signature,
    ) -> Result<FunctionId, IrError> {
        if self.get_function(name).is_some() {
            return Err(IrError::DuplicateFunction {
                name: name.to_string(),
            });
        }
        for &param in &signature.params {
            if matches!(self.types.try_get(param), None | Some(IrType::Void)) {
                return Err(IrError::type_mismatch(format!(
                    "parameter of '{name}' has non-value type {}",
                    self.types.display(param)
                )));
            }
        }
        if self.types.try_get(signature.ret).is_none() {
            return Err(IrError::type_mismatch(format!(
                "return type of '{name}' is not registered"
            )));
        }

        let id = FunctionId(self.functions.len() as u32);
        debug!(
            "Declared function '{name}' as {id} with {} parameter(s)",
            signature.arity()
        );
        self.functions.push(Function::new(id, name.to_string(), signature));
        Ok(id)
    }

    pub fn function(&self, id: FunctionId) -> Result<&Function, IrError> {
        self.functions.get(id.index()).ok_or_else(|| IrError::UnknownFunction {
            name: id.to_string(),
        })
    }

    pub(crate) fn function_mut(&mut self, id: FunctionId) -> Result<&mut Function, IrError> {
        self.functions
            .get_mut(id.index())
            .ok_or_else(|| IrError::UnknownFunction {
                name: id.to_string(),
            })
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_id(&self, name: &str) -> Result<FunctionId, IrError> {
        self.get_function(name)
            .map(|f| f.id)
            .ok_or_else(|| IrError::UnknownFunction {
                name: name.to_string(),
            })
    }

    /// Value bound to parameter `index` of `func`
    pub fn param(&self, func: FunctionId, index: usize) -> Result<Value, IrError> {
        let function = self.function(func)?;
        let ty = function.signature.params.get(index).copied().ok_or_else(|| {
            IrError::SignatureArityMismatch {
                function: function.name.clone(),
                expected: function.signature.arity(),
                found: index + 1,
            }
        })?;
        Ok(Value::Param {
            func,
            index: index as u32,
            ty,
        })
    }

    /// Integer constant, truncated to the width of `ty`
    pub fn const_int(&self, ty: TypeId, value: i64) -> Result<Value, IrError> {
        let bits = self.types.int_width(ty).ok_or_else(|| {
            IrError::type_mismatch(format!(
                "integer constant requested for {}",
                self.types.display(ty)
            ))
        })?;
        Ok(Value::Const {
            ty,
            bits: truncate(value as u64, bits),
        })
    }

    pub fn const_f64(&mut self, value: f64) -> Value {
        Value::Const {
            ty: self.types.f64(),
            bits: value.to_bits(),
        }
    }

    pub fn const_bool(&mut self, value: bool) -> Value {
        Value::Const {
            ty: self.types.bool(),
            bits: value as u64,
        }
    }
}
