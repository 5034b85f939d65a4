//! Address computation through pointers and structs
//!
//! ```c
//! int get_snd_int(int *p) { return p[1]; }
//!
//! struct munger_struct { int f1; int f2; };
//! void munge(struct munger_struct *P) { P[0].f1 = P[1].f1 + P[2].f2; }
//! ```

use mcc_common::{FunctionId, IrError, TypeId};
use crate::ir::{IrBuilder, Module, Signature};

/// `{ iN, iN }`, the layout of `struct munger_struct`
pub fn munger_struct_type(module: &mut Module, bits: u32) -> Result<TypeId, IrError> {
    let int_ty = module.types.int(bits)?;
    Ok(module.types.struct_of(vec![int_ty, int_ty]))
}

/// Single pointer step: `p + 1` over whole ints, then load
pub fn create_get_snd_int_fn(module: &mut Module, name: &str, bits: u32) -> Result<FunctionId, IrError> {
    let i64_ty = module.types.int(64)?;
    let int_ty = module.types.int(bits)?;
    let int_ptr_ty = module.types.ptr_to(int_ty);
    let func = module.declare_function(name, Signature::new(vec![int_ptr_ty], int_ty))?;

    let one = module.const_int(i64_ty, 1)?;
    let p = module.param(func, 0)?;

    let mut builder = IrBuilder::new(module);
    let entry = builder.create_block(func, "entry")?;

    builder.position_at_end(entry)?;
    let snd_addr = builder.inbounds_gep(int_ty, p, &[one])?;
    let snd = builder.load(int_ty, snd_addr)?;
    builder.ret(snd)?;

    builder.seal(func)?;
    Ok(func)
}

/// Two-level steps: `[element, field]` pairs for two loads and one store
pub fn create_munge_fn(module: &mut Module, name: &str, bits: u32) -> Result<FunctionId, IrError> {
    let i32_ty = module.types.int(32)?;
    let int_ty = module.types.int(bits)?;
    let munger_ty = munger_struct_type(module, bits)?;
    let munger_ptr_ty = module.types.ptr_to(munger_ty);
    let void = module.types.void();
    let func = module.declare_function(name, Signature::new(vec![munger_ptr_ty], void))?;

    let zero = module.const_int(i32_ty, 0)?;
    let one = module.const_int(i32_ty, 1)?;
    let two = module.const_int(i32_ty, 2)?;
    let p = module.param(func, 0)?;

    let mut builder = IrBuilder::new(module);
    let entry = builder.create_block(func, "entry")?;
    builder.position_at_end(entry)?;

    // P[1].f1
    let elem_1_f1_addr = builder.gep(munger_ty, p, &[one, zero])?;
    let elem_1_f1 = builder.load(int_ty, elem_1_f1_addr)?;

    // P[2].f2
    let elem_2_f2_addr = builder.gep(munger_ty, p, &[two, one])?;
    let elem_2_f2 = builder.load(int_ty, elem_2_f2_addr)?;

    let tmp = builder.add(elem_1_f1, elem_2_f2)?;

    // P[0].f1 = ...
    let elem_0_f1_addr = builder.gep(munger_ty, p, &[zero, zero])?;
    builder.store(tmp, elem_0_f1_addr)?;

    builder.ret_void()?;

    builder.seal(func)?;
    Ok(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InstKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_snd_int_uses_inbounds_gep() {
        let mut module = Module::new("test");
        let func = create_get_snd_int_fn(&mut module, "get_snd_int", 32).unwrap();
        let entry = &module.function(func).unwrap().blocks[0];

        match &entry.instructions[0].kind {
            InstKind::GetElementPtr { indices, inbounds, .. } => {
                assert!(*inbounds);
                assert_eq!(indices.len(), 1);
                assert_eq!(indices[0].const_bits(), Some(1));
            }
            other => panic!("expected GEP, got {other:?}"),
        }
    }

    #[test]
    fn test_munge_gep_chains() {
        let mut module = Module::new("test");
        let func = create_munge_fn(&mut module, "munge", 32).unwrap();
        let entry = &module.function(func).unwrap().blocks[0];

        let chains: Vec<Vec<u64>> = entry
            .instructions
            .iter()
            .filter_map(|i| match &i.kind {
                InstKind::GetElementPtr { indices, .. } => {
                    Some(indices.iter().filter_map(|v| v.const_bits()).collect())
                }
                _ => None,
            })
            .collect();
        assert_eq!(chains, vec![vec![1, 0], vec![2, 1], vec![0, 0]]);
        assert_eq!(entry.len(), 8);
    }

    #[test]
    fn test_munger_struct_is_interned() {
        let mut module = Module::new("test");
        let a = munger_struct_type(&mut module, 32).unwrap();
        let b = munger_struct_type(&mut module, 32).unwrap();
        assert_eq!(a, b);
        assert_eq!(module.types.size_of(a), Some(8));
    }
}
