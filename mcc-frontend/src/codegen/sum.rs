//! `int sum(int x, int y) { return x + y; }`

use mcc_common::{FunctionId, IrError};
use crate::ir::{IrBuilder, Module, Signature};

/// One block, no control flow: add the parameters and return the result
pub fn create_int_sum_fn(module: &mut Module, name: &str, bits: u32) -> Result<FunctionId, IrError> {
    let int_ty = module.types.int(bits)?;
    let func = module.declare_function(name, Signature::new(vec![int_ty, int_ty], int_ty))?;
    let x = module.param(func, 0)?;
    let y = module.param(func, 1)?;

    let mut builder = IrBuilder::new(module);
    let entry = builder.create_block(func, "entry")?;

    builder.position_at_end(entry)?;
    let tmp = builder.add(x, y)?;
    builder.ret(tmp)?;

    builder.seal(func)?;
    Ok(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InstKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sum_shape() {
        let mut module = Module::new("test");
        let func = create_int_sum_fn(&mut module, "sum", 32).unwrap();
        let function = module.function(func).unwrap();

        assert_eq!(function.signature.arity(), 2);
        assert_eq!(function.blocks.len(), 1);
        let entry = &function.blocks[0];
        assert_eq!(entry.label, "entry");
        assert!(matches!(entry.instructions[0].kind, InstKind::Binary { .. }));
        assert!(matches!(entry.instructions[1].kind, InstKind::Return { value: Some(_) }));
    }

    #[test]
    fn test_sum_at_other_widths() {
        let mut module = Module::new("test");
        create_int_sum_fn(&mut module, "sum8", 8).unwrap();
        create_int_sum_fn(&mut module, "sum64", 64).unwrap();

        let sum8 = module.get_function("sum8").unwrap();
        assert_eq!(module.types.int_width(sum8.signature.ret), Some(8));
        let sum64 = module.get_function("sum64").unwrap();
        assert_eq!(module.types.int_width(sum64.signature.ret), Some(64));
    }
}
