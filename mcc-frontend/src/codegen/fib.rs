//! Recursive Fibonacci
//!
//! ```c
//! int fib(int x) {
//!     if (x <= 2) return 1;
//!     return fib(x - 1) + fib(x - 2);
//! }
//! ```
//!
//! The base case yields `fib(0) == fib(1) == fib(2) == 1`. Both recursive
//! calls carry the tail-call hint even though their results feed an `add`.

use mcc_common::{FunctionId, IrError};
use crate::ir::{IntPredicate, IrBuilder, Linkage, Module, Signature};

pub fn create_fib_fn(module: &mut Module, name: &str, bits: u32) -> Result<FunctionId, IrError> {
    let int_ty = module.types.int(bits)?;
    let func = module.declare_function(name, Signature::new(vec![int_ty], int_ty))?;
    // fib is the one demo function whose linkage is set explicitly
    module.function_mut(func)?.linkage = Linkage::External;

    let one = module.const_int(int_ty, 1)?;
    let two = module.const_int(int_ty, 2)?;
    let x = module.param(func, 0)?;

    let mut builder = IrBuilder::new(module);
    let entry = builder.create_block(func, "entry")?;
    let ret = builder.create_block(func, "ret")?;
    let recur = builder.create_block(func, "recur")?;

    // if (x <= 2) goto ret else goto recur
    builder.position_at_end(entry)?;
    let le_two = builder.icmp(IntPredicate::Sle, x, two)?;
    builder.cond_br(le_two, ret, recur)?;

    // return 1
    builder.position_at_end(ret)?;
    builder.ret(one)?;

    // return fib(x - 1) + fib(x - 2)
    builder.position_at_end(recur)?;
    let x_min_1 = builder.sub(x, one)?;
    let fib_x_min_1 = builder.tail_call(func, &[x_min_1])?;
    let x_min_2 = builder.sub(x, two)?;
    let fib_x_min_2 = builder.tail_call(func, &[x_min_2])?;
    let (Some(lhs), Some(rhs)) = (fib_x_min_1, fib_x_min_2) else {
        return Err(IrError::type_mismatch(format!("'{name}' must return a value")));
    };
    let sum = builder.add(lhs, rhs)?;
    builder.ret(sum)?;

    builder.seal(func)?;
    Ok(func)
}
