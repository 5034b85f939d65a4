//! Elementwise multiply loop
//!
//! ```c
//! void loop(double *result, double *x, double *y, size_t length) {
//!     for (size_t i = 0; i < length; i++)
//!         result[i] = x[i] * y[i];
//! }
//! ```
//!
//! The counter lives in a stack slot and is reloaded in every block that
//! reads it. With `LoopBound::Inclusive` the exit test is `i <= length`, so
//! the body also runs for `i == length`.

use log::debug;
use mcc_common::{FunctionId, IrError};
use crate::codegen::LoopBound;
use crate::ir::{IntPredicate, IrBuilder, Module, Signature};

pub fn create_loop_fn(
    module: &mut Module,
    name: &str,
    bits: u32,
    bound: LoopBound,
) -> Result<FunctionId, IrError> {
    let index_ty = module.types.int(bits)?;
    let dbl_ty = module.types.f64();
    let dbl_ptr_ty = module.types.ptr_to(dbl_ty);
    let void = module.types.void();

    let signature = Signature::new(vec![dbl_ptr_ty, dbl_ptr_ty, dbl_ptr_ty, index_ty], void);
    let func = module.declare_function(name, signature)?;

    let zero = module.const_int(index_ty, 0)?;
    let one = module.const_int(index_ty, 1)?;

    let result = module.param(func, 0)?;
    let x = module.param(func, 1)?;
    let y = module.param(func, 2)?;
    let length = module.param(func, 3)?;

    let mut builder = IrBuilder::new(module);
    let entry = builder.create_block(func, "entry")?;
    let cond = builder.create_block(func, "cond")?;
    let body = builder.create_block(func, "body")?;
    let inc = builder.create_block(func, "inc")?;
    let end = builder.create_block(func, "end")?;

    // i = 0
    builder.position_at_end(entry)?;
    let i_addr = builder.alloca(index_ty)?;
    builder.store(zero, i_addr)?;
    builder.br(cond)?;

    // i <= length / i < length
    builder.position_at_end(cond)?;
    let i = builder.load(index_ty, i_addr)?;
    let pred = match bound {
        LoopBound::Inclusive => IntPredicate::Sle,
        LoopBound::Exclusive => IntPredicate::Slt,
    };
    let keep_going = builder.icmp(pred, i, length)?;
    builder.cond_br(keep_going, body, end)?;

    // result[i] = x[i] * y[i]
    builder.position_at_end(body)?;
    let i = builder.load(index_ty, i_addr)?;
    let x_addr = builder.gep(dbl_ty, x, &[i])?;
    let x_i = builder.load(dbl_ty, x_addr)?;
    let y_addr = builder.gep(dbl_ty, y, &[i])?;
    let y_i = builder.load(dbl_ty, y_addr)?;
    let product = builder.fmul(x_i, y_i)?;
    let result_addr = builder.gep(dbl_ty, result, &[i])?;
    builder.store(product, result_addr)?;
    builder.br(inc)?;

    // i++
    builder.position_at_end(inc)?;
    let i = builder.load(index_ty, i_addr)?;
    let next = builder.add(i, one)?;
    builder.store(next, i_addr)?;
    builder.br(cond)?;

    builder.position_at_end(end)?;
    builder.ret_void()?;

    builder.seal(func)?;
    debug!("Built '{name}' with {bound:?} loop bound");
    Ok(func)
}
