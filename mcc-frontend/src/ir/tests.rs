//! Unit tests for the IR module

use super::*;
use mcc_common::{ErrorKind, FunctionId, TypeId};
use pretty_assertions::assert_eq;

/// Module with `sum(i32, i32) -> i32` declared but not built
fn module_with_sum() -> (Module, FunctionId, TypeId) {
    let mut module = Module::new("test");
    let i32_ty = module.types.int(32).unwrap();
    let sum = module
        .declare_function("sum", Signature::new(vec![i32_ty, i32_ty], i32_ty))
        .unwrap();
    (module, sum, i32_ty)
}

#[test]
fn test_types_are_interned() {
    let mut types = TypeRegistry::new();
    let a = types.int(32).unwrap();
    let b = types.int(32).unwrap();
    assert_eq!(a, b);

    let s1 = types.struct_of(vec![a, a]);
    let s2 = types.struct_of(vec![b, b]);
    assert_eq!(s1, s2);
    assert_eq!(types.ptr_to(s1), types.ptr_to(s2));

    let i64_ty = types.int(64).unwrap();
    assert_ne!(a, i64_ty);
    assert_eq!(types.find(&IrType::Int(64)), Some(i64_ty));
    assert_eq!(types.find(&IrType::Int(16)), None);
}

#[test]
fn test_unsupported_bit_width() {
    let mut types = TypeRegistry::new();
    assert_eq!(types.int(0).unwrap_err().kind(), ErrorKind::UnsupportedBitWidth);
    assert_eq!(types.int(65).unwrap_err().kind(), ErrorKind::UnsupportedBitWidth);
    assert!(types.is_empty());
}

#[test]
fn test_type_display() {
    let mut types = TypeRegistry::new();
    let i32_ty = types.int(32).unwrap();
    let st = types.struct_of(vec![i32_ty, i32_ty]);
    let arr = types.array_of(st, 3);
    let st_ptr = types.ptr_to(st);
    let f64_ty = types.f64();
    let f64_ptr = types.ptr_to(f64_ty);
    let void = types.void();

    assert_eq!(types.display(st_ptr), "{ i32, i32 }*");
    assert_eq!(types.display(arr), "[3 x { i32, i32 }]");
    assert_eq!(types.display(f64_ptr), "double*");
    assert_eq!(types.display(void), "void");
}

#[test]
fn test_layout_of_munger_struct() {
    let mut types = TypeRegistry::new();
    let i32_ty = types.int(32).unwrap();
    let st = types.struct_of(vec![i32_ty, i32_ty]);
    let arr = types.array_of(st, 3);

    assert_eq!(types.size_of(st), Some(8));
    assert_eq!(types.align_of(st), Some(4));
    assert_eq!(types.field_offset(st, 0), Some(0));
    assert_eq!(types.field_offset(st, 1), Some(4));
    assert_eq!(types.field_offset(st, 2), None);
    assert_eq!(types.size_of(arr), Some(24));
}

#[test]
fn test_layout_with_padding() {
    // struct RT { char A; int B[10][20]; char C; };
    // struct ST { int X; double Y; struct RT Z; };
    let mut types = TypeRegistry::new();
    let i1_ty = types.bool();
    let i8_ty = types.int(8).unwrap();
    let i32_ty = types.int(32).unwrap();
    let f64_ty = types.f64();
    let row = types.array_of(i32_ty, 20);
    let grid = types.array_of(row, 10);
    let rt = types.struct_of(vec![i8_ty, grid, i8_ty]);
    let st = types.struct_of(vec![i32_ty, f64_ty, rt]);
    let void = types.void();

    assert_eq!(types.size_of(i1_ty), Some(1));
    assert_eq!(types.field_offset(rt, 1), Some(4));
    assert_eq!(types.field_offset(rt, 2), Some(804));
    assert_eq!(types.size_of(rt), Some(808));
    assert_eq!(types.field_offset(st, 1), Some(8));
    assert_eq!(types.field_offset(st, 2), Some(16));
    assert_eq!(types.size_of(st), Some(824));
    assert_eq!(types.size_of(void), None);
}

#[test]
fn test_const_int_is_truncated() {
    let mut module = Module::new("test");
    let i8_ty = module.types.int(8).unwrap();
    let minus_one = module.const_int(i8_ty, -1).unwrap();
    assert_eq!(minus_one.const_bits(), Some(0xff));
    assert!(minus_one.is_constant());

    let f64_ty = module.types.f64();
    let err = module.const_int(f64_ty, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_duplicate_function_rejected() {
    let (mut module, _, i32_ty) = module_with_sum();
    let err = module
        .declare_function("sum", Signature::new(vec![i32_ty], i32_ty))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateFunction);
}

#[test]
fn test_void_parameter_rejected() {
    let mut module = Module::new("test");
    let void = module.types.void();
    let err = module
        .declare_function("bad", Signature::new(vec![void], void))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_param_beyond_arity() {
    let (module, sum, _) = module_with_sum();
    assert!(module.param(sum, 1).is_ok());
    let err = module.param(sum, 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureArityMismatch);
    assert_eq!(
        err.to_string(),
        "Function 'sum' takes 2 parameter(s), 3 requested"
    );
}

#[test]
fn test_build_sum() {
    let (mut module, sum, i32_ty) = module_with_sum();
    let x = module.param(sum, 0).unwrap();
    let y = module.param(sum, 1).unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(sum, "entry").unwrap();
    builder.position_at_end(entry).unwrap();
    let tmp = builder.add(x, y).unwrap();
    assert_eq!(builder.cursor().map(|c| c.insertion_point), Some(1));
    builder.ret(tmp).unwrap();
    builder.seal(sum).unwrap();
    assert_eq!(builder.cursor(), None);

    let function = module.function(sum).unwrap();
    assert!(function.sealed);
    assert_eq!(function.blocks.len(), 1);
    let block = &function.blocks[0];
    assert_eq!(block.len(), 2);
    assert!(block.terminator().is_some());
    assert_eq!(tmp.ty(), i32_ty);
    assert_eq!(block.instructions[0].result(sum), Some(tmp));
}

#[test]
fn test_emit_after_terminator() {
    let (mut module, sum, _) = module_with_sum();
    let x = module.param(sum, 0).unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(sum, "entry").unwrap();
    builder.position_at_end(entry).unwrap();
    builder.ret(x).unwrap();

    let err = builder.add(x, x).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BlockAlreadyTerminated);
    let err = builder.ret(x).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BlockAlreadyTerminated);

    // Repositioning does not reopen the block
    builder.position_at_end(entry).unwrap();
    let err = builder.add(x, x).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BlockAlreadyTerminated);
    assert_eq!(module.function(sum).unwrap().blocks[0].len(), 1);
}

#[test]
fn test_emit_without_cursor() {
    let (mut module, sum, _) = module_with_sum();
    let x = module.param(sum, 0).unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let err = builder.add(x, x).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoInsertionPoint);
}

#[test]
fn test_operand_type_mismatch() {
    let (mut module, sum, _) = module_with_sum();
    let x = module.param(sum, 0).unwrap();
    let i64_ty = module.types.int(64).unwrap();
    let wide = module.const_int(i64_ty, 1).unwrap();
    let real = module.const_f64(2.0);

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(sum, "entry").unwrap();
    builder.position_at_end(entry).unwrap();

    assert_eq!(builder.add(x, wide).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(builder.fmul(x, x).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(builder.mul(real, real).unwrap_err().kind(), ErrorKind::TypeMismatch);
    // Condition must be i1
    assert_eq!(
        builder.cond_br(x, entry, entry).unwrap_err().kind(),
        ErrorKind::TypeMismatch
    );
    // Return type is checked against the signature
    assert_eq!(builder.ret(wide).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(builder.ret_void().unwrap_err().kind(), ErrorKind::TypeMismatch);

    // Nothing was emitted
    assert!(module.function(sum).unwrap().blocks[0].is_empty());
}

#[test]
fn test_load_store_types() {
    let mut module = Module::new("test");
    let i32_ty = module.types.int(32).unwrap();
    let i64_ty = module.types.int(64).unwrap();
    let void = module.types.void();
    let f = module
        .declare_function("slot", Signature::new(vec![], i32_ty))
        .unwrap();
    let wide = module.const_int(i64_ty, 7).unwrap();
    let seven = module.const_int(i32_ty, 7).unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(f, "entry").unwrap();
    builder.position_at_end(entry).unwrap();
    let slot = builder.alloca(i32_ty).unwrap();

    assert_eq!(builder.store(wide, slot).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(builder.load(i64_ty, slot).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(builder.alloca(void).unwrap_err().kind(), ErrorKind::TypeMismatch);
    // Loading through a non-pointer
    assert_eq!(builder.load(i32_ty, seven).unwrap_err().kind(), ErrorKind::TypeMismatch);

    builder.store(seven, slot).unwrap();
    let value = builder.load(i32_ty, slot).unwrap();
    builder.ret(value).unwrap();
    builder.seal(f).unwrap();
}

#[test]
fn test_value_from_other_function_out_of_scope() {
    let (mut module, sum, i32_ty) = module_with_sum();
    let other = module
        .declare_function("other", Signature::new(vec![i32_ty], i32_ty))
        .unwrap();
    let foreign = module.param(other, 0).unwrap();
    let x = module.param(sum, 0).unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(sum, "entry").unwrap();
    builder.position_at_end(entry).unwrap();

    let err = builder.add(x, foreign).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueOutOfScope);
}

#[test]
fn test_call_checks() {
    let (mut module, sum, i32_ty) = module_with_sum();
    let one = module.const_int(i32_ty, 1).unwrap();
    let i64_ty = module.types.int(64).unwrap();
    let wide = module.const_int(i64_ty, 1).unwrap();
    let caller = module
        .declare_function("caller", Signature::new(vec![], i32_ty))
        .unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(caller, "entry").unwrap();
    builder.position_at_end(entry).unwrap();

    let err = builder.call(FunctionId(42), &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownFunction);
    let err = builder.call(sum, &[one]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureArityMismatch);
    let err = builder.call(sum, &[one, wide]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let result = builder.tail_call(sum, &[one, one]).unwrap();
    let result = result.unwrap();
    assert_eq!(result.ty(), i32_ty);
    builder.ret(result).unwrap();
    builder.seal(caller).unwrap();

    let call = &module.function(caller).unwrap().blocks[0].instructions[0];
    assert!(matches!(call.kind, InstKind::Call { tail: true, .. }));
}

#[test]
fn test_call_to_void_function_has_no_result() {
    let mut module = Module::new("test");
    let void = module.types.void();
    let callee = module
        .declare_function("nothing", Signature::new(vec![], void))
        .unwrap();
    let caller = module
        .declare_function("caller", Signature::new(vec![], void))
        .unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(caller, "entry").unwrap();
    builder.position_at_end(entry).unwrap();
    assert_eq!(builder.call(callee, &[]).unwrap(), None);
    builder.ret_void().unwrap();
    builder.seal(caller).unwrap();
}

#[test]
fn test_branch_to_block_of_other_function() {
    let (mut module, sum, i32_ty) = module_with_sum();
    let other = module
        .declare_function("other", Signature::new(vec![], i32_ty))
        .unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(sum, "entry").unwrap();
    let foreign = builder.create_block(other, "entry").unwrap();
    builder.position_at_end(entry).unwrap();

    let err = builder.br(foreign).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownBlock);
}

#[test]
fn test_seal_requires_terminators() {
    let (mut module, sum, _) = module_with_sum();
    let x = module.param(sum, 0).unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(sum, "entry").unwrap();
    let exit = builder.create_block(sum, "exit").unwrap();
    builder.position_at_end(entry).unwrap();
    builder.br(exit).unwrap();

    let err = builder.seal(sum).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingTerminator);

    builder.position_at_end(exit).unwrap();
    builder.ret(x).unwrap();
    builder.seal(sum).unwrap();

    let err = builder.create_block(sum, "late").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FunctionSealed);
    builder.position_at_end(exit).unwrap();
    let err = builder.add(x, x).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FunctionSealed);

    let function = module.function(sum).unwrap();
    assert_eq!(function.predecessors(exit.block), vec![entry.block]);
}

#[test]
fn test_struct_gep_result_type() {
    let mut module = Module::new("test");
    let i32_ty = module.types.int(32).unwrap();
    let st = module.types.struct_of(vec![i32_ty, i32_ty]);
    let st_ptr = module.types.ptr_to(st);
    let f = module
        .declare_function("second", Signature::new(vec![st_ptr], i32_ty))
        .unwrap();
    let p = module.param(f, 0).unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(f, "entry").unwrap();
    builder.position_at_end(entry).unwrap();
    let field = builder.struct_gep(st, p, 1).unwrap();
    let bad = builder.struct_gep(st, p, 2).unwrap_err();
    assert_eq!(bad.kind(), ErrorKind::TypeMismatch);
    let value = builder.load(i32_ty, field).unwrap();
    builder.ret(value).unwrap();
    builder.seal(f).unwrap();

    let i32_ptr = module.types.find(&IrType::Ptr(i32_ty));
    assert_eq!(Some(field.ty()), i32_ptr);
}

#[test]
fn test_print_sum() {
    let (mut module, sum, _) = module_with_sum();
    let x = module.param(sum, 0).unwrap();
    let y = module.param(sum, 1).unwrap();

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(sum, "entry").unwrap();
    builder.position_at_end(entry).unwrap();
    let tmp = builder.add(x, y).unwrap();
    builder.ret(tmp).unwrap();
    builder.seal(sum).unwrap();

    let expected = "; ModuleID = 'test'\n\
                    \n\
                    define i32 @sum(i32 %arg0, i32 %arg1) {\n\
                    entry:\n  \
                    %0 = add i32 %arg0, %arg1\n  \
                    ret i32 %0\n\
                    }\n";
    assert_eq!(module.display().to_string(), expected);
}

#[test]
fn test_print_declaration() {
    let mut module = Module::new("decls");
    let i32_ty = module.types.int(32).unwrap();
    let void = module.types.void();
    module
        .declare_function("ext", Signature::new(vec![i32_ty], void))
        .unwrap();

    assert_eq!(
        module.display().to_string(),
        "; ModuleID = 'decls'\n\ndeclare void @ext(i32 %arg0)\n"
    );
}

#[test]
fn test_print_internal_linkage() {
    let (mut module, sum, _) = module_with_sum();
    module.function_mut(sum).unwrap().linkage = Linkage::Internal;
    assert_eq!(
        module.display().to_string(),
        "; ModuleID = 'test'\n\ndeclare internal i32 @sum(i32 %arg0, i32 %arg1)\n"
    );
}

#[test]
fn test_oversized_types_have_no_size() {
    let mut module = Module::new("test");
    let i64_ty = module.types.int(64).unwrap();
    let huge = module.types.array_of(i64_ty, u64::MAX / 4);
    let pair = module.types.struct_of(vec![i64_ty, i64_ty]);
    let half = module.types.array_of(pair, u64::MAX / 32);
    let padded = module.types.struct_of(vec![half, i64_ty]);
    let f = module
        .declare_function("big", Signature::new(vec![], i64_ty))
        .unwrap();

    assert_eq!(module.types.size_of(huge), None);
    assert_eq!(module.types.size_of(padded), None);
    assert_eq!(module.types.field_offset(padded, 1), None);
    assert_eq!(module.types.align_of(huge), Some(8));

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(f, "entry").unwrap();
    builder.position_at_end(entry).unwrap();
    assert_eq!(builder.alloca(huge).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(builder.alloca(padded).unwrap_err().kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_aggregates_load_and_store_by_field() {
    // void copy({ i64, i64 }* dst, { i64, i64 }* src, { i64, i64 } whole) { *dst = *src; }
    let mut module = Module::new("test");
    let i64_ty = module.types.int(64).unwrap();
    let pair = module.types.struct_of(vec![i64_ty, i64_ty]);
    let pair_ptr = module.types.ptr_to(pair);
    let void = module.types.void();
    let f = module
        .declare_function("copy", Signature::new(vec![pair_ptr, pair_ptr, pair], void))
        .unwrap();
    let dst = module.param(f, 0).unwrap();
    let src = module.param(f, 1).unwrap();
    let whole = module.param(f, 2).unwrap();

    assert!(module.types.is_scalar(i64_ty));
    assert!(module.types.is_scalar(pair_ptr));
    assert!(!module.types.is_scalar(pair));
    assert!(!module.types.is_scalar(void));

    let mut builder = IrBuilder::new(&mut module);
    let entry = builder.create_block(f, "entry").unwrap();
    builder.position_at_end(entry).unwrap();

    assert_eq!(builder.load(pair, src).unwrap_err().kind(), ErrorKind::TypeMismatch);
    let slot = builder.alloca(pair).unwrap();
    assert_eq!(builder.load(pair, slot).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(builder.store(whole, dst).unwrap_err().kind(), ErrorKind::TypeMismatch);

    for field in 0..2 {
        let from = builder.struct_gep(pair, src, field).unwrap();
        let value = builder.load(i64_ty, from).unwrap();
        let to = builder.struct_gep(pair, dst, field).unwrap();
        builder.store(value, to).unwrap();
    }
    builder.ret_void().unwrap();
    builder.seal(f).unwrap();
}
