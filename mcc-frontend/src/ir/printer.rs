//! Textual IR listing
//!
//! Renders a module in an LLVM-like syntax. Printing needs the module's
//! type registry and function table, so it goes through `ModuleDisplay`
//! rather than a plain `Display` impl on the IR nodes.

use std::fmt;
use crate::ir::ops::sign_extend;
use crate::ir::{Function, InstKind, Instruction, IrType, Linkage, Module, Value};

/// Display adapter for a whole module
pub struct ModuleDisplay<'a> {
    module: &'a Module,
}

/// Display adapter for a single function
pub struct FunctionDisplay<'a> {
    module: &'a Module,
    function: &'a Function,
}

impl Module {
    pub fn display(&self) -> ModuleDisplay<'_> {
        ModuleDisplay { module: self }
    }
}

impl Function {
    pub fn display<'a>(&'a self, module: &'a Module) -> FunctionDisplay<'a> {
        FunctionDisplay { module, function: self }
    }
}

impl fmt::Display for ModuleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.module.name)?;
        for function in &self.module.functions {
            writeln!(f)?;
            write!(f, "{}", function.display(self.module))?;
        }
        Ok(())
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.module;
        let function = self.function;
        let types = &module.types;

        let keyword = if function.is_declaration() { "declare" } else { "define" };
        let linkage = match function.linkage {
            Linkage::External => "",
            Linkage::Internal => "internal ",
        };
        write!(
            f,
            "{keyword} {linkage}{} @{}(",
            types.display(function.signature.ret),
            function.name
        )?;
        for (i, &param) in function.signature.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %arg{i}", types.display(param))?;
        }
        write!(f, ")")?;

        if function.is_declaration() {
            return writeln!(f);
        }

        writeln!(f, " {{")?;
        for (i, block) in function.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.label)?;
            for instr in &block.instructions {
                write!(f, "  ")?;
                write_instruction(f, module, function, instr)?;
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }
}

fn write_instruction(
    f: &mut fmt::Formatter<'_>,
    module: &Module,
    function: &Function,
    instr: &Instruction,
) -> fmt::Result {
    let types = &module.types;
    if instr.result_ty.is_some() {
        write!(f, "%{} = ", instr.id)?;
    }

    let label = |block: &mcc_common::BlockId| {
        function
            .get_block(*block)
            .map(|b| b.label.clone())
            .unwrap_or_else(|| block.to_string())
    };

    match &instr.kind {
        InstKind::Binary { op, ty, lhs, rhs } => {
            write!(f, "{op} {} {}, {}", types.display(*ty), operand(module, lhs), operand(module, rhs))
        }
        InstKind::ICmp { pred, lhs, rhs } => write!(
            f,
            "icmp {pred} {} {}, {}",
            types.display(lhs.ty()),
            operand(module, lhs),
            operand(module, rhs)
        ),
        InstKind::Load { ty, ptr } => write!(
            f,
            "load {}, {}",
            types.display(*ty),
            typed_operand(module, ptr)
        ),
        InstKind::Store { value, ptr } => write!(
            f,
            "store {}, {}",
            typed_operand(module, value),
            typed_operand(module, ptr)
        ),
        InstKind::Alloca { ty } => write!(f, "alloca {}", types.display(*ty)),
        InstKind::GetElementPtr { base_ty, ptr, indices, inbounds } => {
            let inbounds = if *inbounds { "inbounds " } else { "" };
            write!(
                f,
                "getelementptr {inbounds}{}, {}",
                types.display(*base_ty),
                typed_operand(module, ptr)
            )?;
            for index in indices {
                write!(f, ", {}", typed_operand(module, index))?;
            }
            Ok(())
        }
        InstKind::Call { callee, args, tail } => {
            let (name, ret) = module
                .function(*callee)
                .map(|c| (c.name.clone(), types.display(c.signature.ret)))
                .unwrap_or_else(|_| (callee.to_string(), "?".to_string()));
            if *tail {
                write!(f, "tail ")?;
            }
            write!(f, "call {ret} @{name}(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", typed_operand(module, arg))?;
            }
            write!(f, ")")
        }
        InstKind::Branch { target } => write!(f, "br label %{}", label(target)),
        InstKind::CondBranch { cond, then_block, else_block } => write!(
            f,
            "br {}, label %{}, label %{}",
            typed_operand(module, cond),
            label(then_block),
            label(else_block)
        ),
        InstKind::Return { value: Some(value) } => write!(f, "ret {}", typed_operand(module, value)),
        InstKind::Return { value: None } => write!(f, "ret void"),
    }
}

fn typed_operand(module: &Module, value: &Value) -> String {
    format!("{} {}", module.types.display(value.ty()), operand(module, value))
}

fn operand(module: &Module, value: &Value) -> String {
    match value {
        Value::Const { ty, bits } => match module.types.try_get(*ty) {
            Some(IrType::Int(1)) => (if *bits & 1 == 1 { "true" } else { "false" }).to_string(),
            Some(IrType::Int(width)) => sign_extend(*bits, *width).to_string(),
            Some(IrType::F64) => format!("{:?}", f64::from_bits(*bits)),
            Some(IrType::Ptr(_)) if *bits == 0 => "null".to_string(),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    }
}
