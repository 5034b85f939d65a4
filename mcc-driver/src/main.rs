//! Minimal C-like Compiler Driver
//!
//! Builds `my_module` with every demo function, verifies it, runs each
//! function on the execution engine and prints the results. Afterwards the
//! module is written out as bitcode and dumped as text to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use mcc_backend::{EngineOptions, ExecutionEngine, IrConsumer, ReferenceBackend, RtValue};
use mcc_common::IrError;
use mcc_frontend::codegen::{munger_struct_type, LOOP_INDEX_BITS};
use mcc_frontend::{build_demo_module, CodegenOptions, LoopBound, Module, Signature};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mcc")]
#[command(about = "Minimal C-like compiler: builds and runs the demo module")]
#[command(version = "0.1.0")]
struct Cli {
    /// Integer width of sum, fib, get_snd_int and munge
    #[arg(long, default_value_t = 32, value_name = "N")]
    bits: u32,

    /// Stop the loop at `i < length` instead of `i <= length`
    #[arg(long)]
    exclusive_loop_bound: bool,

    /// Where to write the bitcode artifact
    #[arg(long, default_value = "main.bc", value_name = "PATH")]
    bitcode: PathBuf,

    /// Skip writing bitcode
    #[arg(long)]
    no_bitcode: bool,

    /// Print the module text to stdout before running anything
    #[arg(long)]
    print_ir: bool,

    /// Save the module as JSON
    #[arg(long, value_name = "PATH")]
    emit_json: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn codegen_options(&self) -> CodegenOptions {
        CodegenOptions {
            int_bits: self.bits,
            loop_bound: if self.exclusive_loop_bound {
                LoopBound::Exclusive
            } else {
                LoopBound::Inclusive
            },
        }
    }
}

/// Signatures the host binds the demo functions with
struct DemoSignatures {
    sum: Signature,
    fib: Signature,
    array_loop: Signature,
    get_snd_int: Signature,
    munge: Signature,
}

impl DemoSignatures {
    fn new(module: &mut Module, bits: u32) -> Result<Self, IrError> {
        let int_ty = module.types.int(bits)?;
        let int_ptr = module.types.ptr_to(int_ty);
        let index_ty = module.types.int(LOOP_INDEX_BITS)?;
        let dbl_ptr = {
            let dbl = module.types.f64();
            module.types.ptr_to(dbl)
        };
        let void = module.types.void();
        let munger = munger_struct_type(module, bits)?;
        let munger_ptr = module.types.ptr_to(munger);

        Ok(Self {
            sum: Signature::new(vec![int_ty, int_ty], int_ty),
            fib: Signature::new(vec![int_ty], int_ty),
            array_loop: Signature::new(vec![dbl_ptr, dbl_ptr, dbl_ptr, index_ty], void),
            get_snd_int: Signature::new(vec![int_ptr], int_ty),
            munge: Signature::new(vec![munger_ptr], void),
        })
    }
}

/// Where the host puts integers and munger structs it hands to the demo
/// functions, read off the module's own layout
struct IntLayout {
    bits: u32,
    int_size: u64,
    munger_size: u64,
    f2_offset: u64,
}

impl IntLayout {
    fn of(module: &Module, sigs: &DemoSignatures) -> Result<Self> {
        let types = &module.types;
        let int_ty = sigs.get_snd_int.ret;
        let munger = sigs
            .munge
            .params
            .first()
            .and_then(|&p| types.pointee(p))
            .context("munge does not take a struct pointer")?;

        Ok(Self {
            bits: types.int_width(int_ty).context("get_snd_int does not return an integer")?,
            int_size: types.size_of(int_ty).context("integer type has no size")?,
            munger_size: types.size_of(munger).context("munger struct has no size")?,
            f2_offset: types.field_offset(munger, 1).context("munger struct has no second field")?,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::init();
    }

    let options = cli.codegen_options();
    let mut module = build_demo_module(&options).context("Failed to build module")?;
    let signatures = DemoSignatures::new(&mut module, options.int_bits)?;

    if cli.print_ir {
        println!("{}", module.display());
    }
    if let Some(path) = &cli.emit_json {
        let json = serde_json::to_string_pretty(&module)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Module saved as JSON to {}", path.display());
    }

    let backend = ReferenceBackend::new(EngineOptions::default());
    let mut engine = backend.engine(&module).context("Failed to create execution engine")?;
    print!("{}", run_demo(&mut engine, &signatures, options.loop_bound)?);

    if !cli.no_bitcode {
        let written = backend
            .serialize(&module)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| fs::write(&cli.bitcode, bytes).map_err(anyhow::Error::from));
        match written {
            Ok(()) => debug!("Bitcode written to {}", cli.bitcode.display()),
            Err(e) => {
                debug!("Bitcode write failed: {e}");
                eprintln!("Failed to write bitcode to file, skipping...");
            }
        }
    }

    eprintln!("\n--- Module ---");
    eprint!("{}", module.display());
    eprintln!("--------------");

    Ok(())
}

/// Run every demo function and render the results section by section
fn run_demo(engine: &mut ExecutionEngine<'_>, sigs: &DemoSignatures, loop_bound: LoopBound) -> Result<String> {
    let mut out = String::new();

    let sum = engine.get_function("sum", &sigs.sum)?;
    let fib = engine.get_function("fib", &sigs.fib)?;
    let array_loop = engine.get_function("loop", &sigs.array_loop)?;
    let get_snd_int = engine.get_function("get_snd_int", &sigs.get_snd_int)?;
    let munge = engine.get_function("munge", &sigs.munge)?;

    // Run loop test
    let num_elems = 5;
    // The inclusive bound also visits index `num_elems`
    let capacity = match loop_bound {
        LoopBound::Inclusive => num_elems + 1,
        LoopBound::Exclusive => num_elems,
    };
    let xs: Vec<f64> = (0..capacity).map(|i| i as f64).collect();
    let ys: Vec<f64> = (0..capacity).map(|i| (i * 10) as f64).collect();
    let x = engine.alloc_f64s(&xs)?;
    let y = engine.alloc_f64s(&ys)?;
    let result = engine.alloc_f64s(&vec![0.0; capacity])?;
    engine.call(
        array_loop,
        &[
            RtValue::Ptr(result),
            RtValue::Ptr(x),
            RtValue::Ptr(y),
            RtValue::Int(num_elems as i64),
        ],
    )?;

    writeln!(out, "\n--- testing sum fn ---")?;
    for (a, b) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        let value = engine.call(sum, &[RtValue::Int(a), RtValue::Int(b)])?;
        writeln!(out, "\tsum {a} {b}: {}", show(value))?;
    }
    writeln!(out, "----------------------")?;

    writeln!(out, "\n--- testing fib fn ---")?;
    for n in [0, 1, 10] {
        let value = engine.call(fib, &[RtValue::Int(n)])?;
        writeln!(out, "\t{:<9}{}", format!("fib {n}:"), show(value))?;
    }
    writeln!(out, "----------------------")?;

    writeln!(out, "\n--- testing loop fn ---")?;
    writeln!(out, "{}", format_array("x[]", &engine.read_f64s(x, num_elems)?))?;
    writeln!(out, "{}", format_array("y[]", &engine.read_f64s(y, num_elems)?))?;
    writeln!(out, "{}", format_array("result[]", &engine.read_f64s(result, num_elems)?))?;
    writeln!(out, "----------------------")?;

    writeln!(out, "\n--- testing get_snd_int fn ---")?;
    let layout = IntLayout::of(engine.module(), sigs)?;
    let ints = engine.alloc_bytes(3 * layout.int_size)?;
    for (i, v) in [10, 20, 30].into_iter().enumerate() {
        engine.write_int(ints + i as u64 * layout.int_size, layout.bits, v)?;
    }
    let value = engine.call(get_snd_int, &[RtValue::Ptr(ints)])?;
    writeln!(out, "\tget_snd_int [10, 20, 30]: {}", show(value))?;
    writeln!(out, "----------------------")?;

    writeln!(out, "\n--- testing munge fn ---")?;
    let mungers = [(0, 0), (1, 2), (3, 4)];
    let p = engine.alloc_bytes(mungers.len() as u64 * layout.munger_size)?;
    for (i, (f1, f2)) in mungers.into_iter().enumerate() {
        let base = p + i as u64 * layout.munger_size;
        engine.write_int(base, layout.bits, f1)?;
        engine.write_int(base + layout.f2_offset, layout.bits, f2)?;
    }
    writeln!(out, "{}", format_mungers("before", engine, &layout, p, mungers.len())?)?;
    engine.call(munge, &[RtValue::Ptr(p)])?;
    writeln!(out, "{}", format_mungers("after", engine, &layout, p, mungers.len())?)?;
    writeln!(out, "----------------------")?;

    Ok(out)
}

fn show(value: Option<RtValue>) -> String {
    match value {
        Some(RtValue::Int(v)) => v.to_string(),
        Some(RtValue::F64(v)) => format!("{v:.6}"),
        Some(RtValue::Ptr(addr)) => format!("{addr:#x}"),
        None => "void".to_string(),
    }
}

/// `name: [a, b, ...]` with six decimals per element
fn format_array(name: &str, values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
    format!("{name}: [{}]", items.join(", "))
}

fn format_mungers(
    name: &str,
    engine: &ExecutionEngine<'_>,
    layout: &IntLayout,
    p: u64,
    count: usize,
) -> Result<String> {
    let mut items = Vec::with_capacity(count);
    for i in 0..count as u64 {
        let base = p + i * layout.munger_size;
        let f1 = engine.read_int(base, layout.bits)?;
        let f2 = engine.read_int(base + layout.f2_offset, layout.bits)?;
        items.push(format!("{{{f1}, {f2}}}"));
    }
    Ok(format!("\t{name}: [{}]", items.join(", ")))
}
