//! retrodbg - headless debugger monitor
//!
//! Loads a raw memory image, attaches the debugger to it the way an
//! emulation host would, and prints a snapshot of the disassembly,
//! registers, call stack and memory at the entry point.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::{Mutex, RwLock};
use rd_core::{Architecture, Config};
use rd_debug::memory_viewer::parse_address;
use rd_debug::DebugVisualizer;

/// Smallest RAM the image is placed into
const MIN_RAM_SIZE: usize = 0x10000;

#[derive(Parser, Debug)]
#[command(name = "retrodbg")]
#[command(about = "Headless debugger monitor - snapshot a raw memory image")]
#[command(version)]
struct Args {
    /// Raw memory image to load
    image: PathBuf,

    /// M68K, Z80, ARM, MIPS or M6502 (default from config)
    #[arg(long)]
    arch: Option<Architecture>,

    /// Load address of the image
    #[arg(long, value_parser = address_arg, default_value = "0")]
    base: u32,

    /// Entry point (default: load address)
    #[arg(long, value_parser = address_arg)]
    pc: Option<u32>,

    /// Initial stack pointer
    #[arg(long, value_parser = address_arg)]
    sp: Option<u32>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Breakpoint records to load
    #[arg(short, long)]
    breakpoints: Option<PathBuf>,

    /// Disassembly lines to print
    #[arg(short, long)]
    lines: Option<usize>,
}

fn address_arg(text: &str) -> std::result::Result<u32, String> {
    parse_address(text).ok_or_else(|| format!("invalid address: {}", text))
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(options: &Args) -> Result<()> {
    let config = match &options.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    rd_core::logging::init(config.logging.level);

    let arch = options.arch.unwrap_or(config.general.architecture);
    let lines = options.lines.unwrap_or(config.disassembly.lines_per_view);
    tracing::info!("Starting retrodbg monitor for {}", arch);

    let image = std::fs::read(&options.image)
        .with_context(|| format!("reading {}", options.image.display()))?;
    let base = (options.base & arch.address_mask()) as usize;
    let ram_size = (base + image.len()).max(MIN_RAM_SIZE);
    let mut bytes = vec![0u8; ram_size];
    bytes[base..base + image.len()].copy_from_slice(&image);
    let ram = Arc::new(RwLock::new(bytes));
    tracing::info!("Loaded {} bytes at 0x{:08X}", image.len(), base);

    let vis = Arc::new(Mutex::new(DebugVisualizer::with_config(config)));
    {
        let mut vis = vis.lock();
        vis.initialize(arch);

        let reader = ram.clone();
        vis.set_memory_read_function(
            arch,
            Arc::new(move |addr: u32| reader.read().get(addr as usize).copied().unwrap_or(0)),
        );
        let writer = ram.clone();
        vis.set_memory_write_function(
            arch,
            Arc::new(move |addr: u32, value: u8| {
                if let Some(byte) = writer.write().get_mut(addr as usize) {
                    *byte = value;
                }
            }),
        );

        if let Some(path) = &options.breakpoints {
            let loaded = vis
                .load_breakpoints(path)
                .with_context(|| format!("loading breakpoints from {}", path.display()))?;
            tracing::info!("{} breakpoints armed", loaded);
        }

        let pc = options.pc.unwrap_or(options.base);
        let mut registers = HashMap::new();
        registers.insert(program_counter(arch).to_string(), pc as u64);
        if let Some(sp) = options.sp {
            registers.insert(stack_pointer(arch).to_string(), sp as u64);
        }
        vis.set_execution_address(pc);
        vis.set_register_values(&registers);
        vis.call_stack_viewer_mut().detect_stack_frames();
        vis.memory_viewer_mut().go_to_address(pc);
        vis.pause_emulation();
    }

    print_snapshot(&vis.lock(), lines);
    Ok(())
}

fn program_counter(arch: Architecture) -> &'static str {
    match arch {
        Architecture::ARM => "R15",
        _ => "PC",
    }
}

fn stack_pointer(arch: Architecture) -> &'static str {
    match arch {
        Architecture::M68K => "A7",
        Architecture::Z80 => "SP",
        Architecture::ARM => "R13",
        Architecture::MIPS => "$29",
        Architecture::M6502 => "S",
    }
}

fn print_snapshot(vis: &DebugVisualizer, lines: usize) {
    let Some(arch) = vis.active_architecture() else {
        println!("Debugger inactive");
        return;
    };
    let pc = vis.execution_address();

    println!("== Disassembly [{}] ==", arch);
    if let Some(viewer) = vis.disassembly_viewer(arch) {
        for insn in viewer.disassemble_range(viewer.current_address(), lines) {
            let marker = if insn.address == pc { '>' } else { ' ' };
            let dot = if viewer.has_breakpoint(insn.address) { '*' } else { ' ' };
            println!(
                "{}{} {}  {:<20} {}",
                marker,
                dot,
                viewer.format_address(insn.address),
                insn.bytes_hex(),
                insn.text()
            );
        }
    }

    println!();
    println!("== Registers ==");
    let registers = vis.register_viewer();
    for group in registers.get_register_groups() {
        let values: Vec<String> = group
            .registers
            .iter()
            .filter_map(|name| registers.formatted_value(name).map(|v| format!("{}={}", name, v)))
            .collect();
        println!("{:<20} {}", group.name, values.join(" "));
    }

    println!();
    println!("== Call Stack ==");
    for (i, frame) in vis.call_stack_viewer().frames().iter().enumerate() {
        println!("#{:<2} {:08X}  {}", i, frame.current_address, frame.function_name);
    }

    println!();
    println!("== Memory ==");
    let memory = vis.memory_viewer();
    for row in memory.read_rows().iter().take(4) {
        println!("{}", memory.format_row(row));
    }
}
