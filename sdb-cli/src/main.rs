//! sdb CLI - コマンドラインインターフェース
//!
//! エミュレータ用の簡易デバッガ sdb のREPLインターフェース

use anyhow::Result;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sdb_core::{Command, Debugger, ExprError, InfoTarget, StepOutcome, StopReason};
use sdb_target::{DEFAULT_PMEM_SIZE, PMEM_BASE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// sdb - Simple Debugger for the emulator monitor
#[derive(Parser)]
#[command(name = "sdb")]
#[command(version = "0.1.0")]
#[command(about = "Expression-driven monitor for an emulated RISC-V machine", long_about = None)]
struct Cli {
    /// Raw binary image loaded at the start of physical memory
    image: Option<PathBuf>,

    /// Run the program without entering the REPL
    #[arg(short, long)]
    batch: bool,

    /// Size of the physical memory in bytes
    #[arg(long, default_value_t = DEFAULT_PMEM_SIZE)]
    mem_size: usize,

    /// Log filter (e.g. "debug", "sdb_core=debug"); falls back to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

/// REPLループの継続・終了
enum Flow {
    Continue,
    Quit,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let mut debugger = Debugger::new(cli.mem_size)?;
    println!(
        "Physical memory: {} bytes at 0x{:x}",
        debugger.machine().memory().size(),
        PMEM_BASE
    );
    match &cli.image {
        Some(image) => {
            let size = debugger.load_image(image)?;
            println!("Loaded {} bytes from {}", size, image.display());
        }
        None => println!("No image is given. Starting with empty memory."),
    }

    if cli.batch {
        let outcome = debugger.step(None)?;
        report_stop(&outcome);
        std::process::exit(exit_code(&outcome.reason));
    }

    println!("sdb - Simple Debugger");
    println!("Version 0.1.0");
    println!();
    run_repl(&mut debugger)
}

/// tracing-subscriber を初期化する
fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// ゲストの終了状態からプロセスの終了コードを決める
fn exit_code(reason: &StopReason) -> i32 {
    match reason {
        StopReason::Halted { code: 0, .. } | StopReason::Quit => 0,
        _ => 1,
    }
}

/// REPLループを実行する
fn run_repl(debugger: &mut Debugger) -> Result<()> {
    println!("Type 'help' for available commands, 'q' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(sdb) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(debugger, line) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    debugger.quit();
    Ok(())
}

fn handle_command(debugger: &mut Debugger, line: &str) -> Result<Flow> {
    let Some(command) = Command::parse(line)? else {
        return Ok(Flow::Continue);
    };
    tracing::debug!("command: {:?}", command);

    match command {
        Command::Help(name) => print_help(name.as_deref()),
        Command::Quit => return Ok(Flow::Quit),
        Command::Continue => handle_step(debugger, None)?,
        Command::Step(n) => handle_step(debugger, Some(n))?,
        Command::Info(InfoTarget::Registers) => print_registers(debugger),
        Command::Info(InfoTarget::Watchpoints) => print_watchpoints(debugger),
        Command::Examine { count, expr } => handle_examine(debugger, count, &expr)?,
        Command::Print(expr) => handle_print(debugger, &expr),
        Command::Watch(expr) => {
            let id = debugger.add_watchpoint(&expr)?;
            println!("Watchpoint {}: {}", id, expr);
        }
        Command::Delete(id) => {
            let wp = debugger.remove_watchpoint(id)?;
            println!("Deleted watchpoint {}: {}", wp.id, wp.expr);
        }
        Command::Set { target, value } => {
            let value = debugger.assign(&target, &value)?;
            println!("{} = {} (0x{:x})", target, value, value);
        }
        Command::Test(path) => handle_test(debugger, &path)?,
    }

    Ok(Flow::Continue)
}

/// si / c コマンドを処理する
fn handle_step(debugger: &mut Debugger, count: Option<u64>) -> Result<()> {
    let outcome = debugger.step(count)?;
    report_stop(&outcome);
    Ok(())
}

/// 停止理由を表示する
fn report_stop(outcome: &StepOutcome) {
    for hit in &outcome.triggered {
        println!();
        println!("Watchpoint {}: {}", hit.id, hit.expr);
        println!("Old value = {} (0x{:x})", hit.old_value, hit.old_value);
        println!("New value = {} (0x{:x})", hit.new_value, hit.new_value);
    }
    match &outcome.reason {
        StopReason::Step | StopReason::Watchpoint(_) => {}
        StopReason::Halted { pc, code } => {
            let verdict = if *code == 0 { "HIT GOOD TRAP" } else { "HIT BAD TRAP" };
            println!("sdb: {} at pc = 0x{:016x}", verdict, pc);
        }
        StopReason::Aborted { pc } => {
            println!("sdb: ABORT at pc = 0x{:016x}", pc);
        }
        StopReason::Quit => {}
    }
    println!("({} instructions executed)", outcome.executed);
}

/// p コマンドを処理する
fn handle_print(debugger: &Debugger, expr: &str) {
    match debugger.evaluate(expr) {
        Ok(value) => println!("{} (0x{:x})", value, value),
        Err(ExprError::NoMatch { offset }) => {
            println!("no match at position {}", offset);
            println!("{}", expr);
            println!("{:>width$}", "^", width = offset + 1);
        }
        Err(e) => println!("Invalid expression: {}", e),
    }
}

/// x コマンドを処理する
fn handle_examine(debugger: &Debugger, count: usize, expr: &str) -> Result<()> {
    for (addr, value) in debugger.scan_memory(count, expr)? {
        println!("0x{:08x}: 0x{:08x}", addr, value);
    }
    Ok(())
}

/// t コマンドを処理する
fn handle_test(debugger: &Debugger, path: &std::path::Path) -> Result<()> {
    let report = debugger.check_expressions(path)?;
    for check in &report.failures {
        match &check.actual {
            Ok(actual) => println!(
                "line {}: {} expected {}, got {}",
                check.line, check.expr, check.expected, actual
            ),
            Err(e) => println!("line {}: {} failed: {}", check.line, check.expr, e),
        }
    }
    for line in &report.skipped {
        println!("line {}: malformed test line, skipped", line);
    }
    println!(
        "{} passed, {} failed, {} skipped",
        report.passed,
        report.failures.len(),
        report.skipped.len()
    );
    Ok(())
}

fn print_registers(debugger: &Debugger) {
    for (name, value) in debugger.registers().iter() {
        println!("{:<4} 0x{:016x} {}", name, value, value);
    }
    println!("{:<4} 0x{:016x}", "pc", debugger.registers().pc());
}

fn print_watchpoints(debugger: &Debugger) {
    let mut empty = true;
    for wp in debugger.watchpoints() {
        empty = false;
        println!(
            "Watchpoint {}: expr = \"{}\", old_value = {}, new_value = {}",
            wp.id, wp.expr, wp.old_value, wp.new_value
        );
    }
    if empty {
        println!("No watchpoints.");
    }
}

fn print_help(name: Option<&str>) {
    match name {
        Some(name) => match Command::describe(name) {
            Some(desc) => println!("{} - {}", name, desc),
            None => println!("Unknown command '{}'", name),
        },
        None => {
            println!("Available commands:");
            println!();
            for (name, desc) in Command::TABLE {
                println!("  {:<6} - {}", name, desc);
            }
            println!();
            println!("Examples:");
            println!("  p $sp + 8 * 2");
            println!("  w *0x80000000 != 0");
            println!("  x 4 $pc");
            println!("  set $a0 = 0x10");
        }
    }
}
