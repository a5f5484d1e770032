//! lute - CLI driver and REPL for the Lute language
//!
//! Usage:
//!   lute                    # Start the interactive REPL
//!   lute script.lute        # Run a script file
//!   lute script.lute --disasm   # Compile and print the chunk, don't run
//!   lute script.lute --trace    # Disassemble instructions as they execute
//!
//! Exit codes follow the sysexits convention: 0 on success, 64 for usage
//! errors, 65 when compilation fails, 70 for runtime errors, 74 when the
//! script file cannot be read.

use clap::Parser as ClapParser;
use clap::error::ErrorKind;
use lute_core::{Heap, disasm};
use lute_runtime::{InterpretError, Vm};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;

const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;
const EX_IOERR: i32 = 74;

#[derive(ClapParser)]
#[command(name = "lute")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lute interpreter - run a script or start the REPL", long_about = None)]
struct Cli {
    /// Script file to run (starts the REPL when omitted)
    script: Option<PathBuf>,

    /// Compile and disassemble the script instead of executing it
    #[arg(long, requires = "script")]
    disasm: bool,

    /// Disassemble each instruction as it executes
    #[arg(long)]
    trace: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EX_USAGE,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    match &cli.script {
        Some(path) => run_file(path, &cli),
        None => run_repl(&cli),
    }
}

fn run_file(path: &Path, cli: &Cli) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read {}: {}", path.display(), e);
            process::exit(EX_IOERR);
        }
    };

    if cli.disasm {
        disassemble_file(path, &source);
        return;
    }

    info!(path = %path.display(), "running script");
    let mut vm = Vm::new();
    vm.set_trace(cli.trace);
    let mut out = io::stdout().lock();
    let mut err = io::stderr().lock();
    match vm.interpret(&source, &mut out, &mut err) {
        Ok(()) => {}
        Err(InterpretError::Compile(_)) => process::exit(EX_DATAERR),
        Err(InterpretError::Runtime(_)) => process::exit(EX_SOFTWARE),
    }
}

fn disassemble_file(path: &Path, source: &str) {
    let mut heap = Heap::new();
    let mut err = io::stderr().lock();
    let chunk = match lute_compiler::compile(source, &mut heap, &mut err) {
        Ok(chunk) => chunk,
        Err(_) => process::exit(EX_DATAERR),
    };
    let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("script");
    let mut out = io::stdout().lock();
    if let Err(e) = disasm::disassemble(&chunk, name, &mut out) {
        eprintln!("Could not write disassembly: {}", e);
        process::exit(EX_IOERR);
    }
}

fn run_repl(cli: &Cli) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Could not start line editor: {}", e);
            process::exit(EX_SOFTWARE);
        }
    };
    let history = home::home_dir().map(|dir| dir.join(".lute_history"));
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    info!("starting REPL");
    let mut vm = Vm::new();
    vm.set_trace(cli.trace);
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                let mut out = io::stdout().lock();
                let mut err = io::stderr().lock();
                // Errors were already reported on the writers; the session
                // carries on with its globals intact
                let _ = vm.interpret(&line, &mut out, &mut err);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = editor.save_history(path);
    }
}
