//! The `sable` command-line driver.

use clap::{CommandFactory, Parser};
use sable::codegen::DEFAULT_ALIGNMENT;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sable", about = "Compile a sable program to x86-64", version)]
struct Cli {
    /// The input source file
    file: Option<PathBuf>,

    /// Compile to memory and execute it
    #[arg(long)]
    exec: bool,

    /// Print the intermediate representation
    #[arg(long = "print-ir")]
    print_ir: bool,

    /// Write an ELF executable to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Function alignment in the emitted code; 0 disables padding
    #[arg(long, default_value_t = DEFAULT_ALIGNMENT)]
    alignment: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let Some(file) = &cli.file else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    let source = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error reading {}: {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let unit = match sable::compile(&source) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("compile error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.print_ir {
        print!("{}", unit.dump_ir());
    }

    if let Some(path) = &cli.output {
        let image = match sable::emit_elf(&unit, cli.alignment) {
            Ok(image) => image,
            Err(e) => {
                eprintln!("emit error: {}", e);
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = write_executable(path, &image) {
            eprintln!("error writing {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    }

    if cli.exec {
        return match execute(&unit, cli.alignment) {
            Ok(status) => ExitCode::from((status & 0xff) as u8),
            Err(message) => {
                eprintln!("{}", message);
                ExitCode::FAILURE
            }
        };
    }

    ExitCode::SUCCESS
}

fn write_executable(path: &PathBuf, image: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, image)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(unix)]
fn execute(unit: &sable::Unit, alignment: usize) -> Result<i64, String> {
    let image = sable::emit_memory(unit, alignment).map_err(|e| format!("emit error: {}", e))?;
    let program =
        sable::exec::MemProgram::new(&image).map_err(|e| format!("execution error: {}", e))?;
    // Safety: the image came straight from the emitter.
    Ok(unsafe { program.invoke() })
}

#[cfg(not(unix))]
fn execute(_unit: &sable::Unit, _alignment: usize) -> Result<i64, String> {
    Err("--exec is only supported on unix hosts".to_string())
}
