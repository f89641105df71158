//! End-to-end compilation entry points.
//!
//! The phases run strictly in order, each consuming the previous
//! stage's output: reader → lowerer → emitter, with an optional final
//! hop into executable memory.

use crate::codegen::{CodeGen, DEFAULT_ALIGNMENT};
use crate::compiler::{lower_program, Unit};
use crate::error::CompileError;
use crate::reader::parse_program;
use std::fmt;

/// Parse and lower a whole program into its function table.
pub fn compile(source: &str) -> Result<Unit, CompileError> {
    // Phase 1: read the tree (wrapped as the implicit main definition)
    let root = parse_program(source)?;
    // Phase 2: lower to virtual instructions
    lower_program(&root)
}

/// Emit an image callable in place as `int64_t (*)(void *data_stack)`.
pub fn emit_memory(unit: &Unit, alignment: usize) -> Result<Vec<u8>, CompileError> {
    CodeGen::memory_image(unit, alignment)
}

/// Emit a standalone Linux ELF64 executable image.
pub fn emit_elf(unit: &Unit, alignment: usize) -> Result<Vec<u8>, CompileError> {
    CodeGen::elf_image(unit, alignment)
}

/// An error from the compile-and-run path.
#[derive(Debug)]
pub enum RunError {
    Compile(CompileError),
    Exec(std::io::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Compile(e) => write!(f, "compile error: {}", e),
            RunError::Exec(e) => write!(f, "execution error: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

impl From<CompileError> for RunError {
    fn from(e: CompileError) -> RunError {
        RunError::Compile(e)
    }
}

impl From<std::io::Error> for RunError {
    fn from(e: std::io::Error) -> RunError {
        RunError::Exec(e)
    }
}

/// Compile a program, map it into memory, and run it, returning
/// `main`'s value.
#[cfg(unix)]
pub fn run(source: &str) -> Result<i64, RunError> {
    let unit = compile(source)?;
    let image = emit_memory(&unit, DEFAULT_ALIGNMENT)?;
    let program = crate::exec::MemProgram::new(&image)?;
    // Safety: the image came straight from the emitter.
    Ok(unsafe { program.invoke() })
}
