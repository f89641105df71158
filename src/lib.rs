//! # Sable - a tiny typed S-expression language on bare x86-64
//!
//! Sable compiles a small statically-typed S-expression language
//! straight to x86-64 machine code, with no assembler or linker in
//! between. The result is either wrapped in a minimal ELF64 executable
//! or mapped into memory and called as a native function.
//!
//! ## Quick start
//!
//! ```
//! let unit = sable::compile("(return (+ 2 3))").unwrap();
//! assert_eq!(unit.funcs.len(), 1);
//! let image = sable::emit_memory(&unit, 16).unwrap();
//! assert!(!image.is_empty());
//! ```
//!
//! ## Architecture
//!
//! Source flows through a strict pipeline, leaves first:
//!
//! 1. **Reader** - parse S-expressions into a [`Value`] tree
//! 2. **Lowerer** - resolve scopes, check types, and flatten each
//!    function into a list of virtual instructions over data-stack slots
//! 3. **Emitter** - translate each virtual instruction into fixed
//!    x86-64 templates, patching jumps, calls, and string references
//!
//! At run time RBX carries the data-stack base and the hardware stack
//! holds a chain of enclosing frame pointers, which is how nested
//! functions reach their captured variables.

pub mod codegen;
pub mod compiler;
pub mod error;
#[cfg(unix)]
pub mod exec;
pub mod pipeline;
pub mod reader;
pub mod types;
pub mod value;

pub use compiler::{lower_program, Unit};
pub use error::CompileError;
pub use pipeline::{compile, emit_elf, emit_memory};
#[cfg(unix)]
pub use pipeline::run;
pub use reader::{parse, parse_program};
pub use types::TypeDef;
pub use value::Value;
