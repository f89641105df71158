//! Semantic analysis: scope resolution, type checking, and lowering to
//! the virtual instruction list.

pub mod func;
pub mod instr;
pub mod lower;
pub mod scope;

pub use func::{FuncId, Function, Unit};
pub use instr::{BinOp, Const, Instr, Label, UnOp};
pub use lower::lower_program;
pub use scope::Scope;
