//! The virtual instruction set.
//!
//! This is the stable interface between the lowerer and the native
//! emitter: a flat, append-only list per function. Slot operands index
//! the function's data-stack window (`[RBX + slot·8]` at run time);
//! `level` operands index the environment-pointer chain on RSP.

use crate::compiler::func::FuncId;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

/// Jump label, scoped to one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// A constant operand: integer or interned string.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i64),
    Str(Rc<str>),
}

/// Binary operators of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl BinOp {
    pub fn from_symbol(name: &str) -> Option<BinOp> {
        Some(match name {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Rem,
            "and" => BinOp::And,
            "or" => BinOp::Or,
            "eq" => BinOp::Eq,
            "ne" => BinOp::Ne,
            "ge" => BinOp::Ge,
            "gt" => BinOp::Gt,
            "le" => BinOp::Le,
            "lt" => BinOp::Lt,
            _ => return None,
        })
    }

    /// Comparisons yield the canonical boolean `int` 0/1.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Ge | BinOp::Gt | BinOp::Le | BinOp::Lt
        )
    }

    pub fn text(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Ge => "ge",
            BinOp::Gt => "gt",
            BinOp::Le => "le",
            BinOp::Lt => "lt",
        }
    }
}

/// Unary operators of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn text(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "not",
        }
    }
}

/// One virtual instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Write a constant into `dst`.
    Const { value: Const, dst: usize },
    /// Copy one slot to another.
    Mov { src: usize, dst: usize },
    /// 64-bit binary operation.
    Binop {
        op: BinOp,
        lhs: usize,
        rhs: usize,
        dst: usize,
    },
    /// Byte binary operation: the result is re-narrowed to 8 bits.
    Binop8 {
        op: BinOp,
        lhs: usize,
        rhs: usize,
        dst: usize,
    },
    /// 64-bit unary operation.
    Unop { op: UnOp, src: usize, dst: usize },
    /// Byte negation, re-narrowed to 8 bits.
    Unop8 { op: UnOp, src: usize, dst: usize },
    /// Jump to `target` if `cond` is zero.
    Jmpf { cond: usize, target: Label },
    Jmp { target: Label },
    /// Call `func`, rebasing the callee's frame at `arg_base` and
    /// building its environment chain from the caller's.
    Call {
        func: FuncId,
        arg_base: usize,
        caller_level: u32,
        callee_level: u32,
    },
    /// Return; the value (if any) is copied to slot 0 first.
    Ret { src: Option<usize> },
    /// Read a variable from an enclosing function's frame.
    GetEnv { level: u32, slot: usize, dst: usize },
    /// Write a variable in an enclosing function's frame.
    SetEnv { level: u32, slot: usize, src: usize },
    /// Address of a local slot.
    RefVar { slot: usize, dst: usize },
    /// Address of a slot in an enclosing function's frame.
    RefEnv { level: u32, slot: usize, dst: usize },
    /// Scaled pointer arithmetic: `dst = base + index * scale`.
    Lea {
        base: usize,
        index: usize,
        scale: i8,
        dst: usize,
    },
    /// 64-bit load through a pointer slot.
    Peek { ptr: usize, dst: usize },
    /// Zero-extending byte load through a pointer slot.
    Peek8 { ptr: usize, dst: usize },
    /// 64-bit store through a pointer slot.
    Poke { ptr: usize, src: usize },
    /// Byte store through a pointer slot.
    Poke8 { ptr: usize, src: usize },
    /// Narrow a slot to its low 8 bits in place.
    Cast8 { slot: usize },
    /// Raw syscall; the result lands in `dst`.
    Syscall {
        dst: usize,
        num: i64,
        args: SmallVec<[usize; 6]>,
    },
    /// Debugger trap.
    Debug,
}

/// Render a slot that may be absent (a void result) the way the IR dump
/// spells it.
fn slot_or_void(slot: Option<usize>) -> String {
    match slot {
        Some(s) => s.to_string(),
        None => "-1".to_string(),
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Const {
                value: Const::Int(v),
                dst,
            } => write!(f, "const {} {}", v, dst),
            Instr::Const {
                value: Const::Str(s),
                dst,
            } => write!(f, "const {:?} {}", s, dst),
            Instr::Mov { src, dst } => write!(f, "mov {} {}", src, dst),
            Instr::Binop { op, lhs, rhs, dst } => {
                write!(f, "binop {} {} {} {}", op.text(), lhs, rhs, dst)
            }
            Instr::Binop8 { op, lhs, rhs, dst } => {
                write!(f, "binop8 {} {} {} {}", op.text(), lhs, rhs, dst)
            }
            Instr::Unop { op, src, dst } => write!(f, "unop {} {} {}", op.text(), src, dst),
            Instr::Unop8 { op, src, dst } => write!(f, "unop8 {} {} {}", op.text(), src, dst),
            Instr::Jmpf { cond, target } => write!(f, "jmpf {} L{}", cond, target.0),
            Instr::Jmp { target } => write!(f, "jmp L{}", target.0),
            Instr::Call {
                func,
                arg_base,
                caller_level,
                callee_level,
            } => write!(
                f,
                "call {} {} {} {}",
                func.0, arg_base, caller_level, callee_level
            ),
            Instr::Ret { src } => write!(f, "ret {}", slot_or_void(*src)),
            Instr::GetEnv { level, slot, dst } => {
                write!(f, "get_env {} {} {}", level, slot, dst)
            }
            Instr::SetEnv { level, slot, src } => {
                write!(f, "set_env {} {} {}", level, slot, src)
            }
            Instr::RefVar { slot, dst } => write!(f, "ref_var {} {}", slot, dst),
            Instr::RefEnv { level, slot, dst } => {
                write!(f, "ref_env {} {} {}", level, slot, dst)
            }
            Instr::Lea {
                base,
                index,
                scale,
                dst,
            } => write!(f, "lea {} {} {} {}", base, index, scale, dst),
            Instr::Peek { ptr, dst } => write!(f, "peek {} {}", ptr, dst),
            Instr::Peek8 { ptr, dst } => write!(f, "peek8 {} {}", ptr, dst),
            Instr::Poke { ptr, src } => write!(f, "poke {} {}", ptr, src),
            Instr::Poke8 { ptr, src } => write!(f, "poke8 {} {}", ptr, src),
            Instr::Cast8 { slot } => write!(f, "cast8 {}", slot),
            Instr::Syscall { dst, num, args } => {
                write!(f, "syscall {} {}", dst, num)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            Instr::Debug => write!(f, "debug"),
        }
    }
}
