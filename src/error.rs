//! Typed compile errors.
//!
//! Every failure is fatal to the compilation unit; there is no
//! per-expression recovery. The enum groups the taxonomy by phase:
//! reader, type grammar, lowering, and internal emission errors.

use std::fmt;

/// A fatal compilation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    // Reader errors
    UnbalancedParens,
    StrayCloseParen,
    TrailingGarbage,
    EmptyProgram,
    UnterminatedString,
    BadEscape {
        text: String,
    },
    BadCharLiteral {
        text: String,
    },
    IntegerOutOfRange {
        text: String,
    },
    BadName {
        text: String,
    },

    // Type grammar errors
    MissingType,
    PointerToVoid,
    BadScalarType,
    UnknownType {
        name: String,
    },
    BadCast {
        from: String,
        to: String,
    },

    // Lowering errors
    EmptyForm,
    UnknownForm {
        head: String,
    },
    ExpectedName {
        form: &'static str,
    },
    UndefinedName {
        name: String,
    },
    UndefinedFunction {
        signature: String,
    },
    DuplicateName {
        name: String,
    },
    DuplicateFunction {
        signature: String,
    },
    VarNotAllowedHere,
    VoidInitializer {
        name: String,
    },
    SetTypeMismatch {
        name: String,
        expected: String,
        got: String,
    },
    BinopTypeMismatch {
        op: String,
        lhs: String,
        rhs: String,
    },
    UnopTypeMismatch {
        op: String,
        operand: String,
    },
    MixedPointerTypes {
        lhs: String,
        rhs: String,
    },
    NotAPointer {
        got: String,
    },
    PointerMismatch {
        expected: String,
        got: String,
    },
    ReturnTypeMismatch {
        expected: String,
        got: String,
    },
    BodyTypeMismatch {
        expected: String,
        got: String,
    },
    VoidCondition,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    BadArgumentName,
    BadArgumentType {
        name: String,
    },
    VoidCallArgument,
    BadSyscallNumber,
    TooManySyscallArgs {
        got: usize,
    },
    VoidSyscallArgument,
    NotImplemented {
        what: &'static str,
    },
    MalformedRoot,

    // Emission errors (internal invariants)
    UnresolvedLabel {
        label: u32,
    },
    UnresolvedCall {
        func: usize,
    },
}

impl CompileError {
    pub fn bad_escape(text: impl Into<String>) -> Self {
        CompileError::BadEscape { text: text.into() }
    }

    pub fn bad_char(text: impl Into<String>) -> Self {
        CompileError::BadCharLiteral { text: text.into() }
    }

    pub fn out_of_range(text: impl Into<String>) -> Self {
        CompileError::IntegerOutOfRange { text: text.into() }
    }

    pub fn bad_name(text: impl Into<String>) -> Self {
        CompileError::BadName { text: text.into() }
    }

    pub fn unknown_type(name: impl Into<String>) -> Self {
        CompileError::UnknownType { name: name.into() }
    }

    pub fn bad_cast(from: impl Into<String>, to: impl Into<String>) -> Self {
        CompileError::BadCast {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn unknown_form(head: impl Into<String>) -> Self {
        CompileError::UnknownForm { head: head.into() }
    }

    pub fn undefined_name(name: impl Into<String>) -> Self {
        CompileError::UndefinedName { name: name.into() }
    }

    pub fn undefined_function(signature: impl Into<String>) -> Self {
        CompileError::UndefinedFunction {
            signature: signature.into(),
        }
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        CompileError::DuplicateName { name: name.into() }
    }

    pub fn duplicate_function(signature: impl Into<String>) -> Self {
        CompileError::DuplicateFunction {
            signature: signature.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnbalancedParens => write!(f, "unbalanced parenthesis"),
            CompileError::StrayCloseParen => write!(f, "bad parenthesis"),
            CompileError::TrailingGarbage => write!(f, "trailing garbage after the program"),
            CompileError::EmptyProgram => write!(f, "empty program"),
            CompileError::UnterminatedString => write!(f, "unterminated string literal"),
            CompileError::BadEscape { text } => write!(f, "bad escape `\\{}`", text),
            CompileError::BadCharLiteral { text } => {
                write!(f, "bad character literal '{}'", text)
            }
            CompileError::IntegerOutOfRange { text } => {
                write!(f, "integer out of range: `{}`", text)
            }
            CompileError::BadName { text } => write!(f, "bad name `{}`", text),
            CompileError::MissingType => write!(f, "type missing"),
            CompileError::PointerToVoid => write!(f, "`ptr void` is not a type"),
            CompileError::BadScalarType => write!(f, "bad scalar type"),
            CompileError::UnknownType { name } => write!(f, "unknown type `{}`", name),
            CompileError::BadCast { from, to } => {
                write!(f, "cannot cast `{}` to `{}`", from, to)
            }
            CompileError::EmptyForm => write!(f, "empty list"),
            CompileError::UnknownForm { head } => write!(f, "unknown expression `{}`", head),
            CompileError::ExpectedName { form } => write!(f, "`{}` expects a name", form),
            CompileError::UndefinedName { name } => write!(f, "undefined name `{}`", name),
            CompileError::UndefinedFunction { signature } => {
                write!(f, "undefined function `{}`", signature)
            }
            CompileError::DuplicateName { name } => write!(f, "duplicated name `{}`", name),
            CompileError::DuplicateFunction { signature } => {
                write!(f, "duplicated function `{}`", signature)
            }
            CompileError::VarNotAllowedHere => {
                write!(f, "variable declaration not allowed here")
            }
            CompileError::VoidInitializer { name } => {
                write!(f, "cannot initialize `{}` from a void expression", name)
            }
            CompileError::SetTypeMismatch {
                name,
                expected,
                got,
            } => write!(
                f,
                "cannot assign `{}` to `{}` of type `{}`",
                got, name, expected
            ),
            CompileError::BinopTypeMismatch { op, lhs, rhs } => write!(
                f,
                "bad operand types for `{}`: `{}` and `{}`",
                op, lhs, rhs
            ),
            CompileError::UnopTypeMismatch { op, operand } => {
                write!(f, "bad operand type for `{}`: `{}`", op, operand)
            }
            CompileError::MixedPointerTypes { lhs, rhs } => {
                write!(f, "mismatched pointer types: `{}` and `{}`", lhs, rhs)
            }
            CompileError::NotAPointer { got } => write!(f, "not a pointer: `{}`", got),
            CompileError::PointerMismatch { expected, got } => {
                write!(f, "pointer type mismatch: expected `{}`, got `{}`", expected, got)
            }
            CompileError::ReturnTypeMismatch { expected, got } => {
                write!(f, "bad return type: expected `{}`, got `{}`", expected, got)
            }
            CompileError::BodyTypeMismatch { expected, got } => write!(
                f,
                "function body has type `{}` but is declared `{}`",
                got, expected
            ),
            CompileError::VoidCondition => write!(f, "condition must not be void"),
            CompileError::BreakOutsideLoop => write!(f, "`break` outside a loop"),
            CompileError::ContinueOutsideLoop => write!(f, "`continue` outside a loop"),
            CompileError::BadArgumentName => write!(f, "bad argument name"),
            CompileError::BadArgumentType { name } => {
                write!(f, "argument `{}` cannot be void", name)
            }
            CompileError::VoidCallArgument => {
                write!(f, "void expression used as a call argument")
            }
            CompileError::BadSyscallNumber => {
                write!(f, "syscall number must be a literal integer")
            }
            CompileError::TooManySyscallArgs { got } => {
                write!(f, "too many syscall arguments: {} (at most 6)", got)
            }
            CompileError::VoidSyscallArgument => {
                write!(f, "syscall arguments must not be void")
            }
            CompileError::NotImplemented { what } => write!(f, "not implemented: {}", what),
            CompileError::MalformedRoot => {
                write!(f, "program root must be a `main` function definition")
            }
            CompileError::UnresolvedLabel { label } => {
                write!(f, "internal error: unresolved label L{}", label)
            }
            CompileError::UnresolvedCall { func } => {
                write!(f, "internal error: unresolved call to func{}", func)
            }
        }
    }
}

impl std::error::Error for CompileError {}
