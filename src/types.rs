//! The type system: three scalars, arbitrary pointer depth, and the
//! cast table.

use crate::error::CompileError;
use crate::value::Value;
use std::fmt;

/// The scalar kinds of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Void,
    Int,
    Byte,
}

/// A value type: a scalar wrapped in zero or more pointer levels.
///
/// Compared structurally. `ptr void` is unrepresentable by construction
/// (the validator rejects it), so a pointer always has a loadable
/// element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDef {
    pub scalar: Scalar,
    pub pointer_level: u8,
}

impl TypeDef {
    pub const VOID: TypeDef = TypeDef {
        scalar: Scalar::Void,
        pointer_level: 0,
    };
    pub const INT: TypeDef = TypeDef {
        scalar: Scalar::Int,
        pointer_level: 0,
    };
    pub const BYTE: TypeDef = TypeDef {
        scalar: Scalar::Byte,
        pointer_level: 0,
    };
    pub const BYTE_PTR: TypeDef = TypeDef {
        scalar: Scalar::Byte,
        pointer_level: 1,
    };

    pub fn is_void(self) -> bool {
        self == TypeDef::VOID
    }

    pub fn is_pointer(self) -> bool {
        self.pointer_level > 0
    }

    /// Pointer to this type (`int` → `ptr int`).
    pub fn ptr_to(self) -> TypeDef {
        TypeDef {
            scalar: self.scalar,
            pointer_level: self.pointer_level + 1,
        }
    }

    /// Element type behind one pointer level. Callers must check
    /// `is_pointer` first.
    pub fn pointee(self) -> TypeDef {
        debug_assert!(self.is_pointer());
        TypeDef {
            scalar: self.scalar,
            pointer_level: self.pointer_level - 1,
        }
    }

    /// The stable textual key used in mangled function signatures.
    pub fn key(self) -> String {
        self.to_string()
    }

    /// How a cast from `self` to `dst` behaves, or `None` if rejected.
    ///
    /// Pointers reinterpret freely among themselves and to/from `int`;
    /// `byte` widens to `int`; `int` narrows to `byte` with an explicit
    /// mask instruction.
    pub fn cast_to(self, dst: TypeDef) -> Option<CastKind> {
        let src_ptr = self.is_pointer();
        let dst_ptr = dst.is_pointer();
        match (dst_ptr, dst.scalar, src_ptr, self.scalar) {
            (true, _, true, _) => Some(CastKind::Free),
            (true, _, false, Scalar::Int) => Some(CastKind::Free),
            (false, Scalar::Int, true, _) => Some(CastKind::Free),
            (false, Scalar::Int, false, Scalar::Int) => Some(CastKind::Free),
            (false, Scalar::Int, false, Scalar::Byte) => Some(CastKind::Free),
            (false, Scalar::Byte, false, Scalar::Byte) => Some(CastKind::Free),
            (false, Scalar::Byte, false, Scalar::Int) => Some(CastKind::Truncate),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.pointer_level {
            write!(f, "ptr ")?;
        }
        match self.scalar {
            Scalar::Void => write!(f, "void"),
            Scalar::Int => write!(f, "int"),
            Scalar::Byte => write!(f, "byte"),
        }
    }
}

/// What a cast compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Pure reinterpretation, no code emitted.
    Free,
    /// `int` → `byte`: mask the slot to its low 8 bits in place.
    Truncate,
}

/// Validate a type written as a token sequence: `void`, `int`, `byte`,
/// or `ptr` followed by a non-void type.
pub fn validate_type(tokens: &[Value]) -> Result<TypeDef, CompileError> {
    let (head, rest) = tokens.split_first().ok_or(CompileError::MissingType)?;
    let name = match head.as_symbol() {
        Some(name) => name,
        None => return Err(CompileError::unknown_type(head.to_string())),
    };
    match name {
        "ptr" => {
            let inner = validate_type(rest)?;
            if inner.is_void() {
                return Err(CompileError::PointerToVoid);
            }
            Ok(inner.ptr_to())
        }
        "void" | "int" | "byte" => {
            if !rest.is_empty() {
                return Err(CompileError::BadScalarType);
            }
            Ok(match name {
                "void" => TypeDef::VOID,
                "int" => TypeDef::INT,
                _ => TypeDef::BYTE,
            })
        }
        _ => Err(CompileError::unknown_type(name)),
    }
}

/// Validate a type written as a single node: either a bare symbol
/// (`int`) or a list (`(ptr byte)`), as it appears in `cast` position.
pub fn type_of_node(node: &Value) -> Result<TypeDef, CompileError> {
    match node {
        Value::List(items) => validate_type(items),
        other => validate_type(std::slice::from_ref(other)),
    }
}

/// The mangled key of a function: name plus the key of every argument
/// type in declaration order. Doubles as the human-readable signature.
pub fn mangle(name: &str, args: &[TypeDef]) -> String {
    let mut out = String::from(name);
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&arg.key());
    }
    out.push(')');
    out
}
