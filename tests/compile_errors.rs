//! Every malformed form must fail deterministically, with no bytes
//! emitted.

use sable::{compile, CompileError};

fn err(source: &str) -> CompileError {
    match compile(source) {
        Ok(_) => panic!("expected a compile error for {:?}", source),
        Err(e) => e,
    }
}

#[test]
fn void_initializer() {
    assert!(matches!(
        err("(var x (do))"),
        CompileError::VoidInitializer { .. }
    ));
}

#[test]
fn mixed_binop_operands() {
    assert!(matches!(
        err("(* 1 \"a\")"),
        CompileError::BinopTypeMismatch { .. }
    ));
    assert!(matches!(
        err("(+ 1 2u8)"),
        CompileError::BinopTypeMismatch { .. }
    ));
    assert!(matches!(
        err("(and 1u8 1u8)"),
        CompileError::BinopTypeMismatch { .. }
    ));
}

#[test]
fn break_and_continue_outside_loop() {
    assert!(matches!(err("(break)"), CompileError::BreakOutsideLoop));
    assert!(matches!(
        err("(continue)"),
        CompileError::ContinueOutsideLoop
    ));
}

#[test]
fn var_outside_statement_position() {
    assert!(matches!(
        err("(+ 1 (var x 2))"),
        CompileError::VarNotAllowedHere
    ));
    assert!(matches!(
        err("(return (var x 2))"),
        CompileError::VarNotAllowedHere
    ));
}

#[test]
fn undefined_names() {
    assert!(matches!(
        err("(set nope 1)"),
        CompileError::UndefinedName { .. }
    ));
    assert!(matches!(
        err("(return missing)"),
        CompileError::UndefinedName { .. }
    ));
    assert!(matches!(
        err("(return (call nope 1))"),
        CompileError::UndefinedFunction { .. }
    ));
}

#[test]
fn overload_resolution_is_exact() {
    // f(int) exists, f(byte) does not
    assert!(matches!(
        err("(def (f int) ((x int)) x) (return (call f 1u8))"),
        CompileError::UndefinedFunction { .. }
    ));
}

#[test]
fn duplicate_declarations() {
    assert!(matches!(
        err("(var x 1) (var x 2)"),
        CompileError::DuplicateName { .. }
    ));
    assert!(matches!(
        err("(def (f int) ((x int)) 1) (def (f int) ((y int)) 2) (return 0)"),
        CompileError::DuplicateFunction { .. }
    ));
}

#[test]
fn type_grammar() {
    assert!(matches!(
        err("(var p (ptr void)) (return 0)"),
        CompileError::PointerToVoid
    ));
    assert!(matches!(
        err("(var x (cast (int byte) 1)) (return x)"),
        CompileError::BadScalarType
    ));
    assert!(matches!(
        err("(def (f float) () 1) (return 0)"),
        CompileError::UnknownType { .. }
    ));
}

#[test]
fn rejected_casts() {
    assert!(matches!(err("(cast (ptr int) 1u8)"), CompileError::BadCast { .. }));
    assert!(matches!(err("(cast byte (do))"), CompileError::BadCast { .. }));
}

#[test]
fn assignment_type_mismatch() {
    assert!(matches!(
        err("(var x 1) (set x 2u8)"),
        CompileError::SetTypeMismatch { .. }
    ));
}

#[test]
fn return_type_mismatch() {
    assert!(matches!(
        err("(return 1u8)"),
        CompileError::ReturnTypeMismatch { .. }
    ));
    assert!(matches!(
        err("(return)"),
        CompileError::ReturnTypeMismatch { .. }
    ));
}

#[test]
fn body_type_mismatch() {
    assert!(matches!(
        err("(def (f int) ((x int)) (do)) (return (call f 1))"),
        CompileError::BodyTypeMismatch { .. }
    ));
}

#[test]
fn void_conditions() {
    assert!(matches!(err("(if (do) 1 2)"), CompileError::VoidCondition));
    assert!(matches!(err("(loop (do) 1)"), CompileError::VoidCondition));
}

#[test]
fn void_arguments() {
    assert!(matches!(
        err("(def (f int) ((x void)) 1) (return 0)"),
        CompileError::BadArgumentType { .. }
    ));
    assert!(matches!(
        err("(def (f int) ((x int)) x) (return (call f (do)))"),
        CompileError::VoidCallArgument
    ));
}

#[test]
fn syscall_shapes() {
    assert!(matches!(
        err("(syscall (+ 1 2) 0)"),
        CompileError::BadSyscallNumber
    ));
    assert!(matches!(
        err("(syscall -1 0)"),
        CompileError::BadSyscallNumber
    ));
    assert!(matches!(
        err("(syscall 0 1 2 3 4 5 6 7)"),
        CompileError::TooManySyscallArgs { .. }
    ));
    assert!(matches!(
        err("(syscall 0 (do))"),
        CompileError::VoidSyscallArgument
    ));
}

#[test]
fn pointer_dereference_errors() {
    assert!(matches!(err("(peek 1)"), CompileError::NotAPointer { .. }));
    assert!(matches!(
        err("(poke (cast (ptr int) 0) 1u8)"),
        CompileError::PointerMismatch { .. }
    ));
    assert!(matches!(
        err("(peek8 (cast (ptr int) 0))"),
        CompileError::PointerMismatch { .. }
    ));
    assert!(matches!(
        err("(poke8 (cast (ptr int) 0) 1)"),
        CompileError::PointerMismatch { .. }
    ));
}

#[test]
fn pointer_subtraction_limits() {
    assert!(matches!(
        err("(var p (ptr int)) (var q (ptr byte)) (return (- p q))"),
        CompileError::MixedPointerTypes { .. }
    ));
    assert!(matches!(
        err("(var p (ptr int)) (var q (ptr int)) (return (- p q))"),
        CompileError::NotImplemented { .. }
    ));
}

#[test]
fn bad_unops() {
    assert!(matches!(
        err("(- \"a\")"),
        CompileError::UnopTypeMismatch { .. }
    ));
    assert!(matches!(
        err("(not (do))"),
        CompileError::UnopTypeMismatch { .. }
    ));
}

#[test]
fn unknown_and_empty_forms() {
    assert!(matches!(err("()"), CompileError::EmptyForm));
    assert!(matches!(
        err("(frobnicate 1)"),
        CompileError::UnknownForm { .. }
    ));
    assert!(matches!(err("(var)"), CompileError::UnknownForm { .. }));
    assert!(matches!(err("(break 1)"), CompileError::UnknownForm { .. }));
}

#[test]
fn reader_errors_fail_compilation() {
    assert!(matches!(err("(1 2"), CompileError::UnbalancedParens));
    assert!(matches!(err("5x"), CompileError::BadName { .. }));
    assert!(matches!(err(""), CompileError::EmptyProgram));
}
