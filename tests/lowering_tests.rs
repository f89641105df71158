//! Golden tests for lowering: source in, virtual-instruction dump out.

use sable::compile;

fn dump(source: &str) -> String {
    compile(source).unwrap().dump_ir()
}

fn assert_ir(source: &str, expected: &str) {
    let got = dump(source);
    assert_eq!(
        got.split_whitespace().collect::<Vec<_>>(),
        expected.split_whitespace().collect::<Vec<_>>(),
        "IR mismatch for {:?}\n{}",
        source,
        got
    );
}

#[test]
fn single_constant() {
    assert_ir(
        "1",
        "func0:
            const 1 0
            ret 0",
    );
}

#[test]
fn consecutive_statements_reuse_slots() {
    assert_ir(
        "1 3",
        "func0:
            const 1 0
            const 3 0
            ret 0",
    );
}

#[test]
fn nested_arithmetic() {
    assert_ir(
        "(+ (- 1 2) 3)",
        "func0:
            const 1 0
            const 2 1
            binop - 0 1 0
            const 3 1
            binop + 0 1 0
            ret 0",
    );
}

#[test]
fn explicit_return_keeps_implicit_one() {
    assert_ir(
        "(return 1)",
        "func0:
            const 1 0
            ret 0
            ret 0",
    );
}

#[test]
fn conditional_with_both_branches() {
    assert_ir(
        "(if 1 2 3)",
        "func0:
            const 1 0
            jmpf 0 L1
            const 2 0
            jmp L0
        L1:
            const 3 0
        L0:
            ret 0",
    );
}

#[test]
fn conditional_with_return_in_branch() {
    assert_ir(
        "(if 1 (return 2)) 0",
        "func0:
            const 1 0
            jmpf 0 L1
            const 2 0
            ret 0
        L0:
        L1:
            const 0 0
            ret 0",
    );
}

#[test]
fn loop_with_break_and_continue() {
    assert_ir(
        "(loop (var a 1) (do
            (var b a)
            (if (gt a 11)
                (break))
            (var c (set a (+ 2 b)))
            (if (lt c 100)
                (continue))
            (set b 5)
        ))
        0",
        "func0:
        L0:
            const 1 0
            jmpf 0 L1
            mov 0 1
            const 11 2
            binop gt 0 2 2
            jmpf 2 L3
            jmp L1
        L2:
        L3:
            const 2 2
            binop + 2 1 2
            mov 2 0
            mov 0 2
            const 100 3
            binop lt 2 3 3
            jmpf 3 L5
            jmp L0
        L4:
        L5:
            const 5 3
            mov 3 1
            jmp L0
        L1:
            const 0 0
            ret 0",
    );
}

#[test]
fn variables_and_assignment() {
    assert_ir(
        "(var a 1) (set a (+ 3 a)) (var b 2) (- b a)",
        "func0:
            const 1 0
            const 3 1
            binop + 1 0 1
            mov 1 0
            const 2 1
            binop - 1 0 2
            mov 2 0
            ret 0",
    );
}

#[test]
fn return_of_expression_with_local() {
    assert_ir(
        "(var a 1) (return (+ 3 a))",
        "func0:
            const 1 0
            const 3 1
            binop + 1 0 1
            ret 1
            mov 1 0
            ret 0",
    );
}

#[test]
fn trailing_expression_moves_to_scope_result() {
    assert_ir(
        "(var a 1) (+ 3 a)",
        "func0:
            const 1 0
            const 3 1
            binop + 1 0 1
            mov 1 0
            ret 0",
    );
}

#[test]
fn recursive_function_call() {
    assert_ir(
        "(def (fib int) ((n int)) (if (le n 0) (then 0) (else (call fib (- n 1)))))
         (call fib 5)",
        "func0:
            const 5 0
            call 1 0 1 2
            ret 0
        func1:
            const 0 1
            binop le 0 1 1
            jmpf 1 L1
            const 0 1
            jmp L0
        L1:
            const 1 1
            binop - 0 1 1
            call 1 1 2 2
        L0:
            ret 1",
    );
}

#[test]
fn nested_functions_capture_through_env() {
    assert_ir(
        "(var b 456)
         (def (f void) () (do
             (var a 123)
             (def (g void) () (do
                 (set a (+ b a))
             ))
             (call g)
         ))
         (call f)
         0",
        "func0:
            const 456 0
            call 1 1 1 2
            const 0 1
            mov 1 0
            ret 0
        func1:
            const 123 0
            call 2 1 2 3
            ret -1
        func2:
            get_env 1 0 0
            get_env 2 0 1
            binop + 0 1 0
            set_env 2 0 0
            ret -1",
    );
}

#[test]
fn pointer_poke_and_peek() {
    assert_ir(
        "(var p (ptr int))
         (poke (cast (ptr byte) p) 124u8)
         (peek (cast (ptr byte) p))
         (poke p 123)",
        "func0:
            const 0 0
            const 124 1
            poke8 0 1
            peek8 0 1
            const 123 1
            poke 0 1
            mov 1 0
            ret 0",
    );
}

#[test]
fn string_constants_render_quoted() {
    let ir = dump("(var s \"hi\") (return 0)");
    assert!(ir.contains("const \"hi\" 0"), "{}", ir);
}

#[test]
fn pointer_arithmetic_scales_by_element() {
    let ir = dump("(var p (ptr int)) (var q (+ p 2)) (return 0)");
    assert!(ir.contains("lea 0 1 8 1"), "{}", ir);
    let ir = dump("(var p (ptr byte)) (var q (- p 2)) (return 0)");
    assert!(ir.contains("lea 0 1 -1 1"), "{}", ir);
    let ir = dump("(var p (ptr int)) (var q (+ 2 p)) (return 0)");
    // offset + ptr canonicalizes to ptr + offset
    assert!(ir.contains("lea 0 1 8 1"), "{}", ir);
}

#[test]
fn overloads_dispatch_by_argument_type() {
    let unit = compile(
        "(def (f int) ((x int)) 1)
         (def (f int) ((x byte)) 2)
         (return (+ (call f 9) (call f 9u8)))",
    )
    .unwrap();
    assert_eq!(unit.funcs.len(), 3);
    assert_eq!(unit.funcs[1].signature, "f(int)");
    assert_eq!(unit.funcs[2].signature, "f(byte)");
    let ir = unit.dump_ir();
    assert!(ir.contains("call 1 0 1 2"), "{}", ir);
    assert!(ir.contains("call 2 1 1 2"), "{}", ir);
}

#[test]
fn sibling_functions_in_one_group_see_each_other() {
    let unit = compile(
        "(def (even int) ((n int)) (if (eq n 0) 1 (call odd (- n 1))))
         (def (odd int) ((n int)) (if (eq n 0) 0 (call even (- n 1))))
         (return (call even 10))",
    )
    .unwrap();
    assert_eq!(unit.funcs.len(), 3);
}

#[test]
fn var_statement_splits_visibility_groups() {
    // `odd` is declared after the `var`, so `even` cannot see it.
    let err = compile(
        "(def (even int) ((n int)) (if (eq n 0) 1 (call odd (- n 1))))
         (var cut 0)
         (def (odd int) ((n int)) (if (eq n 0) 0 (call even (- n 1))))
         (return (call even 10))",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        sable::CompileError::UndefinedFunction { .. }
    ));
}

#[test]
fn functions_from_earlier_groups_stay_visible() {
    compile(
        "(def (f int) () 7)
         (var x 1)
         (return (+ x (call f)))",
    )
    .unwrap();
}

#[test]
fn stack_discipline_holds_at_function_end() {
    // After lowering, each function's stack holds exactly its named
    // arguments again: every scope restored what it saved.
    let unit = compile(
        "(var a 1)
         (def (f int) ((x int) (y int)) (do
             (var t (+ x y))
             (if (gt t 0) (then t) (else (- 0 t)))
         ))
         (loop (lt a 3) (set a (+ a 1)))
         (return (call f a 2))",
    )
    .unwrap();
    for func in &unit.funcs {
        assert_eq!(func.stack_top, func.var_count);
    }
    assert_eq!(unit.funcs[1].var_count, 2);
}

#[test]
fn conditional_without_else_is_void() {
    let err = compile("(var x (if 1 2)) (return x)").unwrap_err();
    assert!(matches!(err, sable::CompileError::VoidInitializer { .. }));
}

#[test]
fn question_mark_is_if() {
    assert_ir(
        "(? 1 2 3)",
        "func0:
            const 1 0
            jmpf 0 L1
            const 2 0
            jmp L0
        L1:
            const 3 0
        L0:
            ret 0",
    );
}
