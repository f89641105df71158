//! Lowering: from the parse tree to virtual instructions.
//!
//! Every expression lowers to `(type, slot)`, where the slot is absent
//! exactly when the type is `void`. Sub-expressions may leave
//! temporaries above the named locals; statement positions discard them
//! so the stack holds locals only between statements.
//!
//! Functions declared next to each other (with no `var` between them)
//! are pre-scanned and registered before their bodies compile, which is
//! what makes sibling functions mutually recursive without forward
//! declarations.

use crate::compiler::func::{FuncId, Function, Unit};
use crate::compiler::instr::{BinOp, Const, Instr, UnOp};
use crate::error::CompileError;
use crate::types::{mangle, type_of_node, validate_type, CastKind, Scalar, TypeDef};
use crate::value::Value;
use smallvec::SmallVec;
use std::rc::Rc;

/// Lower a parsed program into the shared function table. The root must
/// be the implicit main wrapper the reader builds:
/// `(def (main int) () (do …))`.
pub fn lower_program(root: &Value) -> Result<Unit, CompileError> {
    let items = root.as_list().ok_or(CompileError::MalformedRoot)?;
    let main_sig = items.get(1).and_then(Value::as_list);
    let shaped = items.len() == 4
        && items[0].as_symbol() == Some("def")
        && main_sig.is_some_and(|sig| {
            sig.len() == 2
                && sig[0].as_symbol() == Some("main")
                && sig[1].as_symbol() == Some("int")
        })
        && items[2].as_list().is_some_and(|args| args.is_empty());
    if !shaped {
        return Err(CompileError::MalformedRoot);
    }

    let mut lowerer = Lowerer {
        funcs: Vec::new(),
        root: Function::new("", String::new(), TypeDef::VOID, 0, None),
    };
    let main = lowerer.scan_func(Host::Root, root)?;
    lowerer.lower_func(main, root)?;
    Ok(Unit {
        funcs: lowerer.funcs,
    })
}

/// Where a function definition is hosted: inside another function, or
/// at the top level (the pseudo-scope that holds only `main`).
#[derive(Debug, Clone, Copy)]
enum Host {
    Root,
    Func(FuncId),
}

struct Lowerer {
    /// The unit's function table; `main` lands at index 0.
    funcs: Vec<Function>,
    /// Level-0 holder of the outermost scope. Not part of the table.
    root: Function,
}

type Lowered = (TypeDef, Option<usize>);

impl Lowerer {
    fn fun(&mut self, f: FuncId) -> &mut Function {
        &mut self.funcs[f.0]
    }

    fn host(&self, host: Host) -> &Function {
        match host {
            Host::Func(id) => &self.funcs[id.0],
            Host::Root => &self.root,
        }
    }

    fn host_mut(&mut self, host: Host) -> &mut Function {
        match host {
            Host::Func(id) => &mut self.funcs[id.0],
            Host::Root => &mut self.root,
        }
    }

    /// Resolve a variable through the scope chain, then the enclosing
    /// function chain. Returns the owning function's level.
    fn resolve_var(&self, from: FuncId, name: &str) -> Result<(u32, TypeDef, usize), CompileError> {
        let mut host = Host::Func(from);
        loop {
            let func = self.host(host);
            if let Some((ty, slot)) = func.lookup_var(name) {
                return Ok((func.level, ty, slot));
            }
            host = match host {
                Host::Func(id) => match self.funcs[id.0].parent {
                    Some(parent) => Host::Func(parent),
                    None => Host::Root,
                },
                Host::Root => return Err(CompileError::undefined_name(name)),
            };
        }
    }

    /// Resolve a mangled function signature the same way.
    fn resolve_func(&self, from: FuncId, mangled: &str) -> Result<FuncId, CompileError> {
        let mut host = Host::Func(from);
        loop {
            if let Some(id) = self.host(host).lookup_func(mangled) {
                return Ok(id);
            }
            host = match host {
                Host::Func(id) => match self.funcs[id.0].parent {
                    Some(parent) => Host::Func(parent),
                    None => Host::Root,
                },
                Host::Root => return Err(CompileError::undefined_function(mangled)),
            };
        }
    }

    fn move_to(&mut self, f: FuncId, src: usize, dst: usize) -> usize {
        if src != dst {
            self.fun(f).emit(Instr::Mov { src, dst });
        }
        dst
    }

    /// Register a function's signature in its host scope before its body
    /// compiles, and create the table entry.
    fn scan_func(&mut self, host: Host, node: &Value) -> Result<FuncId, CompileError> {
        let items = node.as_list().expect("def nodes are lists");
        let sig = items[1]
            .as_list()
            .ok_or(CompileError::ExpectedName { form: "def" })?;
        let (name_node, rtype_tokens) = sig
            .split_first()
            .ok_or(CompileError::ExpectedName { form: "def" })?;
        let name = name_node
            .as_symbol()
            .ok_or(CompileError::ExpectedName { form: "def" })?;
        let return_type = validate_type(rtype_tokens)?;

        let params = items[2].as_list().ok_or(CompileError::BadArgumentName)?;
        let mut arg_types = Vec::with_capacity(params.len());
        for param in params {
            let fields = param.as_list().ok_or(CompileError::BadArgumentName)?;
            let (_, type_tokens) = fields
                .split_first()
                .ok_or(CompileError::MissingType)?;
            arg_types.push(validate_type(type_tokens)?);
        }

        let key = mangle(name, &arg_types);
        if self.host(host).top_scope().funcs.contains_key(&key) {
            return Err(CompileError::duplicate_function(key));
        }

        let level = self.host(host).level + 1;
        let parent = match host {
            Host::Func(id) => Some(id),
            Host::Root => None,
        };
        let id = FuncId(self.funcs.len());
        self.funcs
            .push(Function::new(name, key.clone(), return_type, level, parent));
        self.host_mut(host).top_scope_mut().funcs.insert(key, id);
        Ok(id)
    }

    /// Compile a function definition's body into its table entry.
    fn lower_func(&mut self, f: FuncId, node: &Value) -> Result<(), CompileError> {
        let items = node.as_list().expect("def nodes are lists");
        let params = items[2].as_list().expect("checked during scan");

        // arguments are the first named locals
        for param in params {
            let fields = param.as_list().expect("checked during scan");
            let name = match &fields[0] {
                Value::Symbol(name) => name,
                _ => return Err(CompileError::BadArgumentName),
            };
            let ty = validate_type(&fields[1..])?;
            if ty.is_void() {
                return Err(CompileError::BadArgumentType {
                    name: name.to_string(),
                });
            }
            self.fun(f).add_var(name, ty)?;
        }
        debug_assert_eq!(self.funcs[f.0].stack_top, params.len());

        let (body_type, var) = self.lower_expr(f, &items[3], false)?;
        let return_type = self.funcs[f.0].return_type;
        if !return_type.is_void() && return_type != body_type {
            return Err(CompileError::BodyTypeMismatch {
                expected: return_type.to_string(),
                got: body_type.to_string(),
            });
        }
        let src = if return_type.is_void() { None } else { var };
        self.fun(f).emit(Instr::Ret { src });
        Ok(())
    }

    /// Lower an expression and discard its temporaries: the stack either
    /// reverts to its height before the expression, or (at statement
    /// level) to the named locals only.
    fn lower_expr(
        &mut self,
        f: FuncId,
        node: &Value,
        allow_var: bool,
    ) -> Result<Lowered, CompileError> {
        if allow_var {
            debug_assert_eq!(self.funcs[f.0].stack_top, self.funcs[f.0].var_count);
        }
        let save = self.funcs[f.0].stack_top;

        let (ty, var) = self.lower_expr_tmp(f, node, allow_var)?;

        let func = self.fun(f);
        debug_assert!(var.is_none_or(|v| v < func.stack_top));
        func.stack_top = if allow_var { func.var_count } else { save };
        // The result is either a local, or the temporary just above the
        // restored top.
        debug_assert!(var.is_none_or(|v| v <= func.stack_top));
        Ok((ty, var))
    }

    /// Lower an expression, leaving its temporaries on the stack.
    fn lower_expr_tmp(
        &mut self,
        f: FuncId,
        node: &Value,
        allow_var: bool,
    ) -> Result<Lowered, CompileError> {
        let items = match node {
            Value::Int(_) | Value::Byte(_) | Value::Str(_) => return self.lower_const(f, node),
            Value::Symbol(name) => return self.lower_get_var(f, name),
            Value::List(items) => items,
        };
        let head = items.first().ok_or(CompileError::EmptyForm)?;
        let head_name = match head.as_symbol() {
            Some(name) => name,
            None => return Err(CompileError::unknown_form(head.to_string())),
        };

        if items.len() == 3 {
            if let Some(op) = BinOp::from_symbol(head_name) {
                return self.lower_binop(f, op, items);
            }
        }

        match (head_name, items.len()) {
            ("-", 2) | ("not", 2) => self.lower_unop(f, head_name, items),
            ("do", _) | ("then", _) | ("else", _) => self.lower_scope(f, items),
            ("var", 3) => {
                if !allow_var {
                    // Declarations are legal only as direct children of
                    // scopes and of `if`/`loop` conditions.
                    return Err(CompileError::VarNotAllowedHere);
                }
                self.lower_new_var(f, items)
            }
            ("set", 3) => self.lower_set_var(f, items),
            ("if", 3) | ("if", 4) | ("?", 3) | ("?", 4) => self.lower_cond(f, items),
            ("loop", 3) => self.lower_loop(f, items),
            ("break", 1) => {
                let target = self.funcs[f.0]
                    .top_scope()
                    .loop_end
                    .ok_or(CompileError::BreakOutsideLoop)?;
                self.fun(f).emit(Instr::Jmp { target });
                Ok((TypeDef::VOID, None))
            }
            ("continue", 1) => {
                let target = self.funcs[f.0]
                    .top_scope()
                    .loop_start
                    .ok_or(CompileError::ContinueOutsideLoop)?;
                self.fun(f).emit(Instr::Jmp { target });
                Ok((TypeDef::VOID, None))
            }
            ("call", n) if n >= 2 => self.lower_call(f, items),
            ("syscall", n) if n >= 2 => self.lower_syscall(f, items),
            ("return", 1) | ("return", 2) => self.lower_return(f, items),
            ("ptr", _) => self.lower_null_ptr(f, items),
            ("cast", 3) => self.lower_cast(f, items),
            ("peek", 2) | ("peek8", 2) => self.lower_peek(f, items, head_name == "peek8"),
            ("poke", 3) | ("poke8", 3) => self.lower_poke(f, items, head_name == "poke8"),
            ("ref", 2) => self.lower_ref(f, items),
            ("debug", 1) => {
                self.fun(f).emit(Instr::Debug);
                Ok((TypeDef::VOID, None))
            }
            _ => Err(CompileError::unknown_form(head_name)),
        }
    }

    fn lower_const(&mut self, f: FuncId, node: &Value) -> Result<Lowered, CompileError> {
        let (value, ty) = match node {
            Value::Int(v) => (Const::Int(*v), TypeDef::INT),
            Value::Byte(b) => (Const::Int(*b as i64), TypeDef::BYTE),
            Value::Str(s) => (Const::Str(Rc::clone(s)), TypeDef::BYTE_PTR),
            _ => unreachable!("only literals reach lower_const"),
        };
        let func = self.fun(f);
        let dst = func.tmp();
        func.emit(Instr::Const { value, dst });
        Ok((ty, Some(dst)))
    }

    fn lower_get_var(&mut self, f: FuncId, name: &str) -> Result<Lowered, CompileError> {
        let (level, ty, slot) = self.resolve_var(f, name)?;
        if level == self.funcs[f.0].level {
            // local: read in place, no move
            return Ok((ty, Some(slot)));
        }
        let func = self.fun(f);
        let dst = func.tmp();
        func.emit(Instr::GetEnv { level, slot, dst });
        Ok((ty, Some(dst)))
    }

    fn lower_binop(
        &mut self,
        f: FuncId,
        op: BinOp,
        items: &[Value],
    ) -> Result<Lowered, CompileError> {
        // Both operands may leave temporaries; the result replaces them.
        let save = self.funcs[f.0].stack_top;
        let (lt, lhs) = self.lower_expr_tmp(f, &items[1], false)?;
        let (rt, rhs) = self.lower_expr_tmp(f, &items[2], false)?;
        self.fun(f).stack_top = save;

        let mismatch = || CompileError::BinopTypeMismatch {
            op: op.text().to_string(),
            lhs: lt.to_string(),
            rhs: rt.to_string(),
        };
        let (Some(mut lhs), Some(mut rhs)) = (lhs, rhs) else {
            return Err(mismatch());
        };
        let (mut lt, mut rt) = (lt, rt);

        // rewrite `offset + ptr` into `ptr + offset`
        if op == BinOp::Add && lt == TypeDef::INT && rt.is_pointer() {
            std::mem::swap(&mut lt, &mut rt);
            std::mem::swap(&mut lhs, &mut rhs);
        }
        if matches!(op, BinOp::Add | BinOp::Sub) && lt.is_pointer() && rt == TypeDef::INT {
            // ptr ± offset, scaled by the element size
            let mut scale: i8 = if lt == TypeDef::BYTE_PTR { 1 } else { 8 };
            if op == BinOp::Sub {
                scale = -scale;
            }
            let func = self.fun(f);
            let dst = func.tmp();
            func.emit(Instr::Lea {
                base: lhs,
                index: rhs,
                scale,
                dst,
            });
            return Ok((lt, Some(dst)));
        }
        if op == BinOp::Sub && lt.is_pointer() && rt.is_pointer() {
            if lt != rt {
                return Err(CompileError::MixedPointerTypes {
                    lhs: lt.to_string(),
                    rhs: rt.to_string(),
                });
            }
            if lt != TypeDef::BYTE_PTR {
                return Err(CompileError::NotImplemented {
                    what: "subtraction of non-byte pointers",
                });
            }
            let func = self.fun(f);
            let dst = func.tmp();
            func.emit(Instr::Binop {
                op: BinOp::Sub,
                lhs,
                rhs,
                dst,
            });
            return Ok((TypeDef::INT, Some(dst)));
        }

        // same-scalar arithmetic, or comparisons of identical pointers
        let ints = lt == rt && !lt.is_pointer() && matches!(lt.scalar, Scalar::Int | Scalar::Byte);
        let ptr_cmp = lt == rt && lt.is_pointer() && op.is_comparison();
        if !(ints || ptr_cmp) {
            return Err(mismatch());
        }
        if matches!(op, BinOp::And | BinOp::Or) && lt != TypeDef::INT {
            return Err(mismatch());
        }

        let result_type = if op.is_comparison() { TypeDef::INT } else { lt };
        let byte = lt == TypeDef::BYTE;
        let func = self.fun(f);
        let dst = func.tmp();
        func.emit(if byte {
            Instr::Binop8 { op, lhs, rhs, dst }
        } else {
            Instr::Binop { op, lhs, rhs, dst }
        });
        Ok((result_type, Some(dst)))
    }

    fn lower_unop(
        &mut self,
        f: FuncId,
        op_name: &str,
        items: &[Value],
    ) -> Result<Lowered, CompileError> {
        let (ty, src) = self.lower_expr(f, &items[1], false)?;
        let mismatch = || CompileError::UnopTypeMismatch {
            op: op_name.to_string(),
            operand: ty.to_string(),
        };
        let Some(src) = src else { return Err(mismatch()) };

        if op_name == "-" {
            if ty.is_pointer() || !matches!(ty.scalar, Scalar::Int | Scalar::Byte) {
                return Err(mismatch());
            }
            let byte = ty == TypeDef::BYTE;
            let func = self.fun(f);
            let dst = func.tmp();
            func.emit(if byte {
                Instr::Unop8 {
                    op: UnOp::Neg,
                    src,
                    dst,
                }
            } else {
                Instr::Unop {
                    op: UnOp::Neg,
                    src,
                    dst,
                }
            });
            Ok((ty, Some(dst)))
        } else {
            // `not` accepts int, byte, or any pointer; the result is the
            // canonical boolean
            if ty.is_void() {
                return Err(mismatch());
            }
            let func = self.fun(f);
            let dst = func.tmp();
            func.emit(Instr::Unop {
                op: UnOp::Not,
                src,
                dst,
            });
            Ok((TypeDef::INT, Some(dst)))
        }
    }

    fn lower_scope(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        self.fun(f).scope_enter();
        let mut result: Lowered = (TypeDef::VOID, None);

        // split the body into groups delimited by `var` statements
        let mut groups: Vec<Vec<&Value>> = vec![Vec::new()];
        for kid in &items[1..] {
            groups.last_mut().expect("never empty").push(kid);
            if kid.head() == Some("var") {
                groups.push(Vec::new());
            }
        }

        for group in &groups {
            // pre-scan definitions: every function in the group is
            // visible before any body in the group compiles
            let mut scanned = std::collections::VecDeque::new();
            for kid in group.iter().filter(|kid| is_def(kid)) {
                scanned.push_back(self.scan_func(Host::Func(f), kid)?);
            }
            for kid in group {
                if is_def(kid) {
                    let id = scanned.pop_front().expect("one scan per def");
                    self.lower_func(id, kid)?;
                    result = (TypeDef::VOID, None);
                } else {
                    result = self.lower_expr(f, kid, true)?;
                }
            }
        }

        self.fun(f).scope_leave();

        // the scope's value is either a surviving local or a fresh
        // temporary above the restored stack
        let (ty, var) = result;
        if let Some(v) = var {
            if v >= self.funcs[f.0].stack_top {
                let dst = self.fun(f).tmp();
                return Ok((ty, Some(self.move_to(f, v, dst))));
            }
        }
        Ok((ty, var))
    }

    fn lower_new_var(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let name = match &items[1] {
            Value::Symbol(name) => Rc::clone(name),
            _ => return Err(CompileError::ExpectedName { form: "var" }),
        };
        let (ty, var) = self.lower_expr(f, &items[2], false)?;
        let Some(var) = var else {
            return Err(CompileError::VoidInitializer {
                name: name.to_string(),
            });
        };
        let dst = self.fun(f).add_var(&name, ty)?;
        Ok((ty, Some(self.move_to(f, var, dst))))
    }

    fn lower_set_var(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let name = items[1]
            .as_symbol()
            .ok_or(CompileError::ExpectedName { form: "set" })?;
        let (level, expected, dst) = self.resolve_var(f, name)?;
        let (ty, var) = self.lower_expr(f, &items[2], false)?;
        if ty != expected {
            return Err(CompileError::SetTypeMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                got: ty.to_string(),
            });
        }
        let var = var.expect("variables are never void");

        if level == self.funcs[f.0].level {
            Ok((expected, Some(self.move_to(f, var, dst))))
        } else {
            self.fun(f).emit(Instr::SetEnv {
                level,
                slot: dst,
                src: var,
            });
            let tmp = self.fun(f).tmp();
            Ok((expected, Some(self.move_to(f, var, tmp))))
        }
    }

    fn lower_cond(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let has_else = items.len() == 4;
        let (l_true, l_false) = {
            let func = self.fun(f);
            (func.new_label(), func.new_label())
        };
        // a variable declaration is allowed in the condition
        self.fun(f).scope_enter();

        let (cond_type, cond) = self.lower_expr(f, &items[1], true)?;
        if cond_type.is_void() {
            return Err(CompileError::VoidCondition);
        }
        let cond = cond.expect("non-void condition has a slot");
        self.fun(f).emit(Instr::Jmpf {
            cond,
            target: l_false,
        });

        // both branches park their value at the same fixed position
        let (then_type, then_var) = self.lower_expr(f, &items[2], false)?;
        if let Some(v) = then_var {
            let top = self.funcs[f.0].stack_top;
            self.move_to(f, v, top);
        }

        let (mut else_type, mut else_var) = (TypeDef::VOID, None);
        if has_else {
            self.fun(f).emit(Instr::Jmp { target: l_true });
        }
        self.fun(f).set_label(l_false);
        if has_else {
            let (ty, var) = self.lower_expr(f, &items[3], false)?;
            else_type = ty;
            else_var = var;
            if let Some(v) = var {
                let top = self.funcs[f.0].stack_top;
                self.move_to(f, v, top);
            }
        }
        self.fun(f).set_label(l_true);

        self.fun(f).scope_leave();
        if then_var.is_none() || else_var.is_none() || then_type != else_type {
            // branches disagree: the conditional yields nothing
            Ok((TypeDef::VOID, None))
        } else {
            Ok((then_type, Some(self.fun(f).tmp())))
        }
    }

    fn lower_loop(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let (start, end) = {
            let func = self.fun(f);
            let start = func.new_label();
            let end = func.new_label();
            (start, end)
        };
        {
            let scope = self.fun(f).top_scope_mut();
            scope.loop_start = Some(start);
            scope.loop_end = Some(end);
        }

        self.fun(f).scope_enter();
        self.fun(f).set_label(start);
        let (_, cond) = self.lower_expr(f, &items[1], true)?;
        let Some(cond) = cond else {
            return Err(CompileError::VoidCondition);
        };
        self.fun(f).emit(Instr::Jmpf { cond, target: end });
        self.lower_expr(f, &items[2], false)?;
        self.fun(f).emit(Instr::Jmp { target: start });
        self.fun(f).set_label(end);
        self.fun(f).scope_leave();

        Ok((TypeDef::VOID, None))
    }

    fn lower_call(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let name = items[1]
            .as_symbol()
            .ok_or(CompileError::ExpectedName { form: "call" })?;

        // arguments land in contiguous temporaries; their first slot
        // becomes the callee's frame base
        let mut arg_types = Vec::with_capacity(items.len() - 2);
        for kid in &items[2..] {
            let (ty, var) = self.lower_expr(f, kid, false)?;
            let Some(var) = var else {
                return Err(CompileError::VoidCallArgument);
            };
            arg_types.push(ty);
            let dst = self.fun(f).tmp();
            self.move_to(f, var, dst);
        }
        self.fun(f).stack_top -= arg_types.len();

        let key = mangle(name, &arg_types);
        let callee = self.resolve_func(f, &key)?;
        let (callee_level, return_type) = {
            let callee = &self.funcs[callee.0];
            (callee.level, callee.return_type)
        };
        let caller_level = self.funcs[f.0].level;
        let arg_base = self.funcs[f.0].stack_top;
        self.fun(f).emit(Instr::Call {
            func: callee,
            arg_base,
            caller_level,
            callee_level,
        });

        if return_type.is_void() {
            Ok((return_type, None))
        } else {
            // the return value arrives in the callee's slot 0, which is
            // the caller's next temporary
            Ok((return_type, Some(self.fun(f).tmp())))
        }
    }

    fn lower_syscall(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let num = match &items[1] {
            Value::Int(n) if (0..=i64::from(i32::MAX)).contains(n) => *n,
            Value::Byte(b) => i64::from(*b),
            _ => return Err(CompileError::BadSyscallNumber),
        };

        let save = self.funcs[f.0].stack_top;
        let mut args: SmallVec<[usize; 6]> = SmallVec::new();
        for kid in &items[2..] {
            let (ty, var) = self.lower_expr_tmp(f, kid, false)?;
            if ty.is_void() {
                return Err(CompileError::VoidSyscallArgument);
            }
            args.push(var.expect("non-void argument has a slot"));
        }
        if args.len() > 6 {
            return Err(CompileError::TooManySyscallArgs { got: args.len() });
        }
        self.fun(f).stack_top = save;

        let dst = self.funcs[f.0].stack_top;
        self.fun(f).emit(Instr::Syscall { dst, num, args });
        Ok((TypeDef::INT, Some(self.fun(f).tmp())))
    }

    fn lower_return(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let (ty, var) = if items.len() == 2 {
            self.lower_expr_tmp(f, &items[1], false)?
        } else {
            (TypeDef::VOID, None)
        };
        let expected = self.funcs[f.0].return_type;
        if ty != expected {
            return Err(CompileError::ReturnTypeMismatch {
                expected: expected.to_string(),
                got: ty.to_string(),
            });
        }
        self.fun(f).emit(Instr::Ret { src: var });
        Ok((ty, var))
    }

    fn lower_null_ptr(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let ty = validate_type(items)?;
        let func = self.fun(f);
        let dst = func.tmp();
        func.emit(Instr::Const {
            value: Const::Int(0),
            dst,
        });
        Ok((ty, Some(dst)))
    }

    fn lower_cast(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let to = type_of_node(&items[1])?;
        let (from, var) = self.lower_expr_tmp(f, &items[2], false)?;
        match from.cast_to(to) {
            Some(CastKind::Free) => Ok((to, var)),
            Some(CastKind::Truncate) => {
                let slot = var.expect("int expressions have a slot");
                self.fun(f).emit(Instr::Cast8 { slot });
                Ok((to, var))
            }
            None => Err(CompileError::bad_cast(from.to_string(), to.to_string())),
        }
    }

    fn lower_peek(
        &mut self,
        f: FuncId,
        items: &[Value],
        byte_only: bool,
    ) -> Result<Lowered, CompileError> {
        let (ty, ptr) = self.lower_expr(f, &items[1], false)?;
        if !ty.is_pointer() {
            return Err(CompileError::NotAPointer {
                got: ty.to_string(),
            });
        }
        if byte_only && ty != TypeDef::BYTE_PTR {
            return Err(CompileError::PointerMismatch {
                expected: TypeDef::BYTE_PTR.to_string(),
                got: ty.to_string(),
            });
        }
        let ptr = ptr.expect("pointers are never void");
        let pointee = ty.pointee();
        let func = self.fun(f);
        let dst = func.stack_top;
        func.emit(if pointee == TypeDef::BYTE {
            Instr::Peek8 { ptr, dst }
        } else {
            Instr::Peek { ptr, dst }
        });
        Ok((pointee, Some(func.tmp())))
    }

    fn lower_poke(
        &mut self,
        f: FuncId,
        items: &[Value],
        byte_only: bool,
    ) -> Result<Lowered, CompileError> {
        // evaluation order: value first, then pointer
        let save = self.funcs[f.0].stack_top;
        let (value_type, value) = self.lower_expr_tmp(f, &items[2], false)?;
        let (ptr_type, ptr) = self.lower_expr_tmp(f, &items[1], false)?;
        if value_type.is_void() || ptr_type != value_type.ptr_to() {
            return Err(CompileError::PointerMismatch {
                expected: value_type.ptr_to().to_string(),
                got: ptr_type.to_string(),
            });
        }
        if byte_only && value_type != TypeDef::BYTE {
            return Err(CompileError::PointerMismatch {
                expected: TypeDef::BYTE_PTR.to_string(),
                got: ptr_type.to_string(),
            });
        }
        self.fun(f).stack_top = save;

        let value = value.expect("checked non-void");
        let ptr = ptr.expect("pointers are never void");
        let byte = value_type == TypeDef::BYTE;
        self.fun(f).emit(if byte {
            Instr::Poke8 { ptr, src: value }
        } else {
            Instr::Poke { ptr, src: value }
        });
        let dst = self.fun(f).tmp();
        Ok((value_type, Some(self.move_to(f, value, dst))))
    }

    fn lower_ref(&mut self, f: FuncId, items: &[Value]) -> Result<Lowered, CompileError> {
        let name = items[1]
            .as_symbol()
            .ok_or(CompileError::ExpectedName { form: "ref" })?;
        let (level, ty, slot) = self.resolve_var(f, name)?;
        let func = self.fun(f);
        let dst = func.tmp();
        if level == func.level {
            func.emit(Instr::RefVar { slot, dst });
        } else {
            func.emit(Instr::RefEnv { level, slot, dst });
        }
        Ok((ty.ptr_to(), Some(dst)))
    }
}

fn is_def(node: &Value) -> bool {
    node.head() == Some("def") && node.as_list().is_some_and(|items| items.len() == 4)
}
