//! Per-function compiler state and the unit-wide function table.
//!
//! Nested functions all live in one `Vec<Function>` owned by the unit;
//! parent links and call targets are indices into that vector, so the
//! function/scope graph stays acyclic in ownership terms.

use crate::compiler::instr::{Instr, Label};
use crate::compiler::scope::Scope;
use crate::error::CompileError;
use crate::types::TypeDef;
use std::fmt::Write as _;
use std::rc::Rc;

/// Index into the unit's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub usize);

/// One function under compilation: its code, labels, scope stack, and
/// virtual-stack accounting.
#[derive(Debug, Clone)]
pub struct Function {
    /// Bare name, e.g. `fact`.
    pub name: String,
    /// Mangled signature, e.g. `fact(int)`. Unique per scope.
    pub signature: String,
    /// Lexical nesting level; `main` is 1.
    pub level: u32,
    /// The lexically enclosing function, if any.
    pub parent: Option<FuncId>,
    pub return_type: TypeDef,
    /// The virtual instruction list, append-only.
    pub code: Vec<Instr>,
    /// Label id → instruction index, filled as labels are placed.
    pub labels: Vec<Option<usize>>,
    /// Count of live slots (named locals plus temporaries).
    pub stack_top: usize,
    /// Count of named locals.
    pub var_count: usize,
    /// Scope stack; never empty once the function exists.
    scopes: Vec<Scope>,
}

impl Function {
    pub fn new(
        name: &str,
        signature: String,
        return_type: TypeDef,
        level: u32,
        parent: Option<FuncId>,
    ) -> Function {
        Function {
            name: name.to_string(),
            signature,
            level,
            parent,
            return_type,
            code: Vec::new(),
            labels: Vec::new(),
            stack_top: 0,
            var_count: 0,
            scopes: vec![Scope::default()],
        }
    }

    pub fn emit(&mut self, instr: Instr) {
        self.code.push(instr);
    }

    /// Enter a child scope, recording the current stack height.
    pub fn scope_enter(&mut self) {
        let child = Scope::child_of(self.top_scope(), self.stack_top);
        self.scopes.push(child);
    }

    /// Leave the current scope: revert the stack and drop its locals.
    pub fn scope_leave(&mut self) {
        let scope = self.scopes.pop().expect("scope stack underflow");
        debug_assert!(scope.saved_stack_top <= self.stack_top);
        self.stack_top = scope.saved_stack_top;
        self.var_count -= scope.n_local;
    }

    pub fn top_scope(&self) -> &Scope {
        self.scopes.last().expect("scope stack is never empty")
    }

    pub fn top_scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    /// Declare a named local in the current scope and allocate its slot.
    pub fn add_var(&mut self, name: &Rc<str>, ty: TypeDef) -> Result<usize, CompileError> {
        // Named locals may only be created at statement level, where the
        // stack holds locals only.
        debug_assert_eq!(self.stack_top, self.var_count);
        let slot = self.var_count;
        let scope = self.top_scope_mut();
        if scope.vars.contains_key(name) {
            return Err(CompileError::duplicate_name(name.as_ref()));
        }
        scope.vars.insert(Rc::clone(name), (ty, slot));
        scope.n_local += 1;
        self.var_count += 1;
        self.stack_top += 1;
        Ok(slot)
    }

    /// Allocate a temporary on the stack top.
    pub fn tmp(&mut self) -> usize {
        let slot = self.stack_top;
        self.stack_top += 1;
        slot
    }

    /// Allocate a fresh label id, unplaced.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Place a label at the current end of the instruction list.
    pub fn set_label(&mut self, label: Label) {
        let idx = label.0 as usize;
        debug_assert!(idx < self.labels.len());
        self.labels[idx] = Some(self.code.len());
    }

    /// Search this function's scope chain for a variable.
    pub fn lookup_var(&self, name: &str) -> Option<(TypeDef, usize)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name).copied())
    }

    /// Search this function's scope chain for a function signature.
    pub fn lookup_func(&self, mangled: &str) -> Option<FuncId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.funcs.get(mangled).copied())
    }
}

/// A fully lowered compilation unit: the shared function table, `main`
/// at index 0.
#[derive(Debug)]
pub struct Unit {
    pub funcs: Vec<Function>,
}

impl Unit {
    /// Render the virtual instructions of every function as text, the
    /// format `--print-ir` shows and the golden tests compare.
    pub fn dump_ir(&self) -> String {
        let mut out = String::new();
        for (i, func) in self.funcs.iter().enumerate() {
            let _ = writeln!(out, "func{}:", i);
            let mut labels_at = vec![Vec::new(); func.code.len() + 1];
            for (label, pos) in func.labels.iter().enumerate() {
                if let Some(pos) = pos {
                    labels_at[*pos].push(label);
                }
            }
            for (pos, instr) in func.code.iter().enumerate() {
                for label in &labels_at[pos] {
                    let _ = writeln!(out, "L{}:", label);
                }
                let _ = writeln!(out, "    {}", instr);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Function {
        Function::new("f", "f()".to_string(), TypeDef::INT, 1, None)
    }

    #[test]
    fn scope_discipline_restores_stack() {
        let mut f = sample();
        let a: Rc<str> = Rc::from("a");
        f.add_var(&a, TypeDef::INT).unwrap();
        assert_eq!((f.stack_top, f.var_count), (1, 1));

        f.scope_enter();
        let b: Rc<str> = Rc::from("b");
        f.add_var(&b, TypeDef::INT).unwrap();
        f.tmp();
        f.tmp();
        assert_eq!((f.stack_top, f.var_count), (4, 2));

        f.scope_leave();
        assert_eq!((f.stack_top, f.var_count), (1, 1));
        assert_eq!(f.lookup_var("b"), None);
        assert!(f.lookup_var("a").is_some());
    }

    #[test]
    fn shadowing_resolves_innermost() {
        let mut f = sample();
        let x: Rc<str> = Rc::from("x");
        f.add_var(&x, TypeDef::INT).unwrap();
        f.scope_enter();
        f.add_var(&x, TypeDef::BYTE).unwrap();
        assert_eq!(f.lookup_var("x"), Some((TypeDef::BYTE, 1)));
        f.scope_leave();
        assert_eq!(f.lookup_var("x"), Some((TypeDef::INT, 0)));
    }

    #[test]
    fn duplicate_in_same_scope_rejected() {
        let mut f = sample();
        let x: Rc<str> = Rc::from("x");
        f.add_var(&x, TypeDef::INT).unwrap();
        assert!(matches!(
            f.add_var(&x, TypeDef::INT),
            Err(CompileError::DuplicateName { .. })
        ));
    }
}
