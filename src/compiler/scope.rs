//! Name scopes within a function.
//!
//! Scopes form a per-function stack. Each scope owns the names declared
//! in it and remembers how tall the virtual stack was on entry so the
//! stack can be reverted on exit. Loop labels propagate downward: a
//! child scope starts with its parent's nearest loop targets.

use crate::compiler::func::FuncId;
use crate::compiler::instr::Label;
use crate::types::TypeDef;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// One scope level.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Local variables declared here: name → (type, slot index).
    pub vars: FxHashMap<Rc<str>, (TypeDef, usize)>,
    /// Functions declared here, keyed by mangled signature.
    pub funcs: FxHashMap<String, FuncId>,
    /// Number of named locals declared in this scope.
    pub n_local: usize,
    /// `stack_top` at scope entry; restored on exit.
    pub saved_stack_top: usize,
    /// Jump targets of the nearest enclosing loop, if any.
    pub loop_start: Option<Label>,
    pub loop_end: Option<Label>,
}

impl Scope {
    /// A child scope: empty, but inheriting the loop targets and the
    /// current stack height.
    pub fn child_of(parent: &Scope, stack_top: usize) -> Scope {
        Scope {
            saved_stack_top: stack_top,
            loop_start: parent.loop_start,
            loop_end: parent.loop_end,
            ..Scope::default()
        }
    }
}
