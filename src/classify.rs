//! Variable-flow classification over a statement list.
//!
//! One recursive traversal partitions every variable reference into five
//! insertion-ordered sets. The traversal carries an explicit [`Mode`]
//! value instead of dispatching on visitor subclasses; assignment targets
//! are intercepted in a sub-step of the expression walk. Reference order
//! matters because parameter order in generated code follows
//! first-appearance order in the source.

use indexmap::IndexSet;
use tracing::debug;

use crate::ast::{Block, Expr, ExprKind, ForInit, Module, Stmt, StmtKind, VarId};

/// Insertion-ordered duplicate-free set of variables.
pub type VarSet = IndexSet<VarId>;

/// Traversal mode, switched on entering specific constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Top-level sequential code.
    Default,
    /// Non-repeatable nested scope, e.g. an if/else arm.
    InnerBlock,
    /// Loop body; may execute zero or many times.
    Repeatable,
    /// Closure body; repeatable, and owns its parameters.
    ClosureRepeatable,
}

impl Mode {
    /// True for the modes in which assignments feed the outflow sets.
    fn is_repeatable(self) -> bool {
        matches!(self, Mode::Repeatable | Mode::ClosureRepeatable)
    }

    /// Mode for a nested non-repeatable block (if/else arm, bare block).
    fn inner(self) -> Mode {
        match self {
            Mode::Default => Mode::InnerBlock,
            other => other,
        }
    }

    /// Mode for a loop body entered from this mode.
    fn repeatable(self) -> Mode {
        match self {
            Mode::ClosureRepeatable => Mode::ClosureRepeatable,
            _ => Mode::Repeatable,
        }
    }
}

/// The five classification sets produced by one traversal.
#[derive(Debug, Clone, Default)]
pub struct ClassificationSets {
    /// Variables declared at the fragment's top level.
    pub declared: VarSet,
    /// Variables declared in a nested block, loop header, or closure
    /// parameter list (including seeds from the selection resolver).
    pub declared_in_nested_block: VarSet,
    /// Variables read before any local declaration; these flow in.
    pub used: VarSet,
    /// Variables whose mutated value must flow back out.
    pub assigned_or_returned: VarSet,
    /// Variables read before being rewritten inside a repeatable
    /// construct; their pre-construct value is also required as input.
    pub loop_carried: VarSet,
}

impl ClassificationSets {
    fn is_locally_declared(&self, var: VarId, mode: Mode) -> bool {
        match mode {
            Mode::Default => self.declared.contains(&var),
            _ => self.declared.contains(&var) || self.declared_in_nested_block.contains(&var),
        }
    }
}

/// Classifies variable references in statement lists of one module.
pub struct VariableClassifier<'m> {
    module: &'m Module,
}

impl<'m> VariableClassifier<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self { module }
    }

    /// Classify `statements` starting in `mode`, with `seed` variables
    /// (loop variables and closure parameters of enclosing constructs)
    /// pre-recorded as declared in a nested block.
    pub fn classify(&self, statements: &[&Stmt], mode: Mode, seed: &[VarId]) -> ClassificationSets {
        let mut sets = ClassificationSets::default();
        for &var in seed {
            sets.declared_in_nested_block.insert(var);
        }
        for stmt in statements {
            self.visit_stmt(stmt, mode, &mut sets);
        }
        debug!(
            used = sets.used.len(),
            assigned = sets.assigned_or_returned.len(),
            loop_carried = sets.loop_carried.len(),
            names = ?sets.used.iter().map(|v| self.module.var_name(*v)).collect::<Vec<_>>(),
            "classification complete"
        );
        sets
    }

    fn declare(&self, var: VarId, mode: Mode, sets: &mut ClassificationSets) {
        if sets.declared.contains(&var) || sets.declared_in_nested_block.contains(&var) {
            return;
        }
        match mode {
            Mode::Default => sets.declared.insert(var),
            _ => sets.declared_in_nested_block.insert(var),
        };
    }

    fn read(&self, var: VarId, mode: Mode, sets: &mut ClassificationSets) {
        if !sets.is_locally_declared(var, mode) {
            sets.used.insert(var);
        }
    }

    /// The assignment sub-step applied to a direct variable target after
    /// its right-hand side (and, for compound forms, its own read) has
    /// been visited.
    fn assign(&self, var: VarId, mode: Mode, sets: &mut ClassificationSets) {
        if mode.is_repeatable() {
            // the target existed before the construct iff it is not one of
            // the construct's own declarations
            if !sets.declared_in_nested_block.contains(&var) {
                sets.assigned_or_returned.insert(var);
            }
            if sets.used.contains(&var) {
                sets.loop_carried.insert(var);
            }
        } else if !sets.declared.contains(&var) && !sets.declared_in_nested_block.contains(&var) {
            sets.assigned_or_returned.insert(var);
        }
    }

    fn visit_block(&self, block: &Block, mode: Mode, sets: &mut ClassificationSets) {
        for stmt in &block.statements {
            self.visit_stmt(stmt, mode, sets);
        }
    }

    fn visit_stmt(&self, stmt: &Stmt, mode: Mode, sets: &mut ClassificationSets) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.visit_expr(e, mode, sets),
            StmtKind::VarDecl(decls) => {
                for d in decls {
                    if let Some(init) = &d.init {
                        self.visit_expr(init, mode, sets);
                    }
                    self.declare(d.var, mode, sets);
                }
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.visit_expr(cond, mode, sets);
                self.visit_block(then_block, mode.inner(), sets);
                if let Some(e) = else_block {
                    self.visit_block(e, mode.inner(), sets);
                }
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(cond, mode.repeatable(), sets);
                self.visit_block(body, mode.repeatable(), sets);
            }
            StmtKind::DoWhile { body, cond } => {
                self.visit_block(body, mode.repeatable(), sets);
                self.visit_expr(cond, mode.repeatable(), sets);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::Decl(decls)) => {
                        for d in decls {
                            if let Some(e) = &d.init {
                                self.visit_expr(e, mode, sets);
                            }
                            sets.declared_in_nested_block.insert(d.var);
                        }
                    }
                    Some(ForInit::Exprs(exprs)) => {
                        for e in exprs {
                            self.visit_expr(e, mode, sets);
                        }
                    }
                    None => {}
                }
                let inner = mode.repeatable();
                if let Some(c) = cond {
                    self.visit_expr(c, inner, sets);
                }
                for e in update {
                    self.visit_expr(e, inner, sets);
                }
                self.visit_block(body, inner, sets);
            }
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                self.visit_expr(iterable, mode, sets);
                sets.declared_in_nested_block.insert(*var);
                self.visit_block(body, mode.repeatable(), sets);
            }
            StmtKind::Return(value) => {
                if let Some(e) = value {
                    self.visit_expr(e, mode, sets);
                }
            }
            StmtKind::Block(b) => self.visit_block(b, mode.inner(), sets),
            StmtKind::Other { exprs, blocks } => {
                for e in exprs {
                    self.visit_expr(e, mode, sets);
                }
                for b in blocks {
                    self.visit_block(b, mode.inner(), sets);
                }
            }
        }
    }

    fn visit_expr(&self, expr: &Expr, mode: Mode, sets: &mut ClassificationSets) {
        match &expr.kind {
            ExprKind::VarRef(var) => self.read(*var, mode, sets),
            ExprKind::NameRef(_) | ExprKind::Literal(_) => {}
            ExprKind::Assign { op, target, value } => {
                if let Some(var) = target.as_var_ref() {
                    // the right side's reads happen before the write
                    self.visit_expr(value, mode, sets);
                    if op != "=" {
                        self.read(var, mode, sets);
                    }
                    self.assign(var, mode, sets);
                } else {
                    // index and property targets mutate shared state, not
                    // the variable binding; both sides are ordinary reads
                    self.visit_expr(target, mode, sets);
                    self.visit_expr(value, mode, sets);
                }
            }
            ExprKind::Update { target, .. } => {
                if let Some(var) = target.as_var_ref() {
                    self.read(var, mode, sets);
                    self.assign(var, mode, sets);
                } else {
                    self.visit_expr(target, mode, sets);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.visit_expr(left, mode, sets);
                self.visit_expr(right, mode, sets);
            }
            ExprKind::Index { object, index } => {
                self.visit_expr(object, mode, sets);
                self.visit_expr(index, mode, sets);
            }
            ExprKind::FieldAccess { object, .. } => self.visit_expr(object, mode, sets),
            ExprKind::Call { receiver, args, .. } => {
                if let Some(r) = receiver {
                    self.visit_expr(r, mode, sets);
                }
                for a in args {
                    self.visit_expr(a, mode, sets);
                }
            }
            ExprKind::ConstructorDelegation { args } => {
                for a in args {
                    self.visit_expr(a, mode, sets);
                }
            }
            ExprKind::Closure {
                params,
                implicit_param,
                body,
            } => {
                for &p in params {
                    sets.declared_in_nested_block.insert(p);
                }
                if let Some(ip) = implicit_param {
                    sets.declared_in_nested_block.insert(*ip);
                }
                self.visit_block(body, Mode::ClosureRepeatable, sets);
            }
            ExprKind::Other { children } => {
                for c in children {
                    self.visit_expr(c, mode, sets);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_module, BinderOptions};
    use crate::selection::{Selection, SelectionResolver};

    fn classify_fragment(src: &str, fragment: &str) -> (crate::ast::Module, ClassificationSets) {
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let offset = src.find(fragment).expect("fragment present");
        let resolved =
            SelectionResolver::new(&module).resolve(Selection::new(offset, fragment.len()));
        assert!(!resolved.is_empty());
        let mode = if resolved.in_repeatable {
            Mode::Repeatable
        } else {
            Mode::Default
        };
        let sets = VariableClassifier::new(&module).classify(
            &resolved.in_selection,
            mode,
            &resolved.construct_vars,
        );
        (module, sets)
    }

    fn names(module: &crate::ast::Module, set: &VarSet) -> Vec<String> {
        set.iter().map(|v| module.var_name(*v).to_string()).collect()
    }

    #[test]
    fn test_reads_become_used_in_first_appearance_order() {
        let src = "class C { void m(int a, int b) { int c; c = a + b; } }";
        let (module, sets) = classify_fragment(src, "c = a + b;");
        assert_eq!(names(&module, &sets.used), vec!["a", "b"]);
        assert_eq!(names(&module, &sets.assigned_or_returned), vec!["c"]);
        assert!(sets.loop_carried.is_empty());
    }

    #[test]
    fn test_locally_declared_variable_is_invisible_outside() {
        let src = "class C { void m() { int x = 1; x = x + 2; use(x); } }";
        let (module, sets) = classify_fragment(src, "int x = 1; x = x + 2;");
        assert_eq!(names(&module, &sets.declared), vec!["x"]);
        assert!(sets.used.is_empty());
        assert!(sets.assigned_or_returned.is_empty());
    }

    #[test]
    fn test_loop_carried_read_then_write() {
        let src = "class C { void m(int[] xs) { int total = 0; for (int item : xs) { total = total + item; } } }";
        let (module, sets) = classify_fragment(src, "total = total + item;");
        assert_eq!(names(&module, &sets.used), vec!["total"]);
        assert_eq!(names(&module, &sets.assigned_or_returned), vec!["total"]);
        assert_eq!(names(&module, &sets.loop_carried), vec!["total"]);
        assert_eq!(names(&module, &sets.declared_in_nested_block), vec!["item"]);
    }

    #[test]
    fn test_plain_overwrite_in_loop_is_not_loop_carried() {
        let src = "class C { void m(int[] xs) { int last = 0; for (int item : xs) { last = item; } } }";
        let (module, sets) = classify_fragment(src, "last = item;");
        assert_eq!(names(&module, &sets.assigned_or_returned), vec!["last"]);
        assert!(sets.loop_carried.is_empty());
        assert!(sets.used.is_empty());
    }

    #[test]
    fn test_index_assignment_is_excluded() {
        let src = "class C { void m(int[] arr, int[] xs) { for (int i = 0; i < xs.length; i++) { arr[i] = xs[i]; } } }";
        let (module, sets) = classify_fragment(src, "arr[i] = xs[i];");
        assert!(sets.assigned_or_returned.is_empty());
        assert!(sets.loop_carried.is_empty());
        // i is the loop's own variable, seeded by the resolver
        assert_eq!(names(&module, &sets.used), vec!["arr", "xs"]);
    }

    #[test]
    fn test_compound_assignment_reads_then_writes() {
        let src = "class C { void m(int[] xs) { int sum = 0; for (int item : xs) { sum += item; } } }";
        let (module, sets) = classify_fragment(src, "sum += item;");
        assert_eq!(names(&module, &sets.used), vec!["sum"]);
        assert_eq!(names(&module, &sets.assigned_or_returned), vec!["sum"]);
        assert_eq!(names(&module, &sets.loop_carried), vec!["sum"]);
    }

    #[test]
    fn test_increment_in_loop_reads_then_writes() {
        let src = "class C { void m(int[] xs) { int n = 0; for (int item : xs) { n++; } } }";
        let (module, sets) = classify_fragment(src, "n++;");
        // the increment itself reads n first
        assert_eq!(names(&module, &sets.used), vec!["n"]);
        assert_eq!(names(&module, &sets.assigned_or_returned), vec!["n"]);
        assert_eq!(names(&module, &sets.loop_carried), vec!["n"]);
    }

    #[test]
    fn test_if_arm_references_are_used() {
        let src = "class C { void m(boolean f, int a) { if (f) { use(a); } } }";
        let (module, sets) = classify_fragment(src, "if (f) { use(a); }");
        assert_eq!(names(&module, &sets.used), vec!["f", "a"]);
        assert!(sets.assigned_or_returned.is_empty());
    }

    #[test]
    fn test_assignment_in_if_arm_outside_loop_flows_out() {
        let src = "class C { void m(boolean f) { int r = 0; if (f) { r = 1; } use(r); } }";
        let (module, sets) = classify_fragment(src, "if (f) { r = 1; }");
        assert_eq!(names(&module, &sets.assigned_or_returned), vec!["r"]);
        assert!(sets.loop_carried.is_empty());
    }

    #[test]
    fn test_whole_loop_selection_keeps_loop_variable_internal() {
        let src = "class C { void m(int[] xs) { int total = 0; for (int item : xs) { total = total + item; } use(total); } }";
        let (module, sets) = classify_fragment(
            src,
            "for (int item : xs) { total = total + item; }",
        );
        assert_eq!(names(&module, &sets.declared_in_nested_block), vec!["item"]);
        assert_eq!(names(&module, &sets.used), vec!["xs", "total"]);
        assert_eq!(names(&module, &sets.assigned_or_returned), vec!["total"]);
        assert_eq!(names(&module, &sets.loop_carried), vec!["total"]);
    }

    #[test]
    fn test_closure_parameters_are_nested_declarations() {
        let src = "class C { void m(Helper each, int base) { each.run(x -> { sink(base + x); }); } }";
        let (module, sets) = classify_fragment(src, "each.run(x -> { sink(base + x); });");
        assert_eq!(names(&module, &sets.declared_in_nested_block), vec!["x"]);
        assert_eq!(names(&module, &sets.used), vec!["each", "base"]);
    }

    #[test]
    fn test_implicit_closure_parameter_is_not_used() {
        let src = "class C { void m(Helper each) { each.run(() -> { sink(it); }); } }";
        let module = parse_module(
            src,
            BinderOptions::default().with_implicit_closure_param("it"),
        )
        .unwrap();
        let offset = src.find("each.run").unwrap();
        let fragment_len = "each.run(() -> { sink(it); });".len();
        let resolved =
            SelectionResolver::new(&module).resolve(Selection::new(offset, fragment_len));
        let sets = VariableClassifier::new(&module).classify(
            &resolved.in_selection,
            Mode::Default,
            &resolved.construct_vars,
        );
        assert_eq!(names(&module, &sets.used), vec!["each"]);
        assert_eq!(names(&module, &sets.declared_in_nested_block), vec!["it"]);
    }
}
