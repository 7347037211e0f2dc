//! Mapping a user selection onto statement lists.
//!
//! The resolver walks the one member whose span covers the selection and
//! splits its statements into the fully covered in-selection list and the
//! post-selection list of everything that runs after it. It also reports
//! whether the selection sits inside a construct that may execute zero or
//! many times (a loop or closure body), and which variables those
//! constructs introduced on the way down, since the classifier needs them
//! pre-seeded.

use tracing::debug;

use crate::ast::{Block, ClassDecl, Expr, ExprKind, ForInit, Member, MemberKind, Module, Span,
    Stmt, StmtKind, VarId};

/// A user selection: offset plus length over the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub offset: usize,
    pub length: usize,
}

impl Selection {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// The selection as a span.
    pub fn span(&self) -> Span {
        Span::new(self.offset, self.offset + self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Result of resolving a selection against a module.
///
/// An empty `in_selection` means the selection did not fully cover any
/// statement; callers treat that as an invalid selection.
#[derive(Debug, Default)]
pub struct ResolvedSelection<'m> {
    /// Statements fully covered by the selection, in source order.
    pub in_selection: Vec<&'m Stmt>,
    /// Statements that execute after the selection within the enclosing
    /// member, in source order.
    pub post_selection: Vec<&'m Stmt>,
    /// Class enclosing the selection.
    pub class: Option<&'m ClassDecl>,
    /// Member enclosing the selection.
    pub member: Option<&'m Member>,
    /// True if the matched statements sit inside a loop or closure body.
    pub in_repeatable: bool,
    /// Loop variables and closure parameters of every repeatable construct
    /// entered on the way down to the selection.
    pub construct_vars: Vec<VarId>,
}

impl<'m> ResolvedSelection<'m> {
    /// True if no statement was matched.
    pub fn is_empty(&self) -> bool {
        self.in_selection.is_empty()
    }

    /// Spans of the in-selection statements.
    pub fn in_spans(&self) -> Vec<Span> {
        self.in_selection.iter().map(|s| s.span).collect()
    }

    /// Spans of the post-selection statements.
    pub fn post_spans(&self) -> Vec<Span> {
        self.post_selection.iter().map(|s| s.span).collect()
    }

    /// Smallest span covering every in-selection statement.
    pub fn call_range(&self) -> Option<Span> {
        let mut spans = self.in_selection.iter().map(|s| s.span);
        let first = spans.next()?;
        Some(spans.fold(first, |acc, s| acc.hull(s)))
    }

    /// Name of the enclosing class, for diagnostics.
    pub fn class_name(&self) -> Option<&str> {
        self.class.map(|c| c.name.as_str())
    }

    /// Name of the enclosing member, for diagnostics.
    pub fn member_name(&self) -> Option<&str> {
        self.member.map(|m| m.name.as_str())
    }
}

/// Resolves selections against one module.
pub struct SelectionResolver<'m> {
    module: &'m Module,
}

impl<'m> SelectionResolver<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self { module }
    }

    /// Resolve `selection` to its statement lists and enclosing member.
    pub fn resolve(&self, selection: Selection) -> ResolvedSelection<'m> {
        let sel = selection.span();
        for class in &self.module.classes {
            if !class.span.contains(sel) {
                continue;
            }
            for member in &class.members {
                if !member.span.contains(sel) {
                    continue;
                }
                let mut walk = Walk::new(sel);
                match member.kind {
                    MemberKind::Method | MemberKind::Constructor => {
                        if let Some(body) = &member.body {
                            walk.scan_block(body);
                        }
                    }
                    MemberKind::Field => {
                        if let Some(init) = &member.initializer {
                            walk.enter_closures(init);
                        }
                    }
                }
                if !walk.in_selection.is_empty() {
                    debug!(
                        class = %class.name,
                        member = %member.name,
                        in_selection = walk.in_selection.len(),
                        post_selection = walk.post_selection.len(),
                        in_repeatable = walk.in_repeatable,
                        "selection resolved"
                    );
                    return ResolvedSelection {
                        in_selection: walk.in_selection,
                        post_selection: walk.post_selection,
                        class: Some(class),
                        member: Some(member),
                        in_repeatable: walk.in_repeatable,
                        construct_vars: walk.construct_vars,
                    };
                }
            }
        }
        debug!("selection matched no statement");
        ResolvedSelection::default()
    }
}

struct Walk<'m> {
    sel: Span,
    found: bool,
    nesting: u32,
    in_selection: Vec<&'m Stmt>,
    post_selection: Vec<&'m Stmt>,
    in_repeatable: bool,
    construct_vars: Vec<VarId>,
}

impl<'m> Walk<'m> {
    fn new(sel: Span) -> Self {
        Self {
            sel,
            found: false,
            nesting: 0,
            in_selection: Vec::new(),
            post_selection: Vec::new(),
            in_repeatable: false,
            construct_vars: Vec::new(),
        }
    }

    fn scan_block(&mut self, block: &'m Block) {
        for stmt in &block.statements {
            let span = effective_span(stmt);
            if self.sel.contains(span) {
                self.in_selection.push(stmt);
                self.found = true;
                if self.nesting > 0 {
                    self.in_repeatable = true;
                }
            } else if !self.found && span.contains(self.sel) {
                self.descend(stmt);
            } else if self.found {
                self.post_selection.push(stmt);
            }
        }
    }

    /// Recurse into a statement whose span contains the selection.
    fn descend(&mut self, stmt: &'m Stmt) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.enter_closures(e),
            StmtKind::VarDecl(decls) => {
                for d in decls {
                    if let Some(init) = &d.init {
                        self.enter_closures(init);
                    }
                }
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.enter_closures(cond);
                self.scan_contained(then_block);
                if let Some(e) = else_block {
                    self.scan_contained(e);
                }
            }
            StmtKind::While { cond, body } => {
                self.enter_closures(cond);
                self.enter_loop(body, &[]);
            }
            StmtKind::DoWhile { body, cond } => {
                self.enter_loop(body, &[]);
                self.enter_closures(cond);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let mut loop_vars = Vec::new();
                match init {
                    Some(ForInit::Decl(decls)) => {
                        for d in decls {
                            loop_vars.push(d.var);
                            if let Some(e) = &d.init {
                                self.enter_closures(e);
                            }
                        }
                    }
                    Some(ForInit::Exprs(exprs)) => {
                        for e in exprs {
                            self.enter_closures(e);
                        }
                    }
                    None => {}
                }
                if let Some(c) = cond {
                    self.enter_closures(c);
                }
                for e in update {
                    self.enter_closures(e);
                }
                self.enter_loop(body, &loop_vars);
            }
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                self.enter_closures(iterable);
                self.enter_loop(body, &[*var]);
            }
            StmtKind::Return(value) => {
                if let Some(e) = value {
                    self.enter_closures(e);
                }
            }
            StmtKind::Block(b) => self.scan_contained(b),
            StmtKind::Other { exprs, blocks } => {
                for e in exprs {
                    self.enter_closures(e);
                }
                for b in blocks {
                    self.scan_contained(b);
                }
            }
        }
    }

    fn scan_contained(&mut self, block: &'m Block) {
        if block.span.contains(self.sel) {
            self.scan_block(block);
        }
    }

    fn enter_loop(&mut self, body: &'m Block, vars: &[VarId]) {
        if !body.span.contains(self.sel) {
            return;
        }
        self.nesting += 1;
        self.construct_vars.extend_from_slice(vars);
        self.scan_block(body);
        self.nesting -= 1;
    }

    /// Descend through an expression looking for a closure body containing
    /// the selection.
    fn enter_closures(&mut self, expr: &'m Expr) {
        if !expr.span.contains(self.sel) {
            return;
        }
        match &expr.kind {
            ExprKind::Closure {
                params,
                implicit_param,
                body,
            } => {
                if body.span.contains(self.sel) {
                    self.nesting += 1;
                    self.construct_vars.extend_from_slice(params);
                    if let Some(ip) = implicit_param {
                        self.construct_vars.push(*ip);
                    }
                    self.scan_block(body);
                    self.nesting -= 1;
                }
            }
            ExprKind::Assign { target, value, .. } => {
                self.enter_closures(target);
                self.enter_closures(value);
            }
            ExprKind::Update { target, .. } => self.enter_closures(target),
            ExprKind::Binary { left, right, .. } => {
                self.enter_closures(left);
                self.enter_closures(right);
            }
            ExprKind::Index { object, index } => {
                self.enter_closures(object);
                self.enter_closures(index);
            }
            ExprKind::FieldAccess { object, .. } => self.enter_closures(object),
            ExprKind::Call { receiver, args, .. } => {
                if let Some(r) = receiver {
                    self.enter_closures(r);
                }
                for a in args {
                    self.enter_closures(a);
                }
            }
            ExprKind::ConstructorDelegation { args } => {
                for a in args {
                    self.enter_closures(a);
                }
            }
            ExprKind::Other { children } => {
                for c in children {
                    self.enter_closures(c);
                }
            }
            ExprKind::VarRef(_) | ExprKind::NameRef(_) | ExprKind::Literal(_) => {}
        }
    }
}

/// A statement's span for coverage checks; a degenerate return span falls
/// back to its value expression's span.
fn effective_span(stmt: &Stmt) -> Span {
    if stmt.span.is_empty() {
        if let StmtKind::Return(Some(e)) = &stmt.kind {
            return e.span;
        }
    }
    stmt.span
}
