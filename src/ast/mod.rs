//! The bound AST consumed by the analysis core.
//!
//! The core components never look at source text or tree-sitter nodes.
//! They operate on this tree, in which every node carries a byte-offset
//! [`Span`] and a [`NodeId`], and every resolved variable reference carries
//! the [`VarId`] of its declaration site. The bundled Java front-end
//! ([`crate::parse`]) produces this tree; any other binder that fills in
//! the same invariants can drive the core equally well.
//!
//! Invariants the producer must uphold:
//! - NodeIds are unique within a [`Module`];
//! - two references denote the same variable iff they carry the same VarId;
//! - statement and expression spans nest properly (a child span is
//!   contained in its parent's span);
//! - branch and loop bodies are always [`Block`]s (single-statement bodies
//!   are wrapped in a synthetic block with the statement's span).

use serde::{Deserialize, Serialize};

/// A byte-offset range over the source text. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span from start/end offsets.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// True if `other` lies entirely within this span.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True if the offset lies within this span.
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// True if the span has no extent.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Smallest span covering both spans.
    pub fn hull(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Identity of a node within one module. Ancestor comparison and the
/// ancestor-chain memo key on NodeId, never on structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identity of a variable: an index into the module's variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarId(pub u32);

/// What kind of declaration introduced a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Local variable declaration.
    Local,
    /// Method or constructor parameter.
    Parameter,
    /// Loop variable (C-style for init or enhanced-for variable).
    LoopVariable,
    /// Declared closure (lambda) parameter.
    ClosureParameter,
    /// Implicit closure parameter; has no declaration site in source.
    ImplicitParameter,
}

/// A variable, identified by its declaration site.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Source name.
    pub name: String,
    /// Declaration kind.
    pub kind: VarKind,
    /// Declaration site span; `None` for implicit closure parameters.
    pub decl_span: Option<Span>,
    /// Declared type text, when the source carries one (`var` and implicit
    /// parameters have none).
    pub declared_type: Option<String>,
}

/// A parsed and bound compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Top-level classes.
    pub classes: Vec<ClassDecl>,
    /// Variable table indexed by [`VarId`].
    pub variables: Vec<Variable>,
}

impl Module {
    /// Look up a variable by id.
    ///
    /// Panics on an id from a different module; ids are never exchanged
    /// across modules.
    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0 as usize]
    }

    /// Name of a variable.
    pub fn var_name(&self, id: VarId) -> &str {
        &self.variable(id).name
    }

    /// The innermost member whose span contains `span`, with its class.
    pub fn enclosing_member(&self, span: Span) -> Option<(&ClassDecl, &Member)> {
        for class in &self.classes {
            for member in &class.members {
                if member.span.contains(span) {
                    return Some((class, member));
                }
            }
        }
        None
    }
}

/// A class declaration.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
    /// Names of the class's fields, for visibility collision checks.
    pub fields: Vec<String>,
    pub members: Vec<Member>,
}

impl ClassDecl {
    /// True if the class declares a method with the given name.
    pub fn has_method(&self, name: &str) -> bool {
        self.members
            .iter()
            .any(|m| m.kind == MemberKind::Method && m.name == name)
    }
}

/// Kind of class member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Constructor,
    Field,
}

/// A class member: method, constructor, or field.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: NodeId,
    pub kind: MemberKind,
    pub name: String,
    pub span: Span,
    /// Declared parameters (methods and constructors).
    pub params: Vec<VarId>,
    /// Method/constructor body.
    pub body: Option<Block>,
    /// Field initializer expression, when present.
    pub initializer: Option<Expr>,
}

/// A sequence of statements with a span.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub statements: Vec<Stmt>,
}

/// A statement.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

/// One declarator of a local variable declaration.
#[derive(Debug, Clone)]
pub struct Declarator {
    pub var: VarId,
    pub init: Option<Expr>,
}

/// Initializer clause of a C-style for loop.
#[derive(Debug, Clone)]
pub enum ForInit {
    Decl(Vec<Declarator>),
    Exprs(Vec<Expr>),
}

/// Statement kinds the analysis distinguishes.
///
/// Anything else lowers to [`StmtKind::Other`], which preserves child
/// expressions and blocks so classification and selection stay
/// conservative rather than lossy.
#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    VarDecl(Vec<Declarator>),
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    DoWhile {
        body: Block,
        cond: Expr,
    },
    For {
        init: Option<ForInit>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Block,
    },
    ForEach {
        var: VarId,
        iterable: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Block(Block),
    Other {
        exprs: Vec<Expr>,
        blocks: Vec<Block>,
    },
}

/// An expression.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    /// The referenced variable, if this is a direct variable reference.
    pub fn as_var_ref(&self) -> Option<VarId> {
        match self.kind {
            ExprKind::VarRef(v) => Some(v),
            _ => None,
        }
    }
}

/// Expression kinds the analysis distinguishes.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Reference resolved to a local declaration.
    VarRef(VarId),
    /// Unresolved name (field, static, type name); opaque to the
    /// variable-flow analysis.
    NameRef(String),
    /// Literal, with its text preserved for structural matching.
    Literal(String),
    Assign {
        /// Operator text: `=`, `+=`, `-=`, ...
        op: String,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `++`/`--` in either position.
    Update {
        op: String,
        target: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Array element access.
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    Call {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },
    /// `this(...)` / `super(...)` inside a constructor.
    ConstructorDelegation {
        args: Vec<Expr>,
    },
    Closure {
        params: Vec<VarId>,
        /// Created by the binder when the body references the configured
        /// implicit parameter name and no parameter is declared.
        implicit_param: Option<VarId>,
        body: Block,
    },
    Other {
        children: Vec<Expr>,
    },
}

/// Structural equality of expressions, ignoring spans and node identity.
///
/// Used to collect the occurrences replaced by an extracted local.
/// Closures never match (replacing one would change capture semantics).
pub fn structurally_equal(a: &Expr, b: &Expr) -> bool {
    match (&a.kind, &b.kind) {
        (ExprKind::VarRef(x), ExprKind::VarRef(y)) => x == y,
        (ExprKind::NameRef(x), ExprKind::NameRef(y)) => x == y,
        (ExprKind::Literal(x), ExprKind::Literal(y)) => x == y,
        (
            ExprKind::Assign {
                op: oa,
                target: ta,
                value: va,
            },
            ExprKind::Assign {
                op: ob,
                target: tb,
                value: vb,
            },
        ) => oa == ob && structurally_equal(ta, tb) && structurally_equal(va, vb),
        (
            ExprKind::Update { op: oa, target: ta },
            ExprKind::Update { op: ob, target: tb },
        ) => oa == ob && structurally_equal(ta, tb),
        (
            ExprKind::Binary {
                op: oa,
                left: la,
                right: ra,
            },
            ExprKind::Binary {
                op: ob,
                left: lb,
                right: rb,
            },
        ) => oa == ob && structurally_equal(la, lb) && structurally_equal(ra, rb),
        (
            ExprKind::Index {
                object: oa,
                index: ia,
            },
            ExprKind::Index {
                object: ob,
                index: ib,
            },
        ) => structurally_equal(oa, ob) && structurally_equal(ia, ib),
        (
            ExprKind::FieldAccess {
                object: oa,
                field: fa,
            },
            ExprKind::FieldAccess {
                object: ob,
                field: fb,
            },
        ) => fa == fb && structurally_equal(oa, ob),
        (
            ExprKind::Call {
                receiver: ra,
                name: na,
                args: aa,
            },
            ExprKind::Call {
                receiver: rb,
                name: nb,
                args: ab,
            },
        ) => {
            na == nb
                && aa.len() == ab.len()
                && match (ra, rb) {
                    (None, None) => true,
                    (Some(x), Some(y)) => structurally_equal(x, y),
                    _ => false,
                }
                && aa.iter().zip(ab).all(|(x, y)| structurally_equal(x, y))
        }
        (
            ExprKind::Other { children: ca },
            ExprKind::Other { children: cb },
        ) => ca.len() == cb.len() && ca.iter().zip(cb).all(|(x, y)| structurally_equal(x, y)),
        _ => false,
    }
}

/// Visit every expression in a block, including expressions nested in
/// inner blocks and closure bodies, in source order.
pub fn for_each_expr_in_block<'a>(block: &'a Block, f: &mut impl FnMut(&'a Expr)) {
    for stmt in &block.statements {
        for_each_expr_in_stmt(stmt, f);
    }
}

/// Visit every expression in a statement, in source order.
pub fn for_each_expr_in_stmt<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Expr)) {
    match &stmt.kind {
        StmtKind::Expr(e) => for_each_expr(e, f),
        StmtKind::VarDecl(decls) => {
            for d in decls {
                if let Some(init) = &d.init {
                    for_each_expr(init, f);
                }
            }
        }
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => {
            for_each_expr(cond, f);
            for_each_expr_in_block(then_block, f);
            if let Some(e) = else_block {
                for_each_expr_in_block(e, f);
            }
        }
        StmtKind::While { cond, body } => {
            for_each_expr(cond, f);
            for_each_expr_in_block(body, f);
        }
        StmtKind::DoWhile { body, cond } => {
            for_each_expr_in_block(body, f);
            for_each_expr(cond, f);
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
                            for_each_expr(e, f);
                        }
                    }
                }
                Some(ForInit::Exprs(exprs)) => {
                    for e in exprs {
                        for_each_expr(e, f);
                    }
                }
                None => {}
            }
            if let Some(c) = cond {
                for_each_expr(c, f);
            }
            for e in update {
                for_each_expr(e, f);
            }
            for_each_expr_in_block(body, f);
        }
        StmtKind::ForEach { iterable, body, .. } => {
            for_each_expr(iterable, f);
            for_each_expr_in_block(body, f);
        }
        StmtKind::Return(value) => {
            if let Some(e) = value {
                for_each_expr(e, f);
            }
        }
        StmtKind::Block(b) => for_each_expr_in_block(b, f),
        StmtKind::Other { exprs, blocks } => {
            for e in exprs {
                for_each_expr(e, f);
            }
            for b in blocks {
                for_each_expr_in_block(b, f);
            }
        }
    }
}

/// Visit an expression and all of its descendants, in source order.
pub fn for_each_expr<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a Expr)) {
    f(expr);
    match &expr.kind {
        ExprKind::VarRef(_) | ExprKind::NameRef(_) | ExprKind::Literal(_) => {}
        ExprKind::Assign { target, value, .. } => {
            for_each_expr(target, f);
            for_each_expr(value, f);
        }
        ExprKind::Update { target, .. } => for_each_expr(target, f),
        ExprKind::Binary { left, right, .. } => {
            for_each_expr(left, f);
            for_each_expr(right, f);
        }
        ExprKind::Index { object, index } => {
            for_each_expr(object, f);
            for_each_expr(index, f);
        }
        ExprKind::FieldAccess { object, .. } => for_each_expr(object, f),
        ExprKind::Call { receiver, args, .. } => {
            if let Some(r) = receiver {
                for_each_expr(r, f);
            }
            for a in args {
                for_each_expr(a, f);
            }
        }
        ExprKind::ConstructorDelegation { args } => {
            for a in args {
                for_each_expr(a, f);
            }
        }
        ExprKind::Closure { body, .. } => for_each_expr_in_block(body, f),
        ExprKind::Other { children } => {
            for c in children {
                for_each_expr(c, f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(id: u32, kind: ExprKind) -> Expr {
        Expr {
            id: NodeId(id),
            span: Span::new(0, 0),
            kind,
        }
    }

    #[test]
    fn test_span_containment() {
        let outer = Span::new(10, 50);
        assert!(outer.contains(Span::new(10, 50)));
        assert!(outer.contains(Span::new(20, 30)));
        assert!(!outer.contains(Span::new(5, 30)));
        assert!(!outer.contains(Span::new(20, 60)));
        assert!(outer.contains_offset(10));
        assert!(!outer.contains_offset(50));
    }

    #[test]
    fn test_span_hull() {
        let a = Span::new(10, 20);
        let b = Span::new(15, 40);
        assert_eq!(a.hull(b), Span::new(10, 40));
    }

    #[test]
    fn test_structural_equality_ignores_identity() {
        let a = expr(
            1,
            ExprKind::Binary {
                op: "+".into(),
                left: Box::new(expr(2, ExprKind::VarRef(VarId(0)))),
                right: Box::new(expr(3, ExprKind::Literal("1".into()))),
            },
        );
        let b = expr(
            9,
            ExprKind::Binary {
                op: "+".into(),
                left: Box::new(expr(10, ExprKind::VarRef(VarId(0)))),
                right: Box::new(expr(11, ExprKind::Literal("1".into()))),
            },
        );
        assert!(structurally_equal(&a, &b));
    }

    #[test]
    fn test_structural_equality_distinguishes_variables() {
        let a = expr(1, ExprKind::VarRef(VarId(0)));
        let b = expr(2, ExprKind::VarRef(VarId(1)));
        assert!(!structurally_equal(&a, &b));
    }
}
