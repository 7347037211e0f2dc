//! Lowering from the tree-sitter concrete tree to the bound AST.
//!
//! The lowerer walks the grammar tree once, assigning a fresh [`NodeId`] to
//! every produced node and resolving identifiers against a lexical scope
//! stack. Statement kinds outside the analysis vocabulary lower to
//! `StmtKind::Other`, keeping their child expressions and blocks visible
//! to classification instead of dropping them.

use std::collections::HashMap;

use tree_sitter::{Node, Tree};

use crate::ast::{
    Block, ClassDecl, Declarator, Expr, ExprKind, ForInit, Member, MemberKind, Module, NodeId,
    Span, Stmt, StmtKind, VarId, VarKind, Variable,
};
use crate::error::Result;

use super::BinderOptions;

pub(super) fn lower(tree: &Tree, source: &str, options: BinderOptions) -> Result<Module> {
    let mut lowerer = Lowerer {
        source: source.as_bytes(),
        options,
        module: Module::default(),
        next_node: 0,
        scopes: Vec::new(),
    };
    lowerer.lower_program(tree.root_node());
    Ok(lowerer.module)
}

/// One lexical scope. Lambda frames can own an implicit parameter.
struct ScopeFrame {
    names: HashMap<String, VarId>,
    lambda: bool,
    /// True for a lambda frame that declares no parameters while the
    /// implicit-parameter convention is enabled.
    implicit_eligible: bool,
    created_implicit: Option<VarId>,
}

impl ScopeFrame {
    fn new() -> Self {
        Self {
            names: HashMap::new(),
            lambda: false,
            implicit_eligible: false,
            created_implicit: None,
        }
    }
}

struct Lowerer<'s> {
    source: &'s [u8],
    options: BinderOptions,
    module: Module,
    next_node: u32,
    scopes: Vec<ScopeFrame>,
}

impl<'s> Lowerer<'s> {
    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    fn span(node: Node) -> Span {
        Span::new(node.start_byte(), node.end_byte())
    }

    fn text(&self, node: Node) -> &str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn push_scope(&mut self) {
        self.scopes.push(ScopeFrame::new());
    }

    fn pop_scope(&mut self) -> ScopeFrame {
        self.scopes.pop().unwrap_or_else(ScopeFrame::new)
    }

    fn declare(
        &mut self,
        name: &str,
        kind: VarKind,
        decl_span: Option<Span>,
        declared_type: Option<String>,
    ) -> VarId {
        let id = VarId(self.module.variables.len() as u32);
        self.module.variables.push(Variable {
            name: name.to_string(),
            kind,
            decl_span,
            declared_type,
        });
        if let Some(frame) = self.scopes.last_mut() {
            frame.names.insert(name.to_string(), id);
        }
        id
    }

    /// Resolve a name against the scope stack. An unresolved reference to
    /// the configured implicit parameter name binds to a fresh implicit
    /// parameter of the innermost parameterless lambda.
    fn resolve(&mut self, name: &str) -> Option<VarId> {
        for frame in self.scopes.iter().rev() {
            if let Some(&v) = frame.names.get(name) {
                return Some(v);
            }
        }
        match &self.options.implicit_closure_param {
            Some(implicit) if implicit == name => {}
            _ => return None,
        }
        let idx = self
            .scopes
            .iter()
            .rposition(|f| f.lambda && f.implicit_eligible)?;
        let id = VarId(self.module.variables.len() as u32);
        self.module.variables.push(Variable {
            name: name.to_string(),
            kind: VarKind::ImplicitParameter,
            decl_span: None,
            declared_type: None,
        });
        let frame = &mut self.scopes[idx];
        frame.names.insert(name.to_string(), id);
        frame.created_implicit = Some(id);
        Some(id)
    }

    fn type_text(&self, node: Option<Node>) -> Option<String> {
        let text = self.text(node?).to_string();
        if text == "var" { None } else { Some(text) }
    }

    fn lower_program(&mut self, root: Node) {
        let mut cursor = root.walk();
        let children: Vec<Node> = root.named_children(&mut cursor).collect();
        for child in children {
            if child.kind() == "class_declaration" {
                let class = self.lower_class(child);
                self.module.classes.push(class);
            }
        }
    }

    fn lower_class(&mut self, node: Node) -> ClassDecl {
        let id = self.next_id();
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let mut class = ClassDecl {
            id,
            name,
            span: Self::span(node),
            fields: Vec::new(),
            members: Vec::new(),
        };
        let Some(body) = node.child_by_field_name("body") else {
            return class;
        };
        let mut cursor = body.walk();
        let members: Vec<Node> = body.named_children(&mut cursor).collect();
        for member in members {
            match member.kind() {
                "method_declaration" => {
                    let m = self.lower_callable(member, MemberKind::Method);
                    class.members.push(m);
                }
                "constructor_declaration" => {
                    let m = self.lower_callable(member, MemberKind::Constructor);
                    class.members.push(m);
                }
                "field_declaration" => self.lower_field(member, &mut class),
                _ => {}
            }
        }
        class
    }

    fn lower_callable(&mut self, node: Node, kind: MemberKind) -> Member {
        let id = self.next_id();
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        self.push_scope();
        let mut params = Vec::new();
        if let Some(param_list) = node.child_by_field_name("parameters") {
            let mut cursor = param_list.walk();
            let children: Vec<Node> = param_list.named_children(&mut cursor).collect();
            for param in children {
                if param.kind() != "formal_parameter" {
                    continue;
                }
                let Some(name_node) = param.child_by_field_name("name") else {
                    continue;
                };
                let ty = self.type_text(param.child_by_field_name("type"));
                let pname = self.text(name_node).to_string();
                params.push(self.declare(
                    &pname,
                    VarKind::Parameter,
                    Some(Self::span(name_node)),
                    ty,
                ));
            }
        }
        let body = node.child_by_field_name("body").map(|b| self.lower_block(b));
        self.pop_scope();
        Member {
            id,
            kind,
            name,
            span: Self::span(node),
            params,
            body,
            initializer: None,
        }
    }

    fn lower_field(&mut self, node: Node, class: &mut ClassDecl) {
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "variable_declarator")
            .collect();
        for decl in declarators {
            let Some(name_node) = decl.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(name_node).to_string();
            let initializer = decl
                .child_by_field_name("value")
                .map(|v| self.lower_expr(v));
            class.fields.push(name.clone());
            let id = self.next_id();
            class.members.push(Member {
                id,
                kind: MemberKind::Field,
                name,
                span: Self::span(node),
                params: Vec::new(),
                body: None,
                initializer,
            });
        }
    }

    fn lower_block(&mut self, node: Node) -> Block {
        let id = self.next_id();
        self.push_scope();
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        let statements = children.into_iter().map(|c| self.lower_stmt(c)).collect();
        self.pop_scope();
        Block {
            id,
            span: Self::span(node),
            statements,
        }
    }

    /// Lower a statement-position node into a Block, wrapping a
    /// single-statement body in a synthetic block with the same span.
    fn as_block(&mut self, node: Node) -> Block {
        if node.kind() == "block" {
            return self.lower_block(node);
        }
        self.push_scope();
        let stmt = self.lower_stmt(node);
        self.pop_scope();
        Block {
            id: self.next_id(),
            span: stmt.span,
            statements: vec![stmt],
        }
    }

    fn lower_stmt(&mut self, node: Node) -> Stmt {
        let id = self.next_id();
        let span = Self::span(node);
        let kind = match node.kind() {
            "local_variable_declaration" => {
                let ty = node.child_by_field_name("type");
                let declared_type = self.type_text(ty);
                let mut cursor = node.walk();
                let declarators: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() == "variable_declarator")
                    .collect();
                let mut lowered = Vec::new();
                for decl in declarators {
                    // the initializer resolves against the scope as it was
                    // before this declarator introduces its name
                    let init = decl
                        .child_by_field_name("value")
                        .map(|v| self.lower_expr(v));
                    if let Some(name_node) = decl.child_by_field_name("name") {
                        let name = self.text(name_node).to_string();
                        let var = self.declare(
                            &name,
                            VarKind::Local,
                            Some(Self::span(name_node)),
                            declared_type.clone(),
                        );
                        lowered.push(Declarator { var, init });
                    }
                }
                StmtKind::VarDecl(lowered)
            }
            "expression_statement" => match node.named_child(0) {
                Some(inner) => StmtKind::Expr(self.lower_expr(inner)),
                None => StmtKind::Other {
                    exprs: Vec::new(),
                    blocks: Vec::new(),
                },
            },
            "if_statement" => {
                let cond = self.lower_condition(node);
                let then_block = match node.child_by_field_name("consequence") {
                    Some(c) => self.as_block(c),
                    None => self.empty_block(span),
                };
                let else_block = node
                    .child_by_field_name("alternative")
                    .map(|a| self.as_block(a));
                StmtKind::If {
                    cond,
                    then_block,
                    else_block,
                }
            }
            "while_statement" => {
                let cond = self.lower_condition(node);
                let body = match node.child_by_field_name("body") {
                    Some(b) => self.as_block(b),
                    None => self.empty_block(span),
                };
                StmtKind::While { cond, body }
            }
            "do_statement" => {
                let body = match node.child_by_field_name("body") {
                    Some(b) => self.as_block(b),
                    None => self.empty_block(span),
                };
                let cond = self.lower_condition(node);
                StmtKind::DoWhile { body, cond }
            }
            "for_statement" => return self.lower_for(node, id, span),
            "enhanced_for_statement" => return self.lower_foreach(node, id, span),
            "return_statement" => StmtKind::Return(node.named_child(0).map(|e| self.lower_expr(e))),
            "block" => StmtKind::Block(self.lower_block(node)),
            "explicit_constructor_invocation" => {
                StmtKind::Expr(self.lower_expr(node))
            }
            _ => {
                let mut exprs = Vec::new();
                let mut blocks = Vec::new();
                self.collect_other(node, &mut exprs, &mut blocks);
                StmtKind::Other { exprs, blocks }
            }
        };
        Stmt { id, span, kind }
    }

    fn empty_block(&mut self, span: Span) -> Block {
        Block {
            id: self.next_id(),
            span,
            statements: Vec::new(),
        }
    }

    /// Lower the `condition` field, unwrapping its parentheses.
    fn lower_condition(&mut self, node: Node) -> Expr {
        match node.child_by_field_name("condition") {
            Some(cond) => self.lower_expr(cond),
            None => Expr {
                id: self.next_id(),
                span: Self::span(node),
                kind: ExprKind::Other {
                    children: Vec::new(),
                },
            },
        }
    }

    fn lower_for(&mut self, node: Node, id: NodeId, span: Span) -> Stmt {
        // the init declaration scopes over condition, update, and body
        self.push_scope();
        let mut cursor = node.walk();
        let init_nodes: Vec<Node> = node.children_by_field_name("init", &mut cursor).collect();
        let init = if init_nodes.is_empty() {
            None
        } else if init_nodes[0].kind() == "local_variable_declaration" {
            let decl_node = init_nodes[0];
            let declared_type = self.type_text(decl_node.child_by_field_name("type"));
            let mut c = decl_node.walk();
            let declarators: Vec<Node> = decl_node
                .named_children(&mut c)
                .filter(|n| n.kind() == "variable_declarator")
                .collect();
            let mut lowered = Vec::new();
            for decl in declarators {
                let init = decl
                    .child_by_field_name("value")
                    .map(|v| self.lower_expr(v));
                if let Some(name_node) = decl.child_by_field_name("name") {
                    let name = self.text(name_node).to_string();
                    let var = self.declare(
                        &name,
                        VarKind::LoopVariable,
                        Some(Self::span(name_node)),
                        declared_type.clone(),
                    );
                    lowered.push(Declarator { var, init });
                }
            }
            Some(ForInit::Decl(lowered))
        } else {
            Some(ForInit::Exprs(
                init_nodes.into_iter().map(|n| self.lower_expr(n)).collect(),
            ))
        };
        let cond = node
            .child_by_field_name("condition")
            .map(|c| self.lower_expr(c));
        let mut cursor = node.walk();
        let update_nodes: Vec<Node> = node.children_by_field_name("update", &mut cursor).collect();
        let update = update_nodes
            .into_iter()
            .map(|n| self.lower_expr(n))
            .collect();
        let body = match node.child_by_field_name("body") {
            Some(b) => self.as_block(b),
            None => self.empty_block(span),
        };
        self.pop_scope();
        Stmt {
            id,
            span,
            kind: StmtKind::For {
                init,
                cond,
                update,
                body,
            },
        }
    }

    fn lower_foreach(&mut self, node: Node, id: NodeId, span: Span) -> Stmt {
        // the iterable resolves in the enclosing scope, the loop variable
        // only inside the body
        let iterable = match node.child_by_field_name("value") {
            Some(v) => self.lower_expr(v),
            None => Expr {
                id: self.next_id(),
                span,
                kind: ExprKind::Other {
                    children: Vec::new(),
                },
            },
        };
        self.push_scope();
        let declared_type = self.type_text(node.child_by_field_name("type"));
        let var = match node.child_by_field_name("name") {
            Some(name_node) => {
                let name = self.text(name_node).to_string();
                self.declare(
                    &name,
                    VarKind::LoopVariable,
                    Some(Self::span(name_node)),
                    declared_type,
                )
            }
            None => self.declare("<missing>", VarKind::LoopVariable, None, None),
        };
        let body = match node.child_by_field_name("body") {
            Some(b) => self.as_block(b),
            None => self.empty_block(span),
        };
        self.pop_scope();
        Stmt {
            id,
            span,
            kind: StmtKind::ForEach {
                var,
                iterable,
                body,
            },
        }
    }

    /// Conservative fallback for statement kinds outside the analysis
    /// vocabulary: surface every nested expression and block.
    fn collect_other(&mut self, node: Node, exprs: &mut Vec<Expr>, blocks: &mut Vec<Block>) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            if child.kind() == "block" {
                blocks.push(self.lower_block(child));
            } else if is_expression_kind(child.kind()) {
                let e = self.lower_expr(child);
                exprs.push(e);
            } else {
                self.collect_other(child, exprs, blocks);
            }
        }
    }

    fn lower_expr(&mut self, node: Node) -> Expr {
        let id = self.next_id();
        let span = Self::span(node);
        let kind = match node.kind() {
            "identifier" => {
                let name = self.text(node).to_string();
                match self.resolve(&name) {
                    Some(var) => ExprKind::VarRef(var),
                    None => ExprKind::NameRef(name),
                }
            }
            "this" | "super" => ExprKind::NameRef(self.text(node).to_string()),
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal"
            | "decimal_floating_point_literal"
            | "hex_floating_point_literal"
            | "string_literal"
            | "character_literal"
            | "true"
            | "false"
            | "null_literal" => ExprKind::Literal(self.text(node).to_string()),
            "parenthesized_expression" => {
                return match node.named_child(0) {
                    Some(inner) => self.lower_expr(inner),
                    None => Expr {
                        id,
                        span,
                        kind: ExprKind::Other {
                            children: Vec::new(),
                        },
                    },
                };
            }
            "assignment_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string())
                    .unwrap_or_else(|| "=".to_string());
                let target = node
                    .child_by_field_name("left")
                    .map(|l| Box::new(self.lower_expr(l)));
                let value = node
                    .child_by_field_name("right")
                    .map(|r| Box::new(self.lower_expr(r)));
                match (target, value) {
                    (Some(target), Some(value)) => ExprKind::Assign { op, target, value },
                    _ => ExprKind::Other {
                        children: Vec::new(),
                    },
                }
            }
            "update_expression" => {
                let op = if self.text(node).contains("++") {
                    "++".to_string()
                } else {
                    "--".to_string()
                };
                match node.named_child(0) {
                    Some(target) => ExprKind::Update {
                        op,
                        target: Box::new(self.lower_expr(target)),
                    },
                    None => ExprKind::Other {
                        children: Vec::new(),
                    },
                }
            }
            "binary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string())
                    .unwrap_or_default();
                let left = node
                    .child_by_field_name("left")
                    .map(|l| Box::new(self.lower_expr(l)));
                let right = node
                    .child_by_field_name("right")
                    .map(|r| Box::new(self.lower_expr(r)));
                match (left, right) {
                    (Some(left), Some(right)) => ExprKind::Binary { op, left, right },
                    _ => ExprKind::Other {
                        children: Vec::new(),
                    },
                }
            }
            "array_access" => {
                let object = node
                    .child_by_field_name("array")
                    .map(|a| Box::new(self.lower_expr(a)));
                let index = node
                    .child_by_field_name("index")
                    .map(|i| Box::new(self.lower_expr(i)));
                match (object, index) {
                    (Some(object), Some(index)) => ExprKind::Index { object, index },
                    _ => ExprKind::Other {
                        children: Vec::new(),
                    },
                }
            }
            "field_access" => {
                let object = node
                    .child_by_field_name("object")
                    .map(|o| Box::new(self.lower_expr(o)));
                let field = node
                    .child_by_field_name("field")
                    .map(|f| self.text(f).to_string())
                    .unwrap_or_default();
                match object {
                    Some(object) => ExprKind::FieldAccess { object, field },
                    None => ExprKind::NameRef(field),
                }
            }
            "method_invocation" => {
                let receiver = node
                    .child_by_field_name("object")
                    .map(|o| Box::new(self.lower_expr(o)));
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                let args = self.lower_arguments(node.child_by_field_name("arguments"));
                ExprKind::Call {
                    receiver,
                    name,
                    args,
                }
            }
            "explicit_constructor_invocation" => {
                let args = self.lower_arguments(node.child_by_field_name("arguments"));
                ExprKind::ConstructorDelegation { args }
            }
            "lambda_expression" => return self.lower_lambda(node, id, span),
            _ => {
                let mut cursor = node.walk();
                let children: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|c| is_expression_kind(c.kind()))
                    .collect();
                ExprKind::Other {
                    children: children.into_iter().map(|c| self.lower_expr(c)).collect(),
                }
            }
        };
        Expr { id, span, kind }
    }

    fn lower_arguments(&mut self, args: Option<Node>) -> Vec<Expr> {
        let Some(args) = args else {
            return Vec::new();
        };
        let mut cursor = args.walk();
        let children: Vec<Node> = args.named_children(&mut cursor).collect();
        children.into_iter().map(|c| self.lower_expr(c)).collect()
    }

    fn lower_lambda(&mut self, node: Node, id: NodeId, span: Span) -> Expr {
        self.push_scope();
        let mut params = Vec::new();
        if let Some(param_node) = node.child_by_field_name("parameters") {
            match param_node.kind() {
                "identifier" => {
                    let name = self.text(param_node).to_string();
                    params.push(self.declare(
                        &name,
                        VarKind::ClosureParameter,
                        Some(Self::span(param_node)),
                        None,
                    ));
                }
                "inferred_parameters" => {
                    let mut cursor = param_node.walk();
                    let idents: Vec<Node> = param_node
                        .named_children(&mut cursor)
                        .filter(|n| n.kind() == "identifier")
                        .collect();
                    for ident in idents {
                        let name = self.text(ident).to_string();
                        params.push(self.declare(
                            &name,
                            VarKind::ClosureParameter,
                            Some(Self::span(ident)),
                            None,
                        ));
                    }
                }
                "formal_parameters" => {
                    let mut cursor = param_node.walk();
                    let formals: Vec<Node> = param_node
                        .named_children(&mut cursor)
                        .filter(|n| n.kind() == "formal_parameter")
                        .collect();
                    for formal in formals {
                        if let Some(name_node) = formal.child_by_field_name("name") {
                            let ty = self.type_text(formal.child_by_field_name("type"));
                            let name = self.text(name_node).to_string();
                            params.push(self.declare(
                                &name,
                                VarKind::ClosureParameter,
                                Some(Self::span(name_node)),
                                ty,
                            ));
                        }
                    }
                }
                _ => {}
            }
        }
        if let Some(frame) = self.scopes.last_mut() {
            frame.lambda = true;
            frame.implicit_eligible =
                params.is_empty() && self.options.implicit_closure_param.is_some();
        }
        let body = match node.child_by_field_name("body") {
            Some(body) if body.kind() == "block" => self.lower_block(body),
            Some(expr_body) => {
                let e = self.lower_expr(expr_body);
                Block {
                    id: self.next_id(),
                    span: e.span,
                    statements: vec![Stmt {
                        id: self.next_id(),
                        span: e.span,
                        kind: StmtKind::Expr(e),
                    }],
                }
            }
            None => self.empty_block(span),
        };
        let frame = self.pop_scope();
        Expr {
            id,
            span,
            kind: ExprKind::Closure {
                params,
                implicit_param: frame.created_implicit,
                body,
            },
        }
    }
}

fn is_expression_kind(kind: &str) -> bool {
    matches!(
        kind,
        "identifier"
            | "this"
            | "super"
            | "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal"
            | "decimal_floating_point_literal"
            | "hex_floating_point_literal"
            | "string_literal"
            | "character_literal"
            | "true"
            | "false"
            | "null_literal"
            | "parenthesized_expression"
            | "assignment_expression"
            | "update_expression"
            | "binary_expression"
            | "unary_expression"
            | "ternary_expression"
            | "cast_expression"
            | "instanceof_expression"
            | "array_access"
            | "field_access"
            | "method_invocation"
            | "object_creation_expression"
            | "array_creation_expression"
            | "lambda_expression"
    )
}
