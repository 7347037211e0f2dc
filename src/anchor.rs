//! Statement-boundary insertion point for a set of replaced occurrences.
//!
//! Every occurrence gets an ancestor chain from the module root; the
//! chains' longest common prefix (compared by node identity) narrows the
//! search to the region containing them all, and the deepest statement in
//! that prefix anchors the insertion. Chains are memoized per resolver
//! instance and never survive an invocation.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Block, Expr, ExprKind, ForInit, Member, Module, NodeId, Span, Stmt, StmtKind};
use crate::status::RefactoringStatus;

/// Kind of node on an ancestor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AncestorKind {
    Member,
    Block,
    Statement,
    Expression,
}

/// One link of an ancestor chain, root first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorLink {
    pub id: NodeId,
    pub kind: AncestorKind,
    pub span: Span,
}

/// Resolves the single insertion offset dominating a set of occurrences.
pub struct BoundaryInsertionResolver<'m> {
    module: &'m Module,
    chains: HashMap<NodeId, Option<Vec<AncestorLink>>>,
}

impl<'m> BoundaryInsertionResolver<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            chains: HashMap::new(),
        }
    }

    /// Compute the insertion offset for `occurrences`. Records a fatal
    /// status entry and returns `None` when the occurrences share no
    /// common root or no statement-level insertion point exists.
    pub fn resolve(
        &mut self,
        occurrences: &[&Expr],
        status: &mut RefactoringStatus,
    ) -> Option<usize> {
        if occurrences.is_empty() {
            status.add_fatal("no occurrences to anchor", None);
            return None;
        }

        let mut chains: Vec<Vec<AncestorLink>> = Vec::with_capacity(occurrences.len());
        for occ in occurrences {
            match self.chain_for(occ) {
                Some(chain) => chains.push(chain),
                None => {
                    status.add_fatal(
                        "occurrence is not reachable from the module root",
                        Some(occ.span),
                    );
                    return None;
                }
            }
        }

        let prefix_len = common_prefix_len(&chains);
        if prefix_len == 0 {
            status.add_fatal("no common root for extracted occurrences", None);
            return None;
        }
        let prefix = &chains[0][..prefix_len];

        // deepest statement-level link in the common prefix
        let anchor_index = prefix.iter().rposition(|link| {
            matches!(link.kind, AncestorKind::Statement | AncestorKind::Block)
        });
        let Some(anchor_index) = anchor_index else {
            status.add_fatal("no suitable extraction location", None);
            return None;
        };
        let anchor = prefix[anchor_index];

        let offset = match anchor.kind {
            AncestorKind::Statement => anchor.span.start,
            _ => {
                // block anchor: insert before the direct child holding the
                // earliest occurrence
                let earliest = occurrences
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, o)| o.span.start)
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                match chains[earliest].get(anchor_index + 1) {
                    Some(child) => child.span.start,
                    None => {
                        status.add_fatal("no suitable extraction location", None);
                        return None;
                    }
                }
            }
        };
        debug!(
            occurrences = occurrences.len(),
            anchor = ?anchor.kind,
            offset,
            "insertion point resolved"
        );
        Some(offset)
    }

    /// Ancestor chain for one occurrence, memoized by its node identity.
    fn chain_for(&mut self, occurrence: &Expr) -> Option<Vec<AncestorLink>> {
        if let Some(cached) = self.chains.get(&occurrence.id) {
            return cached.clone();
        }
        let mut chain = Vec::new();
        let found = self.search_module(occurrence, &mut chain);
        let result = if found { Some(chain) } else { None };
        self.chains.insert(occurrence.id, result.clone());
        result
    }

    fn search_module(&self, target: &Expr, chain: &mut Vec<AncestorLink>) -> bool {
        for class in &self.module.classes {
            for member in &class.members {
                if !member.span.contains(target.span) {
                    continue;
                }
                chain.push(AncestorLink {
                    id: member.id,
                    kind: AncestorKind::Member,
                    span: member.span,
                });
                if self.search_member(member, target, chain) {
                    return true;
                }
                chain.pop();
            }
        }
        false
    }

    fn search_member(&self, member: &Member, target: &Expr, chain: &mut Vec<AncestorLink>) -> bool {
        if let Some(body) = &member.body {
            if self.search_block(body, target, chain) {
                return true;
            }
        }
        if let Some(init) = &member.initializer {
            if self.search_expr(init, target, chain) {
                return true;
            }
        }
        false
    }

    fn search_block(&self, block: &Block, target: &Expr, chain: &mut Vec<AncestorLink>) -> bool {
        if !block.span.contains(target.span) {
            return false;
        }
        chain.push(AncestorLink {
            id: block.id,
            kind: AncestorKind::Block,
            span: block.span,
        });
        for stmt in &block.statements {
            if self.search_stmt(stmt, target, chain) {
                return true;
            }
        }
        chain.pop();
        false
    }

    fn search_stmt(&self, stmt: &Stmt, target: &Expr, chain: &mut Vec<AncestorLink>) -> bool {
        if !stmt.span.contains(target.span) {
            return false;
        }
        chain.push(AncestorLink {
            id: stmt.id,
            kind: AncestorKind::Statement,
            span: stmt.span,
        });
        let found = match &stmt.kind {
            StmtKind::Expr(e) => self.search_expr(e, target, chain),
            StmtKind::VarDecl(decls) => decls
                .iter()
                .filter_map(|d| d.init.as_ref())
                .any(|e| self.search_expr(e, target, chain)),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.search_expr(cond, target, chain)
                    || self.search_block(then_block, target, chain)
                    || else_block
                        .as_ref()
                        .is_some_and(|e| self.search_block(e, target, chain))
            }
            StmtKind::While { cond, body } => {
                self.search_expr(cond, target, chain) || self.search_block(body, target, chain)
            }
            StmtKind::DoWhile { body, cond } => {
                self.search_block(body, target, chain) || self.search_expr(cond, target, chain)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let in_init = match init {
                    Some(ForInit::Decl(decls)) => decls
                        .iter()
                        .filter_map(|d| d.init.as_ref())
                        .any(|e| self.search_expr(e, target, chain)),
                    Some(ForInit::Exprs(exprs)) => {
                        exprs.iter().any(|e| self.search_expr(e, target, chain))
                    }
                    None => false,
                };
                in_init
                    || cond
                        .as_ref()
                        .is_some_and(|c| self.search_expr(c, target, chain))
                    || update.iter().any(|e| self.search_expr(e, target, chain))
                    || self.search_block(body, target, chain)
            }
            StmtKind::ForEach { iterable, body, .. } => {
                self.search_expr(iterable, target, chain)
                    || self.search_block(body, target, chain)
            }
            StmtKind::Return(value) => value
                .as_ref()
                .is_some_and(|e| self.search_expr(e, target, chain)),
            StmtKind::Block(b) => self.search_block(b, target, chain),
            StmtKind::Other { exprs, blocks } => {
                exprs.iter().any(|e| self.search_expr(e, target, chain))
                    || blocks.iter().any(|b| self.search_block(b, target, chain))
            }
        };
        if found {
            return true;
        }
        chain.pop();
        false
    }

    fn search_expr(&self, expr: &Expr, target: &Expr, chain: &mut Vec<AncestorLink>) -> bool {
        if !expr.span.contains(target.span) {
            return false;
        }
        chain.push(AncestorLink {
            id: expr.id,
            kind: AncestorKind::Expression,
            span: expr.span,
        });
        if expr.id == target.id {
            return true;
        }
        let found = match &expr.kind {
            ExprKind::VarRef(_) | ExprKind::NameRef(_) | ExprKind::Literal(_) => false,
            ExprKind::Assign { target: t, value, .. } => {
                self.search_expr(t, target, chain) || self.search_expr(value, target, chain)
            }
            ExprKind::Update { target: t, .. } => self.search_expr(t, target, chain),
            ExprKind::Binary { left, right, .. } => {
                self.search_expr(left, target, chain) || self.search_expr(right, target, chain)
            }
            ExprKind::Index { object, index } => {
                self.search_expr(object, target, chain)
                    || self.search_expr(index, target, chain)
            }
            ExprKind::FieldAccess { object, .. } => self.search_expr(object, target, chain),
            ExprKind::Call { receiver, args, .. } => {
                receiver
                    .as_ref()
                    .is_some_and(|r| self.search_expr(r, target, chain))
                    || args.iter().any(|a| self.search_expr(a, target, chain))
            }
            ExprKind::ConstructorDelegation { args } => {
                args.iter().any(|a| self.search_expr(a, target, chain))
            }
            ExprKind::Closure { body, .. } => self.search_block(body, target, chain),
            ExprKind::Other { children } => {
                children.iter().any(|c| self.search_expr(c, target, chain))
            }
        };
        if found {
            return true;
        }
        chain.pop();
        false
    }
}

fn common_prefix_len(chains: &[Vec<AncestorLink>]) -> usize {
    let Some(first) = chains.first() else {
        return 0;
    };
    let mut len = first.len();
    for chain in &chains[1..] {
        let shared = first
            .iter()
            .zip(chain.iter())
            .take_while(|(a, b)| a.id == b.id)
            .count();
        len = len.min(shared);
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::structurally_equal;
    use crate::ast::for_each_expr_in_block;
    use crate::parse::{parse_module, BinderOptions};

    /// All expressions in the module whose source text equals `needle`.
    fn find_occurrences<'m>(module: &'m Module, src: &str, needle: &str) -> Vec<&'m Expr> {
        let mut out = Vec::new();
        for class in &module.classes {
            for member in &class.members {
                if let Some(body) = &member.body {
                    for_each_expr_in_block(body, &mut |e| {
                        if &src[e.span.start..e.span.end] == needle {
                            out.push(e);
                        }
                    });
                }
                if let Some(init) = &member.initializer {
                    crate::ast::for_each_expr(init, &mut |e| {
                        if &src[e.span.start..e.span.end] == needle {
                            out.push(e);
                        }
                    });
                }
            }
        }
        out
    }

    #[test]
    fn test_sibling_occurrences_anchor_at_earliest_statement() {
        let src = "class C { void m(int a, int b) { first(); int x = a + b; third(); int y = a + b; fifth(); } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let occurrences = find_occurrences(&module, src, "a + b");
        assert_eq!(occurrences.len(), 2);
        assert!(structurally_equal(occurrences[0], occurrences[1]));
        let mut status = RefactoringStatus::new();
        let offset = BoundaryInsertionResolver::new(&module)
            .resolve(&occurrences, &mut status)
            .unwrap();
        assert_eq!(offset, src.find("int x = a + b;").unwrap());
        assert!(status.is_ok());
    }

    #[test]
    fn test_single_occurrence_anchors_at_its_statement() {
        let src = "class C { void m(int a) { first(); use(a + 1); } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let occurrences = find_occurrences(&module, src, "a + 1");
        assert_eq!(occurrences.len(), 1);
        let mut status = RefactoringStatus::new();
        let offset = BoundaryInsertionResolver::new(&module)
            .resolve(&occurrences, &mut status)
            .unwrap();
        assert_eq!(offset, src.find("use(a + 1);").unwrap());
    }

    #[test]
    fn test_occurrences_in_different_branches_anchor_outside() {
        let src = "class C { void m(boolean f, int a) { if (f) { use(a + 1); } else { sink(a + 1); } } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let occurrences = find_occurrences(&module, src, "a + 1");
        assert_eq!(occurrences.len(), 2);
        let mut status = RefactoringStatus::new();
        let offset = BoundaryInsertionResolver::new(&module)
            .resolve(&occurrences, &mut status)
            .unwrap();
        // the deepest common statement is the if itself
        assert_eq!(offset, src.find("if (f)").unwrap());
    }

    #[test]
    fn test_field_initializer_without_statement_context_is_fatal() {
        let src = "class C { int x = 1 + 2; }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let occurrences = find_occurrences(&module, src, "1 + 2");
        assert_eq!(occurrences.len(), 1);
        let mut status = RefactoringStatus::new();
        let offset = BoundaryInsertionResolver::new(&module).resolve(&occurrences, &mut status);
        assert!(offset.is_none());
        assert!(status.has_fatal());
    }

    #[test]
    fn test_occurrences_in_different_members_have_no_common_root() {
        let src = "class C { void m(int a) { use(a + 1); } void n(int a) { use(a + 1); } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let occurrences = find_occurrences(&module, src, "a + 1");
        assert_eq!(occurrences.len(), 2);
        let mut status = RefactoringStatus::new();
        let offset = BoundaryInsertionResolver::new(&module).resolve(&occurrences, &mut status);
        assert!(offset.is_none());
        assert!(status.has_fatal());
    }

    #[test]
    fn test_occurrence_inside_closure_anchors_in_its_body() {
        let src = "class C { Runnable r = () -> { int a = 1; use(a + 1); }; }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let occurrences = find_occurrences(&module, src, "a + 1");
        assert_eq!(occurrences.len(), 1);
        let mut status = RefactoringStatus::new();
        let offset = BoundaryInsertionResolver::new(&module)
            .resolve(&occurrences, &mut status)
            .unwrap();
        assert_eq!(offset, src.find("use(a + 1);").unwrap());
    }
}
