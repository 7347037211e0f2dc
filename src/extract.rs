//! The two extraction operations.
//!
//! [`ExtractMethod`] runs the selection resolver, classifies the
//! in-selection and post-selection statements, and plans the extracted
//! method's signature. [`ExtractLocal`] locates the selected expression,
//! collects the occurrences to replace, and resolves the declaration's
//! insertion point. Both return a serializable outcome embedding the
//! accumulated [`RefactoringStatus`]; a fatal entry suppresses the
//! outcome payload but is never raised as an error.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::anchor::BoundaryInsertionResolver;
use crate::ast::{
    for_each_expr, for_each_expr_in_block, structurally_equal, ClassDecl, Expr, ExprKind, Member,
    Module, Span,
};
use crate::classify::{Mode, VariableClassifier};
use crate::plan::ExtractionPlanner;
use crate::selection::{Selection, SelectionResolver};
use crate::status::RefactoringStatus;
use crate::types::TypeResolver;

/// One parameter of an extracted method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub name: String,
    pub type_name: String,
}

/// The value an extracted method hands back to its call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnBinding {
    pub name: String,
    pub type_name: String,
    /// True when the call site must declare the variable.
    pub must_declare: bool,
}

/// Payload of a successful method-extraction analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodExtraction {
    pub parameters: Vec<ParameterBinding>,
    pub return_binding: Option<ReturnBinding>,
    /// Spans of the statements moving into the new method.
    pub in_selection: Vec<Span>,
    /// Spans of the statements that stay behind and run afterwards.
    pub post_selection: Vec<Span>,
    /// Offset at which the new method declaration is inserted.
    pub declaration_offset: usize,
    /// Source range replaced by the call to the new method.
    pub call_range: Span,
}

/// Result of a method-extraction analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodExtractionOutcome {
    pub status: RefactoringStatus,
    /// Present unless a fatal entry was recorded.
    pub extraction: Option<MethodExtraction>,
}

/// Payload of a successful local-variable extraction analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalExtraction {
    /// Offset at which the new declaration is inserted.
    pub insertion_offset: usize,
    /// Spans of every occurrence replaced by the new variable, in source
    /// order.
    pub occurrences: Vec<Span>,
}

/// Result of a local-variable extraction analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalExtractionOutcome {
    pub status: RefactoringStatus,
    pub extraction: Option<LocalExtraction>,
}

/// Extract-method operation, configured with the new method's name.
#[derive(Debug, Clone)]
pub struct ExtractMethod {
    name: String,
}

impl ExtractMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Analyze `selection` for extraction into a new method.
    pub fn plan(
        &self,
        module: &Module,
        selection: Selection,
        types: &dyn TypeResolver,
    ) -> MethodExtractionOutcome {
        let mut status = RefactoringStatus::new();
        let resolved = SelectionResolver::new(module).resolve(selection);
        if resolved.is_empty() {
            status.add_fatal(
                "selection does not fully cover a statement",
                Some(selection.span()),
            );
            return MethodExtractionOutcome {
                status,
                extraction: None,
            };
        }
        let (Some(class), Some(member), Some(call_range)) =
            (resolved.class, resolved.member, resolved.call_range())
        else {
            status.add_fatal("no enclosing declaration found", Some(selection.span()));
            return MethodExtractionOutcome {
                status,
                extraction: None,
            };
        };

        if let Some(span) = find_constructor_delegation(&resolved.in_selection) {
            status.add_fatal(
                "cannot extract a constructor delegation call",
                Some(span),
            );
            return MethodExtractionOutcome {
                status,
                extraction: None,
            };
        }

        let mode = if resolved.in_repeatable {
            Mode::Repeatable
        } else {
            Mode::Default
        };
        let classifier = VariableClassifier::new(module);
        let selection_sets =
            classifier.classify(&resolved.in_selection, mode, &resolved.construct_vars);
        let post_sets =
            classifier.classify(&resolved.post_selection, mode, &resolved.construct_vars);

        let planner = ExtractionPlanner::new(module, types);
        let Some(plan) = planner.plan(&selection_sets, &post_sets.used, member.span, &mut status)
        else {
            return MethodExtractionOutcome {
                status,
                extraction: None,
            };
        };

        if class.has_method(&self.name) {
            status.add_error(
                format!(
                    "method '{}' already exists in class '{}'",
                    self.name, class.name
                ),
                None,
            );
        }

        let parameters = plan
            .parameters
            .iter()
            .map(|(v, ty)| ParameterBinding {
                name: module.var_name(*v).to_string(),
                type_name: ty.display_name().to_string(),
            })
            .collect();
        let return_binding = plan.return_variable.as_ref().map(|(v, ty)| ReturnBinding {
            name: module.var_name(*v).to_string(),
            type_name: ty.display_name().to_string(),
            must_declare: plan.return_must_be_declared,
        });
        debug!(
            method = %self.name,
            class = ?resolved.class_name(),
            parameters = plan.parameters.len(),
            "method extraction planned"
        );
        MethodExtractionOutcome {
            status,
            extraction: Some(MethodExtraction {
                parameters,
                return_binding,
                in_selection: resolved.in_spans(),
                post_selection: resolved.post_spans(),
                declaration_offset: member.span.end,
                call_range,
            }),
        }
    }
}

/// Extract-local-variable operation.
#[derive(Debug, Clone)]
pub struct ExtractLocal {
    name: String,
    replace_all: bool,
}

impl ExtractLocal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replace_all: false,
        }
    }

    /// Also replace every other structurally identical expression in the
    /// enclosing member.
    pub fn replace_all(mut self, yes: bool) -> Self {
        self.replace_all = yes;
        self
    }

    /// Analyze `selection` for extraction into a new local variable.
    pub fn plan(&self, module: &Module, selection: Selection) -> LocalExtractionOutcome {
        let mut status = RefactoringStatus::new();
        let sel = selection.span();
        let Some((class, member)) = module.enclosing_member(sel) else {
            status.add_fatal("no enclosing declaration found", Some(sel));
            return LocalExtractionOutcome {
                status,
                extraction: None,
            };
        };
        let Some(target) = find_expression(member, sel) else {
            status.add_fatal(
                "selection does not cover a single expression",
                Some(sel),
            );
            return LocalExtractionOutcome {
                status,
                extraction: None,
            };
        };

        let occurrences: Vec<&Expr> = if self.replace_all {
            collect_matches(member, target)
        } else {
            vec![target]
        };

        if is_assignment_target(member, target) {
            status.add_warning(
                "the selected expression is the target of an assignment",
                Some(target.span),
            );
        }
        if name_is_visible(module, class, member, &self.name) {
            status.add_warning(
                format!("name '{}' is already visible at the insertion point", self.name),
                None,
            );
        }

        let mut resolver = BoundaryInsertionResolver::new(module);
        let Some(insertion_offset) = resolver.resolve(&occurrences, &mut status) else {
            return LocalExtractionOutcome {
                status,
                extraction: None,
            };
        };
        debug!(
            name = %self.name,
            occurrences = occurrences.len(),
            insertion_offset,
            "local extraction planned"
        );
        LocalExtractionOutcome {
            status,
            extraction: Some(LocalExtraction {
                insertion_offset,
                occurrences: occurrences.iter().map(|o| o.span).collect(),
            }),
        }
    }
}

/// Span of the first constructor delegation in the given statements.
fn find_constructor_delegation(statements: &[&crate::ast::Stmt]) -> Option<Span> {
    let mut found = None;
    for stmt in statements {
        crate::ast::for_each_expr_in_stmt(stmt, &mut |e| {
            if found.is_none() && matches!(e.kind, ExprKind::ConstructorDelegation { .. }) {
                found = Some(e.span);
            }
        });
        if found.is_some() {
            break;
        }
    }
    found
}

/// Visit every expression of a member, body and field initializer alike.
fn for_each_member_expr<'m>(member: &'m Member, f: &mut impl FnMut(&'m Expr)) {
    if let Some(body) = &member.body {
        for_each_expr_in_block(body, f);
    }
    if let Some(init) = &member.initializer {
        for_each_expr(init, f);
    }
}

/// The expression whose span equals the selection, if any.
fn find_expression<'m>(member: &'m Member, sel: Span) -> Option<&'m Expr> {
    let mut found = None;
    for_each_member_expr(member, &mut |e| {
        if found.is_none() && e.span == sel {
            found = Some(e);
        }
    });
    found
}

/// Every expression in the member structurally equal to `target`, in
/// source order. Includes `target` itself.
fn collect_matches<'m>(member: &'m Member, target: &Expr) -> Vec<&'m Expr> {
    let mut out = Vec::new();
    for_each_member_expr(member, &mut |e| {
        if structurally_equal(e, target) {
            out.push(e);
        }
    });
    out
}

/// True if `target` is the left side of an assignment in the member.
fn is_assignment_target(member: &Member, target: &Expr) -> bool {
    let mut hit = false;
    for_each_member_expr(member, &mut |e| {
        if let ExprKind::Assign { target: t, .. } = &e.kind {
            if t.id == target.id {
                hit = true;
            }
        }
    });
    hit
}

/// True if `name` collides with a field of the class or any variable
/// referenced or declared within the member.
fn name_is_visible(module: &Module, class: &ClassDecl, member: &Member, name: &str) -> bool {
    if class.fields.iter().any(|f| f == name) {
        return true;
    }
    if member
        .params
        .iter()
        .any(|&p| module.var_name(p) == name)
    {
        return true;
    }
    let mut hit = false;
    for_each_member_expr(member, &mut |e| {
        if let ExprKind::VarRef(v) = &e.kind {
            if module.var_name(*v) == name {
                hit = true;
            }
        }
    });
    if hit {
        return true;
    }
    // declarations the member never reads back still shadow the name
    let mut declared = false;
    if let Some(body) = &member.body {
        visit_decl_names(module, body, name, &mut declared);
    }
    declared
}

fn visit_decl_names(module: &Module, block: &crate::ast::Block, name: &str, hit: &mut bool) {
    use crate::ast::{ForInit, StmtKind};
    for stmt in &block.statements {
        match &stmt.kind {
            StmtKind::VarDecl(decls) => {
                if decls.iter().any(|d| module.var_name(d.var) == name) {
                    *hit = true;
                }
            }
            StmtKind::If {
                then_block,
                else_block,
                ..
            } => {
                visit_decl_names(module, then_block, name, hit);
                if let Some(e) = else_block {
                    visit_decl_names(module, e, name, hit);
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                visit_decl_names(module, body, name, hit);
            }
            StmtKind::For { init, body, .. } => {
                if let Some(ForInit::Decl(decls)) = init {
                    if decls.iter().any(|d| module.var_name(d.var) == name) {
                        *hit = true;
                    }
                }
                visit_decl_names(module, body, name, hit);
            }
            StmtKind::ForEach { var, body, .. } => {
                if module.var_name(*var) == name {
                    *hit = true;
                }
                visit_decl_names(module, body, name, hit);
            }
            StmtKind::Block(b) => visit_decl_names(module, b, name, hit),
            StmtKind::Other { blocks, .. } => {
                for b in blocks {
                    visit_decl_names(module, b, name, hit);
                }
            }
            StmtKind::Expr(_) | StmtKind::Return(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_module, BinderOptions};
    use crate::types::DeclaredTypeResolver;

    fn selection_of(src: &str, fragment: &str) -> Selection {
        Selection::new(src.find(fragment).expect("fragment present"), fragment.len())
    }

    #[test]
    fn test_extract_method_constructor_delegation_is_fatal() {
        let src = "class C { C() { this(1); init(); } C(int x) { } void init() { } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let outcome = ExtractMethod::new("helper").plan(
            &module,
            selection_of(src, "this(1); init();"),
            &DeclaredTypeResolver,
        );
        assert!(outcome.status.has_fatal());
        assert!(outcome.extraction.is_none());
    }

    #[test]
    fn test_extract_method_name_collision_is_an_error_not_fatal() {
        let src = "class C { void helper() { } void m(int a) { use(a); } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let outcome = ExtractMethod::new("helper").plan(
            &module,
            selection_of(src, "use(a);"),
            &DeclaredTypeResolver,
        );
        assert!(!outcome.status.has_fatal());
        assert_eq!(
            outcome.status.max_severity(),
            Some(crate::status::Severity::Error)
        );
        assert!(outcome.extraction.is_some());
    }

    #[test]
    fn test_extract_method_outcome_offsets() {
        let src = "class C { void m(int a) { int b = a + 1; use(b); } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let outcome = ExtractMethod::new("helper").plan(
            &module,
            selection_of(src, "int b = a + 1;"),
            &DeclaredTypeResolver,
        );
        let extraction = outcome.extraction.unwrap();
        let stmt_at = src.find("int b = a + 1;").unwrap();
        assert_eq!(
            extraction.call_range,
            Span::new(stmt_at, stmt_at + "int b = a + 1;".len())
        );
        // the new method lands after the enclosing one
        assert_eq!(extraction.declaration_offset, src.find("} }").unwrap() + 1);
        assert_eq!(extraction.parameters.len(), 1);
        assert_eq!(extraction.parameters[0].name, "a");
        assert_eq!(extraction.parameters[0].type_name, "int");
        let ret = extraction.return_binding.unwrap();
        assert_eq!(ret.name, "b");
        assert!(ret.must_declare);
    }

    #[test]
    fn test_extract_method_empty_selection_is_fatal() {
        let src = "class C { void m() { int a = 1; } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let outcome =
            ExtractMethod::new("helper").plan(&module, Selection::new(0, 0), &DeclaredTypeResolver);
        assert!(outcome.status.has_fatal());
    }

    #[test]
    fn test_extract_local_single_occurrence() {
        let src = "class C { void m(int a) { use(a + 1); } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let outcome = ExtractLocal::new("sum").plan(&module, selection_of(src, "a + 1"));
        let extraction = outcome.extraction.unwrap();
        assert_eq!(extraction.occurrences.len(), 1);
        assert_eq!(extraction.insertion_offset, src.find("use(a + 1);").unwrap());
    }

    #[test]
    fn test_extract_local_replace_all_collects_matches() {
        let src = "class C { void m(int a) { int x = a + 1; log(); int y = a + 1; } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let outcome = ExtractLocal::new("sum")
            .replace_all(true)
            .plan(&module, selection_of(src, "a + 1"));
        let extraction = outcome.extraction.unwrap();
        assert_eq!(extraction.occurrences.len(), 2);
        assert!(extraction.occurrences[0].start < extraction.occurrences[1].start);
        assert_eq!(
            extraction.insertion_offset,
            src.find("int x = a + 1;").unwrap()
        );
    }

    #[test]
    fn test_extract_local_name_collision_warns() {
        let src = "class C { void m(int a) { int sum = 0; use(a + 1, sum); } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let outcome = ExtractLocal::new("sum").plan(&module, selection_of(src, "a + 1"));
        assert_eq!(
            outcome.status.max_severity(),
            Some(crate::status::Severity::Warning)
        );
        assert!(outcome.extraction.is_some());
    }

    #[test]
    fn test_extract_local_assignment_target_warns() {
        let src = "class C { void m(int[] arr, int i, int v) { arr[i] = v; } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let outcome = ExtractLocal::new("slot").plan(&module, selection_of(src, "arr[i]"));
        let warnings = outcome
            .status
            .messages_at(crate::status::Severity::Warning);
        assert!(warnings
            .iter()
            .any(|m| m.contains("target of an assignment")));
        assert!(outcome.extraction.is_some());
    }

    #[test]
    fn test_extract_local_partial_expression_is_fatal() {
        let src = "class C { void m(int a) { use(a + 1); } }";
        let module = parse_module(src, BinderOptions::default()).unwrap();
        // "+ 1" is not an expression boundary
        let outcome = ExtractLocal::new("sum").plan(&module, selection_of(src, "+ 1"));
        assert!(outcome.status.has_fatal());
        assert!(outcome.extraction.is_none());
    }
}
