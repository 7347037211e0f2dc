//! Parameter and return planning for method extraction.
//!
//! Combines the in-selection classification with the post-selection `used`
//! set. Parameters are everything the selection reads from outside, in
//! first-appearance order. A value must flow back out when the selection
//! assigns it and later code reads it, or when a repeatable construct
//! carries it between iterations; more than one such value is a fatal
//! failure because generated code returns at most one.

use tracing::debug;

use crate::ast::{Module, Span, VarId};
use crate::classify::{ClassificationSets, VarSet};
use crate::status::RefactoringStatus;
use crate::types::{TypeRef, TypeResolver};

/// The computed signature for an extracted method.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    /// Parameters in first-appearance order.
    pub parameters: Vec<(VarId, TypeRef)>,
    /// The single value flowing back out, if any.
    pub return_variable: Option<(VarId, TypeRef)>,
    /// True when the call site must declare the return variable rather
    /// than assign to an existing binding.
    pub return_must_be_declared: bool,
}

/// Plans extraction signatures for one module.
pub struct ExtractionPlanner<'m> {
    module: &'m Module,
    types: &'m dyn TypeResolver,
}

impl<'m> ExtractionPlanner<'m> {
    pub fn new(module: &'m Module, types: &'m dyn TypeResolver) -> Self {
        Self { module, types }
    }

    /// Compute the plan from the in-selection sets and the post-selection
    /// `used` set. `enclosing` is the enclosing member's span, passed to
    /// the type resolver. Returns `None` after recording a fatal entry
    /// when more than one return candidate exists.
    pub fn plan(
        &self,
        selection: &ClassificationSets,
        post_used: &VarSet,
        enclosing: Span,
        status: &mut RefactoringStatus,
    ) -> Option<ExtractionPlan> {
        let parameters: Vec<(VarId, TypeRef)> = selection
            .used
            .iter()
            .map(|&v| (v, self.infer(v, enclosing)))
            .collect();

        // a value flows out when later code reads something the selection
        // assigned or newly declared, or when the construct carries it
        // between iterations
        let mut candidates: Vec<VarId> = selection
            .assigned_or_returned
            .iter()
            .filter(|v| post_used.contains(*v))
            .copied()
            .collect();
        for &v in &selection.declared {
            if post_used.contains(&v) && !candidates.contains(&v) {
                candidates.push(v);
            }
        }
        for &v in &selection.loop_carried {
            if !candidates.contains(&v) {
                candidates.push(v);
            }
        }

        if candidates.len() > 1 {
            let listing = candidates
                .iter()
                .map(|&v| {
                    format!(
                        "{} ({})",
                        self.module.var_name(v),
                        self.infer(v, enclosing).display_name()
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            status.add_fatal(
                format!("cannot extract more than one return value: {listing}"),
                None,
            );
            return None;
        }

        let return_variable = candidates
            .first()
            .map(|&v| (v, self.infer(v, enclosing)));
        let return_must_be_declared = match candidates.first() {
            Some(v) => post_used.contains(v) && selection.declared.contains(v),
            None => false,
        };

        debug!(
            parameters = parameters.len(),
            return_variable = ?return_variable
                .as_ref()
                .map(|(v, _)| self.module.var_name(*v)),
            return_must_be_declared,
            "extraction plan computed"
        );
        Some(ExtractionPlan {
            parameters,
            return_variable,
            return_must_be_declared,
        })
    }

    fn infer(&self, var: VarId, enclosing: Span) -> TypeRef {
        self.types.infer(self.module.variable(var), enclosing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Mode, VariableClassifier};
    use crate::parse::{parse_module, BinderOptions};
    use crate::selection::{Selection, SelectionResolver};
    use crate::types::DeclaredTypeResolver;

    struct Planned {
        module: crate::ast::Module,
        plan: Option<ExtractionPlan>,
        status: RefactoringStatus,
    }

    fn plan_fragment(src: &str, fragment: &str) -> Planned {
        let module = parse_module(src, BinderOptions::default()).unwrap();
        let offset = src.find(fragment).expect("fragment present");
        let resolver = SelectionResolver::new(&module);
        let resolved = resolver.resolve(Selection::new(offset, fragment.len()));
        assert!(!resolved.is_empty());
        let mode = if resolved.in_repeatable {
            Mode::Repeatable
        } else {
            Mode::Default
        };
        let classifier = VariableClassifier::new(&module);
        let selection_sets =
            classifier.classify(&resolved.in_selection, mode, &resolved.construct_vars);
        let post_sets =
            classifier.classify(&resolved.post_selection, mode, &resolved.construct_vars);
        let member_span = resolved.member.unwrap().span;
        let mut status = RefactoringStatus::new();
        let types = DeclaredTypeResolver;
        let plan = ExtractionPlanner::new(&module, &types).plan(
            &selection_sets,
            &post_sets.used,
            member_span,
            &mut status,
        );
        Planned {
            module,
            plan,
            status,
        }
    }

    fn param_names(p: &Planned) -> Vec<String> {
        p.plan
            .as_ref()
            .unwrap()
            .parameters
            .iter()
            .map(|(v, _)| p.module.var_name(*v).to_string())
            .collect()
    }

    #[test]
    fn test_parameters_without_return() {
        let src = "class C { void m() { int a = 1; int b = 2; int c = a + b; } }";
        let p = plan_fragment(src, "int c = a + b;");
        assert_eq!(param_names(&p), vec!["a", "b"]);
        assert!(p.plan.as_ref().unwrap().return_variable.is_none());
        assert!(p.status.is_ok());
    }

    #[test]
    fn test_return_of_value_read_after_selection() {
        let src = "class C { void m(int a) { int b = a + 1; int c = b * 2; use(c); } }";
        let p = plan_fragment(src, "int b = a + 1; int c = b * 2;");
        let plan = p.plan.as_ref().unwrap();
        assert_eq!(param_names(&p), vec!["a"]);
        let (ret, ty) = plan.return_variable.as_ref().unwrap();
        assert_eq!(p.module.var_name(*ret), "c");
        assert_eq!(ty.display_name(), "int");
        assert!(plan.return_must_be_declared);
    }

    #[test]
    fn test_assignment_to_existing_binding_needs_no_declaration() {
        let src = "class C { void m(int a) { int c = 0; c = a + 1; use(c); } }";
        let p = plan_fragment(src, "c = a + 1;");
        let plan = p.plan.as_ref().unwrap();
        let (ret, _) = plan.return_variable.as_ref().unwrap();
        assert_eq!(p.module.var_name(*ret), "c");
        assert!(!plan.return_must_be_declared);
    }

    #[test]
    fn test_loop_carried_is_a_return_candidate_without_post_use() {
        let src = "class C { void m(int[] xs) { int total = 0; for (int item : xs) { total = total + item; } } }";
        let p = plan_fragment(src, "total = total + item;");
        let plan = p.plan.as_ref().unwrap();
        assert_eq!(param_names(&p), vec!["total"]);
        let (ret, _) = plan.return_variable.as_ref().unwrap();
        assert_eq!(p.module.var_name(*ret), "total");
        assert!(!plan.return_must_be_declared);
    }

    #[test]
    fn test_two_candidates_is_fatal() {
        let src = "class C { void m() { int a = 0; int b = 0; a = 1; b = 2; use(a, b); } }";
        let p = plan_fragment(src, "a = 1; b = 2;");
        assert!(p.plan.is_none());
        assert!(p.status.has_fatal());
        let message = &p.status.entries[0].message;
        assert!(message.contains("a (int)"), "got: {message}");
        assert!(message.contains("b (int)"), "got: {message}");
    }

    #[test]
    fn test_assigned_but_unread_after_selection_is_dropped() {
        let src = "class C { void m() { int a = 0; a = 1; done(); } }";
        let p = plan_fragment(src, "a = 1;");
        assert!(p.plan.as_ref().unwrap().return_variable.is_none());
    }
}
