//! # Extract Analysis
//!
//! Variable-flow classification and insertion-boundary resolution for
//! "extract method" and "extract local variable" refactorings.
//!
//! Given a user-selected span of source code, this crate determines:
//! - which statements the selection actually spans,
//! - which variables the selected code reads, declares, or mutates,
//! - which of those variables must become parameters of the extracted unit,
//! - which single value (if any) must flow back to the call site,
//! - and, for single-expression extraction, the one statement boundary at
//!   which a new declaration dominates every occurrence it replaces.
//!
//! The analysis core is language-independent and operates on a bound AST
//! ([`ast`]) in which every variable reference carries its declaration's
//! identity. The bundled front-end ([`parse`]) lowers Java source into
//! that AST with tree-sitter.
//!
//! ## Extract method
//!
//! ```rust
//! use extract_analysis::prelude::*;
//!
//! let src = "class C { void m(int a) { int b = a + 1; use(b); } }";
//! let module = parse_module(src, BinderOptions::default())?;
//!
//! let selection = Selection::new(src.find("int b = a + 1;").unwrap(), 14);
//! let outcome = ExtractMethod::new("helper").plan(&module, selection, &DeclaredTypeResolver);
//!
//! let extraction = outcome.extraction.unwrap();
//! assert_eq!(extraction.parameters[0].name, "a");
//! assert_eq!(extraction.return_binding.unwrap().name, "b");
//! # Ok::<(), extract_analysis::error::ExtractError>(())
//! ```
//!
//! ## Extract local variable
//!
//! ```rust
//! use extract_analysis::prelude::*;
//!
//! let src = "class C { void m(int a) { int x = a + 1; int y = a + 1; } }";
//! let module = parse_module(src, BinderOptions::default())?;
//!
//! let selection = Selection::new(src.find("a + 1").unwrap(), 5);
//! let outcome = ExtractLocal::new("sum").replace_all(true).plan(&module, selection);
//!
//! let extraction = outcome.extraction.unwrap();
//! assert_eq!(extraction.occurrences.len(), 2);
//! assert_eq!(extraction.insertion_offset, src.find("int x").unwrap());
//! # Ok::<(), extract_analysis::error::ExtractError>(())
//! ```
//!
//! Nothing the refactoring itself can object to is raised as an error:
//! invalid selections, multiple return candidates, and missing insertion
//! points are reported through the [`status::RefactoringStatus`] embedded
//! in each outcome, with fatal entries suppressing the outcome payload.

pub mod anchor;
pub mod ast;
pub mod classify;
pub mod error;
pub mod extract;
pub mod parse;
pub mod plan;
pub mod selection;
pub mod status;
pub mod types;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::anchor::{AncestorKind, AncestorLink, BoundaryInsertionResolver};
    pub use crate::ast::{Module, NodeId, Span, VarId, Variable};
    pub use crate::classify::{ClassificationSets, Mode, VarSet, VariableClassifier};
    pub use crate::error::{ExtractError, Result};
    pub use crate::extract::{
        ExtractLocal, ExtractMethod, LocalExtraction, LocalExtractionOutcome, MethodExtraction,
        MethodExtractionOutcome, ParameterBinding, ReturnBinding,
    };
    pub use crate::parse::{parse_module, parse_tree, BinderOptions};
    pub use crate::plan::{ExtractionPlan, ExtractionPlanner};
    pub use crate::selection::{ResolvedSelection, Selection, SelectionResolver};
    pub use crate::status::{RefactoringStatus, Severity, StatusEntry};
    pub use crate::types::{DeclaredTypeResolver, TypeRef, TypeResolver};
}

pub use prelude::*;
