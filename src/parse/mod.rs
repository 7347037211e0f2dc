//! Java front-end: tree-sitter parsing and lowering into the bound AST.
//!
//! The analysis core ([`crate::selection`], [`crate::classify`],
//! [`crate::plan`], [`crate::anchor`]) is language-independent; this module
//! is the one place that knows about source text and grammar node kinds.
//! It parses Java with tree-sitter and lowers the concrete tree into a
//! [`crate::ast::Module`], resolving identifiers against a lexical scope
//! stack so every local reference carries its declaration's [`VarId`].
//!
//! ## Example
//!
//! ```rust
//! use extract_analysis::parse::{parse_module, BinderOptions};
//!
//! let module = parse_module(
//!     "class C { void m() { int x = 1; int y = x + 2; } }",
//!     BinderOptions::default(),
//! )?;
//! assert_eq!(module.classes[0].name, "C");
//! # Ok::<(), extract_analysis::error::ExtractError>(())
//! ```

mod lower;

use tree_sitter::{Language as TsLanguage, Parser, Tree};

use crate::ast::Module;
use crate::error::{ExtractError, Result};

/// Options controlling the identifier binder.
#[derive(Debug, Clone, Default)]
pub struct BinderOptions {
    /// Name of the conventional implicit closure parameter.
    ///
    /// When set, an unresolved reference to this name inside a lambda that
    /// declares no parameters binds to an implicit parameter of that
    /// lambda — the Groovy `it` convention. Off by default for plain Java.
    pub implicit_closure_param: Option<String>,
}

impl BinderOptions {
    /// Enable the implicit closure parameter convention under `name`.
    pub fn with_implicit_closure_param(mut self, name: impl Into<String>) -> Self {
        self.implicit_closure_param = Some(name.into());
        self
    }
}

/// The Java grammar.
fn grammar() -> TsLanguage {
    tree_sitter_java::LANGUAGE.into()
}

/// Parse source text into a tree-sitter tree.
pub fn parse_tree(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar())
        .map_err(|e| ExtractError::parse(format!("failed to set language: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ExtractError::parse("failed to parse source"))?;

    if tree.root_node().has_error() {
        return Err(ExtractError::parse("source contains syntax errors"));
    }
    Ok(tree)
}

/// Parse and lower source text into a bound [`Module`].
pub fn parse_module(source: &str, options: BinderOptions) -> Result<Module> {
    let tree = parse_tree(source)?;
    lower::lower(&tree, source, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_source() {
        let tree = parse_tree("class C { void m() { int x = 1; } }").unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_parse_rejects_broken_source() {
        assert!(parse_tree("class C { void m( { }").is_err());
    }
}
