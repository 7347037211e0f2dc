//! Type resolution and normalization for extraction plans.
//!
//! The planner never infers types itself; it asks a [`TypeResolver`] for
//! each parameter and return candidate and normalizes the answer into the
//! form emitted in generated signatures.

use serde::{Deserialize, Serialize};

use crate::ast::{Span, Variable};

/// A resolved type for a generated signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    /// Unresolved or dynamically typed; rendered as `Object`.
    Dynamic,
    /// A plain named type, already normalized.
    Named(String),
}

impl TypeRef {
    /// The name used in generated code.
    pub fn display_name(&self) -> &str {
        match self {
            TypeRef::Dynamic => "Object",
            TypeRef::Named(name) => name,
        }
    }

    /// Normalize a source type name: strip generic arguments, unwrap boxed
    /// primitives, collapse `GString` to `String`, pass `Object` through.
    pub fn from_source(name: &str) -> TypeRef {
        let base = name.split('<').next().unwrap_or(name).trim();
        if base.is_empty() {
            return TypeRef::Dynamic;
        }
        let normalized = match base {
            "Integer" => "int",
            "Long" => "long",
            "Short" => "short",
            "Byte" => "byte",
            "Double" => "double",
            "Float" => "float",
            "Boolean" => "boolean",
            "Character" => "char",
            "GString" => "String",
            other => other,
        };
        TypeRef::Named(normalized.to_string())
    }
}

/// Type lookup collaborator, keyed by variable identity and the enclosing
/// member's source range.
pub trait TypeResolver {
    fn infer(&self, var: &Variable, enclosing: Span) -> TypeRef;
}

/// Resolver that answers from the declaration's source type annotation.
///
/// `var` declarations and implicit closure parameters carry no annotation
/// and resolve to [`TypeRef::Dynamic`].
#[derive(Debug, Default)]
pub struct DeclaredTypeResolver;

impl TypeResolver for DeclaredTypeResolver {
    fn infer(&self, var: &Variable, _enclosing: Span) -> TypeRef {
        match &var.declared_type {
            Some(name) => TypeRef::from_source(name),
            None => TypeRef::Dynamic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::VarKind;

    #[test]
    fn test_boxed_primitives_unwrap() {
        assert_eq!(TypeRef::from_source("Integer"), TypeRef::Named("int".into()));
        assert_eq!(
            TypeRef::from_source("Boolean"),
            TypeRef::Named("boolean".into())
        );
        assert_eq!(TypeRef::from_source("int"), TypeRef::Named("int".into()));
    }

    #[test]
    fn test_generic_arguments_are_stripped() {
        assert_eq!(
            TypeRef::from_source("List<String>"),
            TypeRef::Named("List".into())
        );
        assert_eq!(
            TypeRef::from_source("Map<String, List<Integer>>"),
            TypeRef::Named("Map".into())
        );
    }

    #[test]
    fn test_gstring_collapses_and_object_passes_through() {
        assert_eq!(
            TypeRef::from_source("GString"),
            TypeRef::Named("String".into())
        );
        assert_eq!(
            TypeRef::from_source("Object"),
            TypeRef::Named("Object".into())
        );
    }

    #[test]
    fn test_declared_resolver_falls_back_to_dynamic() {
        let var = Variable {
            name: "x".into(),
            kind: VarKind::Local,
            decl_span: None,
            declared_type: None,
        };
        let resolver = DeclaredTypeResolver;
        assert_eq!(resolver.infer(&var, Span::new(0, 0)), TypeRef::Dynamic);
        assert_eq!(TypeRef::Dynamic.display_name(), "Object");
    }
}
