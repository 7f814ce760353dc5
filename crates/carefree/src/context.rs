//! Scope stack for variable resolution during rendering.

use crate::error::{CarefreeError, Result};
use crate::value::Value;
use indexmap::IndexMap;
use tracing::trace;

const NULL: &Value = &Value::Null;

/// Named scopes, innermost last, over the root data object.
pub struct Context {
    root: IndexMap<String, Value>,
    scopes: Vec<IndexMap<String, Value>>,
}

impl Context {
    /// Create a new context from root data
    pub fn new(root_data: Value) -> Result<Self> {
        let root = match root_data {
            Value::Object(obj) => obj,
            Value::Null => IndexMap::new(),
            other => {
                return Err(CarefreeError::Type {
                    message: format!("Root data must be an object, got {}", other.type_name()),
                });
            }
        };

        Ok(Self {
            root,
            scopes: Vec::new(),
        })
    }

    /// Resolve a path such as `["article", "category", "name"]`.
    ///
    /// Unresolvable paths yield `Null` instead of an error.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> &Value {
        let Some((name, rest)) = path.split_first() else {
            return NULL;
        };

        let resolved = self
            .lookup(name.as_ref())
            .and_then(|value| value.get_path(rest));

        match resolved {
            Some(value) => value,
            None => {
                trace!(
                    path = %path.iter().map(|s| s.as_ref()).collect::<Vec<&str>>().join("."),
                    "unresolved reference"
                );
                NULL
            }
        }
    }

    /// Push a new scope. Names in it shadow outer names until it is popped.
    pub fn push_scope(&mut self, bindings: IndexMap<String, Value>) {
        self.scopes.push(bindings);
    }

    /// Pop the current scope
    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind a name in the innermost scope, or the root when no scope is open.
    pub fn assign(&mut self, name: impl Into<String>, value: Value) {
        match self.scopes.last_mut() {
            Some(scope) => scope.insert(name.into(), value),
            None => self.root.insert(name.into(), value),
        };
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.root.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_context() -> Context {
        Context::new(Value::from(json!({
            "name": "Alice",
            "user": {"email": "alice@example.com"},
            "tags": ["a", "b"]
        })))
        .unwrap()
    }

    fn bindings(name: &str, value: Value) -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        map.insert(name.to_string(), value);
        map
    }

    #[test]
    fn test_resolve_path() {
        let ctx = create_test_context();
        assert_eq!(ctx.resolve(&["user", "email"]), &Value::from("alice@example.com"));
        assert_eq!(ctx.resolve(&["tags", "1"]), &Value::from("b"));
    }

    #[test]
    fn test_unresolved_is_null() {
        let ctx = create_test_context();
        assert_eq!(ctx.resolve(&["unknown", "deep"]), &Value::Null);
        assert_eq!(ctx.resolve(&["name", "length"]), &Value::Null);
        assert_eq!(ctx.resolve::<&str>(&[]), &Value::Null);
    }

    #[test]
    fn test_shadowing_and_pop() {
        let mut ctx = create_test_context();
        ctx.push_scope(bindings("name", Value::from("Bob")));
        assert_eq!(ctx.resolve(&["name"]), &Value::from("Bob"));
        ctx.pop_scope();
        assert_eq!(ctx.resolve(&["name"]), &Value::from("Alice"));
    }

    #[test]
    fn test_assign_targets_innermost_scope() {
        let mut ctx = create_test_context();
        ctx.assign("site", Value::from("root-level"));
        ctx.push_scope(IndexMap::new());
        ctx.assign("inner", Value::Integer(1));
        assert_eq!(ctx.resolve(&["inner"]), &Value::Integer(1));
        ctx.pop_scope();
        assert_eq!(ctx.resolve(&["inner"]), &Value::Null);
        assert_eq!(ctx.resolve(&["site"]), &Value::from("root-level"));
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(
            Context::new(Value::Integer(3)),
            Err(CarefreeError::Type { .. })
        ));
        assert!(Context::new(Value::Null).is_ok());
    }
}
