//! Per-iteration metadata for list and loop tags.
//!
//! Each iteration binds the item under its name with `__index__`, `__key__`,
//! `__first__`, `__last__`, `__count__` and `__number__` merged in (objects
//! only), plus `__mod__` when a modulus is set. The same metadata is always
//! bound as `__loop__`, which is how non-object items reach it.

use crate::value::Value;
use indexmap::IndexMap;

pub const LOOP_BINDING: &str = "__loop__";

#[derive(Debug, Clone, PartialEq)]
pub struct LoopContext {
    pub index: usize,
    pub key: Value,
    pub count: usize,
    pub modulo: Option<u64>,
}

impl LoopContext {
    pub fn new(index: usize, key: Value, count: usize) -> Self {
        Self {
            index,
            key,
            count,
            modulo: None,
        }
    }

    pub fn with_modulo(mut self, modulo: Option<u64>) -> Self {
        self.modulo = modulo.filter(|m| *m > 0);
        self
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }

    /// 1-based position.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn metadata(&self) -> IndexMap<String, Value> {
        let mut meta = IndexMap::new();
        meta.insert("__index__".to_string(), Value::from(self.index));
        meta.insert("__key__".to_string(), self.key.clone());
        meta.insert("__first__".to_string(), Value::Bool(self.is_first()));
        meta.insert("__last__".to_string(), Value::Bool(self.is_last()));
        meta.insert("__count__".to_string(), Value::from(self.count));
        meta.insert("__number__".to_string(), Value::from(self.number()));
        if let Some(modulo) = self.modulo {
            let m = (self.number() as u64) % modulo;
            meta.insert("__mod__".to_string(), Value::Integer(m as i64));
        }
        meta
    }

    /// Merge the metadata into an object item; other items come back unchanged.
    pub fn merge_into(&self, item: Value) -> Value {
        match item {
            Value::Object(mut obj) => {
                obj.extend(self.metadata());
                Value::Object(obj)
            }
            other => other,
        }
    }

    /// Scope pushed for one iteration of a loop body.
    pub fn bindings(
        &self,
        bind: &str,
        key_bind: Option<&str>,
        item: Value,
    ) -> IndexMap<String, Value> {
        let mut scope = IndexMap::new();
        scope.insert(LOOP_BINDING.to_string(), Value::Object(self.metadata()));
        if let Some(key_bind) = key_bind {
            scope.insert(key_bind.to_string(), self.key.clone());
        }
        scope.insert(bind.to_string(), self.merge_into(item));
        scope
    }
}

/// Key/item pairs of a collection: arrays are keyed by index, objects by key.
/// Anything else iterates as empty.
pub fn entries(collection: &Value) -> Vec<(Value, Value)> {
    match collection {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (Value::from(i), item.clone()))
            .collect(),
        Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v.clone()))
            .collect(),
        _ => Vec::new(),
    }
}
