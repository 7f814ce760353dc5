//! Data provider contracts.
//!
//! Tags never touch storage themselves: list tags call a [`ListProvider`],
//! single-entity tags a [`SingleProvider`], value tags a [`ValueProvider`].
//! Providers are registered by name in [`Providers`]; closures implement
//! each contract directly.
//!
//! [`MemoryProvider`] and [`MemoryValues`] are in-memory implementations for
//! tests, demos and static fixtures.

use crate::error::ProviderError;
use crate::value::Value;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const LIMIT: &str = "limit";
pub const OFFSET: &str = "offset";
pub const ORDER: &str = "order";

/// Ordered query parameters passed to a provider.
///
/// Keys are the attribute names written on the tag; `limit`, `offset` and
/// `order` are reserved for windowing and sorting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    params: IndexMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.params.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.params.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn limit(&self) -> Option<usize> {
        self.get(LIMIT)
            .and_then(Value::as_i64)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
    }

    pub fn offset(&self) -> usize {
        self.get(OFFSET)
            .and_then(Value::as_i64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
    }

    pub fn order(&self) -> Option<&str> {
        self.get(ORDER).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Parameters other than `limit`, `offset` and `order`.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), LIMIT | OFFSET | ORDER))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Copy without `limit` and `offset`, as used for counting.
    pub fn unwindowed(&self) -> Self {
        let mut copy = self.clone();
        copy.remove(LIMIT);
        copy.remove(OFFSET);
        copy
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.params {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{key}={}", value.stringify())?;
            first = false;
        }
        Ok(())
    }
}

/// Ordered records for list tags.
pub trait ListProvider: Send + Sync {
    fn get_list(&self, filter: &Filter) -> Result<Vec<Value>, ProviderError>;

    /// Number of records matching `filter` ignoring its window.
    fn count(&self, filter: &Filter) -> Result<usize, ProviderError> {
        Ok(self.get_list(&filter.unwindowed())?.len())
    }
}

impl<F> ListProvider for F
where
    F: Fn(&Filter) -> Result<Vec<Value>, ProviderError> + Send + Sync,
{
    fn get_list(&self, filter: &Filter) -> Result<Vec<Value>, ProviderError> {
        self(filter)
    }
}

/// One record looked up by `key` in `field`.
pub trait SingleProvider: Send + Sync {
    fn get_one(&self, key: &Value, field: &str) -> Result<Option<Value>, ProviderError>;
}

impl<F> SingleProvider for F
where
    F: Fn(&Value, &str) -> Result<Option<Value>, ProviderError> + Send + Sync,
{
    fn get_one(&self, key: &Value, field: &str) -> Result<Option<Value>, ProviderError> {
        self(key, field)
    }
}

/// Scalar values for void value tags.
pub trait ValueProvider: Send + Sync {
    fn get_value(
        &self,
        name: &str,
        params: &Filter,
        default: &Value,
    ) -> Result<Value, ProviderError>;
}

impl<F> ValueProvider for F
where
    F: Fn(&str, &Filter, &Value) -> Result<Value, ProviderError> + Send + Sync,
{
    fn get_value(
        &self,
        name: &str,
        params: &Filter,
        default: &Value,
    ) -> Result<Value, ProviderError> {
        self(name, params, default)
    }
}

/// Providers by name, one table per contract.
#[derive(Default, Clone)]
pub struct Providers {
    lists: HashMap<String, Arc<dyn ListProvider>>,
    singles: HashMap<String, Arc<dyn SingleProvider>>,
    values: HashMap<String, Arc<dyn ValueProvider>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_list(
        &mut self,
        name: impl Into<String>,
        provider: impl ListProvider + 'static,
    ) {
        self.lists.insert(name.into(), Arc::new(provider));
    }

    pub fn register_single(
        &mut self,
        name: impl Into<String>,
        provider: impl SingleProvider + 'static,
    ) {
        self.singles.insert(name.into(), Arc::new(provider));
    }

    pub fn register_value(
        &mut self,
        name: impl Into<String>,
        provider: impl ValueProvider + 'static,
    ) {
        self.values.insert(name.into(), Arc::new(provider));
    }

    /// Serve `records` as both the list and the single provider named `name`.
    pub fn register_records(&mut self, name: impl Into<String>, records: Vec<Value>) {
        let name = name.into();
        let provider = Arc::new(MemoryProvider::new(records));
        self.lists.insert(name.clone(), provider.clone());
        self.singles.insert(name, provider);
    }

    pub fn list(&self, name: &str) -> Result<&dyn ListProvider, ProviderError> {
        self.lists
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| not_registered("list", name))
    }

    pub fn single(&self, name: &str) -> Result<&dyn SingleProvider, ProviderError> {
        self.singles
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| not_registered("single", name))
    }

    pub fn value(&self, name: &str) -> Result<&dyn ValueProvider, ProviderError> {
        self.values
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| not_registered("value", name))
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers")
            .field("lists", &self.lists.keys().collect::<Vec<_>>())
            .field("singles", &self.singles.keys().collect::<Vec<_>>())
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn not_registered(kind: &'static str, name: &str) -> ProviderError {
    ProviderError::NotRegistered {
        kind,
        name: name.to_string(),
    }
}

// ============================================================================
// In-memory providers
// ============================================================================

/// Records held in memory.
///
/// Filtering: a condition whose key names a record field must match it
/// (`a,b` matches either value); keys no record field carries are ignored.
/// `order` takes `field [asc|desc]` clauses separated by commas.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    records: Vec<Value>,
}

impl MemoryProvider {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }

    pub fn from_json(records: serde_json::Value) -> Self {
        match Value::from(records) {
            Value::Array(items) => Self::new(items),
            other => Self::new(vec![other]),
        }
    }

    fn matching(&self, filter: &Filter) -> Vec<&Value> {
        let mut matched: Vec<&Value> = self
            .records
            .iter()
            .filter(|record| matches_conditions(record, filter))
            .collect();

        if let Some(order) = filter.order() {
            let clauses = parse_order(order);
            matched.sort_by(|a, b| compare_records(a, b, &clauses));
        }
        matched
    }
}

impl ListProvider for MemoryProvider {
    fn get_list(&self, filter: &Filter) -> Result<Vec<Value>, ProviderError> {
        let matched = self.matching(filter);
        let take = filter.limit().unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(filter.offset())
            .take(take)
            .cloned()
            .collect())
    }

    fn count(&self, filter: &Filter) -> Result<usize, ProviderError> {
        Ok(self.matching(filter).len())
    }
}

impl SingleProvider for MemoryProvider {
    fn get_one(&self, key: &Value, field: &str) -> Result<Option<Value>, ProviderError> {
        Ok(self
            .records
            .iter()
            .find(|record| record.get(field).is_some_and(|v| v.loose_eq(key)))
            .cloned())
    }
}

fn matches_conditions(record: &Value, filter: &Filter) -> bool {
    filter.conditions().all(|(key, wanted)| match record.get(key) {
        None => true,
        Some(actual) => match wanted {
            Value::Array(options) => options.iter().any(|o| actual.loose_eq(o)),
            Value::String(s) if s.contains(',') => s
                .split(',')
                .any(|option| actual.loose_eq(&Value::String(option.trim().to_string()))),
            _ => actual.loose_eq(wanted),
        },
    })
}

fn parse_order(order: &str) -> Vec<(String, bool)> {
    order
        .split(',')
        .filter_map(|clause| {
            let mut parts = clause.split_whitespace();
            let field = parts.next()?;
            let descending = parts
                .next()
                .is_some_and(|dir| dir.eq_ignore_ascii_case("desc"));
            Some((field.to_string(), descending))
        })
        .collect()
}

fn compare_records(a: &Value, b: &Value, clauses: &[(String, bool)]) -> Ordering {
    for (field, descending) in clauses {
        let left = a.get(field).unwrap_or(&Value::Null);
        let right = b.get(field).unwrap_or(&Value::Null);
        let ordering = left.compare(right).unwrap_or(Ordering::Equal);
        let ordering = if *descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Named scalar values.
#[derive(Debug, Clone, Default)]
pub struct MemoryValues {
    values: IndexMap<String, Value>,
}

impl MemoryValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn from_json(values: serde_json::Value) -> Self {
        match Value::from(values) {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }
}

impl ValueProvider for MemoryValues {
    fn get_value(
        &self,
        name: &str,
        _params: &Filter,
        default: &Value,
    ) -> Result<Value, ProviderError> {
        Ok(self.values.get(name).cloned().unwrap_or_else(|| default.clone()))
    }
}
