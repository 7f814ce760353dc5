//! Runtime value types for Carefree templates.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Runtime value type for Carefree templates
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            JsonValue::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl Value {
    /// Falsy values: false, null, 0, 0.0, "", [], {}
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(arr) => !arr.is_empty(),
            Value::Object(obj) => !obj.is_empty(),
        }
    }

    /// Text used when the value is written into output.
    ///
    /// Never fails: null and containers render as the empty string.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => String::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; numeric strings are parsed and floats truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Access one path segment: an object key, or an index into an array.
    pub fn get(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Object(obj) => obj.get(segment),
            Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }

    /// Follow a sequence of segments from this value.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        path.iter()
            .try_fold(self, |value, segment| value.get(segment.as_ref()))
    }

    /// Equality used by template comparisons: numeric when both sides are
    /// numeric, textual otherwise. Containers compare element by element and
    /// never equal a scalar.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, x)| b.get(key).is_some_and(|y| x.loose_eq(y)))
            }
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                false
            }
            _ => match (self.numeric(), other.numeric()) {
                (Some(a), Some(b)) => a == b,
                _ => self.stringify() == other.stringify(),
            },
        }
    }

    /// Ordering used by template comparisons and record sorting.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            _ => match (self.numeric(), other.numeric()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(self.stringify().cmp(&other.stringify())),
            },
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Integer(_) | Value::Float(_) => self.as_f64(),
            Value::String(s) if !s.trim().is_empty() => self.as_f64(),
            _ => None,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(-1).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::String("0".to_string()).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(!Value::Object(IndexMap::new()).is_truthy());
    }

    #[test]
    fn test_stringify() {
        assert_eq!(Value::Null.stringify(), "");
        assert_eq!(Value::Bool(true).stringify(), "true");
        assert_eq!(Value::Bool(false).stringify(), "false");
        assert_eq!(Value::Integer(-42).stringify(), "-42");
        assert_eq!(Value::Float(3.0).stringify(), "3");
        assert_eq!(Value::Float(2.5).stringify(), "2.5");
        assert_eq!(Value::Array(vec![Value::Integer(1)]).stringify(), "");
    }

    #[test]
    fn test_from_json_preserves_key_order() {
        let value = Value::from(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_from_json_large_unsigned_becomes_float() {
        let value = Value::from(json!(u64::MAX));
        assert!(matches!(value, Value::Float(_)));
    }

    #[test]
    fn test_get_path_through_arrays() {
        let value = Value::from(json!({"tags": [{"name": "rust"}, {"name": "cms"}]}));
        assert_eq!(
            value.get_path(&["tags", "1", "name"]),
            Some(&Value::from("cms"))
        );
        assert_eq!(value.get_path(&["tags", "9", "name"]), None);
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::from("12").as_i64(), Some(12));
        assert_eq!(Value::from(" 7 ").as_i64(), Some(7));
        assert_eq!(Value::from("2.9").as_i64(), Some(2));
        assert_eq!(Value::from("abc").as_i64(), None);
        assert_eq!(Value::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_loose_comparisons() {
        assert!(Value::from("10").loose_eq(&Value::Integer(10)));
        assert!(Value::from("abc").loose_eq(&Value::from("abc")));
        assert!(!Value::from("abc").loose_eq(&Value::from("abd")));

        let list = Value::from(json!([1, "2"]));
        assert!(list.loose_eq(&Value::from(json!(["1", 2]))));
        assert!(!list.loose_eq(&Value::from(json!([1, 3]))));
        assert!(!list.loose_eq(&Value::from(json!({"a": 1}))));
        assert!(!list.loose_eq(&Value::Null));
        assert!(!Value::from(json!({})).loose_eq(&Value::from("")));
        let record = Value::from(json!({"a": 1, "b": 2}));
        assert!(record.loose_eq(&Value::from(json!({"b": 2, "a": "1"}))));
        assert_eq!(
            Value::from("9").compare(&Value::Integer(10)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Null.compare(&Value::Integer(0)), Some(Ordering::Less));
    }
}
