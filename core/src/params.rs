//! List query parameters and their URL encoding.
//!
//! # Design
//! `Parameters` serializes to `{"limit", "offset", "order", "filter"}` with
//! unset fields omitted. For GET/HEAD requests that object is flattened into a
//! bracket-notation query string: arrays become `key[]=v`, nested objects
//! `key[sub]=v`, booleans `1`/`0`. Keys come out sorted because
//! `serde_json::Map` is ordered.

use serde::Serialize;
use serde_json::{Map, Value};

/// Filter conditions: field name to a value or a list of accepted values.
pub type Conditions = Map<String, Value>;

/// Default sort keys for `first` and `last`.
pub const DEFAULT_SORT: &[&str] = &["id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(rename = "order", skip_serializing_if = "Option::is_none")]
    pub sorted_by: Option<Vec<String>>,
    #[serde(rename = "filter", skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sorted_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sorted_by = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Add one filter condition.
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .get_or_insert_with(Map::new)
            .insert(field.to_string(), value.into());
        self
    }

    /// The serialized form that `encode_query` and JSON bodies consume.
    pub fn to_json(&self) -> Value {
        // Only plain fields and a `Map` are serialized; this cannot fail.
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// Append `suffix` to every sort key (`"name"` -> `"name.asc"`).
pub(crate) fn suffixed(keys: &[&str], suffix: &str) -> Vec<String> {
    keys.iter().map(|key| format!("{key}{suffix}")).collect()
}

/// Flatten a JSON object into a percent-encoded query string.
/// Non-object values produce an empty string.
pub fn encode_query(value: &Value) -> String {
    let mut pairs = Vec::new();
    if let Value::Object(object) = value {
        for (key, nested) in object {
            push_pairs(key, nested, &mut pairs);
        }
    }
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn push_pairs(key: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(object) => {
            for (sub, nested) in object {
                push_pairs(&format!("{key}[{sub}]"), nested, pairs);
            }
        }
        Value::Array(items) => {
            for item in items {
                push_pairs(&format!("{key}[]"), item, pairs);
            }
        }
        scalar => pairs.push((key.to_string(), scalar_to_query(scalar))),
    }
}

/// Query-string form of a scalar JSON value.
pub fn scalar_to_query(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
