//! Structured logging context for key-value fields
//!
//! This module provides:
//! - `FieldValue`: The closed set of value types a context field can hold
//! - `LogContext`: An insertion-ordered key-value bag attached to entries and scopes

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Value type for structured logging fields
///
/// JSON has no NaN or infinity, so a non-finite float is stored in a context
/// as its string form (`"NaN"`, `"inf"`, `"-inf"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<FieldValue>),
    Map(LogContext),
    Null,
}

impl FieldValue {
    fn into_json_safe(self) -> Self {
        match self {
            FieldValue::Float(f) if !f.is_finite() => FieldValue::String(f.to_string()),
            FieldValue::List(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::into_json_safe).collect())
            }
            other => other,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            FieldValue::Map(ctx) => write!(f, "{{{}}}", ctx.format_fields()),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        FieldValue::String(s.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<usize> for FieldValue {
    fn from(i: usize) -> Self {
        i64::try_from(i)
            .map(FieldValue::Int)
            .unwrap_or(FieldValue::Float(i as f64))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<LogContext> for FieldValue {
    fn from(ctx: LogContext) -> Self {
        FieldValue::Map(ctx)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Context for structured logging with key-value fields
///
/// Keys keep their insertion order for display and serialization, while
/// equality ignores order. Inserting an existing key replaces its value in
/// place.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    fields: Vec<(String, FieldValue)>,
}

impl LogContext {
    /// Create a new empty log context
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add a field to the context
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.add_field(key, value);
        self
    }

    /// Add a field to the context (mutable version)
    pub fn add_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let key = key.into();
        let value = value.into().into_json_safe();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(idx).1)
    }

    /// Iterate fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if context has any fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Format fields as `k=v, k=v` pairs
    pub fn format_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl PartialEq for LogContext {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| ov == v))
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fields())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for LogContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = LogContext::new();
        for (k, v) in iter {
            ctx.add_field(k, v);
        }
        ctx
    }
}

impl Serialize for LogContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct LogContextVisitor;

impl<'de> Visitor<'de> for LogContextVisitor {
    type Value = LogContext;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of context fields")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut ctx = LogContext::new();
        while let Some((key, value)) = access.next_entry::<String, FieldValue>()? {
            ctx.add_field(key, value);
        }
        Ok(ctx)
    }
}

impl<'de> Deserialize<'de> for LogContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(LogContextVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_creation() {
        let ctx = LogContext::new();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_log_context_with_fields() {
        let ctx = LogContext::new()
            .with_field("instance_id", "i-0abc123")
            .with_field("attempt", 2)
            .with_field("dry_run", true);

        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.get("attempt"), Some(&FieldValue::Int(2)));
    }

    #[test]
    fn test_insertion_order_preserved_for_display() {
        let ctx = LogContext::new()
            .with_field("zone", "us-east-1a")
            .with_field("batch", 1)
            .with_field("apply", false);

        assert_eq!(ctx.format_fields(), "zone=us-east-1a, batch=1, apply=false");
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut ctx = LogContext::new().with_field("a", 1).with_field("b", 2);
        ctx.add_field("a", 10);
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(ctx.get("a"), Some(&FieldValue::Int(10)));
    }

    #[test]
    fn test_equality_ignores_order() {
        let left = LogContext::new().with_field("a", 1).with_field("b", "x");
        let right = LogContext::new().with_field("b", "x").with_field("a", 1);
        assert_eq!(left, right);

        let different = LogContext::new().with_field("a", 2).with_field("b", "x");
        assert_ne!(left, different);
    }

    #[test]
    fn test_non_finite_floats_survive_json() {
        let ctx = LogContext::new()
            .with_field("ratio", f64::NAN)
            .with_field("ceiling", f64::INFINITY)
            .with_field("samples", FieldValue::List(vec![FieldValue::Float(f64::NEG_INFINITY)]))
            .with_field("load", 0.75);

        assert_eq!(ctx.get("ratio"), Some(&FieldValue::String("NaN".to_string())));
        assert_eq!(ctx.get("load"), Some(&FieldValue::Float(0.75)));

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("null"));
        let back: LogContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn test_nested_values_display() {
        let ctx = LogContext::new()
            .with_field("targets", vec!["i-1", "i-2"])
            .with_field("limits", LogContext::new().with_field("max", 5));

        assert_eq!(ctx.format_fields(), "targets=[i-1, i-2], limits={max=5}");
    }

    #[test]
    fn test_serde_roundtrip_preserves_types_and_order() {
        let ctx = LogContext::new()
            .with_field("name", "patch-window")
            .with_field("count", 3)
            .with_field("ratio", 0.5)
            .with_field("ok", true)
            .with_field("missing", FieldValue::Null)
            .with_field("ids", vec![1, 2])
            .with_field("nested", LogContext::new().with_field("k", "v"));

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.starts_with("{\"name\":\"patch-window\",\"count\":3"));

        let parsed: LogContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ctx);
        assert_eq!(parsed.keys().collect::<Vec<_>>(), ctx.keys().collect::<Vec<_>>());
    }
}
