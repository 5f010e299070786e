//! Request context model.
//!
//! Callers describe a request as a map of string keys to loosely typed
//! values. The router never interprets keys itself; a feature extractor
//! turns the map into a fixed-length numeric vector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request context: ordered key/value pairs describing the request.
///
/// A `BTreeMap` keeps iteration order deterministic so the default
/// feature extractor produces stable vectors for equal contexts.
pub type Context = BTreeMap<String, ContextValue>;

/// A single context value.
///
/// Replaces the duck-typed dictionaries of dynamic callers with an
/// explicit tagged union: numbers contribute their magnitude to feature
/// buckets, text contributes a hashed fraction, flags contribute a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
    /// Boolean flag
    Flag(bool),
}

impl ContextValue {
    /// Get the numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the text value, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_value_conversions() {
        assert_eq!(ContextValue::from(1.5).as_number(), Some(1.5));
        assert_eq!(ContextValue::from(3_i64).as_number(), Some(3.0));
        assert_eq!(ContextValue::from("chat").as_text(), Some("chat"));
        assert_eq!(ContextValue::from(true), ContextValue::Flag(true));
    }

    #[test]
    fn test_context_ordering_is_deterministic() {
        let mut ctx = Context::new();
        ctx.insert("zeta".to_string(), 1.0.into());
        ctx.insert("alpha".to_string(), 2.0.into());

        let keys: Vec<&str> = ctx.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_context_value_serde_untagged() {
        let json = serde_json::to_string(&ContextValue::Number(2.0)).unwrap();
        assert_eq!(json, "2.0");

        let back: ContextValue = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(back, ContextValue::Text("hello".to_string()));

        let back: ContextValue = serde_json::from_str("true").unwrap();
        assert_eq!(back, ContextValue::Flag(true));
    }
}
