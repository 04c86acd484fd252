//! # Typed Value Model
//!
//! The tagged union crossing the worker boundary. Every input binding,
//! trigger-metadata entry and output travels as a [`TypedValue`].
//! Conversion between tags is always explicit; see the resolver's
//! coercion rules for the lossy paths.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A wire-format value
///
/// Exactly one tag is populated by construction. `Empty` stands for an
/// absent or untyped payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum TypedValue {
    String(String),
    Bytes(Vec<u8>),
    Json(Value),
    Http(HttpValue),
    Collection(Vec<TypedValue>),
    Empty,
}

impl TypedValue {
    /// Wrap a JSON value parsed from text
    pub fn json_from_str(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok().map(TypedValue::Json)
    }

    pub fn is_http(&self) -> bool {
        matches!(self, TypedValue::Http(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TypedValue::Empty)
    }

    /// Borrow the string payload, if this value carries one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            TypedValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_http(&self) -> Option<&HttpValue> {
        match self {
            TypedValue::Http(h) => Some(h),
            _ => None,
        }
    }
}

impl Default for TypedValue {
    fn default() -> Self {
        TypedValue::Empty
    }
}

/// An HTTP-shaped value carried by HTTP-triggered invocations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HttpValue {
    pub method: String,

    pub url: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub query: HashMap<String, String>,

    /// Request or response body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<TypedValue>>,
}

impl HttpValue {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: TypedValue) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}
