#![forbid(unsafe_code)]

//! Dynamic object model for values lifted out of third-party ad libraries.
//!
//! Library objects are opaque and differently shaped per SDK, so the core
//! never binds them to Rust structs. A recorded object serializes its
//! zero-argument getters as `{"$returns": <result>}`, which decodes back into
//! a callable [`RawValue::Method`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub const METHOD_RETURNS_KEY: &str = "$returns";

/// Nesting levels kept by [`RawValue::snapshot`].
pub const SNAPSHOT_MAX_DEPTH: usize = 7;
pub const SNAPSHOT_RESULT_KEY: &str = "result";

/// Key used to look up a member: an attribute name or an array position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeKey {
    Index(usize),
    Name(String),
}

impl AttributeKey {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for AttributeKey {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<usize> for AttributeKey {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

/// Zero-argument callable member of a library object.
#[derive(Clone)]
pub struct RawMethod(Arc<dyn Fn() -> RawValue + Send + Sync>);

impl RawMethod {
    pub fn new(f: impl Fn() -> RawValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn returning(value: RawValue) -> Self {
        Self::new(move || value.clone())
    }

    pub fn call(&self) -> RawValue {
        (self.0)()
    }
}

impl fmt::Debug for RawMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawMethod(..)")
    }
}

impl PartialEq for RawMethod {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<RawValue>),
    Object(IndexMap<String, RawValue>),
    Method(RawMethod),
}

impl RawValue {
    pub fn object<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawValue)>,
    {
        Self::Object(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn method(f: impl Fn() -> RawValue + Send + Sync + 'static) -> Self {
        Self::Method(RawMethod::new(f))
    }

    pub fn method_returning(value: RawValue) -> Self {
        Self::Method(RawMethod::returning(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Method(_) => "function",
        }
    }

    /// Member lookup with page semantics: a numeric name indexes arrays and
    /// an index names an object member.
    pub fn get(&self, key: &AttributeKey) -> Option<&RawValue> {
        match (self, key) {
            (Self::Object(members), AttributeKey::Name(name)) => members.get(name.as_str()),
            (Self::Object(members), AttributeKey::Index(i)) => members.get(i.to_string().as_str()),
            (Self::Array(items), AttributeKey::Index(i)) => items.get(*i),
            (Self::Array(items), AttributeKey::Name(name)) => {
                name.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        }
    }

    pub fn get_name(&self, name: &str) -> Option<&RawValue> {
        match self {
            Self::Object(members) => members.get(name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Members of an object in insertion order; empty for anything else.
    pub fn members(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        let members = match self {
            Self::Object(members) => Some(members),
            _ => None,
        };
        members
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => match (map.len(), map.get(METHOD_RETURNS_KEY)) {
                (1, Some(returns)) => Self::method_returning(Self::from_json(returns)),
                _ => Self::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Self::from_json(v)))
                        .collect(),
                ),
            },
        }
    }

    /// Plain-data copy of this value for storage, at most `max_depth` levels deep.
    ///
    /// Zero-argument getters (members named `get*`) are invoked and kept as
    /// `{"result": ...}`; other methods become `{}`. Containers past the
    /// depth limit become null; scalars are always kept.
    pub fn snapshot(&self, max_depth: usize) -> RawValue {
        match self {
            Self::Object(members) => Self::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.snapshot_at(0, k, max_depth)))
                    .collect(),
            ),
            other => other.snapshot_at(0, "", max_depth),
        }
    }

    fn snapshot_at(&self, depth: usize, key: &str, max_depth: usize) -> RawValue {
        match self {
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => self.clone(),
            _ if depth >= max_depth => Self::Null,
            Self::Method(m) if key.starts_with("get") => Self::object([(
                SNAPSHOT_RESULT_KEY,
                m.call().snapshot_at(depth + 1, "", max_depth),
            )]),
            Self::Method(_) => Self::Object(IndexMap::new()),
            Self::Array(items) => Self::Array(
                items
                    .iter()
                    .map(|v| v.snapshot_at(depth + 1, "", max_depth))
                    .collect(),
            ),
            Self::Object(members) => Self::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.snapshot_at(depth + 1, k, max_depth)))
                    .collect(),
            ),
        }
    }

    /// Methods are invoked and recorded as `{"$returns": ...}`; NaN and
    /// infinities become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(members) => Value::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Method(m) => {
                let mut map = serde_json::Map::new();
                map.insert(METHOD_RETURNS_KEY.to_string(), m.call().to_json());
                Value::Object(map)
            }
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        Self::from_json(&value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<RawValue>> for RawValue {
    fn from(value: Vec<RawValue>) -> Self {
        Self::Array(value)
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Self::from_json(&v))
    }
}
