//! Runtime values flowing along graph pins
//!
//! Every parameter token, every node output and every environment binding is a
//! [`Value`]. Host objects (actors, scenes) never travel by value; they are
//! referenced through an opaque [`Handle`] that the host resolves itself.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Handles
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a host object referenced from a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub uuid::Uuid);

impl HandleId {
    /// Allocate a fresh, unique id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-owning reference to a host object, tagged with its class path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub id: HandleId,
    /// Dotted class path of the referenced object (e.g. `Data.Actors.BP_Player`)
    pub type_id: String,
}

impl Handle {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            id: HandleId::new(),
            type_id: type_id.into(),
        }
    }

    pub fn with_id(id: HandleId, type_id: impl Into<String>) -> Self {
        Self {
            id,
            type_id: type_id.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A dynamically typed graph value
///
/// Equality is structural and never crosses variants, so `Int(1)` and
/// `Bool(true)` are different values. Branch selection relies on this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        type_id: Option<String>,
        fields: BTreeMap<String, Value>,
    },
    Handle(Handle),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view; floats convert only when they carry no fraction
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Object { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Field of an object value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_object().and_then(|fields| fields.get(field))
    }

    /// Build an untyped object from key/value pairs
    pub fn object_from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object {
            type_id: None,
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Short name of the variant, used in conversion errors and logs
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object { .. } => "object",
            Value::Handle(_) => "handle",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object { type_id, fields } => {
                if let Some(type_id) = type_id {
                    write!(f, "{type_id} ")?;
                }
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Handle(h) => write!(f, "<{} {}>", h.type_id, h.id),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// From Implementations
// ─────────────────────────────────────────────────────────────────────────────

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Self {
        Value::Handle(h)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// serde_json::Value Interop
// ─────────────────────────────────────────────────────────────────────────────

/// Class records and attribute files are plain JSON, so literals arrive as
/// `serde_json::Value` and are lifted here.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object {
                type_id: None,
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            },
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object { type_id, fields } => {
                let mut map: serde_json::Map<String, serde_json::Value> = fields
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect();
                if let Some(tid) = type_id {
                    map.insert("__type__".to_string(), serde_json::Value::String(tid));
                }
                serde_json::Value::Object(map)
            }
            Value::Handle(h) => {
                let mut map = serde_json::Map::new();
                map.insert("__handle__".to_string(), serde_json::Value::String(h.id.to_string()));
                map.insert("__type__".to_string(), serde_json::Value::String(h.type_id));
                serde_json::Value::Object(map)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TryFrom Implementations
// ─────────────────────────────────────────────────────────────────────────────

/// Error when a value does not hold the requested Rust type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueConversionError {
    #[error("Expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl TryFrom<Value> for bool {
    type Error = ValueConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_bool().ok_or(ValueConversionError::TypeMismatch {
            expected: "bool",
            actual: v.type_name(),
        })
    }
}

impl TryFrom<Value> for i64 {
    type Error = ValueConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_i64().ok_or(ValueConversionError::TypeMismatch {
            expected: "int",
            actual: v.type_name(),
        })
    }
}

impl TryFrom<Value> for f64 {
    type Error = ValueConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_f64().ok_or(ValueConversionError::TypeMismatch {
            expected: "float",
            actual: v.type_name(),
        })
    }
}

impl TryFrom<Value> for String {
    type Error = ValueConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::String(s) => Ok(s),
            other => Err(ValueConversionError::TypeMismatch {
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for Handle {
    type Error = ValueConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Handle(h) => Ok(h),
            other => Err(ValueConversionError::TypeMismatch {
                expected: "handle",
                actual: other.type_name(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Tuples
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered output tuple produced by one node evaluation
///
/// Downstream nodes read it by output pin index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs(pub Vec<Value>);

impl Outputs {
    /// The empty tuple (a function that returned nothing)
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn one(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    pub fn many(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, pin: usize) -> Option<&Value> {
        self.0.get(pin)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

/// `Null` becomes the empty tuple; any other value a one-element tuple.
impl From<Value> for Outputs {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Outputs::none(),
            other => Outputs(vec![other]),
        }
    }
}

impl From<Vec<Value>> for Outputs {
    fn from(values: Vec<Value>) -> Self {
        Outputs(values)
    }
}

impl<'a> IntoIterator for &'a Outputs {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_never_compare_equal() {
        assert_ne!(Value::Int(1), Value::Bool(true));
        assert_ne!(Value::Int(0), Value::Bool(false));
        assert_eq!(Value::from(3), Value::Int(3));
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::from(2.0).as_i64(), Some(2));
        assert_eq!(Value::from(2.5).as_i64(), None);
        assert_eq!(Value::from(7).as_f64(), Some(7.0));
    }

    #[test]
    fn test_json_object_lift() {
        let v = Value::from(serde_json::json!({"hp": 10, "name": "slime", "speed": 1.5}));
        assert_eq!(v.get("hp"), Some(&Value::Int(10)));
        assert_eq!(v.get("name").and_then(Value::as_str), Some("slime"));
        assert_eq!(v.get("speed").and_then(Value::as_f64), Some(1.5));
    }

    #[test]
    fn test_handle_to_json_keeps_type() {
        let handle = Handle::new("Data.Actors.BP_Slime");
        let json: serde_json::Value = Value::from(handle.clone()).into();
        assert_eq!(json["__type__"], "Data.Actors.BP_Slime");
        assert_eq!(json["__handle__"], handle.id.to_string());
    }

    #[test]
    fn test_outputs_from_null_is_empty() {
        assert!(Outputs::from(Value::Null).is_empty());
        assert_eq!(Outputs::from(Value::from(4)).len(), 1);
        assert_eq!(Outputs::from(Value::Array(vec![])).len(), 1);
    }

    #[test]
    fn test_try_from_mismatch() {
        let err = String::try_from(Value::Int(3)).unwrap_err();
        assert_eq!(
            err,
            ValueConversionError::TypeMismatch {
                expected: "string",
                actual: "int"
            }
        );
    }
}
