//! Tagged runtime values for query parameters
//!
//! Every bound parameter holds a [`Value`] whose variant doubles as its type
//! tag. Type checks compare [`ValueType`] descriptors instead of inspecting
//! the Rust type at runtime.
//!
//! Conversions used by typed reads all go through [`Value::convert`], so the
//! coercion table lives in one place:
//!
//! | from \ to | Integer        | Float  | String  | Bool              |
//! |-----------|----------------|--------|---------|-------------------|
//! | Integer   | =              | widen  | display | -                 |
//! | Float     | if no fraction | =      | display | -                 |
//! | String    | parse          | parse  | =       | `"true"`/`"false"`|
//! | Bool      | -              | -      | display | =                 |

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Type descriptor for a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Null,
    Bool,
    Integer,
    Float,
    String,
    List,
    Map,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Null => "Null",
            ValueType::Bool => "Bool",
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::String => "String",
            ValueType::List => "List",
            ValueType::Map => "Map",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete parameter value
///
/// Untagged on the wire: `"Ada"`, `36`, `1.5`, `true`, `null`, `[..]`, `{..}`.
/// Integers deserialize as [`Value::Integer`] because that variant is tried
/// before [`Value::Float`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The type tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert to `target`, or `None` when no lossless conversion exists
    pub fn convert(&self, target: ValueType) -> Option<Value> {
        if self.value_type() == target {
            return Some(self.clone());
        }

        match (self, target) {
            (Value::Float(f), ValueType::Integer) => float_to_i64(*f).map(Value::Integer),
            (Value::String(s), ValueType::Integer) => s.trim().parse().ok().map(Value::Integer),

            (Value::Integer(n), ValueType::Float) => Some(Value::Float(*n as f64)),
            (Value::String(s), ValueType::Float) => s.trim().parse().ok().map(Value::Float),

            (Value::Bool(b), ValueType::String) => Some(Value::String(b.to_string())),
            (Value::Integer(n), ValueType::String) => Some(Value::String(n.to_string())),
            (Value::Float(f), ValueType::String) => Some(Value::String(f.to_string())),

            (Value::String(s), ValueType::Bool) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            _ => None,
        }
    }

    /// Render as a literal suitable for query text
    ///
    /// Strings are single-quoted with backslashes escaped and embedded quotes
    /// doubled, matching what the query tokenizer accepts inside a literal.
    /// Lists use the `{a, b}` array form, maps fall back to JSON, and
    /// non-finite floats become `null`.
    pub fn to_query_literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''")),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_query_literal).collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Map(_) => self.to_json().to_string(),
        }
    }

    /// Convert to a `serde_json::Value` (non-finite floats become `null`)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn float_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn format_float(f: f64) -> String {
    if !f.is_finite() {
        "null".to_string()
    } else if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// Displays the query literal form, so strings show quoted at any depth
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_literal())
    }
}

// ─────────────────────────────────────────────────────────────
// Conversions into Value
// ─────────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Integer(i64::from(n))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
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

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Conversions out of Value (typed reads)
// ─────────────────────────────────────────────────────────────

/// Rust types a bound value can be read as
pub trait FromValue: Sized {
    /// Descriptor reported in type-mismatch errors
    const TYPE: ValueType;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    const TYPE: ValueType = ValueType::String;

    fn from_value(value: &Value) -> Option<Self> {
        match value.convert(ValueType::String)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const TYPE: ValueType = ValueType::Integer;

    fn from_value(value: &Value) -> Option<Self> {
        value.convert(ValueType::Integer)?.as_i64()
    }
}

impl FromValue for i32 {
    const TYPE: ValueType = ValueType::Integer;

    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|n| i32::try_from(n).ok())
    }
}

impl FromValue for f64 {
    const TYPE: ValueType = ValueType::Float;

    fn from_value(value: &Value) -> Option<Self> {
        match value.convert(ValueType::Float)? {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const TYPE: ValueType = ValueType::Bool;

    fn from_value(value: &Value) -> Option<Self> {
        match value.convert(ValueType::Bool)? {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    const TYPE: ValueType = ValueType::List;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const TYPE: ValueType = T::TYPE;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}
