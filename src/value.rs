use std::{fmt, rc::Rc};

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{ser::SerializeMap, ser::SerializeSeq, Serialize, Serializer};

use crate::path::{Path, PathSegment};

#[cfg(test)]
mod tests;

pub type Object = IndexMap<String, Value>;

/// A plain form value.
///
/// `Date` and `Blob` are opaque leaves: they are compared and copied as a whole and never traversed.
/// Tuples are represented as arrays.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Blob(Blob),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {
    pub fn object() -> Self {
        Value::Object(Object::new())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns `true` for `undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns `true` for containers that paths can descend into.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Returns `false` for `undefined`, `null`, `false`, `0`, `NaN` and `""`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Date(_) => ValueKind::Date,
            Value::Blob(_) => ValueKind::Blob,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up one path segment in a container.
    ///
    /// A numeric segment addresses an object by its string form.
    pub fn child(&self, segment: &PathSegment) -> Option<&Value> {
        match (self, segment) {
            (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
            (Value::Object(map), PathSegment::Key(key)) => map.get(key),
            (Value::Object(map), PathSegment::Index(index)) => map.get(&index.to_string()),
            _ => None,
        }
    }

    /// Converts into a JSON value.
    ///
    /// Fails for `undefined`, non-finite numbers and blobs, which have no JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        self.to_json_at(&mut Path::default())
    }
    fn to_json_at(&self, path: &mut Path) -> Result<serde_json::Value, ValueError> {
        let unrepresentable = |path: &Path, kind| ValueError::Unrepresentable {
            path: path.to_string(),
            kind,
        };
        Ok(match self {
            Value::Undefined => return Err(unrepresentable(path, ValueKind::Undefined)),
            Value::Blob(_) => return Err(unrepresentable(path, ValueKind::Blob)),
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n)
                .map(serde_json::Value::Number)
                .ok_or_else(|| unrepresentable(path, ValueKind::Number))?,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(date_to_string(d)),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    let item = item.to_json_at(path);
                    path.pop();
                    out.push(item?);
                }
                serde_json::Value::Array(out)
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, item) in map {
                    path.push(PathSegment::Key(key.clone()));
                    let item = item.to_json_at(path);
                    path.pop();
                    out.insert(key.clone(), item?);
                }
                serde_json::Value::Object(out)
            }
        })
    }
}

/// Integral numbers are written without a fractional part.
fn json_number(n: f64) -> Option<serde_json::Number> {
    match as_integer(n) {
        Some(i) => Some(i.into()),
        None => serde_json::Number::from_f64(n),
    }
}

fn as_integer(n: f64) -> Option<i64> {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    (n.fract() == 0.0 && n.abs() <= MAX_SAFE).then_some(n as i64)
}

fn date_to_string(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Structural equality with opaque leaves: dates by instant, blobs by handle identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::is_equal_deep(self, other)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, parse_display::Display)]
#[display(style = "lowercase")]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    Date,
    Blob,
    Array,
    Object,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("{kind} at `{path}` has no JSON representation")]
    Unrepresentable { path: String, kind: ValueKind },
}

/// An opaque binary handle, such as a selected file.
///
/// Clones share the handle. Two blobs are equal only if they are the same handle.
#[derive(Clone)]
pub struct Blob(Rc<BlobData>);

struct BlobData {
    name: String,
    bytes: Vec<u8>,
}

impl Blob {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self(Rc::new(BlobData {
            name: name.into(),
            bytes: bytes.into(),
        }))
    }
    pub fn name(&self) -> &str {
        &self.0.name
    }
    pub fn bytes(&self) -> &[u8] {
        &self.0.bytes
    }
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}
impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({:?}, {} bytes)", self.0.name, self.0.bytes.len())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match as_integer(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&date_to_string(d)),
            Value::Blob(b) => Err(serde::ser::Error::custom(format!(
                "blob `{}` cannot be serialized",
                b.name()
            ))),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(obj) => {
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (key, item) in obj {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Number(value as f64)
                }
            }
        )*
    };
}
impl_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}
impl From<Blob> for Value {
    fn from(value: Blob) -> Self {
        Value::Blob(value)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Undefined, Into::into)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}
impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}
impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
