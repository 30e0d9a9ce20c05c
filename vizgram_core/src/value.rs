// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attribute values and the rules for writing them.
//!
//! Most attributes overwrite on every write. Two families accumulate instead:
//! - **append** attributes (`transform`, `labelTransform`, `label`) collect every written value
//!   into a list, in call order;
//! - **entry** attributes (`encode`, `scale`, `interaction`, …) collect `(entry, value)` pairs
//!   into an ordered record; writing an existing entry replaces it in place.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Placeholder written in place of a callback in the JSON projection of options.
pub const CALLBACK_PLACEHOLDER: &str = "[callback]";

/// A callable attribute value, e.g. a data accessor or a custom style function.
///
/// Compared by identity.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>);

impl Callback {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback with positional arguments.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A value stored under an attribute name.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    /// A plain scalar or nested record.
    Value(Value),
    /// Values accumulated by an append attribute.
    List(Vec<AttrValue>),
    /// Entries accumulated by an entry attribute.
    Entries(IndexMap<String, AttrValue>),
    /// A callable.
    Callback(Callback),
}

impl AttrValue {
    /// Returns the plain value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` only for a plain boolean `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Value(Value::Bool(true)))
    }

    /// Looks up one entry of an entry attribute.
    ///
    /// Plain record values are searched as well, so options applied from raw records behave
    /// like options built through the fluent API.
    pub fn entry(&self, name: &str) -> Option<AttrValue> {
        match self {
            Self::Entries(entries) => entries.get(name).cloned(),
            Self::Value(Value::Object(map)) => map.get(name).cloned().map(Self::Value),
            _ => None,
        }
    }

    /// Projects the value into JSON. Callbacks become [`CALLBACK_PLACEHOLDER`].
    pub fn to_json(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Entries(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Callback(_) => Value::String(CALLBACK_PLACEHOLDER.into()),
        }
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Callback> for AttrValue {
    fn from(callback: Callback) -> Self {
        Self::Callback(callback)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.into()))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

/// How writes to an attribute combine with its previous value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrCategory {
    /// The last write wins.
    Overwrite,
    /// Every write is appended to a list.
    Append,
    /// Writes are `(entry, value)` pairs merged into an ordered record.
    Entry,
}

impl AttrCategory {
    /// Returns the category of a named attribute.
    pub fn of(name: &str) -> Self {
        match name {
            "transform" | "labelTransform" | "label" => Self::Append,
            "encode" | "scale" | "axis" | "legend" | "interaction" | "style" | "state"
            | "tooltip" | "animate" => Self::Entry,
            _ => Self::Overwrite,
        }
    }
}

/// Writes `value` into `slot` following the attribute's category.
///
/// Entry attributes written as a whole are merged entry by entry when `value` is a record,
/// and overwrite otherwise.
pub(crate) fn write_attr(
    slot: Option<&mut AttrValue>,
    category: AttrCategory,
    value: AttrValue,
) -> Option<AttrValue> {
    match (category, slot) {
        (AttrCategory::Append, Some(AttrValue::List(items))) => {
            items.push(value);
            None
        }
        (AttrCategory::Append, _) => Some(AttrValue::List(vec![value])),
        (AttrCategory::Entry, slot) => match value {
            AttrValue::Value(Value::Object(map)) => {
                let mut entries = match slot {
                    Some(AttrValue::Entries(entries)) => std::mem::take(entries),
                    _ => IndexMap::new(),
                };
                for (k, v) in map {
                    entries.insert(k, AttrValue::Value(v));
                }
                Some(AttrValue::Entries(entries))
            }
            other => Some(other),
        },
        (AttrCategory::Overwrite, _) => Some(value),
    }
}

/// Writes one entry of an entry attribute.
pub(crate) fn write_entry(
    slot: Option<&mut AttrValue>,
    entry: &str,
    value: AttrValue,
) -> Option<AttrValue> {
    match slot {
        Some(AttrValue::Entries(entries)) => {
            entries.insert(entry.into(), value);
            None
        }
        Some(AttrValue::Value(Value::Object(map))) => {
            let mut entries: IndexMap<String, AttrValue> = std::mem::take(map)
                .into_iter()
                .map(|(k, v)| (k, AttrValue::Value(v)))
                .collect();
            entries.insert(entry.into(), value);
            Some(AttrValue::Entries(entries))
        }
        _ => {
            let mut entries = IndexMap::new();
            entries.insert(entry.into(), value);
            Some(AttrValue::Entries(entries))
        }
    }
}
