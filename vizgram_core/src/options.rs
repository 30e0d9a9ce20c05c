// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plain option records.
//!
//! [`Options`] is the detached, owned form of an option tree: what the builder serializes to,
//! what the compiler consumes, and what raw records are parsed into before they are grafted
//! onto a live tree.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{AttrValue, ConfigurationError, ContainerKind, NodeKind};

/// A detached option tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Options {
    /// Node discriminant, serialized as `type`.
    pub kind: NodeKind,
    /// Sibling-unique identity used to match realized views across renders.
    pub key: Option<String>,
    /// The node's own data, explicit or cascaded.
    pub data: Option<Value>,
    /// All other attributes, in first-write order.
    pub attributes: IndexMap<String, AttrValue>,
    /// Children in declaration order.
    pub children: Vec<Options>,
}

impl Options {
    /// Creates an empty node of the given kind.
    pub fn new(kind: impl Into<NodeKind>) -> Self {
        Self {
            kind: kind.into(),
            key: None,
            data: None,
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Looks up a numeric attribute.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.attribute(name)
            .and_then(AttrValue::as_value)
            .and_then(Value::as_f64)
    }

    /// Projects the tree into JSON: `type` first, then `key`, `data`, the attributes, and
    /// `children` only when non-empty.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), Value::String(self.kind.name().into()));
        if let Some(key) = &self.key {
            out.insert("key".into(), Value::String(key.clone()));
        }
        if let Some(data) = &self.data {
            out.insert("data".into(), data.clone());
        }
        for (name, value) in &self.attributes {
            out.insert(name.clone(), value.to_json());
        }
        if !self.children.is_empty() {
            out.insert(
                "children".into(),
                Value::Array(self.children.iter().map(Self::to_json).collect()),
            );
        }
        Value::Object(out)
    }

    /// Parses a raw record.
    ///
    /// A missing `type` means `view`. Marks may not declare children.
    pub fn from_json(value: &Value) -> Result<Self, ConfigurationError> {
        let Value::Object(record) = value else {
            return Err(invalid(format!("expected a record, found {value}")));
        };
        let kind = match record.get("type") {
            None => NodeKind::Container(ContainerKind::View),
            Some(Value::String(name)) => NodeKind::from_name(name),
            Some(other) => return Err(invalid(format!("`type` must be a string, found {other}"))),
        };
        let mut node = Self::new(kind);
        for (name, value) in record {
            match name.as_str() {
                "type" => {}
                "key" => node.key = parse_key(value)?,
                "data" => node.data = Some(value.clone()),
                "children" => {
                    let Value::Array(children) = value else {
                        return Err(invalid("`children` must be an array".into()));
                    };
                    node.children = children
                        .iter()
                        .map(Self::from_json)
                        .collect::<Result<_, _>>()?;
                }
                _ => {
                    node.attributes
                        .insert(name.clone(), AttrValue::Value(value.clone()));
                }
            }
        }
        if !node.kind.is_container() && !node.children.is_empty() {
            return Err(invalid(format!("mark `{}` cannot have children", node.kind)));
        }
        Ok(node)
    }
}

impl Serialize for Options {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

pub(crate) fn parse_key(value: &Value) -> Result<Option<String>, ConfigurationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(key) => Ok(Some(key.clone())),
        other => Err(invalid(format!("`key` must be a string, found {other}"))),
    }
}

pub(crate) fn invalid(reason: String) -> ConfigurationError {
    ConfigurationError::InvalidOptions(reason)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::MarkKind;

    #[test]
    fn parses_nested_records() {
        let options = Options::from_json(&json!({
            "type": "spaceFlex",
            "key": "root",
            "children": [
                {"type": "interval", "encode": {"x": "genre"}},
                {"children": [{"type": "line"}]},
            ],
        }))
        .unwrap();
        assert_eq!(options.kind, NodeKind::Container(ContainerKind::SpaceFlex));
        assert_eq!(options.key.as_deref(), Some("root"));
        assert_eq!(options.children.len(), 2);
        assert_eq!(options.children[0].kind, NodeKind::Mark(MarkKind::Interval));
        assert_eq!(
            options.children[1].kind,
            NodeKind::Container(ContainerKind::View)
        );
        assert_eq!(options.children[1].children.len(), 1);
    }

    #[test]
    fn rejects_children_under_marks() {
        let err = Options::from_json(&json!({
            "type": "point",
            "children": [{"type": "line"}],
        }))
        .unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_options");
    }

    #[test]
    fn rejects_non_records() {
        assert!(Options::from_json(&json!([1, 2])).is_err());
        assert!(Options::from_json(&json!({"type": 3})).is_err());
        assert!(Options::from_json(&json!({"key": 3})).is_err());
    }

    #[test]
    fn json_projection_omits_empty_children() {
        let mut options = Options::new(ContainerKind::View);
        options.data = Some(json!([1, 2, 3]));
        options
            .attributes
            .insert("theme".into(), AttrValue::from("classic"));
        assert_eq!(
            options.to_json(),
            json!({"type": "view", "data": [1, 2, 3], "theme": "classic"})
        );
    }
}
