// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mutable option tree.
//!
//! Nodes live in a generational arena owned by a [`SpecTree`]. A node exists exactly as long as
//! it is reachable from the root: removing it from its parent frees it and its whole subtree,
//! and every [`NodeId`] that pointed into the subtree goes stale. Operations on stale ids are
//! no-ops that return `None`/`false`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::options::{invalid, parse_key};
use crate::value::{write_attr, write_entry};
use crate::{AttrCategory, AttrValue, ConfigurationError, NodeKind, Options};

/// Identifies one node of a [`SpecTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// An id that never resolves to a node.
    pub const DANGLING: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };
}

/// A node's own data attribute.
///
/// `Explicit` data was set on the node directly and is never replaced by a cascade.
/// `Inherited` data was written by a cascade from the root and is replaced by the next one.
#[derive(Clone, Debug, PartialEq)]
pub enum DataSlot {
    /// Set directly on this node.
    Explicit(Value),
    /// Copied down from the root by a data change.
    Inherited(Value),
}

impl DataSlot {
    /// Returns the data regardless of where it came from.
    pub fn value(&self) -> &Value {
        match self {
            Self::Explicit(v) | Self::Inherited(v) => v,
        }
    }

    /// Returns `true` if the data was set directly on the node.
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    key: Option<String>,
    data: Option<DataSlot>,
    attrs: IndexMap<String, AttrValue>,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
}

impl Node {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            key: None,
            data: None,
            attrs: IndexMap::new(),
            parent,
            children: SmallVec::new(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Tree {
    fn new(kind: NodeKind) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId::DANGLING,
        };
        tree.root = tree.alloc(Node::new(kind, None));
        tree
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX - 1);
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        (slot.generation == id.generation)
            .then_some(slot.node.as_ref())
            .flatten()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id.index as usize) else {
                continue;
            };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        if !self.get(parent)?.kind.is_container() {
            log::warn!("refusing to append a `{kind}` child to a mark node");
            return None;
        }
        let id = self.alloc(Node::new(kind, Some(parent)));
        self.get_mut(parent)?.children.push(id);
        Some(id)
    }

    fn insert_options(&mut self, parent: NodeId, options: &Options) -> Option<NodeId> {
        let id = self.append(parent, options.kind.clone())?;
        self.fill(id, options);
        Some(id)
    }

    fn fill(&mut self, id: NodeId, options: &Options) {
        if let Some(node) = self.get_mut(id) {
            node.key.clone_from(&options.key);
            node.data = options.data.clone().map(DataSlot::Explicit);
            node.attrs.clone_from(&options.attributes);
        }
        for child in &options.children {
            self.insert_options(id, child);
        }
    }

    fn clear_children(&mut self, id: NodeId) {
        let children = match self.get_mut(id) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            self.free_subtree(child);
        }
    }

    fn to_options(&self, id: NodeId) -> Option<Options> {
        let node = self.get(id)?;
        Some(Options {
            kind: node.kind.clone(),
            key: node.key.clone(),
            data: node.data.as_ref().map(|d| d.value().clone()),
            attributes: node.attrs.clone(),
            children: node
                .children
                .iter()
                .filter_map(|&child| self.to_options(child))
                .collect(),
        })
    }
}

/// A shared, mutable option tree.
///
/// Cloning is cheap and yields another reference to the same tree. Every builder handle holds
/// one of these plus the [`NodeId`] it mutates.
#[derive(Clone, Debug)]
pub struct SpecTree {
    inner: Arc<Mutex<Tree>>,
}

impl SpecTree {
    /// Creates a tree holding a single root node.
    pub fn new(kind: impl Into<NodeKind>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Tree::new(kind.into()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if both values refer to the same tree.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the root node id.
    pub fn root(&self) -> NodeId {
        self.lock().root
    }

    /// Returns `true` if `id` still refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.lock().get(id).is_some()
    }

    /// Returns the number of live nodes.
    pub fn len(&self) -> usize {
        self.lock().slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// Returns `true` if the tree holds no nodes. Never the case for a live tree.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a node's kind.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.lock().get(id).map(|n| n.kind.clone())
    }

    /// Changes a node's kind in place, keeping its attributes and children.
    ///
    /// A node that has children can only become another container kind.
    pub fn set_kind(&self, id: NodeId, kind: impl Into<NodeKind>) -> bool {
        let kind = kind.into();
        let mut tree = self.lock();
        let Some(node) = tree.get_mut(id) else {
            return false;
        };
        if !kind.is_container() && !node.children.is_empty() {
            log::warn!("refusing to turn a container with children into mark `{kind}`");
            return false;
        }
        node.kind = kind;
        true
    }

    /// Returns a node's key.
    pub fn key(&self, id: NodeId) -> Option<String> {
        self.lock().get(id).and_then(|n| n.key.clone())
    }

    /// Sets or clears a node's key.
    pub fn set_key(&self, id: NodeId, key: Option<String>) -> bool {
        match self.lock().get_mut(id) {
            Some(node) => {
                node.key = key;
                true
            }
            None => false,
        }
    }

    /// Returns a node's parent.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.lock().get(id).and_then(|n| n.parent)
    }

    /// Returns a node's children in declaration order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.lock()
            .get(id)
            .map(|n| n.children.to_vec())
            .unwrap_or_default()
    }

    /// Reads an attribute.
    ///
    /// `data` reads the node's own data slot and `key` its key; neither falls back to
    /// ancestors. Use [`SpecTree::effective_data`] for inherited data.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<AttrValue> {
        let tree = self.lock();
        let node = tree.get(id)?;
        match name {
            "data" => node.data.as_ref().map(|d| AttrValue::Value(d.value().clone())),
            "key" => node.key.clone().map(AttrValue::from),
            _ => node.attrs.get(name).cloned(),
        }
    }

    /// Writes an attribute following its [`AttrCategory`].
    ///
    /// Writing `data` marks the node's data as explicit. Writing `key` with a string (or
    /// `null`) sets (or clears) the key.
    pub fn set_attr(&self, id: NodeId, name: &str, value: AttrValue) -> bool {
        let mut tree = self.lock();
        let Some(node) = tree.get_mut(id) else {
            return false;
        };
        match (name, value) {
            ("data", AttrValue::Value(data)) => node.data = Some(DataSlot::Explicit(data)),
            ("key", AttrValue::Value(Value::String(key))) => node.key = Some(key),
            ("key", AttrValue::Value(Value::Null)) => node.key = None,
            (name, value) => {
                let category = AttrCategory::of(name);
                if let Some(replacement) = write_attr(node.attrs.get_mut(name), category, value)
                {
                    node.attrs.insert(name.into(), replacement);
                }
            }
        }
        true
    }

    /// Writes one entry of an entry attribute such as `encode` or `interaction`.
    pub fn set_entry(&self, id: NodeId, name: &str, entry: &str, value: AttrValue) -> bool {
        let mut tree = self.lock();
        let Some(node) = tree.get_mut(id) else {
            return false;
        };
        if let Some(replacement) = write_entry(node.attrs.get_mut(name), entry, value) {
            node.attrs.insert(name.into(), replacement);
        }
        true
    }

    /// Removes an attribute. `data` clears the data slot.
    pub fn unset_attr(&self, id: NodeId, name: &str) -> Option<AttrValue> {
        let mut tree = self.lock();
        let node = tree.get_mut(id)?;
        match name {
            "data" => node.data.take().map(|d| match d {
                DataSlot::Explicit(v) | DataSlot::Inherited(v) => AttrValue::Value(v),
            }),
            _ => node.attrs.shift_remove(name),
        }
    }

    /// Returns a node's own data slot.
    pub fn data(&self, id: NodeId) -> Option<DataSlot> {
        self.lock().get(id).and_then(|n| n.data.clone())
    }

    /// Returns the data a node renders with: its own, else the nearest ancestor's.
    pub fn effective_data(&self, id: NodeId) -> Option<Value> {
        let tree = self.lock();
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let node = tree.get(id)?;
            if let Some(data) = &node.data {
                return Some(data.value().clone());
            }
            cursor = node.parent;
        }
        None
    }

    /// Replaces the root data and cascades it into every descendant mark without explicit data.
    ///
    /// Marks with explicit data keep it. Returns the number of marks that received the new data.
    pub fn change_data(&self, data: Value) -> usize {
        let mut tree = self.lock();
        let root = tree.root;
        let mut cascaded = 0;
        let mut stack: Vec<NodeId> = tree
            .get(root)
            .map(|n| n.children.to_vec())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            let Some(node) = tree.get_mut(id) else {
                continue;
            };
            if node.kind.is_container() {
                stack.extend(node.children.iter().copied());
            } else if !node.data.as_ref().is_some_and(DataSlot::is_explicit) {
                node.data = Some(DataSlot::Inherited(data.clone()));
                cascaded += 1;
            }
        }
        if let Some(node) = tree.get_mut(root) {
            node.data = Some(DataSlot::Explicit(data));
        }
        cascaded
    }

    /// Appends a new child to a container node.
    ///
    /// Returns `None` if `parent` is stale or is a mark.
    pub fn append_child(&self, parent: NodeId, kind: impl Into<NodeKind>) -> Option<NodeId> {
        self.lock().append(parent, kind.into())
    }

    /// Appends a detached option tree below a container node.
    pub fn append_options(&self, parent: NodeId, options: &Options) -> Option<NodeId> {
        self.lock().insert_options(parent, options)
    }

    /// Detaches a node from its parent and frees its subtree.
    ///
    /// The root cannot be removed.
    pub fn remove(&self, id: NodeId) -> bool {
        let mut tree = self.lock();
        let Some(parent) = tree.get(id).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(node) = tree.get_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        tree.free_subtree(id);
        true
    }

    /// Serializes a subtree depth-first. Pure: the tree is not modified.
    pub fn to_options(&self, id: NodeId) -> Option<Options> {
        self.lock().to_options(id)
    }

    /// Serializes the whole tree.
    pub fn snapshot(&self) -> Options {
        let tree = self.lock();
        let root = tree.root;
        tree.to_options(root)
            .unwrap_or_else(|| Options::new(crate::ContainerKind::View))
    }

    /// Applies a raw record to the root.
    ///
    /// `type` changes the root kind, `children` replaces all children, `key` sets the root
    /// key, `data` sets explicit root data, and every other entry overwrites the attribute of
    /// the same name verbatim. The record is validated before anything is written.
    pub fn apply_patch(&self, patch: &Value) -> Result<(), ConfigurationError> {
        let Value::Object(record) = patch else {
            return Err(invalid(format!("expected a record, found {patch}")));
        };
        let kind = match record.get("type") {
            None => None,
            Some(Value::String(name)) => Some(NodeKind::from_name(name)),
            Some(other) => return Err(invalid(format!("`type` must be a string, found {other}"))),
        };
        let key = record.get("key").map(parse_key).transpose()?;
        let children = match record.get("children") {
            None => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(Options::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => return Err(invalid("`children` must be an array".into())),
        };

        let mut tree = self.lock();
        let root = tree.root;
        let has_children = match &children {
            Some(children) => !children.is_empty(),
            None => tree.get(root).is_some_and(|n| !n.children.is_empty()),
        };
        if let Some(kind) = &kind {
            if !kind.is_container() && has_children {
                return Err(invalid(format!("mark `{kind}` cannot have children")));
            }
        }

        if let Some(children) = &children {
            tree.clear_children(root);
            for child in children {
                tree.insert_options(root, child);
            }
        }
        let Some(node) = tree.get_mut(root) else {
            return Ok(());
        };
        if let Some(kind) = kind {
            node.kind = kind;
        }
        if let Some(key) = key {
            node.key = key;
        }
        for (name, value) in record {
            match name.as_str() {
                "type" | "key" | "children" => {}
                "data" => node.data = Some(DataSlot::Explicit(value.clone())),
                _ => {
                    node.attrs.insert(name.clone(), AttrValue::Value(value.clone()));
                }
            }
        }
        Ok(())
    }

    /// Replaces the whole tree with an empty root of the given kind.
    ///
    /// Every previously issued [`NodeId`], including the old root, goes stale.
    pub fn reset(&self, kind: impl Into<NodeKind>) -> NodeId {
        let mut tree = self.lock();
        let old_root = tree.root;
        tree.free_subtree(old_root);
        let root = tree.alloc(Node::new(kind.into(), None));
        tree.root = root;
        root
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ContainerKind, MarkKind};

    fn view_tree() -> SpecTree {
        SpecTree::new(ContainerKind::View)
    }

    #[test]
    fn children_keep_declaration_order() {
        let tree = view_tree();
        let root = tree.root();
        let a = tree.append_child(root, MarkKind::Interval).unwrap();
        let b = tree.append_child(root, MarkKind::Point).unwrap();
        assert_eq!(tree.children(root), vec![a, b]);
        assert_eq!(tree.parent(b), Some(root));
    }

    #[test]
    fn marks_never_gain_children() {
        let tree = view_tree();
        let mark = tree.append_child(tree.root(), MarkKind::Line).unwrap();
        assert!(tree.append_child(mark, MarkKind::Point).is_none());
        assert!(tree.children(mark).is_empty());
    }

    #[test]
    fn removal_frees_the_subtree_and_stales_ids() {
        let tree = view_tree();
        let root = tree.root();
        let flex = tree.append_child(root, ContainerKind::SpaceFlex).unwrap();
        let line = tree.append_child(flex, MarkKind::Line).unwrap();
        assert_eq!(tree.len(), 3);

        assert!(tree.remove(flex));
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains(flex));
        assert!(!tree.contains(line));
        assert!(!tree.set_attr(line, "title", "stale".into()));

        // Freed slots are reused under a new generation.
        let fresh = tree.append_child(root, MarkKind::Point).unwrap();
        assert_ne!(fresh, flex);
        assert_ne!(fresh, line);
        assert!(!tree.contains(line));
    }

    #[test]
    fn root_cannot_be_removed() {
        let tree = view_tree();
        assert!(!tree.remove(tree.root()));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn effective_data_inherits_from_nearest_ancestor() {
        let tree = view_tree();
        let root = tree.root();
        tree.set_attr(root, "data", json!([1]).into());
        let flex = tree.append_child(root, ContainerKind::SpaceFlex).unwrap();
        let a = tree.append_child(flex, MarkKind::Interval).unwrap();
        assert_eq!(tree.effective_data(a), Some(json!([1])));

        tree.set_attr(flex, "data", json!([2]).into());
        assert_eq!(tree.effective_data(a), Some(json!([2])));
        assert_eq!(tree.data(a), None);
    }

    #[test]
    fn change_data_skips_explicit_overrides() {
        let tree = view_tree();
        let root = tree.root();
        let a = tree.append_child(root, MarkKind::Interval).unwrap();
        let b = tree.append_child(root, MarkKind::Line).unwrap();
        let flex = tree.append_child(root, ContainerKind::SpaceFlex).unwrap();
        tree.set_attr(flex, "data", json!(["flex"]).into());
        let c = tree.append_child(flex, MarkKind::Point).unwrap();
        tree.set_attr(a, "data", json!(["x"]).into());

        assert_eq!(tree.change_data(json!(["y"])), 2);

        assert_eq!(tree.data(a), Some(DataSlot::Explicit(json!(["x"]))));
        assert_eq!(tree.effective_data(b), Some(json!(["y"])));
        assert_eq!(tree.effective_data(c), Some(json!(["y"])));
        assert_eq!(tree.data(root), Some(DataSlot::Explicit(json!(["y"]))));

        // A second change replaces cascaded copies but still not the override.
        tree.change_data(json!(["z"]));
        assert_eq!(tree.effective_data(b), Some(json!(["z"])));
        assert_eq!(tree.effective_data(a), Some(json!(["x"])));
    }

    #[test]
    fn set_kind_refuses_to_strand_children() {
        let tree = view_tree();
        let root = tree.root();
        tree.append_child(root, MarkKind::Interval);
        assert!(!tree.set_kind(root, MarkKind::Point));
        assert!(tree.set_kind(root, ContainerKind::SpaceLayer));
        assert_eq!(
            tree.kind(root),
            Some(NodeKind::Container(ContainerKind::SpaceLayer))
        );
    }

    #[test]
    fn apply_patch_replaces_children_and_overwrites_attributes() {
        let tree = view_tree();
        let root = tree.root();
        let old = tree.append_child(root, MarkKind::Point).unwrap();
        tree.set_attr(root, "transform", json!({"type": "stackY"}).into());

        tree.apply_patch(&json!({
            "type": "spaceLayer",
            "key": "layer",
            "transform": [{"type": "dodgeX"}],
            "children": [{"type": "interval"}, {"type": "line"}],
        }))
        .unwrap();

        assert!(!tree.contains(old));
        assert_eq!(
            tree.snapshot().to_json(),
            json!({
                "type": "spaceLayer",
                "key": "layer",
                "transform": [{"type": "dodgeX"}],
                "children": [{"type": "interval"}, {"type": "line"}],
            })
        );
    }

    #[test]
    fn apply_patch_is_all_or_nothing() {
        let tree = view_tree();
        let root = tree.root();
        tree.append_child(root, MarkKind::Point);
        let err = tree
            .apply_patch(&json!({"type": "interval", "theme": "dark"}))
            .unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_options");
        assert_eq!(tree.attr(root, "theme"), None);
        assert_eq!(tree.children(root).len(), 1);
    }

    #[test]
    fn reset_stales_every_previous_id() {
        let tree = view_tree();
        let root = tree.root();
        let child = tree.append_child(root, MarkKind::Point).unwrap();
        let new_root = tree.reset(ContainerKind::View);
        assert!(!tree.contains(root));
        assert!(!tree.contains(child));
        assert_eq!(tree.root(), new_root);
        assert_eq!(tree.len(), 1);
    }
}
