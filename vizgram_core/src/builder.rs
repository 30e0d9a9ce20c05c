// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fluent builder handles.
//!
//! A handle is a [`SpecTree`] reference plus the [`NodeId`] it mutates. Setters write through
//! to the shared tree and return a fresh handle to the same node, so chains read like the
//! grammar:
//!
//! ```
//! use serde_json::json;
//! use vizgram_core::{Compose, ContainerHandle, Handle, SpecTree, ContainerKind};
//!
//! let tree = SpecTree::new(ContainerKind::View);
//! let root = ContainerHandle::new(tree.clone(), tree.root());
//! let bars = root
//!     .interval()
//!     .data(json!([{"genre": "Sports", "sold": 275}]))
//!     .encode("x", "genre")
//!     .encode("y", "sold");
//!
//! assert_eq!(bars.to_options().unwrap().to_json(), json!({
//!     "type": "interval",
//!     "data": [{"genre": "Sports", "sold": 275}],
//!     "encode": {"x": "genre", "y": "sold"},
//! }));
//! ```
//!
//! Factory methods (`interval()`, `space_flex()`, …) live on [`Compose`], which only container
//! handles implement: a mark handle has no way to gain children.

use serde_json::Value;

use crate::{AttrValue, ContainerKind, MarkKind, NodeId, NodeKind, Options, SpecTree};

/// Attribute setters and getters shared by every handle.
pub trait Handle: Clone {
    /// The tree this handle writes into.
    fn tree(&self) -> &SpecTree;

    /// The node this handle writes into.
    fn id(&self) -> NodeId;

    /// Returns `true` while the node is still reachable from the root.
    fn is_alive(&self) -> bool {
        self.tree().contains(self.id())
    }

    /// Returns the node kind, or `None` for a removed node.
    fn kind(&self) -> Option<NodeKind> {
        self.tree().kind(self.id())
    }

    /// Writes any attribute, following its category.
    fn attr(&self, name: &str, value: impl Into<AttrValue>) -> Self {
        if !self.tree().set_attr(self.id(), name, value.into()) {
            log::debug!("ignoring `{name}` on a removed node");
        }
        self.clone()
    }

    /// Reads an attribute of this node (no inheritance).
    fn attribute(&self, name: &str) -> Option<AttrValue> {
        self.tree().attr(self.id(), name)
    }

    /// Sets the node key.
    fn key(&self, key: impl Into<String>) -> Self {
        self.tree().set_key(self.id(), Some(key.into()));
        self.clone()
    }

    /// Returns the node key.
    fn node_key(&self) -> Option<String> {
        self.tree().key(self.id())
    }

    /// Sets explicit data on this node.
    fn data(&self, data: Value) -> Self {
        self.attr("data", data)
    }

    /// Returns the data this node renders with, inheriting from ancestors.
    fn effective_data(&self) -> Option<Value> {
        self.tree().effective_data(self.id())
    }

    /// Maps a visual channel to a field or constant.
    fn encode(&self, channel: &str, value: impl Into<AttrValue>) -> Self {
        self.entry("encode", channel, value)
    }

    /// Configures the scale of a visual channel.
    fn scale(&self, channel: &str, value: Value) -> Self {
        self.entry("scale", channel, value)
    }

    /// Configures the axis of a positional channel.
    fn axis(&self, channel: &str, value: impl Into<AttrValue>) -> Self {
        self.entry("axis", channel, value)
    }

    /// Configures the legend of a channel.
    fn legend(&self, channel: &str, value: impl Into<AttrValue>) -> Self {
        self.entry("legend", channel, value)
    }

    /// Sets one style property.
    fn style(&self, property: &str, value: impl Into<AttrValue>) -> Self {
        self.entry("style", property, value)
    }

    /// Sets the styles of one interaction state, e.g. `active`.
    fn state(&self, state: &str, value: Value) -> Self {
        self.entry("state", state, value)
    }

    /// Sets one tooltip option.
    fn tooltip(&self, option: &str, value: impl Into<AttrValue>) -> Self {
        self.entry("tooltip", option, value)
    }

    /// Sets the animation of one phase, e.g. `enter`.
    fn animate(&self, phase: &str, value: impl Into<AttrValue>) -> Self {
        self.entry("animate", phase, value)
    }

    /// Enables an interaction with default options.
    fn interaction(&self, name: &str) -> Self {
        self.entry("interaction", name, true)
    }

    /// Enables an interaction with explicit options.
    fn interaction_with(&self, name: &str, options: impl Into<AttrValue>) -> Self {
        self.entry("interaction", name, options)
    }

    /// Appends a data transform.
    fn transform(&self, transform: impl Into<AttrValue>) -> Self {
        self.attr("transform", transform)
    }

    /// Appends a label transform.
    fn label_transform(&self, transform: impl Into<AttrValue>) -> Self {
        self.attr("labelTransform", transform)
    }

    /// Appends a label.
    fn label(&self, label: impl Into<AttrValue>) -> Self {
        self.attr("label", label)
    }

    /// Sets the coordinate system.
    fn coordinate(&self, coordinate: Value) -> Self {
        self.attr("coordinate", coordinate)
    }

    /// Sets the theme, either by name or as an override record.
    fn theme(&self, theme: impl Into<AttrValue>) -> Self {
        self.attr("theme", theme)
    }

    /// Sets the title text or title record.
    fn title(&self, title: impl Into<AttrValue>) -> Self {
        self.attr("title", title)
    }

    /// Sets the width.
    fn width(&self, width: f64) -> Self {
        self.attr("width", width)
    }

    /// Sets the height.
    fn height(&self, height: f64) -> Self {
        self.attr("height", height)
    }

    /// Sets the uniform padding.
    fn padding(&self, padding: f64) -> Self {
        self.attr("padding", padding)
    }

    /// Sets the uniform margin.
    fn margin(&self, margin: f64) -> Self {
        self.attr("margin", margin)
    }

    /// Sets the uniform inset.
    fn inset(&self, inset: f64) -> Self {
        self.attr("inset", inset)
    }

    /// Turns container-size tracking on or off.
    fn auto_fit(&self, auto_fit: bool) -> Self {
        self.attr("autoFit", auto_fit)
    }

    /// Writes one entry of an entry attribute.
    fn entry(&self, name: &str, entry: &str, value: impl Into<AttrValue>) -> Self {
        self.tree().set_entry(self.id(), name, entry, value.into());
        self.clone()
    }

    /// Invokes `f` with this handle and returns this handle unchanged.
    ///
    /// Useful for structuring nested builds without breaking the chain.
    fn call(&self, f: impl FnOnce(&Self)) -> Self {
        f(self);
        self.clone()
    }

    /// Serializes this node and its subtree.
    fn to_options(&self) -> Option<Options> {
        self.tree().to_options(self.id())
    }

    /// Detaches this node from its parent, freeing its subtree.
    fn remove(&self) -> bool {
        self.tree().remove(self.id())
    }
}

/// A handle to a leaf mark node.
#[derive(Clone, Debug)]
pub struct MarkHandle {
    tree: SpecTree,
    id: NodeId,
}

impl MarkHandle {
    /// Wraps an existing node.
    pub fn new(tree: SpecTree, id: NodeId) -> Self {
        Self { tree, id }
    }
}

impl Handle for MarkHandle {
    fn tree(&self) -> &SpecTree {
        &self.tree
    }

    fn id(&self) -> NodeId {
        self.id
    }
}

/// A handle to a composition container node.
#[derive(Clone, Debug)]
pub struct ContainerHandle {
    tree: SpecTree,
    id: NodeId,
}

impl ContainerHandle {
    /// Wraps an existing node.
    pub fn new(tree: SpecTree, id: NodeId) -> Self {
        Self { tree, id }
    }
}

impl Handle for ContainerHandle {
    fn tree(&self) -> &SpecTree {
        &self.tree
    }

    fn id(&self) -> NodeId {
        self.id
    }
}

impl Compose for ContainerHandle {
    fn enter_container(&self, kind: ContainerKind) -> ContainerHandle {
        let id = self
            .tree
            .append_child(self.id, kind)
            .unwrap_or(NodeId::DANGLING);
        Self::new(self.tree.clone(), id)
    }
}

macro_rules! mark_factories {
    ($($method:ident => $variant:ident),* $(,)?) => {
        $(
            #[doc = concat!("Appends a `", stringify!($variant), "` mark.")]
            fn $method(&self) -> MarkHandle {
                self.mark(MarkKind::$variant)
            }
        )*
    };
}

/// Child factories, implemented by handles that may have children.
pub trait Compose: Handle {
    /// Opens a composition container below (or, for a chart root, in place of) this node.
    fn enter_container(&self, kind: ContainerKind) -> ContainerHandle;

    /// Appends a mark of any kind.
    ///
    /// If this node was turned into a mark in the meantime, the returned handle is dangling and
    /// every write through it is ignored.
    fn mark(&self, kind: MarkKind) -> MarkHandle {
        let id = self
            .tree()
            .append_child(self.id(), kind)
            .unwrap_or(NodeId::DANGLING);
        MarkHandle::new(self.tree().clone(), id)
    }

    /// Appends a mark with initial attributes.
    fn mark_with<I>(&self, kind: MarkKind, attrs: I) -> MarkHandle
    where
        I: IntoIterator<Item = (String, AttrValue)>,
    {
        let handle = self.mark(kind);
        for (name, value) in attrs {
            handle.attr(&name, value);
        }
        handle
    }

    /// Appends a nested plain view.
    fn view(&self) -> ContainerHandle {
        self.enter_container(ContainerKind::View)
    }

    /// Opens a layered-space container.
    fn space_layer(&self) -> ContainerHandle {
        self.enter_container(ContainerKind::SpaceLayer)
    }

    /// Opens a flexible-space container.
    fn space_flex(&self) -> ContainerHandle {
        self.enter_container(ContainerKind::SpaceFlex)
    }

    /// Opens a rectangular facet.
    fn facet_rect(&self) -> ContainerHandle {
        self.enter_container(ContainerKind::FacetRect)
    }

    /// Opens a matrix repeat.
    fn repeat_matrix(&self) -> ContainerHandle {
        self.enter_container(ContainerKind::RepeatMatrix)
    }

    /// Opens a circular facet.
    fn facet_circle(&self) -> ContainerHandle {
        self.enter_container(ContainerKind::FacetCircle)
    }

    /// Opens a keyframe timeline.
    fn timing_keyframe(&self) -> ContainerHandle {
        self.enter_container(ContainerKind::TimingKeyframe)
    }

    mark_factories! {
        interval => Interval,
        rect => Rect,
        point => Point,
        area => Area,
        line => Line,
        cell => Cell,
        vector => Vector,
        link => Link,
        polygon => Polygon,
        image => Image,
        text => Text,
        boxes => Box,
        line_x => LineX,
        line_y => LineY,
        range => Range,
        range_x => RangeX,
        range_y => RangeY,
        connector => Connector,
        sankey => Sankey,
        treemap => Treemap,
        boxplot => Boxplot,
        shape => Shape,
        pack => Pack,
        force_graph => ForceGraph,
        tree_mark => Tree,
        word_cloud => WordCloud,
        gauge => Gauge,
        density => Density,
        heatmap => Heatmap,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn root() -> ContainerHandle {
        let tree = SpecTree::new(ContainerKind::View);
        let id = tree.root();
        ContainerHandle::new(tree, id)
    }

    #[test]
    fn overwrite_attributes_keep_the_last_write() {
        let root = root();
        root.title("first").title("second").width(100.0).width(200.0);
        let options = root.to_options().unwrap();
        assert_eq!(options.to_json()["title"], json!("second"));
        assert_eq!(options.number("width"), Some(200.0));
    }

    #[test]
    fn append_and_entry_attributes_accumulate_in_call_order() {
        let root = root();
        root.data(json!([1, 2, 3]))
            .label_transform(json!({"type": "overlapDodgeY"}))
            .attr("key", "composition")
            .coordinate(json!({"type": "polar"}))
            .interaction("elementHighlight")
            .transform(json!({"type": "stackY"}))
            .transform(json!({"type": "sortX"}))
            .theme(json!({"defaultColor": "red"}));

        assert_eq!(
            root.to_options().unwrap().to_json(),
            json!({
                "type": "view",
                "key": "composition",
                "data": [1, 2, 3],
                "labelTransform": [{"type": "overlapDodgeY"}],
                "coordinate": {"type": "polar"},
                "interaction": {"elementHighlight": true},
                "transform": [{"type": "stackY"}, {"type": "sortX"}],
                "theme": {"defaultColor": "red"},
            })
        );
    }

    #[test]
    fn factories_append_children_in_order() {
        let root = root();
        root.interval();
        root.point();
        root.line_x();
        root.force_graph();
        let children = root.to_options().unwrap().to_json()["children"].clone();
        assert_eq!(
            children,
            json!([
                {"type": "interval"},
                {"type": "point"},
                {"type": "lineX"},
                {"type": "forceGraph"},
            ])
        );
    }

    #[test]
    fn call_builds_nested_trees() {
        let root = root();
        root.space_flex()
            .call(|node| {
                node.interval();
            })
            .call(|node| {
                node.space_flex()
                    .call(|node| {
                        node.line();
                    })
                    .call(|node| {
                        node.point();
                    });
            });
        assert_eq!(
            root.to_options().unwrap().to_json(),
            json!({
                "type": "view",
                "children": [{
                    "type": "spaceFlex",
                    "children": [
                        {"type": "interval"},
                        {"type": "spaceFlex", "children": [{"type": "line"}, {"type": "point"}]},
                    ],
                }],
            })
        );
    }

    #[test]
    fn handles_keep_mutating_their_own_node() {
        let root = root();
        let bars = root.interval().encode("x", "genre");
        let line = root.line().encode("x", "year");
        bars.encode("y", "sold");
        assert_eq!(
            bars.attribute("encode").unwrap().to_json(),
            json!({"x": "genre", "y": "sold"})
        );
        assert_eq!(
            line.attribute("encode").unwrap().to_json(),
            json!({"x": "year"})
        );
    }

    #[test]
    fn removed_handles_become_inert() {
        let root = root();
        let flex = root.space_flex();
        let bars = flex.interval();
        assert!(flex.remove());
        assert!(!bars.is_alive());
        bars.encode("x", "genre");
        assert!(bars.to_options().is_none());
        assert!(root.to_options().unwrap().children.is_empty());
    }

    #[test]
    fn mark_with_applies_initial_attributes() {
        let root = root();
        let text = root.mark_with(
            MarkKind::Text,
            [("text".to_string(), AttrValue::from("hello"))],
        );
        assert_eq!(text.attribute("text"), Some(AttrValue::from("hello")));
        let custom = root.mark(MarkKind::from_name("sparkline"));
        assert_eq!(custom.kind().unwrap().name(), "sparkline");
    }
}
