// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node discriminants.
//!
//! A node is either a leaf mark or a composition container. Only containers carry children;
//! the builder API enforces this by handing out different handle types for the two.

use std::fmt;
use std::sync::Arc;

macro_rules! mark_kinds {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// A leaf mark kind.
        ///
        /// The core never interprets mark-specific attributes; the kind only selects which
        /// drawing primitive the compiler realizes.
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum MarkKind {
            $(
                #[doc = concat!("The `", $name, "` mark.")]
                $variant,
            )*
            /// A mark registered by a compiler library under its own name.
            Custom(Arc<str>),
        }

        impl MarkKind {
            /// Returns the name used in serialized options.
            pub fn name(&self) -> &str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Custom(name) => &**name,
                }
            }

            /// Parses a serialized mark name.
            ///
            /// Unknown names become [`MarkKind::Custom`]; whether they are valid is up to the
            /// compiler.
            pub fn from_name(name: &str) -> Self {
                match name {
                    $($name => Self::$variant,)*
                    other => Self::Custom(Arc::from(other)),
                }
            }

            /// Returns `true` for marks that ship with the grammar.
            pub fn is_builtin(&self) -> bool {
                !matches!(self, Self::Custom(_))
            }
        }
    };
}

mark_kinds! {
    Interval => "interval",
    Rect => "rect",
    Point => "point",
    Area => "area",
    Line => "line",
    Cell => "cell",
    Vector => "vector",
    Link => "link",
    Polygon => "polygon",
    Image => "image",
    Text => "text",
    Box => "box",
    LineX => "lineX",
    LineY => "lineY",
    Range => "range",
    RangeX => "rangeX",
    RangeY => "rangeY",
    Connector => "connector",
    Sankey => "sankey",
    Treemap => "treemap",
    Boxplot => "boxplot",
    Shape => "shape",
    Pack => "pack",
    ForceGraph => "forceGraph",
    Tree => "tree",
    WordCloud => "wordCloud",
    Gauge => "gauge",
    Density => "density",
    Heatmap => "heatmap",
}

/// A composition container kind.
///
/// Containers arrange sub-plots or frames; the arrangement itself is external layout logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// A single plot view whose children share scales and coordinate.
    View,
    /// Children are stacked on top of each other in the same space.
    SpaceLayer,
    /// Children split the available space along a direction.
    SpaceFlex,
    /// Children are repeated across a rectangular facet grid.
    FacetRect,
    /// Children are repeated across a matrix of encodings.
    RepeatMatrix,
    /// Children are repeated around a circle.
    FacetCircle,
    /// Children are frames of a keyframe timeline.
    TimingKeyframe,
}

impl ContainerKind {
    /// Returns the name used in serialized options.
    pub fn name(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::SpaceLayer => "spaceLayer",
            Self::SpaceFlex => "spaceFlex",
            Self::FacetRect => "facetRect",
            Self::RepeatMatrix => "repeatMatrix",
            Self::FacetCircle => "facetCircle",
            Self::TimingKeyframe => "timingKeyframe",
        }
    }

    /// Parses a serialized container name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "view" => Self::View,
            "spaceLayer" => Self::SpaceLayer,
            "spaceFlex" => Self::SpaceFlex,
            "facetRect" => Self::FacetRect,
            "repeatMatrix" => Self::RepeatMatrix,
            "facetCircle" => Self::FacetCircle,
            "timingKeyframe" => Self::TimingKeyframe,
            _ => return None,
        })
    }
}

/// The discriminant of an option node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A leaf mark. Never has children.
    Mark(MarkKind),
    /// A composition container.
    Container(ContainerKind),
}

impl NodeKind {
    /// Returns the name used as `type` in serialized options.
    pub fn name(&self) -> &str {
        match self {
            Self::Mark(m) => m.name(),
            Self::Container(c) => c.name(),
        }
    }

    /// Parses a serialized `type`, preferring container names.
    pub fn from_name(name: &str) -> Self {
        match ContainerKind::from_name(name) {
            Some(c) => Self::Container(c),
            None => Self::Mark(MarkKind::from_name(name)),
        }
    }

    /// Returns `true` if nodes of this kind may have children.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container(_))
    }
}

impl From<MarkKind> for NodeKind {
    fn from(kind: MarkKind) -> Self {
        Self::Mark(kind)
    }
}

impl From<ContainerKind> for NodeKind {
    fn from(kind: ContainerKind) -> Self {
        Self::Container(kind)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
