// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Realized views: what a compiler hands to a renderer.

use indexmap::IndexMap;
use kurbo::{BezPath, Circle, Point, Rect};
use peniko::Color;
use serde_json::Value;
use vizgram_core::{MarkKind, Theme};

/// The coordinate system of one view.
#[derive(Clone, Debug, PartialEq)]
pub struct Coordinate {
    /// Coordinate type, e.g. `cartesian` or `polar`.
    pub kind: String,
    /// Coordinate transforms (`transpose`, `reflect`, …) in declaration order.
    pub transforms: Vec<Value>,
    /// The plot rectangle the coordinate maps into.
    pub bounds: Rect,
}

/// How a scale maps its domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScaleKind {
    /// Continuous numeric domain to a continuous range.
    Linear,
    /// Discrete domain to evenly sized bands.
    Band,
    /// Discrete domain to discrete outputs (palette slots, shapes).
    Ordinal,
    /// Any other scale type named by the options; mapped as identity.
    Other(String),
}

impl ScaleKind {
    /// Parses a scale `type` name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "linear" => Self::Linear,
            "band" => Self::Band,
            "ordinal" => Self::Ordinal,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A resolved scale of one visual channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Scale {
    /// Scale type.
    pub kind: ScaleKind,
    /// Data field bound to the channel, if it is a field encoding.
    pub field: Option<String>,
    /// Domain values: `[min, max]` for linear scales, distinct values otherwise.
    pub domain: Vec<Value>,
    /// Output range.
    pub range: (f64, f64),
    /// Inner and outer padding of band scales, in band units.
    pub padding: (f64, f64),
}

impl Scale {
    /// Creates a scale with a domain and range.
    pub fn new(kind: ScaleKind, domain: Vec<Value>, range: (f64, f64)) -> Self {
        Self {
            kind,
            field: None,
            domain,
            range,
            padding: (0.1, 0.1),
        }
    }

    /// Sets the bound field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn linear_domain(&self) -> (f64, f64) {
        let min = self.domain.first().and_then(Value::as_f64).unwrap_or(0.0);
        let max = self.domain.last().and_then(Value::as_f64).unwrap_or(min);
        (min, max)
    }

    fn index_of(&self, value: &Value) -> Option<usize> {
        self.domain.iter().position(|d| d == value)
    }

    /// Returns the width of one band; zero for non-band scales.
    pub fn band_width(&self) -> f64 {
        if self.kind != ScaleKind::Band || self.domain.is_empty() {
            return 0.0;
        }
        let (inner, outer) = self.padding;
        let n = self.domain.len() as f64;
        let span = (self.range.1 - self.range.0).abs();
        let denom = n + inner * (n - 1.0) + 2.0 * outer;
        if denom == 0.0 { 0.0 } else { span / denom }
    }

    /// Maps a domain value into the range.
    ///
    /// Band scales return the start of the band, ordinal scales the domain index.
    pub fn map(&self, value: &Value) -> Option<f64> {
        match &self.kind {
            ScaleKind::Linear => {
                let x = value.as_f64()?;
                let (d0, d1) = self.linear_domain();
                let (r0, r1) = self.range;
                if d1 == d0 {
                    return Some(r0);
                }
                Some(r0 + (x - d0) / (d1 - d0) * (r1 - r0))
            }
            ScaleKind::Band => {
                let index = self.index_of(value)? as f64;
                let bw = self.band_width();
                let (inner, outer) = self.padding;
                let start = self.range.0.min(self.range.1);
                Some(start + bw * outer + bw * (1.0 + inner) * index)
            }
            ScaleKind::Ordinal => self.index_of(value).map(|i| i as f64),
            ScaleKind::Other(_) => value.as_f64(),
        }
    }
}

/// One drawable primitive produced for a mark.
#[derive(Clone, Debug, PartialEq)]
pub enum Glyph {
    /// A filled rectangle.
    Rect {
        /// Geometry.
        rect: Rect,
        /// Fill.
        fill: Color,
    },
    /// A filled circle.
    Circle {
        /// Geometry.
        circle: Circle,
        /// Fill.
        fill: Color,
    },
    /// A stroked, optionally filled path.
    Path {
        /// Geometry.
        path: BezPath,
        /// Fill, for closed areas.
        fill: Option<Color>,
        /// Stroke.
        stroke: Color,
        /// Stroke width; zero disables the stroke.
        stroke_width: f64,
    },
    /// A text run anchored at its start.
    Text {
        /// Anchor position.
        pos: Point,
        /// Content.
        text: String,
        /// Font size in pixels.
        font_size: f64,
        /// Fill.
        fill: Color,
    },
}

/// A compiled mark.
#[derive(Clone, Debug, PartialEq)]
pub struct RealizedMark {
    /// Key of the source node, or a generated one.
    pub key: String,
    /// Mark kind.
    pub kind: MarkKind,
    /// The data rows the mark was compiled from.
    pub rows: Vec<Value>,
    /// Channel encodings as written in the options.
    pub encode: IndexMap<String, Value>,
    /// Primitives to paint, in paint order.
    pub glyphs: Vec<Glyph>,
}

/// Scenegraph group of one view: an identifier plus the keys of the marks it contains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneGroup {
    /// Group identifier; equal to the view key.
    pub id: String,
    /// Keys of the marks painted into this group, in paint order.
    pub children: Vec<String>,
}

/// The compiled, paintable result of one container node.
#[derive(Clone, Debug, PartialEq)]
pub struct RealizedView {
    /// Key of the source node, or a generated one.
    pub key: String,
    /// Outer box of the view, including margin and padding.
    pub bounds: Rect,
    /// Coordinate descriptor.
    pub coordinate: Coordinate,
    /// Resolved scales keyed by channel name.
    pub scales: IndexMap<String, Scale>,
    /// Scenegraph group.
    pub group: SceneGroup,
    /// Theme the view was compiled with.
    pub theme: Theme,
    /// Compiled marks in declaration order.
    pub marks: Vec<RealizedMark>,
}

impl RealizedView {
    /// Returns the scale of a channel.
    pub fn scale(&self, channel: &str) -> Option<&Scale> {
        self.scales.get(channel)
    }
}
