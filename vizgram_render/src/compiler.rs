// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compiler seam and the default view compiler.

use async_trait::async_trait;
use hashbrown::HashSet;
use indexmap::IndexMap;
use kurbo::{BezPath, Circle, Insets, Point, Rect, Size};
use peniko::Color;
use peniko::color::{Srgb, parse_color};
use serde_json::Value;
use vizgram_core::{AttrValue, CompileError, ContainerKind, MarkKind, NodeKind, Options, Theme};

use crate::view::{Coordinate, Glyph, RealizedMark, RealizedView, Scale, ScaleKind, SceneGroup};

/// Size used when the options carry no `width`/`height`.
pub const DEFAULT_VIEW_SIZE: Size = Size::new(640.0, 480.0);

const DEFAULT_PADDING: f64 = 24.0;
const ROOT_KEY: &str = "root";

/// Turns a resolved option tree into realized views.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compiles `options` with `theme`. The first view returned belongs to the root node.
    async fn compile(
        &self,
        options: &Options,
        theme: &Theme,
    ) -> Result<Vec<RealizedView>, CompileError>;
}

/// Compiles every container node into one [`RealizedView`] holding its direct mark children.
///
/// Layout is intentionally simple: `spaceFlex` splits its box evenly along its `direction`
/// (`row` by default), every other container gives each child its own full box.
#[derive(Clone, Debug, Default)]
pub struct ViewCompiler {
    custom_marks: HashSet<String>,
}

impl ViewCompiler {
    /// Creates a compiler that knows the built-in marks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a custom mark name; it compiles like a `point` mark.
    pub fn with_mark(mut self, name: impl Into<String>) -> Self {
        self.custom_marks.insert(name.into());
        self
    }

    fn check_mark(&self, kind: &MarkKind) -> Result<(), CompileError> {
        match kind {
            MarkKind::Custom(name) if !self.custom_marks.contains(&**name) => {
                Err(CompileError::UnknownMark(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn compile_tree(
        &self,
        options: &Options,
        theme: &Theme,
    ) -> Result<Vec<RealizedView>, CompileError> {
        let key = options.key.clone().unwrap_or_else(|| ROOT_KEY.to_owned());
        let size = Size::new(
            options.number("width").unwrap_or(DEFAULT_VIEW_SIZE.width),
            options.number("height").unwrap_or(DEFAULT_VIEW_SIZE.height),
        );
        let bounds = Rect::from_origin_size(Point::ORIGIN, size);
        let mut views = Vec::new();
        if options.kind.is_container() {
            self.compile_container(options, key, bounds, None, theme, &mut views)?;
        } else {
            // A lone mark is wrapped into an implicit view sharing its key.
            let mut view = Options::new(ContainerKind::View);
            view.attributes.clone_from(&options.attributes);
            view.data.clone_from(&options.data);
            let mut mark = options.clone();
            mark.key = None;
            mark.data = None;
            view.children.push(mark);
            self.compile_container(&view, key, bounds, None, theme, &mut views)?;
        }
        Ok(views)
    }

    fn compile_container(
        &self,
        node: &Options,
        key: String,
        bounds: Rect,
        inherited: Option<&Value>,
        theme: &Theme,
        out: &mut Vec<RealizedView>,
    ) -> Result<(), CompileError> {
        let data = node.data.as_ref().or(inherited);
        let plot = bounds - insets(node);

        let mut marks = Vec::new();
        let mut nested = Vec::new();
        for (i, child) in node.children.iter().enumerate() {
            let child_key = child.key.clone().unwrap_or_else(|| format!("{key}-{i}"));
            match &child.kind {
                NodeKind::Mark(kind) => {
                    self.check_mark(kind)?;
                    let rows = rows(child.data.as_ref().or(data), &child_key)?;
                    marks.push((child, child_key, kind.clone(), rows));
                }
                NodeKind::Container(_) => nested.push((child, child_key)),
            }
        }

        let scales = infer_scales(node, &marks, plot, theme);
        let realized: Vec<RealizedMark> = marks
            .into_iter()
            .map(|(child, key, kind, rows)| {
                realize_mark(child, key, kind, rows, &scales, plot, theme)
            })
            .collect();

        out.push(RealizedView {
            group: SceneGroup {
                id: key.clone(),
                children: realized.iter().map(|m| m.key.clone()).collect(),
            },
            key,
            bounds,
            coordinate: coordinate(node, plot),
            scales,
            theme: theme.clone(),
            marks: realized,
        });

        let boxes = child_boxes(node, plot, nested.len());
        for ((child, child_key), child_bounds) in nested.into_iter().zip(boxes) {
            self.compile_container(child, child_key, child_bounds, data, theme, out)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Compiler for ViewCompiler {
    async fn compile(
        &self,
        options: &Options,
        theme: &Theme,
    ) -> Result<Vec<RealizedView>, CompileError> {
        let views = self.compile_tree(options, theme)?;
        log::debug!("compiled {} view(s)", views.len());
        Ok(views)
    }
}

fn insets(node: &Options) -> Insets {
    let total = ["margin", "padding", "inset"]
        .iter()
        .map(|name| {
            node.number(name).unwrap_or(if *name == "padding" {
                DEFAULT_PADDING
            } else {
                0.0
            })
        })
        .sum::<f64>();
    Insets::uniform(total)
}

fn coordinate(node: &Options, bounds: Rect) -> Coordinate {
    let value = node.attribute("coordinate").map(AttrValue::to_json);
    let kind = value
        .as_ref()
        .and_then(|v| v.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("cartesian")
        .to_owned();
    let transforms = value
        .as_ref()
        .and_then(|v| v.get("transform"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Coordinate {
        kind,
        transforms,
        bounds,
    }
}

fn child_boxes(node: &Options, bounds: Rect, count: usize) -> Vec<Rect> {
    if node.kind != NodeKind::Container(ContainerKind::SpaceFlex) || count == 0 {
        return vec![bounds; count];
    }
    let column = node
        .attribute("direction")
        .and_then(AttrValue::as_value)
        .and_then(Value::as_str)
        == Some("col");
    let n = count as f64;
    (0..count)
        .map(|i| {
            let t0 = i as f64 / n;
            let t1 = (i + 1) as f64 / n;
            if column {
                let h = bounds.height();
                Rect::new(bounds.x0, bounds.y0 + h * t0, bounds.x1, bounds.y0 + h * t1)
            } else {
                let w = bounds.width();
                Rect::new(bounds.x0 + w * t0, bounds.y0, bounds.x0 + w * t1, bounds.y1)
            }
        })
        .collect()
}

fn rows(data: Option<&Value>, key: &str) -> Result<Vec<Value>, CompileError> {
    match data {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(rows)) => Ok(rows.clone()),
        Some(Value::Object(record)) if record.contains_key("value") => match &record["value"] {
            Value::Array(rows) => Ok(rows.clone()),
            other => Err(CompileError::InvalidNode {
                key: key.to_owned(),
                reason: format!("inline data value must be an array, found {other}"),
            }),
        },
        Some(other) => Err(CompileError::InvalidNode {
            key: key.to_owned(),
            reason: format!("data must be an array, found {other}"),
        }),
    }
}

fn encodings(node: &Options) -> IndexMap<String, Value> {
    match node.attribute("encode").map(AttrValue::to_json) {
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => IndexMap::new(),
    }
}

/// Looks up the value of a channel for one row: field names read the row, other values are
/// constants.
fn channel_value(encoding: &Value, row: &Value) -> Option<Value> {
    match encoding {
        Value::String(field) => row.get(field).cloned().or_else(|| Some(encoding.clone())),
        Value::Object(record) => match record.get("type").and_then(Value::as_str) {
            Some("constant") => record.get("value").cloned(),
            _ => record
                .get("field")
                .or_else(|| record.get("value"))
                .and_then(Value::as_str)
                .and_then(|f| row.get(f))
                .cloned(),
        },
        other => Some(other.clone()),
    }
}

fn field_name(encoding: &Value) -> Option<String> {
    match encoding {
        Value::String(field) => Some(field.clone()),
        Value::Object(record) => record.get("field").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

fn infer_scales(
    node: &Options,
    marks: &[(&Options, String, MarkKind, Vec<Value>)],
    plot: Rect,
    theme: &Theme,
) -> IndexMap<String, Scale> {
    let mut observed: IndexMap<String, (Option<String>, Vec<Value>)> = IndexMap::new();
    for (mark, _, _, rows) in marks {
        for (channel, encoding) in encodings(mark) {
            let entry = observed.entry(channel).or_default();
            if entry.0.is_none() {
                entry.0 = field_name(&encoding);
            }
            entry
                .1
                .extend(rows.iter().filter_map(|row| channel_value(&encoding, row)));
        }
    }

    let mut scales = IndexMap::new();
    for (channel, (field, values)) in observed {
        let numeric = !values.is_empty() && values.iter().all(Value::is_number);
        let kind = match (numeric, channel.as_str()) {
            (true, _) => ScaleKind::Linear,
            (false, "x") => ScaleKind::Band,
            (false, _) => ScaleKind::Ordinal,
        };
        let mut scale = Scale::new(kind, Vec::new(), range_of(&channel, plot, theme));
        scale.field = field;
        scale.domain = domain_of(&scale.kind, &values);
        apply_scale_options(&mut scale, node, &channel);
        for (mark, ..) in marks {
            apply_scale_options(&mut scale, mark, &channel);
        }
        scales.insert(channel, scale);
    }
    scales
}

fn range_of(channel: &str, plot: Rect, theme: &Theme) -> (f64, f64) {
    match channel {
        "x" => (plot.x0, plot.x1),
        "y" => (plot.y1, plot.y0),
        "color" => (0.0, theme.palette.len() as f64),
        "size" => (2.0, 12.0),
        _ => (0.0, 1.0),
    }
}

fn domain_of(kind: &ScaleKind, values: &[Value]) -> Vec<Value> {
    if *kind == ScaleKind::Linear {
        let numbers = values.iter().filter_map(Value::as_f64);
        let (min, max) = numbers.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if min > max {
            return Vec::new();
        }
        // Quantitative position scales start at zero, like bar baselines.
        return vec![Value::from(min.min(0.0)), Value::from(max)];
    }
    let mut distinct: Vec<Value> = Vec::new();
    for value in values {
        if !distinct.contains(value) {
            distinct.push(value.clone());
        }
    }
    distinct
}

fn apply_scale_options(scale: &mut Scale, node: &Options, channel: &str) {
    let Some(options) = node.attribute("scale").and_then(|s| s.entry(channel)) else {
        return;
    };
    let options = options.to_json();
    if let Some(kind) = options.get("type").and_then(Value::as_str) {
        scale.kind = ScaleKind::from_name(kind);
    }
    if let Some(domain) = options.get("domain").and_then(Value::as_array) {
        scale.domain.clone_from(domain);
    }
    if let Some([r0, r1]) = options.get("range").and_then(Value::as_array).map(Vec::as_slice) {
        if let (Some(r0), Some(r1)) = (r0.as_f64(), r1.as_f64()) {
            scale.range = (r0, r1);
        }
    }
    if let Some(inner) = options.get("paddingInner").and_then(Value::as_f64) {
        scale.padding.0 = inner.max(0.0);
    }
    if let Some(outer) = options.get("paddingOuter").and_then(Value::as_f64) {
        scale.padding.1 = outer.max(0.0);
    }
}

fn parse_fill(value: Option<&Value>) -> Option<Color> {
    let text = value?.as_str()?;
    parse_color(text).ok().map(|c| c.to_alpha_color::<Srgb>())
}

struct MarkContext<'a> {
    scales: &'a IndexMap<String, Scale>,
    encode: &'a IndexMap<String, Value>,
    plot: Rect,
    theme: &'a Theme,
    style_fill: Option<Color>,
}

impl MarkContext<'_> {
    fn value(&self, channel: &str, row: &Value) -> Option<Value> {
        channel_value(self.encode.get(channel)?, row)
    }

    fn position(&self, channel: &str, row: &Value) -> Option<f64> {
        let value = self.value(channel, row)?;
        match self.scales.get(channel) {
            Some(scale) => scale.map(&value),
            None => value.as_f64(),
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "ordinal indices are small non-negative integers"
    )]
    fn fill(&self, row: &Value) -> Color {
        if let Some(fill) = self.style_fill {
            return fill;
        }
        let Some(value) = self.value("color", row) else {
            return self.theme.default_color;
        };
        if let Some(color) = parse_fill(Some(&value)) {
            return color;
        }
        match self.scales.get("color").and_then(|s| s.map(&value)) {
            Some(index) if index >= 0.0 => self.theme.category_color(index as usize),
            _ => self.theme.default_color,
        }
    }

    fn x_center(&self, row: &Value) -> Option<f64> {
        let x = self.position("x", row)?;
        let half = self.scales.get("x").map_or(0.0, Scale::band_width) / 2.0;
        Some(x + half)
    }

    fn baseline(&self) -> f64 {
        self.scales
            .get("y")
            .and_then(|s| s.map(&Value::from(0.0)))
            .unwrap_or(self.plot.y1)
    }
}

fn realize_mark(
    node: &Options,
    key: String,
    kind: MarkKind,
    rows: Vec<Value>,
    scales: &IndexMap<String, Scale>,
    plot: Rect,
    theme: &Theme,
) -> RealizedMark {
    let encode = encodings(node);
    let style_fill = node
        .attribute("style")
        .and_then(|s| s.entry("fill"))
        .and_then(|v| parse_fill(v.as_value()));
    let cx = MarkContext {
        scales,
        encode: &encode,
        plot,
        theme,
        style_fill,
    };
    let glyphs = match &kind {
        MarkKind::Interval | MarkKind::Rect | MarkKind::Cell => bars(&cx, &rows),
        MarkKind::Line => path(&cx, &rows, false).into_iter().collect(),
        MarkKind::Area => path(&cx, &rows, true).into_iter().collect(),
        MarkKind::Text => texts(&cx, &rows),
        _ => points(&cx, &rows),
    };
    RealizedMark {
        key,
        kind,
        rows,
        encode,
        glyphs,
    }
}

fn bars(cx: &MarkContext<'_>, rows: &[Value]) -> Vec<Glyph> {
    let band = cx.scales.get("x").map_or(0.0, Scale::band_width);
    let width = if band > 0.0 {
        band
    } else {
        (cx.plot.width() / rows.len().max(1) as f64) * 0.8
    };
    let base = cx.baseline();
    rows.iter()
        .filter_map(|row| {
            let x = cx.position("x", row)?;
            let y = cx.position("y", row)?;
            let x0 = if band > 0.0 { x } else { x - width / 2.0 };
            Some(Glyph::Rect {
                rect: Rect::new(x0, y, x0 + width, base).abs(),
                fill: cx.fill(row),
            })
        })
        .collect()
}

fn path(cx: &MarkContext<'_>, rows: &[Value], closed: bool) -> Option<Glyph> {
    let points: Vec<Point> = rows
        .iter()
        .filter_map(|row| Some(Point::new(cx.x_center(row)?, cx.position("y", row)?)))
        .collect();
    let (first, rest) = points.split_first()?;
    let mut path = BezPath::new();
    path.move_to(*first);
    for p in rest {
        path.line_to(*p);
    }
    let color = rows.first().map_or(cx.theme.default_color, |row| cx.fill(row));
    let fill = if closed {
        let base = cx.baseline();
        let last = points.last().copied().unwrap_or(*first);
        path.line_to((last.x, base));
        path.line_to((first.x, base));
        path.close_path();
        Some(color.multiply_alpha(0.85))
    } else {
        None
    };
    Some(Glyph::Path {
        path,
        fill,
        stroke: color,
        stroke_width: if closed { 0.0 } else { 2.0 },
    })
}

fn points(cx: &MarkContext<'_>, rows: &[Value]) -> Vec<Glyph> {
    rows.iter()
        .filter_map(|row| {
            let center = Point::new(cx.x_center(row)?, cx.position("y", row)?);
            let radius = cx.position("size", row).unwrap_or(3.0);
            Some(Glyph::Circle {
                circle: Circle::new(center, radius),
                fill: cx.fill(row),
            })
        })
        .collect()
}

fn texts(cx: &MarkContext<'_>, rows: &[Value]) -> Vec<Glyph> {
    rows.iter()
        .filter_map(|row| {
            let pos = Point::new(cx.x_center(row)?, cx.position("y", row)?);
            let text = match cx.value("text", row)? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some(Glyph::Text {
                pos,
                text,
                font_size: 12.0,
                fill: cx.fill(row),
            })
        })
        .collect()
}
