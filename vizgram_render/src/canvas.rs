// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raster-style renderer that records draw commands.
//!
//! The recorded [`CanvasSurface`] is what a pixel back end would replay; keeping it as data
//! makes painting observable without a GPU.

use async_trait::async_trait;
use kurbo::{BezPath, Circle, Point, Rect, Size};
use peniko::Color;
use vizgram_core::PaintError;

use crate::renderer::scene_size;
use crate::view::Glyph;
use crate::{MountPoint, RealizedView, Renderer, Surface};

/// Largest supported canvas edge, in pixels.
pub const MAX_CANVAS_EDGE: u32 = 32_767;

/// One recorded drawing operation.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// Starts the group of a view.
    BeginGroup(String),
    /// Ends the innermost group.
    EndGroup,
    /// Fills a rectangle.
    FillRect(Rect, Color),
    /// Fills a circle.
    FillCircle(Circle, Color),
    /// Fills a closed path.
    FillPath(BezPath, Color),
    /// Strokes a path.
    StrokePath {
        /// Geometry.
        path: BezPath,
        /// Stroke color.
        color: Color,
        /// Stroke width.
        width: f64,
    },
    /// Draws a text run.
    FillText {
        /// Anchor position.
        pos: Point,
        /// Content.
        text: String,
        /// Font size in pixels.
        font_size: f64,
        /// Fill.
        color: Color,
    },
}

/// A recorded canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasSurface {
    /// Width in whole pixels.
    pub width: u32,
    /// Height in whole pixels.
    pub height: u32,
    /// Color the canvas is cleared to.
    pub background: Color,
    /// Recorded operations in paint order.
    pub commands: Vec<DrawCommand>,
}

impl CanvasSurface {
    /// Returns the ids of every group, in paint order.
    pub fn group_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::BeginGroup(id) => Some(id.as_str()),
            _ => None,
        })
    }
}

/// Records realized views into a [`CanvasSurface`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CanvasRenderer;

impl CanvasRenderer {
    /// Creates a canvas renderer.
    pub fn new() -> Self {
        Self
    }

    /// Records `views` into a fresh canvas sized to the scene.
    pub fn record(
        &self,
        views: &[RealizedView],
        mount: &MountPoint,
    ) -> Result<CanvasSurface, PaintError> {
        let (width, height) = canvas_size(scene_size(views, mount))?;
        let mut commands = Vec::new();
        for view in views {
            commands.push(DrawCommand::BeginGroup(view.key.clone()));
            for glyph in view.marks.iter().flat_map(|m| &m.glyphs) {
                record_glyph(&mut commands, glyph);
            }
            commands.push(DrawCommand::EndGroup);
        }
        Ok(CanvasSurface {
            width,
            height,
            background: views
                .first()
                .map_or(Color::TRANSPARENT, |v| v.theme.background),
            commands,
        })
    }
}

#[async_trait]
impl Renderer for CanvasRenderer {
    async fn paint(&self, views: &[RealizedView], mount: &MountPoint) -> Result<(), PaintError> {
        let canvas = self.record(views, mount)?;
        log::debug!(
            "recorded {} draw command(s) on a {}x{} canvas",
            canvas.commands.len(),
            canvas.width,
            canvas.height
        );
        mount.attach_surface(Surface::Canvas(canvas));
        Ok(())
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "edges are range-checked before the cast"
)]
fn canvas_size(size: Size) -> Result<(u32, u32), PaintError> {
    let limit = f64::from(MAX_CANVAS_EDGE);
    let width = size.width.max(0.0).ceil();
    let height = size.height.max(0.0).ceil();
    if width > limit || height > limit || !width.is_finite() || !height.is_finite() {
        return Err(PaintError::SurfaceTooLarge {
            width: width.min(f64::from(u32::MAX)) as u32,
            height: height.min(f64::from(u32::MAX)) as u32,
            limit: MAX_CANVAS_EDGE,
        });
    }
    Ok((width as u32, height as u32))
}

fn record_glyph(commands: &mut Vec<DrawCommand>, glyph: &Glyph) {
    match glyph {
        Glyph::Rect { rect, fill } => commands.push(DrawCommand::FillRect(*rect, *fill)),
        Glyph::Circle { circle, fill } => commands.push(DrawCommand::FillCircle(*circle, *fill)),
        Glyph::Path {
            path,
            fill,
            stroke,
            stroke_width,
        } => {
            if let Some(fill) = fill {
                commands.push(DrawCommand::FillPath(path.clone(), *fill));
            }
            if *stroke_width > 0.0 {
                commands.push(DrawCommand::StrokePath {
                    path: path.clone(),
                    color: *stroke,
                    width: *stroke_width,
                });
            }
        }
        Glyph::Text {
            pos,
            text,
            font_size,
            fill,
        } => commands.push(DrawCommand::FillText {
            pos: *pos,
            text: text.clone(),
            font_size: *font_size,
            color: *fill,
        }),
    }
}
