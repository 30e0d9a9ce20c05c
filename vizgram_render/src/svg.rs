// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vector-markup renderer.

use std::fmt::Write as _;

use async_trait::async_trait;
use peniko::Color;
use vizgram_core::PaintError;

use crate::renderer::scene_size;
use crate::view::Glyph;
use crate::{MountPoint, RealizedView, Renderer, Surface};

/// Serializes realized views into an SVG document with one `<g id=key>` group per view.
#[derive(Clone, Copy, Debug, Default)]
pub struct SvgRenderer;

impl SvgRenderer {
    /// Creates an SVG renderer.
    pub fn new() -> Self {
        Self
    }

    /// Renders `views` to SVG markup without attaching it anywhere.
    pub fn to_svg_string(&self, views: &[RealizedView], mount: &MountPoint) -> String {
        let size = scene_size(views, mount);
        let mut out = String::new();
        out.push_str(r#"<svg xmlns="http://www.w3.org/2000/svg" "#);
        let _ = writeln!(
            out,
            r#"viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
            w = size.width,
            h = size.height
        );
        if let Some(background) = views.first().map(|v| v.theme.background) {
            if background.components[3] > 0.0 {
                let _ = write!(
                    out,
                    r#"<rect x="0" y="0" width="{}" height="{}""#,
                    size.width, size.height
                );
                write_paint_attr(&mut out, "fill", background);
                out.push_str("/>\n");
            }
        }
        for view in views {
            let _ = writeln!(out, r#"<g id="{}">"#, escape_xml(&view.key));
            for mark in &view.marks {
                let _ = writeln!(
                    out,
                    r#"<g class="mark {}" data-key="{}">"#,
                    escape_xml(mark.kind.name()),
                    escape_xml(&mark.key)
                );
                for glyph in &mark.glyphs {
                    write_glyph(&mut out, glyph);
                }
                out.push_str("</g>\n");
            }
            out.push_str("</g>\n");
        }
        out.push_str("</svg>\n");
        out
    }
}

#[async_trait]
impl Renderer for SvgRenderer {
    async fn paint(&self, views: &[RealizedView], mount: &MountPoint) -> Result<(), PaintError> {
        let markup = self.to_svg_string(views, mount);
        log::debug!("painted {} byte(s) of SVG", markup.len());
        mount.attach_surface(Surface::Svg(markup));
        Ok(())
    }
}

fn write_glyph(out: &mut String, glyph: &Glyph) {
    match glyph {
        Glyph::Rect { rect, fill } => {
            let _ = write!(
                out,
                r#"<rect x="{}" y="{}" width="{}" height="{}""#,
                rect.x0,
                rect.y0,
                rect.width(),
                rect.height(),
            );
            write_paint_attr(out, "fill", *fill);
            out.push_str("/>\n");
        }
        Glyph::Circle { circle, fill } => {
            let _ = write!(
                out,
                r#"<circle cx="{}" cy="{}" r="{}""#,
                circle.center.x, circle.center.y, circle.radius
            );
            write_paint_attr(out, "fill", *fill);
            out.push_str("/>\n");
        }
        Glyph::Path {
            path,
            fill,
            stroke,
            stroke_width,
        } => {
            let _ = write!(out, r#"<path d="{}""#, path.to_svg());
            match fill {
                Some(fill) => write_paint_attr(out, "fill", *fill),
                None => out.push_str(r#" fill="none""#),
            }
            if *stroke_width > 0.0 {
                write_paint_attr(out, "stroke", *stroke);
                let _ = write!(out, r#" stroke-width="{stroke_width}""#);
            }
            out.push_str("/>\n");
        }
        Glyph::Text {
            pos,
            text,
            font_size,
            fill,
        } => {
            let _ = write!(
                out,
                r#"<text x="{}" y="{}" font-size="{}""#,
                pos.x, pos.y, font_size
            );
            write_paint_attr(out, "fill", *fill);
            out.push('>');
            out.push_str(&escape_xml(text));
            out.push_str("</text>\n");
        }
    }
}

fn svg_paint(color: Color) -> (String, Option<f64>) {
    let rgba = color.to_rgba8();
    let value = format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b);
    let opacity = if rgba.a == 255 {
        None
    } else {
        Some(f64::from(rgba.a) / 255.0)
    };
    (value, opacity)
}

fn write_paint_attr(out: &mut String, name: &str, color: Color) {
    let (value, opacity) = svg_paint(color);
    let _ = write!(out, r#" {name}="{value}""#);
    if let Some(o) = opacity {
        let _ = write!(out, r#" {name}-opacity="{o}""#);
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
