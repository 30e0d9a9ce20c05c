// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compiler and renderer seams for vizgram.
//!
//! A render pass has two external steps:
//! - a [`Compiler`] turns the resolved option tree and theme into [`RealizedView`]s, each with a
//!   coordinate, per-channel scales, and a scenegraph group;
//! - a [`Renderer`] paints those views into a [`MountPoint`].
//!
//! Both are async traits so back ends may suspend. This crate ships a default
//! [`ViewCompiler`], a vector-markup [`SvgRenderer`], and a command-recording
//! [`CanvasRenderer`]; the two renderers are interchangeable.

mod canvas;
mod compiler;
mod mount;
mod renderer;
mod svg;
mod view;

pub use canvas::{CanvasRenderer, CanvasSurface, DrawCommand, MAX_CANVAS_EDGE};
pub use compiler::{Compiler, DEFAULT_VIEW_SIZE, ViewCompiler};
pub use mount::{DEFAULT_MOUNT_SIZE, Document, MountPoint, ObserverId, Surface};
pub use renderer::Renderer;
pub use svg::SvgRenderer;
pub use view::{
    Coordinate, Glyph, RealizedMark, RealizedView, Scale, ScaleKind, SceneGroup,
};
