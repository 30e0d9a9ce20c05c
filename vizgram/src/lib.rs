// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A declarative chart grammar with a fluent builder and a coalescing render scheduler.
//!
//! A [`Chart`] owns an option tree, an event hub, a resolved mount point, and a render
//! scheduler:
//! - Builder calls ([`Handle`], [`Compose`]) mutate the option tree in place.
//! - [`Chart::render`] hands the tree and its theme to a [`Compiler`], then the realized views
//!   to a [`Renderer`]. At most one pass runs at a time; requests made meanwhile share one
//!   trailing pass, and every request gets its own [`RenderFuture`].
//! - With `autoFit` on, the chart follows its mount point's size, re-rendering after resizes
//!   settle.
//!
//! Lifecycle events (`beforerender`, `beforepaint`, `afterpaint`, `afterrender`,
//! `afterchangesize`, `afterclear`, `afterdestroy`) are delivered synchronously through
//! [`Chart::on`] and friends.
//!
//! Rendering requires a Tokio runtime; passes are spawned onto the current one.

mod chart;
mod config;
mod container;
mod error;
mod resize;
mod scheduler;

pub use chart::{Chart, RenderFuture};
pub use config::{ChartConfig, DEFAULT_RESIZE_DEBOUNCE};
pub use container::Container;
pub use error::RenderError;
pub use scheduler::SchedulerState;

pub use vizgram_core::{
    AttrCategory, AttrValue, CALLBACK_PLACEHOLDER, Callback, ChartEvent, CompileError, Compose,
    ConfigurationError, ContainerHandle, ContainerKind, DataSlot, EventHub, Handle, MarkHandle,
    MarkKind, NodeId, NodeKind, Options, PaintError, SpecTree, Theme, ThemeRegistry,
};
pub use vizgram_render::{
    CanvasRenderer, CanvasSurface, Compiler, Coordinate, Document, DrawCommand, MountPoint,
    RealizedMark, RealizedView, Renderer, Scale, ScaleKind, SceneGroup, Surface, SvgRenderer,
    ViewCompiler,
};
