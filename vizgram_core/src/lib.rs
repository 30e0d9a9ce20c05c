// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Option trees and fluent builders for the vizgram chart grammar.
//!
//! A chart is described by a tree of option nodes:
//! - **Marks** are leaves (`interval`, `line`, `point`, …) and never have children.
//! - **Containers** (`view`, `spaceFlex`, `facetRect`, …) arrange their children as layers,
//!   sub-plots, or frames.
//!
//! The tree is mutated through [`Handle`]s: every factory call appends one node and returns a
//! handle bound to it, and every setter returns that same handle so calls chain. Attribute
//! writes follow an [`AttrCategory`]: most overwrite, a few append or merge entries.
//!
//! This crate also holds the pieces a chart controller shares with its collaborators: the
//! [`EventHub`], the [`ThemeRegistry`], and the error taxonomy.

mod builder;
mod error;
mod event;
mod kind;
mod options;
mod theme;
mod tree;
mod value;

pub use builder::{Compose, ContainerHandle, Handle, MarkHandle};
pub use error::{CompileError, ConfigurationError, PaintError};
pub use event::{ChartEvent, EventHub, Listener};
pub use kind::{ContainerKind, MarkKind, NodeKind};
pub use options::Options;
pub use theme::{DEFAULT_THEME, Theme, ThemeRegistry};
pub use tree::{DataSlot, NodeId, SpecTree};
pub use value::{AttrCategory, AttrValue, CALLBACK_PLACEHOLDER, Callback};
