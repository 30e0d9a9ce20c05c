// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy shared by the builder, compiler, and renderer seams.
//!
//! All errors are `Clone`: a single failing render pass settles every ticket merged into it,
//! and each ticket receives its own copy of the error.

use thiserror::Error;

/// The chart was configured in a way that can never render.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A container identifier did not resolve to a mount point.
    #[error("no mount point with id {0:?}")]
    UnknownContainer(String),
    /// The `theme` attribute names a theme that is not registered.
    #[error("unknown theme {0:?}")]
    UnknownTheme(String),
    /// The `theme` attribute has an unsupported shape.
    #[error("invalid theme: {0}")]
    InvalidTheme(String),
    /// A color string could not be parsed.
    #[error("invalid color {0:?}")]
    InvalidColor(String),
    /// A raw options record could not be turned into an option tree.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    /// `render()` was called outside of an async runtime.
    #[error("render requested outside of a Tokio runtime")]
    MissingRuntime,
    /// The chart was destroyed and can no longer render.
    #[error("chart has been destroyed")]
    Destroyed,
}

impl ConfigurationError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::UnknownContainer(_) => "config_unknown_container",
            Self::UnknownTheme(_) => "config_unknown_theme",
            Self::InvalidTheme(_) => "config_invalid_theme",
            Self::InvalidColor(_) => "config_invalid_color",
            Self::InvalidOptions(_) => "config_invalid_options",
            Self::MissingRuntime => "config_missing_runtime",
            Self::Destroyed => "config_destroyed",
        }
    }
}

/// The compiler rejected a resolved option tree.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A node names a mark kind the compiler does not know.
    #[error("unknown mark kind {0:?}")]
    UnknownMark(String),
    /// A node carries an attribute the compiler cannot interpret.
    #[error("invalid node {key:?}: {reason}")]
    InvalidNode {
        /// Key of the offending node (generated if the node had none).
        key: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl CompileError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::UnknownMark(_) => "compile_unknown_mark",
            Self::InvalidNode { .. } => "compile_invalid_node",
        }
    }
}

/// The renderer failed to paint realized views.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaintError {
    /// The mount point box cannot back a drawing surface.
    #[error("surface of {width}x{height} exceeds the {limit}px limit")]
    SurfaceTooLarge {
        /// Requested surface width in whole pixels.
        width: u32,
        /// Requested surface height in whole pixels.
        height: u32,
        /// Largest supported edge length.
        limit: u32,
    },
    /// The drawing back end reported a failure.
    #[error("paint failed: {0}")]
    Backend(String),
}

impl PaintError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::SurfaceTooLarge { .. } => "paint_surface_too_large",
            Self::Backend(_) => "paint_backend",
        }
    }
}
