// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors surfaced by render futures.

use thiserror::Error;
use vizgram_core::{CompileError, ConfigurationError, PaintError};

/// Why a render request was rejected.
///
/// Every ticket merged into a failing pass receives its own clone.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The chart cannot render as configured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The compiler rejected the option tree.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The renderer failed.
    #[error(transparent)]
    Paint(#[from] PaintError),
    /// The pass was dropped before it settled, e.g. because its runtime shut down.
    #[error("render pass aborted before completion")]
    Aborted,
}

impl RenderError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Configuration(e) => e.as_label(),
            Self::Compile(e) => e.as_label(),
            Self::Paint(e) => e.as_label(),
            Self::Aborted => "render_aborted",
        }
    }
}
