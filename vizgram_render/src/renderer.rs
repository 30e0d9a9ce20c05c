// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The renderer seam.

use async_trait::async_trait;
use kurbo::{Rect, Size};
use vizgram_core::PaintError;

use crate::{MountPoint, RealizedView};

/// Paints realized views into a mount point.
///
/// Implementations are interchangeable: the chart controller only ever calls [`paint`] and
/// [`clear`].
///
/// [`paint`]: Renderer::paint
/// [`clear`]: Renderer::clear
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Paints `views` (root view first) and attaches the result to `mount`.
    async fn paint(&self, views: &[RealizedView], mount: &MountPoint) -> Result<(), PaintError>;

    /// Releases whatever [`Renderer::paint`] attached to `mount`.
    fn clear(&self, mount: &MountPoint) {
        mount.detach_surface();
    }
}

/// Returns the box covering every view, or the mount point box if there are none.
pub(crate) fn scene_size(views: &[RealizedView], mount: &MountPoint) -> Size {
    views
        .iter()
        .map(|v| v.bounds)
        .reduce(|a, b| a.union(b))
        .map_or_else(|| mount.box_size(), |r: Rect| Size::new(r.x1.max(0.0), r.y1.max(0.0)))
}
