// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chart construction options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kurbo::Size;
use vizgram_core::{AttrValue, ThemeRegistry};
use vizgram_render::{
    CanvasRenderer, Compiler, DEFAULT_MOUNT_SIZE, Document, Renderer, ViewCompiler,
};

use crate::Container;

/// Debounce applied to mount point resize notifications.
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Everything a chart needs besides its option tree.
#[derive(Clone)]
pub struct ChartConfig {
    /// Render target.
    pub container: Container,
    /// Size of the mount point created for [`Container::Detached`].
    pub mount_size: Size,
    /// Compiles option trees into realized views.
    pub compiler: Arc<dyn Compiler>,
    /// Paints realized views.
    pub renderer: Arc<dyn Renderer>,
    /// Themes the `theme` attribute may name.
    pub themes: ThemeRegistry,
    /// Document that [`Container::Id`] targets are looked up in.
    pub document: Document,
    /// Quiet period after a resize before the chart re-fits.
    pub resize_debounce: Duration,
    /// Root key; a unique key is generated when absent.
    pub key: Option<String>,
    /// Initial root attributes, applied in order.
    pub attributes: Vec<(String, AttrValue)>,
}

impl fmt::Debug for ChartConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartConfig")
            .field("container", &self.container)
            .field("mount_size", &self.mount_size)
            .field("themes", &self.themes)
            .field("document", &self.document)
            .field("resize_debounce", &self.resize_debounce)
            .field("key", &self.key)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            container: Container::Detached,
            mount_size: DEFAULT_MOUNT_SIZE,
            compiler: Arc::new(ViewCompiler::new()),
            renderer: Arc::new(CanvasRenderer::new()),
            themes: ThemeRegistry::default(),
            document: Document::global().clone(),
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            key: None,
            attributes: Vec::new(),
        }
    }
}

impl ChartConfig {
    /// Creates the default configuration: a detached canvas chart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the render target.
    pub fn with_container(mut self, container: impl Into<Container>) -> Self {
        self.container = container.into();
        self
    }

    /// Sets the size of an owned detached mount point.
    pub fn with_mount_size(mut self, size: Size) -> Self {
        self.mount_size = size;
        self
    }

    /// Sets the compiler.
    pub fn with_compiler(mut self, compiler: impl Compiler + 'static) -> Self {
        self.compiler = Arc::new(compiler);
        self
    }

    /// Sets the renderer.
    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Sets the theme registry.
    pub fn with_themes(mut self, themes: ThemeRegistry) -> Self {
        self.themes = themes;
        self
    }

    /// Sets the document used to resolve container identifiers.
    pub fn with_document(mut self, document: Document) -> Self {
        self.document = document;
        self
    }

    /// Sets the resize debounce.
    pub fn with_resize_debounce(mut self, debounce: Duration) -> Self {
        self.resize_debounce = debounce;
        self
    }

    /// Sets the root key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Adds an initial root attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Sets the initial `width`.
    pub fn with_width(self, width: f64) -> Self {
        self.with_attribute("width", width)
    }

    /// Sets the initial `height`.
    pub fn with_height(self, height: f64) -> Self {
        self.with_attribute("height", height)
    }

    /// Sets the initial `autoFit` flag.
    pub fn with_auto_fit(self, auto_fit: bool) -> Self {
        self.with_attribute("autoFit", auto_fit)
    }
}
