// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The chart controller.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use indexmap::IndexMap;
use kurbo::Size;
use serde_json::Value;
use tokio::runtime::Handle as Runtime;
use tokio::sync::oneshot;
use vizgram_core::{
    AttrValue, ChartEvent, Compose, ConfigurationError, ContainerHandle, ContainerKind, EventHub,
    Handle, NodeId, Options, SpecTree, Theme, ThemeRegistry,
};
use vizgram_render::{
    CanvasRenderer, Compiler, Coordinate, MountPoint, RealizedView, Renderer, Scale, SceneGroup,
    SvgRenderer,
};

use crate::config::ChartConfig;
use crate::container;
use crate::resize::ResizeWatcher;
use crate::scheduler::{Admission, Scheduler, SchedulerState, Ticket};
use crate::RenderError;

type RenderOutcome = Result<Chart, RenderError>;

static NEXT_CHART: AtomicU64 = AtomicU64::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Realized {
    views: Vec<RealizedView>,
    size: Option<Size>,
}

struct ChartInner {
    tree: SpecTree,
    events: EventHub,
    container: Result<MountPoint, ConfigurationError>,
    owns_container: bool,
    compiler: Arc<dyn Compiler>,
    renderer: Arc<dyn Renderer>,
    themes: ThemeRegistry,
    generated_key: String,
    scheduler: Mutex<Scheduler<RenderOutcome>>,
    watcher: ResizeWatcher,
    realized: Mutex<Realized>,
    /// Bumped by every release; a pass started before it must not publish its output.
    epoch: AtomicU64,
    destroyed: AtomicBool,
}

/// Inputs of one pass, captured when the pass starts.
struct Pass {
    options: Options,
    mount: Result<MountPoint, ConfigurationError>,
    size: Size,
    epoch: u64,
}

/// A chart: an option tree plus everything needed to render it.
///
/// `Chart` is a cheap handle; clones share the same chart. Builder methods come from
/// [`Handle`] (attribute setters) and [`Compose`] (mark and container factories):
///
/// ```no_run
/// use serde_json::json;
/// use vizgram::{Chart, ChartConfig, Compose, Handle};
///
/// # async fn demo() -> Result<(), vizgram::RenderError> {
/// let chart = Chart::new(ChartConfig::new().with_width(480.0));
/// chart
///     .interval()
///     .data(json!([{"genre": "Sports", "sold": 275}, {"genre": "Strategy", "sold": 115}]))
///     .encode("x", "genre")
///     .encode("y", "sold")
///     .encode("color", "genre");
/// chart.render().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Chart {
    inner: Arc<ChartInner>,
}

impl fmt::Debug for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chart")
            .field("key", &self.get_key())
            .field("state", &self.scheduler_state())
            .field("auto_fit_bound", &self.has_bound_auto_fit())
            .finish_non_exhaustive()
    }
}

impl Handle for Chart {
    fn tree(&self) -> &SpecTree {
        &self.inner.tree
    }

    fn id(&self) -> NodeId {
        self.inner.tree.root()
    }
}

impl Compose for Chart {
    /// Re-kinds the root in place: the last container call on a chart wins.
    fn enter_container(&self, kind: ContainerKind) -> ContainerHandle {
        let root = self.inner.tree.root();
        self.inner.tree.set_kind(root, kind);
        ContainerHandle::new(self.inner.tree.clone(), root)
    }
}

/// Resolves once the render pass a request was attached to settles.
#[derive(Debug)]
#[must_use = "a render future does nothing unless awaited; the pass itself runs regardless"]
pub struct RenderFuture {
    rx: oneshot::Receiver<RenderOutcome>,
}

impl RenderFuture {
    fn settled(outcome: RenderOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }
}

impl Future for RenderFuture {
    type Output = RenderOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(RenderError::Aborted)))
    }
}

/// Returns the scheduler to idle if a driving task dies without finishing its passes.
struct AbortGuard {
    inner: Arc<ChartInner>,
    armed: bool,
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            let dropped = lock(&self.inner.scheduler).reset();
            log::warn!(
                "render task aborted; rejecting {} queued request(s)",
                dropped.len()
            );
        }
    }
}

impl Chart {
    /// Creates a chart with an empty `view` root.
    ///
    /// The container target is resolved immediately. An unresolvable target does not fail
    /// here; every render rejects with it instead.
    pub fn new(config: ChartConfig) -> Self {
        let resolved = container::resolve(config.container, &config.document, config.mount_size);
        let tree = SpecTree::new(ContainerKind::View);
        let root = tree.root();
        if let Some(key) = config.key {
            tree.set_key(root, Some(key));
        }
        for (name, value) in config.attributes {
            tree.set_attr(root, &name, value);
        }
        let ordinal = NEXT_CHART.fetch_add(1, Ordering::Relaxed);
        let generated_key = format!("vizgram-chart-{ordinal}");
        Self {
            inner: Arc::new(ChartInner {
                tree,
                events: EventHub::new(),
                container: resolved.mount,
                owns_container: resolved.owned,
                compiler: config.compiler,
                renderer: config.renderer,
                themes: config.themes,
                generated_key,
                scheduler: Mutex::new(Scheduler::new()),
                watcher: ResizeWatcher::new(config.resize_debounce),
                realized: Mutex::new(Realized::default()),
                epoch: AtomicU64::new(0),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a chart from a plain record.
    ///
    /// `container` names a mount point in the global document, `renderer` picks `"canvas"`
    /// (default) or `"svg"`, and everything else is applied like [`Chart::set_options`].
    pub fn from_options(record: Value) -> Result<Self, ConfigurationError> {
        let mut record = match record {
            Value::Object(record) => record,
            other => {
                return Err(ConfigurationError::InvalidOptions(format!(
                    "expected a record, found {other}"
                )));
            }
        };
        let mut config = ChartConfig::new();
        match record.shift_remove("container") {
            None | Some(Value::Null) => {}
            Some(Value::String(id)) => config = config.with_container(id),
            Some(other) => {
                return Err(ConfigurationError::InvalidOptions(format!(
                    "`container` must be an element id, found {other}"
                )));
            }
        }
        match record.shift_remove("renderer") {
            None | Some(Value::Null) => {}
            Some(Value::String(name)) if name == "canvas" => {
                config = config.with_renderer(CanvasRenderer::new());
            }
            Some(Value::String(name)) if name == "svg" => {
                config = config.with_renderer(SvgRenderer::new());
            }
            Some(other) => {
                return Err(ConfigurationError::InvalidOptions(format!(
                    "unknown renderer {other}"
                )));
            }
        }
        let chart = Self::new(config);
        chart.set_options(&Value::Object(record))?;
        Ok(chart)
    }

    /// Returns `true` if both values refer to the same chart.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the chart key: the root key if set, otherwise a generated one.
    pub fn get_key(&self) -> String {
        let tree = &self.inner.tree;
        tree.key(tree.root())
            .unwrap_or_else(|| self.inner.generated_key.clone())
    }

    /// Serializes the option tree.
    pub fn options(&self) -> Options {
        self.inner.tree.snapshot()
    }

    /// Applies a plain record to the root: `type` re-kinds it, `children` replaces its
    /// children, `key` and `data` set them, and every other entry overwrites the attribute of
    /// the same name.
    pub fn set_options(&self, patch: &Value) -> Result<Self, ConfigurationError> {
        self.inner.tree.apply_patch(patch)?;
        Ok(self.clone())
    }

    /// Requests a render.
    ///
    /// If no pass is running one starts immediately. Otherwise the request joins the single
    /// trailing pass, which starts from the tree as it is when the running pass settles.
    /// Must be called from within a Tokio runtime.
    pub fn render(&self) -> RenderFuture {
        let Ok(runtime) = Runtime::try_current() else {
            log::warn!("render requested outside of a Tokio runtime");
            return RenderFuture::settled(Err(ConfigurationError::MissingRuntime.into()));
        };
        if self.is_destroyed() {
            return RenderFuture::settled(Err(ConfigurationError::Destroyed.into()));
        }
        self.sync_auto_fit(&runtime);

        let (tx, rx) = oneshot::channel();
        let admission = {
            let mut scheduler = lock(&self.inner.scheduler);
            let ticket = scheduler.ticket(tx);
            scheduler.admit(ticket)
        };
        if let Admission::Start(batch) = admission {
            let pass = self.start_pass();
            runtime.spawn(self.clone().drive(batch, pass));
        }
        RenderFuture { rx }
    }

    /// Replaces the root data, cascades it into marks without their own data, and renders.
    pub fn change_data(&self, data: Value) -> RenderFuture {
        let cascaded = self.inner.tree.change_data(data);
        log::debug!("data changed; cascaded into {cascaded} mark(s)");
        self.render()
    }

    /// Re-renders if the mount point size differs from the size of the last completed render,
    /// then emits `afterchangesize`.
    pub async fn force_fit(&self) -> Result<Self, RenderError> {
        let mount = self.inner.container.clone()?;
        let size = mount.box_size();
        if lock(&self.inner.realized).size == Some(size) {
            log::trace!("fit skipped; size {}x{} unchanged", size.width, size.height);
            return Ok(self.clone());
        }
        let chart = self.render().await?;
        self.inner.events.emit(ChartEvent::AfterChangeSize, &[]);
        Ok(chart)
    }

    /// Drops the painted output, unbinds the resize watcher, and resets the option tree to an
    /// empty view that keeps the chart key.
    pub fn clear(&self) {
        self.release();
        let key = self.get_key();
        let root = self.inner.tree.reset(ContainerKind::View);
        if key != self.inner.generated_key {
            self.inner.tree.set_key(root, Some(key));
        }
        self.inner.events.emit(ChartEvent::AfterClear, &[]);
    }

    /// Clears the chart and makes it unusable: later renders reject and every event handler
    /// is removed after `afterdestroy` fires.
    pub fn destroy(&self) {
        self.clear();
        self.inner.destroyed.store(true, Ordering::Release);
        self.inner.events.emit(ChartEvent::AfterDestroy, &[]);
        self.inner.events.off_all();
    }

    /// Returns `true` once [`Chart::destroy`] was called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Registers an event handler.
    pub fn on(
        &self,
        event: impl AsRef<str>,
        handler: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Self {
        self.inner.events.on(event, handler);
        self.clone()
    }

    /// Registers a handler for the next emission of `event` only.
    pub fn once(
        &self,
        event: impl AsRef<str>,
        handler: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Self {
        self.inner.events.once(event, handler);
        self.clone()
    }

    /// Removes every handler of `event`.
    pub fn off(&self, event: impl AsRef<str>) -> Self {
        self.inner.events.off(event);
        self.clone()
    }

    /// Emits `event` to its handlers.
    pub fn emit(&self, event: impl AsRef<str>, args: &[Value]) -> Self {
        self.inner.events.emit(event, args);
        self.clone()
    }

    /// Returns the current scheduler state.
    pub fn scheduler_state(&self) -> SchedulerState {
        lock(&self.inner.scheduler).state()
    }

    /// Returns `true` while the resize watcher is bound.
    pub fn has_bound_auto_fit(&self) -> bool {
        self.inner.watcher.is_bound()
    }

    /// Returns the resolved mount point.
    pub fn get_container(&self) -> Result<MountPoint, ConfigurationError> {
        self.inner.container.clone()
    }

    /// Returns `true` if the mount point was created by this chart.
    pub fn owns_container(&self) -> bool {
        self.inner.owns_container
    }

    /// Returns the realized view matching the chart key.
    pub fn get_view(&self) -> Option<RealizedView> {
        self.with_view(Clone::clone)
    }

    /// Returns every realized view of the last completed render.
    pub fn get_views(&self) -> Vec<RealizedView> {
        lock(&self.inner.realized).views.clone()
    }

    /// Returns the coordinate of the chart view.
    pub fn get_coordinate(&self) -> Option<Coordinate> {
        self.with_view(|v| v.coordinate.clone())
    }

    /// Returns the theme the chart view was compiled with.
    pub fn get_theme(&self) -> Option<Theme> {
        self.with_view(|v| v.theme.clone())
    }

    /// Returns every scale of the chart view, keyed by channel.
    pub fn get_scale(&self) -> Option<IndexMap<String, Scale>> {
        self.with_view(|v| v.scales.clone())
    }

    /// Returns the scale of one channel of the chart view.
    pub fn get_scale_by_channel(&self, channel: &str) -> Option<Scale> {
        self.with_view(|v| v.scale(channel).cloned()).flatten()
    }

    /// Returns the scenegraph group of the chart view; `None` before the first render and
    /// after [`Chart::clear`].
    pub fn get_group(&self) -> Option<SceneGroup> {
        self.with_view(|v| v.group.clone())
    }

    fn with_view<R>(&self, f: impl FnOnce(&RealizedView) -> R) -> Option<R> {
        let key = self.get_key();
        let realized = lock(&self.inner.realized);
        realized
            .views
            .iter()
            .find(|v| v.key == key)
            .map(f)
    }

    fn release(&self) {
        self.inner.watcher.unbind();
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        *lock(&self.inner.realized) = Realized::default();
        if let Ok(mount) = &self.inner.container {
            self.inner.renderer.clear(mount);
        }
    }

    /// Binds or unbinds the resize watcher to match the root `autoFit` attribute.
    fn sync_auto_fit(&self, runtime: &Runtime) {
        let wants = self
            .inner
            .tree
            .attr(self.inner.tree.root(), "autoFit")
            .is_some_and(|v| v.is_true());
        let watcher = &self.inner.watcher;
        match (wants, watcher.is_bound()) {
            (true, false) => {
                let Ok(mount) = &self.inner.container else {
                    return;
                };
                watcher.bind(
                    mount,
                    runtime.clone(),
                    Arc::downgrade(&self.inner),
                    |inner| async move {
                        let chart = Self { inner };
                        if let Err(err) = chart.force_fit().await {
                            log::warn!("resize re-render failed: {err} ({})", err.as_label());
                        }
                    },
                );
            }
            (false, true) => {
                watcher.unbind();
            }
            _ => {}
        }
    }

    /// Emits `beforerender` and captures the inputs of the next pass.
    fn start_pass(&self) -> Pass {
        self.inner.events.emit(ChartEvent::BeforeRender, &[]);
        let mut options = self.inner.tree.snapshot();
        options.key = Some(self.get_key());
        let mount = self.inner.container.clone();
        let size = mount.as_ref().map_or(Size::ZERO, MountPoint::box_size);
        let epoch = self.inner.epoch.load(Ordering::Acquire);
        let auto_fit = options.attribute("autoFit").is_some_and(AttrValue::is_true);
        if auto_fit && mount.is_ok() {
            options
                .attributes
                .insert("width".into(), AttrValue::from(size.width));
            options
                .attributes
                .insert("height".into(), AttrValue::from(size.height));
        }
        Pass {
            options,
            mount,
            size,
            epoch,
        }
    }

    /// Returns `true` if the chart was cleared or destroyed after a pass started.
    fn is_stale(&self, pass_epoch: u64) -> bool {
        self.inner.epoch.load(Ordering::Acquire) != pass_epoch || self.is_destroyed()
    }

    async fn run_pass(&self, pass: Pass) -> Result<(), RenderError> {
        let mount = pass.mount?;
        let theme = self.inner.themes.resolve(pass.options.attribute("theme"))?;
        let views = self.inner.compiler.compile(&pass.options, &theme).await?;
        if self.is_stale(pass.epoch) {
            return self.discard_pass(&mount, false);
        }
        self.inner.events.emit(ChartEvent::BeforePaint, &[]);
        self.inner.renderer.paint(&views, &mount).await?;
        {
            let mut realized = lock(&self.inner.realized);
            if self.is_stale(pass.epoch) {
                drop(realized);
                return self.discard_pass(&mount, true);
            }
            *realized = Realized {
                views,
                size: Some(pass.size),
            };
        }
        self.inner.events.emit(ChartEvent::AfterPaint, &[]);
        self.inner.events.emit(ChartEvent::AfterRender, &[]);
        Ok(())
    }

    /// Settles a pass that was overtaken by `clear` or `destroy` without publishing anything.
    fn discard_pass(&self, mount: &MountPoint, painted: bool) -> Result<(), RenderError> {
        if painted {
            self.inner.renderer.clear(mount);
        }
        if self.is_destroyed() {
            return Err(ConfigurationError::Destroyed.into());
        }
        log::debug!("render pass discarded; chart was cleared while it ran");
        Ok(())
    }

    /// Runs passes until no trailing batch is left.
    async fn drive(self, mut batch: Vec<Ticket<RenderOutcome>>, mut pass: Pass) {
        let mut guard = AbortGuard {
            inner: self.inner.clone(),
            armed: true,
        };
        loop {
            let outcome = self.run_pass(pass).await.map(|()| self.clone());
            if let Err(err) = &outcome {
                log::warn!(
                    "render pass failed for {} request(s): {err} ({})",
                    batch.len(),
                    err.as_label()
                );
            }
            for ticket in batch {
                ticket.settle(outcome.clone());
            }
            let next = lock(&self.inner.scheduler).complete();
            match next {
                Some(trailing) => {
                    batch = trailing;
                    pass = self.start_pass();
                }
                None => break,
            }
        }
        guard.armed = false;
    }
}
