// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end behavior of the chart controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kurbo::Size;
use serde_json::{Value, json};
use tokio::sync::Notify;
use vizgram::{
    Chart, ChartConfig, ChartEvent, CompileError, Compiler, Compose, ConfigurationError, Document,
    Handle, MarkKind, MountPoint, Options, PaintError, RealizedView, RenderError, Renderer,
    ScaleKind, SchedulerState, Surface, SvgRenderer, Theme, ViewCompiler,
};

/// Records every tree it compiles and optionally blocks until released.
#[derive(Clone, Default)]
struct Recorder {
    compiled: Arc<Mutex<Vec<Value>>>,
    gate: Option<Arc<Notify>>,
}

impl Recorder {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn passes(&self) -> usize {
        self.compiled.lock().unwrap().len()
    }

    fn compiled(&self, pass: usize) -> Value {
        self.compiled.lock().unwrap()[pass].clone()
    }
}

#[async_trait]
impl Compiler for Recorder {
    async fn compile(
        &self,
        options: &Options,
        theme: &Theme,
    ) -> Result<Vec<RealizedView>, CompileError> {
        self.compiled.lock().unwrap().push(options.to_json());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        ViewCompiler::new().compile(options, theme).await
    }
}

/// Fails every paint.
#[derive(Debug)]
struct Broken;

#[async_trait]
impl Renderer for Broken {
    async fn paint(&self, _views: &[RealizedView], _mount: &MountPoint) -> Result<(), PaintError> {
        Err(PaintError::Backend("device lost".into()))
    }
}

/// Compiles the tree under a key of its own instead of the chart key.
#[derive(Debug)]
struct Rekeyed(&'static str);

#[async_trait]
impl Compiler for Rekeyed {
    async fn compile(
        &self,
        options: &Options,
        theme: &Theme,
    ) -> Result<Vec<RealizedView>, CompileError> {
        let mut options = options.clone();
        options.key = Some(self.0.to_owned());
        ViewCompiler::new().compile(&options, theme).await
    }
}

fn recorded(config: ChartConfig) -> (Chart, Recorder) {
    let recorder = Recorder::default();
    (Chart::new(config.with_compiler(recorder.clone())), recorder)
}

fn record(chart: &Chart, events: &[ChartEvent]) -> Arc<Mutex<Vec<&'static str>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for &event in events {
        let log = log.clone();
        chart.on(event, move |_| log.lock().unwrap().push(event.as_str()));
    }
    log
}

const PASS_EVENTS: [ChartEvent; 4] = [
    ChartEvent::BeforeRender,
    ChartEvent::BeforePaint,
    ChartEvent::AfterPaint,
    ChartEvent::AfterRender,
];

fn genres() -> Value {
    json!([
        {"genre": "Sports", "sold": 275},
        {"genre": "Strategy", "sold": 115},
        {"genre": "Action", "sold": 120},
    ])
}

#[test]
fn builder_calls_serialize_to_options() {
    let chart = Chart::new(ChartConfig::new().with_key("sales"));
    chart
        .interval()
        .data(genres())
        .encode("x", "genre")
        .encode("y", "sold")
        .transform(json!({"type": "sortX"}))
        .interaction("elementHighlight")
        .style("fill", "steelblue");
    chart.line_x().data(json!([200])).encode("x", Value::Null);

    assert_eq!(
        chart.options().to_json(),
        json!({
            "type": "view",
            "key": "sales",
            "children": [
                {
                    "type": "interval",
                    "data": genres(),
                    "encode": {"x": "genre", "y": "sold"},
                    "transform": [{"type": "sortX"}],
                    "interaction": {"elementHighlight": true},
                    "style": {"fill": "steelblue"},
                },
                {"type": "lineX", "data": [200], "encode": {"x": null}},
            ],
        })
    );
}

#[test]
fn container_calls_rekind_the_root() {
    let chart = Chart::new(ChartConfig::new());
    chart.title("dashboard");
    let flex = chart.space_flex();
    flex.interval();
    flex.space_layer().call(|layer| {
        layer.line();
        layer.point();
    });
    chart.facet_rect();

    let options = chart.options().to_json();
    assert_eq!(options["type"], "facetRect");
    assert_eq!(options["title"], "dashboard");
    assert_eq!(options["children"][1]["type"], "spaceLayer");
    assert_eq!(options["children"][1]["children"][1]["type"], "point");
}

#[test]
fn set_options_patches_the_root() {
    let chart = Chart::new(ChartConfig::new());
    chart.interval();
    chart
        .set_options(&json!({
            "type": "spaceFlex",
            "theme": "dark",
            "children": [{"type": "line"}, {"type": "point"}],
        }))
        .unwrap()
        .title("patched");

    let options = chart.options();
    assert_eq!(options.kind.name(), "spaceFlex");
    assert_eq!(options.children.len(), 2);
    assert_eq!(options.to_json()["theme"], "dark");
    assert_eq!(options.to_json()["title"], "patched");

    let err = chart.set_options(&json!({"children": 3})).unwrap_err();
    assert_eq!(err.as_label(), "config_invalid_options");
}

#[tokio::test]
async fn a_single_render_resolves_to_the_chart_after_afterrender() {
    let (chart, recorder) = recorded(ChartConfig::new());
    chart.interval().data(genres()).encode("x", "genre").encode("y", "sold");
    let log = record(&chart, &PASS_EVENTS);

    let rendered = chart.render().await.unwrap();

    assert!(rendered.ptr_eq(&chart));
    assert_eq!(recorder.passes(), 1);
    assert_eq!(
        *log.lock().unwrap(),
        ["beforerender", "beforepaint", "afterpaint", "afterrender"]
    );
    assert_eq!(chart.scheduler_state(), SchedulerState::Idle);
}

#[tokio::test]
async fn a_burst_of_renders_runs_two_passes() {
    let (chart, recorder) = recorded(ChartConfig::new());
    chart.point().data(genres()).encode("x", "genre").encode("y", "sold");
    let log = record(&chart, &[ChartEvent::AfterRender]);

    let futures = [chart.render(), chart.render(), chart.render(), chart.render()];
    assert_eq!(
        chart.scheduler_state(),
        SchedulerState::RenderingWithTrailing
    );
    for future in futures {
        let resolved = future.await.unwrap();
        assert!(resolved.ptr_eq(&chart));
    }

    assert_eq!(recorder.passes(), 2);
    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(chart.scheduler_state(), SchedulerState::Idle);
}

#[tokio::test]
async fn passes_never_interleave_their_events() {
    let (chart, _recorder) = recorded(ChartConfig::new());
    let log = record(&chart, &PASS_EVENTS);

    let first = chart.render();
    let second = chart.render();
    first.await.unwrap();
    second.await.unwrap();

    let expected: Vec<_> = PASS_EVENTS
        .iter()
        .chain(PASS_EVENTS.iter())
        .map(|e| e.as_str())
        .collect();
    assert_eq!(*log.lock().unwrap(), expected);
}

#[tokio::test]
async fn the_trailing_pass_uses_the_tree_as_it_is_when_it_starts() {
    let gate = Arc::new(Notify::new());
    let recorder = Recorder::gated(gate.clone());
    let chart = Chart::new(ChartConfig::new().with_compiler(recorder.clone()));
    chart.title("first");

    let first = chart.render();
    // Let the first pass reach the compiler.
    while recorder.passes() == 0 {
        tokio::task::yield_now().await;
    }
    let second = chart.render();
    chart.title("second");
    let third = chart.render();
    chart.title("latest");

    gate.notify_one();
    first.await.unwrap();
    gate.notify_one();
    second.await.unwrap();
    third.await.unwrap();

    assert_eq!(recorder.passes(), 2);
    assert_eq!(recorder.compiled(0)["title"], "first");
    assert_eq!(recorder.compiled(1)["title"], "latest");
}

#[tokio::test]
async fn a_failing_pass_does_not_block_the_trailing_one() {
    let (chart, recorder) = recorded(ChartConfig::new());
    let rendered = record(&chart, &[ChartEvent::AfterRender]);
    chart.theme("foo");

    let failing = chart.render();
    chart.theme("classic");
    let trailing = chart.render();

    assert_eq!(
        failing.await.unwrap_err(),
        RenderError::Configuration(ConfigurationError::UnknownTheme("foo".into()))
    );
    assert!(trailing.await.unwrap().ptr_eq(&chart));
    // The theme is resolved before compiling, so only the trailing pass compiled.
    assert_eq!(recorder.passes(), 1);
    assert_eq!(*rendered.lock().unwrap(), ["afterrender"]);
    assert_eq!(chart.scheduler_state(), SchedulerState::Idle);

    // Failures are not retried; the next request renders again.
    chart.render().await.unwrap();
    assert_eq!(recorder.passes(), 2);
}

#[tokio::test]
async fn compile_errors_reject_every_merged_ticket() {
    let chart = Chart::new(ChartConfig::new());
    chart.mark(MarkKind::from_name("sparkline"));
    let first = chart.render();
    let second = chart.render();
    let third = chart.render();

    let expected = RenderError::Compile(CompileError::UnknownMark("sparkline".into()));
    assert_eq!(first.await.unwrap_err(), expected);
    assert_eq!(second.await.unwrap_err(), expected);
    assert_eq!(third.await.unwrap_err(), expected);
    assert!(chart.get_group().is_none());
}

#[tokio::test]
async fn paint_errors_skip_the_after_events() {
    let chart = Chart::new(ChartConfig::new().with_renderer(Broken));
    chart.point();
    let log = record(&chart, &PASS_EVENTS);

    let err = chart.render().await.unwrap_err();
    assert_eq!(
        err,
        RenderError::Paint(PaintError::Backend("device lost".into()))
    );
    assert_eq!(err.as_label(), "paint_backend");
    assert_eq!(*log.lock().unwrap(), ["beforerender", "beforepaint"]);
    assert!(chart.get_view().is_none());
    assert_eq!(chart.scheduler_state(), SchedulerState::Idle);
}

#[tokio::test]
async fn unknown_container_ids_reject_renders() {
    let chart = Chart::new(
        ChartConfig::new()
            .with_document(Document::new())
            .with_container("missing"),
    );
    let err = chart.render().await.unwrap_err();
    assert_eq!(
        err,
        RenderError::Configuration(ConfigurationError::UnknownContainer("missing".into()))
    );
    assert!(chart.get_container().is_err());
}

#[tokio::test]
async fn container_ids_resolve_through_the_document() {
    let document = Document::new();
    let mount = document.create_element("container", Size::new(320.0, 240.0));
    let chart = Chart::new(
        ChartConfig::new()
            .with_document(document)
            .with_container("container")
            .with_renderer(SvgRenderer::new()),
    );
    chart.render().await.unwrap();

    assert!(chart.get_container().unwrap().ptr_eq(&mount));
    assert!(!chart.owns_container());
    assert!(matches!(mount.surface(), Some(Surface::Svg(_))));
}

#[test]
fn rendering_outside_a_runtime_is_a_configuration_error() {
    let chart = Chart::new(ChartConfig::new());
    let future = chart.render();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let err = runtime.block_on(future).unwrap_err();
    assert_eq!(
        err,
        RenderError::Configuration(ConfigurationError::MissingRuntime)
    );
}

#[tokio::test]
async fn auto_fit_toggles_bind_and_unbind_once() {
    let mount = MountPoint::detached(Size::new(300.0, 200.0));
    let chart = Chart::new(ChartConfig::new().with_container(mount.clone()));
    assert!(!chart.has_bound_auto_fit());

    chart.auto_fit(true);
    chart.render().await.unwrap();
    assert!(chart.has_bound_auto_fit());
    assert_eq!(mount.observer_count(), 1);

    chart.auto_fit(true);
    chart.render().await.unwrap();
    assert_eq!(mount.observer_count(), 1);

    chart.auto_fit(false);
    chart.render().await.unwrap();
    assert!(!chart.has_bound_auto_fit());
    assert_eq!(mount.observer_count(), 0);

    chart.auto_fit(true);
    chart.render().await.unwrap();
    assert_eq!(mount.observer_count(), 1);
    chart.clear();
    assert_eq!(mount.observer_count(), 0);
}

#[tokio::test]
async fn auto_fit_takes_the_size_from_the_mount_point() {
    let mount = MountPoint::detached(Size::new(300.0, 200.0));
    let (chart, recorder) = recorded(
        ChartConfig::new()
            .with_container(mount)
            .with_width(1000.0)
            .with_auto_fit(true),
    );
    chart.render().await.unwrap();

    assert_eq!(recorder.compiled(0)["width"], 300.0);
    assert_eq!(recorder.compiled(0)["height"], 200.0);
    // The tree itself keeps what the user wrote.
    assert_eq!(chart.options().number("width"), Some(1000.0));
    assert_eq!(chart.get_view().unwrap().bounds.width(), 300.0);
}

#[tokio::test]
async fn force_fit_skips_unchanged_sizes() {
    let mount = MountPoint::detached(Size::new(300.0, 200.0));
    let (chart, recorder) = recorded(ChartConfig::new().with_container(mount.clone()));
    let resized = record(&chart, &[ChartEvent::AfterChangeSize]);

    chart.render().await.unwrap();
    chart.force_fit().await.unwrap();
    assert_eq!(recorder.passes(), 1);
    assert!(resized.lock().unwrap().is_empty());

    mount.resize(Size::new(310.0, 200.0));
    chart.force_fit().await.unwrap();
    assert_eq!(recorder.passes(), 2);
    assert_eq!(*resized.lock().unwrap(), ["afterchangesize"]);
}

#[tokio::test(start_paused = true)]
async fn resizes_are_debounced_into_one_rerender() {
    let mount = MountPoint::detached(Size::new(300.0, 200.0));
    let (chart, recorder) = recorded(
        ChartConfig::new()
            .with_container(mount.clone())
            .with_resize_debounce(Duration::from_millis(300))
            .with_auto_fit(true),
    );
    let log = record(&chart, &[ChartEvent::AfterRender, ChartEvent::AfterChangeSize]);
    chart.render().await.unwrap();

    mount.resize(Size::new(400.0, 200.0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    mount.resize(Size::new(500.0, 250.0));
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(recorder.passes(), 2);
    assert_eq!(recorder.compiled(1)["width"], 500.0);
    assert_eq!(recorder.compiled(1)["height"], 250.0);
    assert_eq!(
        *log.lock().unwrap(),
        ["afterrender", "afterrender", "afterchangesize"]
    );

    // Dropping the chart releases its observer.
    drop(chart);
    assert_eq!(mount.observer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn a_pending_resize_is_dropped_once_auto_fit_is_unbound() {
    let mount = MountPoint::detached(Size::new(300.0, 200.0));
    let (chart, recorder) = recorded(
        ChartConfig::new()
            .with_container(mount.clone())
            .with_resize_debounce(Duration::from_millis(300))
            .with_auto_fit(true),
    );
    let log = record(&chart, &[ChartEvent::AfterRender, ChartEvent::AfterChangeSize]);
    chart.render().await.unwrap();
    assert_eq!(recorder.passes(), 1);

    mount.resize(Size::new(500.0, 200.0));
    chart.auto_fit(false);
    chart.clear();
    assert!(!chart.has_bound_auto_fit());
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(recorder.passes(), 1);
    assert_eq!(*log.lock().unwrap(), ["afterrender"]);
    assert!(!mount.has_surface());
}

#[tokio::test]
async fn change_data_cascades_to_marks_without_their_own_data() {
    let (chart, recorder) = recorded(ChartConfig::new());
    chart.data(json!([{"v": 0}]));
    chart.interval().data(json!(["x"])).encode("y", "v");
    chart.line().encode("y", "v");

    let rendered = chart.change_data(json!(["y"])).await.unwrap();
    assert!(rendered.ptr_eq(&chart));

    let options = chart.options();
    assert_eq!(options.data, Some(json!(["y"])));
    assert_eq!(options.children[0].data, Some(json!(["x"])));
    assert_eq!(options.children[1].data, Some(json!(["y"])));
    assert_eq!(recorder.passes(), 1);
    assert_eq!(recorder.compiled(0)["children"][1]["data"], json!(["y"]));
}

#[tokio::test]
async fn accessors_expose_the_realized_root_view() {
    let chart = Chart::new(ChartConfig::new().with_key("sales"));
    assert!(chart.get_view().is_none());
    chart
        .interval()
        .data(genres())
        .encode("x", "genre")
        .encode("y", "sold")
        .encode("color", "genre");
    chart.coordinate(json!({"type": "polar"})).theme("academy");
    chart.render().await.unwrap();

    assert_eq!(chart.get_key(), "sales");
    let view = chart.get_view().unwrap();
    assert_eq!(view.key, "sales");
    assert_eq!(chart.get_coordinate().unwrap().kind, "polar");
    assert_eq!(chart.get_theme().unwrap().name, "academy");
    assert_eq!(
        chart.get_scale_by_channel("x").unwrap().kind,
        ScaleKind::Band
    );
    assert_eq!(
        chart.get_scale_by_channel("y").unwrap().kind,
        ScaleKind::Linear
    );
    assert_eq!(chart.get_scale().unwrap().len(), 3);
    assert!(chart.get_scale_by_channel("size").is_none());
    assert_eq!(chart.get_group().unwrap().id, "sales");
}

#[tokio::test]
async fn generated_keys_are_unique_per_chart() {
    let a = Chart::new(ChartConfig::new());
    let b = Chart::new(ChartConfig::new());
    assert_ne!(a.get_key(), b.get_key());
    assert!(a.get_key().starts_with("vizgram-chart-"));
    a.render().await.unwrap();
    assert_eq!(a.get_group().unwrap().id, a.get_key());
}

#[tokio::test]
async fn clear_releases_the_painted_group() {
    let mount = MountPoint::detached(Size::new(300.0, 200.0));
    let chart = Chart::new(
        ChartConfig::new()
            .with_container(mount.clone())
            .with_key("kept")
            .with_auto_fit(true),
    );
    chart.point();
    let log = record(&chart, &[ChartEvent::AfterClear]);
    chart.render().await.unwrap();
    assert!(chart.get_group().is_some());
    assert!(mount.has_surface());

    chart.clear();
    assert!(chart.get_group().is_none());
    assert!(!mount.has_surface());
    assert!(!chart.has_bound_auto_fit());
    assert_eq!(*log.lock().unwrap(), ["afterclear"]);
    assert_eq!(chart.options().to_json(), json!({"type": "view", "key": "kept"}));

    // A cleared chart can be rebuilt and rendered again.
    chart.line();
    chart.render().await.unwrap();
    assert!(chart.get_group().is_some());
}

#[tokio::test]
async fn clear_discards_a_pass_already_in_flight() {
    let mount = MountPoint::detached(Size::new(300.0, 200.0));
    let chart = Chart::new(
        ChartConfig::new()
            .with_container(mount.clone())
            .with_renderer(SvgRenderer::new()),
    );
    chart.point();
    let log = record(&chart, &[ChartEvent::AfterPaint, ChartEvent::AfterRender]);

    let pending = chart.render();
    chart.clear();
    let settled = pending.await.unwrap();
    assert!(settled.ptr_eq(&chart));

    assert!(chart.get_group().is_none());
    assert!(chart.get_views().is_empty());
    assert!(!mount.has_surface());
    assert!(log.lock().unwrap().is_empty());

    // Requests made after the clear render normally.
    chart.line();
    chart.render().await.unwrap();
    assert!(chart.get_group().is_some());
    assert!(mount.has_surface());
    assert_eq!(*log.lock().unwrap(), ["afterpaint", "afterrender"]);
}

#[tokio::test]
async fn accessors_ignore_views_under_other_keys() {
    let chart = Chart::new(
        ChartConfig::new()
            .with_key("sales")
            .with_compiler(Rekeyed("elsewhere")),
    );
    chart.interval().data(genres()).encode("x", "genre").encode("y", "sold");
    chart.render().await.unwrap();

    assert_eq!(chart.get_views().len(), 1);
    assert_eq!(chart.get_views()[0].key, "elsewhere");
    assert!(chart.get_view().is_none());
    assert!(chart.get_group().is_none());
    assert!(chart.get_scale().is_none());
    assert!(chart.get_theme().is_none());
}

#[tokio::test]
async fn destroy_is_final() {
    let chart = Chart::new(ChartConfig::new());
    let log = record(&chart, &[ChartEvent::AfterClear, ChartEvent::AfterDestroy]);
    chart.render().await.unwrap();

    chart.destroy();
    assert!(chart.is_destroyed());
    assert!(chart.get_group().is_none());
    assert_eq!(*log.lock().unwrap(), ["afterclear", "afterdestroy"]);

    let err = chart.render().await.unwrap_err();
    assert_eq!(
        err,
        RenderError::Configuration(ConfigurationError::Destroyed)
    );
    // Handlers were removed.
    chart.emit(ChartEvent::AfterClear, &[]);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn custom_events_reach_handlers_with_arguments() {
    let chart = Chart::new(ChartConfig::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    chart.once("element:click", move |args| {
        sink.lock().unwrap().extend_from_slice(args);
    });
    chart.emit("element:click", &[json!(1), json!("a")]);
    chart.emit("element:click", &[json!(2)]);
    assert_eq!(*seen.lock().unwrap(), [json!(1), json!("a")]);

    chart.on("ping", |_| {}).off("ping");
    chart.emit("ping", &[]);
}

#[tokio::test]
async fn from_options_builds_a_renderable_chart() {
    let chart = Chart::from_options(json!({
        "renderer": "svg",
        "type": "interval",
        "key": "bars",
        "data": genres(),
        "encode": {"x": "genre", "y": "sold"},
    }))
    .unwrap();
    chart.render().await.unwrap();

    assert_eq!(chart.get_key(), "bars");
    let surface = chart.get_container().unwrap().surface().unwrap();
    let svg = surface.as_svg().unwrap();
    assert!(svg.contains(r#"<g id="bars">"#));

    assert!(Chart::from_options(json!({"renderer": "webgl"})).is_err());
    assert!(Chart::from_options(json!([1])).is_err());
}
