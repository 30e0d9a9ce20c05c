// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chart demos for `vizgram`.
//!
//! Builds a handful of charts, renders each to SVG and writes them into one HTML report.
//! Set `RUST_LOG=vizgram=debug` to watch render passes being scheduled.

mod html;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use vizgram::{Chart, ChartConfig, ChartEvent, Compose, Handle, SvgRenderer};

type DemoResult<T> = Result<T, Box<dyn Error>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> DemoResult<()> {
    env_logger::Builder::new()
        .filter_module("vizgram", log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let sections = vec![
        bar_demo().await?,
        layer_demo().await?,
        flex_demo().await?,
        theme_demo().await?,
        change_data_demo().await?,
        burst_demo().await?,
        options_demo().await?,
    ];

    let html = html::render_report("vizgram demo", &sections);
    std::fs::write("vizgram_demo.html", html)?;
    println!("wrote vizgram_demo.html");
    Ok(())
}

fn svg_chart(width: f64, height: f64) -> Chart {
    Chart::new(
        ChartConfig::new()
            .with_renderer(SvgRenderer::new())
            .with_width(width)
            .with_height(height),
    )
}

async fn render_svg(chart: &Chart) -> DemoResult<String> {
    chart.render().await?;
    svg_of(chart)
}

fn svg_of(chart: &Chart) -> DemoResult<String> {
    let surface = chart.get_container()?.surface().ok_or("nothing was painted")?;
    let svg = surface.as_svg().ok_or("renderer did not produce SVG")?;
    Ok(svg.to_owned())
}

fn genres() -> Value {
    json!([
        {"genre": "Sports", "sold": 275},
        {"genre": "Strategy", "sold": 115},
        {"genre": "Action", "sold": 120},
        {"genre": "Shooter", "sold": 350},
        {"genre": "Other", "sold": 150},
    ])
}

fn temperatures() -> Value {
    json!([
        {"month": "Jan", "tokyo": 7.0},
        {"month": "Feb", "tokyo": 6.9},
        {"month": "Mar", "tokyo": 9.5},
        {"month": "Apr", "tokyo": 14.5},
        {"month": "May", "tokyo": 18.4},
        {"month": "Jun", "tokyo": 21.5},
    ])
}

async fn bar_demo() -> DemoResult<html::HtmlSection> {
    let chart = svg_chart(360.0, 220.0);
    chart
        .interval()
        .data(genres())
        .encode("x", "genre")
        .encode("y", "sold")
        .encode("color", "genre")
        .style("fillOpacity", 0.9);
    Ok(html::HtmlSection {
        title: "Bar",
        description: "One interval mark; x is inferred as a band scale, y as a linear scale starting at zero, color as an ordinal scale over the theme palette.",
        svg: render_svg(&chart).await?,
    })
}

async fn layer_demo() -> DemoResult<html::HtmlSection> {
    let chart = svg_chart(360.0, 220.0);
    chart.data(temperatures());
    chart.space_layer().call(|layer| {
        layer.line().encode("x", "month").encode("y", "tokyo");
        layer
            .point()
            .encode("x", "month")
            .encode("y", "tokyo")
            .style("fill", "white");
    });
    Ok(html::HtmlSection {
        title: "Layer",
        description: "A line and a point mark sharing the data declared on the chart.",
        svg: render_svg(&chart).await?,
    })
}

async fn flex_demo() -> DemoResult<html::HtmlSection> {
    let chart = svg_chart(560.0, 220.0);
    let flex = chart.space_flex();
    flex.view().call(|left| {
        left.interval()
            .data(genres())
            .encode("x", "genre")
            .encode("y", "sold");
    });
    flex.view().call(|right| {
        right
            .area()
            .data(temperatures())
            .encode("x", "month")
            .encode("y", "tokyo");
    });
    Ok(html::HtmlSection {
        title: "Flex",
        description: "Two views laid out side by side by a spaceFlex root.",
        svg: render_svg(&chart).await?,
    })
}

async fn theme_demo() -> DemoResult<html::HtmlSection> {
    let chart = svg_chart(360.0, 220.0);
    chart.theme(json!({"type": "dark", "defaultColor": "#f4a261"}));
    chart
        .point()
        .data(temperatures())
        .encode("x", "month")
        .encode("y", "tokyo")
        .encode("size", "tokyo");
    Ok(html::HtmlSection {
        title: "Theme",
        description: "The dark theme with its default color overridden.",
        svg: render_svg(&chart).await?,
    })
}

async fn change_data_demo() -> DemoResult<html::HtmlSection> {
    let chart = svg_chart(360.0, 220.0);
    chart.data(genres());
    chart.interval().encode("x", "genre").encode("y", "sold");
    chart.render().await?;
    chart
        .change_data(json!([
            {"genre": "Sports", "sold": 120},
            {"genre": "Strategy", "sold": 300},
        ]))
        .await?;
    Ok(html::HtmlSection {
        title: "Change data",
        description: "Rendered once, then re-rendered after replacing the chart data; the interval mark follows because it declares no data of its own.",
        svg: svg_of(&chart)?,
    })
}

async fn burst_demo() -> DemoResult<html::HtmlSection> {
    let chart = svg_chart(360.0, 220.0);
    let passes = Arc::new(AtomicUsize::new(0));
    let counter = passes.clone();
    chart.on(ChartEvent::AfterRender, move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    chart
        .line()
        .data(temperatures())
        .encode("x", "month")
        .encode("y", "tokyo");

    let requests: Vec<_> = (0..5).map(|_| chart.render()).collect();
    for request in requests {
        request.await?;
    }
    log::info!(
        "5 render requests completed in {} pass(es)",
        passes.load(Ordering::Relaxed)
    );
    Ok(html::HtmlSection {
        title: "Render burst",
        description: "Five renders requested back to back settle after two passes: the first one plus a single trailing pass.",
        svg: svg_of(&chart)?,
    })
}

async fn options_demo() -> DemoResult<html::HtmlSection> {
    let chart = Chart::from_options(json!({
        "renderer": "svg",
        "type": "interval",
        "width": 360,
        "height": 220,
        "data": genres(),
        "encode": {"x": "genre", "y": "sold", "color": "genre"},
        "theme": "academy",
    }))?;
    Ok(html::HtmlSection {
        title: "From options",
        description: "The same bar chart declared as one plain record instead of builder calls.",
        svg: render_svg(&chart).await?,
    })
}
