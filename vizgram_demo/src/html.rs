// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A single-page report of rendered charts.

use std::fmt::Write as _;

pub(crate) struct HtmlSection {
    pub(crate) title: &'static str,
    pub(crate) description: &'static str,
    pub(crate) svg: String,
}

pub(crate) fn render_report(title: &str, sections: &[HtmlSection]) -> String {
    let mut out = String::new();
    out.push_str("<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", escape(title));
    out.push_str(
        "<style>\n\
         body { font-family: sans-serif; margin: 24px; }\n\
         section { margin-bottom: 32px; }\n\
         p { color: #555; max-width: 720px; }\n\
         </style>\n",
    );
    out.push_str("</head>\n<body>\n");
    let _ = writeln!(out, "<h1>{}</h1>", escape(title));
    for section in sections {
        out.push_str("<section>\n");
        let _ = writeln!(out, "<h2>{}</h2>", escape(section.title));
        let _ = writeln!(out, "<p>{}</p>", escape(section.description));
        out.push_str(&section.svg);
        out.push_str("</section>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
