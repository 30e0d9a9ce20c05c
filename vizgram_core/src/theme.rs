// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Themes and theme lookup.
//!
//! A chart's `theme` attribute is either a registered theme name or a record whose `type`
//! names the base theme and whose other fields override it.

use std::fmt;

use hashbrown::HashMap;
use indexmap::IndexMap;
use peniko::Color;
use peniko::color::{Srgb, parse_color};
use serde_json::Value;

use crate::{AttrValue, ConfigurationError};

/// Name of the theme used when a chart sets none.
pub const DEFAULT_THEME: &str = "classic";

const CLASSIC_PALETTE: [Color; 10] = [
    Color::from_rgba8(0x17, 0x83, 0xFF, 0xFF),
    Color::from_rgba8(0x00, 0xC9, 0xC9, 0xFF),
    Color::from_rgba8(0xF0, 0x88, 0x4D, 0xFF),
    Color::from_rgba8(0xD5, 0x80, 0xFF, 0xFF),
    Color::from_rgba8(0x78, 0x63, 0xFF, 0xFF),
    Color::from_rgba8(0x60, 0xC4, 0x2D, 0xFF),
    Color::from_rgba8(0xBD, 0x8F, 0x24, 0xFF),
    Color::from_rgba8(0xFF, 0x80, 0xCA, 0xFF),
    Color::from_rgba8(0x24, 0x91, 0xB3, 0xFF),
    Color::from_rgba8(0x17, 0xC7, 0x6F, 0xFF),
];

const ACADEMY_PALETTE: [Color; 10] = [
    Color::from_rgba8(0x4E, 0x79, 0xA7, 0xFF),
    Color::from_rgba8(0xF2, 0x8E, 0x2C, 0xFF),
    Color::from_rgba8(0xE1, 0x57, 0x59, 0xFF),
    Color::from_rgba8(0x76, 0xB7, 0xB2, 0xFF),
    Color::from_rgba8(0x59, 0xA1, 0x4F, 0xFF),
    Color::from_rgba8(0xED, 0xC9, 0x49, 0xFF),
    Color::from_rgba8(0xAF, 0x7A, 0xA1, 0xFF),
    Color::from_rgba8(0xFF, 0x9D, 0xA7, 0xFF),
    Color::from_rgba8(0x9C, 0x75, 0x5F, 0xFF),
    Color::from_rgba8(0xBA, 0xB0, 0xAB, 0xFF),
];

/// Resolved visual defaults handed to the compiler alongside the option tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    /// Registered name of the theme this one derives from.
    pub name: String,
    /// Fill used by marks with no color encoding.
    pub default_color: Color,
    /// Surface background.
    pub background: Color,
    /// Foreground for axis labels and titles.
    pub foreground: Color,
    /// Categorical palette for ordinal color scales.
    pub palette: Vec<Color>,
    /// Free-form overrides the compiler may interpret (e.g. `axis`, `legend`).
    pub overrides: IndexMap<String, Value>,
}

impl Theme {
    /// Creates a light theme with the classic palette under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_color: CLASSIC_PALETTE[0],
            background: Color::TRANSPARENT,
            foreground: Color::from_rgba8(0x1D, 0x21, 0x29, 0xFF),
            palette: CLASSIC_PALETTE.to_vec(),
            overrides: IndexMap::new(),
        }
    }

    /// Sets the default mark color.
    pub fn with_default_color(mut self, color: Color) -> Self {
        self.default_color = color;
        self
    }

    /// Sets the background.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    /// Sets the foreground.
    pub fn with_foreground(mut self, color: Color) -> Self {
        self.foreground = color;
        self
    }

    /// Sets the categorical palette.
    pub fn with_palette(mut self, palette: impl Into<Vec<Color>>) -> Self {
        self.palette = palette.into();
        self
    }

    /// Returns the palette color for a category index, wrapping around.
    pub fn category_color(&self, index: usize) -> Color {
        match self.palette.len() {
            0 => self.default_color,
            n => self.palette[index % n],
        }
    }

    fn apply(&mut self, name: &str, value: &Value) -> Result<(), ConfigurationError> {
        match name {
            "type" => {}
            "defaultColor" => self.default_color = color_value(value)?,
            "background" => self.background = color_value(value)?,
            "foreground" => self.foreground = color_value(value)?,
            "palette" | "category10" => {
                let Value::Array(items) = value else {
                    return Err(ConfigurationError::InvalidTheme(format!(
                        "`{name}` must be an array of colors"
                    )));
                };
                self.palette = items.iter().map(color_value).collect::<Result<_, _>>()?;
            }
            other => {
                self.overrides.insert(other.to_owned(), value.clone());
            }
        }
        Ok(())
    }
}

fn color_value(value: &Value) -> Result<Color, ConfigurationError> {
    let Value::String(text) = value else {
        return Err(ConfigurationError::InvalidColor(value.to_string()));
    };
    parse_color(text)
        .map(|c| c.to_alpha_color::<Srgb>())
        .map_err(|_| ConfigurationError::InvalidColor(text.clone()))
}

/// Named themes available to a chart.
#[derive(Clone)]
pub struct ThemeRegistry {
    themes: HashMap<String, Theme>,
}

impl fmt::Debug for ThemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.themes.keys().collect();
        names.sort();
        f.debug_struct("ThemeRegistry")
            .field("themes", &names)
            .finish()
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        let classic = Theme::new(DEFAULT_THEME);
        let classic_dark = Theme::new("classicDark")
            .with_background(Color::from_rgba8(0x14, 0x14, 0x14, 0xFF))
            .with_foreground(Color::from_rgba8(0xE8, 0xE8, 0xE8, 0xFF));
        let academy = Theme::new("academy")
            .with_default_color(ACADEMY_PALETTE[0])
            .with_palette(ACADEMY_PALETTE);

        let mut registry = Self::empty();
        registry.register(Theme {
            name: "light".into(),
            ..classic.clone()
        });
        registry.register(Theme {
            name: "dark".into(),
            ..classic_dark.clone()
        });
        registry.register(classic);
        registry.register(classic_dark);
        registry.register(academy);
        registry
    }
}

impl ThemeRegistry {
    /// Creates a registry holding no themes.
    pub fn empty() -> Self {
        Self {
            themes: HashMap::new(),
        }
    }

    /// Adds or replaces a theme under its own name.
    pub fn register(&mut self, theme: Theme) {
        self.themes.insert(theme.name.clone(), theme);
    }

    /// Adds a theme, returning the registry for chaining.
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.register(theme);
        self
    }

    /// Looks up a theme by name.
    pub fn get(&self, name: &str) -> Option<&Theme> {
        self.themes.get(name)
    }

    fn lookup(&self, name: &str) -> Result<Theme, ConfigurationError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownTheme(name.to_owned()))
    }

    /// Resolves a chart's `theme` attribute.
    ///
    /// - absent: the [`DEFAULT_THEME`];
    /// - a string: the registered theme of that name;
    /// - a record: the theme named by its `type` (default [`DEFAULT_THEME`]) with every other
    ///   field applied as an override.
    pub fn resolve(&self, attr: Option<&AttrValue>) -> Result<Theme, ConfigurationError> {
        let value = match attr {
            None => return self.lookup(DEFAULT_THEME),
            Some(attr) => attr.to_json(),
        };
        match &value {
            Value::Null => self.lookup(DEFAULT_THEME),
            Value::String(name) => self.lookup(name),
            Value::Object(record) => {
                let base = match record.get("type") {
                    None => DEFAULT_THEME,
                    Some(Value::String(name)) => name.as_str(),
                    Some(other) => {
                        return Err(ConfigurationError::InvalidTheme(format!(
                            "`type` must be a theme name, found {other}"
                        )));
                    }
                };
                let mut theme = self.lookup(base)?;
                for (name, value) in record {
                    theme.apply(name, value)?;
                }
                Ok(theme)
            }
            other => Err(ConfigurationError::InvalidTheme(format!(
                "expected a name or a record, found {other}"
            ))),
        }
    }
}
