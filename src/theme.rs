//! Themes: named presets, flat key overrides and element inheritance.
//!
//! Inheritance hierarchy:
//! ```text
//! text
//! ├── plot_title
//! ├── axis_text
//! ├── axis_title
//! ├── strip_text
//! └── legend_text
//!
//! rect
//! ├── plot_background
//! ├── panel_background
//! └── strip_background
//!
//! line
//! ├── axis_line
//! ├── axis_ticks
//! └── panel_grid_major
//!     └── panel_grid_minor
//! ```

use crate::error::{PlotError, Result};
use crate::palette::parse_color;
use plotters::style::RGBColor;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

// === Theme elements ===

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementText {
    pub family: Option<String>,
    pub color: Option<String>,
    pub size: Option<f64>,
    pub face: Option<String>,
    pub hjust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementLine {
    pub color: Option<String>,
    pub width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementRect {
    pub fill: Option<String>,
    pub color: Option<String>,
    pub width: Option<f64>,
}

/// A themable element; `Inherit` defers to the parent element.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ThemeElement {
    #[default]
    Inherit,
    Blank,
    Text(ElementText),
    Line(ElementLine),
    Rect(ElementRect),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegendPosition {
    #[default]
    Right,
    Left,
    Top,
    Bottom,
    None,
}

impl FromStr for LegendPosition {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "right" => Ok(LegendPosition::Right),
            "left" => Ok(LegendPosition::Left),
            "top" => Ok(LegendPosition::Top),
            "bottom" => Ok(LegendPosition::Bottom),
            "none" => Ok(LegendPosition::None),
            other => Err(PlotError::InvalidSpec(format!("Unknown legend position '{}'", other))),
        }
    }
}

/// Named base theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Grey panel with white grid lines.
    #[default]
    Default,
    Minimal,
    /// Axis lines, no grid.
    Classic,
    HighContrast,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Minimal => "minimal",
            Preset::Classic => "classic",
            Preset::HighContrast => "high-contrast",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "default" | "grey" | "gray" => Ok(Preset::Default),
            "minimal" => Ok(Preset::Minimal),
            "classic" => Ok(Preset::Classic),
            "high-contrast" => Ok(Preset::HighContrast),
            other => Err(PlotError::InvalidSpec(format!("Unknown theme preset '{}'", other))),
        }
    }
}

/// Value of a flat theme override.
#[derive(Debug, Clone, PartialEq)]
pub enum ThemeValue {
    Element(ThemeElement),
    Text(String),
    Number(f64),
    Bool(bool),
}

/// Element tree of a theme before inheritance is resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThemeElements {
    pub line: ThemeElement,
    pub rect: ThemeElement,
    pub text: ThemeElement,
    pub plot_background: ThemeElement,
    pub plot_title: ThemeElement,
    pub panel_background: ThemeElement,
    pub panel_grid_major: ThemeElement,
    pub panel_grid_minor: ThemeElement,
    pub axis_text: ThemeElement,
    pub axis_title: ThemeElement,
    pub axis_line: ThemeElement,
    pub axis_ticks: ThemeElement,
    pub strip_background: ThemeElement,
    pub strip_text: ThemeElement,
    pub legend_text: ThemeElement,
    pub legend_position: LegendPosition,
    pub legend_show: bool,
}

fn rect(fill: &str) -> ThemeElement {
    ThemeElement::Rect(ElementRect {
        fill: Some(fill.to_string()),
        ..Default::default()
    })
}

fn line(color: &str, width: f64) -> ThemeElement {
    ThemeElement::Line(ElementLine {
        color: Some(color.to_string()),
        width: Some(width),
    })
}

fn text(color: &str, size: f64) -> ThemeElement {
    ThemeElement::Text(ElementText {
        color: Some(color.to_string()),
        size: Some(size),
        ..Default::default()
    })
}

impl ThemeElements {
    /// Element tree of a preset.
    pub fn preset(preset: Preset) -> Self {
        let base = ThemeElements {
            legend_show: true,
            axis_text: text("gray30", 11.0),
            plot_title: ThemeElement::Text(ElementText {
                size: Some(16.0),
                hjust: Some(0.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        match preset {
            Preset::Default => ThemeElements {
                panel_background: rect("#EBEBEB"),
                panel_grid_major: line("white", 1.0),
                axis_line: ThemeElement::Blank,
                axis_ticks: line("gray20", 1.0),
                strip_background: rect("#D9D9D9"),
                ..base
            },
            Preset::Minimal => ThemeElements {
                panel_background: rect("white"),
                panel_grid_major: line("#CCCCCC", 0.5),
                panel_grid_minor: ThemeElement::Blank,
                axis_line: ThemeElement::Blank,
                axis_ticks: ThemeElement::Blank,
                strip_background: rect("white"),
                ..base
            },
            Preset::Classic => ThemeElements {
                panel_background: rect("white"),
                panel_grid_major: ThemeElement::Blank,
                panel_grid_minor: ThemeElement::Blank,
                axis_line: line("black", 1.0),
                axis_ticks: line("black", 1.0),
                strip_background: ThemeElement::Rect(ElementRect {
                    fill: Some("white".to_string()),
                    color: Some("black".to_string()),
                    width: Some(1.0),
                }),
                ..base
            },
            Preset::HighContrast => ThemeElements {
                text: text("black", 14.0),
                axis_text: text("black", 13.0),
                line: line("black", 2.0),
                panel_background: ThemeElement::Rect(ElementRect {
                    fill: Some("white".to_string()),
                    color: Some("black".to_string()),
                    width: Some(2.0),
                }),
                panel_grid_major: line("gray40", 1.0),
                panel_grid_minor: ThemeElement::Blank,
                axis_line: line("black", 2.0),
                axis_ticks: line("black", 2.0),
                strip_background: rect("black"),
                strip_text: text("white", 13.0),
                ..base
            },
        }
    }

    /// Apply one flat override. Returns `false` for keys that are not theme keys.
    pub fn apply(&mut self, key: &str, value: &ThemeValue) -> bool {
        if key == "legend_position" {
            match value {
                ThemeValue::Text(s) => match s.parse() {
                    Ok(pos) => self.legend_position = pos,
                    Err(e) => warn!(error = %e, "ignoring legend position"),
                },
                other => warn!(value = ?other, "legend_position expects a string"),
            }
            return true;
        }
        if key == "legend_show" {
            match value {
                ThemeValue::Bool(b) => self.legend_show = *b,
                other => warn!(value = ?other, "legend_show expects a boolean"),
            }
            return true;
        }

        let slot = match key {
            "line" => &mut self.line,
            "rect" => &mut self.rect,
            "text" => &mut self.text,
            "plot_background" => &mut self.plot_background,
            "plot_title" => &mut self.plot_title,
            "panel_background" => &mut self.panel_background,
            "panel_grid_major" | "panel_grid" => &mut self.panel_grid_major,
            "panel_grid_minor" => &mut self.panel_grid_minor,
            "axis_text" => &mut self.axis_text,
            "axis_title" => &mut self.axis_title,
            "axis_line" => &mut self.axis_line,
            "axis_ticks" => &mut self.axis_ticks,
            "strip_background" => &mut self.strip_background,
            "strip_text" => &mut self.strip_text,
            "legend_text" => &mut self.legend_text,
            _ => return false,
        };
        match value {
            ThemeValue::Element(element) => *slot = element.clone(),
            other => warn!(key, value = ?other, "theme element expects an element value"),
        }
        true
    }

    /// Resolve the theme into concrete styles using the inheritance hierarchy.
    ///
    /// Resolution order for each element:
    /// 1. Check the specific element (e.g., `axis_text`)
    /// 2. Check the parent element (e.g., `text`)
    /// 3. Use hardcoded default
    pub fn resolve(&self) -> ResolvedTheme {
        let base_text = resolve_text(&self.text, &ResolvedText::default());
        let base_line = resolve_line(&self.line, &ResolvedLine::default()).unwrap_or_default();
        let base_rect = resolve_rect(&self.rect, &ResolvedRect::default());

        let panel_grid_major = resolve_line(&self.panel_grid_major, &base_line);
        // Grid lines have their own inheritance: panel_grid_minor -> panel_grid_major -> line
        let panel_grid_minor = match &self.panel_grid_minor {
            ThemeElement::Blank => None,
            ThemeElement::Line(l) => {
                let mut resolved = panel_grid_major.clone().unwrap_or_else(|| base_line.clone());
                let explicit_width = l.width.is_some();
                apply_line_overrides(&mut resolved, l);
                if !explicit_width {
                    resolved.width *= 0.5;
                }
                Some(resolved)
            }
            _ => panel_grid_major.as_ref().map(|m| ResolvedLine {
                width: m.width * 0.5,
                ..m.clone()
            }),
        };

        ResolvedTheme {
            plot_background: resolve_rect(&self.plot_background, &base_rect),
            panel_background: resolve_rect(&self.panel_background, &base_rect),
            strip_background: resolve_rect(&self.strip_background, &base_rect),
            plot_title: resolve_text(&self.plot_title, &base_text),
            axis_text: resolve_text(&self.axis_text, &base_text),
            axis_title: resolve_text(&self.axis_title, &base_text),
            strip_text: resolve_text(&self.strip_text, &base_text),
            legend_text: resolve_text(&self.legend_text, &base_text),
            panel_grid_major,
            panel_grid_minor,
            axis_line: resolve_line(&self.axis_line, &base_line),
            axis_ticks: resolve_line(&self.axis_ticks, &base_line),
            legend_position: self.legend_position,
            legend_show: self.legend_show && self.legend_position != LegendPosition::None,
        }
    }
}

/// A base preset plus ordered overrides; later overrides win.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Theme {
    /// `None` keeps whatever preset an earlier theme chose (or the default).
    pub preset: Option<Preset>,
    pub overrides: Vec<(String, ThemeValue)>,
}

impl Theme {
    pub fn new(preset: Preset) -> Self {
        Theme {
            preset: Some(preset),
            overrides: Vec::new(),
        }
    }

    pub fn minimal() -> Self {
        Theme::new(Preset::Minimal)
    }

    pub fn classic() -> Self {
        Theme::new(Preset::Classic)
    }

    pub fn high_contrast() -> Self {
        Theme::new(Preset::HighContrast)
    }

    pub fn set(mut self, key: impl Into<String>, value: ThemeValue) -> Self {
        self.overrides.push((key.into(), value));
        self
    }

    /// Layer `other` on top: its preset replaces ours when set, overrides append.
    pub fn merge(mut self, other: Theme) -> Self {
        if other.preset.is_some() {
            self.preset = other.preset;
        }
        self.overrides.extend(other.overrides);
        self
    }

    pub fn elements(&self) -> ThemeElements {
        let mut elements = ThemeElements::preset(self.preset.unwrap_or_default());
        for (key, value) in &self.overrides {
            if !elements.apply(key, value) {
                warn!(key = %key, "ignoring unknown theme key");
            }
        }
        elements
    }

    pub fn resolve(&self) -> ResolvedTheme {
        self.elements().resolve()
    }
}

// === Resolved types (no Options - fully concrete) ===

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FontFace {
    Plain,
    Bold,
    Italic,
    BoldItalic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedText {
    pub family: String,
    pub color: RGBColor,
    pub size: f64,
    pub face: FontFace,
    /// Horizontal justification: 0 left, 0.5 centre, 1 right.
    pub hjust: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub color: RGBColor,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRect {
    pub fill: RGBColor,
    pub border_color: Option<RGBColor>,
    pub border_width: f64,
}

/// Complete resolved theme with all elements fully specified
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTheme {
    pub plot_background: ResolvedRect,
    pub panel_background: ResolvedRect,
    pub strip_background: ResolvedRect,
    pub plot_title: ResolvedText,
    pub axis_text: ResolvedText,
    pub axis_title: ResolvedText,
    pub strip_text: ResolvedText,
    pub legend_text: ResolvedText,
    /// `None` when blank.
    pub panel_grid_major: Option<ResolvedLine>,
    pub panel_grid_minor: Option<ResolvedLine>,
    pub axis_line: Option<ResolvedLine>,
    pub axis_ticks: Option<ResolvedLine>,
    pub legend_position: LegendPosition,
    pub legend_show: bool,
}

impl Default for ResolvedText {
    fn default() -> Self {
        ResolvedText {
            family: "sans-serif".to_string(),
            color: RGBColor(0, 0, 0),
            size: 12.0,
            face: FontFace::Plain,
            hjust: 0.5,
        }
    }
}

impl Default for ResolvedLine {
    fn default() -> Self {
        ResolvedLine {
            color: RGBColor(0, 0, 0),
            width: 1.0,
        }
    }
}

impl Default for ResolvedRect {
    fn default() -> Self {
        ResolvedRect {
            fill: RGBColor(255, 255, 255),
            border_color: None,
            border_width: 0.0,
        }
    }
}

impl Default for ResolvedTheme {
    fn default() -> Self {
        Theme::default().resolve()
    }
}

fn parse_face(face: &str) -> FontFace {
    match face.to_lowercase().as_str() {
        "bold" => FontFace::Bold,
        "italic" => FontFace::Italic,
        "bold.italic" | "bolditalic" => FontFace::BoldItalic,
        _ => FontFace::Plain,
    }
}

fn resolve_text(element: &ThemeElement, base: &ResolvedText) -> ResolvedText {
    let mut resolved = base.clone();
    if let ThemeElement::Text(t) = element {
        apply_text_overrides(&mut resolved, t);
    }
    resolved
}

fn resolve_rect(element: &ThemeElement, base: &ResolvedRect) -> ResolvedRect {
    let mut resolved = base.clone();
    if let ThemeElement::Rect(r) = element {
        apply_rect_overrides(&mut resolved, r);
    }
    resolved
}

fn resolve_line(element: &ThemeElement, base: &ResolvedLine) -> Option<ResolvedLine> {
    match element {
        ThemeElement::Blank => None,
        ThemeElement::Line(l) => {
            let mut resolved = base.clone();
            apply_line_overrides(&mut resolved, l);
            Some(resolved)
        }
        _ => Some(base.clone()),
    }
}

fn apply_text_overrides(resolved: &mut ResolvedText, element: &ElementText) {
    if let Some(ref family) = element.family {
        resolved.family = family.clone();
    }
    if let Some(c) = element.color.as_deref().and_then(parse_color) {
        resolved.color = c;
    }
    if let Some(size) = element.size {
        resolved.size = size;
    }
    if let Some(ref face) = element.face {
        resolved.face = parse_face(face);
    }
    if let Some(hjust) = element.hjust {
        resolved.hjust = hjust.clamp(0.0, 1.0);
    }
}

fn apply_line_overrides(resolved: &mut ResolvedLine, element: &ElementLine) {
    if let Some(c) = element.color.as_deref().and_then(parse_color) {
        resolved.color = c;
    }
    if let Some(width) = element.width {
        resolved.width = width;
    }
}

fn apply_rect_overrides(resolved: &mut ResolvedRect, element: &ElementRect) {
    if let Some(c) = element.fill.as_deref().and_then(parse_color) {
        resolved.fill = c;
    }
    if let Some(c) = element.color.as_deref().and_then(parse_color) {
        resolved.border_color = Some(c);
    }
    if let Some(width) = element.width {
        resolved.border_width = width;
    }
}
