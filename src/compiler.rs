//! Layout and geometry compilation: turns scaled layer data into a scene graph of draw commands.

use crate::aes::{AestheticValue, Channel};
use crate::coord::{clip_polygon, clip_polyline, clip_segment, Coord};
use crate::data::Value;
use crate::facet::{FacetLayout, FacetScales};
use crate::ir::{
    DrawCommand, HAnchor, LayerFrame, Paint, RenderData, ResolvedLayer, ResolvedSpec, ScaleSet, SceneGraph,
    Stroke, TextStyle, VAnchor,
};
use crate::layer::{Geom, Position};
use crate::legend::{Glyph, Legend};
use crate::palette::{self, parse_color, PointShape};
use crate::scale::ResolvedScale;
use crate::stat::{self, XMAX_COLUMN, XMIN_COLUMN};
use crate::theme::{FontFace, LegendPosition, ResolvedLine, ResolvedRect, ResolvedText, ResolvedTheme};
use crate::transform::{row_groups, DEFAULT_BAR_WIDTH};
use plotters::style::RGBColor;
use std::collections::BTreeMap;
use tracing::debug;

const MARGIN: f64 = 10.0;
const GAP: f64 = 4.0;
const PANEL_SPACING: f64 = 8.0;
const TICK_LENGTH: f64 = 4.0;
const KEY_SIZE: f64 = 16.0;
const KEY_ROW: f64 = 20.0;
const COLORBAR_WIDTH: f64 = 16.0;
const COLORBAR_HEIGHT: f64 = 100.0;
const COLORBAR_STEPS: usize = 24;
const LEGEND_SPACING: f64 = 12.0;
const DEFAULT_BOX_WIDTH: f64 = 0.75;
const NA_COLOR: RGBColor = RGBColor(127, 127, 127);
const BOX_OUTLINE: RGBColor = RGBColor(51, 51, 51);
const WHITE: RGBColor = RGBColor(255, 255, 255);

/// Approximate advance width of a label; good enough for layout without font metrics.
pub fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * 0.55
}

// =============================================================================
// Geometry helpers
// =============================================================================

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl Bounds {
    /// Never narrower or shorter than one pixel.
    fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Bounds {
            left,
            top,
            right: right.max(left + 1.0),
            bottom: bottom.max(top + 1.0),
        }
    }

    fn width(&self) -> f64 {
        self.right - self.left
    }

    fn height(&self) -> f64 {
        self.bottom - self.top
    }

    fn min(&self) -> (f64, f64) {
        (self.left, self.top)
    }

    fn max(&self) -> (f64, f64) {
        (self.right, self.bottom)
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        p.0 >= self.left - 0.5 && p.0 <= self.right + 0.5 && p.1 >= self.top - 0.5 && p.1 <= self.bottom + 0.5
    }

    /// Intersection with the rectangle spanned by two corners, as (top-left, bottom-right).
    fn clip_rect(&self, a: (f64, f64), b: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        let x0 = a.0.min(b.0).max(self.left);
        let x1 = a.0.max(b.0).min(self.right);
        let y0 = a.1.min(b.1).max(self.top);
        let y1 = a.1.max(b.1).min(self.bottom);
        (x1 > x0 && y1 >= y0).then_some(((x0, y0), (x1, y1)))
    }
}

/// One panel's pixel rectangle and the scales that map into it.
struct PanelFrame<'a> {
    bounds: Bounds,
    coord: &'a Coord,
    x: &'a ResolvedScale,
    y: &'a ResolvedScale,
}

impl<'a> PanelFrame<'a> {
    /// Transformed-space x/y to pixels.
    fn pixel(&self, tx: f64, ty: f64) -> (f64, f64) {
        let (h, v) = self.coord.orient(self.x.rescale(tx), self.y.rescale(ty));
        (
            self.bounds.left + h * self.bounds.width(),
            self.bounds.top + (1.0 - v) * self.bounds.height(),
        )
    }

    fn horizontal(&self) -> &'a ResolvedScale {
        if self.coord.is_flipped() {
            self.y
        } else {
            self.x
        }
    }

    fn vertical(&self) -> &'a ResolvedScale {
        if self.coord.is_flipped() {
            self.x
        } else {
            self.y
        }
    }

    /// Bar baseline: zero when visible, else the bottom of the y extent.
    fn baseline(&self) -> f64 {
        self.y.transform_raw(0.0).unwrap_or_else(|| self.y.extent().0)
    }

    fn push_segment(&self, out: &mut Vec<DrawCommand>, a: (f64, f64), b: (f64, f64), stroke: Stroke) {
        let (pa, pb) = (self.pixel(a.0, a.1), self.pixel(b.0, b.1));
        if let Some((s, e)) = clip_segment(pa, pb, self.bounds.min(), self.bounds.max()) {
            out.push(DrawCommand::Path {
                points: vec![s, e],
                stroke,
            });
        }
    }
}

fn anchor_for(hjust: f64) -> HAnchor {
    if hjust < 0.25 {
        HAnchor::Left
    } else if hjust > 0.75 {
        HAnchor::Right
    } else {
        HAnchor::Center
    }
}

fn text_command(text: &str, pos: (f64, f64), el: &ResolvedText, h: HAnchor, v: VAnchor, rotated: bool) -> DrawCommand {
    DrawCommand::Text {
        pos,
        text: text.to_string(),
        style: TextStyle {
            family: el.family.clone(),
            size: el.size,
            color: el.color,
            face: el.face,
            h,
            v,
            rotated,
        },
    }
}

fn rect_command(tl: (f64, f64), br: (f64, f64), rect: &ResolvedRect) -> DrawCommand {
    DrawCommand::Rect {
        tl,
        br,
        fill: Some(Paint::solid(rect.fill)),
        stroke: rect.border_color.map(|color| Stroke {
            paint: Paint::solid(color),
            width: rect.border_width,
        }),
    }
}

fn line_command(a: (f64, f64), b: (f64, f64), line: &ResolvedLine) -> DrawCommand {
    DrawCommand::Path {
        points: vec![a, b],
        stroke: Stroke {
            paint: Paint::solid(line.color),
            width: line.width,
        },
    }
}

// =============================================================================
// Scene compilation
// =============================================================================

/// Lay out the figure and turn every panel's layers into pixel-space draw commands.
pub fn compile_scene(
    spec: &ResolvedSpec,
    data: &RenderData,
    scales: &ScaleSet,
    legends: &[Legend],
    width: u32,
    height: u32,
) -> SceneGraph {
    let theme = &spec.theme;
    let mut commands = Vec::new();

    if let Some(color) = theme.plot_background.border_color {
        commands.push(DrawCommand::Rect {
            tl: (0.0, 0.0),
            br: (width as f64, height as f64),
            fill: None,
            stroke: Some(Stroke {
                paint: Paint::solid(color),
                width: theme.plot_background.border_width,
            }),
        });
    }

    let mut area = Bounds::new(MARGIN, MARGIN, width as f64 - MARGIN, height as f64 - MARGIN);
    compile_titles(&mut commands, spec, &mut area);
    let legend_commands = compile_legends(legends, theme, &mut area);
    compile_panels(&mut commands, spec, data, scales, area);
    commands.extend(legend_commands);

    debug!(commands = commands.len(), panels = data.panels.len(), "compiled scene graph");
    SceneGraph {
        width,
        height,
        background: theme.plot_background.fill,
        commands,
    }
}

fn compile_titles(out: &mut Vec<DrawCommand>, spec: &ResolvedSpec, area: &mut Bounds) {
    let theme = &spec.theme;
    let title = &theme.plot_title;
    let x = area.left + title.hjust * area.width();

    if let Some(text) = &spec.labels.title {
        out.push(text_command(text, (x, area.top), title, anchor_for(title.hjust), VAnchor::Top, false));
        area.top += title.size * 1.2 + GAP;
    }
    if let Some(text) = &spec.labels.subtitle {
        let style = ResolvedText {
            size: title.size * 0.8,
            face: FontFace::Plain,
            ..title.clone()
        };
        out.push(text_command(text, (x, area.top), &style, anchor_for(title.hjust), VAnchor::Top, false));
        area.top += style.size * 1.2 + GAP;
    }
    if let Some(text) = &spec.labels.caption {
        let style = ResolvedText {
            size: theme.axis_text.size * 0.9,
            ..theme.axis_text.clone()
        };
        out.push(text_command(text, (area.right, area.bottom), &style, HAnchor::Right, VAnchor::Bottom, false));
        area.bottom -= style.size * 1.2 + GAP;
    }
    *area = Bounds::new(area.left, area.top, area.right, area.bottom);
}

// =============================================================================
// Legends
// =============================================================================

fn legend_size(legend: &Legend, theme: &ResolvedTheme) -> (f64, f64) {
    let size = theme.legend_text.size;
    let title_h = size * 1.4;
    match legend {
        Legend::Keys { title, keys, .. } => {
            let labels = keys.iter().map(|k| text_width(&k.label, size)).fold(0.0, f64::max);
            (
                text_width(title, size).max(KEY_SIZE + GAP + labels),
                title_h + keys.len() as f64 * KEY_ROW,
            )
        }
        Legend::ColorBar { title, breaks, .. } => {
            let labels = breaks.iter().map(|(_, l)| text_width(l, size)).fold(0.0, f64::max);
            (
                text_width(title, size).max(COLORBAR_WIDTH + GAP + labels),
                title_h + COLORBAR_HEIGHT,
            )
        }
    }
}

/// Reserve space for the legends on the themed side and emit their commands.
fn compile_legends(legends: &[Legend], theme: &ResolvedTheme, area: &mut Bounds) -> Vec<DrawCommand> {
    let mut out = Vec::new();
    if legends.is_empty() || !theme.legend_show {
        return out;
    }
    let sizes: Vec<(f64, f64)> = legends.iter().map(|l| legend_size(l, theme)).collect();
    let spacing = LEGEND_SPACING * (legends.len() - 1) as f64;

    match theme.legend_position {
        LegendPosition::Right | LegendPosition::Left => {
            let width = sizes.iter().map(|s| s.0).fold(0.0, f64::max);
            let height = sizes.iter().map(|s| s.1).sum::<f64>() + spacing;
            let x = if theme.legend_position == LegendPosition::Right {
                area.right - width
            } else {
                area.left
            };
            let mut y = area.top + ((area.height() - height) / 2.0).max(0.0);
            for (legend, (_, h)) in legends.iter().zip(&sizes) {
                draw_legend(&mut out, legend, (x, y), theme);
                y += h + LEGEND_SPACING;
            }
            if theme.legend_position == LegendPosition::Right {
                area.right -= width + 2.0 * GAP;
            } else {
                area.left += width + 2.0 * GAP;
            }
        }
        LegendPosition::Top | LegendPosition::Bottom => {
            let width = sizes.iter().map(|s| s.0).sum::<f64>() + spacing;
            let height = sizes.iter().map(|s| s.1).fold(0.0, f64::max);
            let y = if theme.legend_position == LegendPosition::Top {
                area.top
            } else {
                area.bottom - height
            };
            let mut x = area.left + ((area.width() - width) / 2.0).max(0.0);
            for (legend, (w, _)) in legends.iter().zip(&sizes) {
                draw_legend(&mut out, legend, (x, y), theme);
                x += w + LEGEND_SPACING;
            }
            if theme.legend_position == LegendPosition::Top {
                area.top += height + 2.0 * GAP;
            } else {
                area.bottom -= height + 2.0 * GAP;
            }
        }
        LegendPosition::None => {}
    }
    *area = Bounds::new(area.left, area.top, area.right, area.bottom);
    out
}

fn draw_legend(out: &mut Vec<DrawCommand>, legend: &Legend, origin: (f64, f64), theme: &ResolvedTheme) {
    let text = &theme.legend_text;
    let title_style = ResolvedText {
        face: FontFace::Bold,
        ..text.clone()
    };
    let (x, y) = origin;
    out.push(text_command(legend.title(), (x, y), &title_style, HAnchor::Left, VAnchor::Top, false));
    let top = y + text.size * 1.4;

    match legend {
        Legend::Keys { glyph, keys, .. } => {
            for (i, key) in keys.iter().enumerate() {
                let cy = top + i as f64 * KEY_ROW + KEY_ROW / 2.0;
                let half = KEY_SIZE / 2.0;
                out.push(DrawCommand::Rect {
                    tl: (x, cy - half),
                    br: (x + KEY_SIZE, cy + half),
                    fill: Some(Paint::solid(theme.panel_background.fill)),
                    stroke: None,
                });
                let alpha = key.alpha.unwrap_or(1.0);
                let center = (x + half, cy);
                match glyph {
                    Glyph::Point => out.push(DrawCommand::Marker {
                        center,
                        radius: key.size.unwrap_or(3.0).min(half),
                        shape: key.shape.unwrap_or(PointShape::Circle),
                        paint: Paint {
                            color: key.color.or(key.fill).unwrap_or(palette::DEFAULT_INK),
                            alpha,
                        },
                    }),
                    Glyph::Rect => out.push(DrawCommand::Rect {
                        tl: (x + 2.0, cy - half + 2.0),
                        br: (x + KEY_SIZE - 2.0, cy + half - 2.0),
                        fill: Some(Paint {
                            color: key.fill.or(key.color).unwrap_or(palette::DEFAULT_FILL),
                            alpha,
                        }),
                        stroke: key.fill.and(key.color).map(|c| Stroke {
                            paint: Paint::solid(c),
                            width: 1.0,
                        }),
                    }),
                    Glyph::Line => out.push(DrawCommand::Path {
                        points: vec![(x + 1.0, cy), (x + KEY_SIZE - 1.0, cy)],
                        stroke: Stroke {
                            paint: Paint {
                                color: key.color.unwrap_or(palette::DEFAULT_INK),
                                alpha,
                            },
                            width: key.size.unwrap_or(1.5).min(half),
                        },
                    }),
                }
                out.push(text_command(
                    &key.label,
                    (x + KEY_SIZE + GAP, cy),
                    text,
                    HAnchor::Left,
                    VAnchor::Center,
                    false,
                ));
            }
        }
        Legend::ColorBar { low, high, breaks, .. } => {
            let step = COLORBAR_HEIGHT / COLORBAR_STEPS as f64;
            for k in 0..COLORBAR_STEPS {
                let t = (k as f64 + 0.5) / COLORBAR_STEPS as f64;
                let bottom = top + COLORBAR_HEIGHT - k as f64 * step;
                out.push(DrawCommand::Rect {
                    tl: (x, bottom - step),
                    br: (x + COLORBAR_WIDTH, bottom),
                    fill: Some(Paint::solid(palette::interpolate(*low, *high, t))),
                    stroke: None,
                });
            }
            for (fraction, label) in breaks {
                let by = top + (1.0 - fraction) * COLORBAR_HEIGHT;
                out.push(DrawCommand::Path {
                    points: vec![(x, by), (x + COLORBAR_WIDTH * 0.25, by)],
                    stroke: Stroke {
                        paint: Paint::solid(WHITE),
                        width: 1.0,
                    },
                });
                out.push(text_command(
                    label,
                    (x + COLORBAR_WIDTH + GAP, by),
                    text,
                    HAnchor::Left,
                    VAnchor::Center,
                    false,
                ));
            }
        }
    }
}

// =============================================================================
// Panels
// =============================================================================

/// Axis title: explicit label, then the scale name, then the trained column.
fn axis_title(spec: &ResolvedSpec, channel: Channel, scale: &ResolvedScale) -> Option<String> {
    let label = match channel {
        Channel::X => spec.labels.x.clone(),
        _ => spec.labels.y.clone(),
    };
    label
        .or_else(|| scale.title.clone())
        .or_else(|| scale.column.clone())
        .filter(|t| !t.is_empty())
}

/// Break positions on the unit interval with their labels.
fn break_units(scale: &ResolvedScale) -> Vec<(f64, String)> {
    scale
        .breaks()
        .into_iter()
        .map(|b| (scale.rescale(b.value), b.label))
        .filter(|(u, _)| (-1e-9..=1.0 + 1e-9).contains(u))
        .collect()
}

/// Minor grid positions halfway between continuous breaks.
fn minor_units(scale: &ResolvedScale) -> Vec<f64> {
    if scale.is_discrete() {
        return Vec::new();
    }
    scale
        .breaks()
        .windows(2)
        .map(|w| scale.rescale((w[0].value + w[1].value) / 2.0))
        .filter(|u| (0.0..=1.0).contains(u))
        .collect()
}

fn has_panel_at(layout: &FacetLayout, row: usize, col: usize) -> bool {
    layout.slots.iter().any(|s| s.row == row && s.col == col)
}

fn compile_panels(out: &mut Vec<DrawCommand>, spec: &ResolvedSpec, data: &RenderData, scales: &ScaleSet, mut area: Bounds) {
    let theme = &spec.theme;
    let layout = &data.layout;
    let flipped = spec.coord.is_flipped();
    let mode = spec.facet.as_ref().map_or(FacetScales::Fixed, |f| f.scales());
    let free_x = matches!(mode, FacetScales::FreeX | FacetScales::Free);
    let free_y = matches!(mode, FacetScales::FreeY | FacetScales::Free);
    let (h_free, v_free) = if flipped { (free_y, free_x) } else { (free_x, free_y) };

    let vertical_of = |i: usize| scales.panels.get(i).map(|p| if flipped { &p.x } else { &p.y });
    let widest_label = (0..scales.panels.len())
        .filter_map(vertical_of)
        .flat_map(break_units)
        .map(|(_, label)| text_width(&label, theme.axis_text.size))
        .fold(0.0, f64::max);
    let h_band = TICK_LENGTH + GAP + theme.axis_text.size * 1.2;
    let v_band = TICK_LENGTH + GAP + widest_label;

    let (h_title, v_title) = match scales.panels.first() {
        Some(p) if flipped => (axis_title(spec, Channel::Y, &p.y), axis_title(spec, Channel::X, &p.x)),
        Some(p) => (axis_title(spec, Channel::X, &p.x), axis_title(spec, Channel::Y, &p.y)),
        None => (None, None),
    };
    let title_size = theme.axis_title.size;
    let h_title_y = area.bottom;
    if h_title.is_some() {
        area.bottom -= title_size * 1.2 + GAP;
    }
    let v_title_x = area.left;
    if v_title.is_some() {
        area.left += title_size * 1.2 + GAP;
    }

    let strip = theme.strip_text.size * 1.8;
    let strip_h = if layout.slots.iter().any(|s| s.title.is_some()) { strip } else { 0.0 };
    let strip_w = if layout.slots.iter().any(|s| s.row_label.is_some()) { strip + 2.0 } else { 0.0 };

    let grid = Bounds::new(
        area.left + if v_free { 0.0 } else { v_band },
        area.top,
        area.right - strip_w,
        area.bottom - if h_free { 0.0 } else { h_band },
    );
    let (nrow, ncol) = (layout.nrow.max(1), layout.ncol.max(1));
    let cell_w = ((grid.width() - (ncol - 1) as f64 * PANEL_SPACING) / ncol as f64).max(1.0);
    let cell_h = ((grid.height() - (nrow - 1) as f64 * PANEL_SPACING) / nrow as f64).max(1.0);

    if let Some(title) = &h_title {
        out.push(text_command(
            title,
            ((grid.left + grid.right) / 2.0, h_title_y),
            &theme.axis_title,
            HAnchor::Center,
            VAnchor::Bottom,
            false,
        ));
    }
    if let Some(title) = &v_title {
        out.push(text_command(
            title,
            (v_title_x + title_size * 0.6, (grid.top + grid.bottom) / 2.0),
            &theme.axis_title,
            HAnchor::Center,
            VAnchor::Center,
            true,
        ));
    }

    for (i, panel) in data.panels.iter().enumerate() {
        let Some(panel_scales) = scales.panels.get(i) else {
            continue;
        };
        let (row, col) = layout.slots.get(i).map_or((0, 0), |s| (s.row, s.col));
        let cx = grid.left + col as f64 * (cell_w + PANEL_SPACING);
        let cy = grid.top + row as f64 * (cell_h + PANEL_SPACING);
        let frame = PanelFrame {
            bounds: Bounds::new(
                cx + if v_free { v_band } else { 0.0 },
                cy + strip_h,
                cx + cell_w,
                cy + cell_h - if h_free { h_band } else { 0.0 },
            ),
            coord: &spec.coord,
            x: &panel_scales.x,
            y: &panel_scales.y,
        };
        let b = frame.bounds;

        out.push(rect_command(b.min(), b.max(), &theme.panel_background));
        compile_grid(out, &frame, theme);

        for layer_frame in &panel.layers {
            if let Some(layer) = spec.layers.get(layer_frame.layer) {
                compile_layer(out, &frame, layer, layer_frame, &scales.aesthetics);
            }
        }

        let draw_h = h_free || row + 1 == nrow || !has_panel_at(layout, row + 1, col);
        let draw_v = v_free || col == 0;
        if draw_h {
            compile_horizontal_axis(out, &frame, theme);
        }
        if draw_v {
            compile_vertical_axis(out, &frame, theme);
        }

        let slot = layout.slots.get(i);
        if let Some(title) = slot.and_then(|s| s.title.as_ref()) {
            out.push(rect_command((b.left, cy), (b.right, b.top), &theme.strip_background));
            out.push(text_command(
                title,
                ((b.left + b.right) / 2.0, (cy + b.top) / 2.0),
                &theme.strip_text,
                HAnchor::Center,
                VAnchor::Center,
                false,
            ));
        }
        if let Some(label) = slot.and_then(|s| s.row_label.as_ref()) {
            let (x0, x1) = (b.right + 2.0, b.right + strip_w);
            out.push(rect_command((x0, b.top), (x1, b.bottom), &theme.strip_background));
            out.push(text_command(
                label,
                ((x0 + x1) / 2.0, (b.top + b.bottom) / 2.0),
                &theme.strip_text,
                HAnchor::Center,
                VAnchor::Center,
                true,
            ));
        }
    }
}

fn compile_grid(out: &mut Vec<DrawCommand>, frame: &PanelFrame, theme: &ResolvedTheme) {
    let b = frame.bounds;
    let vertical_line = |u: f64| {
        let x = b.left + u * b.width();
        ((x, b.top), (x, b.bottom))
    };
    let horizontal_line = |u: f64| {
        let y = b.top + (1.0 - u) * b.height();
        ((b.left, y), (b.right, y))
    };

    if let Some(minor) = &theme.panel_grid_minor {
        for u in minor_units(frame.horizontal()) {
            let (a, c) = vertical_line(u);
            out.push(line_command(a, c, minor));
        }
        for u in minor_units(frame.vertical()) {
            let (a, c) = horizontal_line(u);
            out.push(line_command(a, c, minor));
        }
    }
    if let Some(major) = &theme.panel_grid_major {
        for (u, _) in break_units(frame.horizontal()) {
            let (a, c) = vertical_line(u);
            out.push(line_command(a, c, major));
        }
        for (u, _) in break_units(frame.vertical()) {
            let (a, c) = horizontal_line(u);
            out.push(line_command(a, c, major));
        }
    }
}

fn compile_horizontal_axis(out: &mut Vec<DrawCommand>, frame: &PanelFrame, theme: &ResolvedTheme) {
    let b = frame.bounds;
    if let Some(line) = &theme.axis_line {
        out.push(line_command((b.left, b.bottom), (b.right, b.bottom), line));
    }
    for (u, label) in break_units(frame.horizontal()) {
        let x = b.left + u * b.width();
        if let Some(ticks) = &theme.axis_ticks {
            out.push(line_command((x, b.bottom), (x, b.bottom + TICK_LENGTH), ticks));
        }
        out.push(text_command(
            &label,
            (x, b.bottom + TICK_LENGTH + 2.0),
            &theme.axis_text,
            HAnchor::Center,
            VAnchor::Top,
            false,
        ));
    }
}

fn compile_vertical_axis(out: &mut Vec<DrawCommand>, frame: &PanelFrame, theme: &ResolvedTheme) {
    let b = frame.bounds;
    if let Some(line) = &theme.axis_line {
        out.push(line_command((b.left, b.top), (b.left, b.bottom), line));
    }
    for (u, label) in break_units(frame.vertical()) {
        let y = b.top + (1.0 - u) * b.height();
        if let Some(ticks) = &theme.axis_ticks {
            out.push(line_command((b.left - TICK_LENGTH, y), (b.left, y), ticks));
        }
        out.push(text_command(
            &label,
            (b.left - TICK_LENGTH - 2.0, y),
            &theme.axis_text,
            HAnchor::Right,
            VAnchor::Center,
            false,
        ));
    }
}

// =============================================================================
// Per-row aesthetics
// =============================================================================

/// Resolves the visual attributes of one layer's rows from scales and fixed params.
struct Styler<'a> {
    geom: Geom,
    layer: &'a ResolvedLayer,
    frame: &'a LayerFrame,
    scales: &'a BTreeMap<Channel, ResolvedScale>,
}

impl<'a> Styler<'a> {
    fn mapped(&self, channel: Channel, row: usize) -> Option<(&'a ResolvedScale, &'a Value)> {
        let column = self.frame.mapping.column(channel)?;
        let values = &self.frame.table.column(column)?.values;
        Some((self.scales.get(&channel)?, values.get(row)?))
    }

    fn mapped_color(&self, channel: Channel, row: usize) -> Option<RGBColor> {
        self.frame.mapping.column(channel)?;
        Some(self.mapped(channel, row).and_then(|(s, v)| s.color(v)).unwrap_or(NA_COLOR))
    }

    fn mapped_number(&self, channel: Channel, row: usize) -> Option<f64> {
        self.mapped(channel, row).and_then(|(s, v)| s.number(v))
    }

    /// Colour given by a mapping or a fixed attribute.
    fn explicit_color(&self, row: usize) -> Option<RGBColor> {
        self.mapped_color(Channel::Color, row)
            .or_else(|| self.layer.params.color.as_deref().and_then(parse_color))
    }

    fn explicit_fill(&self, row: usize) -> Option<RGBColor> {
        self.mapped_color(Channel::Fill, row)
            .or_else(|| self.layer.params.fill.as_deref().and_then(parse_color))
    }

    fn ink(&self, row: usize) -> RGBColor {
        self.explicit_color(row).unwrap_or(palette::DEFAULT_INK)
    }

    fn fill(&self, row: usize) -> RGBColor {
        self.explicit_fill(row).unwrap_or_else(|| match self.geom {
            Geom::Boxplot | Geom::Violin => WHITE,
            _ => self.explicit_color(row).unwrap_or(palette::DEFAULT_FILL),
        })
    }

    /// Outline of filled shapes; only drawn when both colour and fill are set.
    fn outline(&self, row: usize) -> Option<RGBColor> {
        match self.geom {
            Geom::Boxplot | Geom::Violin => Some(self.explicit_color(row).unwrap_or(BOX_OUTLINE)),
            _ => self.explicit_fill(row).and(self.explicit_color(row)),
        }
    }

    fn alpha(&self, row: usize) -> f64 {
        self.mapped_number(Channel::Alpha, row)
            .or(self.layer.params.alpha)
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    fn size(&self, row: usize, default: f64) -> f64 {
        self.mapped_number(Channel::Size, row)
            .or(self.layer.params.size)
            .unwrap_or(default)
    }

    fn shape(&self, row: usize) -> PointShape {
        self.mapped(Channel::Shape, row)
            .and_then(|(s, v)| s.shape(v))
            .or_else(|| self.layer.params.shape.as_deref().and_then(|s| s.parse().ok()))
            .unwrap_or(PointShape::Circle)
    }

    fn linewidth(&self, default: f64) -> f64 {
        self.layer.params.linewidth.unwrap_or(default)
    }

    fn paint(&self, color: RGBColor, row: usize) -> Paint {
        Paint {
            color,
            alpha: self.alpha(row),
        }
    }
}

// =============================================================================
// Geoms
// =============================================================================

/// Transformed-space positions of a mapped channel, per row.
fn positions(frame: &LayerFrame, channel: Channel, scale: &ResolvedScale) -> Vec<Option<f64>> {
    match frame.mapping.column(channel) {
        Some(name) => named_positions(frame, name, scale),
        None => vec![None; frame.table.num_rows()],
    }
}

fn named_positions(frame: &LayerFrame, name: &str, scale: &ResolvedScale) -> Vec<Option<f64>> {
    match frame.table.column(name) {
        Some(col) => col.values.iter().map(|v| scale.position(v)).collect(),
        None => vec![None; frame.table.num_rows()],
    }
}

/// Horizontal extent of each bar/box: category slot ± width/2, or the stat's x extents.
fn x_extents(frame: &LayerFrame, scale: &ResolvedScale, width: f64) -> Vec<Option<(f64, f64)>> {
    let centers = positions(frame, Channel::X, scale);
    let half = width / 2.0;
    if !scale.is_discrete() && frame.table.has_column(XMIN_COLUMN) && frame.table.has_column(XMAX_COLUMN) {
        let lo = named_positions(frame, XMIN_COLUMN, scale);
        let hi = named_positions(frame, XMAX_COLUMN, scale);
        return lo.into_iter().zip(hi).map(|(a, b)| Some((a?, b?))).collect();
    }
    centers.into_iter().map(|c| c.map(|c| (c - half, c + half))).collect()
}

/// `(rank, occupants)` of each row among the groups sharing its x value.
fn dodge_slots(frame: &LayerFrame) -> Vec<(usize, usize)> {
    let table = &frame.table;
    let x_name = frame.mapping.column(Channel::X);
    let group_cols: Vec<_> = stat::grouping_columns(table, &frame.mapping)
        .into_iter()
        .filter(|c| Some(c.as_str()) != x_name)
        .filter_map(|c| table.column(&c))
        .collect();
    let x_col = x_name.and_then(|c| table.column(c));

    let keys: Vec<(String, Vec<String>)> = (0..table.num_rows())
        .map(|row| {
            let x = x_col.map(|c| c.values[row].key()).unwrap_or_default();
            (x, group_cols.iter().map(|c| c.values[row].key()).collect())
        })
        .collect();

    let mut occupancy: BTreeMap<&str, Vec<&[String]>> = BTreeMap::new();
    for (x, group) in &keys {
        let occupants = occupancy.entry(x.as_str()).or_default();
        if !occupants.contains(&group.as_slice()) {
            occupants.push(group.as_slice());
        }
    }
    keys.iter()
        .map(|(x, group)| {
            occupancy.get(x.as_str()).map_or((0, 1), |occupants| {
                let rank = occupants.iter().position(|g| *g == group.as_slice()).unwrap_or(0);
                (rank, occupants.len().max(1))
            })
        })
        .collect()
}

fn dodge(extent: (f64, f64), slot: (usize, usize)) -> (f64, f64) {
    let (rank, count) = slot;
    let width = (extent.1 - extent.0) / count as f64;
    let start = extent.0 + rank as f64 * width;
    (start, start + width)
}

fn compile_layer(
    out: &mut Vec<DrawCommand>,
    panel: &PanelFrame,
    layer: &ResolvedLayer,
    frame: &LayerFrame,
    scales: &BTreeMap<Channel, ResolvedScale>,
) {
    let styler = Styler {
        geom: layer.geom,
        layer,
        frame,
        scales,
    };
    match layer.geom {
        Geom::Point => compile_points(out, panel, frame, &styler),
        Geom::Line => compile_lines(out, panel, frame, &styler),
        Geom::Area => compile_areas(out, panel, frame, &styler),
        Geom::Bar => compile_bars(out, panel, frame, &styler),
        Geom::Boxplot => compile_boxplots(out, panel, frame, &styler),
        Geom::Violin => compile_violins(out, panel, frame, &styler),
        Geom::Segment => compile_segments(out, panel, frame, &styler),
        Geom::Text => compile_labels(out, panel, frame, &styler),
        Geom::Polygon => compile_polygons(out, panel, frame, &styler),
    }
}

fn compile_points(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let xs = positions(frame, Channel::X, panel.x);
    let ys = positions(frame, Channel::Y, panel.y);
    for (row, (x, y)) in xs.into_iter().zip(ys).enumerate() {
        let (Some(x), Some(y)) = (x, y) else {
            continue;
        };
        let center = panel.pixel(x, y);
        if !panel.bounds.contains(center) {
            continue;
        }
        out.push(DrawCommand::Marker {
            center,
            radius: styler.size(row, 3.0),
            shape: styler.shape(row),
            paint: styler.paint(styler.ink(row), row),
        });
    }
}

fn compile_lines(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let xs = positions(frame, Channel::X, panel.x);
    let ys = positions(frame, Channel::Y, panel.y);
    for rows in row_groups(&frame.table, &frame.mapping) {
        let Some(&first) = rows.first() else {
            continue;
        };
        let mut points: Vec<(f64, f64)> = rows.iter().filter_map(|&r| Some((xs[r]?, ys[r]?))).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let pixels: Vec<(f64, f64)> = points.iter().map(|&(x, y)| panel.pixel(x, y)).collect();
        let stroke = Stroke {
            paint: styler.paint(styler.ink(first), first),
            width: styler.linewidth(1.5),
        };
        for run in clip_polyline(&pixels, panel.bounds.min(), panel.bounds.max()) {
            if run.len() >= 2 {
                out.push(DrawCommand::Path { points: run, stroke });
            }
        }
    }
}

fn compile_areas(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let xs = positions(frame, Channel::X, panel.x);
    let ys = positions(frame, Channel::Y, panel.y);
    let lows = positions(frame, Channel::Ymin, panel.y);
    let baseline = panel.baseline();

    for rows in row_groups(&frame.table, &frame.mapping) {
        let Some(&first) = rows.first() else {
            continue;
        };
        let mut points: Vec<(f64, f64, f64)> = rows
            .iter()
            .filter_map(|&r| Some((xs[r]?, ys[r]?, lows[r].unwrap_or(baseline))))
            .collect();
        if points.len() < 2 {
            continue;
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let upper: Vec<(f64, f64)> = points.iter().map(|p| panel.pixel(p.0, p.1)).collect();
        let mut ring = upper.clone();
        ring.extend(points.iter().rev().map(|p| panel.pixel(p.0, p.2)));
        let clipped = clip_polygon(&ring, panel.bounds.min(), panel.bounds.max());
        if clipped.len() >= 3 {
            out.push(DrawCommand::Polygon {
                points: clipped,
                fill: styler.paint(styler.fill(first), first),
                stroke: None,
            });
        }
        if let Some(color) = styler.explicit_color(first) {
            let stroke = Stroke {
                paint: styler.paint(color, first),
                width: styler.linewidth(1.0),
            };
            for run in clip_polyline(&upper, panel.bounds.min(), panel.bounds.max()) {
                if run.len() >= 2 {
                    out.push(DrawCommand::Path { points: run, stroke });
                }
            }
        }
    }
}

fn compile_bars(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let width = styler.layer.params.width.unwrap_or(DEFAULT_BAR_WIDTH);
    let extents = x_extents(frame, panel.x, width);
    let tops = positions(frame, Channel::Y, panel.y);
    let bases = positions(frame, Channel::Ymin, panel.y);
    let baseline = panel.baseline();
    let slots = (styler.layer.position == Position::Dodge).then(|| dodge_slots(frame));

    for row in 0..frame.table.num_rows() {
        let (Some(extent), Some(top)) = (extents[row], tops[row]) else {
            continue;
        };
        let (x0, x1) = match &slots {
            Some(slots) => dodge(extent, slots[row]),
            None => extent,
        };
        let base = bases[row].unwrap_or(baseline);
        let Some((tl, br)) = panel.bounds.clip_rect(panel.pixel(x0, top), panel.pixel(x1, base)) else {
            continue;
        };
        out.push(DrawCommand::Rect {
            tl,
            br,
            fill: Some(styler.paint(styler.fill(row), row)),
            stroke: styler.outline(row).map(|c| Stroke {
                paint: styler.paint(c, row),
                width: styler.linewidth(0.5),
            }),
        });
    }
}

/// Box-and-whisker primitives in transformed data space (x along the category axis).
struct BoxplotGeometry {
    lower_whisker: [(f64, f64); 2],
    upper_whisker: [(f64, f64); 2],
    min_cap: [(f64, f64); 2],
    max_cap: [(f64, f64); 2],
    box_corners: [(f64, f64); 2],
    median_line: [(f64, f64); 2],
    outlier_points: Vec<(f64, f64)>,
}

#[allow(clippy::too_many_arguments)]
fn compute_boxplot_geometry(
    x: f64,
    width: f64,
    min: f64,
    q1: f64,
    median: f64,
    q3: f64,
    max: f64,
    outliers: &[f64],
) -> BoxplotGeometry {
    let half_width = width / 2.0;
    let cap_half = width * 0.4 / 2.0;
    BoxplotGeometry {
        lower_whisker: [(x, min), (x, q1)],
        upper_whisker: [(x, q3), (x, max)],
        min_cap: [(x - cap_half, min), (x + cap_half, min)],
        max_cap: [(x - cap_half, max), (x + cap_half, max)],
        box_corners: [(x - half_width, q3), (x + half_width, q1)],
        median_line: [(x - half_width, median), (x + half_width, median)],
        outlier_points: outliers.iter().map(|&v| (x, v)).collect(),
    }
}

fn compile_boxplots(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let width = styler.layer.params.width.unwrap_or(DEFAULT_BOX_WIDTH);
    let extents = x_extents(frame, panel.x, width);
    let slots = dodge_slots(frame);
    let mins = positions(frame, Channel::Ymin, panel.y);
    let medians = positions(frame, Channel::Y, panel.y);
    let maxs = positions(frame, Channel::Ymax, panel.y);
    let lowers = named_positions(frame, "lower", panel.y);
    let uppers = named_positions(frame, "upper", panel.y);

    for row in 0..frame.table.num_rows() {
        let (Some(extent), Some(min), Some(q1), Some(median), Some(q3), Some(max)) =
            (extents[row], mins[row], lowers[row], medians[row], uppers[row], maxs[row])
        else {
            continue;
        };
        let (x0, x1) = dodge(extent, slots[row]);
        let outliers: Vec<f64> = frame
            .samples
            .get(row)
            .map(|s| s.iter().filter_map(|(v, _)| panel.y.transform_raw(*v)).collect())
            .unwrap_or_default();
        let geom = compute_boxplot_geometry((x0 + x1) / 2.0, x1 - x0, min, q1, median, q3, max, &outliers);

        let outline = styler.outline(row).unwrap_or(BOX_OUTLINE);
        let stroke = Stroke {
            paint: Paint::solid(outline),
            width: styler.linewidth(1.0),
        };
        for [a, b] in [geom.lower_whisker, geom.upper_whisker, geom.min_cap, geom.max_cap] {
            panel.push_segment(out, a, b, stroke);
        }
        let [a, b] = geom.box_corners;
        if let Some((tl, br)) = panel.bounds.clip_rect(panel.pixel(a.0, a.1), panel.pixel(b.0, b.1)) {
            out.push(DrawCommand::Rect {
                tl,
                br,
                fill: Some(styler.paint(styler.fill(row), row)),
                stroke: Some(stroke),
            });
        }
        let [a, b] = geom.median_line;
        panel.push_segment(
            out,
            a,
            b,
            Stroke {
                width: stroke.width * 2.0,
                ..stroke
            },
        );
        for (x, y) in geom.outlier_points {
            let center = panel.pixel(x, y);
            if panel.bounds.contains(center) {
                out.push(DrawCommand::Marker {
                    center,
                    radius: 2.0,
                    shape: PointShape::Circle,
                    paint: Paint::solid(outline),
                });
            }
        }
    }
}

fn compile_violins(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let width = styler.layer.params.width.unwrap_or(DEFAULT_BAR_WIDTH);
    let extents = x_extents(frame, panel.x, width);
    let slots = dodge_slots(frame);
    let medians = positions(frame, Channel::Y, panel.y);

    for row in 0..frame.table.num_rows() {
        let Some(extent) = extents[row] else {
            continue;
        };
        let (x0, x1) = dodge(extent, slots[row]);
        let (center, half) = ((x0 + x1) / 2.0, (x1 - x0) / 2.0);
        let curve: Vec<(f64, f64)> = frame
            .samples
            .get(row)
            .map(|s| {
                s.iter()
                    .filter_map(|&(y, w)| Some((panel.y.transform_raw(y)?, w)))
                    .collect()
            })
            .unwrap_or_default();
        if curve.len() < 2 {
            continue;
        }

        let mut ring: Vec<(f64, f64)> = curve.iter().map(|&(y, w)| panel.pixel(center + w * half, y)).collect();
        ring.extend(curve.iter().rev().map(|&(y, w)| panel.pixel(center - w * half, y)));
        let outline = styler.outline(row).unwrap_or(BOX_OUTLINE);
        let stroke = Stroke {
            paint: Paint::solid(outline),
            width: styler.linewidth(1.0),
        };
        let clipped = clip_polygon(&ring, panel.bounds.min(), panel.bounds.max());
        if clipped.len() >= 3 {
            out.push(DrawCommand::Polygon {
                points: clipped,
                fill: styler.paint(styler.fill(row), row),
                stroke: Some(stroke),
            });
        }

        if let Some(median) = medians[row] {
            let w = curve
                .iter()
                .min_by(|a, b| (a.0 - median).abs().total_cmp(&(b.0 - median).abs()))
                .map_or(0.0, |c| c.1);
            panel.push_segment(out, (center - w * half, median), (center + w * half, median), stroke);
        }
    }
}

fn compile_segments(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let xs = positions(frame, Channel::X, panel.x);
    let ys = positions(frame, Channel::Y, panel.y);
    let xends = positions(frame, Channel::Xend, panel.x);
    let yends = positions(frame, Channel::Yend, panel.y);
    for row in 0..frame.table.num_rows() {
        let (Some(x), Some(y), Some(xend), Some(yend)) = (xs[row], ys[row], xends[row], yends[row]) else {
            continue;
        };
        let stroke = Stroke {
            paint: styler.paint(styler.ink(row), row),
            width: styler.linewidth(1.0),
        };
        panel.push_segment(out, (x, y), (xend, yend), stroke);
    }
}

fn compile_labels(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let n = frame.table.num_rows();
    let labels: Vec<Option<String>> = match frame.mapping.get(Channel::Label) {
        Some(AestheticValue::Mapped(name)) => match frame.table.column(name) {
            Some(col) => col.values.iter().map(|v| (!v.is_null()).then(|| v.key())).collect(),
            None => vec![None; n],
        },
        Some(AestheticValue::Fixed(constant)) => vec![Some(constant.as_text()); n],
        None => vec![None; n],
    };
    let xs = positions(frame, Channel::X, panel.x);
    let ys = positions(frame, Channel::Y, panel.y);

    for row in 0..n {
        let (Some(x), Some(y), Some(text)) = (xs[row], ys[row], &labels[row]) else {
            continue;
        };
        let pos = panel.pixel(x, y);
        if !panel.bounds.contains(pos) {
            continue;
        }
        let size = styler
            .mapped_number(Channel::Size, row)
            .map(|s| s * 3.0)
            .or(styler.layer.params.size)
            .unwrap_or(12.0);
        out.push(DrawCommand::Text {
            pos,
            text: text.clone(),
            style: TextStyle {
                family: "sans-serif".to_string(),
                size,
                color: styler.ink(row),
                face: FontFace::Plain,
                h: HAnchor::Center,
                v: VAnchor::Center,
                rotated: false,
            },
        });
    }
}

fn compile_polygons(out: &mut Vec<DrawCommand>, panel: &PanelFrame, frame: &LayerFrame, styler: &Styler) {
    let xs = positions(frame, Channel::X, panel.x);
    let ys = positions(frame, Channel::Y, panel.y);
    for rows in row_groups(&frame.table, &frame.mapping) {
        let Some(&first) = rows.first() else {
            continue;
        };
        let ring: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|&r| Some(panel.pixel(xs[r]?, ys[r]?)))
            .collect();
        let clipped = clip_polygon(&ring, panel.bounds.min(), panel.bounds.max());
        if clipped.len() < 3 {
            continue;
        }
        out.push(DrawCommand::Polygon {
            points: clipped,
            fill: styler.paint(styler.fill(first), first),
            stroke: styler.explicit_color(first).map(|c| Stroke {
                paint: Paint::solid(c),
                width: styler.linewidth(0.5),
            }),
        });
    }
}
