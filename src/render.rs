//! Scene graph execution on plotters backends.
//!
//! The backend draws commands in order and knows nothing about data, scales or layout.

use crate::error::{PlotError, Result};
use crate::ir::{self, DrawCommand, HAnchor, Paint, SceneGraph, Stroke, VAnchor};
use crate::palette::PointShape;
use crate::theme::FontFace;
use crate::OutputFormat;
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontStyle, FontTransform, RGBAColor};
use tracing::{debug, warn};

/// Draw a scene graph and encode it in the requested format.
pub fn render(graph: &SceneGraph, format: OutputFormat) -> Result<Vec<u8>> {
    if graph.width == 0 || graph.height == 0 {
        return Err(PlotError::InvalidSpec(format!(
            "Output size must be positive, got {}x{}",
            graph.width, graph.height
        )));
    }
    let bytes = match format {
        OutputFormat::Png => render_png(graph)?,
        OutputFormat::Svg => render_svg(graph)?.into_bytes(),
    };
    debug!(?format, bytes = bytes.len(), "rendered scene graph");
    Ok(bytes)
}

fn render_png(graph: &SceneGraph) -> Result<Vec<u8>> {
    let (width, height) = (graph.width, graph.height);
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root, graph)?;
    }

    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes)
        .write_image(&buffer, width, height, image::ColorType::Rgb8)
        .map_err(|e| PlotError::Render(format!("Failed to encode PNG: {}", e)))?;
    Ok(png_bytes)
}

fn render_svg(graph: &SceneGraph) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (graph.width, graph.height)).into_drawing_area();
        draw(&root, graph)?;
    }
    Ok(svg)
}

fn backend_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> PlotError {
    PlotError::Render(e.to_string())
}

fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, graph: &SceneGraph) -> Result<()> {
    root.fill(&graph.background).map_err(backend_error)?;
    for command in &graph.commands {
        match command {
            DrawCommand::Text { pos, text, style } => {
                // Missing fonts should not cost the whole figure.
                if let Err(e) = root.draw(&Text::new(text.clone(), pixel(*pos), text_style(style))) {
                    warn!(text = %text, error = %e, "failed to draw text");
                }
            }
            other => draw_shape(root, other)?,
        }
    }
    root.present().map_err(backend_error)?;
    Ok(())
}

fn draw_shape<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, command: &DrawCommand) -> Result<()> {
    match command {
        DrawCommand::Rect { tl, br, fill, stroke } => {
            let corners = [pixel(*tl), pixel(*br)];
            if let Some(paint) = fill {
                root.draw(&Rectangle::new(corners, rgba(paint).filled()))
                    .map_err(backend_error)?;
            }
            if let Some(stroke) = stroke {
                root.draw(&Rectangle::new(corners, stroke_style(stroke)))
                    .map_err(backend_error)?;
            }
        }
        DrawCommand::Path { points, stroke } => {
            root.draw(&PathElement::new(pixels(points), stroke_style(stroke)))
                .map_err(backend_error)?;
        }
        DrawCommand::Polygon { points, fill, stroke } => {
            let ring = pixels(points);
            root.draw(&Polygon::new(ring.clone(), rgba(fill).filled()))
                .map_err(backend_error)?;
            if let Some(stroke) = stroke {
                let mut closed = ring;
                if let Some(&first) = closed.first() {
                    closed.push(first);
                }
                root.draw(&PathElement::new(closed, stroke_style(stroke)))
                    .map_err(backend_error)?;
            }
        }
        DrawCommand::Marker {
            center,
            radius,
            shape,
            paint,
        } => draw_marker(root, pixel(*center), *radius, *shape, paint)?,
        DrawCommand::Text { .. } => {}
    }
    Ok(())
}

fn draw_marker<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    (x, y): (i32, i32),
    radius: f64,
    shape: PointShape,
    paint: &Paint,
) -> Result<()> {
    let r = radius.round().max(1.0) as i32;
    let style = rgba(paint).filled();
    match shape {
        PointShape::Circle => root.draw(&Circle::new((x, y), r, style)),
        PointShape::Square => root.draw(&Rectangle::new([(x - r, y - r), (x + r, y + r)], style)),
        PointShape::Triangle => root.draw(&Polygon::new(vec![(x, y - r), (x + r, y + r), (x - r, y + r)], style)),
        PointShape::Diamond => root.draw(&Polygon::new(
            vec![(x, y - r), (x + r, y), (x, y + r), (x - r, y)],
            style,
        )),
        PointShape::Cross => {
            let stroke = rgba(paint).stroke_width(2);
            root.draw(&PathElement::new(vec![(x - r, y - r), (x + r, y + r)], stroke))
                .and_then(|_| root.draw(&PathElement::new(vec![(x - r, y + r), (x + r, y - r)], stroke)))
        }
    }
    .map_err(backend_error)
}

fn pixel((x, y): (f64, f64)) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

fn pixels(points: &[(f64, f64)]) -> Vec<(i32, i32)> {
    points.iter().copied().map(pixel).collect()
}

fn rgba(paint: &Paint) -> RGBAColor {
    paint.color.mix(paint.alpha)
}

fn stroke_style(stroke: &Stroke) -> ShapeStyle {
    rgba(&stroke.paint).stroke_width(stroke.width.round().max(1.0) as u32)
}

fn text_style(style: &ir::TextStyle) -> TextStyle<'_> {
    let font_style = match style.face {
        FontFace::Plain => FontStyle::Normal,
        FontFace::Bold | FontFace::BoldItalic => FontStyle::Bold,
        FontFace::Italic => FontStyle::Italic,
    };
    let mut font = FontDesc::new(FontFamily::from(style.family.as_str()), style.size, font_style);
    if style.rotated {
        font = font.transform(FontTransform::Rotate270);
    }
    let h = match style.h {
        HAnchor::Left => HPos::Left,
        HAnchor::Center => HPos::Center,
        HAnchor::Right => HPos::Right,
    };
    let v = match style.v {
        VAnchor::Top => VPos::Top,
        VAnchor::Center => VPos::Center,
        VAnchor::Bottom => VPos::Bottom,
    };
    font.color(&style.color).pos(Pos::new(h, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotters::style::RGBColor;

    fn graph() -> SceneGraph {
        SceneGraph {
            width: 60,
            height: 40,
            background: RGBColor(255, 255, 255),
            commands: vec![
                DrawCommand::Rect {
                    tl: (5.0, 5.0),
                    br: (30.0, 30.0),
                    fill: Some(Paint::solid(RGBColor(200, 0, 0))),
                    stroke: None,
                },
                DrawCommand::Path {
                    points: vec![(0.0, 0.0), (59.0, 39.0)],
                    stroke: Stroke {
                        paint: Paint::solid(RGBColor(0, 0, 0)),
                        width: 1.0,
                    },
                },
                DrawCommand::Marker {
                    center: (45.0, 20.0),
                    radius: 3.0,
                    shape: PointShape::Diamond,
                    paint: Paint {
                        color: RGBColor(0, 0, 255),
                        alpha: 0.5,
                    },
                },
            ],
        }
    }

    #[test]
    fn test_png_signature() {
        let bytes = render(&graph(), OutputFormat::Png).unwrap();
        assert_eq!(&bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_svg_document() {
        let bytes = render(&graph(), OutputFormat::Svg).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("polygon") || svg.contains("path"));
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut g = graph();
        g.width = 0;
        assert!(matches!(render(&g, OutputFormat::Png), Err(PlotError::InvalidSpec(_))));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let a = render(&graph(), OutputFormat::Png).unwrap();
        let b = render(&graph(), OutputFormat::Png).unwrap();
        assert_eq!(a, b);
    }
}
