//! The pipeline driver.
//!
//! `Plot::build` runs every phase that can fail (resolve, transform, scale training,
//! legends). Compiling and drawing the resulting plot is pure and repeatable.

use crate::compiler;
use crate::error::Result;
use crate::ir::{RenderData, ResolvedSpec, ScaleSet, SceneGraph};
use crate::legend::{self, Legend};
use crate::render;
use crate::resolve;
use crate::scale;
use crate::scene::Scene;
use crate::transform;
use crate::RenderOptions;
use tracing::{debug, info};

/// A fully resolved plot, ready to be drawn any number of times.
#[derive(Debug, Clone)]
pub struct Plot {
    spec: ResolvedSpec,
    data: RenderData,
    scales: ScaleSet,
    legends: Vec<Legend>,
}

impl Plot {
    pub(crate) fn build(scene: &Scene) -> Result<Plot> {
        // Phase 1: Resolution
        let spec = resolve::resolve_scene(scene)?;

        // Phase 2: Transformation (stats, projection, faceting, positions)
        let data = transform::apply_transformations(&spec)?;

        // Phase 3: Scale training
        let scales = scale::build_scales(&data, &spec)?;

        let legends = legend::build_legends(&spec, &scales);
        debug!(
            layers = spec.layers.len(),
            panels = data.panels.len(),
            legends = legends.len(),
            "built plot"
        );
        Ok(Plot {
            spec,
            data,
            scales,
            legends,
        })
    }

    pub fn panel_count(&self) -> usize {
        self.data.panels.len()
    }

    pub fn legends(&self) -> &[Legend] {
        &self.legends
    }

    pub fn scales(&self) -> &ScaleSet {
        &self.scales
    }

    /// Stat output per panel and layer.
    pub fn data(&self) -> &RenderData {
        &self.data
    }

    pub fn spec(&self) -> &ResolvedSpec {
        &self.spec
    }

    /// Lay the plot out at the requested size.
    pub fn scene_graph(&self, options: &RenderOptions) -> SceneGraph {
        compiler::compile_scene(
            &self.spec,
            &self.data,
            &self.scales,
            &self.legends,
            options.width,
            options.height,
        )
    }

    /// Draw the plot and encode it as PNG or SVG bytes.
    pub fn render(&self, options: &RenderOptions) -> Result<Vec<u8>> {
        let graph = self.scene_graph(options);
        let bytes = render::render(&graph, options.format)?;
        info!(
            width = options.width,
            height = options.height,
            format = ?options.format,
            bytes = bytes.len(),
            "rendered plot"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::Channel;
    use crate::data::{Column, Table};
    use crate::error::PlotError;
    use crate::facet::Facet;
    use crate::layer::{Layer, Position};
    use crate::OutputFormat;

    fn make_table() -> Table {
        Table::new(vec![
            Column::numeric("x", vec![1.0, 2.0, 3.0, 4.0]),
            Column::numeric("y", vec![10.0, 20.0, 15.0, 25.0]),
            Column::categorical("region", &["north", "south", "north", "south"]),
        ])
        .unwrap()
    }

    fn png_options() -> RenderOptions {
        RenderOptions {
            width: 320,
            height: 240,
            format: OutputFormat::Png,
        }
    }

    #[test]
    fn test_render_line_and_point() {
        let plot = Scene::new(make_table())
            .aes(Channel::X, "x")
            .aes(Channel::Y, "y")
            .layer(Layer::line())
            .layer(Layer::point().color("red"))
            .build()
            .unwrap();
        let bytes = plot.render(&png_options()).unwrap();
        assert_eq!(&bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_render_svg() {
        let plot = Scene::new(make_table())
            .aes(Channel::X, "region")
            .aes(Channel::Y, "y")
            .layer(Layer::col().aes(Channel::Fill, "region").position(Position::Stack))
            .build()
            .unwrap();
        let options = RenderOptions {
            format: OutputFormat::Svg,
            ..png_options()
        };
        let svg = String::from_utf8(plot.render(&options).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_render_is_repeatable() {
        let plot = Scene::new(make_table())
            .aes(Channel::X, "x")
            .aes(Channel::Y, "y")
            .layer(Layer::point().aes(Channel::Color, "region"))
            .build()
            .unwrap();
        assert_eq!(plot.render(&png_options()).unwrap(), plot.render(&png_options()).unwrap());
        assert_eq!(plot.scene_graph(&png_options()), plot.scene_graph(&png_options()));
    }

    #[test]
    fn test_facet_panel_count() {
        let plot = Scene::new(make_table())
            .aes(Channel::X, "x")
            .aes(Channel::Y, "y")
            .layer(Layer::point())
            .facet(Facet::wrap(&["region"]))
            .build()
            .unwrap();
        assert_eq!(plot.panel_count(), 2);
        assert_eq!(plot.scales().panels.len(), 2);
    }

    #[test]
    fn test_errors_surface_at_build() {
        let err = Scene::new(make_table())
            .aes(Channel::X, "x")
            .aes(Channel::Y, "missing")
            .layer(Layer::point())
            .build()
            .unwrap_err();
        assert!(matches!(err, PlotError::UnknownColumn { .. }));
    }

    #[test]
    fn test_empty_table_renders_one_panel() {
        let table = Table::new(vec![Column::numeric("x", vec![]), Column::numeric("y", vec![])]).unwrap();
        let plot = Scene::new(table)
            .aes(Channel::X, "x")
            .aes(Channel::Y, "y")
            .layer(Layer::point())
            .build()
            .unwrap();
        assert_eq!(plot.panel_count(), 1);
        assert!(plot.render(&png_options()).is_ok());
    }
}
