// Library exports for layerplot

pub mod aes;
pub mod coord;
pub mod csv_reader;
pub mod data;
pub mod error;
pub mod facet;
pub mod layer;
pub mod legend;
pub mod palette;
pub mod parser;
pub mod runtime;
pub mod scene;
pub mod stat;
pub mod theme;

// Pipeline phases
pub mod ir;
pub mod resolve;
pub mod transform;
pub mod scale;
pub mod compiler;
pub mod render;

pub use aes::{AestheticValue, Channel, Mapping};
pub use coord::{Coord, Projection};
pub use data::{Column, Table, Value, ValueType};
pub use error::{PlotError, Result};
pub use facet::{Facet, FacetScales};
pub use layer::{Geom, Layer, Position};
pub use runtime::Plot;
pub use scale::{ScaleSpec, Transform};
pub use scene::{Labels, Scene};
pub use stat::Stat;
pub use theme::{LegendPosition, Preset, Theme, ThemeValue};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            format: OutputFormat::Png,
        }
    }
}
