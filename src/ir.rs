use crate::aes::{Channel, Mapping};
use crate::coord::Coord;
use crate::data::Table;
use crate::facet::{Facet, FacetLayout, PanelKey};
use crate::layer::{Geom, LayerParams, Position};
use crate::palette::PointShape;
use crate::scale::{ResolvedScale, ScaleSpec};
use crate::scene::Labels;
use crate::stat::Stat;
use crate::theme::{FontFace, ResolvedTheme};
use plotters::style::RGBColor;
use std::collections::BTreeMap;

// =============================================================================
// Phase 1: Resolution
// =============================================================================

/// A scene whose mappings, declarations and theme have been validated and merged.
#[derive(Debug, Clone)]
pub struct ResolvedSpec {
    pub data: Table,
    pub layers: Vec<ResolvedLayer>,
    /// One declaration per scale channel, last declaration winning.
    pub scales: BTreeMap<Channel, ScaleSpec>,
    pub facet: Option<Facet>,
    pub coord: Coord,
    pub labels: Labels,
    pub theme: ResolvedTheme,
}

#[derive(Debug, Clone)]
pub struct ResolvedLayer {
    pub geom: Geom,
    pub stat: Stat,
    pub position: Position,
    /// Scene mapping overlaid with the layer mapping.
    pub mapping: Mapping,
    /// Fixed attributes, including constants lifted from the mapping.
    pub params: LayerParams,
    /// Layer-level data replacing the scene table.
    pub data: Option<Table>,
}

impl ResolvedLayer {
    /// Table this layer draws from.
    pub fn table<'a>(&'a self, scene: &'a Table) -> &'a Table {
        self.data.as_ref().unwrap_or(scene)
    }
}

// =============================================================================
// Phase 2: Transformation
// =============================================================================

/// Stat output for every layer, split into panels (one panel without faceting).
#[derive(Debug, Clone)]
pub struct RenderData {
    pub panels: Vec<PanelData>,
    pub layout: FacetLayout,
}

#[derive(Debug, Clone)]
pub struct PanelData {
    pub index: usize,
    pub key: PanelKey,
    /// One frame per layer, in layer order.
    pub layers: Vec<LayerFrame>,
}

/// A layer's derived table within one panel.
#[derive(Debug, Clone)]
pub struct LayerFrame {
    /// Index into `ResolvedSpec::layers`.
    pub layer: usize,
    pub table: Table,
    /// Mapping rewritten onto the derived table's columns.
    pub mapping: Mapping,
    /// Per-row auxiliary samples (boxplot outliers, violin curves).
    pub samples: Vec<Vec<(f64, f64)>>,
}

// =============================================================================
// Phase 3: Scaling
// =============================================================================

/// Every trained scale of the plot.
#[derive(Debug, Clone)]
pub struct ScaleSet {
    /// One position scale pair per panel.
    pub panels: Vec<PanelScales>,
    /// Non-position scales, shared by all panels.
    pub aesthetics: BTreeMap<Channel, ResolvedScale>,
}

#[derive(Debug, Clone)]
pub struct PanelScales {
    pub x: ResolvedScale,
    pub y: ResolvedScale,
}

// =============================================================================
// Phase 4: Compilation (Scene Graph)
// =============================================================================

/// A list of primitive drawing commands in pixel space.
/// The backend just executes these blindly.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub commands: Vec<DrawCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: RGBColor,
    pub alpha: f64,
}

impl Paint {
    pub fn solid(color: RGBColor) -> Self {
        Paint { color, alpha: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub paint: Paint,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAnchor {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAnchor {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub family: String,
    pub size: f64,
    pub color: RGBColor,
    pub face: FontFace,
    pub h: HAnchor,
    pub v: VAnchor,
    /// Rotated a quarter turn counter-clockwise.
    pub rotated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect {
        // Top-Left, Bottom-Right
        tl: (f64, f64),
        br: (f64, f64),
        fill: Option<Paint>,
        stroke: Option<Stroke>,
    },
    Path {
        points: Vec<(f64, f64)>,
        stroke: Stroke,
    },
    Polygon {
        points: Vec<(f64, f64)>,
        fill: Paint,
        stroke: Option<Stroke>,
    },
    Marker {
        center: (f64, f64),
        radius: f64,
        shape: PointShape,
        paint: Paint,
    },
    Text {
        pos: (f64, f64),
        text: String,
        style: TextStyle,
    },
}
