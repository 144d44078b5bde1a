use crate::aes::{AestheticValue, Channel, Mapping};
use crate::data::Table;
use crate::stat::Stat;
use std::fmt;

/// Geometric representation drawn by a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geom {
    Point,
    Line,
    Area,
    Bar,
    Boxplot,
    Violin,
    Segment,
    Text,
    Polygon,
}

impl Geom {
    pub fn name(self) -> &'static str {
        match self {
            Geom::Point => "point",
            Geom::Line => "line",
            Geom::Area => "area",
            Geom::Bar => "bar",
            Geom::Boxplot => "boxplot",
            Geom::Violin => "violin",
            Geom::Segment => "segment",
            Geom::Text => "text",
            Geom::Polygon => "polygon",
        }
    }

    /// Channels that must be mapped once the stat has run.
    pub fn required_channels(self) -> &'static [Channel] {
        match self {
            Geom::Segment => &[Channel::X, Channel::Y, Channel::Xend, Channel::Yend],
            Geom::Text => &[Channel::X, Channel::Y, Channel::Label],
            _ => &[Channel::X, Channel::Y],
        }
    }

    /// Geoms whose y extent always includes zero.
    pub fn anchors_at_zero(self) -> bool {
        matches!(self, Geom::Bar | Geom::Area)
    }

    /// Geoms whose x positions are category slots.
    pub fn wants_discrete_x(self) -> bool {
        matches!(self, Geom::Boxplot | Geom::Violin)
    }
}

impl fmt::Display for Geom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position adjustment for overlapping bars and boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Identity,
    Stack,
    Dodge,
}

/// Fixed (non-mapped) visual attributes of a layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerParams {
    pub color: Option<String>,
    pub fill: Option<String>,
    pub alpha: Option<f64>,
    pub size: Option<f64>,
    pub shape: Option<String>,
    /// Bar / box width as a fraction of the category slot.
    pub width: Option<f64>,
    pub linewidth: Option<f64>,
}

/// One drawing unit of a plot.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub geom: Geom,
    pub stat: Stat,
    pub position: Position,
    pub mapping: Mapping,
    pub params: LayerParams,
    /// Per-layer data replacing the scene table.
    pub data: Option<Table>,
}

impl Layer {
    pub fn new(geom: Geom, stat: Stat) -> Self {
        Layer {
            geom,
            stat,
            position: Position::Identity,
            mapping: Mapping::new(),
            params: LayerParams::default(),
            data: None,
        }
    }

    pub fn point() -> Self {
        Layer::new(Geom::Point, Stat::Identity)
    }

    pub fn line() -> Self {
        Layer::new(Geom::Line, Stat::Identity)
    }

    pub fn area() -> Self {
        Layer::new(Geom::Area, Stat::Identity)
    }

    /// Bars of row counts per x category.
    pub fn bar() -> Self {
        Layer::new(Geom::Bar, Stat::Count)
    }

    /// Bars whose heights come straight from the y column.
    pub fn col() -> Self {
        Layer::new(Geom::Bar, Stat::Identity)
    }

    pub fn histogram() -> Self {
        Layer::new(Geom::Bar, Stat::bin())
    }

    pub fn density() -> Self {
        Layer::new(Geom::Area, Stat::density())
    }

    pub fn boxplot() -> Self {
        let mut layer = Layer::new(Geom::Boxplot, Stat::Boxplot);
        layer.position = Position::Dodge;
        layer
    }

    pub fn violin() -> Self {
        let mut layer = Layer::new(Geom::Violin, Stat::Violin);
        layer.position = Position::Dodge;
        layer
    }

    pub fn segment() -> Self {
        Layer::new(Geom::Segment, Stat::Identity)
    }

    pub fn text() -> Self {
        Layer::new(Geom::Text, Stat::Identity)
    }

    pub fn polygon() -> Self {
        Layer::new(Geom::Polygon, Stat::Identity)
    }

    pub fn stat(mut self, stat: Stat) -> Self {
        self.stat = stat;
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn aes(mut self, channel: Channel, column: impl Into<String>) -> Self {
        self.mapping.set(channel, AestheticValue::Mapped(column.into()));
        self
    }

    pub fn mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = self.mapping.merge(&mapping);
        self
    }

    pub fn data(mut self, table: Table) -> Self {
        self.data = Some(table);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.params.color = Some(color.into());
        self
    }

    pub fn fill(mut self, fill: impl Into<String>) -> Self {
        self.params.fill = Some(fill.into());
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.params.alpha = Some(alpha);
        self
    }

    pub fn size(mut self, size: f64) -> Self {
        self.params.size = Some(size);
        self
    }

    pub fn shape(mut self, shape: impl Into<String>) -> Self {
        self.params.shape = Some(shape.into());
        self
    }

    pub fn width(mut self, width: f64) -> Self {
        self.params.width = Some(width);
        self
    }

    pub fn linewidth(mut self, linewidth: f64) -> Self {
        self.params.linewidth = Some(linewidth);
        self
    }

    /// Fixed constants carried in the mapping itself (e.g. `aes(color: "red")` literals)
    /// are moved into the layer parameters.
    pub(crate) fn fixed_from_mapping(&self, mapping: &Mapping) -> LayerParams {
        let mut params = self.params.clone();
        for (channel, value) in mapping.iter() {
            let AestheticValue::Fixed(constant) = value else {
                continue;
            };
            match channel {
                Channel::Color if params.color.is_none() => params.color = Some(constant.as_text()),
                Channel::Fill if params.fill.is_none() => params.fill = Some(constant.as_text()),
                Channel::Alpha if params.alpha.is_none() => params.alpha = constant.as_f64(),
                Channel::Size if params.size.is_none() => params.size = constant.as_f64(),
                Channel::Shape if params.shape.is_none() => params.shape = Some(constant.as_text()),
                _ => {}
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_is_binned_bar() {
        let layer = Layer::histogram();
        assert_eq!(layer.geom, Geom::Bar);
        assert!(matches!(layer.stat, Stat::Bin { .. }));
    }

    #[test]
    fn test_builder_sets_params() {
        let layer = Layer::point().color("red").alpha(0.4).size(3.0).aes(Channel::Shape, "kind");
        assert_eq!(layer.params.color.as_deref(), Some("red"));
        assert_eq!(layer.params.alpha, Some(0.4));
        assert_eq!(layer.mapping.column(Channel::Shape), Some("kind"));
    }

    #[test]
    fn test_required_channels() {
        assert_eq!(Geom::Segment.required_channels().len(), 4);
        assert!(Geom::Text.required_channels().contains(&Channel::Label));
    }

    #[test]
    fn test_fixed_mapping_entries_become_params() {
        let layer = Layer::line().linewidth(2.0);
        let mapping = Mapping::new().fixed(Channel::Color, "steelblue").fixed(Channel::Alpha, 0.5);
        let params = layer.fixed_from_mapping(&mapping);
        assert_eq!(params.color.as_deref(), Some("steelblue"));
        assert_eq!(params.alpha, Some(0.5));
        assert_eq!(params.linewidth, Some(2.0));
    }

    #[test]
    fn test_explicit_param_beats_fixed_mapping() {
        let layer = Layer::point().color("black");
        let mapping = Mapping::new().fixed(Channel::Color, "red");
        assert_eq!(layer.fixed_from_mapping(&mapping).color.as_deref(), Some("black"));
    }
}
