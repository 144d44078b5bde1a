//! The scene builder: a table, default mappings and an ordered list of declarations.

use crate::aes::{AestheticValue, Channel, Mapping};
use crate::coord::Coord;
use crate::data::Table;
use crate::error::Result;
use crate::facet::Facet;
use crate::layer::Layer;
use crate::runtime::Plot;
use crate::scale::ScaleSpec;
use crate::theme::{Theme, ThemeValue};
use std::collections::BTreeMap;

/// Plot annotations. Later `labs` calls override earlier ones field by field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Labels {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub caption: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    /// Legend titles by channel.
    pub legends: BTreeMap<Channel, String>,
}

impl Labels {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn x(mut self, x: impl Into<String>) -> Self {
        self.x = Some(x.into());
        self
    }

    pub fn y(mut self, y: impl Into<String>) -> Self {
        self.y = Some(y.into());
        self
    }

    pub fn legend(mut self, channel: Channel, title: impl Into<String>) -> Self {
        self.legends.insert(channel, title.into());
        self
    }

    pub fn merge(mut self, other: Labels) -> Self {
        self.title = other.title.or(self.title);
        self.subtitle = other.subtitle.or(self.subtitle);
        self.caption = other.caption.or(self.caption);
        self.x = other.x.or(self.x);
        self.y = other.y.or(self.y);
        self.legends.extend(other.legends);
        self
    }
}

/// Immutable-by-construction plot description; every step returns the updated builder.
///
/// ```
/// use layerplot::{Channel, Column, Layer, Scene, Table};
///
/// let table = Table::new(vec![
///     Column::numeric("height", vec![1.0, 2.0, 3.0]),
///     Column::numeric("weight", vec![2.0, 4.0, 5.0]),
/// ])
/// .unwrap();
/// let plot = Scene::new(table)
///     .aes(Channel::X, "height")
///     .aes(Channel::Y, "weight")
///     .layer(Layer::point())
///     .build()
///     .unwrap();
/// assert_eq!(plot.panel_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub(crate) data: Table,
    pub(crate) mapping: Mapping,
    pub(crate) layers: Vec<Layer>,
    pub(crate) scales: Vec<ScaleSpec>,
    pub(crate) coord: Coord,
    pub(crate) facet: Option<Facet>,
    pub(crate) theme: Theme,
    pub(crate) labels: Labels,
}

impl Scene {
    pub fn new(data: Table) -> Self {
        Scene {
            data,
            mapping: Mapping::new(),
            layers: Vec::new(),
            scales: Vec::new(),
            coord: Coord::default(),
            facet: None,
            theme: Theme::default(),
            labels: Labels::default(),
        }
    }

    pub fn data(&self) -> &Table {
        &self.data
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Default mapping of a channel for every layer.
    pub fn aes(mut self, channel: Channel, column: impl Into<String>) -> Self {
        self.mapping.set(channel, AestheticValue::Mapped(column.into()));
        self
    }

    pub fn mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = self.mapping.merge(&mapping);
        self
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Declare a scale; a later declaration for the same channel replaces it.
    pub fn scale(mut self, spec: ScaleSpec) -> Self {
        self.scales.push(spec);
        self
    }

    /// Replace the coordinate system.
    pub fn coord(mut self, coord: Coord) -> Self {
        self.coord = coord;
        self
    }

    pub fn facet(mut self, facet: Facet) -> Self {
        self.facet = Some(facet);
        self
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = std::mem::take(&mut self.theme).merge(theme);
        self
    }

    /// Append one theme override.
    pub fn theme_set(mut self, key: impl Into<String>, value: ThemeValue) -> Self {
        self.theme.overrides.push((key.into(), value));
        self
    }

    pub fn labs(mut self, labels: Labels) -> Self {
        self.labels = std::mem::take(&mut self.labels).merge(labels);
        self
    }

    pub fn title(self, title: impl Into<String>) -> Self {
        self.labs(Labels::default().title(title))
    }

    /// Resolve, transform and train the scene.
    ///
    /// Every configuration error surfaces here; a successful build always renders.
    pub fn build(&self) -> Result<Plot> {
        Plot::build(self)
    }
}
