//! Automatic legends.
//!
//! Every discrete non-position scale with more than one category gets a legend. Scales on
//! different channels trained from the same column share one legend whose keys carry all
//! of the merged channels. Continuous colour scales get a colour bar; continuous size and
//! alpha scales get none.

use crate::aes::Channel;
use crate::data::Value;
use crate::ir::{ResolvedSpec, ScaleSet};
use crate::layer::Geom;
use crate::palette::PointShape;
use crate::scale::ResolvedScale;
use plotters::style::RGBColor;

/// Shape drawn inside a legend key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Point,
    Rect,
    Line,
}

/// One legend entry with the visual values of every merged channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegendKey {
    pub label: String,
    pub color: Option<RGBColor>,
    pub fill: Option<RGBColor>,
    pub shape: Option<PointShape>,
    pub size: Option<f64>,
    pub alpha: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Legend {
    Keys {
        title: String,
        channels: Vec<Channel>,
        glyph: Glyph,
        keys: Vec<LegendKey>,
    },
    ColorBar {
        title: String,
        channel: Channel,
        low: RGBColor,
        high: RGBColor,
        /// Break positions as fractions of the bar, with labels.
        breaks: Vec<(f64, String)>,
    },
}

impl Legend {
    pub fn title(&self) -> &str {
        match self {
            Legend::Keys { title, .. } | Legend::ColorBar { title, .. } => title,
        }
    }
}

/// Build the legends of a plot, in channel order of their first scale.
pub fn build_legends(spec: &ResolvedSpec, scales: &ScaleSet) -> Vec<Legend> {
    if !spec.theme.legend_show {
        return Vec::new();
    }

    // Discrete scales grouped by their source column.
    let mut groups: Vec<(Option<String>, Vec<&ResolvedScale>)> = Vec::new();
    let mut legends = Vec::new();
    for scale in scales.aesthetics.values() {
        if scale.is_discrete() {
            match groups
                .iter_mut()
                .find(|(column, _)| column.is_some() && *column == scale.column)
            {
                Some((_, members)) => members.push(scale),
                None => groups.push((scale.column.clone(), vec![scale])),
            }
        } else if let Some((low, high)) = scale.gradient() {
            let breaks = scale
                .breaks()
                .into_iter()
                .map(|b| (scale.rescale(b.value).clamp(0.0, 1.0), b.label))
                .collect();
            legends.push(Legend::ColorBar {
                title: legend_title(spec, &[scale]),
                channel: scale.channel,
                low,
                high,
                breaks,
            });
        }
    }

    for (_, members) in groups {
        let categories = members[0].categories();
        if categories.len() < 2 {
            continue;
        }
        let channels: Vec<Channel> = members.iter().map(|s| s.channel).collect();
        let keys = categories
            .iter()
            .map(|label| {
                let value = Value::Text(label.clone());
                let mut key = LegendKey {
                    label: label.clone(),
                    ..Default::default()
                };
                for scale in &members {
                    match scale.channel {
                        Channel::Color => key.color = scale.color(&value),
                        Channel::Fill => key.fill = scale.color(&value),
                        Channel::Shape => key.shape = scale.shape(&value),
                        Channel::Size => key.size = scale.number(&value),
                        Channel::Alpha => key.alpha = scale.number(&value),
                        _ => {}
                    }
                }
                key
            })
            .collect();
        legends.push(Legend::Keys {
            title: legend_title(spec, &members),
            glyph: glyph_for(spec, &channels),
            channels,
            keys,
        });
    }
    legends
}

/// Labels first, then the scale name, then the column.
fn legend_title(spec: &ResolvedSpec, members: &[&ResolvedScale]) -> String {
    members
        .iter()
        .find_map(|s| spec.labels.legends.get(&s.channel).cloned())
        .or_else(|| members.iter().find_map(|s| s.title.clone()))
        .or_else(|| members.iter().find_map(|s| s.column.clone()))
        .unwrap_or_else(|| members.first().map(|s| s.channel.to_string()).unwrap_or_default())
}

/// Glyph of the first layer that maps any of the channels.
fn glyph_for(spec: &ResolvedSpec, channels: &[Channel]) -> Glyph {
    let geom = spec
        .layers
        .iter()
        .find(|l| channels.iter().any(|c| l.mapping.column(*c).is_some()))
        .map(|l| l.geom);
    match geom {
        Some(Geom::Point | Geom::Text) => Glyph::Point,
        Some(Geom::Line | Geom::Segment) => Glyph::Line,
        _ => Glyph::Rect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Table};
    use crate::layer::Layer;
    use crate::scene::{Labels, Scene};
    use crate::theme::ThemeValue;

    fn table() -> Table {
        Table::new(vec![
            Column::numeric("x", vec![1.0, 2.0, 3.0, 4.0]),
            Column::numeric("y", vec![1.0, 4.0, 9.0, 16.0]),
            Column::categorical("species", &["a", "b", "a", "c"]),
            Column::categorical("site", &["n", "n", "n", "n"]),
        ])
        .unwrap()
    }

    fn legends(scene: Scene) -> Vec<Legend> {
        scene.build().unwrap().legends().to_vec()
    }

    fn base() -> Scene {
        Scene::new(table()).aes(Channel::X, "x").aes(Channel::Y, "y")
    }

    #[test]
    fn test_one_legend_per_discrete_scale() {
        let out = legends(base().layer(Layer::point().aes(Channel::Color, "species")));
        assert_eq!(out.len(), 1);
        let Legend::Keys { keys, glyph, title, .. } = &out[0] else {
            panic!("expected keys");
        };
        assert_eq!(title, "species");
        assert_eq!(*glyph, Glyph::Point);
        let labels: Vec<&str> = keys.iter().map(|k| k.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert!(keys.iter().all(|k| k.color.is_some()));
    }

    #[test]
    fn test_single_category_has_no_legend() {
        assert!(legends(base().layer(Layer::point().aes(Channel::Color, "site"))).is_empty());
    }

    #[test]
    fn test_same_column_channels_merge() {
        let out = legends(
            base().layer(Layer::point().aes(Channel::Color, "species").aes(Channel::Shape, "species")),
        );
        assert_eq!(out.len(), 1);
        let Legend::Keys { keys, channels, .. } = &out[0] else {
            panic!("expected keys");
        };
        assert_eq!(channels, &vec![Channel::Color, Channel::Shape]);
        assert!(keys.iter().all(|k| k.color.is_some() && k.shape.is_some()));
    }

    #[test]
    fn test_continuous_color_is_colorbar() {
        let out = legends(base().layer(Layer::point().aes(Channel::Color, "y")));
        assert!(matches!(out[0], Legend::ColorBar { .. }));
    }

    #[test]
    fn test_continuous_size_has_no_legend() {
        assert!(legends(base().layer(Layer::point().aes(Channel::Size, "y"))).is_empty());
    }

    #[test]
    fn test_suppressed_by_theme() {
        let scene = base()
            .layer(Layer::point().aes(Channel::Color, "species"))
            .theme_set("legend_show", ThemeValue::Bool(false));
        assert!(legends(scene).is_empty());
    }

    #[test]
    fn test_label_title_wins() {
        let scene = base()
            .layer(Layer::col().aes(Channel::Fill, "species"))
            .labs(Labels::default().legend(Channel::Fill, "Species"));
        let out = legends(scene);
        assert_eq!(out[0].title(), "Species");
        assert!(matches!(out[0], Legend::Keys { glyph: Glyph::Rect, .. }));
    }
}
