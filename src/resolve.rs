use crate::aes::{AestheticValue, Channel, Mapping};
use crate::data::Table;
use crate::error::{PlotError, Result};
use crate::ir::{ResolvedLayer, ResolvedSpec};
use crate::layer::{Geom, Layer, LayerParams};
use crate::palette::{parse_color, PointShape};
use crate::scale::merge_specs;
use crate::scene::Scene;
use crate::stat::Stat;
use tracing::debug;

/// Resolve all aesthetic mappings and declarations of a scene.
///
/// Checks everything that can be checked without looking at data values:
/// channel names, column references, required channels and fixed attributes.
pub fn resolve_scene(scene: &Scene) -> Result<ResolvedSpec> {
    if scene.layers.is_empty() {
        return Err(PlotError::InvalidSpec(
            "Plot requires at least one geometry layer (point, line, bar, ...)".to_string(),
        ));
    }

    let mut layers = Vec::with_capacity(scene.layers.len());
    for (index, layer) in scene.layers.iter().enumerate() {
        layers.push(resolve_layer(index, layer, &scene.mapping, &scene.data)?);
    }

    if scene.coord.is_map() {
        if let Some(layer) = layers.iter().find(|l| !supports_map(l.geom)) {
            return Err(PlotError::InvalidSpec(format!(
                "{} layers cannot be drawn in map coordinates",
                layer.geom
            )));
        }
    }

    debug!(layers = layers.len(), scales = scene.scales.len(), "resolved scene");
    Ok(ResolvedSpec {
        data: scene.data.clone(),
        layers,
        scales: merge_specs(&scene.scales),
        facet: scene.facet.clone(),
        coord: scene.coord.clone(),
        labels: scene.labels.clone(),
        theme: scene.theme.resolve(),
    })
}

/// Resolve the effective mapping of one layer (layer-specific over scene-wide).
fn resolve_layer(index: usize, layer: &Layer, scene_mapping: &Mapping, scene_data: &Table) -> Result<ResolvedLayer> {
    let mapping = scene_mapping.merge(&layer.mapping);
    let table = layer.data.as_ref().unwrap_or(scene_data);

    for (channel, value) in mapping.iter() {
        match value {
            AestheticValue::Mapped(column) if !table.has_column(column) => {
                return Err(PlotError::UnknownColumn {
                    channel: channel.to_string(),
                    column: column.clone(),
                });
            }
            AestheticValue::Fixed(_) if channel.is_position() => {
                return Err(PlotError::InvalidSpec(format!(
                    "{} must be mapped to a column, not a constant",
                    channel
                )));
            }
            _ => {}
        }
    }

    for channel in input_channels(layer.geom, &layer.stat) {
        if !mapping.contains(*channel) {
            return Err(PlotError::MissingChannel {
                layer: index,
                geom: layer.geom.to_string(),
                channel: channel.to_string(),
            });
        }
    }

    let params = layer.fixed_from_mapping(&mapping);
    validate_params(&params)?;

    Ok(ResolvedLayer {
        geom: layer.geom,
        stat: layer.stat.clone(),
        position: layer.position,
        mapping,
        params,
        data: layer.data.clone(),
    })
}

/// Channels a layer must map before its stat runs.
fn input_channels(geom: Geom, stat: &Stat) -> &'static [Channel] {
    match stat {
        Stat::Identity => geom.required_channels(),
        Stat::Count | Stat::Proportion | Stat::Bin { .. } | Stat::Density { .. } => &[Channel::X],
        Stat::Boxplot | Stat::Violin => &[Channel::X, Channel::Y],
    }
}

fn supports_map(geom: Geom) -> bool {
    matches!(
        geom,
        Geom::Point | Geom::Line | Geom::Segment | Geom::Text | Geom::Polygon
    )
}

fn validate_params(params: &LayerParams) -> Result<()> {
    for color in [&params.color, &params.fill].into_iter().flatten() {
        if parse_color(color).is_none() {
            return Err(PlotError::InvalidSpec(format!("Unknown color '{}'", color)));
        }
    }
    if let Some(shape) = &params.shape {
        shape.parse::<PointShape>().map_err(PlotError::InvalidSpec)?;
    }
    if let Some(alpha) = params.alpha {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(PlotError::InvalidSpec(format!("alpha {} is outside [0, 1]", alpha)));
        }
    }
    for (name, value) in [("size", params.size), ("width", params.width), ("linewidth", params.linewidth)] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(PlotError::InvalidSpec(format!("{} must be non-negative, got {}", name, v)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{Coord, Projection};
    use crate::data::Column;

    fn table() -> Table {
        Table::new(vec![
            Column::numeric("time", vec![1.0, 2.0]),
            Column::numeric("temp", vec![10.0, 20.0]),
            Column::categorical("site", &["a", "b"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_layer_mapping_overlays_scene() {
        let scene = Scene::new(table())
            .aes(Channel::X, "time")
            .aes(Channel::Y, "temp")
            .layer(Layer::point().aes(Channel::Color, "site"));
        let spec = resolve_scene(&scene).unwrap();
        let mapping = &spec.layers[0].mapping;
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.column(Channel::Color), Some("site"));
    }

    #[test]
    fn test_position_constant_rejected() {
        let scene = Scene::new(table())
            .aes(Channel::X, "time")
            .mapping(Mapping::new().fixed(Channel::Y, 3.0))
            .layer(Layer::point());
        assert!(matches!(resolve_scene(&scene), Err(PlotError::InvalidSpec(_))));
    }

    #[test]
    fn test_unknown_column() {
        let scene = Scene::new(table())
            .aes(Channel::X, "time")
            .aes(Channel::Y, "pressure")
            .layer(Layer::line());
        let err = resolve_scene(&scene).unwrap_err();
        assert!(matches!(err, PlotError::UnknownColumn { ref column, .. } if column == "pressure"));
    }

    #[test]
    fn test_missing_channel() {
        let scene = Scene::new(table()).aes(Channel::X, "time").layer(Layer::point());
        let err = resolve_scene(&scene).unwrap_err();
        assert!(matches!(err, PlotError::MissingChannel { ref channel, .. } if channel == "y"));
    }

    #[test]
    fn test_histogram_needs_only_x() {
        let scene = Scene::new(table()).aes(Channel::X, "temp").layer(Layer::histogram());
        assert!(resolve_scene(&scene).is_ok());
    }

    #[test]
    fn test_no_layers() {
        assert!(matches!(
            resolve_scene(&Scene::new(table())),
            Err(PlotError::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_bad_fixed_color() {
        let scene = Scene::new(table())
            .aes(Channel::X, "time")
            .aes(Channel::Y, "temp")
            .layer(Layer::point().color("blurple"));
        assert!(matches!(resolve_scene(&scene), Err(PlotError::InvalidSpec(_))));
    }

    #[test]
    fn test_map_rejects_bars() {
        let scene = Scene::new(table())
            .aes(Channel::X, "site")
            .layer(Layer::bar())
            .coord(Coord::map(Projection::Mercator));
        assert!(matches!(resolve_scene(&scene), Err(PlotError::InvalidSpec(_))));
    }

    #[test]
    fn test_layer_data_checked_against_own_table() {
        let other = Table::new(vec![Column::numeric("lon", vec![0.0]), Column::numeric("lat", vec![1.0])]).unwrap();
        let scene = Scene::new(table())
            .layer(Layer::point().data(other).aes(Channel::X, "lon").aes(Channel::Y, "lat"));
        assert!(resolve_scene(&scene).is_ok());
    }
}
