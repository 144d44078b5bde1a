use crate::aes::{Channel, Mapping};
use crate::coord::{clip_segment, Coord};
use crate::data::{Column, Table, Value};
use crate::error::{PlotError, Result};
use crate::facet::{FacetLayout, PanelKey};
use crate::ir::{LayerFrame, PanelData, RenderData, ResolvedLayer, ResolvedSpec};
use crate::layer::{Geom, Position};
use crate::stat::{self, StatOutput, XMAX_COLUMN, XMIN_COLUMN};
use std::collections::BTreeMap;
use tracing::debug;

/// Lower edge of stacked bars and areas.
pub const STACK_BASE_COLUMN: &str = "ymin";
/// Default bar width as a fraction of the data resolution.
pub const DEFAULT_BAR_WIDTH: f64 = 0.9;

/// Main entry point: partition the data into panels and run each layer's stat per panel.
pub fn apply_transformations(spec: &ResolvedSpec) -> Result<RenderData> {
    let tables: Vec<&Table> = spec.layers.iter().map(|l| l.table(&spec.data)).collect();

    // 1. Panel keys and layout (faceting)
    let (keys, layout) = match &spec.facet {
        Some(facet) => {
            let keys = facet.keys(&tables)?;
            let layout = facet.layout(&keys)?;
            (keys, layout)
        }
        None => (vec![PanelKey::new()], FacetLayout::single()),
    };

    // 2. Process each partition into a panel
    let mut panels = Vec::with_capacity(keys.len());
    for (index, key) in keys.into_iter().enumerate() {
        let mut frames = Vec::with_capacity(spec.layers.len());
        for (layer_idx, layer) in spec.layers.iter().enumerate() {
            let table = tables[layer_idx];
            let subset = match &spec.facet {
                // Tables without the facet columns repeat in every panel.
                Some(facet) => match facet.rows_for(table, &key) {
                    Some(rows) => table.take(&rows),
                    None => table.clone(),
                },
                None => table.clone(),
            };
            frames.push(build_frame(layer_idx, layer, &subset, &spec.coord)?);
        }
        panels.push(PanelData {
            index,
            key,
            layers: frames,
        });
    }

    debug!(panels = panels.len(), "transformed data");
    Ok(RenderData { panels, layout })
}

/// Stat, coordinate projection and position adjustment for one layer in one panel.
fn build_frame(index: usize, layer: &ResolvedLayer, table: &Table, coord: &Coord) -> Result<LayerFrame> {
    let StatOutput {
        table,
        mapping,
        samples,
    } = stat::apply(&layer.stat, table, &layer.mapping)?;

    for channel in layer.geom.required_channels() {
        if !mapping.contains(*channel) {
            return Err(PlotError::MissingChannel {
                layer: index,
                geom: layer.geom.to_string(),
                channel: channel.to_string(),
            });
        }
    }

    let mut frame = LayerFrame {
        layer: index,
        table,
        mapping,
        samples,
    };

    if coord.is_map() {
        frame = project_frame(frame, layer.geom, coord)?;
    }
    if layer.position == Position::Stack && matches!(layer.geom, Geom::Bar | Geom::Area) {
        frame = stack_frame(frame)?;
    }
    if matches!(layer.geom, Geom::Bar | Geom::Boxplot | Geom::Violin) {
        frame = add_bar_extents(frame, layer.params.width.unwrap_or(DEFAULT_BAR_WIDTH))?;
    }
    Ok(frame)
}

// =============================================================================
// Map projection
// =============================================================================

fn numeric_values<'a>(table: &'a Table, mapping: &Mapping, channel: Channel) -> Result<Option<&'a Column>> {
    let Some(name) = mapping.column(channel) else {
        return Ok(None);
    };
    let col = table.column(name).ok_or_else(|| PlotError::UnknownColumn {
        channel: channel.to_string(),
        column: name.to_string(),
    })?;
    if !col.kind.is_continuous() {
        return Err(PlotError::type_mismatch(
            name,
            format!("map coordinates need numeric {} values, found {}", channel, col.kind),
        ));
    }
    Ok(Some(col))
}

fn replace_numeric(table: Table, name: &str, values: Vec<f64>) -> Result<Table> {
    table.with_column(Column::numeric(name, values))
}

/// Clip to the map window and project longitude/latitude pairs.
fn project_frame(frame: LayerFrame, geom: Geom, coord: &Coord) -> Result<LayerFrame> {
    let LayerFrame {
        layer,
        table,
        mapping,
        samples,
    } = frame;
    let (Some(x_col), Some(y_col)) = (
        numeric_values(&table, &mapping, Channel::X)?,
        numeric_values(&table, &mapping, Channel::Y)?,
    ) else {
        return Ok(LayerFrame {
            layer,
            table,
            mapping,
            samples,
        });
    };
    let (x_name, y_name) = (x_col.name.clone(), y_col.name.clone());
    let point = |col: &Column, row: usize| col.values[row].as_f64().filter(|v| v.is_finite());

    let mut template_rows = Vec::new();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut ends: Vec<(f64, f64)> = Vec::new();

    match geom {
        Geom::Polygon => {
            // Each polygon ring is clipped to the window as a whole.
            let groups = row_groups(&table, &mapping);
            for rows in groups {
                let ring: Vec<(f64, f64)> = rows
                    .iter()
                    .filter_map(|&r| Some((point(x_col, r)?, point(y_col, r)?)))
                    .collect();
                let clipped = coord.clip_ring(&ring);
                if clipped.len() < 3 {
                    continue;
                }
                for (lon, lat) in clipped {
                    let (px, py) = coord.project_clipped(lon, lat);
                    template_rows.push(rows[0]);
                    xs.push(px);
                    ys.push(py);
                }
            }
        }
        Geom::Segment => {
            let xend = numeric_values(&table, &mapping, Channel::Xend)?;
            let yend = numeric_values(&table, &mapping, Channel::Yend)?;
            let (Some(xend), Some(yend)) = (xend, yend) else {
                return Err(PlotError::InvalidSpec("segments need xend and yend".to_string()));
            };
            let window = coord.window_bounds().unwrap_or(((-180.0, -90.0), (180.0, 90.0)));
            for row in 0..table.num_rows() {
                let (Some(x0), Some(y0), Some(x1), Some(y1)) =
                    (point(x_col, row), point(y_col, row), point(xend, row), point(yend, row))
                else {
                    continue;
                };
                let Some((a, b)) = clip_segment((x0, y0), (x1, y1), window.0, window.1) else {
                    continue;
                };
                let (pa, pb) = (coord.project_clipped(a.0, a.1), coord.project_clipped(b.0, b.1));
                template_rows.push(row);
                xs.push(pa.0);
                ys.push(pa.1);
                ends.push(pb);
            }
        }
        _ => {
            for row in 0..table.num_rows() {
                let projected = match (point(x_col, row), point(y_col, row)) {
                    (Some(lon), Some(lat)) => coord.project(lon, lat),
                    _ => None,
                };
                if let Some((px, py)) = projected {
                    template_rows.push(row);
                    xs.push(px);
                    ys.push(py);
                }
            }
        }
    }

    let dropped = table.num_rows().saturating_sub(template_rows.len());
    if dropped > 0 && geom != Geom::Polygon {
        debug!(dropped, "dropped rows outside the map window");
    }

    let mut out = table.take(&template_rows);
    out = replace_numeric(out, &x_name, xs)?;
    out = replace_numeric(out, &y_name, ys)?;
    if geom == Geom::Segment {
        if let (Some(xend), Some(yend)) = (mapping.column(Channel::Xend), mapping.column(Channel::Yend)) {
            out = replace_numeric(out, xend, ends.iter().map(|p| p.0).collect())?;
            out = replace_numeric(out, yend, ends.iter().map(|p| p.1).collect())?;
        }
    }
    let samples = if samples.is_empty() {
        samples
    } else {
        template_rows.iter().map(|&r| samples[r].clone()).collect()
    };

    Ok(LayerFrame {
        layer,
        table: out,
        mapping,
        samples,
    })
}

/// Row indices of each group (polygon ring, line, area), split by the grouping columns.
pub fn row_groups(table: &Table, mapping: &Mapping) -> Vec<Vec<usize>> {
    let cols: Vec<&Column> = stat::grouping_columns(table, mapping)
        .iter()
        .filter_map(|c| table.column(c))
        .collect();
    let mut index: BTreeMap<Vec<String>, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in 0..table.num_rows() {
        let key: Vec<String> = cols.iter().map(|c| c.values[row].key()).collect();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    groups
}

// =============================================================================
// Position adjustments
// =============================================================================

/// Stack y values per x position: positives upward, negatives downward.
///
/// The y column is replaced by the stack top and `ymin` holds the base.
fn stack_frame(frame: LayerFrame) -> Result<LayerFrame> {
    let LayerFrame {
        layer,
        table,
        mut mapping,
        samples,
    } = frame;
    let (Some(x_name), Some(y_name)) = (mapping.column(Channel::X), mapping.column(Channel::Y)) else {
        return Ok(LayerFrame {
            layer,
            table,
            mapping,
            samples,
        });
    };
    let (Some(x_col), Some(y_col)) = (table.column(x_name), table.column(y_name)) else {
        return Ok(LayerFrame {
            layer,
            table,
            mapping,
            samples,
        });
    };
    if !y_col.kind.is_continuous() {
        return Err(PlotError::type_mismatch(y_name, "stacking needs numeric y values"));
    }

    let mut positive: BTreeMap<String, f64> = BTreeMap::new();
    let mut negative: BTreeMap<String, f64> = BTreeMap::new();
    let mut base = Vec::with_capacity(table.num_rows());
    let mut top = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let (x, y) = (&x_col.values[row], y_col.values[row].as_f64());
        match y {
            Some(v) if !x.is_null() && v.is_finite() => {
                let acc = if v >= 0.0 { &mut positive } else { &mut negative };
                let start = acc.entry(x.key()).or_insert(0.0);
                base.push(*start);
                *start += v;
                top.push(*start);
            }
            _ => {
                base.push(f64::NAN);
                top.push(f64::NAN);
            }
        }
    }

    let y_name = y_name.to_string();
    let table = replace_numeric(table, &y_name, top)?;
    let table = replace_numeric(table, STACK_BASE_COLUMN, base)?;
    mapping = mapping.map(Channel::Ymin, STACK_BASE_COLUMN);
    Ok(LayerFrame {
        layer,
        table,
        mapping,
        samples,
    })
}

/// Smallest gap between distinct sorted values, or 1 when there is none.
pub fn resolution(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
        .unwrap_or(1.0)
}

/// Give bars and boxes on a continuous x an explicit horizontal extent.
fn add_bar_extents(frame: LayerFrame, width: f64) -> Result<LayerFrame> {
    let x_col = frame.mapping.column(Channel::X).and_then(|c| frame.table.column(c));
    let Some(x_col) = x_col.filter(|c| c.kind.is_continuous()) else {
        return Ok(frame);
    };
    if frame.table.has_column(XMIN_COLUMN) && frame.table.has_column(XMAX_COLUMN) {
        return Ok(frame);
    }
    let xs: Vec<Option<f64>> = x_col.values.iter().map(Value::as_f64).collect();
    let res = resolution(&xs.iter().flatten().copied().collect::<Vec<_>>());
    let half = res * width / 2.0;
    let lo = xs.iter().map(|x| x.map_or(f64::NAN, |x| x - half)).collect();
    let hi = xs.iter().map(|x| x.map_or(f64::NAN, |x| x + half)).collect();

    let LayerFrame {
        layer,
        table,
        mapping,
        samples,
    } = frame;
    let table = replace_numeric(table, XMIN_COLUMN, lo)?;
    let table = replace_numeric(table, XMAX_COLUMN, hi)?;
    Ok(LayerFrame {
        layer,
        table,
        mapping,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Projection;
    use crate::facet::Facet;
    use crate::layer::Layer;
    use crate::resolve::resolve_scene;
    use crate::scene::Scene;

    fn sales() -> Table {
        Table::new(vec![
            Column::categorical("region", &["east", "east", "west", "west"]),
            Column::categorical("product", &["a", "b", "a", "b"]),
            Column::numeric("units", vec![3.0, 2.0, 4.0, -1.0]),
        ])
        .unwrap()
    }

    fn transform(scene: Scene) -> RenderData {
        apply_transformations(&resolve_scene(&scene).unwrap()).unwrap()
    }

    #[test]
    fn test_single_panel_without_facet() {
        let data = transform(
            Scene::new(sales())
                .aes(Channel::X, "region")
                .aes(Channel::Y, "units")
                .layer(Layer::col()),
        );
        assert_eq!(data.panels.len(), 1);
        assert_eq!(data.layout.nrow, 1);
        assert_eq!(data.panels[0].layers[0].table.num_rows(), 4);
    }

    #[test]
    fn test_facet_splits_rows() {
        let data = transform(
            Scene::new(sales())
                .aes(Channel::X, "product")
                .aes(Channel::Y, "units")
                .layer(Layer::col())
                .facet(Facet::wrap(&["region"])),
        );
        assert_eq!(data.panels.len(), 2);
        let sizes: Vec<usize> = data.panels.iter().map(|p| p.layers[0].table.num_rows()).collect();
        assert_eq!(sizes, vec![2, 2]);
        assert_eq!(data.panels[1].key, vec![("region".to_string(), "west".to_string())]);
    }

    #[test]
    fn test_layer_without_facet_column_repeats() {
        let reference = Table::new(vec![Column::numeric("level", vec![2.5])]).unwrap();
        let data = transform(
            Scene::new(sales())
                .aes(Channel::X, "product")
                .aes(Channel::Y, "units")
                .layer(Layer::col())
                .layer(
                    Layer::point()
                        .data(reference)
                        .aes(Channel::X, "level")
                        .aes(Channel::Y, "level"),
                )
                .facet(Facet::wrap(&["region"])),
        );
        assert!(data.panels.iter().all(|p| p.layers[1].table.num_rows() == 1));
    }

    #[test]
    fn test_stack_positive_and_negative() {
        let data = transform(
            Scene::new(sales())
                .aes(Channel::X, "region")
                .aes(Channel::Y, "units")
                .aes(Channel::Fill, "product")
                .layer(Layer::col().position(Position::Stack)),
        );
        let frame = &data.panels[0].layers[0];
        let top: Vec<f64> = frame.table.column("units").unwrap().values.iter().filter_map(Value::as_f64).collect();
        let base: Vec<f64> = frame.table.column(STACK_BASE_COLUMN).unwrap().values.iter().filter_map(Value::as_f64).collect();
        assert_eq!(top, vec![3.0, 5.0, 4.0, -1.0]);
        assert_eq!(base, vec![0.0, 3.0, 0.0, 0.0]);
        assert_eq!(frame.mapping.column(Channel::Ymin), Some(STACK_BASE_COLUMN));
    }

    #[test]
    fn test_bar_extents_on_continuous_x() {
        let table = Table::new(vec![
            Column::numeric("year", vec![2000.0, 2002.0, 2004.0]),
            Column::numeric("n", vec![1.0, 2.0, 3.0]),
        ])
        .unwrap();
        let data = transform(
            Scene::new(table)
                .aes(Channel::X, "year")
                .aes(Channel::Y, "n")
                .layer(Layer::col()),
        );
        let frame = &data.panels[0].layers[0];
        let xmin = frame.table.column(XMIN_COLUMN).unwrap().values[0].as_f64().unwrap();
        assert!((xmin - (2000.0 - 0.9)).abs() < 1e-9);
    }

    #[test]
    fn test_map_window_drops_and_projects() {
        let cities = Table::new(vec![
            Column::numeric("lon", vec![0.0, 50.0]),
            Column::numeric("lat", vec![45.0, 45.0]),
        ])
        .unwrap();
        let data = transform(
            Scene::new(cities)
                .aes(Channel::X, "lon")
                .aes(Channel::Y, "lat")
                .layer(Layer::point())
                .coord(Coord::map(Projection::Mercator).xlim(-10.0, 10.0).ylim(30.0, 60.0)),
        );
        let frame = &data.panels[0].layers[0];
        assert_eq!(frame.table.num_rows(), 1);
        let y = frame.table.column("lat").unwrap().values[0].as_f64().unwrap();
        assert!(y > 45.0);
    }

    #[test]
    fn test_map_polygon_clipped() {
        let square = Table::new(vec![
            Column::numeric("lon", vec![-20.0, 20.0, 20.0, -20.0]),
            Column::numeric("lat", vec![-20.0, -20.0, 20.0, 20.0]),
        ])
        .unwrap();
        let data = transform(
            Scene::new(square)
                .aes(Channel::X, "lon")
                .aes(Channel::Y, "lat")
                .layer(Layer::polygon())
                .coord(Coord::map(Projection::Equirectangular).xlim(0.0, 10.0).ylim(0.0, 10.0)),
        );
        let frame = &data.panels[0].layers[0];
        let xs: Vec<f64> = frame.table.column("lon").unwrap().values.iter().filter_map(Value::as_f64).collect();
        assert!(!xs.is_empty());
        assert!(xs.iter().all(|x| (0.0..=10.0).contains(x)));
    }

    #[test]
    fn test_resolution() {
        assert_eq!(resolution(&[1.0, 3.0, 4.0]), 1.0);
        assert_eq!(resolution(&[5.0]), 1.0);
        assert_eq!(resolution(&[0.0, 0.5, 2.0]), 0.5);
    }

    #[test]
    fn test_facet_column_missing_everywhere() {
        let scene = Scene::new(sales())
            .aes(Channel::X, "product")
            .aes(Channel::Y, "units")
            .layer(Layer::col())
            .facet(Facet::wrap(&["country"]));
        let spec = resolve_scene(&scene).unwrap();
        assert!(matches!(apply_transformations(&spec), Err(PlotError::UnknownColumn { .. })));
    }
}
