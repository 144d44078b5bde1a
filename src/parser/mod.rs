//! The pipe DSL.
//!
//! ```text
//! aes(x: region, y: sales) | col(fill: "steelblue") | facet_wrap(by: year) | theme_minimal()
//! ```
//!
//! Parsing produces generic call nodes; [`parse_scene`] then applies each call, in order,
//! to a [`Scene`] builder so the DSL has exactly the semantics of the builder API.

pub mod ast;
pub mod lexer;
pub mod pipeline;

mod aesthetics;
mod coord;
mod facet;
mod geom;
mod labels;
mod scale;
mod theme;

pub use ast::{Arg, ArgValue, Call};
pub use pipeline::parse_pipeline;

use crate::data::Table;
use crate::error::{PlotError, Result};
use crate::scene::Scene;
use tracing::debug;

/// Parse a pipeline and apply it to a scene over `data`.
pub fn parse_scene(input: &str, data: Table) -> Result<Scene> {
    let calls = parse_pipeline(input)?;
    debug!(calls = calls.len(), "parsed pipeline");
    calls.iter().try_fold(Scene::new(data), apply_call)
}

fn apply_call(scene: Scene, call: &Call) -> Result<Scene> {
    let name = call.name.as_str();
    Ok(match name {
        "aes" => scene.mapping(aesthetics::mapping(call)?),
        "labs" => scene.labs(labels::labels(call)?),
        "facet_wrap" | "facet_grid" => scene.facet(facet::facet(call)?),
        "xlim" | "ylim" => scene.scale(scale::limits(call)?),
        _ if geom::is_geom(name) => scene.layer(geom::layer(call)?),
        _ if name.starts_with("scale_") => scene.scale(scale::scale(call)?),
        _ if name.starts_with("coord_") => scene.coord(coord::coord(call)?),
        _ if name == "theme" || name.starts_with("theme_") => scene.theme(theme::theme(call)?),
        _ => return Err(PlotError::Parse(format!("Unknown function '{}'", name))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::Channel;
    use crate::coord::Coord;
    use crate::data::Column;
    use crate::facet::Facet;
    use crate::layer::{Geom, Position};
    use crate::theme::{LegendPosition, Preset};

    fn table() -> Table {
        Table::new(vec![
            Column::numeric("time", vec![1.0, 2.0, 3.0]),
            Column::numeric("temp", vec![10.0, 12.0, 11.0]),
            Column::categorical("city", &["a", "b", "a"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_scene_from_pipeline() {
        let scene = parse_scene(
            r#"aes(x: time, y: temp) | line(color: city) | point(size: 4, color: "red")"#,
            table(),
        )
        .unwrap();
        assert_eq!(scene.mapping.column(Channel::X), Some("time"));
        assert_eq!(scene.layers.len(), 2);
        assert_eq!(scene.layers[0].mapping.column(Channel::Color), Some("city"));
        assert_eq!(scene.layers[1].params.color.as_deref(), Some("red"));
        assert_eq!(scene.layers[1].params.size, Some(4.0));
    }

    #[test]
    fn test_full_pipeline_builds() {
        let scene = parse_scene(
            r#"aes(x: city, y: temp) | col(fill: city, position: dodge) | coord_flip()
               | facet_wrap(by: city, ncol: 2) | labs(title: "Temps", y: "Celsius")
               | theme_classic() | theme(legend_position: "bottom")"#,
            table(),
        )
        .unwrap();
        assert_eq!(scene.layers[0].geom, Geom::Bar);
        assert_eq!(scene.layers[0].position, Position::Dodge);
        assert_eq!(scene.coord, Coord::flip());
        assert!(matches!(scene.facet, Some(Facet::Wrap { ncol: Some(2), .. })));
        assert_eq!(scene.labels.title.as_deref(), Some("Temps"));
        assert_eq!(scene.theme.preset, Some(Preset::Classic));
        assert_eq!(scene.theme.elements().legend_position, LegendPosition::Bottom);
        let plot = scene.build().unwrap();
        assert_eq!(plot.panel_count(), 2);
    }

    #[test]
    fn test_unknown_channel() {
        let err = parse_scene("aes(x: time, colour_by: city) | point()", table()).unwrap_err();
        assert!(matches!(err, PlotError::InvalidChannel(ref c) if c == "colour_by"));
    }

    #[test]
    fn test_unknown_function() {
        let err = parse_scene("aes(x: time, y: temp) | sparkle()", table()).unwrap_err();
        assert!(matches!(err, PlotError::Parse(ref m) if m.contains("sparkle")));
    }

    #[test]
    fn test_missing_geom_fails_at_build() {
        let scene = parse_scene("aes(x: time, y: temp)", table()).unwrap();
        assert!(matches!(scene.build(), Err(PlotError::InvalidSpec(_))));
    }
}
