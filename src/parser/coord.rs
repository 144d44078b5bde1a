// Coordinate system interpreter

use super::ast::{ArgValue, Call};
use crate::coord::{Coord, Projection};
use crate::error::Result;

/// `coord_cartesian(xlim: [0, 5])`, `coord_flip()`, `coord_map(projection: mercator, ylim: [30, 60])`.
pub(super) fn coord(call: &Call) -> Result<Coord> {
    let args = call.named()?;
    let mut coord = match call.name.as_str() {
        "coord_cartesian" => Coord::cartesian(),
        "coord_flip" => Coord::flip(),
        "coord_map" => {
            let projection = match args.iter().find(|(name, _)| *name == "projection") {
                Some((name, value)) => parse_projection(call, call.text(name, value)?)?,
                None => Projection::default(),
            };
            Coord::map(projection)
        }
        other => return Err(call.error(format!("unknown coordinate system '{}'", other))),
    };

    for (name, value) in args {
        coord = match name {
            "projection" if coord.is_map() => coord,
            "xlim" => {
                let (lo, hi) = bounds(call, name, value)?;
                coord.xlim(lo, hi)
            }
            "ylim" => {
                let (lo, hi) = bounds(call, name, value)?;
                coord.ylim(lo, hi)
            }
            _ => return Err(call.unknown(name)),
        };
    }
    Ok(coord)
}

fn parse_projection(call: &Call, name: &str) -> Result<Projection> {
    match name {
        "equirectangular" | "plate_carree" => Ok(Projection::Equirectangular),
        "mercator" => Ok(Projection::Mercator),
        other => Err(call.error(format!("unknown projection '{}'", other))),
    }
}

fn bounds(call: &Call, name: &str, value: &ArgValue) -> Result<(f64, f64)> {
    match value {
        ArgValue::List(items) if items.len() == 2 => Ok((call.number(name, &items[0])?, call.number(name, &items[1])?)),
        _ => Err(call.error(format!("'{}' expects [min, max]", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::pipeline::parse_pipeline;

    fn parse(input: &str) -> Result<Coord> {
        coord(&parse_pipeline(input)?[0])
    }

    #[test]
    fn test_parse_coord_flip() {
        assert_eq!(parse("coord_flip()").unwrap(), Coord::flip());
    }

    #[test]
    fn test_parse_coord_cartesian_zoom() {
        assert_eq!(
            parse("coord_cartesian(xlim: [0, 5])").unwrap(),
            Coord::cartesian().xlim(0.0, 5.0)
        );
    }

    #[test]
    fn test_parse_coord_map() {
        let c = parse("coord_map(projection: mercator, xlim: [-10, 30], ylim: [35, 60])").unwrap();
        assert_eq!(c, Coord::map(Projection::Mercator).xlim(-10.0, 30.0).ylim(35.0, 60.0));
    }

    #[test]
    fn test_parse_coord_errors() {
        assert!(parse("coord_polar()").is_err());
        assert!(parse("coord_map(projection: robinson)").is_err());
        assert!(parse("coord_flip(projection: mercator)").is_err());
        assert!(parse("coord_cartesian(xlim: 5)").is_err());
    }
}
