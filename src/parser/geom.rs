// Geometry (layer) interpreter

use super::ast::{ArgValue, Call};
use crate::aes::{Channel, Mapping};
use crate::error::Result;
use crate::layer::{Layer, Position};
use crate::stat::Stat;

const GEOMS: [&str; 12] = [
    "point", "line", "area", "bar", "col", "histogram", "density", "boxplot", "violin", "segment", "text",
    "polygon",
];

pub(super) fn is_geom(name: &str) -> bool {
    GEOMS.contains(&name)
}

/// Parse a layer call.
///
/// Format: `point()` or `point(color: "red", size: 3, shape: kind, ...)`. A bare name maps the
/// channel to a column; a literal fixes the attribute for the whole layer.
pub(super) fn layer(call: &Call) -> Result<Layer> {
    let mut layer = match call.name.as_str() {
        "point" => Layer::point(),
        "line" => Layer::line(),
        "area" => Layer::area(),
        "bar" => Layer::bar(),
        "col" => Layer::col(),
        "histogram" => Layer::histogram(),
        "density" => Layer::density(),
        "boxplot" => Layer::boxplot(),
        "violin" => Layer::violin(),
        "segment" => Layer::segment(),
        "text" => Layer::text(),
        "polygon" => Layer::polygon(),
        other => return Err(call.error(format!("'{}' is not a geometry", other))),
    };

    for (name, value) in call.named()? {
        layer = match (name, value) {
            ("position", v) => layer.position(position(call, call.text(name, v)?)?),
            ("stat", v) => layer.stat(stat(call, call.text(name, v)?)?),
            ("bins" | "binwidth" | "boundary" | "adjust", v) => {
                let stat = stat_param(call, layer.stat.clone(), name, v)?;
                layer.stat(stat)
            }
            ("width", v) => layer.width(call.number(name, v)?),
            ("linewidth", v) => layer.linewidth(call.number(name, v)?),
            (_, ArgValue::Ident(column)) => layer.aes(name.parse::<Channel>()?, column.clone()),
            ("color" | "colour", ArgValue::Str(c)) => layer.color(c.clone()),
            ("fill", ArgValue::Str(c)) => layer.fill(c.clone()),
            ("shape", ArgValue::Str(s)) => layer.shape(s.clone()),
            ("label", ArgValue::Str(s)) => layer.mapping(Mapping::new().fixed(Channel::Label, s.as_str())),
            ("alpha", v) => layer.alpha(call.number(name, v)?),
            ("size", v) => layer.size(call.number(name, v)?),
            (_, ArgValue::Str(column)) => layer.aes(name.parse::<Channel>()?, column.clone()),
            _ => return Err(call.unknown(name)),
        };
    }
    Ok(layer)
}

fn position(call: &Call, name: &str) -> Result<Position> {
    match name {
        "identity" => Ok(Position::Identity),
        "stack" => Ok(Position::Stack),
        "dodge" => Ok(Position::Dodge),
        other => Err(call.error(format!("unknown position '{}'", other))),
    }
}

fn stat(call: &Call, name: &str) -> Result<Stat> {
    match name {
        "identity" => Ok(Stat::Identity),
        "count" => Ok(Stat::Count),
        "bin" => Ok(Stat::bin()),
        "density" => Ok(Stat::density()),
        "proportion" | "prop" => Ok(Stat::Proportion),
        "boxplot" => Ok(Stat::Boxplot),
        "violin" => Ok(Stat::Violin),
        other => Err(call.error(format!("unknown stat '{}'", other))),
    }
}

/// Adjust a binning or density parameter of the layer's stat.
fn stat_param(call: &Call, mut stat: Stat, name: &str, value: &ArgValue) -> Result<Stat> {
    match (&mut stat, name) {
        (Stat::Bin { bins, .. }, "bins") => *bins = call.count(name, value)?,
        (Stat::Bin { binwidth, .. }, "binwidth") => {
            let width = call.number(name, value)?;
            if width <= 0.0 {
                return Err(call.error("'binwidth' must be positive"));
            }
            *binwidth = Some(width);
        }
        (Stat::Bin { boundary, .. }, "boundary") => *boundary = Some(call.number(name, value)?),
        (Stat::Density { adjust, .. }, "adjust") => {
            let factor = call.number(name, value)?;
            if factor <= 0.0 {
                return Err(call.error("'adjust' must be positive"));
            }
            *adjust = factor;
        }
        _ => {
            return Err(call.error(format!("'{}' does not apply to the {} stat", name, stat.name())));
        }
    }
    Ok(stat)
}
