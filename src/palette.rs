//! Colours, palettes and point shapes.

use plotters::style::RGBColor;
use std::fmt;
use std::str::FromStr;

/// Default discrete colour palette (category10).
pub const CATEGORY10: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// Low end of the default continuous colour gradient.
pub const GRADIENT_LOW: RGBColor = RGBColor(0x13, 0x2B, 0x43);
/// High end of the default continuous colour gradient.
pub const GRADIENT_HIGH: RGBColor = RGBColor(0x56, 0xB1, 0xF7);

/// Colour used when a layer neither maps nor fixes a colour.
pub const DEFAULT_INK: RGBColor = RGBColor(0, 0, 0);
/// Default fill of bars, areas and boxes.
pub const DEFAULT_FILL: RGBColor = RGBColor(89, 89, 89);

/// Slot `i` of the default palette, cycling when exhausted.
pub fn category_color(index: usize) -> RGBColor {
    CATEGORY10[index % CATEGORY10.len()]
}

/// Linear interpolation between two colours, `t` clamped to `[0, 1]`.
pub fn interpolate(low: RGBColor, high: RGBColor, t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(lerp(low.0, high.0), lerp(low.1, high.1), lerp(low.2, high.2))
}

/// Parse a color string into RGBColor, supporting hex (#RRGGBB, #RGB) and named colors
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let color_str = color_str.trim();

    if color_str.starts_with('#') {
        return parse_hex_color(color_str);
    }

    match color_str.to_lowercase().as_str() {
        "white" => Some(RGBColor(255, 255, 255)),
        "black" => Some(RGBColor(0, 0, 0)),
        "red" => Some(RGBColor(255, 0, 0)),
        "green" => Some(RGBColor(0, 128, 0)),
        "blue" => Some(RGBColor(0, 0, 255)),
        "yellow" => Some(RGBColor(255, 255, 0)),
        "cyan" => Some(RGBColor(0, 255, 255)),
        "magenta" => Some(RGBColor(255, 0, 255)),
        "orange" => Some(RGBColor(255, 165, 0)),
        "purple" => Some(RGBColor(128, 0, 128)),
        "pink" => Some(RGBColor(255, 192, 203)),
        "brown" => Some(RGBColor(139, 69, 19)),
        "steelblue" => Some(RGBColor(70, 130, 180)),
        "darkred" => Some(RGBColor(139, 0, 0)),
        "darkgreen" => Some(RGBColor(0, 100, 0)),
        "navy" => Some(RGBColor(0, 0, 128)),
        "gray" | "grey" => Some(RGBColor(128, 128, 128)),
        "darkgray" | "darkgrey" => Some(RGBColor(64, 64, 64)),
        "lightgray" | "lightgrey" => Some(RGBColor(192, 192, 192)),
        // gray0 = black, gray100 = white
        s if s.starts_with("gray") || s.starts_with("grey") => {
            let n = s[4..].parse::<u8>().ok().filter(|n| *n <= 100)?;
            let v = (n as f64 * 2.55).round() as u8;
            Some(RGBColor(v, v, v))
        }
        _ => None,
    }
}

/// Parse hex color (#RRGGBB or #RGB)
fn parse_hex_color(hex: &str) -> Option<RGBColor> {
    let hex = hex.trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(RGBColor(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(RGBColor(r, g, b))
        }
        _ => None,
    }
}

/// Marker drawn for a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PointShape {
    Circle,
    Triangle,
    Square,
    Cross,
    Diamond,
}

impl PointShape {
    /// Discrete shape palette, in assignment order.
    pub const PALETTE: [PointShape; 5] = [
        PointShape::Circle,
        PointShape::Triangle,
        PointShape::Square,
        PointShape::Cross,
        PointShape::Diamond,
    ];

    pub fn nth(index: usize) -> PointShape {
        Self::PALETTE[index % Self::PALETTE.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            PointShape::Circle => "circle",
            PointShape::Triangle => "triangle",
            PointShape::Square => "square",
            PointShape::Cross => "cross",
            PointShape::Diamond => "diamond",
        }
    }
}

impl fmt::Display for PointShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PointShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "circle" | "dot" => Ok(PointShape::Circle),
            "triangle" => Ok(PointShape::Triangle),
            "square" => Ok(PointShape::Square),
            "cross" | "plus" => Ok(PointShape::Cross),
            "diamond" => Ok(PointShape::Diamond),
            other => Err(format!("unknown shape '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_hex() {
        assert_eq!(parse_color("#FF0000"), Some(RGBColor(255, 0, 0)));
        assert_eq!(parse_color("#f00"), Some(RGBColor(255, 0, 0)));
        assert_eq!(parse_color("#12345"), None);
    }

    #[test]
    fn test_parse_color_named_and_gray() {
        assert_eq!(parse_color("Red"), Some(RGBColor(255, 0, 0)));
        assert_eq!(parse_color("gray50"), Some(RGBColor(127, 127, 127)));
        assert_eq!(parse_color("grey100"), Some(RGBColor(255, 255, 255)));
        assert_eq!(parse_color("gray200"), None);
        assert_eq!(parse_color("notacolor"), None);
    }

    #[test]
    fn test_category_palette_cycles() {
        assert_eq!(category_color(0), category_color(10));
        assert_ne!(category_color(0), category_color(1));
    }

    #[test]
    fn test_interpolate_endpoints() {
        assert_eq!(interpolate(GRADIENT_LOW, GRADIENT_HIGH, 0.0), GRADIENT_LOW);
        assert_eq!(interpolate(GRADIENT_LOW, GRADIENT_HIGH, 1.0), GRADIENT_HIGH);
        assert_eq!(interpolate(GRADIENT_LOW, GRADIENT_HIGH, 7.0), GRADIENT_HIGH);
    }

    #[test]
    fn test_shape_names() {
        assert_eq!("Diamond".parse::<PointShape>(), Ok(PointShape::Diamond));
        assert!("hexagon".parse::<PointShape>().is_err());
        assert_eq!(PointShape::nth(5), PointShape::Circle);
    }
}
