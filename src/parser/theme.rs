// Theme interpreter

use super::ast::{ArgValue, Call};
use crate::error::Result;
use crate::theme::{ElementLine, ElementRect, ElementText, Preset, Theme, ThemeElement, ThemeValue};

/// `theme_minimal()`, `theme_classic()`, ... or
/// `theme(legend_position: "bottom", plot_title: element_text(size: 20, face: "bold"))`.
///
/// Keys are checked when the theme is resolved, so unknown keys only warn.
pub(super) fn theme(call: &Call) -> Result<Theme> {
    if let Some(preset) = call.name.strip_prefix("theme_") {
        if let Some((name, _)) = call.named()?.first() {
            return Err(call.unknown(name));
        }
        return Ok(Theme::new(preset.parse::<Preset>()?));
    }

    let mut theme = Theme::default();
    for (key, value) in call.named()? {
        let value = match value {
            ArgValue::Call(inner) => ThemeValue::Element(element(inner)?),
            ArgValue::Ident(s) | ArgValue::Str(s) => ThemeValue::Text(s.clone()),
            ArgValue::Number(n) => ThemeValue::Number(*n),
            ArgValue::Bool(b) => ThemeValue::Bool(*b),
            ArgValue::List(_) => return Err(call.error(format!("'{}' does not take a list", key))),
        };
        theme = theme.set(key, value);
    }
    Ok(theme)
}

/// `element_text(...)`, `element_line(...)`, `element_rect(...)`, `element_blank()`.
fn element(call: &Call) -> Result<ThemeElement> {
    let args = call.named()?;
    match call.name.as_str() {
        "element_blank" => match args.first() {
            Some((name, _)) => Err(call.unknown(name)),
            None => Ok(ThemeElement::Blank),
        },
        "element_text" => {
            let mut text = ElementText::default();
            for (name, value) in args {
                match name {
                    "family" => text.family = Some(call.text(name, value)?.to_string()),
                    "color" | "colour" => text.color = Some(call.text(name, value)?.to_string()),
                    "size" => text.size = Some(call.number(name, value)?),
                    "face" => text.face = Some(call.text(name, value)?.to_string()),
                    "hjust" => text.hjust = Some(call.number(name, value)?),
                    _ => return Err(call.unknown(name)),
                }
            }
            Ok(ThemeElement::Text(text))
        }
        "element_line" => {
            let mut line = ElementLine::default();
            for (name, value) in args {
                match name {
                    "color" | "colour" => line.color = Some(call.text(name, value)?.to_string()),
                    "width" | "linewidth" => line.width = Some(call.number(name, value)?),
                    _ => return Err(call.unknown(name)),
                }
            }
            Ok(ThemeElement::Line(line))
        }
        "element_rect" => {
            let mut rect = ElementRect::default();
            for (name, value) in args {
                match name {
                    "fill" => rect.fill = Some(call.text(name, value)?.to_string()),
                    "color" | "colour" => rect.color = Some(call.text(name, value)?.to_string()),
                    "width" | "linewidth" => rect.width = Some(call.number(name, value)?),
                    _ => return Err(call.unknown(name)),
                }
            }
            Ok(ThemeElement::Rect(rect))
        }
        other => Err(call.error(format!("'{}' is not a theme element", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::LegendPosition;
    use crate::parser::pipeline::parse_pipeline;

    fn parse(input: &str) -> Result<Theme> {
        theme(&parse_pipeline(input)?[0])
    }

    #[test]
    fn test_parse_presets() {
        assert_eq!(parse("theme_minimal()").unwrap(), Theme::minimal());
        assert_eq!(parse("theme_high_contrast()").unwrap(), Theme::high_contrast());
        assert!(parse("theme_neon()").is_err());
        assert!(parse("theme_classic(size: 3)").is_err());
    }

    #[test]
    fn test_parse_element_text() {
        let t = parse(r##"theme(plot_title: element_text(size: 20, face: "bold", color: "#333333"))"##).unwrap();
        let expected = ElementText {
            size: Some(20.0),
            face: Some("bold".to_string()),
            color: Some("#333333".to_string()),
            ..Default::default()
        };
        assert_eq!(t.elements().plot_title, ThemeElement::Text(expected));
    }

    #[test]
    fn test_parse_element_blank_and_line() {
        let t = parse(r#"theme(panel_grid_minor: element_blank(), axis_line: element_line(color: "black", width: 1.5))"#)
            .unwrap();
        let elements = t.elements();
        assert_eq!(elements.panel_grid_minor, ThemeElement::Blank);
        assert_eq!(
            elements.axis_line,
            ThemeElement::Line(ElementLine {
                color: Some("black".to_string()),
                width: Some(1.5)
            })
        );
    }

    #[test]
    fn test_parse_legend_settings() {
        let t = parse(r#"theme(legend_position: "top", legend_show: false)"#).unwrap();
        let elements = t.elements();
        assert_eq!(elements.legend_position, LegendPosition::Top);
        assert!(!elements.legend_show);
    }

    #[test]
    fn test_unknown_key_is_kept_and_ignored() {
        let t = parse("theme(sparkle: true)").unwrap();
        assert_eq!(t.overrides.len(), 1);
        assert_eq!(t.elements(), Theme::default().elements());
    }

    #[test]
    fn test_parse_theme_errors() {
        assert!(parse("theme(plot_title: element_text(weight: 3))").is_err());
        assert!(parse("theme(plot_title: element_circle())").is_err());
        assert!(parse("theme(axis_text: [1, 2])").is_err());
    }
}
