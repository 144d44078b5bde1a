// Scale interpreter: scale_<channel>_<kind>(...), xlim(...), ylim(...)

use super::ast::{ArgValue, Call};
use crate::aes::Channel;
use crate::error::Result;
use crate::scale::{ScaleKind, ScaleSpec, Transform};

/// `xlim(0, 10)` / `ylim(0, 10)`: fixed continuous limits.
pub(super) fn limits(call: &Call) -> Result<ScaleSpec> {
    let channel = if call.name == "xlim" { Channel::X } else { Channel::Y };
    let (lo, hi) = call.range()?;
    Ok(ScaleSpec::continuous(channel).limits(lo, hi))
}

/// `scale_x_log10()`, `scale_fill_manual(breaks: [a, b], values: ["red", "blue"])`,
/// `scale_color_gradient(low: "white", high: "darkred")`, `scale_size(range: [1, 8])`, ...
pub(super) fn scale(call: &Call) -> Result<ScaleSpec> {
    let rest = call.name.trim_start_matches("scale_");
    let (channel_name, kind) = rest.split_once('_').unwrap_or((rest, "continuous"));
    let channel: Channel = channel_name.parse()?;
    if channel.scale_channel() != Some(channel) {
        return Err(call.error(format!("'{}' has no scale of its own", channel_name)));
    }

    let mut spec = match kind {
        "continuous" => ScaleSpec::continuous(channel),
        "discrete" => ScaleSpec::discrete(channel),
        "log10" => ScaleSpec::log10(channel),
        "sqrt" => ScaleSpec::sqrt(channel),
        "reverse" => ScaleSpec::reverse(channel),
        "identity" => ScaleSpec::identity(channel),
        "manual" => ScaleSpec::discrete(channel),
        "gradient" => ScaleSpec::continuous(channel),
        other => return Err(call.error(format!("unknown scale kind '{}'", other))),
    };

    let mut breaks: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();
    let (mut low, mut high) = (None, None);
    for (name, value) in call.named()? {
        match name {
            "name" => spec = spec.name(call.text(name, value)?),
            "limits" => {
                let (lo, hi) = pair(call, name, value)?;
                spec = spec.limits(lo, hi);
            }
            "range" => {
                let (lo, hi) = pair(call, name, value)?;
                spec = spec.range(lo, hi);
            }
            "palette" => spec = spec.palette(&call.names(name, value)?),
            "breaks" => breaks = call.names(name, value)?,
            "values" => values = call.names(name, value)?,
            "low" => low = Some(call.text(name, value)?.to_string()),
            "high" => high = Some(call.text(name, value)?.to_string()),
            "trans" | "transform" => spec = spec.transform(transform(call, call.text(name, value)?)?),
            _ => return Err(call.unknown(name)),
        }
    }

    if kind == "manual" {
        if breaks.is_empty() {
            spec = spec.palette(&values);
        } else if breaks.len() != values.len() {
            return Err(call.error(format!(
                "{} breaks but {} values",
                breaks.len(),
                values.len()
            )));
        } else {
            let pairs: Vec<(String, String)> = breaks.into_iter().zip(values).collect();
            spec = ScaleSpec {
                kind: ScaleKind::Manual,
                ..spec
            };
            spec.values = pairs;
        }
    }
    if low.is_some() || high.is_some() {
        let low = low.unwrap_or_else(|| "#132B43".to_string());
        let high = high.unwrap_or_else(|| "#56B1F7".to_string());
        spec = spec.palette(&[low, high]);
    }
    Ok(spec)
}

fn pair(call: &Call, name: &str, value: &ArgValue) -> Result<(f64, f64)> {
    match value {
        ArgValue::List(items) if items.len() == 2 => Ok((call.number(name, &items[0])?, call.number(name, &items[1])?)),
        _ => Err(call.error(format!("'{}' expects [min, max]", name))),
    }
}

fn transform(call: &Call, name: &str) -> Result<Transform> {
    match name {
        "identity" => Ok(Transform::Identity),
        "log10" => Ok(Transform::Log10),
        "sqrt" => Ok(Transform::Sqrt),
        "reverse" => Ok(Transform::Reverse),
        other => Err(call.error(format!("unknown transform '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlotError;
    use crate::parser::pipeline::parse_pipeline;

    fn parse(input: &str) -> Result<ScaleSpec> {
        let call = &parse_pipeline(input)?[0];
        if call.name.starts_with("scale_") {
            scale(call)
        } else {
            limits(call)
        }
    }

    #[test]
    fn test_parse_log_scale() {
        let spec = parse(r#"scale_y_log10(name: "Population")"#).unwrap();
        assert_eq!(spec.channel, Channel::Y);
        assert_eq!(spec.transform, Transform::Log10);
        assert_eq!(spec.name.as_deref(), Some("Population"));
    }

    #[test]
    fn test_parse_xlim() {
        let spec = parse("xlim(0, 100)").unwrap();
        assert_eq!(spec.limits, Some((0.0, 100.0)));
        assert!(parse("ylim(3)").is_err());
    }

    #[test]
    fn test_parse_manual_pairs() {
        let spec = parse(r#"scale_fill_manual(breaks: [north, south], values: ["red", "blue"])"#).unwrap();
        assert_eq!(spec.kind, ScaleKind::Manual);
        assert_eq!(spec.values[1], ("south".to_string(), "blue".to_string()));
    }

    #[test]
    fn test_parse_manual_palette() {
        let spec = parse(r#"scale_color_manual(values: ["red", "blue"])"#).unwrap();
        assert_eq!(spec.kind, ScaleKind::Discrete);
        assert_eq!(spec.palette, vec!["red".to_string(), "blue".to_string()]);
    }

    #[test]
    fn test_parse_manual_mismatch() {
        assert!(parse(r#"scale_fill_manual(breaks: [a], values: ["red", "blue"])"#).is_err());
    }

    #[test]
    fn test_parse_gradient() {
        let spec = parse(r#"scale_colour_gradient(low: "white", high: "darkred")"#).unwrap();
        assert_eq!(spec.channel, Channel::Color);
        assert_eq!(spec.palette, vec!["white".to_string(), "darkred".to_string()]);
    }

    #[test]
    fn test_parse_size_range() {
        let spec = parse("scale_size(range: [1, 8])").unwrap();
        assert_eq!(spec.channel, Channel::Size);
        assert_eq!(spec.range, Some((1.0, 8.0)));
    }

    #[test]
    fn test_parse_unknown_channel() {
        assert!(matches!(parse("scale_glow_continuous()"), Err(PlotError::InvalidChannel(_))));
    }
}
