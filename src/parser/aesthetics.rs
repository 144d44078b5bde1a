// aes(...) interpreter

use super::ast::{ArgValue, Call};
use crate::aes::{AestheticValue, Channel, Constant, Mapping};
use crate::error::Result;

/// `aes(x: col, y: col, color: col, ...)`; names and strings are columns, numbers constants.
pub(super) fn mapping(call: &Call) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for (name, value) in call.named()? {
        let channel: Channel = name.parse()?;
        let value = match value {
            ArgValue::Number(n) => AestheticValue::Fixed(Constant::Number(*n)),
            other => AestheticValue::Mapped(call.text(name, other)?.to_string()),
        };
        mapping.set(channel, value);
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlotError;
    use crate::parser::pipeline::parse_pipeline;

    fn parse(input: &str) -> Result<Mapping> {
        mapping(&parse_pipeline(input)?[0])
    }

    #[test]
    fn test_parse_aesthetics() {
        let m = parse("aes(x: time, y: temp)").unwrap();
        assert_eq!(m.column(Channel::X), Some("time"));
        assert_eq!(m.column(Channel::Y), Some("temp"));
    }

    #[test]
    fn test_parse_aesthetics_any_order_and_extra_channels() {
        let m = parse(r#"aes(color: kind, y: "max temp", x: day, size: 2)"#).unwrap();
        assert_eq!(m.column(Channel::Y), Some("max temp"));
        assert_eq!(m.column(Channel::Color), Some("kind"));
        assert_eq!(m.get(Channel::Size), Some(&AestheticValue::Fixed(Constant::Number(2.0))));
    }

    #[test]
    fn test_parse_aesthetics_unknown_channel() {
        assert!(matches!(parse("aes(x: a, tint: b)"), Err(PlotError::InvalidChannel(_))));
    }

    #[test]
    fn test_parse_aesthetics_positional() {
        assert!(matches!(parse("aes(time, temp)"), Err(PlotError::Parse(_))));
    }

    #[test]
    fn test_parse_aesthetics_extra_comma() {
        assert!(parse("aes(x: time,, y: temp)").is_err());
    }
}
