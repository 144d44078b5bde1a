// Labels interpreter

use super::ast::Call;
use crate::aes::Channel;
use crate::error::Result;
use crate::scene::Labels;

/// `labs(title: "...", subtitle: "...", caption: "...", x: "...", y: "...", color: "...")`
pub(super) fn labels(call: &Call) -> Result<Labels> {
    let mut labels = Labels::default();
    for (name, value) in call.named()? {
        let text = call.text(name, value)?;
        labels = match name {
            "title" => labels.title(text),
            "subtitle" => labels.subtitle(text),
            "caption" => labels.caption(text),
            "x" => labels.x(text),
            "y" => labels.y(text),
            other => labels.legend(other.parse::<Channel>()?, text),
        };
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlotError;
    use crate::parser::pipeline::parse_pipeline;

    fn parse(input: &str) -> Result<Labels> {
        labels(&parse_pipeline(input)?[0])
    }

    #[test]
    fn test_parse_labs() {
        let l = parse(r#"labs(title: "My Plot", x: "Time", fill: "Region")"#).unwrap();
        assert_eq!(l.title.as_deref(), Some("My Plot"));
        assert_eq!(l.x.as_deref(), Some("Time"));
        assert_eq!(l.y, None);
        assert_eq!(l.legends.get(&Channel::Fill).map(String::as_str), Some("Region"));
    }

    #[test]
    fn test_parse_labs_unknown_key() {
        assert!(matches!(parse(r#"labs(footer: "x")"#), Err(PlotError::InvalidChannel(_))));
    }

    #[test]
    fn test_parse_labs_number() {
        assert!(matches!(parse("labs(title: 5)"), Err(PlotError::Parse(_))));
    }
}
