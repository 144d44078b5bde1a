// Lexical helpers shared by the DSL parsers

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, recognize},
    multi::many0_count,
    number::complete::double,
    sequence::{delimited, pair},
    IResult,
};

/// Surround a parser with optional whitespace.
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Column or function name: a letter or underscore, then letters, digits, `_` or `.`.
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_"), tag(".")))),
        )),
        String::from,
    )(input)
}

/// Double- or single-quoted string without escapes.
pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        )),
        String::from,
    )(input)
}

pub fn number_literal(input: &str) -> IResult<&str, f64> {
    double(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("sepal.length rest"), Ok((" rest", "sepal.length".to_string())));
        assert_eq!(identifier("_x1"), Ok(("", "_x1".to_string())));
        assert!(identifier("1x").is_err());
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal(r#""red" x"#), Ok((" x", "red".to_string())));
        assert_eq!(string_literal("'a b'"), Ok(("", "a b".to_string())));
        assert_eq!(string_literal(r#""""#), Ok(("", String::new())));
        assert!(string_literal(r#""open"#).is_err());
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("-2.5)"), Ok((")", -2.5)));
        assert_eq!(number_literal("10"), Ok(("", 10.0)));
    }

    #[test]
    fn test_ws() {
        assert_eq!(ws(identifier)("  abc  |"), Ok(("|", "abc".to_string())));
    }
}
