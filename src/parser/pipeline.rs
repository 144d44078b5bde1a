// Pipeline parser: `stage | stage | ...`, every stage a call

use super::ast::{Arg, ArgValue, Call};
use super::lexer::{identifier, number_literal, string_literal, ws};
use crate::error::{PlotError, Result};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{eof, map, opt},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    Finish, IResult,
};

fn value(input: &str) -> IResult<&str, ArgValue> {
    ws(alt((
        map(call, ArgValue::Call),
        map(identifier, |word| match word.as_str() {
            "true" => ArgValue::Bool(true),
            "false" => ArgValue::Bool(false),
            _ => ArgValue::Ident(word),
        }),
        map(string_literal, ArgValue::Str),
        map(
            delimited(char('['), separated_list0(ws(char(',')), value), ws(char(']'))),
            ArgValue::List,
        ),
        map(number_literal, ArgValue::Number),
    )))(input)
}

fn arg(input: &str) -> IResult<&str, Arg> {
    alt((
        map(pair(ws(identifier), preceded(char(':'), value)), |(name, value)| Arg {
            name: Some(name),
            value,
        }),
        map(value, |value| Arg { name: None, value }),
    ))(input)
}

/// `name(arg, ...)`
pub fn call(input: &str) -> IResult<&str, Call> {
    let (input, name) = identifier(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), arg),
        ws(char(')')),
    )(input)?;
    Ok((input, Call { name, args }))
}

/// Parse a complete pipeline, optionally prefixed with `df |`.
pub fn parse_pipeline(input: &str) -> Result<Vec<Call>> {
    let parsed = terminated(
        preceded(
            opt(pair(ws(tag("df")), ws(char('|')))),
            separated_list1(ws(char('|')), ws(call)),
        ),
        ws(eof),
    )(input)
    .finish();

    match parsed {
        Ok((_, calls)) => Ok(calls),
        Err(e) => {
            let offset = input.len() - e.input.len();
            let excerpt: String = e.input.chars().take(24).collect();
            Err(PlotError::Parse(if excerpt.trim().is_empty() {
                format!("unexpected end of input at offset {}", offset)
            } else {
                format!("unexpected input at offset {}: '{}'", offset, excerpt)
            }))
        }
    }
}
