// Abstract syntax tree for the pipe DSL

use crate::error::{PlotError, Result};

/// Argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Bare word: a column name, or a keyword such as `dodge`.
    Ident(String),
    Str(String),
    Number(f64),
    Bool(bool),
    List(Vec<ArgValue>),
    Call(Call),
}

impl ArgValue {
    /// Text of a bare word or string literal.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Ident(s) | ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            ArgValue::Ident(_) => "a name",
            ArgValue::Str(_) => "a string",
            ArgValue::Number(_) => "a number",
            ArgValue::Bool(_) => "a boolean",
            ArgValue::List(_) => "a list",
            ArgValue::Call(_) => "a call",
        }
    }
}

/// `name: value`, or a bare positional value.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: ArgValue,
}

/// One pipeline stage, e.g. `point(color: "red", size: 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Arg>,
}

impl Call {
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Call {
            name: name.into(),
            args,
        }
    }

    /// Named arguments in order; positional ones are an error.
    pub fn named(&self) -> Result<Vec<(&str, &ArgValue)>> {
        self.args
            .iter()
            .map(|arg| match &arg.name {
                Some(name) => Ok((name.as_str(), &arg.value)),
                None => Err(self.error("arguments must be named (name: value)")),
            })
            .collect()
    }

    pub fn positional(&self) -> impl Iterator<Item = &ArgValue> {
        self.args.iter().filter(|a| a.name.is_none()).map(|a| &a.value)
    }

    pub fn error(&self, message: impl AsRef<str>) -> PlotError {
        PlotError::Parse(format!("{}(): {}", self.name, message.as_ref()))
    }

    pub fn unknown(&self, name: &str) -> PlotError {
        self.error(format!("unknown argument '{}'", name))
    }

    pub fn number(&self, name: &str, value: &ArgValue) -> Result<f64> {
        value
            .as_number()
            .ok_or_else(|| self.error(format!("'{}' expects a number, got {}", name, value.describe())))
    }

    pub fn count(&self, name: &str, value: &ArgValue) -> Result<usize> {
        let n = self.number(name, value)?;
        if n < 1.0 || n.fract() != 0.0 {
            return Err(self.error(format!("'{}' expects a positive integer, got {}", name, n)));
        }
        Ok(n as usize)
    }

    pub fn text<'a>(&self, name: &str, value: &'a ArgValue) -> Result<&'a str> {
        value
            .as_text()
            .ok_or_else(|| self.error(format!("'{}' expects a name or string, got {}", name, value.describe())))
    }

    pub fn boolean(&self, name: &str, value: &ArgValue) -> Result<bool> {
        match value {
            ArgValue::Bool(b) => Ok(*b),
            other => Err(self.error(format!("'{}' expects true or false, got {}", name, other.describe()))),
        }
    }

    /// A list of names, or a single name.
    pub fn names(&self, name: &str, value: &ArgValue) -> Result<Vec<String>> {
        match value {
            ArgValue::List(items) => items.iter().map(|v| self.text(name, v).map(String::from)).collect(),
            single => Ok(vec![self.text(name, single)?.to_string()]),
        }
    }

    /// Two positional numbers, as in `xlim(0, 10)`.
    pub fn range(&self) -> Result<(f64, f64)> {
        let values: Vec<&ArgValue> = self.positional().collect();
        match values.as_slice() {
            [lo, hi] => Ok((self.number("min", lo)?, self.number("max", hi)?)),
            _ => Err(self.error("expects two numbers, e.g. (0, 10)")),
        }
    }
}
