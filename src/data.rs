use crate::error::{PlotError, Result};
use chrono::{DateTime, NaiveDate};
use serde_json::Value as JsonValue;
use std::fmt;

/// Value type tag of a column, checked when mappings are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Numeric,
    Categorical,
    Ordinal,
    Textual,
    Temporal,
}

impl ValueType {
    /// Numeric and temporal columns feed continuous scales.
    pub fn is_continuous(self) -> bool {
        matches!(self, ValueType::Numeric | ValueType::Temporal)
    }

    pub fn is_discrete(self) -> bool {
        !self.is_continuous()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Numeric => "numeric",
            ValueType::Categorical => "categorical",
            ValueType::Ordinal => "ordinal",
            ValueType::Textual => "textual",
            ValueType::Temporal => "temporal",
        };
        f.write_str(name)
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
    /// Seconds since the Unix epoch.
    Time(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell; temporal values are seconds since the epoch.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Time(t) => Some(*t as f64),
            _ => None,
        }
    }

    /// String key used for grouping, faceting and discrete scales.
    pub fn key(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Time(t) => format_timestamp(*t),
        }
    }
}

/// Format a float without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{:.6}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Format epoch seconds as a calendar date.
pub fn format_timestamp(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => secs.to_string(),
    }
}

/// Parse an ISO date or RFC 3339 timestamp into epoch seconds.
pub fn parse_temporal(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp())
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ValueType,
    pub values: Vec<Value>,
    /// Level order for ordinal columns.
    pub levels: Option<Vec<String>>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ValueType, values: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            kind,
            values,
            levels: None,
        }
    }

    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| if v.is_finite() { Value::Number(v) } else { Value::Null })
            .collect();
        Column::new(name, ValueType::Numeric, values)
    }

    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        let values = values
            .iter()
            .map(|s| Value::Text(s.as_ref().to_string()))
            .collect();
        Column::new(name, ValueType::Categorical, values)
    }

    pub fn textual<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        let mut col = Column::categorical(name, values);
        col.kind = ValueType::Textual;
        col
    }

    pub fn ordinal<S: AsRef<str>>(name: impl Into<String>, values: &[S], levels: &[S]) -> Self {
        let mut col = Column::categorical(name, values);
        col.kind = ValueType::Ordinal;
        col.levels = Some(levels.iter().map(|s| s.as_ref().to_string()).collect());
        col
    }

    pub fn temporal(name: impl Into<String>, secs: Vec<i64>) -> Self {
        Column::new(name, ValueType::Temporal, secs.into_iter().map(Value::Time).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distinct non-null keys: level order for ordinal columns, first occurrence otherwise.
    pub fn distinct_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        if let Some(levels) = &self.levels {
            keys.extend(levels.iter().cloned());
        }
        for v in &self.values {
            if v.is_null() {
                continue;
            }
            let k = v.key();
            if !keys.contains(&k) {
                keys.push(k);
            }
        }
        keys
    }

    fn take(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            kind: self.kind,
            values: rows.iter().map(|&i| self.values[i].clone()).collect(),
            levels: self.levels.clone(),
        }
    }
}

/// An ordered set of equally long columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking that all columns have equal length and distinct names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(PlotError::InvalidSpec(format!("duplicate column name '{}'", col.name)));
            }
        }
        if let Some(first) = columns.first() {
            let expected = first.len();
            for col in &columns {
                if col.len() != expected {
                    return Err(PlotError::LengthMismatch {
                        column: col.name.clone(),
                        expected,
                        actual: col.len(),
                    });
                }
            }
        }
        Ok(Table { columns })
    }

    /// Build a table from raw string cells, inferring a type per column.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut columns = Vec::with_capacity(headers.len());
        for (idx, name) in headers.into_iter().enumerate() {
            let mut cells = Vec::with_capacity(rows.len());
            for (row_idx, row) in rows.iter().enumerate() {
                let cell = row.get(idx).ok_or_else(|| {
                    PlotError::Data(format!("Row {} has no value for column '{}'", row_idx + 1, name))
                })?;
                cells.push(cell.as_str());
            }
            columns.push(infer_column(name, &cells));
        }
        Table::new(columns)
    }

    /// Create a table from a JSON array of objects.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| PlotError::Data("Input data must be a JSON array of objects".to_string()))?;

        let Some(first) = array.first() else {
            return Ok(Table::default());
        };

        // Extract headers from the first object
        let first_obj = first
            .as_object()
            .ok_or_else(|| PlotError::Data("Items in array must be objects".to_string()))?;
        let headers: Vec<String> = first_obj.keys().cloned().collect();

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| PlotError::Data("Items in array must be objects".to_string()))?;

            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(JsonValue::String(s)) => s.clone(),
                    Some(JsonValue::Number(n)) => n.to_string(),
                    Some(JsonValue::Bool(b)) => b.to_string(),
                    Some(JsonValue::Null) | None => String::new(),
                    _ => {
                        return Err(PlotError::Data(format!(
                            "Unsupported value type for field '{}'",
                            header
                        )))
                    }
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Table::from_rows(headers, rows)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Look a column up by exact name, falling back to a case-insensitive match.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names and value types.
    pub fn schema(&self) -> Vec<(String, ValueType)> {
        self.columns.iter().map(|c| (c.name.clone(), c.kind)).collect()
    }

    /// Append or replace a column.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            return Err(PlotError::LengthMismatch {
                column: column.name.clone(),
                expected: self.num_rows(),
                actual: column.len(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }

    /// Re-tag a column with another value type.
    pub fn with_type(mut self, name: &str, kind: ValueType) -> Result<Self> {
        let col = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| PlotError::Data(format!("Column '{}' not found", name)))?;

        let values = std::mem::take(&mut col.values);
        col.values = values
            .into_iter()
            .map(|v| convert_value(v, kind))
            .collect::<std::result::Result<Vec<_>, String>>()
            .map_err(|msg| PlotError::type_mismatch(name, msg))?;
        col.kind = kind;
        if kind != ValueType::Ordinal {
            col.levels = None;
        }
        Ok(self)
    }

    /// Turn a column into an ordinal one with the given level order.
    pub fn with_levels<S: AsRef<str>>(self, name: &str, levels: &[S]) -> Result<Self> {
        let mut table = self.with_type(name, ValueType::Ordinal)?;
        if let Some(col) = table.columns.iter_mut().find(|c| c.name == name) {
            col.levels = Some(levels.iter().map(|s| s.as_ref().to_string()).collect());
        }
        Ok(table)
    }

    /// Sub-table of the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }
}

fn convert_value(value: Value, kind: ValueType) -> std::result::Result<Value, String> {
    Ok(match (value, kind) {
        (Value::Null, _) => Value::Null,
        (Value::Number(n), ValueType::Numeric) => Value::Number(n),
        (Value::Time(t), ValueType::Temporal) => Value::Time(t),
        (Value::Time(t), ValueType::Numeric) => Value::Number(t as f64),
        (Value::Number(n), ValueType::Temporal) => Value::Time(n as i64),
        (Value::Text(s), ValueType::Numeric) => {
            let n = s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not numeric", s))?;
            finite_number(n)
        }
        (Value::Text(s), ValueType::Temporal) => {
            Value::Time(parse_temporal(&s).ok_or_else(|| format!("'{}' is not a date", s))?)
        }
        (v, _) => Value::Text(v.key()),
    })
}

/// `NaN` and infinities are missing values.
fn finite_number(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Null
    }
}

fn infer_column(name: String, cells: &[&str]) -> Column {
    let present: Vec<&str> = cells.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();

    let kind = if present.is_empty() {
        ValueType::Categorical
    } else if present.iter().all(|s| s.parse::<f64>().is_ok()) {
        ValueType::Numeric
    } else if present.iter().all(|s| parse_temporal(s).is_some()) {
        ValueType::Temporal
    } else {
        ValueType::Categorical
    };

    let values = cells
        .iter()
        .map(|raw| {
            let s = raw.trim();
            if s.is_empty() {
                return Value::Null;
            }
            match kind {
                ValueType::Numeric => s.parse::<f64>().map(finite_number).unwrap_or(Value::Null),
                ValueType::Temporal => parse_temporal(s).map(Value::Time).unwrap_or(Value::Null),
                _ => Value::Text(s.to_string()),
            }
        })
        .collect();

    Column::new(name, kind, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_from_rows_infers_types() {
        let table = Table::from_rows(
            vec!["x".into(), "when".into(), "region".into()],
            rows(&[&["1.5", "2024-01-01", "east"], &["2", "2024-01-02", "west"]]),
        )
        .unwrap();

        let schema = table.schema();
        assert_eq!(schema[0].1, ValueType::Numeric);
        assert_eq!(schema[1].1, ValueType::Temporal);
        assert_eq!(schema[2].1, ValueType::Categorical);
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_empty_cells_become_null() {
        let table = Table::from_rows(vec!["x".into()], rows(&[&["1"], &[""], &["3"]])).unwrap();
        let col = table.column("x").unwrap();
        assert_eq!(col.kind, ValueType::Numeric);
        assert!(col.values[1].is_null());
    }

    #[test]
    fn test_unequal_columns_rejected() {
        let result = Table::new(vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::numeric("b", vec![1.0]),
        ]);
        assert!(matches!(result, Err(PlotError::LengthMismatch { .. })));
    }

    #[test]
    fn test_duplicate_column_names_rejected() {
        let result = Table::new(vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::numeric("a", vec![3.0, 4.0]),
        ]);
        assert!(matches!(result, Err(PlotError::InvalidSpec(_))));

        let result = Table::from_rows(vec!["x".into(), "x".into()], rows(&[&["1", "2"]]));
        assert!(matches!(result, Err(PlotError::InvalidSpec(_))));
    }

    #[test]
    fn test_non_finite_cells_become_null() {
        let table = Table::from_rows(
            vec!["x".into()],
            rows(&[&["1"], &["NaN"], &["inf"], &["-infinity"], &["4"]]),
        )
        .unwrap();
        let col = table.column("x").unwrap();
        assert_eq!(col.kind, ValueType::Numeric);
        assert_eq!(col.values[0], Value::Number(1.0));
        assert!(col.values[1].is_null());
        assert!(col.values[2].is_null());
        assert!(col.values[3].is_null());
        assert_eq!(col.values[4], Value::Number(4.0));

        let col = Column::numeric("y", vec![f64::INFINITY, 2.0]);
        assert!(col.values[0].is_null());

        let table = Table::new(vec![Column::categorical("z", &["inf", "5"])])
            .unwrap()
            .with_type("z", ValueType::Numeric)
            .unwrap();
        assert!(table.column("z").unwrap().values[0].is_null());
    }

    #[test]
    fn test_from_json() {
        let value = json!([
            {"name": "a", "value": 10},
            {"name": "b", "value": 20.5}
        ]);
        let table = Table::from_json(&value).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("value").unwrap().kind, ValueType::Numeric);
        assert_eq!(table.column("value").unwrap().values[1], Value::Number(20.5));
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(Table::from_json(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_with_type_numeric_to_categorical() {
        let table = Table::new(vec![Column::numeric("cyl", vec![4.0, 6.0, 4.0])])
            .unwrap()
            .with_type("cyl", ValueType::Categorical)
            .unwrap();
        let col = table.column("cyl").unwrap();
        assert_eq!(col.kind, ValueType::Categorical);
        assert_eq!(col.distinct_keys(), vec!["4", "6"]);
    }

    #[test]
    fn test_with_type_rejects_bad_numeric() {
        let table = Table::new(vec![Column::categorical("a", &["x"])]).unwrap();
        let result = table.with_type("a", ValueType::Numeric);
        assert!(matches!(result, Err(PlotError::TypeMismatch { .. })));
    }

    #[test]
    fn test_ordinal_levels_order_keys() {
        let table = Table::new(vec![Column::categorical("size", &["M", "S", "L"])])
            .unwrap()
            .with_levels("size", &["S", "M", "L"])
            .unwrap();
        assert_eq!(table.column("size").unwrap().distinct_keys(), vec!["S", "M", "L"]);
    }

    #[test]
    fn test_take_rows() {
        let table = Table::new(vec![Column::numeric("x", vec![1.0, 2.0, 3.0])]).unwrap();
        let sub = table.take(&[2, 0]);
        assert_eq!(sub.column("x").unwrap().values, vec![Value::Number(3.0), Value::Number(1.0)]);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-0.125), "-0.125");
    }

    #[test]
    fn test_parse_temporal_round_trip() {
        let secs = parse_temporal("2024-03-05").unwrap();
        assert_eq!(format_timestamp(secs), "2024-03-05");
        assert!(parse_temporal("2024-03-05T10:00:00Z").is_some());
        assert!(parse_temporal("yesterday").is_none());
    }
}
