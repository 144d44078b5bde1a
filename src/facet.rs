//! Facet specifications, partitioning and panel layout.

use crate::data::{Table, Value};
use crate::error::{PlotError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Scale sharing across panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacetScales {
    /// All panels share the same x and y scales.
    #[default]
    Fixed,
    /// Each panel has its own x scale.
    FreeX,
    /// Each panel has its own y scale.
    FreeY,
    /// Each panel has its own x and y scales.
    Free,
}

impl std::str::FromStr for FacetScales {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(FacetScales::Fixed),
            "free_x" => Ok(FacetScales::FreeX),
            "free_y" => Ok(FacetScales::FreeY),
            "free" => Ok(FacetScales::Free),
            other => Err(PlotError::InvalidSpec(format!("Unknown facet scales '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Facet {
    /// Panels for observed key combinations, wrapped row-major.
    Wrap {
        columns: Vec<String>,
        ncol: Option<usize>,
        nrow: Option<usize>,
        scales: FacetScales,
    },
    /// Row × column grid over the full cross product of levels.
    Grid {
        rows: Option<String>,
        cols: Option<String>,
        scales: FacetScales,
    },
}

/// Identity of one panel: `(column, value)` pairs.
pub type PanelKey = Vec<(String, String)>;

/// A panel's key and the rows that fall in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub key: PanelKey,
    pub table: Table,
}

/// Placement of one panel in the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSlot {
    pub row: usize,
    pub col: usize,
    /// Strip above the panel.
    pub title: Option<String>,
    /// Strip to the right of the panel (grid rows).
    pub row_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacetLayout {
    pub nrow: usize,
    pub ncol: usize,
    /// Index matches the panel order.
    pub slots: Vec<PanelSlot>,
}

impl FacetLayout {
    pub fn single() -> Self {
        FacetLayout {
            nrow: 1,
            ncol: 1,
            slots: vec![PanelSlot {
                row: 0,
                col: 0,
                title: None,
                row_label: None,
            }],
        }
    }
}

const MISSING_KEY: &str = "NA";

fn cell_key(value: &Value) -> String {
    if value.is_null() {
        MISSING_KEY.to_string()
    } else {
        value.key()
    }
}

impl Facet {
    pub fn wrap<S: AsRef<str>>(columns: &[S]) -> Self {
        Facet::Wrap {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            ncol: None,
            nrow: None,
            scales: FacetScales::Fixed,
        }
    }

    pub fn grid(rows: Option<&str>, cols: Option<&str>) -> Self {
        Facet::Grid {
            rows: rows.map(str::to_string),
            cols: cols.map(str::to_string),
            scales: FacetScales::Fixed,
        }
    }

    pub fn ncol(mut self, n: usize) -> Self {
        if let Facet::Wrap { ncol, .. } = &mut self {
            *ncol = Some(n);
        }
        self
    }

    pub fn nrow(mut self, n: usize) -> Self {
        if let Facet::Wrap { nrow, .. } = &mut self {
            *nrow = Some(n);
        }
        self
    }

    pub fn with_scales(mut self, mode: FacetScales) -> Self {
        match &mut self {
            Facet::Wrap { scales, .. } | Facet::Grid { scales, .. } => *scales = mode,
        }
        self
    }

    pub fn scales(&self) -> FacetScales {
        match self {
            Facet::Wrap { scales, .. } | Facet::Grid { scales, .. } => *scales,
        }
    }

    /// Partitioning columns, in key order.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Facet::Wrap { columns, .. } => columns.iter().map(String::as_str).collect(),
            Facet::Grid { rows, cols, .. } => rows.iter().chain(cols.iter()).map(String::as_str).collect(),
        }
    }

    /// Panel keys drawn from every table that carries all partitioning columns.
    ///
    /// Always yields at least one key; an empty key stands for a single unpartitioned panel.
    pub fn keys(&self, tables: &[&Table]) -> Result<Vec<PanelKey>> {
        let columns = self.columns();
        if columns.is_empty() {
            return Err(PlotError::InvalidSpec("facet needs at least one column".to_string()));
        }

        let sources: Vec<&Table> = tables
            .iter()
            .copied()
            .filter(|t| columns.iter().all(|c| t.has_column(c)))
            .collect();
        if sources.is_empty() {
            return Err(PlotError::UnknownColumn {
                channel: "facet".to_string(),
                column: columns.join(", "),
            });
        }

        // Level order per column: ordinal levels, then first occurrence across tables.
        let mut levels: Vec<Vec<String>> = vec![Vec::new(); columns.len()];
        for table in &sources {
            for (i, name) in columns.iter().enumerate() {
                if let Some(col) = table.column(name) {
                    let mut keys = col.distinct_keys();
                    if col.values.iter().any(Value::is_null) {
                        keys.push(MISSING_KEY.to_string());
                    }
                    for k in keys {
                        if !levels[i].contains(&k) {
                            levels[i].push(k);
                        }
                    }
                }
            }
        }

        let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let keys: Vec<PanelKey> = match self {
            Facet::Grid { .. } => cross_product(&names, &levels),
            Facet::Wrap { .. } => {
                let mut observed: Vec<Vec<usize>> = Vec::new();
                for table in &sources {
                    let cols: Vec<_> = columns.iter().filter_map(|c| table.column(c)).collect();
                    for row in 0..table.num_rows() {
                        let combo: Vec<usize> = cols
                            .iter()
                            .enumerate()
                            .map(|(i, c)| {
                                let key = cell_key(&c.values[row]);
                                levels[i].iter().position(|l| *l == key).unwrap_or(0)
                            })
                            .collect();
                        if !observed.contains(&combo) {
                            observed.push(combo);
                        }
                    }
                }
                observed.sort();
                observed
                    .into_iter()
                    .map(|combo| {
                        combo
                            .into_iter()
                            .enumerate()
                            .map(|(i, l)| (names[i].clone(), levels[i][l].clone()))
                            .collect()
                    })
                    .collect()
            }
        };

        if keys.is_empty() {
            return Ok(vec![PanelKey::new()]);
        }
        Ok(keys)
    }

    /// Rows of `table` belonging to a panel, or `None` when the table lacks the
    /// partitioning columns and is repeated in every panel.
    pub fn rows_for(&self, table: &Table, key: &PanelKey) -> Option<Vec<usize>> {
        if key.is_empty() {
            return Some((0..table.num_rows()).collect());
        }
        let cols: Vec<_> = key
            .iter()
            .map(|(name, value)| table.column(name).map(|c| (c, value)))
            .collect::<Option<Vec<_>>>()?;
        Some(
            (0..table.num_rows())
                .filter(|&row| cols.iter().all(|(c, value)| cell_key(&c.values[row]) == **value))
                .collect(),
        )
    }

    /// Materialized `(key, sub-table)` pairs; every row lands in exactly one partition.
    pub fn partition(&self, table: &Table) -> Result<Vec<Partition>> {
        let keys = self.keys(&[table])?;
        let partitions: Vec<Partition> = keys
            .into_iter()
            .map(|key| {
                let rows = self.rows_for(table, &key).unwrap_or_default();
                Partition {
                    table: table.take(&rows),
                    key,
                }
            })
            .collect();
        debug!(partitions = partitions.len(), "partitioned table");
        Ok(partitions)
    }

    /// Arrange panels with the given keys.
    pub fn layout(&self, keys: &[PanelKey]) -> Result<FacetLayout> {
        let n = keys.len().max(1);
        match self {
            Facet::Wrap { ncol, nrow, .. } => {
                let (nrow, ncol) = calculate_grid_dimensions(n, *nrow, *ncol)?;
                let slots = keys
                    .iter()
                    .enumerate()
                    .map(|(i, key)| PanelSlot {
                        row: i / ncol,
                        col: i % ncol,
                        title: strip_title(key),
                        row_label: None,
                    })
                    .collect();
                Ok(FacetLayout { nrow, ncol, slots })
            }
            Facet::Grid { rows, cols, .. } => {
                let distinct = |name: &Option<String>| -> Vec<String> {
                    let Some(name) = name else {
                        return vec![String::new()];
                    };
                    let mut values: Vec<String> = Vec::new();
                    for key in keys {
                        if let Some((_, v)) = key.iter().find(|(c, _)| c == name) {
                            if !values.contains(v) {
                                values.push(v.clone());
                            }
                        }
                    }
                    if values.is_empty() {
                        values.push(String::new());
                    }
                    values
                };
                let row_values = distinct(rows);
                let col_values = distinct(cols);
                let ncol = col_values.len();

                let mut positions: BTreeMap<(usize, usize), usize> = BTreeMap::new();
                let slots = keys
                    .iter()
                    .enumerate()
                    .map(|(i, key)| {
                        let find = |name: &Option<String>, values: &[String]| {
                            name.as_ref()
                                .and_then(|n| key.iter().find(|(c, _)| c == n))
                                .and_then(|(_, v)| values.iter().position(|x| x == v))
                                .unwrap_or(0)
                        };
                        let r = find(rows, &row_values);
                        let c = find(cols, &col_values);
                        positions.insert((r, c), i);
                        PanelSlot {
                            row: r,
                            col: c,
                            title: (r == 0 && cols.is_some()).then(|| col_values[c].clone()),
                            row_label: (c + 1 == ncol && rows.is_some()).then(|| row_values[r].clone()),
                        }
                    })
                    .collect();
                Ok(FacetLayout {
                    nrow: row_values.len(),
                    ncol,
                    slots,
                })
            }
        }
    }
}

fn cross_product(names: &[String], levels: &[Vec<String>]) -> Vec<PanelKey> {
    let mut keys: Vec<PanelKey> = vec![PanelKey::new()];
    for (name, values) in names.iter().zip(levels) {
        let mut next = Vec::with_capacity(keys.len() * values.len());
        for key in &keys {
            for v in values {
                let mut k = key.clone();
                k.push((name.clone(), v.clone()));
                next.push(k);
            }
        }
        keys = next;
    }
    keys.retain(|k| !k.is_empty());
    keys
}

fn strip_title(key: &PanelKey) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    Some(
        key.iter()
            .map(|(c, v)| format!("{} = {}", c, v))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Rows and columns for `n` wrapped panels.
///
/// Defaults to a square-ish layout of `ceil(sqrt(n))` columns.
pub fn calculate_grid_dimensions(n: usize, nrow: Option<usize>, ncol: Option<usize>) -> Result<(usize, usize)> {
    let n = n.max(1);
    let (rows, cols) = match (nrow, ncol) {
        (Some(0), _) | (_, Some(0)) => {
            return Err(PlotError::InvalidLayout("rows and columns must be positive".to_string()))
        }
        (Some(r), Some(c)) => (r, c),
        (None, Some(c)) => (n.div_ceil(c), c),
        (Some(r), None) => (r, n.div_ceil(r)),
        (None, None) => {
            let cols = (n as f64).sqrt().ceil() as usize;
            (n.div_ceil(cols), cols)
        }
    };
    if rows * cols < n {
        return Err(PlotError::InvalidLayout(format!(
            "{} x {} grid cannot hold {} panels",
            rows, cols, n
        )));
    }
    Ok((rows, cols))
}
