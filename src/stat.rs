//! Statistical transforms run on a layer's table before geometry is built.

use crate::aes::{Channel, Mapping};
use crate::data::{Column, Table, Value, ValueType};
use crate::error::{PlotError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Default number of bins when no bin width is configured.
pub const DEFAULT_BINS: usize = 30;
/// Default number of density samples.
pub const DEFAULT_DENSITY_POINTS: usize = 512;
const MAX_DENSITY_POINTS: usize = 8192;
/// Bandwidths the density curve extends past the smallest and largest values.
const DENSITY_TAIL: f64 = 3.0;
/// Bandwidths kept around values on either side of an empty gap in the data.
const DENSITY_GAP: f64 = 8.0;
/// Column holding the left edge of a bar's interval.
pub const XMIN_COLUMN: &str = "xmin";
/// Column holding the right edge of a bar's interval.
pub const XMAX_COLUMN: &str = "xmax";
/// Tolerance (in bin units) that keeps values sitting on a boundary in the upper bin.
const BIN_FUZZ: f64 = 1e-9;

/// Statistical transformation type.
#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    /// No transformation.
    Identity,
    /// Rows per x category.
    Count,
    /// Contiguous intervals over a numeric x column.
    Bin {
        bins: usize,
        binwidth: Option<f64>,
        /// A value that must fall on a bin edge; defaults to the data minimum.
        boundary: Option<f64>,
    },
    /// Gaussian kernel density over a numeric x column.
    Density { points: usize, adjust: f64 },
    /// Category counts divided by the total of their group.
    Proportion,
    /// Tukey five-number summary per x category.
    Boxplot,
    /// Kernel density per x category, scaled to unit width.
    Violin,
}

impl Stat {
    pub fn bin() -> Self {
        Stat::Bin {
            bins: DEFAULT_BINS,
            binwidth: None,
            boundary: None,
        }
    }

    pub fn bins(bins: usize) -> Self {
        Stat::Bin {
            bins: bins.max(1),
            binwidth: None,
            boundary: None,
        }
    }

    pub fn binwidth(width: f64) -> Self {
        Stat::Bin {
            bins: DEFAULT_BINS,
            binwidth: Some(width),
            boundary: None,
        }
    }

    pub fn density() -> Self {
        Stat::Density {
            points: DEFAULT_DENSITY_POINTS,
            adjust: 1.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stat::Identity => "identity",
            Stat::Count => "count",
            Stat::Bin { .. } => "bin",
            Stat::Density { .. } => "density",
            Stat::Proportion => "proportion",
            Stat::Boxplot => "boxplot",
            Stat::Violin => "violin",
        }
    }
}

/// Derived table ready for geometry, with the mapping rewritten onto its columns.
#[derive(Debug, Clone)]
pub struct StatOutput {
    pub table: Table,
    pub mapping: Mapping,
    /// Per-row auxiliary samples: boxplot outliers as `(y, 0)`, violin curves as `(y, width)`.
    pub samples: Vec<Vec<(f64, f64)>>,
}

/// Apply a stat to a table under an effective mapping.
pub fn apply(stat: &Stat, table: &Table, mapping: &Mapping) -> Result<StatOutput> {
    debug!(stat = stat.name(), rows = table.num_rows(), "applying stat");
    match stat {
        Stat::Identity => Ok(StatOutput {
            table: table.clone(),
            mapping: mapping.clone(),
            samples: Vec::new(),
        }),
        Stat::Count => compute_count(table, mapping, false),
        Stat::Proportion => compute_count(table, mapping, true),
        Stat::Bin {
            bins,
            binwidth,
            boundary,
        } => compute_bin(table, mapping, *bins, *binwidth, *boundary),
        Stat::Density { points, adjust } => compute_density(table, mapping, *points, *adjust),
        Stat::Boxplot => compute_boxplot(table, mapping),
        Stat::Violin => compute_violin(table, mapping),
    }
}

// =============================================================================
// Grouping helpers
// =============================================================================

/// Columns that split rows into groups, deduplicated in channel order.
///
/// The `group` channel always groups, whatever its column type; colour, fill and shape
/// group only when their column is discrete.
pub fn grouping_columns(table: &Table, mapping: &Mapping) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    for channel in [Channel::Group, Channel::Color, Channel::Fill, Channel::Shape] {
        if let Some(name) = mapping.column(channel) {
            if let Some(col) = table.column(name) {
                let groups = channel == Channel::Group || col.kind.is_discrete();
                if groups && !cols.contains(&col.name) {
                    cols.push(col.name.clone());
                }
            }
        }
    }
    cols
}

struct RowGroup {
    key: Vec<Value>,
    rows: Vec<usize>,
}

/// Partition row indices by the values of `cols`, in first-encountered order.
fn group_rows(table: &Table, cols: &[String]) -> Vec<RowGroup> {
    let columns: Vec<&Column> = cols.iter().filter_map(|c| table.column(c)).collect();
    let mut index: BTreeMap<Vec<String>, usize> = BTreeMap::new();
    let mut groups: Vec<RowGroup> = Vec::new();

    for row in 0..table.num_rows() {
        let key_strings: Vec<String> = columns.iter().map(|c| c.values[row].key()).collect();
        match index.get(&key_strings) {
            Some(&g) => groups[g].rows.push(row),
            None => {
                index.insert(key_strings, groups.len());
                groups.push(RowGroup {
                    key: columns.iter().map(|c| c.values[row].clone()).collect(),
                    rows: vec![row],
                });
            }
        }
    }
    groups
}

fn require_column<'a>(table: &'a Table, mapping: &Mapping, channel: Channel, stat: &str) -> Result<&'a Column> {
    let name = mapping.column(channel).ok_or_else(|| {
        PlotError::InvalidSpec(format!("stat '{}' requires a mapped '{}' column", stat, channel))
    })?;
    table.column(name).ok_or_else(|| PlotError::UnknownColumn {
        channel: channel.to_string(),
        column: name.to_string(),
    })
}

fn require_numeric<'a>(table: &'a Table, mapping: &Mapping, channel: Channel, stat: &str) -> Result<&'a Column> {
    let col = require_column(table, mapping, channel, stat)?;
    if !col.kind.is_continuous() {
        return Err(PlotError::type_mismatch(
            &col.name,
            format!("stat '{}' needs numeric {} values, found {}", stat, channel, col.kind),
        ));
    }
    Ok(col)
}

fn finite_values(col: &Column, rows: &[usize]) -> Vec<f64> {
    let values: Vec<f64> = rows
        .iter()
        .filter_map(|&r| col.values[r].as_f64())
        .filter(|v| v.is_finite())
        .collect();
    if values.len() < rows.len() {
        debug!(column = %col.name, dropped = rows.len() - values.len(), "dropped missing values");
    }
    values
}

/// Builds the derived table: stat columns first, then the grouping columns they belong to.
struct StatTableBuilder {
    columns: Vec<Column>,
    group_columns: Vec<Column>,
}

impl StatTableBuilder {
    fn new(source: &Table, group_cols: &[String], stat_columns: Vec<Column>) -> Self {
        let group_columns = group_cols
            .iter()
            .filter_map(|name| source.column(name))
            // A group column named like a stat column carries the same values.
            .filter(|c| !stat_columns.iter().any(|s| s.name == c.name))
            .map(|c| Column {
                name: c.name.clone(),
                kind: c.kind,
                values: Vec::new(),
                levels: c.levels.clone(),
            })
            .collect();
        StatTableBuilder {
            columns: stat_columns,
            group_columns,
        }
    }

    fn push(&mut self, group_cols: &[String], key: &[Value], values: Vec<Value>) {
        for (col, value) in self.columns.iter_mut().zip(values) {
            col.values.push(value);
        }
        for col in &mut self.group_columns {
            let value = group_cols
                .iter()
                .position(|n| *n == col.name)
                .map(|i| key[i].clone())
                .unwrap_or(Value::Null);
            col.values.push(value);
        }
    }

    fn finish(self) -> Result<Table> {
        let mut columns = self.columns;
        columns.extend(self.group_columns);
        Table::new(columns)
    }
}

fn empty_like(col: &Column, name: &str) -> Column {
    Column {
        name: name.to_string(),
        kind: col.kind,
        values: Vec::new(),
        levels: col.levels.clone(),
    }
}

fn numeric_column(name: &str) -> Column {
    Column::new(name, ValueType::Numeric, Vec::new())
}

/// Keep only mappings whose columns survive in the derived table.
fn rewrite_mapping(mapping: &Mapping, table: &Table, overrides: &[(Channel, &str)]) -> Mapping {
    let mut out = Mapping::new();
    for (channel, value) in mapping.iter() {
        match value.column() {
            Some(col) if !table.has_column(col) => {}
            _ => out.set(channel, value.clone()),
        }
    }
    for (channel, column) in overrides {
        out = out.map(*channel, *column);
    }
    out
}

// =============================================================================
// Count / Proportion
// =============================================================================

fn compute_count(table: &Table, mapping: &Mapping, proportion: bool) -> Result<StatOutput> {
    let stat = if proportion { "proportion" } else { "count" };
    let x_col = require_column(table, mapping, Channel::X, stat)?;
    let group_cols = grouping_columns(table, mapping);
    let groups = group_rows(table, &group_cols);

    // Denominators come from the explicit group channel only.
    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    let group_channel = mapping.column(Channel::Group).and_then(|c| table.column(c));
    let denominator_key = |row: usize| group_channel.map(|c| c.values[row].key()).unwrap_or_default();
    for row in 0..table.num_rows() {
        if !x_col.values[row].is_null() {
            *totals.entry(denominator_key(row)).or_default() += 1;
        }
    }

    let mut builder = StatTableBuilder::new(
        table,
        &group_cols,
        vec![empty_like(x_col, &x_col.name), numeric_column("count"), numeric_column("prop")],
    );

    let order = x_col.distinct_keys();
    for group in &groups {
        let mut counts: BTreeMap<String, (Value, usize)> = BTreeMap::new();
        for &row in &group.rows {
            let value = &x_col.values[row];
            if value.is_null() {
                continue;
            }
            counts.entry(value.key()).or_insert_with(|| (value.clone(), 0)).1 += 1;
        }
        let Some(&first_row) = group.rows.first() else {
            continue;
        };
        let total = totals.get(&denominator_key(first_row)).copied().unwrap_or(0).max(1) as f64;

        for key in &order {
            if let Some((value, count)) = counts.get(key) {
                let count = *count as f64;
                builder.push(
                    &group_cols,
                    &group.key,
                    vec![value.clone(), Value::Number(count), Value::Number(count / total)],
                );
            }
        }
    }

    let out = builder.finish()?;
    let y = if proportion { "prop" } else { "count" };
    let mapping = rewrite_mapping(mapping, &out, &[(Channel::X, x_col.name.as_str()), (Channel::Y, y)]);
    Ok(StatOutput {
        table: out,
        mapping,
        samples: Vec::new(),
    })
}

// =============================================================================
// Bin
// =============================================================================

/// Bin layout shared by every group of a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinLayout {
    pub origin: f64,
    pub width: f64,
}

impl BinLayout {
    /// Derive a layout from the data extent.
    pub fn from_values(values: &[f64], bins: usize, binwidth: Option<f64>, boundary: Option<f64>) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;

        let width = match binwidth {
            Some(w) if w > 0.0 => w,
            _ if range > 0.0 => range / bins.max(1) as f64,
            _ => 1.0,
        };

        let origin = match boundary {
            Some(b) => b + ((min - b) / width).floor() * width,
            None => min,
        };
        BinLayout { origin, width }
    }

    /// Bin index of a value; boundary values land in the upper bin.
    pub fn index(&self, value: f64) -> i64 {
        ((value - self.origin) / self.width + BIN_FUZZ).floor() as i64
    }

    pub fn bounds(&self, index: i64) -> (f64, f64) {
        let lo = self.origin + index as f64 * self.width;
        (lo, lo + self.width)
    }
}

fn compute_bin(
    table: &Table,
    mapping: &Mapping,
    bins: usize,
    binwidth: Option<f64>,
    boundary: Option<f64>,
) -> Result<StatOutput> {
    let x_col = require_numeric(table, mapping, Channel::X, "bin")?;
    let all_rows: Vec<usize> = (0..table.num_rows()).collect();
    let all_values = finite_values(x_col, &all_rows);
    let layout = BinLayout::from_values(&all_values, bins, binwidth, boundary);

    let group_cols = grouping_columns(table, mapping);
    let groups = group_rows(table, &group_cols);

    let mut builder = StatTableBuilder::new(
        table,
        &group_cols,
        vec![
            Column::new(x_col.name.clone(), ValueType::Numeric, Vec::new()),
            numeric_column("count"),
            numeric_column("density"),
            numeric_column(XMIN_COLUMN),
            numeric_column(XMAX_COLUMN),
        ],
    );

    for group in &groups {
        let values = finite_values(x_col, &group.rows);
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for v in &values {
            *counts.entry(layout.index(*v)).or_default() += 1;
        }
        let n = values.len().max(1) as f64;
        for (idx, count) in counts {
            let (lo, hi) = layout.bounds(idx);
            let count = count as f64;
            builder.push(
                &group_cols,
                &group.key,
                vec![
                    Value::Number((lo + hi) / 2.0),
                    Value::Number(count),
                    Value::Number(count / (n * layout.width)),
                    Value::Number(lo),
                    Value::Number(hi),
                ],
            );
        }
    }

    let out = builder.finish()?;
    let mapping = rewrite_mapping(mapping, &out, &[(Channel::X, x_col.name.as_str()), (Channel::Y, "count")]);
    Ok(StatOutput {
        table: out,
        mapping,
        samples: Vec::new(),
    })
}

// =============================================================================
// Density
// =============================================================================

/// Silverman's rule of thumb for bandwidth selection
pub fn silverman_bandwidth(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    if n < 2.0 {
        return 1.0;
    }

    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    // IQR-based estimate for robustness
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);

    // h = 0.9 * min(std, IQR/1.34) * n^(-1/5)
    let scale = if iqr > 0.0 { std_dev.min(iqr / 1.34) } else { std_dev };
    if scale <= 0.0 {
        return 1.0;
    }
    0.9 * scale * n.powf(-0.2)
}

fn gaussian_kernel(u: f64) -> f64 {
    const SQRT_2PI: f64 = 2.5066282746310002;
    (-0.5 * u * u).exp() / SQRT_2PI
}

/// Intervals of the real line that carry density: values closer than `2 * DENSITY_GAP`
/// bandwidths share a span, and the outermost ends stop `DENSITY_TAIL` bandwidths out.
fn density_spans(sorted: &[f64], bandwidth: f64) -> Vec<(f64, f64)> {
    let reach = DENSITY_GAP * bandwidth;
    let mut spans: Vec<(f64, f64)> = Vec::new();
    for &x in sorted {
        match spans.last_mut() {
            Some(span) if x - reach <= span.1 => span.1 = x + reach,
            _ => spans.push((x - reach, x + reach)),
        }
    }
    if let (Some(&lo), Some(&hi)) = (sorted.first(), sorted.last()) {
        if let Some(first) = spans.first_mut() {
            first.0 = lo - DENSITY_TAIL * bandwidth;
        }
        if let Some(last) = spans.last_mut() {
            last.1 = hi + DENSITY_TAIL * bandwidth;
        }
    }
    spans
}

/// Gaussian KDE over `[min - 3h, max + 3h]`.
///
/// Each span of the data is sampled at most a quarter bandwidth apart (up to
/// `MAX_DENSITY_POINTS` per span) and `points` is shared out by span length. Empty gaps
/// between far-apart values are skipped, and the result is rescaled so its trapezoid area is
/// exactly one.
pub fn kde(data: &[f64], bandwidth: f64, points: usize) -> (Vec<f64>, Vec<f64>) {
    let n = data.len() as f64;
    if data.is_empty() || !bandwidth.is_finite() || bandwidth <= 0.0 {
        return (Vec::new(), Vec::new());
    }

    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let spans = density_spans(&sorted, bandwidth);
    let total: f64 = spans.iter().map(|(lo, hi)| hi - lo).sum();

    let mut grid = Vec::new();
    for &(lo, hi) in &spans {
        let len = hi - lo;
        let share = (points as f64 * len / total).ceil() as usize;
        let needed = (len / (bandwidth / 4.0)).ceil() as usize + 1;
        let count = share.max(needed.min(MAX_DENSITY_POINTS)).max(2);
        let step = len / (count - 1) as f64;
        grid.extend((0..count).map(|i| lo + i as f64 * step));
    }

    let mut density: Vec<f64> = grid
        .iter()
        .map(|&g| {
            let sum: f64 = sorted.iter().map(|&xi| gaussian_kernel((g - xi) / bandwidth)).sum();
            sum / (n * bandwidth)
        })
        .collect();

    let area: f64 = grid
        .windows(2)
        .zip(density.windows(2))
        .map(|(x, d)| (x[1] - x[0]) * (d[0] + d[1]) / 2.0)
        .sum();
    if area.is_finite() && area > 0.0 {
        density.iter_mut().for_each(|d| *d /= area);
    }
    (grid, density)
}

fn compute_density(table: &Table, mapping: &Mapping, points: usize, adjust: f64) -> Result<StatOutput> {
    let x_col = require_numeric(table, mapping, Channel::X, "density")?;
    let group_cols = grouping_columns(table, mapping);
    let groups = group_rows(table, &group_cols);

    let mut builder = StatTableBuilder::new(
        table,
        &group_cols,
        vec![
            Column::new(x_col.name.clone(), ValueType::Numeric, Vec::new()),
            numeric_column("density"),
            numeric_column("count"),
            numeric_column("scaled"),
        ],
    );

    for group in &groups {
        let values = finite_values(x_col, &group.rows);
        if values.is_empty() {
            continue;
        }
        let bandwidth = silverman_bandwidth(&values) * adjust.max(f64::EPSILON);
        let (grid, density) = kde(&values, bandwidth, points);
        let peak = density.iter().copied().fold(0.0, f64::max);
        let n = values.len() as f64;
        for (g, d) in grid.into_iter().zip(density) {
            builder.push(
                &group_cols,
                &group.key,
                vec![
                    Value::Number(g),
                    Value::Number(d),
                    Value::Number(d * n),
                    Value::Number(if peak > 0.0 { d / peak } else { 0.0 }),
                ],
            );
        }
    }

    let out = builder.finish()?;
    let mapping = rewrite_mapping(mapping, &out, &[(Channel::X, x_col.name.as_str()), (Channel::Y, "density")]);
    Ok(StatOutput {
        table: out,
        mapping,
        samples: Vec::new(),
    })
}

// =============================================================================
// Boxplot / Violin
// =============================================================================

/// Linear-interpolated percentile of sorted data.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted_data[0];
    }

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

/// Rows of the summary grouped by (group key, x key) in x-category order.
fn category_cells<'a>(
    x_col: &'a Column,
    y_col: &Column,
    group: &RowGroup,
) -> Vec<(&'a Value, Vec<f64>)> {
    let mut cells: BTreeMap<String, (&'a Value, Vec<f64>)> = BTreeMap::new();
    for &row in &group.rows {
        let x = &x_col.values[row];
        let Some(y) = y_col.values[row].as_f64().filter(|v| v.is_finite()) else {
            continue;
        };
        if x.is_null() {
            continue;
        }
        cells.entry(x.key()).or_insert_with(|| (x, Vec::new())).1.push(y);
    }
    x_col
        .distinct_keys()
        .into_iter()
        .filter_map(|k| cells.remove(&k))
        .map(|(x, mut ys)| {
            ys.sort_by(|a, b| a.total_cmp(b));
            (x, ys)
        })
        .collect()
}

fn summary_builder(table: &Table, x_col: &Column, group_cols: &[String]) -> StatTableBuilder {
    StatTableBuilder::new(
        table,
        group_cols,
        vec![
            empty_like(x_col, &x_col.name),
            numeric_column("ymin"),
            numeric_column("lower"),
            numeric_column("middle"),
            numeric_column("upper"),
            numeric_column("ymax"),
        ],
    )
}

fn summary_mapping(mapping: &Mapping, out: &Table, x_name: &str) -> Mapping {
    rewrite_mapping(
        mapping,
        out,
        &[
            (Channel::X, x_name),
            (Channel::Y, "middle"),
            (Channel::Ymin, "ymin"),
            (Channel::Ymax, "ymax"),
        ],
    )
}

fn compute_boxplot(table: &Table, mapping: &Mapping) -> Result<StatOutput> {
    let x_col = require_column(table, mapping, Channel::X, "boxplot")?;
    let y_col = require_numeric(table, mapping, Channel::Y, "boxplot")?;
    let group_cols = grouping_columns(table, mapping);
    let groups = group_rows(table, &group_cols);

    let mut builder = summary_builder(table, x_col, &group_cols);
    let mut samples = Vec::new();

    for group in &groups {
        for (x, ys) in category_cells(x_col, y_col, group) {
            let q1 = percentile(&ys, 0.25);
            let median = percentile(&ys, 0.50);
            let q3 = percentile(&ys, 0.75);
            let iqr = q3 - q1;
            let lower_fence = q1 - 1.5 * iqr;
            let upper_fence = q3 + 1.5 * iqr;

            // Whiskers: range of data within fences
            let lower_whisker = ys.iter().copied().find(|&v| v >= lower_fence).unwrap_or(q1);
            let upper_whisker = ys.iter().rev().copied().find(|&v| v <= upper_fence).unwrap_or(q3);
            let outliers: Vec<(f64, f64)> = ys
                .iter()
                .filter(|&&v| v < lower_fence || v > upper_fence)
                .map(|&v| (v, 0.0))
                .collect();

            builder.push(
                &group_cols,
                &group.key,
                vec![
                    x.clone(),
                    Value::Number(lower_whisker),
                    Value::Number(q1),
                    Value::Number(median),
                    Value::Number(q3),
                    Value::Number(upper_whisker),
                ],
            );
            samples.push(outliers);
        }
    }

    let out = builder.finish()?;
    let mapping = summary_mapping(mapping, &out, &x_col.name);
    Ok(StatOutput {
        table: out,
        mapping,
        samples,
    })
}

fn compute_violin(table: &Table, mapping: &Mapping) -> Result<StatOutput> {
    let x_col = require_column(table, mapping, Channel::X, "violin")?;
    let y_col = require_numeric(table, mapping, Channel::Y, "violin")?;
    let group_cols = grouping_columns(table, mapping);
    let groups = group_rows(table, &group_cols);

    let mut builder = summary_builder(table, x_col, &group_cols);
    let mut samples = Vec::new();

    for group in &groups {
        for (x, ys) in category_cells(x_col, y_col, group) {
            let bandwidth = silverman_bandwidth(&ys);
            let (grid, density) = kde(&ys, bandwidth, DEFAULT_DENSITY_POINTS / 4);
            let peak = density.iter().copied().fold(0.0, f64::max);
            let curve = grid
                .into_iter()
                .zip(density)
                .map(|(y, d)| (y, if peak > 0.0 { d / peak } else { 0.0 }))
                .collect();

            let (first, last) = (ys[0], ys[ys.len() - 1]);
            builder.push(
                &group_cols,
                &group.key,
                vec![
                    x.clone(),
                    Value::Number(first - 3.0 * bandwidth),
                    Value::Number(percentile(&ys, 0.25)),
                    Value::Number(percentile(&ys, 0.5)),
                    Value::Number(percentile(&ys, 0.75)),
                    Value::Number(last + 3.0 * bandwidth),
                ],
            );
            samples.push(curve);
        }
    }

    let out = builder.finish()?;
    let mapping = summary_mapping(mapping, &out, &x_col.name);
    Ok(StatOutput {
        table: out,
        mapping,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(name: &str, values: &[f64]) -> Table {
        Table::new(vec![Column::numeric(name, values.to_vec())]).unwrap()
    }

    fn column_f64(table: &Table, name: &str) -> Vec<f64> {
        table
            .column(name)
            .unwrap()
            .values
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn test_identity_passes_through() {
        let table = numbers("x", &[1.0, 2.0]);
        let mapping = Mapping::new().map(Channel::X, "x");
        let out = apply(&Stat::Identity, &table, &mapping).unwrap();
        assert_eq!(out.table, table);
        assert_eq!(out.mapping, mapping);
    }

    #[test]
    fn test_bin_counts_with_boundary_in_upper_bin() {
        let table = numbers("v", &[0.0, 0.5, 1.0, 1.5, 2.0]);
        let mapping = Mapping::new().map(Channel::X, "v");
        let out = apply(&Stat::binwidth(1.0), &table, &mapping).unwrap();

        // Bins [0,1), [1,2), [2,3): 1.0 and 2.0 sit on boundaries and go up.
        assert_eq!(column_f64(&out.table, "count"), vec![2.0, 2.0, 1.0]);
        assert_eq!(column_f64(&out.table, "v"), vec![0.5, 1.5, 2.5]);
        assert_eq!(out.mapping.column(Channel::Y), Some("count"));
    }

    #[test]
    fn test_bin_skips_empty_intervals() {
        let table = numbers("v", &[0.0, 0.1, 5.0]);
        let mapping = Mapping::new().map(Channel::X, "v");
        let out = apply(&Stat::binwidth(1.0), &table, &mapping).unwrap();
        assert_eq!(column_f64(&out.table, "count"), vec![2.0, 1.0]);
    }

    #[test]
    fn test_bin_default_bins() {
        let values: Vec<f64> = (0..300).map(|i| i as f64).collect();
        let table = numbers("v", &values);
        let mapping = Mapping::new().map(Channel::X, "v");
        let out = apply(&Stat::bin(), &table, &mapping).unwrap();
        // 30 regular bins plus the maximum on the last boundary
        assert_eq!(out.table.num_rows(), 31);
        let total: f64 = column_f64(&out.table, "count").iter().sum();
        assert_eq!(total, 300.0);
    }

    #[test]
    fn test_bin_requires_numeric() {
        let table = Table::new(vec![Column::categorical("c", &["a", "b"])]).unwrap();
        let mapping = Mapping::new().map(Channel::X, "c");
        let err = apply(&Stat::bin(), &table, &mapping).unwrap_err();
        assert!(matches!(err, PlotError::TypeMismatch { ref column, .. } if column == "c"));
    }

    #[test]
    fn test_bin_groups_share_boundaries() {
        let table = Table::new(vec![
            Column::numeric("v", vec![0.0, 1.0, 2.0, 3.0]),
            Column::categorical("g", &["a", "a", "b", "b"]),
        ])
        .unwrap();
        let mapping = Mapping::new().map(Channel::X, "v").map(Channel::Fill, "g");
        let out = apply(&Stat::bins(3), &table, &mapping).unwrap();
        assert_eq!(column_f64(&out.table, "xmin"), vec![0.0, 1.0, 2.0, 3.0]);
        assert!(out.table.has_column("g"));
        assert_eq!(out.mapping.column(Channel::Fill), Some("g"));
    }

    fn density_area(values: &[f64]) -> f64 {
        let mapping = Mapping::new().map(Channel::X, "v");
        let out = apply(&Stat::density(), &numbers("v", values), &mapping).unwrap();
        let xs = column_f64(&out.table, "v");
        let ds = column_f64(&out.table, "density");
        xs.windows(2)
            .zip(ds.windows(2))
            .map(|(x, d)| (x[1] - x[0]) * (d[0] + d[1]) / 2.0)
            .sum()
    }

    #[test]
    fn test_density_integrates_to_one() {
        let table = numbers("v", &[1.0, 2.0, 2.5, 3.0, 7.0, 8.0]);
        let mapping = Mapping::new().map(Channel::X, "v");
        let out = apply(&Stat::density(), &table, &mapping).unwrap();
        assert_eq!(out.mapping.column(Channel::Y), Some("density"));

        let area = density_area(&[1.0, 2.0, 2.5, 3.0, 7.0, 8.0]);
        assert!((area - 1.0).abs() < 0.01, "area = {}", area);
    }

    #[test]
    fn test_density_with_far_outlier_integrates_to_one() {
        let mut spread: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        spread.push(1e6);
        let area = density_area(&spread);
        assert!((area - 1.0).abs() < 0.01, "area = {}", area);

        let area = density_area(&[1.0, 1.01, 1.02, 1.03, 1.05, 1e4]);
        assert!((area - 1.0).abs() < 0.01, "area = {}", area);
    }

    #[test]
    fn test_density_skips_empty_gaps() {
        let (grid, density) = kde(&[0.0, 0.5, 1.0, 1e6], 0.25, 64);
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(grid.first().copied(), Some(-0.75));
        assert!((grid[grid.len() - 1] - (1e6 + 0.75)).abs() < 1e-6);
        // both clusters are sampled finely
        assert!(grid.iter().filter(|&&g| g < 10.0).count() > 16);
        assert!(grid.iter().filter(|&&g| g > 10.0).count() > 16);
        let peak = density.iter().copied().fold(0.0, f64::max);
        assert!(peak > 0.3, "peak = {}", peak);
    }

    #[test]
    fn test_silverman_degenerate() {
        assert_eq!(silverman_bandwidth(&[5.0]), 1.0);
        assert_eq!(silverman_bandwidth(&[2.0, 2.0, 2.0]), 1.0);
        assert!(silverman_bandwidth(&[1.0, 2.0, 3.0, 4.0]) > 0.0);
    }

    #[test]
    fn test_count_first_encountered_order() {
        let table = Table::new(vec![Column::categorical("c", &["b", "a", "b", "c"])]).unwrap();
        let mapping = Mapping::new().map(Channel::X, "c");
        let out = apply(&Stat::Count, &table, &mapping).unwrap();
        assert_eq!(out.table.column("c").unwrap().distinct_keys(), vec!["b", "a", "c"]);
        assert_eq!(column_f64(&out.table, "count"), vec![2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_proportion_within_group() {
        let table = Table::new(vec![
            Column::categorical("cut", &["fair", "good", "good", "fair", "fair", "good"]),
            Column::categorical("shop", &["n", "n", "n", "s", "s", "s"]),
        ])
        .unwrap();
        let mapping = Mapping::new().map(Channel::X, "cut").map(Channel::Group, "shop");
        let out = apply(&Stat::Proportion, &table, &mapping).unwrap();

        let props = column_f64(&out.table, "prop");
        let shops: Vec<String> = out.table.column("shop").unwrap().values.iter().map(|v| v.key()).collect();
        assert_eq!(shops, vec!["n", "n", "s", "s"]);
        // shop n: fair 1/3, good 2/3; shop s: fair 2/3, good 1/3
        assert!((props[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((props[1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((props[2] - 2.0 / 3.0).abs() < 1e-12);
        assert!((props[3] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(out.mapping.column(Channel::Y), Some("prop"));
    }

    #[test]
    fn test_proportion_with_numeric_group() {
        let table = Table::new(vec![
            Column::categorical("cut", &["fair", "good", "fair", "fair", "good"]),
            Column::numeric("year", vec![2020.0, 2020.0, 2021.0, 2021.0, 2021.0]),
        ])
        .unwrap();
        let mapping = Mapping::new().map(Channel::X, "cut").map(Channel::Group, "year");
        let out = apply(&Stat::Proportion, &table, &mapping).unwrap();

        let props = column_f64(&out.table, "prop");
        let years = column_f64(&out.table, "year");
        assert_eq!(years, vec![2020.0, 2020.0, 2021.0, 2021.0]);
        assert!(props.iter().all(|&p| p <= 1.0), "props = {:?}", props);
        for year in [2020.0, 2021.0] {
            let sum: f64 = props.iter().zip(&years).filter(|(_, &y)| y == year).map(|(p, _)| p).sum();
            assert!((sum - 1.0).abs() < 1e-12, "year {} sums to {}", year, sum);
        }
        assert!((props[2] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_proportion_without_group_uses_all_rows() {
        let table = Table::new(vec![Column::categorical("c", &["a", "a", "b", "a"])]).unwrap();
        let mapping = Mapping::new().map(Channel::X, "c");
        let out = apply(&Stat::Proportion, &table, &mapping).unwrap();
        assert_eq!(column_f64(&out.table, "prop"), vec![0.75, 0.25]);
    }

    #[test]
    fn test_boxplot_summary_and_outliers() {
        let table = Table::new(vec![
            Column::categorical("g", &["a"; 6]),
            Column::numeric("v", vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0]),
        ])
        .unwrap();
        let mapping = Mapping::new().map(Channel::X, "g").map(Channel::Y, "v");
        let out = apply(&Stat::Boxplot, &table, &mapping).unwrap();

        assert_eq!(out.table.num_rows(), 1);
        assert_eq!(column_f64(&out.table, "middle"), vec![3.5]);
        assert_eq!(column_f64(&out.table, "ymax"), vec![5.0]);
        assert_eq!(out.samples[0], vec![(100.0, 0.0)]);
    }

    #[test]
    fn test_violin_curve_is_scaled() {
        let table = Table::new(vec![
            Column::categorical("g", &["a", "a", "a", "b", "b", "b"]),
            Column::numeric("v", vec![1.0, 2.0, 3.0, 10.0, 11.0, 15.0]),
        ])
        .unwrap();
        let mapping = Mapping::new().map(Channel::X, "g").map(Channel::Y, "v");
        let out = apply(&Stat::Violin, &table, &mapping).unwrap();
        assert_eq!(out.samples.len(), 2);
        let peak = out.samples[0].iter().map(|p| p.1).fold(0.0, f64::max);
        assert!((peak - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_percentile() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&data, 0.5), 2.5);
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 1.0), 4.0);
    }
}
