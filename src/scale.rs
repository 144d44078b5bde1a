use crate::aes::Channel;
use crate::data::{format_number, format_timestamp, Column, Value, ValueType};
use crate::error::{PlotError, Result};
use crate::facet::FacetScales;
use crate::ir::{PanelScales, RenderData, ResolvedSpec, ScaleSet};
use crate::layer::Geom;
use crate::palette::{self, PointShape};
use crate::stat::{XMAX_COLUMN, XMIN_COLUMN};
use plotters::style::RGBColor;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Default radius range (pixels) of continuous size scales.
pub const DEFAULT_SIZE_RANGE: (f64, f64) = (1.5, 6.0);
/// Default range of continuous alpha scales.
pub const DEFAULT_ALPHA_RANGE: (f64, f64) = (0.1, 1.0);
/// Expansion of discrete position domains around the first and last slot.
const DISCRETE_EXPANSION: f64 = 0.6;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// How a scale interprets its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleKind {
    /// Continuous for numeric/temporal data, discrete otherwise.
    #[default]
    Auto,
    Continuous,
    Discrete,
    /// Explicit category → value table.
    Manual,
    /// Data values are already visual values.
    Identity,
}

/// Transform applied to continuous values before interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    #[default]
    Identity,
    Log10,
    Sqrt,
    Reverse,
}

impl Transform {
    pub fn name(self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::Log10 => "log10",
            Transform::Sqrt => "sqrt",
            Transform::Reverse => "reverse",
        }
    }

    /// Forward transform; `None` outside the transform's domain.
    pub fn apply(self, v: f64) -> Option<f64> {
        match self {
            Transform::Identity | Transform::Reverse => Some(v),
            Transform::Log10 => (v > 0.0).then(|| v.log10()),
            Transform::Sqrt => (v >= 0.0).then(|| v.sqrt()),
        }
    }

    pub fn inverse(self, t: f64) -> f64 {
        match self {
            Transform::Identity | Transform::Reverse => t,
            Transform::Log10 => 10f64.powf(t),
            Transform::Sqrt => t * t,
        }
    }
}

/// User declaration of a scale for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSpec {
    pub channel: Channel,
    pub kind: ScaleKind,
    pub transform: Transform,
    /// Fixed continuous domain; values outside are dropped.
    pub limits: Option<(f64, f64)>,
    /// Output range of size/alpha scales.
    pub range: Option<(f64, f64)>,
    /// Colours of a discrete palette, or the endpoints of a gradient.
    pub palette: Vec<String>,
    /// Category → visual value table of manual scales.
    pub values: Vec<(String, String)>,
    /// Axis or legend title.
    pub name: Option<String>,
}

impl ScaleSpec {
    pub fn new(channel: Channel) -> Self {
        ScaleSpec {
            channel,
            kind: ScaleKind::Auto,
            transform: Transform::Identity,
            limits: None,
            range: None,
            palette: Vec::new(),
            values: Vec::new(),
            name: None,
        }
    }

    pub fn continuous(channel: Channel) -> Self {
        ScaleSpec {
            kind: ScaleKind::Continuous,
            ..ScaleSpec::new(channel)
        }
    }

    pub fn discrete(channel: Channel) -> Self {
        ScaleSpec {
            kind: ScaleKind::Discrete,
            ..ScaleSpec::new(channel)
        }
    }

    pub fn identity(channel: Channel) -> Self {
        ScaleSpec {
            kind: ScaleKind::Identity,
            ..ScaleSpec::new(channel)
        }
    }

    pub fn log10(channel: Channel) -> Self {
        ScaleSpec::continuous(channel).transform(Transform::Log10)
    }

    pub fn sqrt(channel: Channel) -> Self {
        ScaleSpec::continuous(channel).transform(Transform::Sqrt)
    }

    pub fn reverse(channel: Channel) -> Self {
        ScaleSpec::new(channel).transform(Transform::Reverse)
    }

    /// Manual category → value table (colours, sizes or shape names).
    pub fn manual<K: AsRef<str>, V: AsRef<str>>(channel: Channel, values: &[(K, V)]) -> Self {
        ScaleSpec {
            kind: ScaleKind::Manual,
            values: values
                .iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
                .collect(),
            ..ScaleSpec::new(channel)
        }
    }

    /// Two-colour continuous gradient.
    pub fn gradient(channel: Channel, low: &str, high: &str) -> Self {
        ScaleSpec::continuous(channel).palette(&[low, high])
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn limits(mut self, min: f64, max: f64) -> Self {
        self.limits = Some((min.min(max), min.max(max)));
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn palette<S: AsRef<str>>(mut self, colors: &[S]) -> Self {
        self.palette = colors.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Ordered override merge: the last declaration for a channel wins.
pub fn merge_specs(specs: &[ScaleSpec]) -> BTreeMap<Channel, ScaleSpec> {
    let mut merged = BTreeMap::new();
    for spec in specs {
        let channel = spec.channel.scale_channel().unwrap_or(spec.channel);
        merged.insert(channel, ScaleSpec { channel, ..spec.clone() });
    }
    merged
}

// =============================================================================
// Training
// =============================================================================

/// Accumulates the values seen by one scale across layers and panels.
#[derive(Debug, Clone, Default)]
pub struct ScaleTrainer {
    min: Option<f64>,
    max: Option<f64>,
    keys: Vec<String>,
    seen: BTreeSet<String>,
    discrete: bool,
    temporal: bool,
    column: Option<String>,
}

impl ScaleTrainer {
    pub fn train(&mut self, col: &Column) {
        if self.column.is_none() {
            self.column = Some(col.name.clone());
        }
        match col.kind {
            ValueType::Temporal => self.temporal = true,
            kind if kind.is_discrete() => self.discrete = true,
            _ => {}
        }
        for key in col.distinct_keys() {
            if self.seen.insert(key.clone()) {
                self.keys.push(key);
            }
        }
        if col.kind.is_continuous() {
            for v in col.values.iter().filter_map(Value::as_f64) {
                self.include(v);
            }
        }
    }

    /// Extend the continuous range by a raw value.
    pub fn include(&mut self, v: f64) {
        if !v.is_finite() {
            return;
        }
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    pub fn merge(&mut self, other: &ScaleTrainer) {
        if self.column.is_none() {
            self.column = other.column.clone();
        }
        self.discrete |= other.discrete;
        self.temporal |= other.temporal;
        for key in &other.keys {
            if self.seen.insert(key.clone()) {
                self.keys.push(key.clone());
            }
        }
        if let Some(v) = other.min {
            self.include(v);
        }
        if let Some(v) = other.max {
            self.include(v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.min.is_none()
    }

    /// Name of the first column trained into this scale.
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }
}

// =============================================================================
// Resolved scales
// =============================================================================

/// Trained domain; continuous bounds are in transformed space.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Continuous { min: f64, max: f64 },
    Discrete(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
enum ScaleOutput {
    /// Expanded position extent in transformed space.
    Position { lo: f64, hi: f64 },
    Gradient { low: RGBColor, high: RGBColor },
    Colors(Vec<RGBColor>),
    Numbers { lo: f64, hi: f64 },
    Levels(Vec<f64>),
    Shapes(Vec<PointShape>),
    Identity,
}

/// A tick or legend key: position in transformed space plus its label.
#[derive(Debug, Clone, PartialEq)]
pub struct Break {
    pub value: f64,
    pub label: String,
}

/// A trained scale mapping data values of one channel to visual values.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedScale {
    pub channel: Channel,
    pub transform: Transform,
    pub domain: Domain,
    pub temporal: bool,
    pub title: Option<String>,
    /// Column the scale was trained from, used for legend titles and merging.
    pub column: Option<String>,
    limits: Option<(f64, f64)>,
    lookup: BTreeMap<String, usize>,
    output: ScaleOutput,
}

impl ResolvedScale {
    /// Resolve a trained channel, validating the declaration against the data.
    ///
    /// `zoom` fixes the visible position extent (raw data space) without dropping data.
    pub fn resolve(
        channel: Channel,
        spec: Option<&ScaleSpec>,
        trainer: &ScaleTrainer,
        zoom: Option<(f64, f64)>,
    ) -> Result<ResolvedScale> {
        let default_spec = ScaleSpec::new(channel);
        let spec = spec.unwrap_or(&default_spec);
        let column = trainer.column.clone().unwrap_or_else(|| channel.to_string());

        let discrete = match spec.kind {
            ScaleKind::Discrete | ScaleKind::Manual => true,
            ScaleKind::Continuous => {
                if trainer.discrete {
                    return Err(PlotError::type_mismatch(
                        &column,
                        format!("continuous {} scale applied to discrete values", channel),
                    ));
                }
                false
            }
            ScaleKind::Auto | ScaleKind::Identity => trainer.discrete,
        };

        if discrete && matches!(spec.transform, Transform::Log10 | Transform::Sqrt) {
            return Err(PlotError::type_mismatch(
                &column,
                format!("{} transform needs numeric {} values", spec.transform.name(), channel),
            ));
        }
        if !discrete && channel == Channel::Shape {
            return Err(PlotError::type_mismatch(
                &column,
                "a continuous variable cannot be mapped to shape",
            ));
        }

        let domain = if discrete {
            Domain::Discrete(trainer.keys.clone())
        } else {
            continuous_domain(channel, spec, trainer)?
        };
        let lookup = match &domain {
            Domain::Discrete(keys) => keys.iter().enumerate().map(|(i, k)| (k.clone(), i)).collect(),
            Domain::Continuous { .. } => BTreeMap::new(),
        };

        let output = if channel.is_position() {
            position_output(spec, &domain, zoom)
        } else {
            aesthetic_output(channel, spec, &domain, &column)?
        };

        debug!(channel = %channel, discrete, "resolved scale");
        Ok(ResolvedScale {
            channel,
            transform: spec.transform,
            domain,
            temporal: trainer.temporal && !discrete,
            title: spec.name.clone(),
            column: trainer.column.clone(),
            limits: if discrete { None } else { spec.limits },
            lookup,
            output,
        })
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self.domain, Domain::Discrete(_))
    }

    pub fn categories(&self) -> &[String] {
        match &self.domain {
            Domain::Discrete(keys) => keys,
            Domain::Continuous { .. } => &[],
        }
    }

    fn category_index(&self, v: &Value) -> Option<usize> {
        if v.is_null() {
            return None;
        }
        self.lookup.get(&v.key()).copied()
    }

    /// Value in transformed space: category slot or transformed number.
    /// `None` for nulls, unknown categories and values outside the limits.
    pub fn position(&self, v: &Value) -> Option<f64> {
        match &self.domain {
            Domain::Discrete(_) => self.category_index(v).map(|i| i as f64),
            Domain::Continuous { .. } => self.transform_raw(v.as_f64()?),
        }
    }

    /// Transform a raw number, honouring the limits.
    pub fn transform_raw(&self, raw: f64) -> Option<f64> {
        if !raw.is_finite() {
            return None;
        }
        if let Some((lo, hi)) = self.limits {
            if raw < lo || raw > hi {
                return None;
            }
        }
        self.transform.apply(raw)
    }

    /// Visible position extent in transformed space.
    pub fn extent(&self) -> (f64, f64) {
        match (&self.output, &self.domain) {
            (ScaleOutput::Position { lo, hi }, _) => (*lo, *hi),
            (_, Domain::Continuous { min, max }) => (*min, *max),
            (_, Domain::Discrete(keys)) => (0.0, keys.len().saturating_sub(1) as f64),
        }
    }

    /// Map a transformed-space value onto the unit interval of the extent.
    pub fn rescale(&self, t: f64) -> f64 {
        let (lo, hi) = self.extent();
        let unit = if hi > lo { (t - lo) / (hi - lo) } else { 0.5 };
        if self.transform == Transform::Reverse {
            1.0 - unit
        } else {
            unit
        }
    }

    /// Data value → unit interval.
    pub fn map_unit(&self, v: &Value) -> Option<f64> {
        self.position(v).map(|t| self.rescale(t))
    }

    fn fraction(&self, v: &Value) -> Option<f64> {
        let t = self.position(v)?;
        Some(self.rescale(t).clamp(0.0, 1.0))
    }

    pub fn color(&self, v: &Value) -> Option<RGBColor> {
        match &self.output {
            ScaleOutput::Colors(colors) => self.category_index(v).and_then(|i| colors.get(i).copied()),
            ScaleOutput::Gradient { low, high } => self.fraction(v).map(|t| palette::interpolate(*low, *high, t)),
            ScaleOutput::Identity => palette::parse_color(&v.key()),
            _ => None,
        }
    }

    pub fn number(&self, v: &Value) -> Option<f64> {
        match &self.output {
            ScaleOutput::Numbers { lo, hi } => self.fraction(v).map(|t| lo + (hi - lo) * t),
            ScaleOutput::Levels(levels) => self.category_index(v).and_then(|i| levels.get(i).copied()),
            ScaleOutput::Identity => v.as_f64().or_else(|| v.key().parse().ok()),
            _ => None,
        }
    }

    pub fn shape(&self, v: &Value) -> Option<PointShape> {
        match &self.output {
            ScaleOutput::Shapes(shapes) => self.category_index(v).and_then(|i| shapes.get(i).copied()),
            ScaleOutput::Identity => v.key().parse().ok(),
            _ => None,
        }
    }

    /// Endpoints of a continuous colour gradient.
    pub fn gradient(&self) -> Option<(RGBColor, RGBColor)> {
        match &self.output {
            ScaleOutput::Gradient { low, high } => Some((*low, *high)),
            _ => None,
        }
    }

    /// Tick positions (transformed space) with labels, inside the extent.
    pub fn breaks(&self) -> Vec<Break> {
        let (lo, hi) = self.extent();
        let within = |b: &Break| b.value >= lo.min(hi) - 1e-9 && b.value <= hi.max(lo) + 1e-9;

        let breaks: Vec<Break> = match &self.domain {
            Domain::Discrete(keys) => keys
                .iter()
                .enumerate()
                .map(|(i, k)| Break {
                    value: i as f64,
                    label: k.clone(),
                })
                .collect(),
            Domain::Continuous { .. } if self.temporal => temporal_breaks(lo, hi),
            Domain::Continuous { .. } => match self.transform {
                Transform::Log10 => log_breaks(lo, hi),
                Transform::Sqrt => {
                    let (a, b) = (self.transform.inverse(lo.max(0.0)), self.transform.inverse(hi));
                    let step = nice_step(b - a, 5);
                    nice_breaks(a, b, 5)
                        .into_iter()
                        .filter_map(|v| {
                            self.transform.apply(v).map(|t| Break {
                                value: t,
                                label: format_break(v, step),
                            })
                        })
                        .collect()
                }
                _ => {
                    let step = nice_step(hi - lo, 5);
                    nice_breaks(lo, hi, 5)
                        .into_iter()
                        .map(|v| Break {
                            value: v,
                            label: format_break(v, step),
                        })
                        .collect()
                }
            },
        };
        breaks.into_iter().filter(within).collect()
    }
}

fn continuous_domain(channel: Channel, spec: &ScaleSpec, trainer: &ScaleTrainer) -> Result<Domain> {
    let (raw_min, raw_max) = match spec.limits {
        Some(limits) => limits,
        None => match (trainer.min, trainer.max) {
            (Some(min), Some(max)) => (min, max),
            // Untrained scales get a range that is valid under every transform.
            _ => (1.0, 10.0),
        },
    };

    let check_min = trainer.min.unwrap_or(raw_min).min(raw_min);
    match spec.transform {
        Transform::Log10 if check_min <= 0.0 => {
            return Err(PlotError::DomainError {
                channel: channel.to_string(),
                message: format!("log10 is undefined for {}", format_number(check_min)),
            })
        }
        Transform::Sqrt if check_min < 0.0 => {
            return Err(PlotError::DomainError {
                channel: channel.to_string(),
                message: format!("sqrt is undefined for {}", format_number(check_min)),
            })
        }
        _ => {}
    }

    let t = |v: f64| spec.transform.apply(v).unwrap_or(v);
    Ok(Domain::Continuous {
        min: t(raw_min),
        max: t(raw_max),
    })
}

fn position_output(spec: &ScaleSpec, domain: &Domain, zoom: Option<(f64, f64)>) -> ScaleOutput {
    let (lo, hi) = match domain {
        Domain::Discrete(keys) => (-DISCRETE_EXPANSION, keys.len().max(1) as f64 - 1.0 + DISCRETE_EXPANSION),
        Domain::Continuous { min, max } => match (zoom, spec.limits) {
            (Some((a, b)), _) => {
                let t = |v: f64| spec.transform.apply(v).unwrap_or(v);
                (t(a), t(b))
            }
            (None, Some(_)) => (*min, *max),
            (None, None) => pad_range(*min, *max),
        },
    };
    ScaleOutput::Position { lo, hi }
}

fn aesthetic_output(channel: Channel, spec: &ScaleSpec, domain: &Domain, column: &str) -> Result<ScaleOutput> {
    let keys = match domain {
        Domain::Discrete(keys) => Some(keys),
        Domain::Continuous { .. } => None,
    };

    if spec.kind == ScaleKind::Identity {
        if let Some(keys) = keys {
            validate_identity(channel, keys)?;
        }
        return Ok(ScaleOutput::Identity);
    }

    match (channel, keys) {
        (Channel::Color | Channel::Fill, Some(keys)) => {
            if spec.kind == ScaleKind::Manual {
                let colors = manual_values(channel, spec, keys)?
                    .into_iter()
                    .map(|v| parse_spec_color(&v))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(ScaleOutput::Colors(colors));
            }
            let palette = if spec.palette.is_empty() {
                palette::CATEGORY10.to_vec()
            } else {
                spec.palette.iter().map(|c| parse_spec_color(c)).collect::<Result<Vec<_>>>()?
            };
            Ok(ScaleOutput::Colors(
                (0..keys.len()).map(|i| palette[i % palette.len()]).collect(),
            ))
        }
        (Channel::Color | Channel::Fill, None) => {
            reject_manual(spec, column)?;
            let (low, high) = match spec.palette.as_slice() {
                [] | [_] => (palette::GRADIENT_LOW, palette::GRADIENT_HIGH),
                [first, .., last] => (parse_spec_color(first)?, parse_spec_color(last)?),
            };
            Ok(ScaleOutput::Gradient { low, high })
        }
        (Channel::Size | Channel::Alpha, keys) => {
            let (lo, hi) = spec.range.unwrap_or(if channel == Channel::Size {
                DEFAULT_SIZE_RANGE
            } else {
                DEFAULT_ALPHA_RANGE
            });
            match keys {
                Some(keys) if spec.kind == ScaleKind::Manual => {
                    let levels = manual_values(channel, spec, keys)?
                        .into_iter()
                        .map(|v| {
                            v.trim().parse::<f64>().map_err(|_| {
                                PlotError::InvalidSpec(format!("'{}' is not a valid {} value", v, channel))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(ScaleOutput::Levels(levels))
                }
                Some(keys) => {
                    let n = keys.len();
                    let levels = (0..n)
                        .map(|i| if n > 1 { lo + (hi - lo) * i as f64 / (n - 1) as f64 } else { (lo + hi) / 2.0 })
                        .collect();
                    Ok(ScaleOutput::Levels(levels))
                }
                None => {
                    reject_manual(spec, column)?;
                    Ok(ScaleOutput::Numbers { lo, hi })
                }
            }
        }
        (Channel::Shape, Some(keys)) => {
            if spec.kind == ScaleKind::Manual {
                let shapes = manual_values(channel, spec, keys)?
                    .into_iter()
                    .map(|v| v.parse::<PointShape>().map_err(PlotError::InvalidSpec))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(ScaleOutput::Shapes(shapes));
            }
            Ok(ScaleOutput::Shapes((0..keys.len()).map(PointShape::nth).collect()))
        }
        _ => Err(PlotError::InvalidSpec(format!("channel '{}' has no scale", channel))),
    }
}

fn reject_manual(spec: &ScaleSpec, column: &str) -> Result<()> {
    if spec.kind == ScaleKind::Manual {
        return Err(PlotError::type_mismatch(
            column,
            format!("manual {} scale needs discrete values", spec.channel),
        ));
    }
    Ok(())
}

/// Manual values in domain order; every category must have an entry.
fn manual_values(channel: Channel, spec: &ScaleSpec, keys: &[String]) -> Result<Vec<String>> {
    keys.iter()
        .map(|key| {
            spec.values
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| PlotError::UnmappedCategory {
                    channel: channel.to_string(),
                    value: key.clone(),
                })
        })
        .collect()
}

fn validate_identity(channel: Channel, keys: &[String]) -> Result<()> {
    for key in keys {
        let valid = match channel {
            Channel::Color | Channel::Fill => palette::parse_color(key).is_some(),
            Channel::Shape => key.parse::<PointShape>().is_ok(),
            _ => key.parse::<f64>().is_ok(),
        };
        if !valid {
            return Err(PlotError::InvalidSpec(format!(
                "'{}' is not a literal {} value",
                key, channel
            )));
        }
    }
    Ok(())
}

fn parse_spec_color(s: &str) -> Result<RGBColor> {
    palette::parse_color(s).ok_or_else(|| PlotError::InvalidSpec(format!("Unknown color '{}'", s)))
}

// =============================================================================
// Breaks
// =============================================================================

pub fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}

/// A 1-2-5 step giving roughly `target` intervals over `span`.
pub fn nice_step(span: f64, target: usize) -> f64 {
    if !span.is_finite() || span <= 0.0 {
        return 1.0;
    }
    let raw = span / target.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let norm = raw / magnitude;
    let nice = if norm < 1.5 {
        1.0
    } else if norm < 3.0 {
        2.0
    } else if norm < 7.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Multiples of a nice step inside `[lo, hi]`.
pub fn nice_breaks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    if !lo.is_finite() || !hi.is_finite() {
        return Vec::new();
    }
    let step = nice_step(hi - lo, target);
    let first = (lo / step - 1e-9).ceil() as i64;
    let last = (hi / step + 1e-9).floor() as i64;
    if last < first || last - first > 1000 {
        return Vec::new();
    }
    (first..=last).map(|k| k as f64 * step).collect()
}

fn format_break(v: f64, step: f64) -> String {
    if v.abs() < step * 1e-9 {
        return "0".to_string();
    }
    let decimals = if step >= 1.0 { 0 } else { (-step.log10().floor()) as usize };
    format!("{:.*}", decimals, v)
}

fn log_breaks(lo: f64, hi: f64) -> Vec<Break> {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let first = lo.ceil() as i64;
    let last = hi.floor() as i64;
    if last - first >= 1 && last - first <= 30 {
        return (first..=last)
            .map(|k| Break {
                value: k as f64,
                label: format_number(10f64.powi(k as i32)),
            })
            .collect();
    }
    // Less than two decades visible: ticks at nice raw values.
    let (a, b) = (10f64.powf(lo), 10f64.powf(hi));
    let step = nice_step(b - a, 4);
    nice_breaks(a, b, 4)
        .into_iter()
        .filter(|v| *v > 0.0)
        .map(|v| Break {
            value: v.log10(),
            label: format_break(v, step),
        })
        .collect()
}

fn temporal_breaks(lo: f64, hi: f64) -> Vec<Break> {
    let (lo_days, hi_days) = (lo / SECONDS_PER_DAY, hi / SECONDS_PER_DAY);
    let step = nice_step(hi_days - lo_days, 5).max(1.0);
    let first = (lo_days / step).ceil() as i64;
    let last = (hi_days / step).floor() as i64;
    if last < first || last - first > 1000 {
        return Vec::new();
    }
    (first..=last)
        .map(|k| {
            let secs = k as f64 * step * SECONDS_PER_DAY;
            Break {
                value: secs,
                label: format_timestamp(secs.round() as i64),
            }
        })
        .collect()
}

// =============================================================================
// Scale system
// =============================================================================

/// Train and resolve every scale of the plot.
///
/// Position scales are trained per panel and shared according to the facet's scale mode;
/// all other scales are shared by every panel.
pub fn build_scales(data: &RenderData, spec: &ResolvedSpec) -> Result<ScaleSet> {
    let n_panels = data.panels.len();
    let mut panel_x = vec![ScaleTrainer::default(); n_panels];
    let mut panel_y = vec![ScaleTrainer::default(); n_panels];
    let mut aesthetics: BTreeMap<Channel, ScaleTrainer> = BTreeMap::new();

    let y_transform = spec.scales.get(&Channel::Y).map(|s| s.transform).unwrap_or_default();

    for (p, panel) in data.panels.iter().enumerate() {
        for frame in &panel.layers {
            let layer = &spec.layers[frame.layer];

            for (channel, value) in frame.mapping.iter() {
                let Some(col) = value.column().and_then(|c| frame.table.column(c)) else {
                    continue;
                };
                match channel.scale_channel() {
                    Some(Channel::X) => panel_x[p].train(col),
                    Some(Channel::Y) => panel_y[p].train(col),
                    Some(other) => aesthetics.entry(other).or_default().train(col),
                    None => {}
                }
            }

            if matches!(layer.geom, Geom::Bar | Geom::Boxplot | Geom::Violin) {
                for extent in [XMIN_COLUMN, XMAX_COLUMN] {
                    if let Some(col) = frame.table.column(extent).filter(|c| c.kind.is_continuous()) {
                        panel_x[p].train(col);
                    }
                }
            }
            if layer.geom == Geom::Boxplot {
                for sample in frame.samples.iter().flatten() {
                    panel_y[p].include(sample.0);
                }
            }
            if layer.geom.anchors_at_zero() && y_transform != Transform::Log10 {
                panel_y[p].include(0.0);
            }
        }
    }

    let mode = spec.facet.as_ref().map(|f| f.scales()).unwrap_or(FacetScales::Fixed);
    let share_x = matches!(mode, FacetScales::Fixed | FacetScales::FreeY);
    let share_y = matches!(mode, FacetScales::Fixed | FacetScales::FreeX);
    let (zoom_x, zoom_y) = spec.coord.position_limits();

    let resolve_axis = |channel: Channel, trainers: &[ScaleTrainer], shared: bool, zoom| -> Result<Vec<ResolvedScale>> {
        let spec = spec.scales.get(&channel);
        if shared {
            let mut global = ScaleTrainer::default();
            for t in trainers {
                global.merge(t);
            }
            let scale = ResolvedScale::resolve(channel, spec, &global, zoom)?;
            Ok(vec![scale; trainers.len()])
        } else {
            trainers
                .iter()
                .map(|t| ResolvedScale::resolve(channel, spec, t, zoom))
                .collect()
        }
    };

    let xs = resolve_axis(Channel::X, &panel_x, share_x, zoom_x)?;
    let ys = resolve_axis(Channel::Y, &panel_y, share_y, zoom_y)?;

    let mut resolved = BTreeMap::new();
    for (channel, trainer) in &aesthetics {
        if trainer.is_empty() {
            continue;
        }
        let scale = ResolvedScale::resolve(*channel, spec.scales.get(channel), trainer, None)?;
        resolved.insert(*channel, scale);
    }

    Ok(ScaleSet {
        panels: xs.into_iter().zip(ys).map(|(x, y)| PanelScales { x, y }).collect(),
        aesthetics: resolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(col: Column) -> ScaleTrainer {
        let mut t = ScaleTrainer::default();
        t.train(&col);
        t
    }

    #[test]
    fn test_continuous_position_padding() {
        let t = trained(Column::numeric("v", vec![0.0, 10.0]));
        let scale = ResolvedScale::resolve(Channel::X, None, &t, None).unwrap();
        assert_eq!(scale.extent(), (-0.5, 10.5));
        let unit = scale.map_unit(&Value::Number(0.0)).unwrap();
        assert!((unit - 0.5 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_domain() {
        let t = trained(Column::numeric("v", vec![5.0]));
        let scale = ResolvedScale::resolve(Channel::Y, None, &t, None).unwrap();
        assert_eq!(scale.extent(), (4.0, 6.0));
    }

    #[test]
    fn test_discrete_first_encountered_order() {
        let t = trained(Column::categorical("c", &["b", "a", "c", "a", "b"]));
        let scale = ResolvedScale::resolve(Channel::Color, None, &t, None).unwrap();
        assert_eq!(scale.categories(), &["b", "a", "c"]);
        assert_eq!(scale.color(&Value::Text("b".into())), Some(palette::category_color(0)));
        assert_eq!(scale.color(&Value::Text("c".into())), Some(palette::category_color(2)));
    }

    #[test]
    fn test_discrete_position_expansion() {
        let t = trained(Column::categorical("c", &["x", "y", "z"]));
        let scale = ResolvedScale::resolve(Channel::X, None, &t, None).unwrap();
        assert_eq!(scale.extent(), (-0.6, 2.6));
        assert_eq!(scale.position(&Value::Text("y".into())), Some(1.0));
    }

    #[test]
    fn test_log_rejects_non_positive() {
        let t = trained(Column::numeric("v", vec![10.0, 0.0]));
        let err = ResolvedScale::resolve(Channel::X, Some(&ScaleSpec::log10(Channel::X)), &t, None).unwrap_err();
        assert!(matches!(err, PlotError::DomainError { ref channel, .. } if channel == "x"));
    }

    #[test]
    fn test_log_preserves_order() {
        let t = trained(Column::numeric("v", vec![1.0, 10.0, 1000.0]));
        let scale = ResolvedScale::resolve(Channel::Y, Some(&ScaleSpec::log10(Channel::Y)), &t, None).unwrap();
        let a = scale.map_unit(&Value::Number(1.0)).unwrap();
        let b = scale.map_unit(&Value::Number(10.0)).unwrap();
        let c = scale.map_unit(&Value::Number(1000.0)).unwrap();
        assert!(a < b && b < c);
        let labels: Vec<String> = scale.breaks().into_iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["1", "10", "100", "1000"]);
    }

    #[test]
    fn test_reverse_flips_unit() {
        let t = trained(Column::numeric("v", vec![0.0, 10.0]));
        let scale = ResolvedScale::resolve(Channel::X, Some(&ScaleSpec::reverse(Channel::X)), &t, None).unwrap();
        assert!(scale.map_unit(&Value::Number(0.0)).unwrap() > scale.map_unit(&Value::Number(10.0)).unwrap());
    }

    #[test]
    fn test_manual_unmapped_category() {
        let t = trained(Column::categorical("region", &["east", "west"]));
        let spec = ScaleSpec::manual(Channel::Fill, &[("east", "red")]);
        let err = ResolvedScale::resolve(Channel::Fill, Some(&spec), &t, None).unwrap_err();
        assert!(matches!(err, PlotError::UnmappedCategory { ref value, .. } if value == "west"));
    }

    #[test]
    fn test_manual_colors() {
        let t = trained(Column::categorical("region", &["east", "west"]));
        let spec = ScaleSpec::manual(Channel::Fill, &[("west", "#0000ff"), ("east", "red")]);
        let scale = ResolvedScale::resolve(Channel::Fill, Some(&spec), &t, None).unwrap();
        assert_eq!(scale.color(&Value::Text("west".into())), Some(RGBColor(0, 0, 255)));
    }

    #[test]
    fn test_continuous_shape_is_type_mismatch() {
        let t = trained(Column::numeric("v", vec![1.0, 2.0]));
        let err = ResolvedScale::resolve(Channel::Shape, None, &t, None).unwrap_err();
        assert!(matches!(err, PlotError::TypeMismatch { .. }));
    }

    #[test]
    fn test_continuous_spec_on_discrete_data() {
        let t = trained(Column::categorical("c", &["a"]));
        let err = ResolvedScale::resolve(Channel::X, Some(&ScaleSpec::continuous(Channel::X)), &t, None).unwrap_err();
        assert!(matches!(err, PlotError::TypeMismatch { .. }));
    }

    #[test]
    fn test_gradient_endpoints() {
        let t = trained(Column::numeric("v", vec![0.0, 1.0]));
        let scale = ResolvedScale::resolve(Channel::Color, None, &t, None).unwrap();
        assert_eq!(scale.color(&Value::Number(0.0)), Some(palette::GRADIENT_LOW));
        assert_eq!(scale.color(&Value::Number(1.0)), Some(palette::GRADIENT_HIGH));
    }

    #[test]
    fn test_size_range() {
        let t = trained(Column::numeric("v", vec![0.0, 4.0]));
        let scale = ResolvedScale::resolve(Channel::Size, None, &t, None).unwrap();
        assert_eq!(scale.number(&Value::Number(0.0)), Some(1.5));
        assert_eq!(scale.number(&Value::Number(4.0)), Some(6.0));
    }

    #[test]
    fn test_limits_drop_values() {
        let t = trained(Column::numeric("v", vec![0.0, 100.0]));
        let spec = ScaleSpec::continuous(Channel::X).limits(0.0, 50.0);
        let scale = ResolvedScale::resolve(Channel::X, Some(&spec), &t, None).unwrap();
        assert_eq!(scale.extent(), (0.0, 50.0));
        assert!(scale.position(&Value::Number(100.0)).is_none());
        assert!(scale.position(&Value::Number(25.0)).is_some());
    }

    #[test]
    fn test_merge_specs_last_wins() {
        let merged = merge_specs(&[
            ScaleSpec::log10(Channel::Y),
            ScaleSpec::continuous(Channel::X),
            ScaleSpec::reverse(Channel::Y),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&Channel::Y].transform, Transform::Reverse);
    }

    #[test]
    fn test_nice_breaks() {
        assert_eq!(nice_breaks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(nice_step(1.0, 5), 0.2);
        assert_eq!(format_break(0.30000000000000004, 0.1), "0.3");
    }

    #[test]
    fn test_temporal_breaks_are_dates() {
        let t = trained(Column::temporal("day", vec![1_704_067_200, 1_704_931_200]));
        let scale = ResolvedScale::resolve(Channel::X, None, &t, None).unwrap();
        let breaks = scale.breaks();
        assert!(!breaks.is_empty());
        assert!(breaks.iter().all(|b| b.label.starts_with("2024-01")));
    }
}
