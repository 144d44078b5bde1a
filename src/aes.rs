//! Aesthetic mappings: which column (or constant) feeds which visual channel.

use crate::error::{PlotError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Visual channel a column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    X,
    Y,
    Xend,
    Yend,
    Ymin,
    Ymax,
    Color,
    Fill,
    Size,
    Alpha,
    Shape,
    Label,
    Group,
}

impl Channel {
    pub const ALL: [Channel; 13] = [
        Channel::X,
        Channel::Y,
        Channel::Xend,
        Channel::Yend,
        Channel::Ymin,
        Channel::Ymax,
        Channel::Color,
        Channel::Fill,
        Channel::Size,
        Channel::Alpha,
        Channel::Shape,
        Channel::Label,
        Channel::Group,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::X => "x",
            Channel::Y => "y",
            Channel::Xend => "xend",
            Channel::Yend => "yend",
            Channel::Ymin => "ymin",
            Channel::Ymax => "ymax",
            Channel::Color => "color",
            Channel::Fill => "fill",
            Channel::Size => "size",
            Channel::Alpha => "alpha",
            Channel::Shape => "shape",
            Channel::Label => "label",
            Channel::Group => "group",
        }
    }

    /// Channels that share the x position scale.
    pub fn is_x_position(self) -> bool {
        matches!(self, Channel::X | Channel::Xend)
    }

    /// Channels that share the y position scale.
    pub fn is_y_position(self) -> bool {
        matches!(self, Channel::Y | Channel::Yend | Channel::Ymin | Channel::Ymax)
    }

    pub fn is_position(self) -> bool {
        self.is_x_position() || self.is_y_position()
    }

    /// The channel whose scale this channel trains and reads.
    pub fn scale_channel(self) -> Option<Channel> {
        match self {
            Channel::X | Channel::Xend => Some(Channel::X),
            Channel::Y | Channel::Yend | Channel::Ymin | Channel::Ymax => Some(Channel::Y),
            Channel::Color | Channel::Fill | Channel::Size | Channel::Alpha | Channel::Shape => Some(self),
            // Labels are drawn verbatim and groups only partition rows.
            Channel::Label | Channel::Group => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Channel::X),
            "y" => Ok(Channel::Y),
            "xend" => Ok(Channel::Xend),
            "yend" => Ok(Channel::Yend),
            "ymin" => Ok(Channel::Ymin),
            "ymax" => Ok(Channel::Ymax),
            "color" | "colour" => Ok(Channel::Color),
            "fill" => Ok(Channel::Fill),
            "size" => Ok(Channel::Size),
            "alpha" => Ok(Channel::Alpha),
            "shape" => Ok(Channel::Shape),
            "label" => Ok(Channel::Label),
            "group" => Ok(Channel::Group),
            _ => Err(PlotError::InvalidChannel(s.to_string())),
        }
    }
}

/// A constant assigned to a channel instead of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Number(f64),
    Text(String),
}

impl Constant {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Constant::Number(n) => Some(*n),
            Constant::Text(s) => s.parse().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Constant::Number(n) => crate::data::format_number(*n),
            Constant::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for Constant {
    fn from(n: f64) -> Self {
        Constant::Number(n)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::Text(s.to_string())
    }
}

/// Aesthetic value: either mapped to a data column or fixed to a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum AestheticValue {
    Mapped(String),
    Fixed(Constant),
}

impl AestheticValue {
    pub fn column(&self) -> Option<&str> {
        match self {
            AestheticValue::Mapped(c) => Some(c),
            AestheticValue::Fixed(_) => None,
        }
    }
}

/// Channel → value assignments, ordered by channel for deterministic iteration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: BTreeMap<Channel, AestheticValue>,
}

impl Mapping {
    pub fn new() -> Self {
        Mapping::default()
    }

    /// Builder form of [`Mapping::set`] mapping a channel to a column.
    pub fn map(mut self, channel: Channel, column: impl Into<String>) -> Self {
        self.set(channel, AestheticValue::Mapped(column.into()));
        self
    }

    /// Builder form of [`Mapping::set`] fixing a channel to a constant.
    pub fn fixed(mut self, channel: Channel, value: impl Into<Constant>) -> Self {
        self.set(channel, AestheticValue::Fixed(value.into()));
        self
    }

    pub fn set(&mut self, channel: Channel, value: AestheticValue) {
        self.entries.insert(channel, value);
    }

    /// Map a channel given by name, failing on unknown channel names.
    pub fn map_named(self, channel: &str, column: impl Into<String>) -> Result<Self> {
        let channel: Channel = channel.parse()?;
        Ok(self.map(channel, column))
    }

    pub fn get(&self, channel: Channel) -> Option<&AestheticValue> {
        self.entries.get(&channel)
    }

    /// Column mapped to a channel, ignoring fixed entries.
    pub fn column(&self, channel: Channel) -> Option<&str> {
        self.get(channel).and_then(AestheticValue::column)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.entries.contains_key(&channel)
    }

    pub fn remove(&mut self, channel: Channel) -> Option<AestheticValue> {
        self.entries.remove(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &AestheticValue)> + '_ {
        self.entries.iter().map(|(c, v)| (*c, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay `layer` on top of `self`; the layer wins on channel collisions.
    pub fn merge(&self, layer: &Mapping) -> Mapping {
        let mut merged = self.clone();
        for (channel, value) in &layer.entries {
            merged.entries.insert(*channel, value.clone());
        }
        merged
    }
}
