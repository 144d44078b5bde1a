//! Error types for plot construction and rendering.

use thiserror::Error;

/// Result type alias using [`PlotError`].
pub type Result<T> = std::result::Result<T, PlotError>;

/// Errors raised while building or rendering a plot.
///
/// Everything except [`PlotError::Render`] and the I/O conversions is detected while
/// resolving mappings, stats and scales, before any drawing starts.
#[derive(Error, Debug)]
pub enum PlotError {
    /// Mapping target is not a known visual channel.
    #[error("Invalid channel '{0}'")]
    InvalidChannel(String),

    /// Mapping references a column the table does not have.
    #[error("Column '{column}' not found (mapped to {channel})")]
    UnknownColumn { channel: String, column: String },

    /// A layer needs a channel that neither the layer nor the scene maps.
    #[error("Layer {layer} ({geom}) requires the '{channel}' aesthetic")]
    MissingChannel {
        layer: usize,
        geom: String,
        channel: String,
    },

    /// Stat or scale applied to a column of an incompatible type.
    #[error("Type mismatch on column '{column}': {message}")]
    TypeMismatch { column: String, message: String },

    /// Mathematically undefined transform (e.g. log of a non-positive value).
    #[error("Domain error on {channel} scale: {message}")]
    DomainError { channel: String, message: String },

    /// Discrete value absent from an explicit manual scale.
    #[error("Value '{value}' has no entry in the manual {channel} scale")]
    UnmappedCategory { channel: String, value: String },

    /// Columns of a table differ in length.
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Facet layout cannot hold the partitions.
    #[error("Invalid facet layout: {0}")]
    InvalidLayout(String),

    /// Structurally invalid plot specification.
    #[error("Invalid plot specification: {0}")]
    InvalidSpec(String),

    /// DSL parse failure.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed input data.
    #[error("Data error: {0}")]
    Data(String),

    /// Backend failure while drawing or encoding.
    #[error("Rendering error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlotError {
    pub(crate) fn type_mismatch(column: &str, message: impl Into<String>) -> Self {
        PlotError::TypeMismatch {
            column: column.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_offender() {
        let err = PlotError::UnmappedCategory {
            channel: "fill".to_string(),
            value: "west".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("west"));
        assert!(msg.contains("fill"));
    }

    #[test]
    fn test_unknown_column_display() {
        let err = PlotError::UnknownColumn {
            channel: "x".to_string(),
            column: "height".to_string(),
        };
        assert!(err.to_string().contains("height"));
    }
}
