//! Error taxonomy for the swell monitoring service.
//!
//! Nothing here is fatal to a forecast cycle. Callers recover from
//! `MissingData` with an empty result, drop and count `Validation`
//! failures, and isolate `PartialSourceFailure` to the one station.

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, SwellError>;

#[derive(Error, Debug)]
pub enum SwellError {
    /// The station produced no usable numeric fields.
    #[error("No usable data for station {station}")]
    MissingData { station: String },

    /// A value lies outside physical bounds.
    #[error("Invalid {field} = {value}: {reason}")]
    Validation {
        field: &'static str,
        value: f64,
        reason: String,
    },

    /// One station could not be processed; others are unaffected.
    #[error("Station {station} failed: {reason}")]
    PartialSourceFailure { station: String, reason: String },

    /// Bulletin text or JSON could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration file could not be read or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SwellError {
    fn from(e: serde_json::Error) -> Self {
        SwellError::Parse(format!("JSON: {}", e))
    }
}

impl From<toml::de::Error> for SwellError {
    fn from(e: toml::de::Error) -> Self {
        SwellError::Config(e.to_string())
    }
}
