//! Error types for document conversion.

use thiserror::Error;

/// Every way a conversion can fail.
///
/// Errors are raised where they are detected and propagate unchanged to the
/// caller; a failed conversion never yields a partially converted document.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("document must be a valid JSON or YAML document: {reason}")]
    InvalidDocument { reason: String },

    #[error("cannot convert from {from} to {to}")]
    UnknownVersion { from: String, to: String },

    #[error("cannot downgrade from {from} to {to}")]
    Downgrade { from: String, to: String },

    #[error("cannot convert to the same version ({version})")]
    NoopConversion { version: String },

    #[error("unsupported {location} parameter '{name}': {reason}")]
    UnsupportedParameter {
        name: String,
        location: String,
        reason: String,
    },

    #[error("unsupported {family} version '{version}'")]
    UnsupportedSchemaVersion { family: String, version: String },

    #[error("cannot convert {family} document with {entry_point}")]
    WrongConverter {
        family: String,
        entry_point: String,
    },

    #[error("required field missing: {path}")]
    MissingField { path: String },

    #[error("failed to serialize converted document: {0}")]
    Serialize(String),
}

impl From<serde_yaml::Error> for ConvertError {
    fn from(err: serde_yaml::Error) -> Self {
        ConvertError::Serialize(err.to_string())
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::Serialize(err.to_string())
    }
}
