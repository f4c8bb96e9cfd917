//! Error types for layer configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::LayerKey;

/// Rejection raised when a requested mutation would break a registry invariant.
///
/// A rejected request never changes registry state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The requested key is not part of the registered layer set.
    #[error("layer {key} is not registered")]
    UnknownLayer {
        /// Key supplied by the caller.
        key: i64,
        /// Keys the registry was initialised with.
        known: Vec<LayerKey>,
    },
    /// The mandatory safety layer cannot be switched off.
    #[error("layer {key} is mandatory and cannot be disabled")]
    MandatoryLayer {
        /// Key of the protected layer.
        key: LayerKey,
    },
    /// Threshold fell outside the accepted closed interval.
    #[error("confidence threshold {value} for layer {key} must be between {min} and {max}")]
    ThresholdOutOfRange {
        /// Layer the threshold was aimed at.
        key: LayerKey,
        /// Rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
}

impl ValidationError {
    /// Machine-readable reason code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::UnknownLayer { .. } => "unknown_layer",
            Self::MandatoryLayer { .. } => "mandatory_layer",
            Self::ThresholdOutOfRange { .. } => "threshold_out_of_range",
        }
    }
}

/// Primary error type for loading, validating, and persisting layer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer mutation or document value violated an invariant.
    #[error("layer validation failed")]
    Validation(#[from] ValidationError),
    /// A persisted document does not describe the registered layer set.
    #[error("invalid layer document")]
    InvalidDocument {
        /// Field or key that failed validation.
        field: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Encoding or decoding a layer document failed.
    #[error("layer document serialization failed")]
    Serde {
        /// Operation identifier.
        operation: &'static str,
        /// Source serde error.
        source: serde_json::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
