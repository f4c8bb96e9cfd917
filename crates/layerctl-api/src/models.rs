//! HTTP DTOs shared by the server and the CLI.
//!
//! Layer snapshots and statistics are served as the registry's own serde types
//! (`layerctl_config::ConfigSnapshot`, `LayerSnapshot`, `LayerStats`); only transport-specific
//! shapes live here.

use serde::{Deserialize, Serialize};

/// RFC9457-compatible problem document surfaced on authorization and validation errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary of the problem type.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Parameters that failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer to the offending parameter.
    pub pointer: String,
    /// What was wrong with it, including the accepted values.
    pub message: String,
}

/// Query for `POST /admin/layers/layer/{key}/threshold`.
///
/// `threshold` is accepted as an alias of `value`; `value` wins when both are present.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ThresholdQuery {
    /// New confidence threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Alias of `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl ThresholdQuery {
    /// The requested threshold, if either parameter was supplied.
    #[must_use]
    pub const fn requested(&self) -> Option<f64> {
        match (self.value, self.threshold) {
            (Some(value), _) | (None, Some(value)) => Some(value),
            (None, None) => None,
        }
    }
}

/// Query for `POST /admin/layers/toggle-global`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalToggleQuery {
    /// Desired global switch value.
    pub enabled: bool,
}

/// Liveness payload served on `/health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `ok` while the process is serving.
    pub status: String,
    /// Build identifier.
    pub build: String,
}
