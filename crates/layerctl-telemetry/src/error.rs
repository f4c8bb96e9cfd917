//! Error types for telemetry operations.

use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step of collector setup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStage {
    /// Constructing the collector from its options.
    Build,
    /// Adding the collector to the service registry.
    Register,
}

impl Display for MetricStage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Build => "build",
            Self::Register => "register",
        })
    }
}

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed, or installing one failed.
    #[error("failed to install the tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// One of the control-plane collectors could not be set up.
    #[error("failed to {stage} metric {name}")]
    Metric {
        /// Metric name, e.g. `layer_mutations_total`.
        name: &'static str,
        /// Setup step that failed.
        stage: MetricStage,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The `/metrics` exposition could not be produced.
    #[error("failed to render the metrics exposition")]
    Render {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
}
