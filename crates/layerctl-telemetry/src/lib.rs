#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared across the layerctl workspace.
//!
//! Layout: `init.rs` (subscriber setup), `context.rs` (request context and request-id
//! layers), `metrics.rs` (Prometheus registry), `error.rs` (`TelemetryError`).

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{
    GlobalContextGuard, current_request_id, current_route, propagate_request_id_layer,
    set_request_id_layer, with_request_context,
};
pub use error::{MetricStage, Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
