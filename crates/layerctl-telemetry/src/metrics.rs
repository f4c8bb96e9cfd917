//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the control plane reports on `/metrics`.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{MetricStage, Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the service.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    admin_auth_failures_total: IntCounter,
    layer_mutations_total: IntCounterVec,
    config_persist_failures_total: IntCounter,
    config_revision: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Revision of the most recently committed layer configuration.
    pub config_revision: i64,
    /// Requests rejected by the credential guard.
    pub admin_auth_failures_total: u64,
    /// Failed attempts to persist a committed configuration.
    pub config_persist_failures_total: u64,
}

fn build<C>(name: &'static str, collector: prometheus::Result<C>) -> Result<C> {
    collector.map_err(|source| TelemetryError::Metric {
        name,
        stage: MetricStage::Build,
        source,
    })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Metric {
            name,
            stage: MetricStage::Register,
            source,
        })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = build(
            "http_requests_total",
            IntCounterVec::new(
                Opts::new("http_requests_total", "Total HTTP requests received"),
                &["route", "code"],
            ),
        )?;
        let admin_auth_failures_total = build(
            "admin_auth_failures_total",
            IntCounter::with_opts(Opts::new(
                "admin_auth_failures_total",
                "Admin requests rejected by the credential guard",
            )),
        )?;
        let layer_mutations_total = build(
            "layer_mutations_total",
            IntCounterVec::new(
                Opts::new(
                    "layer_mutations_total",
                    "Layer configuration mutations by operation and outcome",
                ),
                &["operation", "outcome"],
            ),
        )?;
        let config_persist_failures_total = build(
            "config_persist_failures_total",
            IntCounter::with_opts(Opts::new(
                "config_persist_failures_total",
                "Committed layer configurations that could not be persisted",
            )),
        )?;
        let config_revision = build(
            "config_revision",
            IntGauge::with_opts(Opts::new(
                "config_revision",
                "Revision of the committed layer configuration",
            )),
        )?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(
            &registry,
            "admin_auth_failures_total",
            &admin_auth_failures_total,
        )?;
        register(&registry, "layer_mutations_total", &layer_mutations_total)?;
        register(
            &registry,
            "config_persist_failures_total",
            &config_persist_failures_total,
        )?;
        register(&registry, "config_revision", &config_revision)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                admin_auth_failures_total,
                layer_mutations_total,
                config_persist_failures_total,
                config_revision,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the rejected-credential counter.
    pub fn inc_auth_failure(&self) {
        self.inner.admin_auth_failures_total.inc();
    }

    /// Count one layer mutation, labelled `applied`, `unchanged`, or with a rejection reason.
    pub fn inc_layer_mutation(&self, operation: &str, outcome: &str) {
        self.inner
            .layer_mutations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Increment the persistence failure counter.
    pub fn inc_persist_failure(&self) {
        self.inner.config_persist_failures_total.inc();
    }

    /// Record the committed configuration revision.
    pub fn set_config_revision(&self, revision: u64) {
        self.inner
            .config_revision
            .set(i64::try_from(revision).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the gathered metric families cannot be encoded.
    pub fn render(&self) -> Result<String> {
        TextEncoder::new()
            .encode_to_string(&self.inner.registry.gather())
            .map_err(|source| TelemetryError::Render { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            config_revision: self.inner.config_revision.get(),
            admin_auth_failures_total: self.inner.admin_auth_failures_total.get(),
            config_persist_failures_total: self.inner.config_persist_failures_total.get(),
        }
    }
}
