//! Control plane: the guarded operation surface over the layer registry.
//!
//! # Design
//! - `authorize` is the only way to obtain an [`Authorized`] proof, and every registry
//!   operation below requires one, so no code path can read or mutate without a credential.
//! - Each mutation returns the full resulting snapshot.
//! - Outcomes are logged and counted here so every transport gets the same observability.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use layerctl_config::{
    ConfigSnapshot, LayerKey, LayerRegistry, LayerSnapshot, LayerStats, Mutation,
    ValidationError,
};
use layerctl_telemetry::{Metrics, current_request_id, current_route};
use tracing::{info, warn};

use crate::guard::{Authorization, Authorized, CredentialGuard};

/// Terminal outcome of a rejected control-plane call.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// The credential was missing or wrong. Carries no detail about which.
    Unauthorized,
    /// The registry refused the mutation.
    Validation(ValidationError),
}

impl Display for ControlError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => formatter.write_str("admin credential rejected"),
            Self::Validation(_) => formatter.write_str("layer request rejected"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unauthorized => None,
            Self::Validation(source) => Some(source),
        }
    }
}

impl From<ValidationError> for ControlError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Result alias for control-plane calls.
pub type ControlResult<T> = Result<T, ControlError>;

/// Guard and registry bound together behind one operation set.
#[derive(Clone)]
pub struct ControlPlane {
    guard: CredentialGuard,
    registry: Arc<LayerRegistry>,
    telemetry: Metrics,
}

impl ControlPlane {
    /// Compose the control plane.
    #[must_use]
    pub fn new(guard: CredentialGuard, registry: Arc<LayerRegistry>, telemetry: Metrics) -> Self {
        telemetry.set_config_revision(registry.snapshot().revision);
        Self {
            guard,
            registry,
            telemetry,
        }
    }

    /// Check the presented credential.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Unauthorized`] when the credential is missing or wrong.
    pub fn authorize(&self, credential: Option<&str>) -> ControlResult<Authorized> {
        match self.guard.authorize_optional(credential) {
            Authorization::Authorized(proof) => Ok(proof),
            Authorization::Unauthorized => {
                self.telemetry.inc_auth_failure();
                warn!(
                    request_id = current_request_id().as_deref().unwrap_or_default(),
                    route = current_route().as_deref().unwrap_or_default(),
                    credential_present = credential.is_some(),
                    "admin credential rejected"
                );
                Err(ControlError::Unauthorized)
            }
        }
    }

    /// Full configuration snapshot.
    #[must_use]
    pub fn snapshot(&self, _: &Authorized) -> ConfigSnapshot {
        self.registry.snapshot()
    }

    /// One layer's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Validation`] when the key is not registered.
    pub fn layer(&self, _: &Authorized, key: i64) -> ControlResult<LayerSnapshot> {
        self.registry.layer(key).map_err(|err| {
            warn!(key, reason = err.reason(), "layer lookup rejected");
            ControlError::from(err)
        })
    }

    /// Registered layer keys in ascending order.
    #[must_use]
    pub fn keys(&self, _: &Authorized) -> Vec<LayerKey> {
        self.registry.keys()
    }

    /// Aggregate layer counts.
    #[must_use]
    pub fn stats(&self, _: &Authorized) -> LayerStats {
        self.registry.stats()
    }

    /// Flip the global switch.
    #[must_use]
    pub fn set_global(&self, _: &Authorized, enabled: bool) -> ConfigSnapshot {
        let mutation = self.registry.set_global(enabled);
        self.record_applied("set_global", None, &mutation);
        mutation.snapshot
    }

    /// Enable or disable one layer.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Validation`] for unknown keys or an attempt to disable the
    /// mandatory layer.
    pub fn set_layer_enabled(
        &self,
        _: &Authorized,
        key: i64,
        enabled: bool,
    ) -> ControlResult<ConfigSnapshot> {
        let operation = if enabled {
            "enable_layer"
        } else {
            "disable_layer"
        };
        let outcome = self.registry.set_layer_enabled(key, enabled);
        self.record(operation, key, outcome)
    }

    /// Set one layer's confidence threshold.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Validation`] for unknown keys or out-of-range thresholds.
    pub fn set_layer_threshold(
        &self,
        _: &Authorized,
        key: i64,
        threshold: f64,
    ) -> ControlResult<ConfigSnapshot> {
        let outcome = self.registry.set_layer_threshold(key, threshold);
        self.record("set_layer_threshold", key, outcome)
    }

    /// Restore the default layer table.
    #[must_use]
    pub fn reset_defaults(&self, _: &Authorized) -> ConfigSnapshot {
        let mutation = self.registry.reset_defaults();
        self.record_applied("reset_defaults", None, &mutation);
        mutation.snapshot
    }

    fn record(
        &self,
        operation: &'static str,
        key: i64,
        outcome: Result<Mutation, ValidationError>,
    ) -> ControlResult<ConfigSnapshot> {
        match outcome {
            Ok(mutation) => {
                self.record_applied(operation, Some(key), &mutation);
                Ok(mutation.snapshot)
            }
            Err(err) => {
                self.telemetry.inc_layer_mutation(operation, err.reason());
                warn!(
                    operation,
                    key,
                    reason = err.reason(),
                    request_id = current_request_id().as_deref().unwrap_or_default(),
                    error = %err,
                    "layer mutation rejected"
                );
                Err(err.into())
            }
        }
    }

    fn record_applied(
        &self,
        operation: &'static str,
        key: Option<i64>,
        mutation: &Mutation,
    ) {
        let outcome = if mutation.changed {
            "applied"
        } else {
            "unchanged"
        };
        let snapshot = &mutation.snapshot;
        self.telemetry.inc_layer_mutation(operation, outcome);
        self.telemetry.set_config_revision(snapshot.revision);
        info!(
            operation,
            key,
            outcome,
            revision = snapshot.revision,
            global_enabled = snapshot.global_enabled,
            request_id = current_request_id().as_deref().unwrap_or_default(),
            "layer mutation committed"
        );
    }
}
