//! In-memory layer registry: the single owner of mutable layer configuration.
//!
//! # Design
//! - One `RwLock` guards the whole aggregate; readers share, writers are exclusive.
//! - Every mutation validates before writing, so a rejected call leaves state untouched.
//! - Revisions advance only when observable state changes; repeated no-op writes are idempotent.
//! - Committed snapshots are published on a `watch` channel while the write lock is held,
//!   which keeps the feed ordered. Durable writes happen downstream, outside the lock.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use crate::defaults::{default_document, default_layers};
use crate::error::{ConfigResult, ValidationError};
use crate::model::{
    ConfigSnapshot, LayerConfig, LayerDocument, LayerKey, LayerSnapshot, LayerStats, Mutation,
};
use crate::validate::{resolve_key, validate_document, validate_threshold};

struct RegistryState {
    revision: u64,
    updated_at: DateTime<Utc>,
    global_enabled: bool,
    layers: BTreeMap<LayerKey, LayerConfig>,
}

impl RegistryState {
    fn from_document(document: LayerDocument) -> Self {
        Self {
            revision: document.revision,
            updated_at: Utc::now(),
            global_enabled: document.global_enabled,
            layers: document.layers,
        }
    }

    fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            revision: self.revision,
            updated_at: self.updated_at,
            global_enabled: self.global_enabled,
            layers: self
                .layers
                .iter()
                .map(|(key, config)| {
                    (
                        *key,
                        LayerSnapshot::from_config(*key, config, self.global_enabled),
                    )
                })
                .collect(),
        }
    }

    fn layer_mut(&mut self, requested: i64) -> Result<(LayerKey, &mut LayerConfig), ValidationError> {
        let key = resolve_key(&self.layers, requested)?;
        self.layers
            .get_mut(&key)
            .map(|config| (key, config))
            .ok_or(ValidationError::UnknownLayer {
                key: requested,
                known: Vec::new(),
            })
    }
}

/// Lock-protected owner of the layer configuration.
pub struct LayerRegistry {
    state: RwLock<RegistryState>,
    updates: watch::Sender<ConfigSnapshot>,
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerRegistry {
    /// Build a registry from the default layer table.
    #[must_use]
    pub fn new() -> Self {
        Self::from_state(RegistryState::from_document(default_document()))
    }

    /// Build a registry from a previously persisted document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document names a different layer set than the defaults or
    /// violates a registry invariant.
    pub fn from_document(document: LayerDocument) -> ConfigResult<Self> {
        validate_document(&document, &default_layers())?;
        Ok(Self::from_state(RegistryState::from_document(document)))
    }

    fn from_state(state: RegistryState) -> Self {
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            state: RwLock::new(state),
            updates,
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.read().snapshot()
    }

    /// Current configuration of one layer.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownLayer`] when `key` is not registered.
    pub fn layer(&self, key: i64) -> Result<LayerSnapshot, ValidationError> {
        let guard = self.read();
        let key = resolve_key(&guard.layers, key)?;
        let config = &guard.layers[&key];
        Ok(LayerSnapshot::from_config(key, config, guard.global_enabled))
    }

    /// Registered layer keys in pipeline order.
    #[must_use]
    pub fn keys(&self) -> Vec<LayerKey> {
        self.read().layers.keys().copied().collect()
    }

    /// Aggregate counts over the current configuration.
    #[must_use]
    pub fn stats(&self) -> LayerStats {
        self.snapshot().stats()
    }

    /// Subscribe to committed snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConfigSnapshot> {
        self.updates.subscribe()
    }

    /// Set the global switch. Per-layer flags are left exactly as they are.
    pub fn set_global(&self, enabled: bool) -> Mutation {
        let outcome = self.mutate("set_global", |state| {
            let changed = state.global_enabled != enabled;
            state.global_enabled = enabled;
            Ok(changed)
        });
        outcome.unwrap_or_else(|_| self.unchanged())
    }

    /// Switch one layer on or off.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownLayer`] for unregistered keys and
    /// [`ValidationError::MandatoryLayer`] when asked to disable the mandatory layer.
    pub fn set_layer_enabled(
        &self,
        key: i64,
        enabled: bool,
    ) -> Result<Mutation, ValidationError> {
        self.mutate("set_layer_enabled", |state| {
            let (key, layer) = state.layer_mut(key)?;
            if key.is_mandatory() && !enabled {
                return Err(ValidationError::MandatoryLayer { key });
            }
            let changed = layer.enabled != enabled;
            layer.enabled = enabled;
            Ok(changed)
        })
    }

    /// Set one layer's confidence threshold.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownLayer`] for unregistered keys and
    /// [`ValidationError::ThresholdOutOfRange`] when `threshold` is outside `[0.5, 1.0]`.
    pub fn set_layer_threshold(
        &self,
        key: i64,
        threshold: f64,
    ) -> Result<Mutation, ValidationError> {
        self.mutate("set_layer_threshold", |state| {
            let (key, layer) = state.layer_mut(key)?;
            let threshold = validate_threshold(key, threshold)?;
            let changed = layer.confidence_threshold.to_bits() != threshold.to_bits();
            layer.confidence_threshold = threshold;
            Ok(changed)
        })
    }

    /// Restore the default layer table and global switch. The revision keeps advancing.
    pub fn reset_defaults(&self) -> Mutation {
        let outcome = self.mutate("reset_defaults", |state| {
            let defaults = default_document();
            let changed =
                state.global_enabled != defaults.global_enabled || state.layers != defaults.layers;
            state.global_enabled = defaults.global_enabled;
            state.layers = defaults.layers;
            Ok(changed)
        });
        outcome.unwrap_or_else(|_| self.unchanged())
    }

    fn unchanged(&self) -> Mutation {
        Mutation {
            snapshot: self.snapshot(),
            changed: false,
        }
    }

    fn mutate<F>(&self, operation: &'static str, apply: F) -> Result<Mutation, ValidationError>
    where
        F: FnOnce(&mut RegistryState) -> Result<bool, ValidationError>,
    {
        let mut guard = self.write();
        let changed = apply(&mut *guard)?;
        if changed {
            guard.revision += 1;
            guard.updated_at = Utc::now();
        }
        let snapshot = guard.snapshot();
        if changed {
            self.updates.send_replace(snapshot.clone());
            debug!(operation, revision = snapshot.revision, "layer registry committed");
        }
        drop(guard);
        Ok(Mutation { snapshot, changed })
    }

    // Mutations validate before writing, so a guard recovered from a poisoned lock still
    // holds a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn initial_state_is_all_enabled_with_global_on() {
        let registry = LayerRegistry::new();
        let snapshot = registry.snapshot();
        assert!(snapshot.global_enabled);
        assert_eq!(snapshot.revision, 0);
        assert_eq!(snapshot.layers.len(), 5);
        assert!(snapshot.layers.values().all(|layer| layer.enabled));
        assert!(snapshot.layers.values().all(|layer| layer.effective_enabled));
    }

    #[test]
    fn disabling_mandatory_layer_is_rejected_without_side_effects() {
        let registry = LayerRegistry::new();
        let before = registry.snapshot();
        let err = registry.set_layer_enabled(1, false).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MandatoryLayer {
                key: LayerKey::MANDATORY
            }
        );
        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn mandatory_layer_accepts_enable_and_threshold_changes() {
        let registry = LayerRegistry::new();
        let noop = registry.set_layer_enabled(1, true).unwrap();
        assert!(!noop.changed);
        assert_eq!(noop.snapshot.revision, 0, "enabling an enabled layer is a no-op");
        let applied = registry.set_layer_threshold(1, 0.6).unwrap();
        assert!(applied.changed);
        let snapshot = applied.snapshot;
        assert!((snapshot.layer(1).unwrap().confidence_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(snapshot.revision, 1);
    }

    #[test]
    fn threshold_update_is_visible_in_returned_and_later_snapshots() {
        let registry = LayerRegistry::new();
        let returned = registry.set_layer_threshold(2, 0.95).unwrap().snapshot;
        assert_eq!(returned.layer(2).unwrap().confidence_threshold, 0.95);
        assert_eq!(registry.snapshot(), returned);
    }

    #[test]
    fn out_of_range_threshold_leaves_previous_value() {
        let registry = LayerRegistry::new();
        let before = registry.snapshot();
        let err = registry.set_layer_threshold(2, 1.5).unwrap_err();
        assert_eq!(err.reason(), "threshold_out_of_range");
        assert_eq!(registry.snapshot(), before);
        assert_eq!(registry.snapshot().layer(2).unwrap().confidence_threshold, 0.9);
    }

    #[test]
    fn every_in_range_threshold_is_accepted_for_every_layer() {
        let registry = LayerRegistry::new();
        for key in registry.keys() {
            for step in 0..=100_u32 {
                let threshold = 0.5 + f64::from(step) * 0.005;
                let threshold = threshold.min(1.0);
                let snapshot = registry
                    .set_layer_threshold(i64::from(key.get()), threshold)
                    .unwrap()
                    .snapshot;
                assert_eq!(snapshot.layers[&key].confidence_threshold, threshold);
            }
        }
    }

    #[test]
    fn unknown_layer_is_rejected_before_other_checks() {
        let registry = LayerRegistry::new();
        let before = registry.snapshot();
        for key in [0, 6, -3] {
            assert!(matches!(
                registry.set_layer_threshold(key, 7.0),
                Err(ValidationError::UnknownLayer { .. })
            ));
            assert!(matches!(
                registry.set_layer_enabled(key, false),
                Err(ValidationError::UnknownLayer { .. })
            ));
            assert!(registry.layer(key).is_err());
        }
        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn set_global_is_idempotent() {
        let registry = LayerRegistry::new();
        let once = registry.set_global(true);
        let twice = registry.set_global(true);
        assert_eq!(once, twice);
        assert!(!twice.changed);
    }

    #[test]
    fn global_toggle_preserves_per_layer_flags() {
        let registry = LayerRegistry::new();
        registry.set_layer_enabled(3, false).unwrap();
        let before = registry.snapshot();

        let off = registry.set_global(false).snapshot;
        assert!(!off.global_enabled);
        assert!(off.layers.values().all(|layer| !layer.effective_enabled));
        let on = registry.set_global(true).snapshot;

        for (key, layer) in &before.layers {
            assert_eq!(on.layers[key].enabled, layer.enabled);
            assert_eq!(on.layers[key].effective_enabled, layer.effective_enabled);
        }
        assert!(!on.layers[&LayerKey::new(3)].enabled);
    }

    #[test]
    fn reset_restores_defaults_and_advances_revision() {
        let registry = LayerRegistry::new();
        registry.set_global(false);
        registry.set_layer_enabled(4, false).unwrap();
        registry.set_layer_threshold(5, 0.5).unwrap();
        let reset = registry.reset_defaults().snapshot;
        assert!(reset.global_enabled);
        assert!(reset.layers.values().all(|layer| layer.enabled));
        assert_eq!(reset.layer(5).unwrap().confidence_threshold, 0.75);
        assert_eq!(reset.revision, 4);
        let again = registry.reset_defaults();
        assert!(!again.changed);
        assert_eq!(again.snapshot.revision, 4);
    }

    #[test]
    fn stats_follow_mutations() {
        let registry = LayerRegistry::new();
        registry.set_layer_enabled(2, false).unwrap();
        let stats = registry.stats();
        assert_eq!(stats.layers_enabled, 4);
        assert_eq!(stats.layers_disabled, 1);
        registry.set_global(false);
        assert_eq!(registry.stats().layers_effective, 0);
    }

    #[test]
    fn from_document_restores_revision_and_flags() {
        let mut document = default_document();
        document.revision = 12;
        document.global_enabled = false;
        if let Some(layer) = document.layers.get_mut(&LayerKey::new(2)) {
            layer.enabled = false;
        }
        let registry = LayerRegistry::from_document(document).unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.revision, 12);
        assert!(!snapshot.global_enabled);
        assert!(!snapshot.layer(2).unwrap().enabled);
    }

    #[tokio::test]
    async fn subscribers_observe_committed_revisions_only() {
        let registry = LayerRegistry::new();
        let mut updates = registry.subscribe();
        registry.set_global(true);
        assert!(!updates.has_changed().unwrap());
        let _ = registry.set_layer_enabled(1, false);
        assert!(!updates.has_changed().unwrap());

        registry.set_layer_enabled(2, false).unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().revision, 1);
    }

    #[test]
    fn concurrent_writers_report_exactly_one_change_per_revision() {
        let registry = Arc::new(LayerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..100)
                        .filter(|round| registry.set_global(round % 2 == 0).changed)
                        .count()
                })
            })
            .collect();
        let changes: usize = handles.into_iter().map(|handle| handle.join().unwrap()).sum();
        assert_eq!(changes as u64, registry.snapshot().revision);
    }

    #[test]
    fn concurrent_mutations_never_disable_mandatory_layer() {
        let registry = Arc::new(LayerRegistry::new());
        let mut handles = Vec::new();
        for worker in 0..8_i64 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for round in 0..200_i64 {
                    let key = (worker + round) % 6;
                    let _ = registry.set_layer_enabled(key, round % 2 == 0);
                    let _ = registry.set_layer_threshold(key, 0.4 + (round % 7) as f64 * 0.1);
                    registry.set_global(round % 3 != 0);
                    let snapshot = registry.snapshot();
                    assert!(snapshot.layers[&LayerKey::MANDATORY].enabled);
                    assert!(snapshot.layers.values().all(|layer| {
                        (0.5..=1.0).contains(&layer.confidence_threshold)
                    }));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = registry.snapshot();
        assert!(snapshot.layers[&LayerKey::MANDATORY].enabled);
        assert_eq!(snapshot.layers.len(), 5);
    }
}
