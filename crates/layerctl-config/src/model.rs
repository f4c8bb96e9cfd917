//! Typed layer configuration models and snapshots.
//!
//! # Design
//! - Pure data carriers shared by the registry, the persistence stores, and the API.
//! - `LayerConfig` is the stored per-layer state; `LayerSnapshot` adds derived fields
//!   for readers and is never accepted back as input.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier for one pipeline layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerKey(u32);

impl LayerKey {
    /// The red-flag safety layer that can be tuned but never disabled.
    pub const MANDATORY: Self = Self(1);

    /// Wrap a raw layer number.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw layer number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether this key identifies the mandatory first stage.
    #[must_use]
    pub const fn is_mandatory(self) -> bool {
        self.0 == Self::MANDATORY.0
    }
}

impl Display for LayerKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Stored configuration for a single layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Short human label.
    pub name: String,
    /// Free text explaining the layer's purpose.
    #[serde(default)]
    pub description: String,
    /// Raw per-layer enable flag, independent of the global switch.
    pub enabled: bool,
    /// Knowledge sources the layer may consult. Read-only through the control API.
    #[serde(default)]
    pub knowledge_sources: Vec<String>,
    /// Minimum confidence the layer requires, within `[0.5, 1.0]`.
    pub confidence_threshold: f64,
    /// Retrieval fan-out hint forwarded to the pipeline. Read-only.
    #[serde(default)]
    pub max_results: u32,
}

/// Reader-facing view of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    /// Layer identifier.
    pub key: LayerKey,
    /// Short human label.
    pub name: String,
    /// Free text explaining the layer's purpose.
    pub description: String,
    /// Raw per-layer enable flag.
    pub enabled: bool,
    /// `enabled` combined with the global switch; what the pipeline should honour.
    pub effective_enabled: bool,
    /// Whether the layer is the mandatory first stage.
    pub mandatory: bool,
    /// Knowledge sources the layer may consult.
    pub knowledge_sources: Vec<String>,
    /// Minimum confidence the layer requires.
    pub confidence_threshold: f64,
    /// Retrieval fan-out hint.
    pub max_results: u32,
}

impl LayerSnapshot {
    pub(crate) fn from_config(key: LayerKey, config: &LayerConfig, global_enabled: bool) -> Self {
        Self {
            key,
            name: config.name.clone(),
            description: config.description.clone(),
            enabled: config.enabled,
            effective_enabled: global_enabled && config.enabled,
            mandatory: key.is_mandatory(),
            knowledge_sources: config.knowledge_sources.clone(),
            confidence_threshold: config.confidence_threshold,
            max_results: config.max_results,
        }
    }
}

/// Complete, consistent configuration state returned by every read and mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Monotonic revision, bumped only when a mutation changes observable state.
    pub revision: u64,
    /// Time of the last state-changing mutation.
    pub updated_at: DateTime<Utc>,
    /// Global switch; when `false` every layer is effectively inactive.
    pub global_enabled: bool,
    /// Every registered layer keyed by its identifier.
    pub layers: BTreeMap<LayerKey, LayerSnapshot>,
}

impl ConfigSnapshot {
    /// Look up a layer by raw number.
    #[must_use]
    pub fn layer(&self, key: u32) -> Option<&LayerSnapshot> {
        self.layers.get(&LayerKey::new(key))
    }

    /// Aggregate counts over the snapshot.
    #[must_use]
    pub fn stats(&self) -> LayerStats {
        let total = self.layers.len();
        let enabled = self.layers.values().filter(|layer| layer.enabled).count();
        let effective = self
            .layers
            .values()
            .filter(|layer| layer.effective_enabled)
            .count();
        LayerStats {
            revision: self.revision,
            global_enabled: self.global_enabled,
            total_layers: total,
            layers_enabled: enabled,
            layers_disabled: total - enabled,
            layers_effective: effective,
        }
    }
}

/// Result of a registry write: the snapshot taken under the write lock and whether the
/// write changed observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Configuration right after the write.
    pub snapshot: ConfigSnapshot,
    /// `false` when the write was a no-op and the revision did not move.
    pub changed: bool,
}

/// Summary counts for monitoring dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStats {
    /// Revision the counts were computed from.
    pub revision: u64,
    /// Global switch value.
    pub global_enabled: bool,
    /// Number of registered layers.
    pub total_layers: usize,
    /// Layers whose raw flag is on.
    pub layers_enabled: usize,
    /// Layers whose raw flag is off.
    pub layers_disabled: usize,
    /// Layers that are on after applying the global switch.
    pub layers_effective: usize,
}

/// Durable form of the registry written by [`crate::LayerStore`] implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDocument {
    /// Revision at the time the document was produced.
    #[serde(default)]
    pub revision: u64,
    /// Global switch value.
    pub global_enabled: bool,
    /// Stored per-layer configuration.
    pub layers: BTreeMap<LayerKey, LayerConfig>,
}

impl From<&ConfigSnapshot> for LayerDocument {
    fn from(snapshot: &ConfigSnapshot) -> Self {
        let layers = snapshot
            .layers
            .iter()
            .map(|(key, layer)| {
                (
                    *key,
                    LayerConfig {
                        name: layer.name.clone(),
                        description: layer.description.clone(),
                        enabled: layer.enabled,
                        knowledge_sources: layer.knowledge_sources.clone(),
                        confidence_threshold: layer.confidence_threshold,
                        max_results: layer.max_results,
                    },
                )
            })
            .collect();
        Self {
            revision: snapshot.revision,
            global_enabled: snapshot.global_enabled,
            layers,
        }
    }
}
