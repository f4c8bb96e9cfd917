//! Default layer table and threshold bounds.
//!
//! # Design
//! - The registry is always seeded from this table; persisted documents must name the same keys.
//! - Bounds are shared by validation, the API problem payloads, and the CLI.

use std::collections::BTreeMap;

use crate::model::{LayerConfig, LayerDocument, LayerKey};

/// Inclusive lower bound for a layer confidence threshold.
pub const MIN_CONFIDENCE_THRESHOLD: f64 = 0.5;
/// Inclusive upper bound for a layer confidence threshold.
pub const MAX_CONFIDENCE_THRESHOLD: f64 = 1.0;

fn layer(
    name: &str,
    description: &str,
    sources: &[&str],
    threshold: f64,
    max_results: u32,
) -> LayerConfig {
    LayerConfig {
        name: name.to_string(),
        description: description.to_string(),
        enabled: true,
        knowledge_sources: sources.iter().map(|source| (*source).to_string()).collect(),
        confidence_threshold: threshold,
        max_results,
    }
}

/// Initial per-layer configuration: every layer on, default thresholds.
#[must_use]
pub fn default_layers() -> BTreeMap<LayerKey, LayerConfig> {
    BTreeMap::from([
        (
            LayerKey::MANDATORY,
            layer(
                "Red Flag Detection",
                "Detect ESI-2 criteria using the handbook and clinical guidelines",
                &[
                    "esi_handbook",
                    "acs_protocols",
                    "sepsis_criteria",
                    "differential_diagnosis",
                ],
                0.85,
                5,
            ),
        ),
        (
            LayerKey::new(2),
            layer(
                "Vital Signal Assessment",
                "Age-aware vital sign interpretation using clinical norms",
                &["vital_ranges"],
                0.9,
                1,
            ),
        ),
        (
            LayerKey::new(3),
            layer(
                "Resource Inference",
                "Infer required resources using clinical protocols",
                &["esi_handbook", "acs_protocols", "lab_indications"],
                0.8,
                10,
            ),
        ),
        (
            LayerKey::new(4),
            layer(
                "Handbook Verification",
                "Verify the triage decision against the official handbook",
                &["esi_handbook"],
                0.85,
                5,
            ),
        ),
        (
            LayerKey::new(5),
            layer(
                "Final Decision",
                "Format the final triage decision with handbook reasoning",
                &["esi_handbook"],
                0.75,
                2,
            ),
        ),
    ])
}

/// Initial document: global switch on, revision zero.
#[must_use]
pub fn default_document() -> LayerDocument {
    LayerDocument {
        revision: 0,
        global_enabled: true,
        layers: default_layers(),
    }
}
