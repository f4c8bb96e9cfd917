//! Validation helpers for layer mutations and persisted documents.

use std::collections::BTreeMap;

use crate::defaults::{MAX_CONFIDENCE_THRESHOLD, MIN_CONFIDENCE_THRESHOLD};
use crate::error::{ConfigError, ConfigResult, ValidationError};
use crate::model::{LayerConfig, LayerDocument, LayerKey};

/// Whether `value` lies in the closed threshold interval. NaN is never in range.
#[must_use]
pub fn threshold_in_range(value: f64) -> bool {
    (MIN_CONFIDENCE_THRESHOLD..=MAX_CONFIDENCE_THRESHOLD).contains(&value)
}

/// Accept `value` as the confidence threshold for `key`.
///
/// # Errors
///
/// Returns [`ValidationError::ThresholdOutOfRange`] when the value is outside `[0.5, 1.0]`.
pub fn validate_threshold(key: LayerKey, value: f64) -> Result<f64, ValidationError> {
    if threshold_in_range(value) {
        Ok(value)
    } else {
        Err(ValidationError::ThresholdOutOfRange {
            key,
            value,
            min: MIN_CONFIDENCE_THRESHOLD,
            max: MAX_CONFIDENCE_THRESHOLD,
        })
    }
}

/// Map a caller-supplied layer number onto a registered key.
pub(crate) fn resolve_key<V>(
    layers: &BTreeMap<LayerKey, V>,
    requested: i64,
) -> Result<LayerKey, ValidationError> {
    u32::try_from(requested)
        .ok()
        .map(LayerKey::new)
        .filter(|key| layers.contains_key(key))
        .ok_or_else(|| ValidationError::UnknownLayer {
            key: requested,
            known: layers.keys().copied().collect(),
        })
}

/// Check that a stored document describes exactly the `expected` layer set and satisfies
/// every registry invariant.
pub(crate) fn validate_document(
    document: &LayerDocument,
    expected: &BTreeMap<LayerKey, LayerConfig>,
) -> ConfigResult<()> {
    if let Some(extra) = document
        .layers
        .keys()
        .find(|key| !expected.contains_key(key))
    {
        return Err(ConfigError::InvalidDocument {
            field: format!("layers.{extra}"),
            reason: "unknown_layer",
            value: None,
        });
    }
    if let Some(missing) = expected
        .keys()
        .find(|key| !document.layers.contains_key(key))
    {
        return Err(ConfigError::InvalidDocument {
            field: format!("layers.{missing}"),
            reason: "missing_layer",
            value: None,
        });
    }

    for (key, layer) in &document.layers {
        if layer.name.trim().is_empty() {
            return Err(ConfigError::InvalidDocument {
                field: format!("layers.{key}.name"),
                reason: "empty",
                value: None,
            });
        }
        validate_threshold(*key, layer.confidence_threshold)?;
        if key.is_mandatory() && !layer.enabled {
            return Err(ValidationError::MandatoryLayer { key: *key }.into());
        }
    }
    Ok(())
}
