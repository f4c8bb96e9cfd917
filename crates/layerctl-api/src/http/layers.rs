//! Guarded layer configuration handlers.
//!
//! Every handler here sits behind [`crate::http::auth::require_admin_key`], so the
//! [`Authorized`] extension is always present and path/query problems are only reported
//! to authenticated callers.

use std::num::IntErrorKind;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use layerctl_config::{ConfigSnapshot, LayerSnapshot, LayerStats};

use crate::guard::Authorized;
use crate::http::errors::ApiError;
use crate::models::{GlobalToggleQuery, ThresholdQuery};
use crate::state::ApiState;

/// Integers too large for any layer are unknown layers; anything else unparsable is a bad
/// request.
fn parse_layer_key(
    state: &ApiState,
    authorized: &Authorized,
    raw: &str,
) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => ApiError::unknown_layer(
            format!("layer {raw} is not registered"),
            &state.control.keys(authorized),
        ),
        _ => ApiError::bad_request(format!("layer key '{raw}' is not an integer"))
            .with_invalid_param("/key", "layer key must be an integer"),
    })
}

fn query_problem(rejection: &QueryRejection, pointer: &str) -> ApiError {
    ApiError::bad_request(rejection.body_text()).with_invalid_param(pointer, "malformed query")
}

pub(crate) async fn get_config(
    State(state): State<Arc<ApiState>>,
    Extension(authorized): Extension<Authorized>,
) -> Json<ConfigSnapshot> {
    Json(state.control.snapshot(&authorized))
}

pub(crate) async fn get_layer(
    State(state): State<Arc<ApiState>>,
    Extension(authorized): Extension<Authorized>,
    Path(key): Path<String>,
) -> Result<Json<LayerSnapshot>, ApiError> {
    let key = parse_layer_key(&state, &authorized, &key)?;
    Ok(Json(state.control.layer(&authorized, key)?))
}

pub(crate) async fn enable_layer(
    State(state): State<Arc<ApiState>>,
    Extension(authorized): Extension<Authorized>,
    Path(key): Path<String>,
) -> Result<Json<ConfigSnapshot>, ApiError> {
    let key = parse_layer_key(&state, &authorized, &key)?;
    Ok(Json(state.control.set_layer_enabled(&authorized, key, true)?))
}

pub(crate) async fn disable_layer(
    State(state): State<Arc<ApiState>>,
    Extension(authorized): Extension<Authorized>,
    Path(key): Path<String>,
) -> Result<Json<ConfigSnapshot>, ApiError> {
    let key = parse_layer_key(&state, &authorized, &key)?;
    Ok(Json(
        state.control.set_layer_enabled(&authorized, key, false)?,
    ))
}

pub(crate) async fn set_threshold(
    State(state): State<Arc<ApiState>>,
    Extension(authorized): Extension<Authorized>,
    Path(key): Path<String>,
    query: Result<Query<ThresholdQuery>, QueryRejection>,
) -> Result<Json<ConfigSnapshot>, ApiError> {
    let key = parse_layer_key(&state, &authorized, &key)?;
    let Query(query) = query.map_err(|rejection| query_problem(&rejection, "/value"))?;
    let threshold = query.requested().ok_or_else(|| {
        ApiError::bad_request("missing threshold")
            .with_invalid_param("/value", "query parameter 'value' is required")
    })?;
    Ok(Json(
        state
            .control
            .set_layer_threshold(&authorized, key, threshold)?,
    ))
}

pub(crate) async fn toggle_global(
    State(state): State<Arc<ApiState>>,
    Extension(authorized): Extension<Authorized>,
    query: Result<Query<GlobalToggleQuery>, QueryRejection>,
) -> Result<Json<ConfigSnapshot>, ApiError> {
    let Query(query) = query.map_err(|rejection| query_problem(&rejection, "/enabled"))?;
    Ok(Json(state.control.set_global(&authorized, query.enabled)))
}

pub(crate) async fn reset_defaults(
    State(state): State<Arc<ApiState>>,
    Extension(authorized): Extension<Authorized>,
) -> Json<ConfigSnapshot> {
    Json(state.control.reset_defaults(&authorized))
}

pub(crate) async fn get_stats(
    State(state): State<Arc<ApiState>>,
    Extension(authorized): Extension<Authorized>,
) -> Json<LayerStats> {
    Json(state.control.stats(&authorized))
}
