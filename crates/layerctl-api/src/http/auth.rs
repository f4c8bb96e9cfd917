//! Admin credential middleware for the HTTP layer.

use std::sync::Arc;

use axum::{extract::State, http::Request, middleware::Next, response::Response};

use crate::http::constants::HEADER_ADMIN_KEY;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Reject the request unless `x-admin-key` matches the admin secret; on success the
/// [`crate::Authorized`] proof is attached to the request extensions for handlers.
pub(crate) async fn require_admin_key(
    State(state): State<Arc<ApiState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get(HEADER_ADMIN_KEY)
        .and_then(|value| value.to_str().ok());
    let authorized = state.control.authorize(provided)?;

    req.extensions_mut().insert(authorized);
    Ok(next.run(req).await)
}
