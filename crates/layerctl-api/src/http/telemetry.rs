//! HTTP metrics middleware.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use layerctl_telemetry::with_request_context;

use crate::http::constants::HEADER_REQUEST_ID;
use crate::state::ApiState;

/// Count each request by matched route and status, and expose the request id and route to
/// downstream log lines.
pub(crate) async fn record_http_metrics(
    State(state): State<Arc<ApiState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let route = req.extensions().get::<MatchedPath>().map_or_else(
        || req.uri().path().to_string(),
        |matched| matched.as_str().to_string(),
    );
    let request_id = req
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    with_request_context(request_id, route.clone(), async move {
        let response = next.run(req).await;
        state
            .telemetry
            .inc_http_request(&route, response.status().as_u16());
        response
    })
    .await
}
