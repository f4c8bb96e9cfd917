//! Router construction and server host for the API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE},
    middleware,
    routing::{get, post},
};
use layerctl_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::control::ControlPlane;
use crate::error::{ApiServerError, ApiServerResult};
use crate::http::auth::require_admin_key;
use crate::http::constants::{ADMIN_PREFIX, HEADER_ADMIN_KEY, HEADER_REQUEST_ID};
use crate::http::health::{health, metrics};
use crate::http::layers::{
    disable_layer, enable_layer, get_config, get_layer, get_stats, reset_defaults, set_threshold,
    toggle_global,
};
use crate::http::telemetry::record_http_metrics;
use crate::state::ApiState;

/// Axum router wrapper that hosts the layer control API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct the server around a control plane and the shared metrics registry.
    #[must_use]
    pub fn new(control: ControlPlane, telemetry: Metrics) -> Self {
        let state = Arc::new(ApiState::new(control, telemetry));
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_ADMIN_KEY)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(layerctl_telemetry::set_request_id_layer())
            .layer(layerctl_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                record_http_metrics,
            ));

        let router = Self::public_routes()
            .nest(ADMIN_PREFIX, Self::admin_routes(&state))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
    }

    fn admin_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_admin = middleware::from_fn_with_state(state.clone(), require_admin_key);

        Router::new()
            .route("/config", get(get_config))
            .route("/layer/{key}/config", get(get_layer))
            .route("/layer/{key}/enable", post(enable_layer))
            .route("/layer/{key}/disable", post(disable_layer))
            .route("/layer/{key}/threshold", post(set_threshold))
            .route("/toggle-global", post(toggle_global))
            .route("/reset-defaults", post(reset_defaults))
            .route("/stats", get(get_stats))
            .route_layer(require_admin)
    }

    /// Serve the API on `addr` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(%addr, "layer control API listening");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { addr, source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::StatusCode;
    use layerctl_config::LayerRegistry;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::guard::CredentialGuard;

    const KEY: &str = "test-admin-key";

    fn server() -> ApiServer {
        let metrics = Metrics::new().expect("metrics");
        let control = ControlPlane::new(
            CredentialGuard::new(KEY).expect("guard"),
            Arc::new(LayerRegistry::new()),
            metrics.clone(),
        );
        ApiServer::new(control, metrics)
    }

    async fn send(
        server: &ApiServer,
        method: Method,
        uri: &str,
        key: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(HEADER_ADMIN_KEY, key);
        }
        let request = builder.body(Body::empty()).expect("request");
        let response = server
            .router()
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    #[tokio::test]
    async fn reads_require_the_admin_key() {
        let server = server();
        for key in [None, Some("wrong"), Some("test-admin-key ")] {
            let (status, body) = send(&server, Method::GET, "/admin/layers/config", key).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["type"], "https://layerctl.dev/problems/unauthorized");
            assert!(body.get("detail").is_none());
        }

        let (status, body) = send(&server, Method::GET, "/admin/layers/config", Some(KEY)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["global_enabled"], true);
        assert_eq!(body["layers"].as_object().map(serde_json::Map::len), Some(5));
    }

    #[tokio::test]
    async fn failed_auth_leaves_configuration_untouched() {
        let server = server();
        let (_, before) = send(&server, Method::GET, "/admin/layers/config", Some(KEY)).await;
        let (status, _) = send(
            &server,
            Method::POST,
            "/admin/layers/layer/2/disable",
            Some("nope"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, after) = send(&server, Method::GET, "/admin/layers/config", Some(KEY)).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn disabling_mandatory_layer_is_a_conflict() {
        let server = server();
        let (_, before) = send(&server, Method::GET, "/admin/layers/config", Some(KEY)).await;
        let (status, body) = send(
            &server,
            Method::POST,
            "/admin/layers/layer/1/disable",
            Some(KEY),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["type"], "https://layerctl.dev/problems/mandatory-layer");
        let (_, after) = send(&server, Method::GET, "/admin/layers/config", Some(KEY)).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn threshold_updates_validate_range() {
        let server = server();
        let (status, body) = send(
            &server,
            Method::POST,
            "/admin/layers/layer/2/threshold?value=0.95",
            Some(KEY),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["layers"]["2"]["confidence_threshold"], 0.95);

        let (status, body) = send(
            &server,
            Method::POST,
            "/admin/layers/layer/2/threshold?threshold=1.5",
            Some(KEY),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["type"],
            "https://layerctl.dev/problems/threshold-out-of-range"
        );
        assert_eq!(body["invalid_params"][0]["pointer"], "/value");

        let (_, body) = send(&server, Method::GET, "/admin/layers/layer/2/config", Some(KEY)).await;
        assert_eq!(body["confidence_threshold"], 0.95);
    }

    #[tokio::test]
    async fn malformed_parameters_are_bad_requests_after_auth() {
        let server = server();
        let (status, _) = send(
            &server,
            Method::POST,
            "/admin/layers/layer/2/threshold?value=high",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        for uri in [
            "/admin/layers/layer/2/threshold?value=high",
            "/admin/layers/layer/two/enable",
            "/admin/layers/toggle-global?enabled=maybe",
            "/admin/layers/toggle-global",
        ] {
            let (status, body) = send(&server, Method::POST, uri, Some(KEY)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["type"], "https://layerctl.dev/problems/bad-request");
        }
    }

    #[tokio::test]
    async fn unknown_layer_reports_allowed_keys() {
        let server = server();
        let (status, body) = send(
            &server,
            Method::POST,
            "/admin/layers/layer/9/enable",
            Some(KEY),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "https://layerctl.dev/problems/unknown-layer");
        assert_eq!(
            body["invalid_params"][0]["message"],
            "allowed keys: 1, 2, 3, 4, 5"
        );
    }

    #[tokio::test]
    async fn global_toggle_round_trip_preserves_layer_flags() {
        let server = server();
        send(
            &server,
            Method::POST,
            "/admin/layers/layer/3/disable",
            Some(KEY),
        )
        .await;
        let (_, before) = send(&server, Method::GET, "/admin/layers/config", Some(KEY)).await;

        let (status, off) = send(
            &server,
            Method::POST,
            "/admin/layers/toggle-global?enabled=false",
            Some(KEY),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(off["layers"]["2"]["effective_enabled"], false);

        let (_, on) = send(
            &server,
            Method::POST,
            "/admin/layers/toggle-global?enabled=true",
            Some(KEY),
        )
        .await;
        for key in ["1", "2", "3", "4", "5"] {
            assert_eq!(on["layers"][key]["enabled"], before["layers"][key]["enabled"]);
        }
        assert_eq!(on["layers"]["3"]["enabled"], false);
    }

    #[tokio::test]
    async fn reset_and_stats_endpoints() {
        let server = server();
        send(
            &server,
            Method::POST,
            "/admin/layers/layer/4/disable",
            Some(KEY),
        )
        .await;
        let (_, stats) = send(&server, Method::GET, "/admin/layers/stats", Some(KEY)).await;
        assert_eq!(stats["layers_disabled"], 1);

        let (status, reset) = send(
            &server,
            Method::POST,
            "/admin/layers/reset-defaults",
            Some(KEY),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reset["layers"]["4"]["enabled"], true);
    }

    #[tokio::test]
    async fn occupied_address_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = taken.local_addr().expect("local addr");

        let err = server()
            .serve(addr, std::future::ready(()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiServerError::Bind { .. }));
        assert_eq!(err.addr(), addr);
        assert!(err.to_string().contains(&addr.to_string()));
    }

    #[tokio::test]
    async fn health_and_metrics_are_public() {
        let server = server();
        let (status, body) = send(&server, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body.get("revision").is_none());

        send(&server, Method::GET, "/admin/layers/config", Some("bad")).await;
        let response = server
            .router()
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(HEADER_REQUEST_ID));
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.contains("admin_auth_failures_total 1"));
        assert!(text.contains("route=\"/admin/layers/config\""));
    }
}
