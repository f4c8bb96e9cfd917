//! Shared client utilities and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use layerctl_api::ProblemDetails;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

pub(crate) const HEADER_ADMIN_KEY: &str = "x-admin-key";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type; the variant picks the process exit code.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Unauthorized(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::Unauthorized(_) => 4,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Unauthorized(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Build the HTTP client shared by every command of one invocation.
///
/// Every request carries `request_id` so server logs can be correlated with the run.
pub(crate) fn build_client(timeout_secs: u64, request_id: &str) -> CliResult<Client> {
    let mut default_headers = HeaderMap::new();
    let request_id = HeaderValue::from_str(request_id).map_err(|_| {
        CliError::failure(anyhow!("request identifier contains invalid characters"))
    })?;
    default_headers.insert(HEADER_REQUEST_ID, request_id);

    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .default_headers(default_headers)
        .build()
        .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) admin_key: Option<String>,
}

impl AppContext {
    /// The key is sent exactly as given; the server compares it verbatim.
    fn admin_key(&self) -> CliResult<&str> {
        self.admin_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                CliError::validation(
                    "admin key is required (pass --admin-key or set LAYERCTL_ADMIN_KEY)",
                )
            })
    }

    fn endpoint(&self, path: &str) -> CliResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| CliError::failure(anyhow!("invalid base URL: {err}")))
    }

    /// Issue an authenticated GET and decode the JSON body.
    pub(crate) async fn get_json<T>(&self, path: &str) -> CliResult<T>
    where
        T: DeserializeOwned,
    {
        let key = self.admin_key()?;
        let url = self.endpoint(path)?;
        let response = self
            .client
            .get(url)
            .header(HEADER_ADMIN_KEY, key)
            .send()
            .await
            .map_err(|err| CliError::failure(anyhow!("request to {path} failed: {err}")))?;
        decode(path, response).await
    }

    /// Issue an authenticated POST with `query` parameters and decode the JSON body.
    pub(crate) async fn post_json<T>(&self, path: &str, query: &[(&str, String)]) -> CliResult<T>
    where
        T: DeserializeOwned,
    {
        let key = self.admin_key()?;
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url)
            .header(HEADER_ADMIN_KEY, key)
            .query(query)
            .send()
            .await
            .map_err(|err| CliError::failure(anyhow!("request to {path} failed: {err}")))?;
        decode(path, response).await
    }
}

async fn decode<T>(path: &str, response: reqwest::Response) -> CliResult<T>
where
    T: DeserializeOwned,
{
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| CliError::failure(anyhow!("failed to parse response from {path}: {err}")))
    } else {
        Err(classify_problem(response).await)
    }
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Classify an HTTP response into a CLI error.
pub(crate) async fn classify_problem(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();

    let body_text = String::from_utf8_lossy(&bytes).to_string();
    let problem = serde_json::from_slice::<ProblemDetails>(&bytes).ok();

    let mut message = problem
        .as_ref()
        .and_then(|p| p.detail.clone())
        .unwrap_or_else(|| {
            problem
                .as_ref()
                .map_or_else(|| body_text.trim().to_string(), |p| p.title.clone())
        });
    if let Some(params) = problem.as_ref().and_then(|p| p.invalid_params.as_ref()) {
        let hints: String = params
            .iter()
            .map(|param| format!("; {}: {}", param.pointer, param.message))
            .collect();
        message.push_str(&hints);
    }

    match status {
        StatusCode::UNAUTHORIZED => CliError::Unauthorized(if message.is_empty() {
            "admin key rejected".to_string()
        } else {
            message
        }),
        StatusCode::BAD_REQUEST
        | StatusCode::NOT_FOUND
        | StatusCode::CONFLICT
        | StatusCode::UNPROCESSABLE_ENTITY => CliError::validation(message),
        _ => {
            let detail = if let Some(problem) = problem {
                format!("{} (status {})", message, problem.status)
            } else if !body_text.is_empty() {
                format!("{message} (status {status})")
            } else {
                format!("request failed with status {status}")
            };
            CliError::failure(anyhow!(detail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    async fn response_from(status: u16, body: serde_json::Value) -> reqwest::Response {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/problem");
            then.status(status)
                .header("content-type", "application/problem+json")
                .json_body(body);
        });
        reqwest::get(format!("{}/problem", server.base_url()))
            .await
            .expect("mock server reachable")
    }

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
        assert_eq!(CliError::Unauthorized("no".into()).exit_code(), 4);
    }

    #[test]
    fn parse_url_rejects_garbage() {
        assert!(parse_url("http://127.0.0.1:7070").is_ok());
        assert!(parse_url("not a url").is_err());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_exit_code_four() {
        let response = response_from(
            401,
            json!({
                "type": "https://layerctl.dev/problems/unauthorized",
                "title": "authentication required",
                "status": 401
            }),
        )
        .await;
        let err = classify_problem(response).await;
        assert!(matches!(err, CliError::Unauthorized(_)));
        assert_eq!(err.display_message(), "authentication required");
    }

    #[tokio::test]
    async fn unknown_layer_carries_invalid_params() {
        let response = response_from(
            404,
            json!({
                "type": "https://layerctl.dev/problems/unknown-layer",
                "title": "unknown layer",
                "status": 404,
                "detail": "layer 9 is not registered",
                "invalid_params": [
                    {"pointer": "/key", "message": "allowed keys: 1, 2, 3, 4, 5"}
                ]
            }),
        )
        .await;
        let err = classify_problem(response).await;
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.display_message(),
            "layer 9 is not registered; /key: allowed keys: 1, 2, 3, 4, 5"
        );
    }

    #[tokio::test]
    async fn server_errors_are_failures() {
        let response = response_from(
            500,
            json!({
                "type": "https://layerctl.dev/problems/internal",
                "title": "internal server error",
                "status": 500
            }),
        )
        .await;
        let err = classify_problem(response).await;
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.display_message(), "internal server error (status 500)");
    }

    #[tokio::test]
    async fn missing_admin_key_is_a_validation_error() {
        let ctx = AppContext {
            client: Client::new(),
            base_url: "http://127.0.0.1:1".parse().expect("url"),
            admin_key: Some(String::new()),
        };
        let err = ctx
            .get_json::<serde_json::Value>("/admin/layers/config")
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[test]
    fn admin_key_is_not_trimmed() {
        let ctx = AppContext {
            client: Client::new(),
            base_url: "http://127.0.0.1:1".parse().expect("url"),
            admin_key: Some(" padded key ".to_string()),
        };
        assert_eq!(ctx.admin_key().expect("non-empty key"), " padded key ");
    }
}
