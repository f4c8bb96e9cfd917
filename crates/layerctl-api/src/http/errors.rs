//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use layerctl_config::{LayerKey, ValidationError};

use crate::control::ControlError;
use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_MANDATORY_LAYER,
    PROBLEM_THRESHOLD_OUT_OF_RANGE, PROBLEM_UNAUTHORIZED, PROBLEM_UNKNOWN_LAYER,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    pub(crate) invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_param(
        mut self,
        pointer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.invalid_params
            .get_or_insert_with(Vec::new)
            .push(ProblemInvalidParam {
                pointer: pointer.into(),
                message: message.into(),
            });
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    /// Carries no detail about which part of the check failed.
    pub(crate) const fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    /// Lists the registered keys so callers can correct the request.
    pub(crate) fn unknown_layer(detail: impl Into<String>, known: &[LayerKey]) -> Self {
        Self::new(StatusCode::NOT_FOUND, PROBLEM_UNKNOWN_LAYER, "unknown layer")
            .with_detail(detail)
            .with_invalid_param("/key", format!("allowed keys: {}", join_keys(known)))
    }

    fn validation(err: &ValidationError) -> Self {
        match err {
            ValidationError::UnknownLayer { known, .. } => {
                Self::unknown_layer(err.to_string(), known)
            }
            ValidationError::MandatoryLayer { .. } => Self::new(
                StatusCode::CONFLICT,
                PROBLEM_MANDATORY_LAYER,
                "mandatory layer",
            )
            .with_detail(err.to_string())
            .with_invalid_param("/enabled", "the mandatory layer must stay enabled"),
            ValidationError::ThresholdOutOfRange { min, max, .. } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                PROBLEM_THRESHOLD_OUT_OF_RANGE,
                "threshold out of range",
            )
            .with_detail(err.to_string())
            .with_invalid_param("/value", format!("must be between {min} and {max} inclusive")),
        }
    }
}

fn join_keys(keys: &[LayerKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<ControlError> for ApiError {
    fn from(value: ControlError) -> Self {
        match value {
            ControlError::Unauthorized => Self::unauthorized(),
            ControlError::Validation(err) => Self::validation(&err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        let mut response = (self.status, Json(body)).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
