//! HTTP surface: router, middleware, and handlers.

/// Admin credential middleware.
pub(crate) mod auth;
pub(crate) mod constants;
/// Problem response helpers and error types.
pub(crate) mod errors;
/// Health and metrics endpoints.
pub(crate) mod health;
/// Guarded layer configuration handlers.
pub(crate) mod layers;
/// Router construction and server host.
pub mod router;
pub(crate) mod telemetry;
