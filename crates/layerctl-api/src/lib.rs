#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Admin control API for the triage pipeline's layer configuration.
//!
//! Layout: `guard.rs` (admin credential check), `control.rs` (guarded operation set over the
//! registry), `http/` (axum router, middleware, handlers), `models.rs` (wire DTOs),
//! `error.rs` (server bootstrap errors).

pub mod control;
pub mod error;
pub mod guard;
pub mod http;
pub mod models;
pub(crate) mod state;

pub use control::{ControlError, ControlPlane, ControlResult};
pub use error::{ApiServerError, ApiServerResult};
pub use guard::{Authorization, Authorized, CredentialGuard, GuardError};
pub use http::router::ApiServer;
pub use models::{
    GlobalToggleQuery, HealthResponse, ProblemDetails, ProblemInvalidParam, ThresholdQuery,
};
