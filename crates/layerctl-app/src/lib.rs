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

//! Layer control plane service wiring.
//!
//! Layout: `settings.rs` (environment settings), `bootstrap.rs` (service wiring and
//! shutdown), `persistence.rs` (background store writer), `error.rs` (`AppError`).

/// Application bootstrap and shutdown.
pub mod bootstrap;
/// Application error type.
pub mod error;
mod persistence;
/// Environment settings.
pub mod settings;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
pub use settings::AppSettings;
