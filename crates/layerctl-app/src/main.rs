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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint that serves the layer control API until shutdown.

use layerctl_app::{AppResult, run_app};

/// Bootstraps the control plane and blocks until a shutdown signal arrives.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
