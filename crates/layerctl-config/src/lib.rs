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

//! Layer registry for the triage pipeline control plane.
//!
//! Layout: `model.rs` (layer models and snapshots), `defaults.rs` (initial layer table and
//! threshold bounds), `validate.rs` (validation helpers), `registry.rs` (`LayerRegistry`),
//! `store.rs` (`LayerStore` with memory and file backends).

pub mod defaults;
pub mod error;
pub mod model;
pub mod registry;
pub mod store;
pub mod validate;

pub use defaults::{
    MAX_CONFIDENCE_THRESHOLD, MIN_CONFIDENCE_THRESHOLD, default_document, default_layers,
};
pub use error::{ConfigError, ConfigResult, ValidationError};
pub use model::{
    ConfigSnapshot, LayerConfig, LayerDocument, LayerKey, LayerSnapshot, LayerStats, Mutation,
};
pub use registry::LayerRegistry;
pub use store::{FileStore, LayerStore, MemoryStore};
pub use validate::{threshold_in_range, validate_threshold};
