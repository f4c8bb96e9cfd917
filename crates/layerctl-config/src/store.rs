//! Pluggable persistence for layer documents.
//!
//! # Design
//! - The registry never talks to storage; callers load once at startup and save committed
//!   snapshots from the change feed.
//! - `FileStore` writes each save to its own uniquely named temp file in the target directory
//!   and persists it over the target, so readers never observe a partial document and
//!   overlapping saves never share a temp file.

use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::model::LayerDocument;

/// Abstraction over the backend that keeps layer configuration across restarts.
#[async_trait]
pub trait LayerStore: Send + Sync {
    /// Load the most recently saved document, or `None` when nothing has been saved yet.
    async fn load(&self) -> ConfigResult<Option<LayerDocument>>;
    /// Persist `document`, replacing any earlier one.
    async fn save(&self, document: &LayerDocument) -> ConfigResult<()>;
}

/// Process-local store used by tests and by deployments without a state path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<LayerDocument>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `document`.
    #[must_use]
    pub fn with_document(document: LayerDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
        }
    }
}

#[async_trait]
impl LayerStore for MemoryStore {
    async fn load(&self) -> ConfigResult<Option<LayerDocument>> {
        let guard = self
            .document
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.clone())
    }

    async fn save(&self, document: &LayerDocument) -> ConfigResult<()> {
        let mut guard = self
            .document
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(document.clone());
        Ok(())
    }
}

/// JSON document on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store backed by the file at `path`. The file does not need to exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }
}

fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> ConfigResult<()> {
    let io_error = |operation, source| ConfigError::Io {
        operation,
        path: target.to_path_buf(),
        source,
    };
    let mut temp =
        NamedTempFile::new_in(dir).map_err(|source| io_error("layer_store.create_temp", source))?;
    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|source| io_error("layer_store.write", source))?;
    temp.persist(target)
        .map_err(|err| io_error("layer_store.persist", err.error))?;
    Ok(())
}

#[async_trait]
impl LayerStore for FileStore {
    #[instrument(name = "layer_store.load", skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> ConfigResult<Option<LayerDocument>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no persisted layer document");
                return Ok(None);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "layer_store.read",
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let document = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Serde {
            operation: "layer_store.decode",
            source,
        })?;
        Ok(Some(document))
    }

    #[instrument(
        name = "layer_store.save",
        skip(self, document),
        fields(path = %self.path.display(), revision = document.revision)
    )]
    async fn save(&self, document: &LayerDocument) -> ConfigResult<()> {
        let bytes =
            serde_json::to_vec_pretty(document).map_err(|source| ConfigError::Serde {
                operation: "layer_store.encode",
                source,
            })?;

        let dir = self.directory();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| ConfigError::Io {
                operation: "layer_store.create_dir",
                path: dir.clone(),
                source,
            })?;

        let target = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &bytes))
            .await
            .map_err(|err| ConfigError::Io {
                operation: "layer_store.join",
                path: self.path.clone(),
                source: io::Error::other(err),
            })??;
        debug!("layer document persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_document;
    use crate::model::LayerKey;

    #[tokio::test]
    async fn memory_store_round_trips() -> ConfigResult<()> {
        let store = MemoryStore::new();
        assert!(store.load().await?.is_none());

        let mut document = default_document();
        document.revision = 4;
        store.save(&document).await?;
        assert_eq!(store.load().await?, Some(document));
        Ok(())
    }

    #[tokio::test]
    async fn file_store_missing_file_loads_as_none() -> ConfigResult<()> {
        let dir = tempfile::tempdir().map_err(|source| ConfigError::Io {
            operation: "test.tempdir",
            path: PathBuf::new(),
            source,
        })?;
        let store = FileStore::new(dir.path().join("absent.json"));
        assert!(store.load().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn file_store_saves_atomically_into_new_directories() -> ConfigResult<()> {
        let dir = tempfile::tempdir().map_err(|source| ConfigError::Io {
            operation: "test.tempdir",
            path: PathBuf::new(),
            source,
        })?;
        let store = FileStore::new(dir.path().join("nested").join("layers.json"));

        let mut document = default_document();
        document.revision = 9;
        if let Some(layer) = document.layers.get_mut(&LayerKey::new(3)) {
            layer.enabled = false;
        }
        store.save(&document).await?;

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .map_err(|source| ConfigError::Io {
                operation: "test.read_dir",
                path: dir.path().to_path_buf(),
                source,
            })?
            .filter_map(Result::ok)
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("layers.json")]);
        assert_eq!(store.load().await?, Some(document));
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_saves_leave_one_complete_document() -> ConfigResult<()> {
        let dir = tempfile::tempdir().map_err(|source| ConfigError::Io {
            operation: "test.tempdir",
            path: PathBuf::new(),
            source,
        })?;
        let store = std::sync::Arc::new(FileStore::new(dir.path().join("layers.json")));

        let mut saves = tokio::task::JoinSet::new();
        for revision in 1..=16 {
            let store = std::sync::Arc::clone(&store);
            saves.spawn(async move {
                let mut document = default_document();
                document.revision = revision;
                store.save(&document).await
            });
        }
        while let Some(joined) = saves.join_next().await {
            joined.expect("save task")?;
        }

        let stored = store.load().await?.expect("document present");
        assert!((1..=16).contains(&stored.revision));
        Ok(())
    }

    #[tokio::test]
    async fn file_store_rejects_corrupt_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("layers.json");
        std::fs::write(&path, b"{ not json").expect("write fixture");
        let err = FileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Serde {
                operation: "layer_store.decode",
                ..
            }
        ));
    }
}
