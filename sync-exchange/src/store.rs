//! Store seams used by the receiving side of exchanges.
//!
//! The persistent version/object store is an external collaborator.
//! [`VersionStore`] widens the read-only seams from sync-core with the
//! writes the unshare handlers need; [`StorageIo`] is the slice of file
//! storage they touch. [`MemoryStore`] implements the lot for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use sync_core::{LookupError, MetadataLookup, VersionLookup};
use sync_types::{ContentHash, FileId, PathMetadata, RelPath};
use thiserror::Error;

/// Errors from local file storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No local copy at the given path.
    #[error("no local copy at {0}")]
    NotFound(RelPath),

    /// Delete failed.
    #[error("delete failed for {0}: {1}")]
    DeleteFailed(RelPath, String),
}

/// Read/write access to the version store.
pub trait VersionStore: VersionLookup + MetadataLookup + Send + Sync {
    /// Replace the sharing metadata recorded for `path`.
    fn write_path_metadata(&self, path: &RelPath, meta: PathMetadata) -> Result<(), LookupError>;

    /// Resolve a stable file identifier to its current path.
    fn resolve_path_by_file_id(&self, id: &FileId) -> Result<RelPath, LookupError>;
}

/// The slice of file storage the handlers touch.
pub trait StorageIo: Send + Sync {
    /// Remove the local copy at `path`.
    fn delete(&self, path: &RelPath) -> Result<(), StorageError>;
}

/// In-memory store implementing every store seam.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    versions: HashMap<RelPath, ContentHash>,
    metadata: HashMap<RelPath, PathMetadata>,
    file_ids: HashMap<FileId, RelPath>,
    files: HashSet<RelPath>,
    deleted: Vec<RelPath>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the last known version hash for a path.
    pub fn insert_version(&self, path: impl Into<RelPath>, hash: ContentHash) {
        let mut inner = self.inner.lock().unwrap();
        inner.versions.insert(path.into(), hash);
    }

    /// Record sharing metadata for a path.
    pub fn insert_metadata(&self, path: impl Into<RelPath>, meta: PathMetadata) {
        let mut inner = self.inner.lock().unwrap();
        inner.metadata.insert(path.into(), meta);
    }

    /// Bind a stable file identifier to a path.
    pub fn bind_file_id(&self, id: FileId, path: impl Into<RelPath>) {
        let mut inner = self.inner.lock().unwrap();
        inner.file_ids.insert(id, path.into());
    }

    /// Mark a local copy as present at `path`.
    pub fn insert_file(&self, path: impl Into<RelPath>) {
        let mut inner = self.inner.lock().unwrap();
        inner.files.insert(path.into());
    }

    /// The metadata currently recorded for `path`, if any.
    pub fn metadata(&self, path: &RelPath) -> Option<PathMetadata> {
        let inner = self.inner.lock().unwrap();
        inner.metadata.get(path).cloned()
    }

    /// Whether a local copy is present at `path`.
    pub fn has_file(&self, path: &RelPath) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.files.contains(path)
    }

    /// Every path deleted through [`StorageIo::delete`], in order.
    pub fn deleted_paths(&self) -> Vec<RelPath> {
        let inner = self.inner.lock().unwrap();
        inner.deleted.clone()
    }
}

impl VersionLookup for MemoryStore {
    fn last_version_hash(&self, path: &RelPath) -> Result<ContentHash, LookupError> {
        let inner = self.inner.lock().unwrap();
        inner
            .versions
            .get(path)
            .copied()
            .ok_or_else(|| LookupError::NotFound(path.clone()))
    }
}

impl MetadataLookup for MemoryStore {
    fn path_metadata(&self, path: &RelPath) -> Result<PathMetadata, LookupError> {
        let inner = self.inner.lock().unwrap();
        inner
            .metadata
            .get(path)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(path.clone()))
    }
}

impl VersionStore for MemoryStore {
    fn write_path_metadata(&self, path: &RelPath, meta: PathMetadata) -> Result<(), LookupError> {
        let mut inner = self.inner.lock().unwrap();
        inner.metadata.insert(path.clone(), meta);
        Ok(())
    }

    fn resolve_path_by_file_id(&self, id: &FileId) -> Result<RelPath, LookupError> {
        let inner = self.inner.lock().unwrap();
        inner
            .file_ids
            .get(id)
            .cloned()
            .ok_or_else(|| LookupError::Unavailable(format!("unknown file id {id}")))
    }
}

impl StorageIo for MemoryStore {
    fn delete(&self, path: &RelPath) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.files.remove(path) {
            inner.deleted.push(path.clone());
            Ok(())
        } else {
            Err(StorageError::NotFound(path.clone()))
        }
    }
}
