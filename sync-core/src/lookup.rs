//! Collaborator seams into the version store.
//!
//! The store itself is external; this crate only reads through these two
//! traits. Both are synchronous: the callers are pure batch transforms and
//! decision functions, not tasks.

use std::sync::Arc;
use sync_types::{ContentHash, PathMetadata, RelPath};
use thiserror::Error;

/// A failed store lookup.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// The store has no record for the path.
    #[error("no record for {0}")]
    NotFound(RelPath),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the version history.
pub trait VersionLookup {
    /// The hash of the last known version of the file at `path`.
    fn last_version_hash(&self, path: &RelPath) -> Result<ContentHash, LookupError>;
}

/// Read access to per-path sharing metadata.
pub trait MetadataLookup {
    /// The sharing metadata recorded for `path`.
    fn path_metadata(&self, path: &RelPath) -> Result<PathMetadata, LookupError>;
}

impl<V: VersionLookup + ?Sized> VersionLookup for Arc<V> {
    fn last_version_hash(&self, path: &RelPath) -> Result<ContentHash, LookupError> {
        (**self).last_version_hash(path)
    }
}

impl<M: MetadataLookup + ?Sized> MetadataLookup for Arc<M> {
    fn path_metadata(&self, path: &RelPath) -> Result<PathMetadata, LookupError> {
        (**self).path_metadata(path)
    }
}

impl<V: VersionLookup + ?Sized> VersionLookup for &V {
    fn last_version_hash(&self, path: &RelPath) -> Result<ContentHash, LookupError> {
        (**self).last_version_hash(path)
    }
}

impl<M: MetadataLookup + ?Sized> MetadataLookup for &M {
    fn path_metadata(&self, path: &RelPath) -> Result<PathMetadata, LookupError> {
        (**self).path_metadata(path)
    }
}
