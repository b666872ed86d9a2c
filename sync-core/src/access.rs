//! The sharing access decision.
//!
//! Decides whether a username holds at least a given access level on a
//! path, from the owner and sharer set recorded in the path's metadata.

use sync_types::{AccessType, PathMetadata, RelPath};

use crate::lookup::{LookupError, MetadataLookup};

/// Access decisions over path metadata read through a [`MetadataLookup`].
pub struct AccessManager<M> {
    metadata: M,
}

impl<M: MetadataLookup> AccessManager<M> {
    /// Create an access manager reading metadata from `metadata`.
    pub fn new(metadata: M) -> Self {
        Self { metadata }
    }

    /// Whether `username` holds at least `level` on `path`.
    ///
    /// Missing metadata is a lookup failure, not a denial.
    pub fn has_access(
        &self,
        username: &str,
        level: AccessType,
        path: &RelPath,
    ) -> Result<bool, LookupError> {
        let meta = self.metadata.path_metadata(path)?;
        Ok(grants(&meta, username, level))
    }
}

/// The pure decision over already-loaded metadata.
///
/// The owner holds every level except the revocation marker. A sharer
/// passes when its recorded type equals the requested one or outranks it
/// (see [`AccessType::rank`]: any live grant outranks AccessRemoved, so a
/// Write grant satisfies Read, Write and AccessRemoved-level checks).
pub fn grants(meta: &PathMetadata, username: &str, level: AccessType) -> bool {
    if meta.owner.as_deref() == Some(username) {
        return level != AccessType::AccessRemoved;
    }

    meta.sharers
        .iter()
        .any(|s| s.username == username && (s.access == level || s.access.rank() >= level.rank()))
}
