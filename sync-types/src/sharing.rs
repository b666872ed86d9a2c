//! Sharing metadata for synced paths.
//!
//! Owned by the version store; this crate only defines the shapes. The
//! access decision over them lives in sync-core.

use serde::{Deserialize, Serialize};

/// The level of access a sharer holds on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// May read the shared content.
    Read,
    /// May read and write the shared content.
    Write,
    /// Terminal revocation marker. Not a grade of access: a former sharer
    /// whose access was removed.
    AccessRemoved,
}

impl AccessType {
    /// Subsumption rank used by the access check: a grant of higher rank
    /// satisfies a check for any lower rank. Any live grant outranks the
    /// revocation marker.
    pub fn rank(&self) -> u8 {
        match self {
            AccessType::AccessRemoved => 0,
            AccessType::Read => 1,
            AccessType::Write => 2,
        }
    }
}

/// A non-owner user granted some access on a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sharer {
    /// The sharer's username.
    pub username: String,
    /// The currently recorded access type.
    pub access: AccessType,
    /// History of access-type changes, oldest first.
    pub history: Vec<AccessType>,
}

impl Sharer {
    /// Create a new sharer with the given access, starting its history.
    pub fn new(username: &str, access: AccessType) -> Self {
        Self {
            username: username.to_string(),
            access,
            history: vec![access],
        }
    }

    /// Record an access change, keeping the history.
    pub fn set_access(&mut self, access: AccessType) {
        self.access = access;
        self.history.push(access);
    }
}

/// Sharing metadata for one synced path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PathMetadata {
    /// The owning user, if the path is owned locally or by a known peer.
    pub owner: Option<String>,
    /// Whether the path is currently shared.
    pub shared: bool,
    /// The access type under which this device holds the path, when it is
    /// a received share.
    pub access: Option<AccessType>,
    /// Users this path is shared with.
    pub sharers: Vec<Sharer>,
}

impl PathMetadata {
    /// Metadata for a locally owned, unshared path.
    pub fn owned_by(owner: &str) -> Self {
        Self {
            owner: Some(owner.to_string()),
            ..Self::default()
        }
    }

    /// Fully cleared metadata: no owner, not shared, no access, no sharers.
    ///
    /// Written when a share is revoked on the receiving side, so a later
    /// local delete is not attributed to the former owner.
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Find a sharer entry by username.
    pub fn sharer(&self, username: &str) -> Option<&Sharer> {
        self.sharers.iter().find(|s| s.username == username)
    }

    /// Remove a sharer entry by username. Returns true if one was removed.
    pub fn remove_sharer(&mut self, username: &str) -> bool {
        let before = self.sharers.len();
        self.sharers.retain(|s| s.username != username);
        self.sharers.len() < before
    }
}
