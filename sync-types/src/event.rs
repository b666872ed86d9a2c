//! Semantic change events.
//!
//! A [`SemanticEvent`] is a Create/Modify/Delete/Move record describing a
//! meaningful filesystem change, as opposed to the raw OS notifications the
//! watcher pipeline produces. Events are totally ordered by [`EventTime`];
//! ties are broken by arrival order (stable sorts everywhere).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A content hash identifying file data independent of its name.
///
/// 32 bytes, displayed as URL-safe base64.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash the given bytes with SHA-256.
    pub fn of(data: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        Self(bytes)
    }

    /// Create a ContentHash from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() == 32 {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(bytes);
            Some(Self(arr))
        } else {
            None
        }
    }

    /// Get the raw bytes of this ContentHash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_string()[..8])
    }
}

/// An event timestamp in milliseconds since the Unix epoch.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default, Debug,
)]
pub struct EventTime(u64);

impl EventTime {
    /// Create an EventTime with the given millisecond value.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the millisecond value.
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A path relative to the synced folder root.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelPath(String);

impl RelPath {
    /// Create a RelPath from a string.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelPath({})", self.0)
    }
}

impl From<&str> for RelPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Fields shared by Create, Modify and Delete events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the synced folder root.
    pub path: RelPath,
    /// Display name of the file.
    pub name: String,
    /// Content hash. Absent only for Delete events that have not yet been
    /// enriched from the version history.
    pub hash: Option<ContentHash>,
    /// When the change was observed.
    pub timestamp: EventTime,
}

/// A move/rename derived from a matching delete+create pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMove {
    /// Source path (where the file used to be).
    pub path: RelPath,
    /// Destination path (where the file is now).
    pub dest: RelPath,
    /// Display name at the destination.
    pub name: String,
    /// Content hash linking the two sides of the move.
    pub hash: ContentHash,
    /// Timestamp of the creating half of the pair.
    pub timestamp: EventTime,
}

/// A semantically meaningful filesystem change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SemanticEvent {
    /// A file appeared.
    Create(FileChange),
    /// A file's content changed.
    Modify(FileChange),
    /// A file disappeared.
    Delete(FileChange),
    /// A file moved from one path to another.
    Move(FileMove),
}

impl SemanticEvent {
    /// Create a Create event.
    pub fn create(path: impl Into<RelPath>, name: &str, hash: ContentHash, at: EventTime) -> Self {
        Self::Create(FileChange {
            path: path.into(),
            name: name.to_string(),
            hash: Some(hash),
            timestamp: at,
        })
    }

    /// Create a Modify event.
    pub fn modify(path: impl Into<RelPath>, name: &str, hash: ContentHash, at: EventTime) -> Self {
        Self::Modify(FileChange {
            path: path.into(),
            name: name.to_string(),
            hash: Some(hash),
            timestamp: at,
        })
    }

    /// Create a Delete event. The hash may be absent until the event is
    /// enriched from the version history.
    pub fn delete(
        path: impl Into<RelPath>,
        name: &str,
        hash: Option<ContentHash>,
        at: EventTime,
    ) -> Self {
        Self::Delete(FileChange {
            path: path.into(),
            name: name.to_string(),
            hash,
            timestamp: at,
        })
    }

    /// The path this event applies to (the source path for moves).
    pub fn path(&self) -> &RelPath {
        match self {
            Self::Create(c) | Self::Modify(c) | Self::Delete(c) => &c.path,
            Self::Move(m) => &m.path,
        }
    }

    /// The display name carried by this event.
    pub fn name(&self) -> &str {
        match self {
            Self::Create(c) | Self::Modify(c) | Self::Delete(c) => &c.name,
            Self::Move(m) => &m.name,
        }
    }

    /// The content hash, if known.
    pub fn hash(&self) -> Option<ContentHash> {
        match self {
            Self::Create(c) | Self::Modify(c) | Self::Delete(c) => c.hash,
            Self::Move(m) => Some(m.hash),
        }
    }

    /// When the event was observed.
    pub fn timestamp(&self) -> EventTime {
        match self {
            Self::Create(c) | Self::Modify(c) | Self::Delete(c) => c.timestamp,
            Self::Move(m) => m.timestamp,
        }
    }

    /// Whether this is a Delete event.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }

    /// Whether this is a Create event.
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }
}
