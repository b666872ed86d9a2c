//! Peer addressing types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DeviceId;

/// A transport address for one device.
///
/// Opaque to this layer; the transport decides what it means (a node id,
/// a host:port pair, an in-memory mailbox name in tests).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddr(String);

impl PeerAddr {
    /// Create a PeerAddr from a string.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerAddr({})", self.0)
    }
}

impl From<&str> for PeerAddr {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One physical client instance of a user.
///
/// A user may own many devices; each is identified by its [`DeviceId`] and
/// reachable at its current [`PeerAddr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerDevice {
    /// The owning user.
    pub username: String,
    /// Unique device identifier.
    pub device_id: DeviceId,
    /// Current transport address.
    pub addr: PeerAddr,
}

impl PeerDevice {
    /// Create a new PeerDevice.
    pub fn new(username: &str, device_id: DeviceId, addr: impl Into<PeerAddr>) -> Self {
        Self {
            username: username.to_string(),
            device_id,
            addr: addr.into(),
        }
    }
}

impl fmt::Display for PeerDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.addr)
    }
}
