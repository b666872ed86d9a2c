//! Transport and peer-directory seams.
//!
//! The real network (address resolution, discovery, delivery) is an
//! external collaborator; the engine only needs these two traits. The
//! in-memory implementations are used by every test in the workspace and
//! double as a loopback network for multi-node integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sync_types::{PeerAddr, PeerDevice, PeerMessage};
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No route to the given address.
    #[error("unreachable address: {0}")]
    Unreachable(PeerAddr),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The user is not known to the directory.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// Resolution failed.
    #[error("resolving devices of {username} failed: {reason}")]
    ResolveFailed {
        /// The user being resolved.
        username: String,
        /// Why resolution failed.
        reason: String,
    },
}

/// Delivers protocol messages to peer addresses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message directly to one address.
    async fn send(&self, addr: &PeerAddr, message: PeerMessage) -> Result<(), TransportError>;
}

/// Resolves a username to the user's current device locations.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Every device the user is currently running, with addresses.
    async fn resolve_devices(&self, username: &str) -> Result<Vec<PeerDevice>, DirectoryError>;
}

/// In-memory transport.
///
/// Records every sent message and, when a mailbox is registered for the
/// target address, forwards the message into it. Clones share state, so a
/// single instance can serve as the network for many test nodes.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryTransportInner>>,
}

#[derive(Debug, Default)]
struct MemoryTransportInner {
    sent: Vec<(PeerAddr, PeerMessage)>,
    mailboxes: HashMap<PeerAddr, mpsc::UnboundedSender<PeerMessage>>,
    fail_next_send: Option<String>,
}

impl MemoryTransport {
    /// Create a new in-memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mailbox for an address and get its receiving end.
    ///
    /// Messages sent to the address from now on are forwarded into the
    /// returned receiver (and still recorded).
    pub fn register_mailbox(&self, addr: &PeerAddr) -> mpsc::UnboundedReceiver<PeerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        inner.mailboxes.insert(addr.clone(), tx);
        rx
    }

    /// All messages sent so far, with their target addresses.
    pub fn sent_messages(&self) -> Vec<(PeerAddr, PeerMessage)> {
        let inner = self.inner.lock().unwrap();
        inner.sent.clone()
    }

    /// The most recently sent message, if any.
    pub fn last_sent(&self) -> Option<(PeerAddr, PeerMessage)> {
        let inner = self.inner.lock().unwrap();
        inner.sent.last().cloned()
    }

    /// Cause the next `send()` to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }
}

impl Clone for MemoryTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, addr: &PeerAddr, message: PeerMessage) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent.push((addr.clone(), message.clone()));
        let delivery_failed = match inner.mailboxes.get(addr) {
            Some(mailbox) => mailbox.send(message).is_err(),
            None => false,
        };
        if delivery_failed {
            // A closed mailbox is a disconnected peer.
            inner.mailboxes.remove(addr);
            return Err(TransportError::Unreachable(addr.clone()));
        }
        Ok(())
    }
}

/// In-memory peer directory backed by a map.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    devices: Mutex<HashMap<String, Vec<PeerDevice>>>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device under its user.
    pub fn add_device(&self, device: PeerDevice) {
        let mut devices = self.devices.lock().unwrap();
        devices
            .entry(device.username.clone())
            .or_default()
            .push(device);
    }
}

#[async_trait]
impl PeerDirectory for MemoryDirectory {
    async fn resolve_devices(&self, username: &str) -> Result<Vec<PeerDevice>, DirectoryError> {
        let devices = self.devices.lock().unwrap();
        devices
            .get(username)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownUser(username.to_string()))
    }
}
