//! Exchange protocol messages.
//!
//! One exchange is a request broadcast to a set of peer devices, followed
//! by one response per device, all carrying the initiator's [`ExchangeId`].
//! Payloads are tagged unions; [`PayloadKind`] is the explicit message-kind
//! tag used for handler dispatch and response type checks.

use serde::{Deserialize, Serialize};

use crate::{ExchangeId, FileId, PeerAddr, PeerDevice, RelPath, SemanticEvent, SyncError};

/// Outcome code carried on requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StatusCode {
    /// No outcome yet (requests are sent with this).
    #[default]
    None,
    /// The receiver applied the requested effect.
    Accepted,
    /// The sender does not hold the required access.
    AccessDenied,
    /// The receiver declined or failed to apply the effect.
    Denied,
    /// The local copy failed an integrity check.
    FileCorrupt,
    /// The referenced file is not present locally.
    FileMissing,
}

/// Message-kind tag for exchange payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    /// File-offer exchange.
    FileOffer,
    /// Unshare exchange (revocation, sharer side).
    Unshare,
    /// Unshared exchange (revocation, owner's own devices).
    Unshared,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadKind::FileOffer => write!(f, "file-offer"),
            PayloadKind::Unshare => write!(f, "unshare"),
            PayloadKind::Unshared => write!(f, "unshared"),
        }
    }
}

/// Payload of a file-offer request: the triggering change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOfferRequest {
    /// The semantic event being offered, content hash included.
    pub event: SemanticEvent,
}

/// Payload of an unshare request, addressed to the formerly sharing peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnshareRequest {
    /// Stable identifier of the shared file. Paths can change; this cannot.
    pub file_id: FileId,
}

/// Payload of an unshared request, broadcast to the initiator's own devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsharedRequest {
    /// The shared path whose sharer entry should be dropped.
    pub path: RelPath,
    /// The username being removed from the sharer set.
    pub sharer: String,
}

/// Protocol-specific request payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestPayload {
    /// Offer a local change to the user's other devices.
    FileOffer(FileOfferRequest),
    /// Tell the formerly sharing peer to drop its copy.
    Unshare(UnshareRequest),
    /// Tell the initiator's own devices to drop the sharer entry.
    Unshared(UnsharedRequest),
}

impl RequestPayload {
    /// The message-kind tag of this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            RequestPayload::FileOffer(_) => PayloadKind::FileOffer,
            RequestPayload::Unshare(_) => PayloadKind::Unshare,
            RequestPayload::Unshared(_) => PayloadKind::Unshared,
        }
    }
}

/// Response to a file offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOfferResponse {
    /// Whether the responding device holds a conflicting version of the
    /// offered path.
    pub has_conflict: bool,
}

/// Response to an unshare request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnshareResponse {}

/// Response to an unshared request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsharedResponse {
    /// Whether the sharer entry was removed.
    pub accepted: bool,
}

/// Protocol-specific response payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsePayload {
    /// Answer to a file offer.
    FileOffer(FileOfferResponse),
    /// Answer to an unshare request.
    Unshare(UnshareResponse),
    /// Answer to an unshared request.
    Unshared(UnsharedResponse),
}

impl ResponsePayload {
    /// The message-kind tag of this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            ResponsePayload::FileOffer(_) => PayloadKind::FileOffer,
            ResponsePayload::Unshare(_) => PayloadKind::Unshare,
            ResponsePayload::Unshared(_) => PayloadKind::Unshared,
        }
    }
}

/// The initial message of one exchange, sent to every receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// Identifier of the protocol run this request belongs to.
    pub exchange_id: ExchangeId,
    /// The initiating device.
    pub sender: PeerDevice,
    /// Outcome code (None on requests).
    pub status: StatusCode,
    /// Addresses of every device this request was broadcast to.
    pub receivers: Vec<PeerAddr>,
    /// Protocol-specific payload.
    pub payload: RequestPayload,
}

impl ExchangeRequest {
    /// Create a request for a fresh exchange. The receiver list is filled
    /// once the peer locations have been resolved.
    pub fn new(sender: PeerDevice, payload: RequestPayload) -> Self {
        Self {
            exchange_id: ExchangeId::new(),
            sender,
            status: StatusCode::None,
            receivers: Vec::new(),
            payload,
        }
    }
}

/// One device's answer to an [`ExchangeRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    /// Identifier of the protocol run this response belongs to.
    pub exchange_id: ExchangeId,
    /// The responding device.
    pub sender: PeerDevice,
    /// Outcome code.
    pub status: StatusCode,
    /// Address the response is sent to (the initiator).
    pub receiver: PeerAddr,
    /// Protocol-specific payload.
    pub payload: ResponsePayload,
}

impl ExchangeResponse {
    /// Build the answer to a request, addressed back to its sender.
    pub fn reply_to(
        request: &ExchangeRequest,
        sender: PeerDevice,
        status: StatusCode,
        payload: ResponsePayload,
    ) -> Self {
        Self {
            exchange_id: request.exchange_id,
            sender,
            status,
            receiver: request.sender.addr.clone(),
            payload,
        }
    }
}

/// The wire envelope: everything that travels between devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// An exchange request.
    Request(ExchangeRequest),
    /// An exchange response.
    Response(ExchangeResponse),
}

impl PeerMessage {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        rmp_serde::to_vec(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        rmp_serde::from_slice(bytes).map_err(SyncError::Deserialization)
    }
}
