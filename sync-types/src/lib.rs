//! # sync-types
//!
//! Wire format types for the driftsync peer-to-peer folder sync protocol.
//!
//! This crate provides the foundational types used across all driftsync
//! crates:
//! - [`DeviceId`], [`ExchangeId`], [`FileId`] - Identity types
//! - [`SemanticEvent`], [`ContentHash`], [`EventTime`] - Change events
//! - [`PeerDevice`], [`PeerAddr`] - Peer addressing
//! - [`ExchangeRequest`], [`ExchangeResponse`], [`PeerMessage`] - Protocol messages
//! - [`PathMetadata`], [`Sharer`], [`AccessType`] - Sharing metadata
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod event;
mod ids;
mod messages;
mod peer;
mod sharing;

pub use error::SyncError;
pub use event::{ContentHash, EventTime, FileChange, FileMove, RelPath, SemanticEvent};
pub use ids::{DeviceId, ExchangeId, FileId};
pub use messages::{
    ExchangeRequest, ExchangeResponse, FileOfferRequest, FileOfferResponse, PayloadKind,
    PeerMessage, RequestPayload, ResponsePayload, StatusCode, UnshareRequest, UnshareResponse,
    UnsharedRequest, UnsharedResponse,
};
pub use peer::{PeerAddr, PeerDevice};
pub use sharing::{AccessType, PathMetadata, Sharer};
