//! # sync-exchange
//!
//! The multi-peer exchange protocol engine for driftsync.
//!
//! An exchange is one run of a request/broadcast/collect protocol: the
//! initiator sends an [`ExchangeRequest`](sync_types::ExchangeRequest) to a
//! set of peer devices, collects one response per device, and computes a
//! typed result once every notified device has answered.
//!
//! - [`ExchangeCoordinator`] - the generic engine, one instance per run
//! - [`ExchangePolicy`] - the strategy that types a concrete exchange
//! - [`ExchangeDispatcher`] - routes inbound responses to live coordinators
//! - [`offer_file`], [`unshare_file`], [`unshared_broadcast`] - the three
//!   concrete exchanges
//! - [`RequestHandler`] - the symmetric receiving side
//! - [`Transport`], [`PeerDirectory`], [`VersionStore`], [`StorageIo`] -
//!   seams to the outside world, with in-memory implementations for tests

#![warn(clippy::all)]

mod coordinator;
mod dispatch;
mod handler;
mod offer;
mod store;
mod transport;
mod unshare;

pub use coordinator::{
    ExchangeCoordinator, ExchangeError, ExchangePolicy, ExchangeScope, ExchangeState,
};
pub use dispatch::ExchangeDispatcher;
pub use handler::RequestHandler;
pub use offer::{offer_file, OfferConsensus, OfferPolicy};
pub use store::{MemoryStore, StorageError, StorageIo, VersionStore};
pub use transport::{
    DirectoryError, MemoryDirectory, MemoryTransport, PeerDirectory, Transport, TransportError,
};
pub use unshare::{
    unshare_file, unshared_broadcast, UnshareOutcome, UnsharePolicy, UnsharedOutcome,
    UnsharedPolicy,
};
