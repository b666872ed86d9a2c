//! # sync-node
//!
//! Node wiring for driftsync. A [`SyncNode`] owns the exchange dispatcher,
//! the transport and directory seams and the local store, spawns outgoing
//! exchanges, and routes inbound messages: responses to the coordinator
//! registered under their exchange id, requests to the local
//! [`RequestHandler`](sync_exchange::RequestHandler).
//!
//! The [`EventPipeline`] feeds one aggregation window at a time through
//! move inference and hands the result to [`EventListener`]s, which is
//! where downstream synchronization triggers (such as
//! [`SyncNode::offer_file`]) attach.

#![warn(clippy::all)]

mod config;
mod node;
mod pipeline;

pub use config::{ConfigError, DeviceConfig, NodeConfig, SyncSettings};
pub use node::{NodeError, RevokeOutcome, SyncNode};
pub use pipeline::{EventListener, EventPipeline};
