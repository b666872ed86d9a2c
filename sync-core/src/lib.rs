//! # sync-core
//!
//! Pure coordination logic for driftsync: move inference over semantic
//! change events and the sharing access decision.
//!
//! Nothing in this crate performs I/O or suspends. The version store is
//! reached through the [`VersionLookup`] and [`MetadataLookup`] seams, so
//! everything here unit-tests instantly against in-memory doubles.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod access;
mod aggregate;
mod lookup;

pub use access::{grants, AccessManager};
pub use aggregate::MoveAggregator;
pub use lookup::{LookupError, MetadataLookup, VersionLookup};
