//! Response routing for live exchanges.
//!
//! Every active exchange registers its slot here under its identifier
//! before the first request is sent, and deregisters once its result has
//! been consumed, so the table stays bounded. The inbound message path
//! calls [`ExchangeDispatcher::route`] for every received response.

use dashmap::DashMap;
use std::sync::Arc;
use sync_types::{ExchangeId, ExchangeResponse};

use crate::coordinator::{ExchangeError, ExchangeSlot};

/// The process-wide table of live exchanges.
///
/// Injected into both coordinators and the transport's inbound handler;
/// there is no ambient global.
#[derive(Default)]
pub struct ExchangeDispatcher {
    slots: DashMap<ExchangeId, Arc<ExchangeSlot>>,
}

impl ExchangeDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live exchange. Fails if the identifier is already taken.
    pub(crate) fn register(&self, slot: Arc<ExchangeSlot>) -> Result<(), ExchangeError> {
        use dashmap::mapref::entry::Entry;
        match self.slots.entry(slot.exchange_id()) {
            Entry::Occupied(_) => Err(ExchangeError::DuplicateExchange(slot.exchange_id())),
            Entry::Vacant(entry) => {
                entry.insert(slot);
                Ok(())
            }
        }
    }

    /// Remove a finished exchange.
    pub(crate) fn deregister(&self, exchange_id: ExchangeId) {
        self.slots.remove(&exchange_id);
    }

    /// Route an inbound response to its exchange.
    ///
    /// Responses for unknown identifiers are logged and dropped (the
    /// exchange may have finished or been abandoned); a response of the
    /// wrong concrete type for a live exchange is a protocol error.
    pub fn route(&self, response: ExchangeResponse) -> Result<(), ExchangeError> {
        match self.slots.get(&response.exchange_id) {
            Some(slot) => slot.add_response(response),
            None => {
                tracing::warn!(
                    exchange = %response.exchange_id,
                    sender = %response.sender,
                    "dropping response for unknown exchange"
                );
                Ok(())
            }
        }
    }

    /// How many exchanges are currently live.
    pub fn active_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::{
        DeviceId, ExchangeResponse, FileOfferResponse, PeerDevice, ResponsePayload, StatusCode,
    };

    fn response(exchange_id: ExchangeId) -> ExchangeResponse {
        ExchangeResponse {
            exchange_id,
            sender: PeerDevice::new("alice", DeviceId::random(), "addr-b"),
            status: StatusCode::Accepted,
            receiver: "addr-a".into(),
            payload: ResponsePayload::FileOffer(FileOfferResponse {
                has_conflict: false,
            }),
        }
    }

    #[test]
    fn unroutable_response_is_dropped_not_fatal() {
        let dispatcher = ExchangeDispatcher::new();
        dispatcher.route(response(ExchangeId::new())).unwrap();
        assert_eq!(dispatcher.active_count(), 0);
    }
}
