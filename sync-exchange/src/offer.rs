//! The file-offer exchange.
//!
//! Before a local change is accepted, it is offered to every other device
//! of the same user; each answers whether it already holds a conflicting
//! version of the path. Consensus is agreement: one dissenting device
//! marks the whole offer conflicted. What to do with a conflict (conflict
//! file synthesis, content exchange) is the caller's concern.

use std::sync::Arc;
use sync_types::{
    DeviceId, ExchangeId, ExchangeRequest, FileOfferRequest, PayloadKind, PeerDevice,
    RequestPayload, ResponsePayload, SemanticEvent,
};

use crate::coordinator::{
    ExchangeCoordinator, ExchangeError, ExchangePolicy, ExchangeScope, ExchangeState,
};
use crate::dispatch::ExchangeDispatcher;
use crate::transport::{PeerDirectory, Transport};

/// The aggregated answer to a file offer.
#[derive(Debug, Clone)]
pub struct OfferConsensus {
    /// The exchange that produced this result.
    pub exchange_id: ExchangeId,
    /// True iff no responding device reported a conflict.
    pub in_agreement: bool,
    /// The devices that disagreed.
    pub conflicting: Vec<DeviceId>,
}

/// Consensus aggregation for file offers.
pub struct OfferPolicy;

impl ExchangePolicy for OfferPolicy {
    type Output = OfferConsensus;

    fn response_kind(&self) -> PayloadKind {
        PayloadKind::FileOffer
    }

    fn compute(&self, state: &ExchangeState) -> Result<OfferConsensus, ExchangeError> {
        let conflicting: Vec<DeviceId> = state
            .responses()
            .filter(|r| matches!(&r.payload, ResponsePayload::FileOffer(o) if o.has_conflict))
            .map(|r| r.sender.device_id)
            .collect();
        Ok(OfferConsensus {
            exchange_id: state.exchange_id(),
            in_agreement: conflicting.is_empty(),
            conflicting,
        })
    }
}

/// Build the coordinator offering `event` to the local user's other
/// devices. Spawn or run it to execute the exchange.
pub fn offer_file(
    local: PeerDevice,
    directory: Arc<dyn PeerDirectory>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<ExchangeDispatcher>,
    event: SemanticEvent,
) -> Result<ExchangeCoordinator<OfferPolicy>, ExchangeError> {
    let request = ExchangeRequest::new(
        local.clone(),
        RequestPayload::FileOffer(FileOfferRequest { event }),
    );
    ExchangeCoordinator::new(
        local,
        directory,
        transport,
        dispatcher,
        ExchangeScope::OwnDevices,
        request,
        OfferPolicy,
    )
}
