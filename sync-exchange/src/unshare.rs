//! The unshare and unshared exchanges.
//!
//! Revoking a share is two sequential protocols. Unshare goes to exactly
//! one receiver, the formerly sharing peer's device, which resets the
//! path's sharing metadata and drops its copy. Unshared then tells every
//! one of the initiator's own devices to forget the sharer entry. The
//! order matters: the sharer record must outlive the remote reset, or a
//! delete propagated from the sharer's side could pass as the owner's.

use std::sync::Arc;
use sync_types::{
    DeviceId, ExchangeId, ExchangeRequest, FileId, PayloadKind, PeerDevice, RelPath,
    RequestPayload, ResponsePayload, StatusCode, UnshareRequest, UnsharedRequest,
};

use crate::coordinator::{
    ExchangeCoordinator, ExchangeError, ExchangePolicy, ExchangeScope, ExchangeState,
};
use crate::dispatch::ExchangeDispatcher;
use crate::transport::{PeerDirectory, Transport};

/// The single receiver's answer to an unshare.
#[derive(Debug, Clone)]
pub struct UnshareOutcome {
    /// The exchange that produced this result.
    pub exchange_id: ExchangeId,
    /// Whether the receiver applied the revocation.
    pub accepted: bool,
    /// The receiver's status code (None if it never answered with one).
    pub status: StatusCode,
}

/// Aggregation for the single-receiver unshare.
pub struct UnsharePolicy;

impl ExchangePolicy for UnsharePolicy {
    type Output = UnshareOutcome;

    fn response_kind(&self) -> PayloadKind {
        PayloadKind::Unshare
    }

    fn compute(&self, state: &ExchangeState) -> Result<UnshareOutcome, ExchangeError> {
        // Exactly one receiver; its status is the outcome.
        let status = state
            .responses()
            .next()
            .map(|r| r.status)
            .unwrap_or(StatusCode::None);
        Ok(UnshareOutcome {
            exchange_id: state.exchange_id(),
            accepted: status == StatusCode::Accepted,
            status,
        })
    }
}

/// The broadcast answer to an unshared.
#[derive(Debug, Clone)]
pub struct UnsharedOutcome {
    /// The exchange that produced this result.
    pub exchange_id: ExchangeId,
    /// Devices that removed the sharer entry.
    pub accepted_by: Vec<DeviceId>,
    /// Devices that declined.
    pub declined_by: Vec<DeviceId>,
}

impl UnsharedOutcome {
    /// Whether every device removed the entry.
    pub fn unanimous(&self) -> bool {
        self.declined_by.is_empty()
    }
}

/// Aggregation for the own-devices unshared broadcast.
pub struct UnsharedPolicy;

impl ExchangePolicy for UnsharedPolicy {
    type Output = UnsharedOutcome;

    fn response_kind(&self) -> PayloadKind {
        PayloadKind::Unshared
    }

    fn compute(&self, state: &ExchangeState) -> Result<UnsharedOutcome, ExchangeError> {
        let mut accepted_by = Vec::new();
        let mut declined_by = Vec::new();
        for response in state.responses() {
            let accepted = matches!(
                &response.payload,
                ResponsePayload::Unshared(u) if u.accepted
            );
            if accepted {
                accepted_by.push(response.sender.device_id);
            } else {
                declined_by.push(response.sender.device_id);
            }
        }
        Ok(UnsharedOutcome {
            exchange_id: state.exchange_id(),
            accepted_by,
            declined_by,
        })
    }
}

/// Build the coordinator telling `receiver` to drop its shared copy of
/// the file identified by `file_id`. Completes on that one response.
pub fn unshare_file(
    local: PeerDevice,
    directory: Arc<dyn PeerDirectory>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<ExchangeDispatcher>,
    receiver: PeerDevice,
    file_id: FileId,
) -> Result<ExchangeCoordinator<UnsharePolicy>, ExchangeError> {
    let request = ExchangeRequest::new(
        local.clone(),
        RequestPayload::Unshare(UnshareRequest { file_id }),
    );
    ExchangeCoordinator::new(
        local,
        directory,
        transport,
        dispatcher,
        ExchangeScope::Devices(vec![receiver]),
        request,
        UnsharePolicy,
    )
}

/// Build the coordinator telling the local user's other devices to drop
/// `sharer` from `path`'s sharer set. Completes once all of them answer.
pub fn unshared_broadcast(
    local: PeerDevice,
    directory: Arc<dyn PeerDirectory>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<ExchangeDispatcher>,
    path: RelPath,
    sharer: String,
) -> Result<ExchangeCoordinator<UnsharedPolicy>, ExchangeError> {
    let request = ExchangeRequest::new(
        local.clone(),
        RequestPayload::Unshared(UnsharedRequest { path, sharer }),
    );
    ExchangeCoordinator::new(
        local,
        directory,
        transport,
        dispatcher,
        ExchangeScope::OwnDevices,
        request,
        UnsharedPolicy,
    )
}
