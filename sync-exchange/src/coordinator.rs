//! The generic exchange coordinator.
//!
//! One [`ExchangeCoordinator`] runs one protocol instance: it resolves the
//! receiver set, broadcasts the initial request, collects one response per
//! notified device, and computes a typed result through its
//! [`ExchangePolicy`]. Inbound responses reach the coordinator through the
//! [`ExchangeDispatcher`](crate::ExchangeDispatcher), keyed by exchange id.
//!
//! The wait primitive is a [`tokio::sync::Notify`] permit over a
//! lock-protected state: the run becomes ready exactly when every notified
//! device has responded, without polling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sync_types::{
    DeviceId, ExchangeId, ExchangeRequest, ExchangeResponse, PayloadKind, PeerDevice, PeerMessage,
};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::dispatch::ExchangeDispatcher;
use crate::transport::{DirectoryError, PeerDirectory, Transport};

/// Errors from running an exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Resolving the receiver set failed; the run was aborted.
    #[error("resolving peer locations failed: {0}")]
    Resolve(#[from] DirectoryError),

    /// A response of the wrong concrete type was delivered to this
    /// exchange. A protocol bug, surfaced immediately and never retried.
    #[error("exchange {exchange_id} expected a {expected} response, got {actual}")]
    TypeMismatch {
        /// The exchange the response was routed to.
        exchange_id: ExchangeId,
        /// The response kind the exchange expects.
        expected: PayloadKind,
        /// The kind that was delivered.
        actual: PayloadKind,
    },

    /// An exchange with this identifier is already active.
    #[error("exchange {0} is already registered")]
    DuplicateExchange(ExchangeId),

    /// The run was abandoned before every notified device responded.
    #[error("exchange {exchange_id} incomplete: {} responded, {} silent", .responded.len(), .missing.len())]
    Partial {
        /// The abandoned exchange.
        exchange_id: ExchangeId,
        /// Responses collected before the deadline.
        responded: Vec<ExchangeResponse>,
        /// Devices that never answered.
        missing: Vec<PeerDevice>,
    },

    /// The task running the exchange failed.
    #[error("exchange task failed: {0}")]
    TaskFailed(String),
}

/// Which devices an exchange is addressed to.
#[derive(Debug, Clone)]
pub enum ExchangeScope {
    /// Every current device of the local user except the local one.
    OwnDevices,
    /// An explicit receiver set.
    Devices(Vec<PeerDevice>),
}

/// The collect state of one exchange.
///
/// `responded` keys are always a subset of the notified set; the exchange
/// is complete iff every notified device has a recorded response. The
/// notified set is fixed once the initial broadcast finishes.
#[derive(Debug, Clone)]
pub struct ExchangeState {
    exchange_id: ExchangeId,
    notified: Vec<PeerDevice>,
    responded: HashMap<DeviceId, ExchangeResponse>,
}

impl ExchangeState {
    fn new(exchange_id: ExchangeId) -> Self {
        Self {
            exchange_id,
            notified: Vec::new(),
            responded: HashMap::new(),
        }
    }

    /// The exchange this state belongs to.
    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }

    /// The devices the initial request was sent to.
    pub fn notified(&self) -> &[PeerDevice] {
        &self.notified
    }

    /// The recorded responses, one per responding device.
    pub fn responses(&self) -> impl Iterator<Item = &ExchangeResponse> {
        self.responded.values()
    }

    /// Notified devices that have not responded yet.
    pub fn missing(&self) -> Vec<PeerDevice> {
        self.notified
            .iter()
            .filter(|d| !self.responded.contains_key(&d.device_id))
            .cloned()
            .collect()
    }

    /// Whether every notified device has responded.
    pub fn is_complete(&self) -> bool {
        self.notified
            .iter()
            .all(|d| self.responded.contains_key(&d.device_id))
    }

    fn mark_notified(&mut self, device: PeerDevice) {
        if !self.notified.iter().any(|d| d.device_id == device.device_id) {
            self.notified.push(device);
        }
    }

    /// Record a response. Returns false when the sender was never
    /// notified (the response must be dropped to keep the subset
    /// invariant). Duplicate senders overwrite: last write wins, the
    /// completion count is unaffected.
    fn record(&mut self, response: ExchangeResponse) -> bool {
        let sender = response.sender.device_id;
        if !self.notified.iter().any(|d| d.device_id == sender) {
            return false;
        }
        self.responded.insert(sender, response);
        true
    }
}

/// Shared slot between a running coordinator and the inbound dispatcher.
pub(crate) struct ExchangeSlot {
    exchange_id: ExchangeId,
    expected: PayloadKind,
    state: Mutex<ExchangeState>,
    ready: Notify,
}

impl ExchangeSlot {
    fn new(exchange_id: ExchangeId, expected: PayloadKind) -> Self {
        Self {
            exchange_id,
            expected,
            state: Mutex::new(ExchangeState::new(exchange_id)),
            ready: Notify::new(),
        }
    }

    pub(crate) fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }

    /// Record an inbound response. Safe to call concurrently with the
    /// waiting run.
    pub(crate) fn add_response(&self, response: ExchangeResponse) -> Result<(), ExchangeError> {
        let actual = response.payload.kind();
        if actual != self.expected {
            return Err(ExchangeError::TypeMismatch {
                exchange_id: self.exchange_id,
                expected: self.expected,
                actual,
            });
        }

        let mut state = self.state.lock().unwrap();
        if !state.record(response) {
            tracing::warn!(
                exchange = %self.exchange_id,
                "dropping response from a device that was never notified"
            );
            return Ok(());
        }
        if state.is_complete() {
            // notify_one stores a permit, so completion between the
            // waiter's check and its await is not lost.
            self.ready.notify_one();
        }
        Ok(())
    }

    fn mark_notified(&self, device: PeerDevice) {
        let mut state = self.state.lock().unwrap();
        state.mark_notified(device);
    }

    fn snapshot(&self) -> ExchangeState {
        self.state.lock().unwrap().clone()
    }

    async fn wait_complete(&self) {
        loop {
            if self.state.lock().unwrap().is_complete() {
                return;
            }
            self.ready.notified().await;
        }
    }
}

/// The result computation of a concrete exchange.
///
/// A policy types one protocol variant: which response kind it accepts and
/// how the collected responses aggregate into a result.
pub trait ExchangePolicy: Send + Sync + 'static {
    /// The aggregated result type.
    type Output: Send + 'static;

    /// The response kind this exchange accepts.
    fn response_kind(&self) -> PayloadKind;

    /// Aggregate a complete (or abandoned-and-partial) state into a result.
    fn compute(&self, state: &ExchangeState) -> Result<Self::Output, ExchangeError>;
}

/// One run of a request/broadcast/collect protocol.
///
/// Constructing the coordinator registers it in the dispatcher, so
/// responses can be routed from the moment the first request leaves.
/// Every run path deregisters before returning; construct-then-run is the
/// intended use, a coordinator should not be built and abandoned.
pub struct ExchangeCoordinator<P: ExchangePolicy> {
    local: PeerDevice,
    directory: Arc<dyn PeerDirectory>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<ExchangeDispatcher>,
    scope: ExchangeScope,
    request: ExchangeRequest,
    policy: P,
    slot: Arc<ExchangeSlot>,
}

impl<P: ExchangePolicy> ExchangeCoordinator<P> {
    /// Create and register a coordinator for `request`.
    pub fn new(
        local: PeerDevice,
        directory: Arc<dyn PeerDirectory>,
        transport: Arc<dyn Transport>,
        dispatcher: Arc<ExchangeDispatcher>,
        scope: ExchangeScope,
        request: ExchangeRequest,
        policy: P,
    ) -> Result<Self, ExchangeError> {
        let slot = Arc::new(ExchangeSlot::new(
            request.exchange_id,
            policy.response_kind(),
        ));
        dispatcher.register(Arc::clone(&slot))?;
        Ok(Self {
            local,
            directory,
            transport,
            dispatcher,
            scope,
            request,
            policy,
            slot,
        })
    }

    /// The identifier of this run.
    pub fn exchange_id(&self) -> ExchangeId {
        self.request.exchange_id
    }

    /// Run on a dedicated task and wait without bound.
    pub fn spawn(self) -> JoinHandle<Result<P::Output, ExchangeError>> {
        tokio::spawn(self.run())
    }

    /// Run on a dedicated task with a completion deadline.
    pub fn spawn_with_timeout(
        self,
        timeout: Duration,
    ) -> JoinHandle<Result<P::Output, ExchangeError>> {
        tokio::spawn(self.run_with_timeout(timeout))
    }

    /// Broadcast, collect until complete, compute the result.
    ///
    /// There is no built-in deadline: a peer that never answers keeps the
    /// run waiting. Callers that need a bound use
    /// [`run_with_timeout`](Self::run_with_timeout), which also cleans up
    /// the registration when it abandons the exchange.
    pub async fn run(self) -> Result<P::Output, ExchangeError> {
        self.run_inner(None).await
    }

    /// Like [`run`](Self::run), but abandon the exchange after `timeout`,
    /// reporting the partial response set and the silent devices.
    pub async fn run_with_timeout(self, timeout: Duration) -> Result<P::Output, ExchangeError> {
        self.run_inner(Some(timeout)).await
    }

    async fn run_inner(mut self, timeout: Option<Duration>) -> Result<P::Output, ExchangeError> {
        let result = self.drive(timeout).await;
        self.dispatcher.deregister(self.request.exchange_id);
        result
    }

    async fn drive(&mut self, timeout: Option<Duration>) -> Result<P::Output, ExchangeError> {
        let receivers = self.resolve().await?;
        self.request.receivers = receivers.iter().map(|d| d.addr.clone()).collect();

        tracing::debug!(
            exchange = %self.request.exchange_id,
            kind = %self.request.payload.kind(),
            receivers = receivers.len(),
            "starting exchange"
        );

        for device in receivers {
            // Notified before sent: the response cannot race its own
            // registration.
            self.slot.mark_notified(device.clone());
            let message = PeerMessage::Request(self.request.clone());
            if let Err(err) = self.transport.send(&device.addr, message).await {
                tracing::warn!(
                    exchange = %self.request.exchange_id,
                    device = %device,
                    %err,
                    "request delivery failed; device stays in the notified set"
                );
            }
        }

        match timeout {
            None => self.slot.wait_complete().await,
            Some(deadline) => {
                if tokio::time::timeout(deadline, self.slot.wait_complete())
                    .await
                    .is_err()
                {
                    let state = self.slot.snapshot();
                    return Err(ExchangeError::Partial {
                        exchange_id: state.exchange_id(),
                        responded: state.responses().cloned().collect(),
                        missing: state.missing(),
                    });
                }
            }
        }

        let state = self.slot.snapshot();
        tracing::debug!(
            exchange = %self.request.exchange_id,
            responses = state.responses().count(),
            "exchange complete"
        );
        self.policy.compute(&state)
    }

    async fn resolve(&self) -> Result<Vec<PeerDevice>, ExchangeError> {
        match &self.scope {
            ExchangeScope::Devices(devices) => Ok(devices.clone()),
            ExchangeScope::OwnDevices => {
                let all = self.directory.resolve_devices(&self.local.username).await?;
                Ok(all
                    .into_iter()
                    .filter(|d| d.device_id != self.local.device_id)
                    .collect())
            }
        }
    }
}
