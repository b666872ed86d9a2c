//! The sync node.
//!
//! One [`SyncNode`] per device: it owns the exchange dispatcher and the
//! seams to the outside world, starts outgoing exchanges on their own
//! tasks, and is the entry point for every inbound protocol message.

use std::sync::Arc;
use std::time::Duration;
use sync_core::LookupError;
use sync_exchange::{
    offer_file, unshare_file, unshared_broadcast, ExchangeCoordinator, ExchangeDispatcher,
    ExchangeError, ExchangePolicy, OfferConsensus, PeerDirectory, RequestHandler, StorageIo,
    Transport, TransportError, UnshareOutcome, UnsharedOutcome, VersionStore,
};
use sync_types::{FileId, PeerDevice, PeerMessage, RelPath, SemanticEvent};
use thiserror::Error;

/// Node errors.
#[derive(Debug, Error)]
pub enum NodeError {
    /// An exchange failed.
    #[error("exchange failed: {0}")]
    Exchange(#[from] ExchangeError),

    /// Sending a reply failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A local store operation failed.
    #[error("store error: {0}")]
    Store(#[from] LookupError),
}

/// The result of revoking a share: both halves of the sequence.
#[derive(Debug, Clone)]
pub struct RevokeOutcome {
    /// The formerly sharing peer's answer.
    pub unshare: UnshareOutcome,
    /// The own-devices broadcast result.
    pub unshared: UnsharedOutcome,
}

/// One device's synchronization coordination endpoint.
pub struct SyncNode<S> {
    local: PeerDevice,
    directory: Arc<dyn PeerDirectory>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<ExchangeDispatcher>,
    handler: RequestHandler<S>,
    store: Arc<S>,
    exchange_timeout: Option<Duration>,
}

impl<S: VersionStore + StorageIo + 'static> SyncNode<S> {
    /// Create a node for `local` over its store and network seams.
    ///
    /// `exchange_timeout` bounds every exchange this node initiates;
    /// `None` waits without bound.
    pub fn new(
        local: PeerDevice,
        directory: Arc<dyn PeerDirectory>,
        transport: Arc<dyn Transport>,
        store: Arc<S>,
        exchange_timeout: Option<Duration>,
    ) -> Self {
        let handler = RequestHandler::new(local.clone(), Arc::clone(&store));
        Self {
            local,
            directory,
            transport,
            dispatcher: Arc::new(ExchangeDispatcher::new()),
            handler,
            store,
            exchange_timeout,
        }
    }

    /// The device this node runs on.
    pub fn local_device(&self) -> &PeerDevice {
        &self.local
    }

    /// The node's exchange dispatcher.
    pub fn dispatcher(&self) -> Arc<ExchangeDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Offer a local change to the user's other devices and collect the
    /// conflict consensus.
    pub async fn offer_file(&self, event: SemanticEvent) -> Result<OfferConsensus, NodeError> {
        let coordinator = offer_file(
            self.local.clone(),
            Arc::clone(&self.directory),
            Arc::clone(&self.transport),
            Arc::clone(&self.dispatcher),
            event,
        )?;
        self.await_exchange(coordinator).await
    }

    /// Revoke `sharer_device`'s share of the file at `path`.
    ///
    /// Runs the two protocols in order: Unshare to the sharer's device
    /// first, then the local sharer record is dropped and the Unshared
    /// broadcast tells the user's other devices to do the same. The local
    /// record must outlive the remote reset, otherwise a delete
    /// propagated from the sharer's side could pass as the owner's.
    pub async fn revoke_share(
        &self,
        file_id: FileId,
        sharer_device: PeerDevice,
        path: RelPath,
    ) -> Result<RevokeOutcome, NodeError> {
        let sharer_name = sharer_device.username.clone();

        let unshare = unshare_file(
            self.local.clone(),
            Arc::clone(&self.directory),
            Arc::clone(&self.transport),
            Arc::clone(&self.dispatcher),
            sharer_device,
            file_id,
        )?;
        let unshare_outcome = self.await_exchange(unshare).await?;

        self.remove_local_sharer(&path, &sharer_name)?;

        let unshared = unshared_broadcast(
            self.local.clone(),
            Arc::clone(&self.directory),
            Arc::clone(&self.transport),
            Arc::clone(&self.dispatcher),
            path,
            sharer_name,
        )?;
        let unshared_outcome = self.await_exchange(unshared).await?;

        Ok(RevokeOutcome {
            unshare: unshare_outcome,
            unshared: unshared_outcome,
        })
    }

    /// Route one inbound message.
    ///
    /// Responses go to the coordinator registered under their exchange id
    /// (unknown ids are logged and dropped by the dispatcher). Requests
    /// are handled synchronously and the reply is sent back to the
    /// sender's address.
    pub async fn handle_inbound(&self, message: PeerMessage) -> Result<(), NodeError> {
        match message {
            PeerMessage::Response(response) => {
                self.dispatcher.route(response)?;
                Ok(())
            }
            PeerMessage::Request(request) => {
                let response = self.handler.handle(&request);
                let receiver = response.receiver.clone();
                self.transport
                    .send(&receiver, PeerMessage::Response(response))
                    .await?;
                Ok(())
            }
        }
    }

    fn remove_local_sharer(&self, path: &RelPath, sharer: &str) -> Result<(), NodeError> {
        use sync_core::MetadataLookup;

        let mut meta = self.store.path_metadata(path)?;
        if !meta.remove_sharer(sharer) {
            tracing::debug!(path = %path, sharer, "no local sharer entry to remove");
        }
        self.store.write_path_metadata(path, meta)?;
        Ok(())
    }

    async fn await_exchange<P: ExchangePolicy>(
        &self,
        coordinator: ExchangeCoordinator<P>,
    ) -> Result<P::Output, NodeError> {
        let handle = match self.exchange_timeout {
            Some(timeout) => coordinator.spawn_with_timeout(timeout),
            None => coordinator.spawn(),
        };
        let result = handle
            .await
            .map_err(|e| ExchangeError::TaskFailed(e.to_string()))?;
        Ok(result?)
    }
}
