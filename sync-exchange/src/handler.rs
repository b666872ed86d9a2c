//! The receiving side of exchanges.
//!
//! Every device runs the same handler logic its peers run: an inbound
//! request is dispatched on its payload kind, the local effect is applied
//! synchronously, and the reply goes back to the request's sender.

use std::sync::Arc;
use sync_core::{AccessManager, MetadataLookup, VersionLookup};
use sync_types::{
    AccessType, ExchangeRequest, ExchangeResponse, FileOfferRequest, FileOfferResponse,
    PathMetadata, PeerDevice, ResponsePayload, StatusCode, UnshareRequest, UnshareResponse,
    UnsharedRequest, UnsharedResponse,
};

use crate::store::{StorageError, StorageIo, VersionStore};

/// Applies inbound exchange requests against the local store.
pub struct RequestHandler<S> {
    local: PeerDevice,
    store: Arc<S>,
    access: AccessManager<Arc<S>>,
}

impl<S: VersionStore + StorageIo> RequestHandler<S> {
    /// Create a handler for the local device over its store.
    pub fn new(local: PeerDevice, store: Arc<S>) -> Self {
        let access = AccessManager::new(Arc::clone(&store));
        Self {
            local,
            store,
            access,
        }
    }

    /// Dispatch a request to its handler and produce the reply.
    pub fn handle(&self, request: &ExchangeRequest) -> ExchangeResponse {
        match &request.payload {
            sync_types::RequestPayload::FileOffer(offer) => self.handle_file_offer(request, offer),
            sync_types::RequestPayload::Unshare(unshare) => self.handle_unshare(request, unshare),
            sync_types::RequestPayload::Unshared(unshared) => {
                self.handle_unshared(request, unshared)
            }
        }
    }

    /// A peer device offers a change: conflicted iff our current version
    /// of the path hashes differently from the offer.
    fn handle_file_offer(
        &self,
        request: &ExchangeRequest,
        offer: &FileOfferRequest,
    ) -> ExchangeResponse {
        let path = offer.event.path();
        let has_conflict = match (self.store.last_version_hash(path), offer.event.hash()) {
            (Ok(ours), Some(offered)) => ours != offered,
            // Nothing known locally, or nothing offered to compare: no
            // conflict to report.
            _ => false,
        };

        tracing::debug!(
            exchange = %request.exchange_id,
            path = %path,
            has_conflict,
            "answering file offer"
        );

        ExchangeResponse::reply_to(
            request,
            self.local.clone(),
            StatusCode::Accepted,
            ResponsePayload::FileOffer(FileOfferResponse { has_conflict }),
        )
    }

    /// The owner revoked our share: reset the path's sharing metadata and
    /// drop the local copy. The metadata reset comes first so the delete
    /// is not attributed to the former owner.
    fn handle_unshare(
        &self,
        request: &ExchangeRequest,
        unshare: &UnshareRequest,
    ) -> ExchangeResponse {
        // The path may have changed since the share; the stable id cannot.
        let path = match self.store.resolve_path_by_file_id(&unshare.file_id) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(
                    exchange = %request.exchange_id,
                    file_id = %unshare.file_id,
                    %err,
                    "unshare for unknown file id"
                );
                return self.unshare_reply(request, StatusCode::FileMissing);
            }
        };

        if let Err(err) = self.store.write_path_metadata(&path, PathMetadata::cleared()) {
            tracing::warn!(exchange = %request.exchange_id, path = %path, %err, "metadata reset failed");
            return self.unshare_reply(request, StatusCode::Denied);
        }

        match self.store.delete(&path) {
            Ok(()) => self.unshare_reply(request, StatusCode::Accepted),
            Err(StorageError::NotFound(_)) => self.unshare_reply(request, StatusCode::FileMissing),
            Err(err) => {
                tracing::warn!(exchange = %request.exchange_id, path = %path, %err, "deleting shared copy failed");
                self.unshare_reply(request, StatusCode::Denied)
            }
        }
    }

    fn unshare_reply(&self, request: &ExchangeRequest, status: StatusCode) -> ExchangeResponse {
        ExchangeResponse::reply_to(
            request,
            self.local.clone(),
            status,
            ResponsePayload::Unshare(UnshareResponse {}),
        )
    }

    /// Another of the owner's devices revoked a share: drop the sharer
    /// entry from our copy of the path metadata. Only a sender that still
    /// holds write access on the path may ask for this.
    fn handle_unshared(
        &self,
        request: &ExchangeRequest,
        unshared: &UnsharedRequest,
    ) -> ExchangeResponse {
        match self
            .access
            .has_access(&request.sender.username, AccessType::Write, &unshared.path)
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    exchange = %request.exchange_id,
                    sender = %request.sender,
                    path = %unshared.path,
                    "unshared request without write access"
                );
                return self.unshared_reply(request, StatusCode::AccessDenied, false);
            }
            Err(err) => {
                tracing::warn!(exchange = %request.exchange_id, path = %unshared.path, %err, "unshared for unknown path");
                return self.unshared_reply(request, StatusCode::FileMissing, false);
            }
        }

        let mut meta = match self.store.path_metadata(&unshared.path) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(exchange = %request.exchange_id, path = %unshared.path, %err, "unshared for unknown path");
                return self.unshared_reply(request, StatusCode::FileMissing, false);
            }
        };

        if !meta.remove_sharer(&unshared.sharer) {
            tracing::debug!(
                exchange = %request.exchange_id,
                path = %unshared.path,
                sharer = %unshared.sharer,
                "no sharer entry to remove"
            );
        }
        if let Err(err) = self.store.write_path_metadata(&unshared.path, meta) {
            tracing::warn!(exchange = %request.exchange_id, path = %unshared.path, %err, "sharer removal failed");
            return self.unshared_reply(request, StatusCode::Denied, false);
        }

        self.unshared_reply(request, StatusCode::Accepted, true)
    }

    fn unshared_reply(
        &self,
        request: &ExchangeRequest,
        status: StatusCode,
        accepted: bool,
    ) -> ExchangeResponse {
        ExchangeResponse::reply_to(
            request,
            self.local.clone(),
            status,
            ResponsePayload::Unshared(UnsharedResponse { accepted }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use sync_types::{
        ContentHash, DeviceId, EventTime, FileId, RelPath, RequestPayload, SemanticEvent, Sharer,
    };

    fn handler() -> (RequestHandler<MemoryStore>, Arc<MemoryStore>, PeerDevice) {
        let local = PeerDevice::new("alice", DeviceId::random(), "addr-local");
        let store = Arc::new(MemoryStore::new());
        let handler = RequestHandler::new(local.clone(), Arc::clone(&store));
        (handler, store, local)
    }

    fn offer_request(sender: PeerDevice, path: &str, hash: ContentHash) -> ExchangeRequest {
        ExchangeRequest::new(
            sender,
            RequestPayload::FileOffer(FileOfferRequest {
                event: SemanticEvent::modify(path, path, hash, EventTime::from_millis(1)),
            }),
        )
    }

    #[test]
    fn offer_with_matching_hash_has_no_conflict() {
        let (handler, store, _) = handler();
        let hash = ContentHash::of(b"same");
        store.insert_version("doc.txt", hash);

        let sender = PeerDevice::new("alice", DeviceId::random(), "addr-remote");
        let response = handler.handle(&offer_request(sender, "doc.txt", hash));

        match response.payload {
            ResponsePayload::FileOffer(o) => assert!(!o.has_conflict),
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(response.status, StatusCode::Accepted);
        assert_eq!(response.receiver.as_str(), "addr-remote");
    }

    #[test]
    fn offer_with_diverged_hash_reports_conflict() {
        let (handler, store, _) = handler();
        store.insert_version("doc.txt", ContentHash::of(b"local edit"));

        let sender = PeerDevice::new("alice", DeviceId::random(), "addr-remote");
        let response =
            handler.handle(&offer_request(sender, "doc.txt", ContentHash::of(b"remote")));

        match response.payload {
            ResponsePayload::FileOffer(o) => assert!(o.has_conflict),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn offer_for_unknown_path_has_no_conflict() {
        let (handler, _, _) = handler();
        let sender = PeerDevice::new("alice", DeviceId::random(), "addr-remote");
        let response =
            handler.handle(&offer_request(sender, "new.txt", ContentHash::of(b"new")));

        match response.payload {
            ResponsePayload::FileOffer(o) => assert!(!o.has_conflict),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn unshare_resets_metadata_and_deletes_the_copy() {
        let (handler, store, _) = handler();
        let file_id = FileId::new();
        let path = RelPath::new("shared/report.pdf");
        store.bind_file_id(file_id, "shared/report.pdf");
        store.insert_file("shared/report.pdf");
        let mut meta = PathMetadata::owned_by("bob");
        meta.shared = true;
        meta.access = Some(AccessType::Read);
        store.insert_metadata("shared/report.pdf", meta);

        let owner = PeerDevice::new("bob", DeviceId::random(), "addr-owner");
        let response = handler.handle(&ExchangeRequest::new(
            owner,
            RequestPayload::Unshare(UnshareRequest { file_id }),
        ));

        assert_eq!(response.status, StatusCode::Accepted);
        let meta = store.metadata(&path).unwrap();
        assert_eq!(meta, PathMetadata::cleared());
        assert!(!store.has_file(&path));
        assert_eq!(store.deleted_paths(), vec![path]);
    }

    #[test]
    fn unshare_for_unknown_file_id_is_file_missing() {
        let (handler, store, _) = handler();
        let owner = PeerDevice::new("bob", DeviceId::random(), "addr-owner");
        let response = handler.handle(&ExchangeRequest::new(
            owner,
            RequestPayload::Unshare(UnshareRequest {
                file_id: FileId::new(),
            }),
        ));

        assert_eq!(response.status, StatusCode::FileMissing);
        assert!(store.deleted_paths().is_empty());
    }

    #[test]
    fn unshare_with_no_local_copy_is_file_missing() {
        let (handler, store, _) = handler();
        let file_id = FileId::new();
        store.bind_file_id(file_id, "shared/gone.txt");
        store.insert_metadata("shared/gone.txt", PathMetadata::owned_by("bob"));

        let owner = PeerDevice::new("bob", DeviceId::random(), "addr-owner");
        let response = handler.handle(&ExchangeRequest::new(
            owner,
            RequestPayload::Unshare(UnshareRequest { file_id }),
        ));

        assert_eq!(response.status, StatusCode::FileMissing);
        // The metadata reset still happened.
        let meta = store.metadata(&RelPath::new("shared/gone.txt")).unwrap();
        assert_eq!(meta, PathMetadata::cleared());
    }

    #[test]
    fn unshared_removes_the_sharer_entry() {
        let (handler, store, _) = handler();
        let path = RelPath::new("shared/doc.txt");
        let mut meta = PathMetadata::owned_by("alice");
        meta.shared = true;
        meta.sharers.push(Sharer::new("bob", AccessType::Read));
        store.insert_metadata("shared/doc.txt", meta);

        let owner_device = PeerDevice::new("alice", DeviceId::random(), "addr-other");
        let response = handler.handle(&ExchangeRequest::new(
            owner_device,
            RequestPayload::Unshared(UnsharedRequest {
                path: path.clone(),
                sharer: "bob".to_string(),
            }),
        ));

        assert_eq!(response.status, StatusCode::Accepted);
        match response.payload {
            ResponsePayload::Unshared(u) => assert!(u.accepted),
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(store.metadata(&path).unwrap().sharer("bob").is_none());
    }

    #[test]
    fn unshared_from_a_non_owner_is_access_denied() {
        let (handler, store, _) = handler();
        let path = RelPath::new("shared/doc.txt");
        let mut meta = PathMetadata::owned_by("alice");
        meta.sharers.push(Sharer::new("bob", AccessType::Read));
        store.insert_metadata("shared/doc.txt", meta);

        // bob only holds Read; he cannot revoke sharers.
        let intruder = PeerDevice::new("bob", DeviceId::random(), "addr-bob");
        let response = handler.handle(&ExchangeRequest::new(
            intruder,
            RequestPayload::Unshared(UnsharedRequest {
                path: path.clone(),
                sharer: "bob".to_string(),
            }),
        ));

        assert_eq!(response.status, StatusCode::AccessDenied);
        match response.payload {
            ResponsePayload::Unshared(u) => assert!(!u.accepted),
            other => panic!("unexpected payload {:?}", other),
        }
        // The entry survived.
        assert!(store.metadata(&path).unwrap().sharer("bob").is_some());
    }

    #[test]
    fn unshared_for_unknown_path_is_file_missing() {
        let (handler, _, _) = handler();
        let owner_device = PeerDevice::new("alice", DeviceId::random(), "addr-other");
        let response = handler.handle(&ExchangeRequest::new(
            owner_device,
            RequestPayload::Unshared(UnsharedRequest {
                path: RelPath::new("never/seen.txt"),
                sharer: "bob".to_string(),
            }),
        ));

        assert_eq!(response.status, StatusCode::FileMissing);
    }
}
