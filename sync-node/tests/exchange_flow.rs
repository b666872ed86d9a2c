//! End-to-end exchange flows over an in-memory network.
//!
//! Several nodes share one MemoryTransport; each node's mailbox is pumped
//! into its `handle_inbound`, so requests and responses flow exactly as
//! they would over a real transport.

use std::sync::Arc;
use std::time::Duration;
use sync_exchange::{ExchangeError, MemoryDirectory, MemoryStore, MemoryTransport, PeerDirectory, Transport};
use sync_node::{EventPipeline, NodeError, SyncNode};
use sync_types::{
    AccessType, ContentHash, DeviceId, EventTime, FileId, PathMetadata, PeerDevice, RelPath,
    SemanticEvent, Sharer,
};

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

struct TestNet {
    directory: Arc<MemoryDirectory>,
    transport: MemoryTransport,
}

impl TestNet {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().try_init();
        Self {
            directory: Arc::new(MemoryDirectory::new()),
            transport: MemoryTransport::new(),
        }
    }

    fn device(&self, user: &str, addr: &str) -> PeerDevice {
        let device = PeerDevice::new(user, DeviceId::random(), addr);
        self.directory.add_device(device.clone());
        device
    }

    fn node(
        &self,
        device: PeerDevice,
        store: Arc<MemoryStore>,
        timeout: Duration,
    ) -> Arc<SyncNode<MemoryStore>> {
        Arc::new(SyncNode::new(
            device,
            Arc::clone(&self.directory) as Arc<dyn PeerDirectory>,
            Arc::new(self.transport.clone()) as Arc<dyn Transport>,
            store,
            Some(timeout),
        ))
    }

    /// Pump the node's mailbox into its inbound handler.
    fn go_online(&self, node: &Arc<SyncNode<MemoryStore>>) {
        let mut mailbox = self
            .transport
            .register_mailbox(&node.local_device().addr);
        let node = Arc::clone(node);
        tokio::spawn(async move {
            while let Some(message) = mailbox.recv().await {
                if let Err(err) = node.handle_inbound(message).await {
                    tracing::warn!(%err, "inbound handling failed");
                }
            }
        });
    }
}

fn shared_doc_metadata(owner: &str, sharer: &str) -> PathMetadata {
    let mut meta = PathMetadata::owned_by(owner);
    meta.shared = true;
    meta.sharers.push(Sharer::new(sharer, AccessType::Read));
    meta
}

#[tokio::test]
async fn inferred_move_is_offered_and_agrees_across_devices() {
    let net = TestNet::new();
    let hash = ContentHash::of(b"chapter one");

    let device_a = net.device("alice", "addr-a");
    let device_b = net.device("alice", "addr-b");

    let store_a = Arc::new(MemoryStore::new());
    store_a.insert_version("foo.txt", hash);
    let store_b = Arc::new(MemoryStore::new());
    // Device B has not applied the move yet; its copy still lives at the
    // source path with the same content.
    store_b.insert_version("foo.txt", hash);

    let node_a = net.node(device_a, Arc::clone(&store_a), EXCHANGE_TIMEOUT);
    let node_b = net.node(device_b, store_b, EXCHANGE_TIMEOUT);
    net.go_online(&node_a);
    net.go_online(&node_b);

    // A's watcher saw a delete and a create in one window; the delete
    // arrives hash-less and is enriched from A's version history.
    let pipeline = EventPipeline::new(Arc::clone(&store_a));
    let batch = pipeline.process_window(vec![
        SemanticEvent::delete("foo.txt", "foo.txt", None, EventTime::from_millis(100)),
        SemanticEvent::create("bar.txt", "bar.txt", hash, EventTime::from_millis(150)),
    ]);

    assert_eq!(batch.len(), 1);
    let moved = match &batch[0] {
        SemanticEvent::Move(m) => m,
        other => panic!("expected a move, got {:?}", other),
    };
    assert_eq!(moved.path.as_str(), "foo.txt");
    assert_eq!(moved.dest.as_str(), "bar.txt");
    assert_eq!(moved.hash, hash);
    assert_eq!(moved.timestamp, EventTime::from_millis(150));

    let consensus = node_a.offer_file(batch[0].clone()).await.unwrap();
    assert!(consensus.in_agreement);
    assert!(consensus.conflicting.is_empty());
    assert_eq!(node_a.dispatcher().active_count(), 0);
}

#[tokio::test]
async fn diverged_device_marks_the_offer_conflicted() {
    let net = TestNet::new();

    let device_a = net.device("alice", "addr-a");
    let device_b = net.device("alice", "addr-b");

    let store_b = Arc::new(MemoryStore::new());
    store_b.insert_version("notes.txt", ContentHash::of(b"local draft"));

    let node_a = net.node(device_a, Arc::new(MemoryStore::new()), EXCHANGE_TIMEOUT);
    let node_b = net.node(device_b.clone(), store_b, EXCHANGE_TIMEOUT);
    net.go_online(&node_a);
    net.go_online(&node_b);

    let consensus = node_a
        .offer_file(SemanticEvent::modify(
            "notes.txt",
            "notes.txt",
            ContentHash::of(b"remote draft"),
            EventTime::from_millis(10),
        ))
        .await
        .unwrap();

    assert!(!consensus.in_agreement);
    assert_eq!(consensus.conflicting, vec![device_b.device_id]);
}

#[tokio::test]
async fn revoking_a_share_clears_both_sides() {
    let net = TestNet::new();
    let path = RelPath::new("shared/report.pdf");
    let file_id = FileId::new();

    let device_a = net.device("alice", "addr-a");
    let device_b = net.device("alice", "addr-b");
    let device_c = net.device("alice", "addr-c");
    let bob_device = net.device("bob", "addr-bob");

    // The owner's devices all know bob as a sharer.
    let store_a = Arc::new(MemoryStore::new());
    let store_b = Arc::new(MemoryStore::new());
    let store_c = Arc::new(MemoryStore::new());
    for store in [&store_a, &store_b, &store_c] {
        store.insert_metadata("shared/report.pdf", shared_doc_metadata("alice", "bob"));
    }

    // Bob's device holds the shared copy under alice's ownership.
    let bob_store = Arc::new(MemoryStore::new());
    bob_store.bind_file_id(file_id, "shared/report.pdf");
    bob_store.insert_file("shared/report.pdf");
    let mut bob_meta = PathMetadata::owned_by("alice");
    bob_meta.shared = true;
    bob_meta.access = Some(AccessType::Read);
    bob_store.insert_metadata("shared/report.pdf", bob_meta);

    let node_a = net.node(device_a, Arc::clone(&store_a), EXCHANGE_TIMEOUT);
    let node_b = net.node(device_b, Arc::clone(&store_b), EXCHANGE_TIMEOUT);
    let node_c = net.node(device_c, Arc::clone(&store_c), EXCHANGE_TIMEOUT);
    let bob_node = net.node(bob_device.clone(), Arc::clone(&bob_store), EXCHANGE_TIMEOUT);
    for node in [&node_a, &node_b, &node_c, &bob_node] {
        net.go_online(node);
    }

    let outcome = node_a
        .revoke_share(file_id, bob_device, path.clone())
        .await
        .unwrap();

    assert!(outcome.unshare.accepted);
    assert!(outcome.unshared.unanimous());
    assert_eq!(outcome.unshared.accepted_by.len(), 2);

    // Bob's side: metadata reset, copy gone, so a later local delete
    // cannot pass as the owner's.
    assert_eq!(bob_store.metadata(&path).unwrap(), PathMetadata::cleared());
    assert!(!bob_store.has_file(&path));

    // The owner's devices all forgot the sharer.
    for store in [&store_a, &store_b, &store_c] {
        assert!(store.metadata(&path).unwrap().sharer("bob").is_none());
    }
}

#[tokio::test]
async fn unshared_broadcast_needs_every_own_device() {
    let net = TestNet::new();
    let path = RelPath::new("shared/report.pdf");
    let file_id = FileId::new();

    let device_a = net.device("alice", "addr-a");
    let device_b = net.device("alice", "addr-b");
    let device_c = net.device("alice", "addr-c");
    // Device D is known to the directory but offline.
    let device_d = net.device("alice", "addr-d");
    let bob_device = net.device("bob", "addr-bob");

    let store_a = Arc::new(MemoryStore::new());
    let store_b = Arc::new(MemoryStore::new());
    let store_c = Arc::new(MemoryStore::new());
    for store in [&store_a, &store_b, &store_c] {
        store.insert_metadata("shared/report.pdf", shared_doc_metadata("alice", "bob"));
    }

    let bob_store = Arc::new(MemoryStore::new());
    bob_store.bind_file_id(file_id, "shared/report.pdf");
    bob_store.insert_file("shared/report.pdf");
    bob_store.insert_metadata("shared/report.pdf", PathMetadata::owned_by("alice"));

    // Short deadline: the broadcast cannot complete without device D.
    let node_a = net.node(device_a, store_a, Duration::from_millis(200));
    let node_b = net.node(device_b, store_b, EXCHANGE_TIMEOUT);
    let node_c = net.node(device_c, store_c, EXCHANGE_TIMEOUT);
    let bob_node = net.node(bob_device.clone(), bob_store, EXCHANGE_TIMEOUT);
    for node in [&node_a, &node_b, &node_c, &bob_node] {
        net.go_online(node);
    }

    let err = node_a
        .revoke_share(file_id, bob_device, path)
        .await
        .unwrap_err();

    match err {
        NodeError::Exchange(ExchangeError::Partial {
            responded, missing, ..
        }) => {
            // B and C answered; D never did.
            assert_eq!(responded.len(), 2);
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].device_id, device_d.device_id);
        }
        other => panic!("expected a partial exchange, got {:?}", other),
    }
}
