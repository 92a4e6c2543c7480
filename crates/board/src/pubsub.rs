//! Broadcast transport over a publish/subscribe network.
//!
//! Peer discovery and connectivity belong to the [`PubSub`] implementation.
//! [`MemoryPubSub`] connects nodes living in one process; like a gossip
//! network, it hands a publisher its own messages back, so receivers drop
//! anything whose origin is themselves.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bundle::{Bundle, BundleKind};
use crate::codec;
use crate::error::BoardError;
use crate::queue::Inlet;
use crate::Board;

/// Topic carrying every DKG bundle.
pub const DKG_TOPIC: &str = "dkg";
/// Topic carrying VRF signing requests.
pub const SIGN_INPUT_TOPIC: &str = "sign_vrf_input";
/// Topic carrying VRF partial signatures.
pub const SIGN_OUTPUT_TOPIC: &str = "sign_vrf_output";

const TOPIC_CAPACITY: usize = 1024;

/// A message received on a topic, tagged with the peer it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    pub from: String,
    pub data: Vec<u8>,
}

/// Networking collaborator of the broadcast transport.
#[async_trait]
pub trait PubSub: Send + Sync + 'static {
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), BoardError>;

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<PubSubMessage>;

    /// Identifier other peers see as the origin of our messages.
    fn local_id(&self) -> &str;

    /// Number of other peers currently subscribed to `topic`.
    fn peer_count(&self, topic: &str) -> usize;
}

struct Topic {
    sender: broadcast::Sender<PubSubMessage>,
    members: HashSet<String>,
}

/// In-process message hub shared by several [`MemoryPubSub`] peers.
#[derive(Default)]
pub struct MemoryHub {
    topics: Mutex<HashMap<String, Topic>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a new peer to the hub.
    pub fn join(self: &Arc<Self>, id: impl Into<String>) -> MemoryPubSub {
        MemoryPubSub {
            hub: Arc::clone(self),
            id: id.into(),
        }
    }

    fn with_topic<T>(&self, name: &str, f: impl FnOnce(&mut Topic) -> T) -> T {
        let mut topics = self.topics.lock();
        let topic = topics.entry(name.to_string()).or_insert_with(|| Topic {
            sender: broadcast::channel(TOPIC_CAPACITY).0,
            members: HashSet::new(),
        });
        f(topic)
    }
}

/// One peer of a [`MemoryHub`].
#[derive(Clone)]
pub struct MemoryPubSub {
    hub: Arc<MemoryHub>,
    id: String,
}

#[async_trait]
impl PubSub for MemoryPubSub {
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), BoardError> {
        let message = PubSubMessage {
            from: self.id.clone(),
            data,
        };
        // no subscribers is not an error on a gossip network
        let _ = self.hub.with_topic(topic, |t| t.sender.send(message));
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<PubSubMessage> {
        self.hub.with_topic(topic, |t| {
            t.members.insert(self.id.clone());
            t.sender.subscribe()
        })
    }

    fn local_id(&self) -> &str {
        &self.id
    }

    fn peer_count(&self, topic: &str) -> usize {
        self.hub
            .with_topic(topic, |t| t.members.iter().filter(|m| **m != self.id).count())
    }
}

/// Publishes every bundle once on [`DKG_TOPIC`].
///
/// Arrivals are decoded by one relay and handed to a forwarder per bundle
/// kind, so a full queue only holds back bundles of its own kind.
pub struct PubSubBoard<P: PubSub> {
    pubsub: Arc<P>,
    inlet: Inlet,
    relays: Vec<JoinHandle<()>>,
}

impl<P: PubSub> PubSubBoard<P> {
    /// Subscribe to the DKG topic and start relaying arrivals into `inlet`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(pubsub: Arc<P>, inlet: Inlet) -> Self {
        let receiver = pubsub.subscribe(DKG_TOPIC);

        let mut relays = Vec::with_capacity(BundleKind::ALL.len() + 1);
        let mut lanes = HashMap::new();
        for kind in BundleKind::ALL {
            let (lane, backlog) = mpsc::unbounded_channel();
            lanes.insert(kind, lane);
            relays.push(tokio::spawn(forward_loop(kind, backlog, inlet.clone())));
        }
        relays.push(tokio::spawn(relay_loop(
            pubsub.local_id().to_string(),
            receiver,
            lanes,
        )));

        Self {
            pubsub,
            inlet,
            relays,
        }
    }

    pub fn pubsub(&self) -> &Arc<P> {
        &self.pubsub
    }
}

impl<P: PubSub> Drop for PubSubBoard<P> {
    fn drop(&mut self) {
        for relay in &self.relays {
            relay.abort();
        }
    }
}

#[async_trait]
impl<P: PubSub> Board for PubSubBoard<P> {
    async fn publish(&self, bundle: Bundle) -> Result<(), BoardError> {
        let bytes = codec::to_bytes(&bundle)?;
        self.pubsub.publish(DKG_TOPIC, bytes).await?;
        self.inlet.deliver(bundle).await
    }
}

async fn relay_loop(
    local_id: String,
    mut receiver: broadcast::Receiver<PubSubMessage>,
    lanes: HashMap<BundleKind, mpsc::UnboundedSender<Bundle>>,
) {
    loop {
        let message = match receiver.recv().await {
            Ok(message) => message,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "DKG relay lagging, messages lost");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if message.from == local_id {
            continue;
        }

        let bundle = match codec::from_bytes(&message.data) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(peer = %message.from, error = %e, "Dropping malformed bundle");
                continue;
            }
        };
        let kind = bundle.kind();
        if let Some(lane) = lanes.get(&kind) {
            if lane.send(bundle).is_err() {
                debug!(%kind, "Forwarder stopped, dropping bundle");
            }
        }
        if lanes.values().all(|lane| lane.is_closed()) {
            debug!("Inbox dropped, stopping DKG relay");
            break;
        }
    }
}

/// Feed one kind's queue. A full queue stalls only this loop.
async fn forward_loop(kind: BundleKind, mut backlog: mpsc::UnboundedReceiver<Bundle>, inlet: Inlet) {
    while let Some(bundle) = backlog.recv().await {
        if inlet.deliver(bundle).await.is_err() {
            debug!(%kind, "Inbox dropped, stopping forwarder");
            break;
        }
    }
}

/// Block until at least `peers` other peers are subscribed to `topic`.
pub async fn wait_for_quorum<P: PubSub + ?Sized>(
    pubsub: &P,
    topic: &str,
    peers: usize,
    retries: u32,
    interval: Duration,
) -> Result<(), BoardError> {
    for attempt in 1..=retries.max(1) {
        let connected = pubsub.peer_count(topic);
        if connected >= peers {
            info!(topic, connected, "Topic quorum reached");
            return Ok(());
        }
        debug!(topic, connected, required = peers, attempt, "Waiting for peers");
        tokio::time::sleep(interval).await;
    }
    Err(BoardError::NotEnoughPeers {
        topic: topic.to_string(),
        connected: pubsub.peer_count(topic),
        required: peers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue;
    use randnet_types::{DealBundle, ResponseBundle};

    fn response(share_index: u32) -> Bundle {
        Bundle::Response(ResponseBundle {
            share_index,
            responses: vec![],
            session_id: vec![1, 2, 3],
            signature: vec![4, 5, 6],
        })
    }

    #[tokio::test]
    async fn test_memory_hub_echoes_to_sender() {
        let hub = MemoryHub::new();
        let a = hub.join("a");
        let mut rx = a.subscribe("t");

        a.publish("t", vec![1]).await.unwrap();
        let message = rx.recv().await.unwrap();
        assert_eq!(message.from, "a");
        assert_eq!(message.data, vec![1]);
    }

    #[tokio::test]
    async fn test_peer_count_excludes_self() {
        let hub = MemoryHub::new();
        let a = hub.join("a");
        let b = hub.join("b");
        let _ra = a.subscribe(DKG_TOPIC);
        assert_eq!(a.peer_count(DKG_TOPIC), 0);
        let _rb = b.subscribe(DKG_TOPIC);
        assert_eq!(a.peer_count(DKG_TOPIC), 1);

        assert!(wait_for_quorum(&a, DKG_TOPIC, 1, 1, Duration::from_millis(1))
            .await
            .is_ok());
        assert!(matches!(
            wait_for_quorum(&a, DKG_TOPIC, 2, 2, Duration::from_millis(1)).await,
            Err(BoardError::NotEnoughPeers { connected: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_board_delivers_once_everywhere() {
        let hub = MemoryHub::new();
        let (inlet_a, mut inbox_a) = queue::channel(4);
        let (inlet_b, mut inbox_b) = queue::channel(4);
        let board_a = PubSubBoard::new(Arc::new(hub.join("a")), inlet_a);
        let _board_b = PubSubBoard::new(Arc::new(hub.join("b")), inlet_b);

        board_a.publish(response(0)).await.unwrap();

        assert_eq!(inbox_b.responses.recv().await.unwrap().share_index, 0);
        assert_eq!(inbox_a.responses.recv().await.unwrap().share_index, 0);

        // the echo from the hub must not produce a second local copy
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(inbox_a.responses.try_recv().is_err());
    }

    fn deal(dealer_index: u32) -> Bundle {
        Bundle::Deal(DealBundle {
            dealer_index,
            deals: vec![],
            public: vec![],
            session_id: vec![1, 2, 3],
            signature: vec![4, 5, 6],
        })
    }

    #[tokio::test]
    async fn test_full_deal_queue_does_not_stall_responses() {
        let hub = MemoryHub::new();
        let (inlet, mut inbox) = queue::channel(1);
        let _board = PubSubBoard::new(Arc::new(hub.join("a")), inlet);
        let other = hub.join("b");

        for dealer in 0..3 {
            other
                .publish(DKG_TOPIC, codec::to_bytes(&deal(dealer)).unwrap())
                .await
                .unwrap();
        }
        other
            .publish(DKG_TOPIC, codec::to_bytes(&response(1)).unwrap())
            .await
            .unwrap();

        let response = tokio::time::timeout(Duration::from_secs(1), inbox.responses.recv())
            .await
            .expect("responses held back by the deal queue")
            .unwrap();
        assert_eq!(response.share_index, 1);

        for dealer in 0..3 {
            assert_eq!(inbox.deals.recv().await.unwrap().dealer_index, dealer);
        }
    }

    #[tokio::test]
    async fn test_relay_drops_malformed() {
        let hub = MemoryHub::new();
        let (inlet, mut inbox) = queue::channel(4);
        let _board = PubSubBoard::new(Arc::new(hub.join("a")), inlet);
        let other = hub.join("b");

        other.publish(DKG_TOPIC, b"not json".to_vec()).await.unwrap();
        other
            .publish(DKG_TOPIC, codec::to_bytes(&response(1)).unwrap())
            .await
            .unwrap();

        assert_eq!(inbox.responses.recv().await.unwrap().share_index, 1);
    }
}
