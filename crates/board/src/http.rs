//! Point-to-point transport: direct JSON-RPC delivery to every peer.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::bundle::Bundle;
use crate::client::{Peer, PeerClient};
use crate::codec;
use crate::error::BoardError;
use crate::queue::Inlet;
use crate::Board;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pushes every bundle to each peer's endpoint, once, and to itself.
pub struct HttpBoard {
    index: u32,
    peers: Vec<PeerClient>,
    inlet: Inlet,
}

impl HttpBoard {
    /// `peers` may include this node; it is skipped in favour of loopback.
    pub fn new(index: u32, peers: &[Peer], inlet: Inlet) -> Result<Self, BoardError> {
        let peers = peers
            .iter()
            .filter(|peer| peer.index != index)
            .map(|peer| PeerClient::new(peer, REQUEST_TIMEOUT))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            index,
            peers,
            inlet,
        })
    }

    pub fn peers(&self) -> &[PeerClient] {
        &self.peers
    }

    /// Block until every peer answers the liveness probe.
    ///
    /// Each peer gets `retries` attempts spaced by `interval`.
    pub async fn wait_for_peers(&self, retries: u32, interval: Duration) -> Result<(), BoardError> {
        for peer in &self.peers {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match peer.health().await {
                    Ok(()) => {
                        debug!(peer = peer.index(), attempt, "Peer is up");
                        break;
                    }
                    Err(e) if attempt >= retries.max(1) => {
                        warn!(peer = peer.index(), endpoint = peer.endpoint(), "Peer unreachable");
                        return Err(e);
                    }
                    Err(_) => tokio::time::sleep(interval).await,
                }
            }
        }
        info!(index = self.index, peers = self.peers.len(), "All peers reachable");
        Ok(())
    }
}

#[async_trait]
impl Board for HttpBoard {
    async fn publish(&self, bundle: Bundle) -> Result<(), BoardError> {
        let envelope = codec::encode(&bundle)?;

        for peer in &self.peers {
            if let Err(e) = peer.push(&envelope).await {
                warn!(
                    peer = peer.index(),
                    kind = %envelope.kind,
                    error = %e,
                    "Delivery failed"
                );
            }
        }

        self.inlet.deliver(bundle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue;
    use crate::rpc;
    use randnet_types::{Deal, DealBundle, G2Point};
    use std::net::SocketAddr;

    fn deal(dealer_index: u32) -> Bundle {
        Bundle::Deal(DealBundle {
            dealer_index,
            deals: vec![Deal {
                share_index: 1,
                encrypted_share: vec![1, 2, 3],
            }],
            public: vec![],
            session_id: vec![0u8; 32],
            signature: vec![0u8; 128],
        })
    }

    async fn spawn_node() -> (String, queue::Inbox, jsonrpsee::server::ServerHandle) {
        let (inlet, inbox) = queue::channel(4);
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let (local, handle) = rpc::serve(addr, inlet, None).await.unwrap();
        (format!("http://{}", local), inbox, handle)
    }

    #[tokio::test]
    async fn test_publish_reaches_peer_and_self() {
        let (endpoint, mut remote_inbox, _handle) = spawn_node().await;

        let (inlet, mut local_inbox) = queue::channel(4);
        let peers = vec![
            Peer {
                index: 0,
                endpoint: "http://127.0.0.1:1".into(),
            },
            Peer { index: 1, endpoint },
        ];
        let board = HttpBoard::new(0, &peers, inlet).unwrap();
        assert_eq!(board.peers().len(), 1);

        board.wait_for_peers(3, Duration::from_millis(10)).await.unwrap();
        board.publish(deal(0)).await.unwrap();

        assert_eq!(remote_inbox.deals.recv().await.unwrap().dealer_index, 0);
        assert_eq!(local_inbox.deals.recv().await.unwrap().dealer_index, 0);
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_skipped() {
        let (endpoint, mut remote_inbox, _handle) = spawn_node().await;

        let (inlet, mut local_inbox) = queue::channel(4);
        let peers = vec![
            Peer {
                index: 1,
                endpoint: "http://127.0.0.1:1".into(),
            },
            Peer { index: 2, endpoint },
        ];
        let board = HttpBoard::new(0, &peers, inlet).unwrap();

        board.publish(deal(0)).await.unwrap();
        assert_eq!(remote_inbox.deals.recv().await.unwrap().dealer_index, 0);
        assert_eq!(local_inbox.deals.recv().await.unwrap().dealer_index, 0);

        let result = board.wait_for_peers(2, Duration::from_millis(10)).await;
        assert!(matches!(
            result,
            Err(BoardError::PeerUnreachable { peer: 1, .. })
        ));
    }
}
