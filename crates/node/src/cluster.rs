//! A whole network of nodes inside one process.
//!
//! Every node gets its own key pair, board, inbox, result slot and VRF
//! plumbing. With [`Transport::Direct`] the nodes talk JSON-RPC over
//! loopback; with [`Transport::Broadcast`] they share a [`MemoryHub`].

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use jsonrpsee::server::ServerHandle;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use randnet_board::{
    queue, queue_capacity, rpc, wait_for_quorum, Board, HttpBoard, Inbox, MemoryHub, Peer,
    PubSubBoard, DKG_TOPIC,
};
use randnet_coordinator::{
    BroadcastSolicitor, DirectSolicitor, DkgRound, PendingSignatures, PhaseTiming, ResultSlot,
    RoundError, Solicitor, VrfService, VrfSigner,
};
use randnet_crypto::Keypair;
use randnet_dkg::{DkgConfig, DkgResult};
use randnet_types::{Node, Participants};

/// How the nodes of a cluster reach each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Transport {
    /// JSON-RPC over HTTP, one server per node
    Direct,
    /// A shared in-process publish/subscribe hub
    Broadcast,
}

const LIVENESS_RETRIES: u32 = 20;
const LIVENESS_INTERVAL: Duration = Duration::from_millis(50);

pub struct ClusterNode {
    pub index: u32,
    pub keypair: Keypair,
    pub slot: ResultSlot,
    pub signer: VrfSigner,
    pub pending: Arc<PendingSignatures>,
    board: Arc<dyn Board>,
    inbox: Option<Inbox>,
    solicitor: Option<Arc<dyn Solicitor>>,
    server: Option<ServerHandle>,
}

impl ClusterNode {
    pub fn board(&self) -> Arc<dyn Board> {
        self.board.clone()
    }

    pub fn result(&self) -> Option<&DkgResult> {
        self.slot.get()
    }
}

pub struct Cluster {
    participants: Arc<Participants>,
    nonce: Vec<u8>,
    timing: PhaseTiming,
    nodes: Vec<ClusterNode>,
}

impl Cluster {
    /// Generate keys for `n` nodes and wire them together.
    pub async fn start(n: u32, threshold: u32, transport: Transport, timing: PhaseTiming) -> Result<Self> {
        let keys: Vec<Keypair> = (0..n).map(|_| Keypair::generate(&mut OsRng)).collect();
        let nodes = keys
            .iter()
            .enumerate()
            .map(|(index, key)| Node {
                index: index as u32,
                public: *key.public(),
            })
            .collect();
        let participants = Arc::new(Participants::new(nodes, threshold)?);

        let mut nonce = vec![0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let nodes = match transport {
            Transport::Direct => direct_nodes(keys, participants.n()).await?,
            Transport::Broadcast => broadcast_nodes(keys, participants.n()).await?,
        };
        info!(n, threshold, ?transport, "Cluster started");

        Ok(Self {
            participants,
            nonce,
            timing,
            nodes,
        })
    }

    pub fn participants(&self) -> &Arc<Participants> {
        &self.participants
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn node(&self, index: u32) -> Result<&ClusterNode> {
        self.nodes
            .get(index as usize)
            .ok_or_else(|| anyhow!("no node {}", index))
    }

    /// Run one DKG round on every node and wait for all of them.
    pub async fn run_dkg(&mut self) -> Result<Vec<Result<DkgResult, RoundError>>> {
        let mut handles = Vec::with_capacity(self.nodes.len());
        for node in &mut self.nodes {
            let inbox = node
                .inbox
                .take()
                .ok_or_else(|| anyhow!("node {} already ran its round", node.index))?;
            let config = DkgConfig::new(
                node.keypair.clone(),
                self.participants.clone(),
                self.nonce.clone(),
            )?;
            let handle = DkgRound::spawn(config, node.board.clone(), inbox, self.timing, node.slot.clone())?;
            handles.push(handle);
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.wait_end().await);
        }
        Ok(results)
    }

    /// VRF service driven by `initiator`.
    pub fn vrf(&self, initiator: u32) -> Result<VrfService> {
        let node = self.node(initiator)?;
        let solicitor = node
            .solicitor
            .clone()
            .ok_or_else(|| anyhow!("node {} is offline", initiator))?;
        Ok(VrfService::new(node.signer.clone(), node.pending.clone(), solicitor))
    }

    /// Stop a node from answering sign requests.
    pub async fn take_offline(&mut self, index: u32) -> Result<()> {
        let node = self
            .nodes
            .get_mut(index as usize)
            .ok_or_else(|| anyhow!("no node {}", index))?;
        node.solicitor = None;
        if let Some(server) = node.server.take() {
            server.stop().context("stopping RPC server")?;
            server.stopped().await;
        }
        info!(index, "Node taken offline");
        Ok(())
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for node in &mut self.nodes {
            if let Some(server) = node.server.take() {
                let _ = server.stop();
            }
        }
    }
}

struct Wiring {
    index: u32,
    keypair: Keypair,
    slot: ResultSlot,
    signer: VrfSigner,
    pending: Arc<PendingSignatures>,
}

fn wiring(keys: Vec<Keypair>, n: u32) -> Vec<Wiring> {
    keys.into_iter()
        .enumerate()
        .map(|(index, keypair)| {
            let index = index as u32;
            let slot: ResultSlot = Arc::new(OnceLock::new());
            Wiring {
                index,
                keypair,
                signer: VrfSigner::new(index, slot.clone()),
                slot,
                pending: Arc::new(PendingSignatures::new(n)),
            }
        })
        .collect()
}

async fn direct_nodes(keys: Vec<Keypair>, n: u32) -> Result<Vec<ClusterNode>> {
    let listen: SocketAddr = ([127, 0, 0, 1], 0).into();

    let mut served = Vec::with_capacity(n as usize);
    let mut peers = Vec::with_capacity(n as usize);
    for wiring in wiring(keys, n) {
        let (inlet, inbox) = queue::channel(queue_capacity(n));
        let (addr, server) = rpc::serve(listen, inlet.clone(), Some(Arc::new(wiring.signer.clone())))
            .await
            .with_context(|| format!("starting RPC server for node {}", wiring.index))?;
        peers.push(Peer {
            index: wiring.index,
            endpoint: format!("http://{}", addr),
        });
        served.push((wiring, inlet, inbox, server));
    }

    let mut nodes = Vec::with_capacity(served.len());
    for (wiring, inlet, inbox, server) in served {
        let board = HttpBoard::new(wiring.index, &peers, inlet)?;
        board
            .wait_for_peers(LIVENESS_RETRIES, LIVENESS_INTERVAL)
            .await
            .with_context(|| format!("node {} cannot reach its peers", wiring.index))?;
        let solicitor = DirectSolicitor::new(board.peers().to_vec(), wiring.pending.clone());

        nodes.push(ClusterNode {
            index: wiring.index,
            keypair: wiring.keypair,
            slot: wiring.slot,
            signer: wiring.signer,
            pending: wiring.pending,
            board: Arc::new(board),
            inbox: Some(inbox),
            solicitor: Some(Arc::new(solicitor)),
            server: Some(server),
        });
    }
    Ok(nodes)
}

async fn broadcast_nodes(keys: Vec<Keypair>, n: u32) -> Result<Vec<ClusterNode>> {
    let hub = MemoryHub::new();

    let mut nodes = Vec::with_capacity(n as usize);
    let mut pubsubs = Vec::with_capacity(n as usize);
    for wiring in wiring(keys, n) {
        let pubsub = Arc::new(hub.join(format!("node-{}", wiring.index)));
        let (inlet, inbox) = queue::channel(queue_capacity(n));
        let board = PubSubBoard::new(pubsub.clone(), inlet);
        let solicitor = BroadcastSolicitor::new(pubsub.clone(), wiring.signer.clone(), wiring.pending.clone());
        pubsubs.push(pubsub);

        nodes.push(ClusterNode {
            index: wiring.index,
            keypair: wiring.keypair,
            slot: wiring.slot,
            signer: wiring.signer,
            pending: wiring.pending,
            board: Arc::new(board),
            inbox: Some(inbox),
            solicitor: Some(Arc::new(solicitor)),
            server: None,
        });
    }

    for pubsub in &pubsubs {
        wait_for_quorum(pubsub.as_ref(), DKG_TOPIC, n as usize - 1, LIVENESS_RETRIES, LIVENESS_INTERVAL)
            .await?;
    }
    Ok(nodes)
}
