//! Node runner and in-process simulation.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use randnet_board::{queue, queue_capacity, rpc, HttpBoard};
use randnet_coordinator::{
    seed_payload, DirectSolicitor, DkgRound, PendingSignatures, PhaseTiming, ResultSlot,
    VrfOutput, VrfService, VrfSigner,
};
use randnet_crypto::Keypair;
use randnet_dkg::DkgConfig;

use crate::cluster::{Cluster, Transport};
use crate::config::NetworkConfig;

/// Pause before the initiator starts the VRF round, so slower peers have
/// finished their own key generation.
const VRF_START_DELAY: Duration = Duration::from_secs(2);

/// Hash of the block preceding the first VRF round.
const GENESIS_HASH: [u8; 32] = [0u8; 32];

pub struct NodeOptions {
    pub config: NetworkConfig,
    pub index: u32,
    pub keypair: Keypair,
    pub listen: SocketAddr,
}

/// Run one node of a networked deployment until interrupted.
pub async fn run(options: NodeOptions) -> Result<()> {
    let NodeOptions {
        config,
        index,
        keypair,
        listen,
    } = options;

    let participants = Arc::new(config.participants()?);
    if participants.index_of(keypair.public()) != Some(index) {
        bail!("key does not belong to node {}", index);
    }
    let n = participants.n();

    let (inlet, inbox) = queue::channel(queue_capacity(n));
    let slot: ResultSlot = Arc::new(OnceLock::new());
    let signer = VrfSigner::new(index, slot.clone());
    let pending = Arc::new(PendingSignatures::new(n));

    let (addr, server) = rpc::serve(listen, inlet.clone(), Some(Arc::new(signer.clone())))
        .await
        .context("starting RPC server")?;
    info!(index, %addr, "Node started");

    let board = HttpBoard::new(index, &config.peers(), inlet)?;
    info!(index, peers = board.peers().len(), "Waiting for peers");
    board
        .wait_for_peers(config.liveness.retries, config.liveness.interval())
        .await
        .context("peers unreachable")?;
    let solicitor = DirectSolicitor::new(board.peers().to_vec(), pending.clone());

    let dkg_config = DkgConfig::new(keypair, participants, config.nonce()?)?;
    let handle = DkgRound::spawn(
        dkg_config,
        Arc::new(board),
        inbox,
        config.timing.phase_timing(),
        slot,
    )?;
    let result = handle.wait_end().await.context("DKG round failed")?;
    info!(
        index,
        public_key = %hex::encode(result.public_key.0),
        qualified = ?result.qual,
        "Group key established"
    );

    if index == config.initiator {
        tokio::time::sleep(VRF_START_DELAY).await;

        let service = VrfService::new(signer, pending, Arc::new(solicitor));
        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);
        let (request_id, payload) = seed_payload(&GENESIS_HASH, 1, &nonce);

        let output = service
            .run(&request_id, &payload)
            .await
            .context("VRF round failed")?;
        log_output(&output);
    }

    info!(index, "Serving until interrupted");
    tokio::signal::ctrl_c().await?;
    server.stop()?;
    server.stopped().await;
    Ok(())
}

/// Run key generation and one VRF round on `n` nodes in this process.
pub async fn simulate(n: u32, threshold: u32, transport: Transport, timing: PhaseTiming) -> Result<VrfOutput> {
    let mut cluster = Cluster::start(n, threshold, transport, timing).await?;

    let results = cluster
        .run_dkg()
        .await?
        .into_iter()
        .enumerate()
        .map(|(index, result)| result.with_context(|| format!("node {} failed", index)))
        .collect::<Result<Vec<_>>>()?;

    let group_key = results
        .first()
        .map(|result| result.public_key)
        .ok_or_else(|| anyhow!("no nodes"))?;
    if results.iter().any(|result| result.public_key != group_key) {
        bail!("nodes disagree on the group key");
    }
    info!(public_key = %hex::encode(group_key.0), "All nodes agree on the group key");

    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);
    let (request_id, payload) = seed_payload(&GENESIS_HASH, 1, &nonce);
    let output = cluster.vrf(0)?.run(&request_id, &payload).await?;
    log_output(&output);
    Ok(output)
}

fn log_output(output: &VrfOutput) {
    info!(
        request_id = %output.request_id,
        signature = %hex::encode(output.signature.0),
        randomness = %output.randomness,
        "Random number generated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulate_broadcast() {
        let output = simulate(3, 2, Transport::Broadcast, PhaseTiming::Quorum)
            .await
            .unwrap();
        assert_eq!(output.request_id.len(), 64);
    }

    #[tokio::test]
    async fn test_simulate_direct() {
        let output = simulate(4, 3, Transport::Direct, PhaseTiming::Quorum)
            .await
            .unwrap();
        assert!(output.randomness > 0u32.into());
    }
}
