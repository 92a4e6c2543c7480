//! End-to-end integration tests for the randomness network.
//!
//! These tests exercise the full lifecycle:
//! 1. Distributed key generation over both transports
//! 2. Complaint and justification handling
//! 3. Threshold VRF rounds, recovery and verification
//! 4. Randomness derivation

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;

use randnet_board::{queue, queue_capacity, Board, BoardError, Bundle, Inbox, Inlet};
use randnet_coordinator::{DkgRound, PhaseTiming, ResultSlot, RoundError, RoundHandle};
use randnet_crypto::{schnorr, Keypair};
use randnet_dkg::{DkgConfig, DkgResult};
use randnet_types::{DealBundle, Node, Participants};

/// Rewrites a bundle on its way to one recipient.
pub type Tamper = Arc<dyn Fn(u32, &mut Bundle) + Send + Sync>;

/// In-memory board delivering straight into every node's inlet.
///
/// Every published bundle is also appended to a shared log, as sent.
pub struct LocalBoard {
    inlets: Arc<Vec<Inlet>>,
    tamper: Option<Tamper>,
    log: Arc<Mutex<Vec<Bundle>>>,
}

#[async_trait]
impl Board for LocalBoard {
    async fn publish(&self, bundle: Bundle) -> Result<(), BoardError> {
        self.log.lock().push(bundle.clone());
        for (to, inlet) in self.inlets.iter().enumerate() {
            let mut copy = bundle.clone();
            if let Some(tamper) = &self.tamper {
                tamper(to as u32, &mut copy);
            }
            if let Err(e) = inlet.deliver(copy).await {
                warn!(to, error = %e, "Local delivery failed");
            }
        }
        Ok(())
    }
}

/// A set of nodes wired through [`LocalBoard`]s.
pub struct LocalNetwork {
    pub keys: Vec<Keypair>,
    pub participants: Arc<Participants>,
    pub nonce: Vec<u8>,
    pub log: Arc<Mutex<Vec<Bundle>>>,
    inlets: Arc<Vec<Inlet>>,
    inboxes: Vec<Option<Inbox>>,
}

impl LocalNetwork {
    pub fn new(n: u32, threshold: u32) -> Self {
        let keys: Vec<Keypair> = (0..n).map(|_| Keypair::generate(&mut OsRng)).collect();
        let nodes = keys
            .iter()
            .enumerate()
            .map(|(index, key)| Node {
                index: index as u32,
                public: *key.public(),
            })
            .collect();
        let participants = Arc::new(Participants::new(nodes, threshold).unwrap());

        let mut nonce = vec![0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let (inlets, inboxes): (Vec<Inlet>, Vec<Option<Inbox>>) = (0..n)
            .map(|_| {
                let (inlet, inbox) = queue::channel(queue_capacity(n));
                (inlet, Some(inbox))
            })
            .unzip();

        Self {
            keys,
            participants,
            nonce,
            log: Arc::new(Mutex::new(Vec::new())),
            inlets: Arc::new(inlets),
            inboxes,
        }
    }

    /// A board publishing into this network, optionally tampering with what
    /// it sends.
    pub fn board(&self, tamper: Option<Tamper>) -> LocalBoard {
        LocalBoard {
            inlets: self.inlets.clone(),
            tamper,
            log: self.log.clone(),
        }
    }

    /// Start node `index`'s round.
    pub fn spawn(&mut self, index: u32, tamper: Option<Tamper>, timing: PhaseTiming) -> RoundHandle {
        let inbox = self.inboxes[index as usize].take().unwrap();
        let config = DkgConfig::new(
            self.keys[index as usize].clone(),
            self.participants.clone(),
            self.nonce.clone(),
        )
        .unwrap();
        let slot: ResultSlot = Arc::new(OnceLock::new());
        DkgRound::spawn(config, Arc::new(self.board(tamper)), inbox, timing, slot).unwrap()
    }

    /// Run every node's round, with `tamper(i)` applied to node `i`'s board.
    pub async fn run(
        &mut self,
        tamper: impl Fn(u32) -> Option<Tamper>,
    ) -> Vec<Result<DkgResult, RoundError>> {
        let handles: Vec<RoundHandle> = (0..self.participants.n())
            .map(|index| self.spawn(index, tamper(index), PhaseTiming::Quorum))
            .collect();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.wait_end().await);
        }
        results
    }

    pub fn logged(&self) -> Vec<Bundle> {
        self.log.lock().clone()
    }
}

/// Flip a byte of `dealer`'s encrypted share for `target`, on the copy
/// delivered to `target` only, and re-sign the bundle as the dealer.
pub fn corrupt_share_for(target: u32, dealer: Keypair) -> Tamper {
    Arc::new(move |to, bundle| {
        if to != target {
            return;
        }
        if let Bundle::Deal(deal) = bundle {
            flip_share(deal, target);
            deal.signature = schnorr::sign(dealer.secret(), &deal.hash(), &mut OsRng);
        }
    })
}

/// Flip the same byte without re-signing, as line noise would: the copy
/// `target` receives no longer authenticates.
pub fn garble_share_for(target: u32) -> Tamper {
    Arc::new(move |to, bundle| {
        if to != target {
            return;
        }
        if let Bundle::Deal(deal) = bundle {
            flip_share(deal, target);
        }
    })
}

fn flip_share(deal: &mut DealBundle, target: u32) {
    if let Some(entry) = deal.deals.iter_mut().find(|d| d.share_index == target) {
        entry.encrypted_share[100] ^= 0x01;
    }
}

/// Every `k`-element subset of `items`, in order.
pub fn subsets<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if items.len() < k {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (i, first) in items.iter().enumerate() {
        for mut rest in subsets(&items[i + 1..], k - 1) {
            rest.insert(0, first.clone());
            out.push(rest);
        }
    }
    out
}
