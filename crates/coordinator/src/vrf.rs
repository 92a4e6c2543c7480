//! Threshold VRF round.
//!
//! An initiator signs a payload with its share and solicits partial
//! signatures from the other nodes. Once `t` partials are collected for the
//! request id, they are combined into the group signature, verified against
//! the group key and hashed into the random output.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use randnet_board::SignRequestHandler;
use randnet_crypto::{partial_sign, recover_signature, verify_signature, CryptoError};
use randnet_dkg::DkgResult;
use randnet_types::{sha256, G1Point, PartialSignature, SigShare, SignRequest};

use crate::error::RoundError;
use crate::round::ResultSlot;

/// Signs requests with this node's share once key generation is done.
#[derive(Clone)]
pub struct VrfSigner {
    index: u32,
    slot: ResultSlot,
}

impl VrfSigner {
    pub fn new(index: u32, slot: ResultSlot) -> Self {
        Self { index, slot }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn result(&self) -> Result<&DkgResult, RoundError> {
        self.slot.get().ok_or(RoundError::RoundNotReady)
    }

    /// This node's partial signature over the request payload.
    pub fn partial_sign(&self, request: &SignRequest) -> Result<PartialSignature, RoundError> {
        let result = self.result()?;
        debug!(
            index = self.index,
            request_id = %request.request_id,
            "Signing VRF request"
        );
        Ok(PartialSignature {
            request_id: request.request_id.clone(),
            share: partial_sign(&result.share, &request.data),
        })
    }
}

#[async_trait]
impl SignRequestHandler for VrfSigner {
    async fn sign(&self, request: SignRequest) -> anyhow::Result<PartialSignature> {
        Ok(self.partial_sign(&request)?)
    }
}

struct Pending {
    shares: BTreeMap<u32, SigShare>,
    count: watch::Sender<usize>,
}

impl Pending {
    fn new() -> Self {
        Self {
            shares: BTreeMap::new(),
            count: watch::channel(0).0,
        }
    }
}

/// Partial signatures received so far, per request id.
///
/// The insert and the count notification happen under one lock, so a waiter
/// subscribed before the threshold is reached always sees it.
pub struct PendingSignatures {
    n: u32,
    requests: Mutex<HashMap<String, Pending>>,
}

impl PendingSignatures {
    /// Accept shares from signer indices in `[0, n)`.
    pub fn new(n: u32) -> Self {
        Self {
            n,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Record a share. Returns `false` for an out-of-range signer or one
    /// already recorded for this request.
    pub fn add(&self, request_id: &str, share: SigShare) -> bool {
        if share.index >= self.n {
            warn!(request_id, signer = share.index, "Share from unknown signer");
            return false;
        }

        let mut requests = self.requests.lock();
        let pending = requests
            .entry(request_id.to_string())
            .or_insert_with(Pending::new);
        if pending.shares.contains_key(&share.index) {
            debug!(request_id, signer = share.index, "Ignoring duplicate share");
            return false;
        }
        pending.shares.insert(share.index, share);
        pending.count.send_replace(pending.shares.len());
        debug!(
            request_id,
            signer = share.index,
            collected = pending.shares.len(),
            "Recorded partial signature"
        );
        true
    }

    pub fn count(&self, request_id: &str) -> usize {
        self.requests
            .lock()
            .get(request_id)
            .map_or(0, |pending| pending.shares.len())
    }

    /// Shares recorded for a request, ordered by signer index.
    pub fn shares(&self, request_id: &str) -> Vec<SigShare> {
        self.requests
            .lock()
            .get(request_id)
            .map(|pending| pending.shares.values().copied().collect())
            .unwrap_or_default()
    }

    /// Wait until at least `threshold` shares are recorded for the request.
    pub async fn wait_for(&self, request_id: &str, threshold: usize) -> Result<Vec<SigShare>, RoundError> {
        let mut count = {
            let mut requests = self.requests.lock();
            requests
                .entry(request_id.to_string())
                .or_insert_with(Pending::new)
                .count
                .subscribe()
        };
        count
            .wait_for(|collected| *collected >= threshold)
            .await
            .map_err(|_| RoundError::Aborted(format!("request {} dropped", request_id)))?;
        Ok(self.shares(request_id))
    }
}

/// Asks the other nodes for their partial signatures.
#[async_trait]
pub trait Solicitor: Send + Sync {
    /// Send the request out. Answers are recorded into the pending set as
    /// they arrive; this does not wait for them.
    async fn solicit(&self, request: &SignRequest) -> Result<(), RoundError>;
}

/// Outcome of a VRF round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfOutput {
    pub request_id: String,
    pub signature: G1Point,
    pub randomness: BigUint,
}

/// Runs VRF rounds on top of a completed DKG.
pub struct VrfService {
    signer: VrfSigner,
    pending: Arc<PendingSignatures>,
    solicitor: Arc<dyn Solicitor>,
}

impl VrfService {
    pub fn new(
        signer: VrfSigner,
        pending: Arc<PendingSignatures>,
        solicitor: Arc<dyn Solicitor>,
    ) -> Self {
        Self {
            signer,
            pending,
            solicitor,
        }
    }

    pub fn pending(&self) -> &Arc<PendingSignatures> {
        &self.pending
    }

    /// Sign locally, record our own share and solicit the others.
    pub async fn start(&self, request_id: &str, payload: &[u8]) -> Result<(), RoundError> {
        let request = SignRequest {
            request_id: request_id.to_string(),
            origin: Some(self.signer.index()),
            data: payload.to_vec(),
        };
        let own = self.signer.partial_sign(&request)?;
        self.pending.add(request_id, own.share);

        info!(request_id, initiator = self.signer.index(), "Started VRF round");
        self.solicitor.solicit(&request).await
    }

    /// Wait until `t` partial signatures are recorded.
    pub async fn collect(&self, request_id: &str) -> Result<Vec<SigShare>, RoundError> {
        let threshold = self.signer.result()?.threshold();
        let shares = self.pending.wait_for(request_id, threshold).await?;
        info!(request_id, collected = shares.len(), threshold, "Collected partial signatures");
        Ok(shares)
    }

    /// Combine the recorded shares into the group signature.
    pub fn recover(&self, request_id: &str, payload: &[u8]) -> Result<G1Point, RoundError> {
        let result = self.signer.result()?;
        let shares = self.pending.shares(request_id);
        let n = self.pending.n as usize;

        recover_signature(&result.poly, payload, &shares, result.threshold(), n).map_err(|e| match e {
            CryptoError::InsufficientShares { required, got } => {
                RoundError::InsufficientShares { required, got }
            }
            other => RoundError::RecoveryFailed(other.to_string()),
        })
    }

    /// Check a signature against the group public key.
    pub fn verify(&self, payload: &[u8], signature: &G1Point) -> Result<(), RoundError> {
        let result = self.signer.result()?;
        verify_signature(&result.public_key, payload, signature)
            .map_err(|e| RoundError::ValidationFailure(e.to_string()))
    }

    /// Run a whole round: start, collect, recover, verify, derive.
    pub async fn run(&self, request_id: &str, payload: &[u8]) -> Result<VrfOutput, RoundError> {
        self.start(request_id, payload).await?;
        self.collect(request_id).await?;
        let signature = self.recover(request_id, payload)?;
        self.verify(payload, &signature)?;
        let randomness = derive_randomness(&signature);
        info!(request_id, randomness = %randomness, "VRF round complete");
        Ok(VrfOutput {
            request_id: request_id.to_string(),
            signature,
            randomness,
        })
    }
}

/// SHA-256 of the signature bytes, read as a big-endian unsigned integer.
pub fn derive_randomness(signature: &G1Point) -> BigUint {
    BigUint::from_bytes_be(&sha256(&signature.0))
}

/// Payload and request id for the VRF of the next block:
/// `SHA-256(previous hash || next block number (u64 big-endian) || nonce)`,
/// with the hex of the payload as request id.
pub fn seed_payload(previous_hash: &[u8], block_number: u64, nonce: &[u8]) -> (String, Vec<u8>) {
    let mut input = Vec::with_capacity(previous_hash.len() + 8 + nonce.len());
    input.extend_from_slice(previous_hash);
    input.extend_from_slice(&block_number.to_be_bytes());
    input.extend_from_slice(nonce);
    let payload = sha256(&input).to_vec();
    (hex::encode(&payload), payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use randnet_crypto::{compress_g1, hash_to_g1};
    use std::sync::OnceLock;
    use std::time::Duration;

    fn share(index: u32) -> SigShare {
        SigShare {
            index,
            sig: compress_g1(&hash_to_g1(&index.to_be_bytes())),
        }
    }

    #[test]
    fn test_pending_ignores_duplicates_and_strangers() {
        let pending = PendingSignatures::new(3);
        assert!(pending.add("r", share(0)));
        assert!(!pending.add("r", share(0)));
        assert!(!pending.add("r", share(3)));
        assert!(pending.add("r", share(2)));
        assert_eq!(pending.count("r"), 2);
        assert_eq!(pending.count("other"), 0);

        let indices: Vec<u32> = pending.shares("r").iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_threshold() {
        let pending = Arc::new(PendingSignatures::new(3));
        let waiter = {
            let pending = pending.clone();
            tokio::spawn(async move { pending.wait_for("r", 2).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        pending.add("r", share(1));
        pending.add("r", share(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        pending.add("r", share(0));
        let shares = waiter.await.unwrap().unwrap();
        assert_eq!(shares.len(), 2);
    }

    #[tokio::test]
    async fn test_wait_for_already_met() {
        let pending = PendingSignatures::new(2);
        pending.add("r", share(0));
        pending.add("r", share(1));
        assert_eq!(pending.wait_for("r", 2).await.unwrap().len(), 2);
    }

    #[test]
    fn test_signer_not_ready() {
        let signer = VrfSigner::new(0, Arc::new(OnceLock::new()));
        let request = SignRequest {
            request_id: "r".into(),
            origin: None,
            data: vec![1],
        };
        assert_eq!(
            signer.partial_sign(&request).unwrap_err(),
            RoundError::RoundNotReady
        );
    }

    #[test]
    fn test_derive_randomness_is_deterministic() {
        let a = compress_g1(&hash_to_g1(b"a"));
        let b = compress_g1(&hash_to_g1(b"b"));
        assert_eq!(derive_randomness(&a), derive_randomness(&a));
        assert_ne!(derive_randomness(&a), derive_randomness(&b));
        assert_eq!(
            derive_randomness(&a),
            BigUint::from_bytes_be(&sha256(&a.0))
        );
    }

    #[test]
    fn test_seed_payload() {
        let (id, payload) = seed_payload(&[7u8; 32], 11, b"nonce");
        assert_eq!(payload.len(), 32);
        assert_eq!(id, hex::encode(&payload));

        let (other, _) = seed_payload(&[7u8; 32], 12, b"nonce");
        assert_ne!(id, other);
    }
}
