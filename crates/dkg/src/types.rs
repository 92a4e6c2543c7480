//! DKG type definitions.

use std::sync::Arc;

use randnet_crypto::{Keypair, PriShare, PubPoly};
use randnet_types::{G2Point, JustificationBundle, Participants, Transcript};

use crate::error::DkgError;

/// DKG configuration.
#[derive(Debug, Clone)]
pub struct DkgConfig {
    /// This node's long-term key pair
    pub keypair: Keypair,
    /// Fixed participant list with the threshold
    pub participants: Arc<Participants>,
    /// Shared nonce distinguishing sessions over the same participants
    pub nonce: Vec<u8>,
}

impl DkgConfig {
    pub fn new(
        keypair: Keypair,
        participants: Arc<Participants>,
        nonce: Vec<u8>,
    ) -> Result<Self, DkgError> {
        if participants.index_of(keypair.public()).is_none() {
            return Err(DkgError::NotParticipant);
        }
        Ok(Self {
            keypair,
            participants,
            nonce,
        })
    }

    /// This node's index in the participant list.
    pub fn index(&self) -> Result<u32, DkgError> {
        self.participants
            .index_of(self.keypair.public())
            .ok_or(DkgError::NotParticipant)
    }

    pub fn session_id(&self) -> Vec<u8> {
        session_id(&self.participants, &self.nonce).to_vec()
    }
}

/// Session identifier: binds the nonce, the threshold and every participant.
pub fn session_id(participants: &Participants, nonce: &[u8]) -> [u8; 32] {
    let mut transcript = Transcript::new(b"randnet-dkg-session-v1");
    transcript
        .append_bytes(nonce)
        .append_u32(participants.threshold());
    for node in participants.nodes() {
        transcript.append_u32(node.index).append_bytes(&node.public.0);
    }
    transcript.finalize()
}

/// Output of DKG for a participant.
#[derive(Debug, Clone, PartialEq)]
pub struct DkgResult {
    /// Group public key, f(0)·G2
    pub public_key: G2Point,
    /// This participant's share of the group secret
    pub share: PriShare,
    /// Public polynomial of the group secret
    pub poly: PubPoly,
    /// Dealers whose contribution made it into the key
    pub qual: Vec<u32>,
}

impl DkgResult {
    pub fn threshold(&self) -> usize {
        self.poly.threshold()
    }
}

/// What to do after responses have been processed.
#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    /// No outstanding complaint; the round is done.
    Certified(DkgResult),
    /// This node's deal drew complaints; publish the bundle, then await
    /// justifications.
    Justify(JustificationBundle),
    /// Other dealers must justify before the round can finish.
    AwaitJustifications,
}
