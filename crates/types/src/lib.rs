//! Core type definitions for the randomness network.
//!
//! This crate provides the shared data structures used across the workspace:
//! compressed curve points, the fixed participant list, the three DKG bundle
//! kinds exchanged during key generation, and the signing request/response
//! pair of a VRF round.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub mod bundle;
pub mod vrf;

pub use bundle::{
    Deal, DealBundle, Justification, JustificationBundle, Response, ResponseBundle, Status,
};
pub use vrf::{PartialSignature, SigShare, SignRequest};

// =========================
// CRYPTOGRAPHIC PRIMITIVES
// =========================

/// Compressed G1 point on BLS12-381 (48 bytes)
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct G1Point(#[serde_as(as = "[_; 48]")] pub [u8; 48]);

impl Default for G1Point {
    fn default() -> Self {
        Self([0u8; 48])
    }
}

/// Compressed G2 point on BLS12-381 (96 bytes)
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct G2Point(#[serde_as(as = "[_; 96]")] pub [u8; 96]);

impl Default for G2Point {
    fn default() -> Self {
        Self([0u8; 96])
    }
}

/// Scalar field element (32 bytes, little-endian)
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scalar(#[serde_as(as = "[_; 32]")] pub [u8; 32]);

impl Default for Scalar {
    fn default() -> Self {
        Self([0u8; 32])
    }
}

// =========================
// PARTICIPANTS
// =========================

/// Errors raised while assembling the participant configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("Threshold {t} out of range for {n} participants")]
    InvalidThreshold { t: u32, n: u32 },

    #[error("Participant index {0} out of range")]
    IndexOutOfRange(u32),

    #[error("Duplicate participant index {0}")]
    DuplicateIndex(u32),

    #[error("Duplicate participant public key at index {0}")]
    DuplicateKey(u32),
}

/// Threshold parameters: `t` of `n` participants are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    n: u32,
    t: u32,
}

impl ThresholdParams {
    /// Create threshold parameters, enforcing `1 <= t <= n`.
    pub fn new(n: u32, t: u32) -> Result<Self, ParamsError> {
        if t == 0 || t > n {
            return Err(ParamsError::InvalidThreshold { t, n });
        }
        Ok(Self { n, t })
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn t(&self) -> u32 {
        self.t
    }
}

/// A participant of the network: its index and long-term public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Position in the participant list, in `[0, n)`
    pub index: u32,
    /// Long-term public key (x·G2)
    pub public: G2Point,
}

/// The fixed participant list shared by every node of a session.
///
/// Built once at startup and shared behind an `Arc`; never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participants {
    nodes: Vec<Node>,
    params: ThresholdParams,
}

impl Participants {
    /// Validate and sort the node list.
    ///
    /// Indices must be unique and cover `[0, n)` exactly.
    pub fn new(mut nodes: Vec<Node>, threshold: u32) -> Result<Self, ParamsError> {
        let params = ThresholdParams::new(nodes.len() as u32, threshold)?;
        nodes.sort_by_key(|node| node.index);

        for (position, node) in nodes.iter().enumerate() {
            if node.index >= params.n() {
                return Err(ParamsError::IndexOutOfRange(node.index));
            }
            if node.index != position as u32 {
                return Err(ParamsError::DuplicateIndex(node.index));
            }
            if nodes[..position].iter().any(|other| other.public == node.public) {
                return Err(ParamsError::DuplicateKey(node.index));
            }
        }

        Ok(Self { nodes, params })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn params(&self) -> ThresholdParams {
        self.params
    }

    /// Number of participants.
    pub fn n(&self) -> u32 {
        self.params.n()
    }

    /// Minimum number of contributions needed.
    pub fn threshold(&self) -> u32 {
        self.params.t()
    }

    pub fn node(&self, index: u32) -> Option<&Node> {
        self.nodes.get(index as usize)
    }

    pub fn contains(&self, index: u32) -> bool {
        index < self.n()
    }

    /// Find the index of the node holding the given long-term key.
    pub fn index_of(&self, public: &G2Point) -> Option<u32> {
        self.nodes
            .iter()
            .find(|node| &node.public == public)
            .map(|node| node.index)
    }

    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.iter().map(|node| node.index)
    }
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Domain-separated SHA-256 transcript used for canonical hashing.
///
/// Variable-length fields are length-prefixed so distinct field layouts
/// never collide.
pub struct Transcript(Sha256);

impl Transcript {
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self(hasher)
    }

    pub fn append_u32(&mut self, value: u32) -> &mut Self {
        self.0.update(value.to_be_bytes());
        self
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update((bytes.len() as u64).to_be_bytes());
        self.0.update(bytes);
        self
    }

    pub fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(index: u32, tag: u8) -> Node {
        Node {
            index,
            public: G2Point([tag; 96]),
        }
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(ThresholdParams::new(3, 0).is_err());
        assert!(ThresholdParams::new(3, 4).is_err());
        assert_eq!(ThresholdParams::new(3, 3).unwrap().t(), 3);
        assert_eq!(ThresholdParams::new(1, 1).unwrap().n(), 1);
    }

    #[test]
    fn test_participants_sorted_and_indexed() {
        let participants =
            Participants::new(vec![node(2, 3), node(0, 1), node(1, 2)], 2).unwrap();

        let indices: Vec<u32> = participants.indices().collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(participants.index_of(&G2Point([2; 96])), Some(1));
        assert_eq!(participants.index_of(&G2Point([9; 96])), None);
        assert!(participants.contains(2));
        assert!(!participants.contains(3));
    }

    #[test]
    fn test_participants_rejects_gaps_and_duplicates() {
        assert_eq!(
            Participants::new(vec![node(0, 1), node(2, 2)], 1),
            Err(ParamsError::IndexOutOfRange(2))
        );
        assert_eq!(
            Participants::new(vec![node(0, 1), node(0, 2)], 1),
            Err(ParamsError::DuplicateIndex(0))
        );
        assert_eq!(
            Participants::new(vec![node(0, 1), node(1, 1)], 1),
            Err(ParamsError::DuplicateKey(1))
        );
    }

    #[test]
    fn test_transcript_length_prefix() {
        let mut a = Transcript::new(b"test");
        a.append_bytes(b"ab").append_bytes(b"c");
        let mut b = Transcript::new(b"test");
        b.append_bytes(b"a").append_bytes(b"bc");
        assert_ne!(a.finalize(), b.finalize());
    }
}
