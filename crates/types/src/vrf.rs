//! VRF round messages.

use serde::{Deserialize, Serialize};

use crate::G1Point;

/// A signature share: the signer's index and its partial signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigShare {
    pub index: u32,
    pub sig: G1Point,
}

impl SigShare {
    /// Encoded length: 4-byte big-endian index followed by a compressed G1 point.
    pub const ENCODED_LEN: usize = 4 + 48;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::ENCODED_LEN);
        bytes.extend_from_slice(&self.index.to_be_bytes());
        bytes.extend_from_slice(&self.sig.0);
        bytes
    }

    /// Split the wire form back into index and point bytes.
    ///
    /// Point validity is not checked here.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return None;
        }
        let index = u32::from_be_bytes(bytes[..4].try_into().ok()?);
        let sig = G1Point(bytes[4..].try_into().ok()?);
        Some(Self { index, sig })
    }
}

/// Request for a partial signature over `data`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub request_id: String,
    /// Index of the node that initiated the round, when known
    pub origin: Option<u32>,
    pub data: Vec<u8>,
}

/// A node's answer to a [`SignRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignature {
    pub request_id: String,
    pub share: SigShare,
}
