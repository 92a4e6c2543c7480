//! DKG bundle definitions.
//!
//! Every node publishes exactly one [`DealBundle`] and one
//! [`ResponseBundle`] per session, and a [`JustificationBundle`] only when
//! one of its deals drew a complaint. Each bundle is authenticated by its
//! author over [`hash`](DealBundle::hash), which covers every field except
//! the signature itself.

use serde::{Deserialize, Serialize};

use crate::{G2Point, Scalar, Transcript};

/// An encrypted share destined to one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    /// Index of the recipient
    pub share_index: u32,
    /// Share encrypted to the recipient's long-term key
    pub encrypted_share: Vec<u8>,
}

/// A dealer's contribution: encrypted shares plus public commitments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealBundle {
    pub dealer_index: u32,
    pub deals: Vec<Deal>,
    /// Feldman commitments to the dealer's polynomial coefficients
    pub public: Vec<G2Point>,
    pub session_id: Vec<u8>,
    pub signature: Vec<u8>,
}

impl DealBundle {
    /// Canonical hash signed by the dealer.
    pub fn hash(&self) -> [u8; 32] {
        let mut transcript = Transcript::new(b"randnet-deal-bundle-v1");
        transcript.append_u32(self.dealer_index);
        transcript.append_u32(self.deals.len() as u32);
        for deal in &self.deals {
            transcript
                .append_u32(deal.share_index)
                .append_bytes(&deal.encrypted_share);
        }
        transcript.append_u32(self.public.len() as u32);
        for point in &self.public {
            transcript.append_bytes(&point.0);
        }
        transcript.append_bytes(&self.session_id);
        transcript.finalize()
    }
}

/// Verdict of a share holder on one dealer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Approved,
    Complaint,
}

impl Status {
    fn tag(self) -> u32 {
        match self {
            Status::Approved => 1,
            Status::Complaint => 0,
        }
    }
}

/// A share holder's verdict on a dealer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub dealer_index: u32,
    pub status: Status,
}

/// All verdicts of one share holder, one entry per dealer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBundle {
    pub share_index: u32,
    pub responses: Vec<Response>,
    pub session_id: Vec<u8>,
    pub signature: Vec<u8>,
}

impl ResponseBundle {
    /// Canonical hash signed by the share holder.
    pub fn hash(&self) -> [u8; 32] {
        let mut transcript = Transcript::new(b"randnet-response-bundle-v1");
        transcript.append_u32(self.share_index);
        transcript.append_u32(self.responses.len() as u32);
        for response in &self.responses {
            transcript
                .append_u32(response.dealer_index)
                .append_u32(response.status.tag());
        }
        transcript.append_bytes(&self.session_id);
        transcript.finalize()
    }

    /// Verdict given on a dealer, if any.
    pub fn status_for(&self, dealer_index: u32) -> Option<Status> {
        self.responses
            .iter()
            .find(|response| response.dealer_index == dealer_index)
            .map(|response| response.status)
    }
}

/// A share revealed in the clear to answer a complaint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    pub share_index: u32,
    pub share: Scalar,
}

/// A dealer's answer to every complaint raised against it.
///
/// Carries the dealer's commitments again, so a holder that never received
/// an authenticated copy of the deal can still check the revealed shares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JustificationBundle {
    pub dealer_index: u32,
    pub justifications: Vec<Justification>,
    pub public: Vec<G2Point>,
    pub session_id: Vec<u8>,
    pub signature: Vec<u8>,
}

impl JustificationBundle {
    /// Canonical hash signed by the dealer.
    pub fn hash(&self) -> [u8; 32] {
        let mut transcript = Transcript::new(b"randnet-justification-bundle-v1");
        transcript.append_u32(self.dealer_index);
        transcript.append_u32(self.justifications.len() as u32);
        for justification in &self.justifications {
            transcript
                .append_u32(justification.share_index)
                .append_bytes(&justification.share.0);
        }
        transcript.append_u32(self.public.len() as u32);
        for point in &self.public {
            transcript.append_bytes(&point.0);
        }
        transcript.append_bytes(&self.session_id);
        transcript.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_deal_bundle() -> DealBundle {
        DealBundle {
            dealer_index: 1,
            deals: vec![
                Deal {
                    share_index: 0,
                    encrypted_share: vec![1, 2, 3],
                },
                Deal {
                    share_index: 2,
                    encrypted_share: vec![4, 5, 6],
                },
            ],
            public: vec![G2Point([7u8; 96])],
            session_id: vec![9u8; 32],
            signature: vec![],
        }
    }

    #[test]
    fn test_hash_ignores_signature() {
        let bundle = sample_deal_bundle();
        let mut signed = bundle.clone();
        signed.signature = vec![42u8; 128];
        assert_eq!(bundle.hash(), signed.hash());
    }

    #[test]
    fn test_hash_covers_encrypted_shares() {
        let bundle = sample_deal_bundle();
        let mut tampered = bundle.clone();
        tampered.deals[1].encrypted_share[0] ^= 0x01;
        assert_ne!(bundle.hash(), tampered.hash());
    }

    #[test]
    fn test_response_hash_covers_status() {
        let approve = ResponseBundle {
            share_index: 0,
            responses: vec![Response {
                dealer_index: 1,
                status: Status::Approved,
            }],
            session_id: vec![1u8; 32],
            signature: vec![],
        };
        let mut complain = approve.clone();
        complain.responses[0].status = Status::Complaint;

        assert_ne!(approve.hash(), complain.hash());
        assert_eq!(complain.status_for(1), Some(Status::Complaint));
        assert_eq!(complain.status_for(2), None);
    }

    #[test]
    fn test_justification_hash_covers_commitments() {
        let bundle = JustificationBundle {
            dealer_index: 1,
            justifications: vec![Justification {
                share_index: 2,
                share: Scalar([3u8; 32]),
            }],
            public: vec![G2Point([7u8; 96])],
            session_id: vec![9u8; 32],
            signature: vec![],
        };
        let mut swapped = bundle.clone();
        swapped.public[0] = G2Point([8u8; 96]);
        assert_ne!(bundle.hash(), swapped.hash());
    }
}
