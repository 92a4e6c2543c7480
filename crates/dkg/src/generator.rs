//! Pedersen distributed key generator.
//!
//! One generator drives one session for one node:
//!
//! 1. [`deals`](DistKeyGenerator::deals): share a random polynomial,
//!    encrypting one share to every participant.
//! 2. [`process_deals`](DistKeyGenerator::process_deals): decrypt and check
//!    the shares addressed to this node, approve or complain per dealer.
//! 3. [`process_responses`](DistKeyGenerator::process_responses): certify,
//!    or reveal shares for complaints against this node's deal.
//! 4. [`process_justifications`](DistKeyGenerator::process_justifications):
//!    settle complaints and compute the result.

use std::collections::{BTreeMap, BTreeSet};

use bls12_381::Scalar;
use ff::Field;
use rand::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use randnet_crypto::{
    compress_g2, decompress_g2, decrypt_share, encrypt_share, scalar_from_bytes, scalar_to_bytes,
    schnorr, PriShare, PubPoly,
};
use randnet_types::{
    Deal, DealBundle, Justification, JustificationBundle, Participants, Response,
    ResponseBundle, Status,
};

use crate::error::DkgError;
use crate::feldman::{
    generate_commitments, generate_polynomial, share_for, sum_polynomials, verify_share,
};
use crate::types::{DkgConfig, DkgResult, ResponseOutcome};

/// Associated data binding an encrypted share to its session and route.
pub fn share_context(session_id: &[u8], dealer: u32, holder: u32) -> Vec<u8> {
    let mut context = Vec::with_capacity(session_id.len() + 8);
    context.extend_from_slice(session_id);
    context.extend_from_slice(&dealer.to_be_bytes());
    context.extend_from_slice(&holder.to_be_bytes());
    context
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fresh,
    Dealt,
    Responded,
    Justifying,
    Finished,
}

/// Distributed key generator state for one node and one session.
pub struct DistKeyGenerator {
    config: DkgConfig,
    index: u32,
    session_id: Vec<u8>,
    stage: Stage,
    /// Our secret polynomial coefficients
    polynomial: Vec<Scalar>,
    /// Public polynomials of dealers whose bundle passed structural checks
    dealers: BTreeMap<u32, PubPoly>,
    /// Dealers rejected after authenticating their bundle
    evicted: BTreeSet<u32>,
    /// Shares addressed to us that decrypted and verified
    shares: BTreeMap<u32, Scalar>,
    /// dealer -> holders that complained about it
    complaints: BTreeMap<u32, BTreeSet<u32>>,
    result: Option<DkgResult>,
}

impl DistKeyGenerator {
    pub fn new<R: RngCore + CryptoRng>(config: DkgConfig, rng: &mut R) -> Result<Self, DkgError> {
        let index = config.index()?;
        let session_id = config.session_id();
        let threshold = config.participants.threshold() as usize;
        Ok(Self {
            config,
            index,
            session_id,
            stage: Stage::Fresh,
            polynomial: generate_polynomial(threshold, rng),
            dealers: BTreeMap::new(),
            evicted: BTreeSet::new(),
            shares: BTreeMap::new(),
            complaints: BTreeMap::new(),
            result: None,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    pub fn participants(&self) -> &Participants {
        &self.config.participants
    }

    pub fn result(&self) -> Option<&DkgResult> {
        self.result.as_ref()
    }

    /// Dealers with an outstanding complaint after responses were processed.
    pub fn complained_dealers(&self) -> Vec<u32> {
        self.complaints.keys().copied().collect()
    }

    /// Produce this node's signed deal bundle. May only be called once.
    pub fn deals<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<DealBundle, DkgError> {
        if self.stage != Stage::Fresh {
            return Err(DkgError::AlreadyDealt);
        }

        let mut deals = Vec::with_capacity(self.config.participants.n() as usize);
        for node in self.config.participants.nodes() {
            let recipient = decompress_g2(&node.public)?;
            let share = share_for(&self.polynomial, node.index);
            let context = share_context(&self.session_id, self.index, node.index);
            deals.push(Deal {
                share_index: node.index,
                encrypted_share: encrypt_share(&recipient, &share, &context, rng)?,
            });
        }

        let public = generate_commitments(&self.polynomial)
            .iter()
            .map(compress_g2)
            .collect();

        let mut bundle = DealBundle {
            dealer_index: self.index,
            deals,
            public,
            session_id: self.session_id.clone(),
            signature: Vec::new(),
        };
        bundle.signature = schnorr::sign(self.config.keypair.secret(), &bundle.hash(), rng);

        self.stage = Stage::Dealt;
        debug!(dealer = self.index, "Generated deal bundle");
        Ok(bundle)
    }

    /// Validate received deals and produce this node's response bundle.
    ///
    /// Bundles failing structural checks evict their dealer; the first
    /// accepted bundle per dealer wins. Every participant dealer gets an
    /// entry: approved when a share for this node decrypted and verified,
    /// complaint otherwise.
    pub fn process_deals<R: RngCore + CryptoRng>(
        &mut self,
        bundles: &[DealBundle],
        rng: &mut R,
    ) -> Result<ResponseBundle, DkgError> {
        if self.stage != Stage::Dealt {
            return Err(DkgError::OutOfOrder("process_deals requires deals first"));
        }

        for bundle in bundles {
            let dealer = bundle.dealer_index;
            if self.dealers.contains_key(&dealer) || self.evicted.contains(&dealer) {
                debug!(dealer, "Ignoring repeated deal bundle");
                continue;
            }

            let poly = match self.check_deal(bundle) {
                Ok(poly) => poly,
                Err(DealRejection::Unattributable(reason)) => {
                    warn!(dealer, reason, "Dropping unauthenticated deal bundle");
                    continue;
                }
                Err(DealRejection::Evict(reason)) => {
                    warn!(dealer, reason, "Evicting dealer");
                    self.evicted.insert(dealer);
                    continue;
                }
            };

            match self.open_share(bundle, &poly) {
                Some(share) => {
                    self.shares.insert(dealer, share);
                }
                None => warn!(dealer, holder = self.index, "Share failed verification"),
            }
            self.dealers.insert(dealer, poly);
        }

        let responses = self
            .config
            .participants
            .indices()
            .map(|dealer| Response {
                dealer_index: dealer,
                status: if self.shares.contains_key(&dealer) {
                    Status::Approved
                } else {
                    Status::Complaint
                },
            })
            .collect();

        let mut bundle = ResponseBundle {
            share_index: self.index,
            responses,
            session_id: self.session_id.clone(),
            signature: Vec::new(),
        };
        bundle.signature = schnorr::sign(self.config.keypair.secret(), &bundle.hash(), rng);

        self.stage = Stage::Responded;
        info!(
            holder = self.index,
            dealers = self.dealers.len(),
            approved = self.shares.len(),
            "Processed deals"
        );
        Ok(bundle)
    }

    /// Tally responses and decide how the round continues.
    pub fn process_responses<R: RngCore + CryptoRng>(
        &mut self,
        bundles: &[ResponseBundle],
        rng: &mut R,
    ) -> Result<ResponseOutcome, DkgError> {
        if self.stage != Stage::Responded {
            return Err(DkgError::OutOfOrder("process_responses requires process_deals first"));
        }

        let mut valid: BTreeMap<u32, &ResponseBundle> = BTreeMap::new();
        for bundle in bundles {
            let holder = bundle.share_index;
            if valid.contains_key(&holder) {
                debug!(holder, "Ignoring repeated response bundle");
                continue;
            }
            if let Err(reason) = self.check_response(bundle) {
                warn!(holder, reason, "Dropping response bundle");
                continue;
            }
            valid.insert(holder, bundle);
        }

        if !valid.contains_key(&self.index) {
            self.stage = Stage::Finished;
            return Err(DkgError::Evicted("own response missing".into()));
        }

        let threshold = self.config.participants.threshold() as usize;
        if valid.len() < threshold {
            self.stage = Stage::Finished;
            return Err(DkgError::InsufficientResponses {
                required: threshold,
                got: valid.len(),
            });
        }

        // A dealer this node never validated already carries our own
        // complaint, so it has to justify before anyone can use its deal.
        for dealer in self.config.participants.indices() {
            if self.evicted.contains(&dealer) {
                continue;
            }
            let complainers: BTreeSet<u32> = valid
                .values()
                .filter(|response| response.status_for(dealer) != Some(Status::Approved))
                .map(|response| response.share_index)
                .collect();
            if !complainers.is_empty() {
                info!(
                    dealer,
                    complainers = ?complainers,
                    validated = self.dealers.contains_key(&dealer),
                    "Dealer drew complaints"
                );
                self.complaints.insert(dealer, complainers);
            }
        }

        if self.complaints.is_empty() {
            let qual: Vec<u32> = self.dealers.keys().copied().collect();
            let result = self.finish(qual)?;
            return Ok(ResponseOutcome::Certified(result));
        }

        self.stage = Stage::Justifying;

        match self.complaints.get(&self.index) {
            Some(complainers) => {
                let justifications = complainers
                    .iter()
                    .map(|holder| Justification {
                        share_index: *holder,
                        share: scalar_to_bytes(&share_for(&self.polynomial, *holder)),
                    })
                    .collect();

                let mut bundle = JustificationBundle {
                    dealer_index: self.index,
                    justifications,
                    public: generate_commitments(&self.polynomial)
                        .iter()
                        .map(compress_g2)
                        .collect(),
                    session_id: self.session_id.clone(),
                    signature: Vec::new(),
                };
                bundle.signature =
                    schnorr::sign(self.config.keypair.secret(), &bundle.hash(), rng);
                Ok(ResponseOutcome::Justify(bundle))
            }
            None => Ok(ResponseOutcome::AwaitJustifications),
        }
    }

    /// Settle complaints with the dealers' revealed shares.
    pub fn process_justifications(
        &mut self,
        bundles: &[JustificationBundle],
    ) -> Result<DkgResult, DkgError> {
        if self.stage != Stage::Justifying {
            return Err(DkgError::OutOfOrder(
                "process_justifications requires outstanding complaints",
            ));
        }

        let mut received: BTreeMap<u32, &JustificationBundle> = BTreeMap::new();
        for bundle in bundles {
            let dealer = bundle.dealer_index;
            if received.contains_key(&dealer) {
                debug!(dealer, "Ignoring repeated justification bundle");
                continue;
            }
            if !self.complaints.contains_key(&dealer) {
                debug!(dealer, "Ignoring justification from dealer without complaints");
                continue;
            }
            if let Err(reason) = self.check_justification(bundle) {
                warn!(dealer, reason, "Dropping justification bundle");
                continue;
            }
            received.insert(dealer, bundle);
        }

        let candidates: BTreeSet<u32> = self
            .dealers
            .keys()
            .chain(self.complaints.keys())
            .copied()
            .collect();

        let mut qual: Vec<u32> = Vec::new();
        for dealer in candidates {
            let Some(complainers) = self.complaints.get(&dealer) else {
                qual.push(dealer);
                continue;
            };

            let settled = received
                .get(&dealer)
                .and_then(|bundle| self.settle(bundle, complainers));

            match settled {
                Some((poly, shares)) => {
                    if let Some(share) = shares.get(&self.index) {
                        self.shares.insert(dealer, *share);
                    }
                    self.dealers.entry(dealer).or_insert(poly);
                    info!(dealer, "Complaints resolved");
                    qual.push(dealer);
                }
                None => {
                    warn!(dealer, "Dealer disqualified");
                    if dealer == self.index {
                        self.stage = Stage::Finished;
                        return Err(DkgError::Evicted("own deal disqualified".into()));
                    }
                }
            }
        }

        self.finish(qual)
    }

    fn finish(&mut self, qual: Vec<u32>) -> Result<DkgResult, DkgError> {
        self.stage = Stage::Finished;

        let threshold = self.config.participants.threshold() as usize;
        if qual.len() < threshold {
            return Err(DkgError::NotEnoughDealers {
                required: threshold,
                got: qual.len(),
            });
        }

        let mut value = Scalar::ZERO;
        for dealer in &qual {
            let share = self.shares.get(dealer).ok_or_else(|| {
                DkgError::Evicted(format!("no valid share from qualified dealer {}", dealer))
            })?;
            value += share;
        }

        let poly = sum_polynomials(qual.iter().filter_map(|dealer| self.dealers.get(dealer)))?;
        let public_key = compress_g2(&poly.public_key());

        let result = DkgResult {
            public_key,
            share: PriShare {
                index: self.index,
                value,
            },
            poly,
            qual,
        };
        info!(index = self.index, qual = ?result.qual, "Key generation certified");
        self.result = Some(result.clone());
        Ok(result)
    }

    /// Commitments and revealed shares of a justification, or `None` when
    /// it does not answer every complaint.
    ///
    /// The commitments must match the deal this node validated, if any;
    /// otherwise the ones carried by the justification are used.
    fn settle(
        &self,
        bundle: &JustificationBundle,
        complainers: &BTreeSet<u32>,
    ) -> Option<(PubPoly, BTreeMap<u32, Scalar>)> {
        let threshold = self.config.participants.threshold() as usize;
        if bundle.public.len() != threshold {
            return None;
        }
        let carried = PubPoly::from_commitments(&bundle.public).ok()?;
        let poly = match self.dealers.get(&bundle.dealer_index) {
            Some(known) if *known != carried => {
                warn!(dealer = bundle.dealer_index, "Justification commitments differ from deal");
                return None;
            }
            Some(known) => known.clone(),
            None => carried,
        };
        let shares = justified_shares(bundle, complainers, &poly)?;
        Some((poly, shares))
    }

    fn check_deal(&self, bundle: &DealBundle) -> Result<PubPoly, DealRejection> {
        let node = self
            .config
            .participants
            .node(bundle.dealer_index)
            .ok_or(DealRejection::Unattributable("unknown dealer"))?;
        let public =
            decompress_g2(&node.public).map_err(|_| DealRejection::Unattributable("bad key"))?;
        schnorr::verify(&public, &bundle.hash(), &bundle.signature)
            .map_err(|_| DealRejection::Unattributable("bad signature"))?;

        if bundle.session_id != self.session_id {
            return Err(DealRejection::Evict("session mismatch"));
        }
        if bundle.public.len() != self.config.participants.threshold() as usize {
            return Err(DealRejection::Evict("wrong commitment count"));
        }
        PubPoly::from_commitments(&bundle.public)
            .map_err(|_| DealRejection::Evict("undecodable commitment"))
    }

    fn open_share(&self, bundle: &DealBundle, poly: &PubPoly) -> Option<Scalar> {
        let deal = bundle
            .deals
            .iter()
            .find(|deal| deal.share_index == self.index)?;
        let context = share_context(&self.session_id, bundle.dealer_index, self.index);
        let share = decrypt_share(
            self.config.keypair.secret(),
            &deal.encrypted_share,
            &context,
        )
        .ok()?;
        verify_share(&share, self.index, poly).then_some(share)
    }

    fn check_response(&self, bundle: &ResponseBundle) -> Result<(), &'static str> {
        let node = self
            .config
            .participants
            .node(bundle.share_index)
            .ok_or("unknown holder")?;
        if bundle.session_id != self.session_id {
            return Err("session mismatch");
        }
        let public = decompress_g2(&node.public).map_err(|_| "bad key")?;
        schnorr::verify(&public, &bundle.hash(), &bundle.signature).map_err(|_| "bad signature")
    }

    fn check_justification(&self, bundle: &JustificationBundle) -> Result<(), &'static str> {
        let node = self
            .config
            .participants
            .node(bundle.dealer_index)
            .ok_or("unknown dealer")?;
        if bundle.session_id != self.session_id {
            return Err("session mismatch");
        }
        let public = decompress_g2(&node.public).map_err(|_| "bad key")?;
        schnorr::verify(&public, &bundle.hash(), &bundle.signature).map_err(|_| "bad signature")
    }
}

enum DealRejection {
    /// Not provably from the claimed dealer; dropped without eviction.
    Unattributable(&'static str),
    Evict(&'static str),
}

/// Revealed shares for every complainer, or `None` if any is missing or
/// fails verification.
fn justified_shares(
    bundle: &JustificationBundle,
    complainers: &BTreeSet<u32>,
    poly: &PubPoly,
) -> Option<BTreeMap<u32, Scalar>> {
    let mut shares = BTreeMap::new();
    for holder in complainers {
        let justification = bundle
            .justifications
            .iter()
            .find(|j| j.share_index == *holder)?;
        let share = scalar_from_bytes(&justification.share).ok()?;
        if !verify_share(&share, *holder, poly) {
            return None;
        }
        shares.insert(*holder, share);
    }
    Some(shares)
}
