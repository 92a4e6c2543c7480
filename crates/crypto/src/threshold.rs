//! Threshold BLS signatures over the distributed key.
//!
//! In a (t, n) threshold scheme:
//! - n nodes each hold a secret share s_i = f(i + 1)
//! - Any t nodes can produce a signature under the group key f(0)·G2
//! - Fewer than t nodes learn nothing about f(0)
//!
//! # Partial Signature
//!
//! For message `m`, node i computes σ_i = s_i · H(m) in G1.
//!
//! A partial is checked against the public polynomial with
//! e(σ_i, G2) = e(H(m), P(i + 1)).
//!
//! # Recovery
//!
//! Given t valid partials, compute σ = Σ λ_i · σ_i where λ_i are Lagrange
//! coefficients at x = 0 over the evaluation points i + 1.

use bls12_381::{pairing, G1Projective, G2Affine, G2Projective, Scalar};
use ff::Field;
use group::Curve;
use std::collections::HashSet;

use randnet_types::{G1Point, G2Point, SigShare};

use crate::error::CryptoError;
use crate::points::{compress_g1, compress_g2, decompress_g1, decompress_g2, hash_to_g1};

/// A secret share held by one node.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PriShare {
    pub index: u32,
    pub value: Scalar,
}

impl std::fmt::Debug for PriShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriShare")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Evaluation point of share index `i`.
pub fn eval_point(index: u32) -> Scalar {
    Scalar::from(index as u64 + 1)
}

/// Public polynomial: commitments to coefficients in G2.
#[derive(Clone, Debug, PartialEq)]
pub struct PubPoly {
    commits: Vec<G2Affine>,
}

impl PubPoly {
    /// Decode a commitment vector. Rejects an empty vector or a bad point.
    pub fn from_commitments(commits: &[G2Point]) -> Result<Self, CryptoError> {
        if commits.is_empty() {
            return Err(CryptoError::EmptyCommitments);
        }
        let commits = commits
            .iter()
            .map(decompress_g2)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { commits })
    }

    pub fn from_points(commits: Vec<G2Affine>) -> Result<Self, CryptoError> {
        if commits.is_empty() {
            return Err(CryptoError::EmptyCommitments);
        }
        Ok(Self { commits })
    }

    /// Number of coefficients, which is also the reconstruction threshold.
    pub fn threshold(&self) -> usize {
        self.commits.len()
    }

    /// The committed constant term, f(0)·G2.
    pub fn public_key(&self) -> G2Affine {
        self.commits[0]
    }

    /// Public share of index `i`, f(i + 1)·G2, by Horner's method.
    pub fn eval(&self, index: u32) -> G2Affine {
        let x = eval_point(index);
        let mut acc = G2Projective::identity();
        for commit in self.commits.iter().rev() {
            acc = acc * x + G2Projective::from(*commit);
        }
        acc.to_affine()
    }

    pub fn commits(&self) -> &[G2Affine] {
        &self.commits
    }

    pub fn to_points(&self) -> Vec<G2Point> {
        self.commits.iter().map(compress_g2).collect()
    }
}

/// Produce a partial signature σ_i = s_i · H(m).
pub fn partial_sign(share: &PriShare, message: &[u8]) -> SigShare {
    let h = hash_to_g1(message);
    let sig = (G1Projective::from(h) * share.value).to_affine();
    SigShare {
        index: share.index,
        sig: compress_g1(&sig),
    }
}

/// Verify a partial signature against the public polynomial.
pub fn verify_partial(poly: &PubPoly, message: &[u8], share: &SigShare) -> Result<(), CryptoError> {
    let sig = decompress_g1(&share.sig)?;
    let h = hash_to_g1(message);
    let public_share = poly.eval(share.index);

    if pairing(&sig, &G2Affine::generator()) == pairing(&h, &public_share) {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerificationFailed)
    }
}

/// Recover the full signature from partial signatures.
///
/// Shares with an index outside `[0, n)` or a repeated index are skipped.
/// Fails with `InsufficientShares` when fewer than `threshold` distinct
/// indices were supplied, and with `NotEnoughValidShares` when fewer than
/// `threshold` of them verify.
pub fn recover_signature(
    poly: &PubPoly,
    message: &[u8],
    shares: &[SigShare],
    threshold: usize,
    n: usize,
) -> Result<G1Point, CryptoError> {
    let mut seen = HashSet::new();
    let distinct: Vec<&SigShare> = shares
        .iter()
        .filter(|s| (s.index as usize) < n && seen.insert(s.index))
        .collect();

    if distinct.len() < threshold {
        return Err(CryptoError::InsufficientShares {
            required: threshold,
            got: distinct.len(),
        });
    }

    let mut valid = Vec::with_capacity(threshold);
    for share in distinct {
        if verify_partial(poly, message, share).is_ok() {
            valid.push(share);
            if valid.len() == threshold {
                break;
            }
        }
    }

    if valid.len() < threshold {
        return Err(CryptoError::NotEnoughValidShares {
            required: threshold,
            valid: valid.len(),
        });
    }

    let xs: Vec<Scalar> = valid.iter().map(|s| eval_point(s.index)).collect();

    let mut result = G1Projective::identity();
    for (share, x) in valid.iter().zip(xs.iter()) {
        let sig = decompress_g1(&share.sig)?;
        let lambda = lagrange_coefficient(x, &xs)?;
        result += G1Projective::from(sig) * lambda;
    }

    Ok(compress_g1(&result.to_affine()))
}

/// Verify a recovered signature against the group public key.
pub fn verify_signature(
    public_key: &G2Point,
    message: &[u8],
    signature: &G1Point,
) -> Result<(), CryptoError> {
    let pk = decompress_g2(public_key)?;
    let sig = decompress_g1(signature)?;
    let h = hash_to_g1(message);

    if pairing(&sig, &G2Affine::generator()) == pairing(&h, &pk) {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerificationFailed)
    }
}

/// Interpolate the secret f(0) from `threshold` private shares.
pub fn recover_secret(shares: &[PriShare], threshold: usize) -> Result<Scalar, CryptoError> {
    let mut seen = HashSet::new();
    let distinct: Vec<&PriShare> = shares
        .iter()
        .filter(|s| seen.insert(s.index))
        .take(threshold)
        .collect();

    if distinct.len() < threshold {
        return Err(CryptoError::InsufficientShares {
            required: threshold,
            got: distinct.len(),
        });
    }

    let xs: Vec<Scalar> = distinct.iter().map(|s| eval_point(s.index)).collect();
    let mut secret = Scalar::ZERO;
    for (share, x) in distinct.iter().zip(xs.iter()) {
        secret += share.value * lagrange_coefficient(x, &xs)?;
    }
    Ok(secret)
}

/// Lagrange coefficient at x = 0 for evaluation point `x_i`.
///
/// λ_i = Π_{j≠i} (x_j / (x_j - x_i))
pub fn lagrange_coefficient(x_i: &Scalar, xs: &[Scalar]) -> Result<Scalar, CryptoError> {
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;

    for x_j in xs {
        if x_j == x_i {
            continue;
        }
        numerator *= x_j;
        denominator *= x_j - x_i;
    }

    Option::from(denominator.invert())
        .map(|inv: Scalar| numerator * inv)
        .ok_or(CryptoError::LagrangeInterpolationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::random_scalar;
    use rand::rngs::OsRng;

    /// Shamir-share a random secret with degree `t - 1`.
    fn deal(t: usize, n: u32) -> (Scalar, PubPoly, Vec<PriShare>) {
        let coeffs: Vec<Scalar> = (0..t).map(|_| random_scalar(&mut OsRng)).collect();
        let commits = coeffs
            .iter()
            .map(|c| (G2Projective::generator() * c).to_affine())
            .collect();
        let shares = (0..n)
            .map(|i| {
                let x = eval_point(i);
                let value = coeffs
                    .iter()
                    .rev()
                    .fold(Scalar::ZERO, |acc, c| acc * x + c);
                PriShare { index: i, value }
            })
            .collect();
        (coeffs[0], PubPoly::from_points(commits).unwrap(), shares)
    }

    #[test]
    fn test_lagrange_coefficients_sum_to_one() {
        let xs = vec![eval_point(0), eval_point(1), eval_point(2)];
        let sum = xs
            .iter()
            .map(|x| lagrange_coefficient(x, &xs).unwrap())
            .fold(Scalar::ZERO, |acc, l| acc + l);
        assert_eq!(sum, Scalar::ONE);
    }

    #[test]
    fn test_pub_poly_eval_matches_shares() {
        let (_, poly, shares) = deal(3, 5);
        for share in &shares {
            let expected = (G2Projective::generator() * share.value).to_affine();
            assert_eq!(poly.eval(share.index), expected);
        }
    }

    #[test]
    fn test_partial_signature_verifies() {
        let (_, poly, shares) = deal(2, 3);
        let partial = partial_sign(&shares[1], b"seed");
        assert_eq!(partial.index, 1);
        assert!(verify_partial(&poly, b"seed", &partial).is_ok());
        assert!(verify_partial(&poly, b"other", &partial).is_err());
    }

    #[test]
    fn test_partial_with_wrong_index_fails() {
        let (_, poly, shares) = deal(2, 3);
        let mut partial = partial_sign(&shares[1], b"seed");
        partial.index = 2;
        assert!(verify_partial(&poly, b"seed", &partial).is_err());
    }

    #[test]
    fn test_recover_matches_direct_signature() {
        let (secret, poly, shares) = deal(3, 5);
        let msg = b"block 42";

        let partials: Vec<SigShare> = shares.iter().map(|s| partial_sign(s, msg)).collect();

        let first = recover_signature(&poly, msg, &partials[..3], 3, 5).unwrap();
        let last = recover_signature(&poly, msg, &partials[2..], 3, 5).unwrap();
        assert_eq!(first, last);

        let direct = (G1Projective::from(hash_to_g1(msg)) * secret).to_affine();
        assert_eq!(first, compress_g1(&direct));

        let pk = compress_g2(&poly.public_key());
        assert!(verify_signature(&pk, msg, &first).is_ok());
        assert!(verify_signature(&pk, b"other", &first).is_err());
    }

    #[test]
    fn test_recover_skips_invalid_partials() {
        let (_, poly, shares) = deal(2, 4);
        let msg = b"m";

        let mut partials: Vec<SigShare> = shares.iter().map(|s| partial_sign(s, msg)).collect();
        partials[0] = partial_sign(&shares[0], b"not m");

        let sig = recover_signature(&poly, msg, &partials, 2, 4).unwrap();
        let pk = compress_g2(&poly.public_key());
        assert!(verify_signature(&pk, msg, &sig).is_ok());
    }

    #[test]
    fn test_recover_insufficient_distinct_shares() {
        let (_, poly, shares) = deal(3, 4);
        let p = partial_sign(&shares[0], b"m");
        let q = partial_sign(&shares[1], b"m");

        let result = recover_signature(&poly, b"m", &[p, p, q], 3, 4);
        assert_eq!(
            result,
            Err(CryptoError::InsufficientShares {
                required: 3,
                got: 2
            })
        );
    }

    #[test]
    fn test_recover_not_enough_valid() {
        let (_, poly, shares) = deal(2, 3);
        let good = partial_sign(&shares[0], b"m");
        let bad = partial_sign(&shares[1], b"x");

        let result = recover_signature(&poly, b"m", &[good, bad], 2, 3);
        assert_eq!(
            result,
            Err(CryptoError::NotEnoughValidShares {
                required: 2,
                valid: 1
            })
        );
    }

    #[test]
    fn test_recover_secret() {
        let (secret, _, shares) = deal(3, 5);
        assert_eq!(recover_secret(&shares[1..4], 3).unwrap(), secret);
        assert!(recover_secret(&shares[..2], 3).is_err());
    }

    #[test]
    fn test_empty_commitments_rejected() {
        assert_eq!(
            PubPoly::from_commitments(&[]),
            Err(CryptoError::EmptyCommitments)
        );
    }
}
