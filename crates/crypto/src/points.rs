//! Point and scalar encodings, hashing to G1 and long-term key pairs.

use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use group::Curve;
use rand::{CryptoRng, RngCore};
use sha2_09::Sha256;

use randnet_types::{G1Point, G2Point, Scalar as TypesScalar};

use crate::error::CryptoError;

/// Domain separation tag for hashing signed messages to G1.
pub const SIGNATURE_DST: &[u8] = b"RANDNET-V01-CS01-with-BLS12381G1_XMD:SHA-256_SSWU_RO_";

/// Hash arbitrary data to a G1 point (RFC 9380, `expand_message_xmd` with SHA-256).
pub fn hash_to_g1(data: &[u8]) -> G1Affine {
    <G1Projective as HashToCurve<ExpandMsgXmd<Sha256>>>::hash_to_curve(data, SIGNATURE_DST)
        .to_affine()
}

/// Generate a random scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_wide(&bytes)
}

/// Compress a G1 point to bytes.
pub fn compress_g1(point: &G1Affine) -> G1Point {
    G1Point(point.to_compressed())
}

/// Decompress a G1 point from bytes.
pub fn decompress_g1(point: &G1Point) -> Result<G1Affine, CryptoError> {
    Option::from(G1Affine::from_compressed(&point.0)).ok_or(CryptoError::InvalidG1Point)
}

/// Compress a G2 point to bytes.
pub fn compress_g2(point: &G2Affine) -> G2Point {
    G2Point(point.to_compressed())
}

/// Decompress a G2 point from bytes.
pub fn decompress_g2(point: &G2Point) -> Result<G2Affine, CryptoError> {
    Option::from(G2Affine::from_compressed(&point.0)).ok_or(CryptoError::InvalidG2Point)
}

/// Decompress a G2 point from an unsized slice.
pub fn g2_from_slice(bytes: &[u8]) -> Result<G2Affine, CryptoError> {
    let bytes: [u8; 96] = bytes.try_into().map_err(|_| CryptoError::InvalidG2Point)?;
    decompress_g2(&G2Point(bytes))
}

pub fn scalar_to_bytes(scalar: &Scalar) -> TypesScalar {
    TypesScalar(scalar.to_bytes())
}

/// Decode a canonical scalar encoding.
pub fn scalar_from_bytes(scalar: &TypesScalar) -> Result<Scalar, CryptoError> {
    Option::from(Scalar::from_bytes(&scalar.0)).ok_or(CryptoError::InvalidScalar)
}

/// A node's long-term key pair (x, x·G2).
#[derive(Clone)]
pub struct Keypair {
    secret: Scalar,
    public: G2Point,
}

impl Keypair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(random_scalar(rng))
    }

    pub fn from_secret(secret: Scalar) -> Self {
        let public = compress_g2(&(G2Projective::generator() * secret).to_affine());
        Self { secret, public }
    }

    /// Restore a key pair from its 32-byte secret encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidScalar)?;
        Ok(Self::from_secret(scalar_from_bytes(&TypesScalar(bytes))?))
    }

    pub fn secret(&self) -> &Scalar {
        &self.secret
    }

    pub fn public(&self) -> &G2Point {
        &self.public
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public.0))
            .finish_non_exhaustive()
    }
}
