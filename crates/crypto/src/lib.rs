//! BLS12-381 primitives for the randomness network.
//!
//! This crate provides the building blocks used by the DKG and VRF layers:
//!
//! 1. **Keys and encodings**: long-term key pairs (x, x·G2), compressed point
//!    encodings and RFC 9380 hashing to G1.
//!
//! 2. **Share encryption**: hybrid encryption of a DKG share to a
//!    recipient's long-term key, bound to the session and both indices.
//!
//! 3. **Bundle authentication**: Schnorr signatures over G2 so every DKG
//!    bundle is attributable to its author.
//!
//! 4. **Threshold signatures**: partial BLS signatures σ_i = s_i · H(m),
//!    their verification against the public polynomial and Lagrange
//!    recovery of the group signature.

pub mod encryption;
pub mod error;
pub mod points;
pub mod schnorr;
pub mod threshold;

pub use encryption::{decrypt_share, encrypt_share};
pub use error::CryptoError;
pub use points::{
    compress_g1, compress_g2, decompress_g1, decompress_g2, hash_to_g1, random_scalar,
    scalar_from_bytes, scalar_to_bytes, Keypair,
};
pub use threshold::{
    eval_point, partial_sign, recover_secret, recover_signature, verify_partial,
    verify_signature, PriShare, PubPoly,
};

/// Re-exported curve types so downstream crates share one version.
pub use bls12_381::{G1Affine, G2Affine, G2Projective, Scalar};
