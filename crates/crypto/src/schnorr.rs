//! Schnorr signatures over G2, used to authenticate DKG bundles with the
//! author's long-term key.
//!
//! Signing with secret x (public X = x·G2):
//! R = k·G2, c = H(R, X, m), s = k + c·x. The signature is `R || s`.
//!
//! Verification checks s·G2 = R + c·X.

use bls12_381::{G2Affine, G2Projective, Scalar};
use group::Curve;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use randnet_types::Scalar as TypesScalar;

use crate::error::CryptoError;
use crate::points::{g2_from_slice, random_scalar, scalar_from_bytes};

/// Length of an encoded signature.
pub const SIGNATURE_LEN: usize = 96 + 32;

/// Sign a message with a long-term secret.
pub fn sign<R: RngCore + CryptoRng>(secret: &Scalar, message: &[u8], rng: &mut R) -> Vec<u8> {
    let public = (G2Projective::generator() * secret).to_affine();

    let k = random_scalar(rng);
    let r = (G2Projective::generator() * k).to_affine();

    let c = challenge(&r, &public, message);
    let s = k + c * secret;

    let mut signature = Vec::with_capacity(SIGNATURE_LEN);
    signature.extend_from_slice(&r.to_compressed());
    signature.extend_from_slice(&s.to_bytes());
    signature
}

/// Verify a signature against a long-term public key.
pub fn verify(public: &G2Affine, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::InvalidSignatureFormat);
    }

    let r = g2_from_slice(&signature[..96])?;
    let s_bytes: [u8; 32] = signature[96..]
        .try_into()
        .map_err(|_| CryptoError::InvalidSignatureFormat)?;
    let s = scalar_from_bytes(&TypesScalar(s_bytes))?;

    let c = challenge(&r, public, message);

    let lhs = G2Projective::generator() * s;
    let rhs = G2Projective::from(r) + G2Projective::from(*public) * c;

    if lhs == rhs {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerificationFailed)
    }
}

/// Fiat-Shamir challenge c = H(R, X, m) reduced into the scalar field.
fn challenge(r: &G2Affine, public: &G2Affine, message: &[u8]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(b"randnet-schnorr-g2-v1");
    hasher.update(r.to_compressed());
    hasher.update(public.to_compressed());
    hasher.update(message);
    let hash = hasher.finalize();

    let mut wide = [0u8; 64];
    wide[..32].copy_from_slice(&hash);
    Scalar::from_bytes_wide(&wide)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::{decompress_g2, Keypair};
    use rand::rngs::OsRng;

    #[test]
    fn test_sign_verify() {
        let keypair = Keypair::generate(&mut OsRng);
        let public = decompress_g2(keypair.public()).unwrap();

        let signature = sign(keypair.secret(), b"bundle hash", &mut OsRng);
        assert_eq!(signature.len(), SIGNATURE_LEN);
        assert!(verify(&public, b"bundle hash", &signature).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = Keypair::generate(&mut OsRng);
        let public = decompress_g2(keypair.public()).unwrap();

        let signature = sign(keypair.secret(), b"bundle hash", &mut OsRng);
        assert_eq!(
            verify(&public, b"other hash", &signature),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let signer = Keypair::generate(&mut OsRng);
        let other = Keypair::generate(&mut OsRng);
        let other_public = decompress_g2(other.public()).unwrap();

        let signature = sign(signer.secret(), b"bundle hash", &mut OsRng);
        assert!(verify(&other_public, b"bundle hash", &signature).is_err());
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let keypair = Keypair::generate(&mut OsRng);
        let public = decompress_g2(keypair.public()).unwrap();

        assert_eq!(
            verify(&public, b"m", &[0u8; 10]),
            Err(CryptoError::InvalidSignatureFormat)
        );
    }
}
