//! Hybrid encryption of DKG shares to a recipient's long-term G2 key.
//!
//! # Encryption
//!
//! To encrypt share `s` to recipient key `X = x·G2`:
//! 1. Sample random scalar r
//! 2. Compute U = r·G2 (ephemeral public key)
//! 3. Compute shared = r·X
//! 4. Derive a symmetric key from (U, shared) with HKDF-SHA256
//! 5. Encrypt s with AES-256-GCM, binding `context` as associated data
//!
//! # Decryption
//!
//! The recipient recomputes shared = x·U and reverses step 5. A tampered
//! ciphertext or a mismatched context fails authentication.
//!
//! Wire layout: `U (96) || nonce (12) || ciphertext || tag (16)`.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use bls12_381::{G2Affine, G2Projective, Scalar};
use group::Curve;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use randnet_types::Scalar as TypesScalar;

use crate::error::CryptoError;
use crate::points::{g2_from_slice, random_scalar, scalar_from_bytes};

const EPHEMERAL_LEN: usize = 96;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypt a share to a recipient.
pub fn encrypt_share<R: RngCore + CryptoRng>(
    recipient: &G2Affine,
    share: &Scalar,
    context: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>, CryptoError> {
    let r = random_scalar(rng);
    let ephemeral = (G2Projective::generator() * r).to_affine();
    let shared = (G2Projective::from(*recipient) * r).to_affine();

    let key = derive_key(&ephemeral, &shared)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::EncryptionFailed(format!("Failed to create cipher: {}", e)))?;

    let plaintext = share.to_bytes();
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &plaintext,
                aad: context,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(format!("AES-GCM encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(EPHEMERAL_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&ephemeral.to_compressed());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a share with the recipient's long-term secret.
pub fn decrypt_share(
    secret: &Scalar,
    ciphertext: &[u8],
    context: &[u8],
) -> Result<Scalar, CryptoError> {
    if ciphertext.len() < EPHEMERAL_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::InvalidCiphertextFormat);
    }

    let (ephemeral_bytes, rest) = ciphertext.split_at(EPHEMERAL_LEN);
    let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);

    let ephemeral = g2_from_slice(ephemeral_bytes)?;
    let shared = (G2Projective::from(ephemeral) * secret).to_affine();

    let key = derive_key(&ephemeral, &shared)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::KeyDerivationFailed)?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: sealed,
                aad: context,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let bytes: [u8; 32] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidScalar)?;
    scalar_from_bytes(&TypesScalar(bytes))
}

/// Derive a symmetric key from the ephemeral key and the shared point.
fn derive_key(ephemeral: &G2Affine, shared: &G2Affine) -> Result<[u8; 32], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(&ephemeral.to_compressed()), &shared.to_compressed());
    let mut key = [0u8; 32];
    hk.expand(b"randnet-share-encryption", &mut key)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::Keypair;
    use crate::points::decompress_g2;
    use rand::rngs::OsRng;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let mut rng = OsRng;
        let recipient = Keypair::generate(&mut rng);
        let recipient_pk = decompress_g2(recipient.public()).unwrap();

        let share = random_scalar(&mut rng);
        let ciphertext = encrypt_share(&recipient_pk, &share, b"session|0|1", &mut rng).unwrap();

        let decrypted = decrypt_share(recipient.secret(), &ciphertext, b"session|0|1").unwrap();
        assert_eq!(decrypted, share);
    }

    #[test]
    fn test_wrong_context_fails() {
        let mut rng = OsRng;
        let recipient = Keypair::generate(&mut rng);
        let recipient_pk = decompress_g2(recipient.public()).unwrap();

        let share = random_scalar(&mut rng);
        let ciphertext = encrypt_share(&recipient_pk, &share, b"session|0|1", &mut rng).unwrap();

        let result = decrypt_share(recipient.secret(), &ciphertext, b"session|0|2");
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let mut rng = OsRng;
        let recipient = Keypair::generate(&mut rng);
        let eavesdropper = Keypair::generate(&mut rng);
        let recipient_pk = decompress_g2(recipient.public()).unwrap();

        let share = random_scalar(&mut rng);
        let ciphertext = encrypt_share(&recipient_pk, &share, b"ctx", &mut rng).unwrap();

        assert!(decrypt_share(eavesdropper.secret(), &ciphertext, b"ctx").is_err());
    }

    #[test]
    fn test_flipped_byte_fails() {
        let mut rng = OsRng;
        let recipient = Keypair::generate(&mut rng);
        let recipient_pk = decompress_g2(recipient.public()).unwrap();

        let share = random_scalar(&mut rng);
        let mut ciphertext = encrypt_share(&recipient_pk, &share, b"ctx", &mut rng).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;

        assert_eq!(
            decrypt_share(recipient.secret(), &ciphertext, b"ctx"),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let recipient = Keypair::generate(&mut OsRng);
        assert_eq!(
            decrypt_share(recipient.secret(), &[0u8; 40], b"ctx"),
            Err(CryptoError::InvalidCiphertextFormat)
        );
    }
}
