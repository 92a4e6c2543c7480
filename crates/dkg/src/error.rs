//! Errors raised by the key generator.

use randnet_crypto::CryptoError;
use randnet_types::ParamsError;
use thiserror::Error;

/// Errors during DKG.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DkgError {
    #[error("Long-term key is not in the participant list")]
    NotParticipant,

    #[error("Invalid participant set: {0}")]
    Params(#[from] ParamsError),

    #[error("Deals already generated")]
    AlreadyDealt,

    #[error("Called out of order: {0}")]
    OutOfOrder(&'static str),

    #[error("Evicted from the round: {0}")]
    Evicted(String),

    #[error("Insufficient responses: need {required}, got {got}")]
    InsufficientResponses { required: usize, got: usize },

    #[error("Not enough qualified dealers: need {required}, got {got}")]
    NotEnoughDealers { required: usize, got: usize },

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}
