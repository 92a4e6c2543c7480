//! Errors that end a DKG or VRF round.

use randnet_board::{BoardError, CodecError};
use randnet_dkg::DkgError;
use thiserror::Error;

/// Errors that can occur while running a round.
///
/// `Clone` so one completion can be handed to every observer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Key generation has not completed")]
    RoundNotReady,

    #[error("Insufficient shares: need {required}, got {got}")]
    InsufficientShares { required: usize, got: usize },

    #[error("Signature recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("Evicted from the round: {0}")]
    RoundEvicted(String),

    #[error("Round setup failed: {0}")]
    Setup(String),

    #[error("Round aborted: {0}")]
    Aborted(String),
}

impl From<DkgError> for RoundError {
    fn from(err: DkgError) -> Self {
        match err {
            DkgError::Evicted(reason) => RoundError::RoundEvicted(reason),
            DkgError::NotParticipant | DkgError::Params(_) | DkgError::Crypto(_) => {
                RoundError::Setup(err.to_string())
            }
            other => RoundError::Aborted(other.to_string()),
        }
    }
}

impl From<BoardError> for RoundError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::Codec(e) => e.into(),
            BoardError::PeerUnreachable { .. }
            | BoardError::NotEnoughPeers { .. }
            | BoardError::Transport(_) => RoundError::PeerUnreachable(err.to_string()),
            BoardError::Closed => RoundError::Aborted(err.to_string()),
        }
    }
}

impl From<CodecError> for RoundError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MalformedBundle(_) => RoundError::MalformedBundle(err.to_string()),
            CodecError::Serialization(_) => RoundError::Aborted(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_maps_to_round_evicted() {
        let err: RoundError = DkgError::Evicted("own deal disqualified".into()).into();
        assert_eq!(
            err,
            RoundError::RoundEvicted("own deal disqualified".into())
        );
    }

    #[test]
    fn test_board_errors_map() {
        let err: RoundError = BoardError::PeerUnreachable {
            peer: 2,
            reason: "connection refused".into(),
        }
        .into();
        assert!(matches!(err, RoundError::PeerUnreachable(_)));

        let err: RoundError = BoardError::Codec(CodecError::MalformedBundle("x".into())).into();
        assert!(matches!(err, RoundError::MalformedBundle(_)));
    }

    #[test]
    fn test_encoding_failure_is_not_malformed() {
        let err: RoundError = CodecError::Serialization("key must be a string".into()).into();
        assert!(matches!(err, RoundError::Aborted(_)));
    }
}
