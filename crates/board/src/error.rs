//! Errors raised by the bundle codec and the transports.

use thiserror::Error;

/// Decoding failure of a wire message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl CodecError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        CodecError::MalformedBundle(msg.into())
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::MalformedBundle(err.to_string())
    }
}

/// Errors that can occur while relaying bundles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: u32, reason: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Only {connected} of {required} peers on topic {topic}")]
    NotEnoughPeers {
        topic: String,
        connected: usize,
        required: usize,
    },

    #[error("Board closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}
