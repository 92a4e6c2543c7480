//! Message relay between the nodes of a round.
//!
//! A [`Board`] publishes a bundle to every participant, this node included.
//! Arrivals land in an [`Inbox`] with one queue per bundle kind, so the
//! coordinator is written once against either transport:
//!
//! - [`HttpBoard`]: direct JSON-RPC delivery to each peer's endpoint, served
//!   by [`rpc::serve`]
//! - [`PubSubBoard`]: one shared topic on a [`PubSub`] network, with
//!   self-originated messages filtered at the receiver

use async_trait::async_trait;

pub mod bundle;
pub mod client;
pub mod codec;
pub mod error;
pub mod http;
pub mod pubsub;
pub mod queue;
pub mod rpc;

pub use bundle::{Bundle, BundleKind};
pub use client::{Peer, PeerClient};
pub use codec::Envelope;
pub use error::{BoardError, CodecError};
pub use http::HttpBoard;
pub use pubsub::{
    wait_for_quorum, MemoryHub, MemoryPubSub, PubSub, PubSubBoard, PubSubMessage, DKG_TOPIC,
    SIGN_INPUT_TOPIC, SIGN_OUTPUT_TOPIC,
};
pub use queue::{Inbox, Inlet};
pub use rpc::SignRequestHandler;

/// Relays bundles of one session to every participant.
#[async_trait]
pub trait Board: Send + Sync {
    /// Send to all other participants and enqueue locally.
    ///
    /// Failures to reach individual peers are logged, not returned.
    async fn publish(&self, bundle: Bundle) -> Result<(), BoardError>;
}

/// Inbound queue capacity for a session of `n` nodes.
pub fn queue_capacity(n: u32) -> usize {
    2 * n as usize
}
