//! JSON-RPC client for one peer's endpoint.

use std::time::Duration;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;

use crate::bundle::BundleKind;
use crate::codec::{Envelope, SignRequestWire, SignatureWire};
use crate::error::BoardError;

/// A configured peer: its index and its RPC endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub index: u32,
    pub endpoint: String,
}

/// RPC method accepting bundles of a kind.
pub fn push_method(kind: BundleKind) -> &'static str {
    match kind {
        BundleKind::Deal => "dkg_pushDeal",
        BundleKind::Response => "dkg_pushResponse",
        BundleKind::Justification => "dkg_pushJustification",
    }
}

#[derive(Debug, Clone)]
pub struct PeerClient {
    index: u32,
    endpoint: String,
    client: HttpClient,
}

impl PeerClient {
    pub fn new(peer: &Peer, timeout: Duration) -> Result<Self, BoardError> {
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(&peer.endpoint)
            .map_err(|e| BoardError::PeerUnreachable {
                peer: peer.index,
                reason: e.to_string(),
            })?;
        Ok(Self {
            index: peer.index,
            endpoint: peer.endpoint.clone(),
            client,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn push(&self, envelope: &Envelope) -> Result<(), BoardError> {
        let accepted: bool = self
            .client
            .request(push_method(envelope.kind), rpc_params![envelope])
            .await
            .map_err(|e| self.unreachable(e))?;
        if accepted {
            Ok(())
        } else {
            Err(BoardError::Transport(format!(
                "peer {} refused {} bundle",
                self.index, envelope.kind
            )))
        }
    }

    /// Liveness probe.
    pub async fn health(&self) -> Result<(), BoardError> {
        let _: bool = self
            .client
            .request("system_health", rpc_params![])
            .await
            .map_err(|e| self.unreachable(e))?;
        Ok(())
    }

    pub async fn sign(&self, request: &SignRequestWire) -> Result<SignatureWire, BoardError> {
        self.client
            .request("vrf_sign", rpc_params![request])
            .await
            .map_err(|e| self.unreachable(e))
    }

    fn unreachable(&self, err: jsonrpsee::core::ClientError) -> BoardError {
        BoardError::PeerUnreachable {
            peer: self.index,
            reason: err.to_string(),
        }
    }
}
