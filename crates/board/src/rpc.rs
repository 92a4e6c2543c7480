//! JSON-RPC endpoint served by every node of the point-to-point transport.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use tracing::{debug, info, warn};

use randnet_types::{PartialSignature, SignRequest};

use crate::bundle::BundleKind;
use crate::codec::{self, Envelope, SignRequestWire, SignatureWire};
use crate::error::BoardError;
use crate::queue::Inlet;

/// Answers inbound `vrf_sign` calls.
#[async_trait]
pub trait SignRequestHandler: Send + Sync + 'static {
    async fn sign(&self, request: SignRequest) -> anyhow::Result<PartialSignature>;
}

/// RPC API definition for a node.
#[rpc(server)]
pub trait RandnetApi {
    /// Accept a deal bundle envelope.
    #[method(name = "dkg_pushDeal")]
    async fn push_deal(&self, envelope: Envelope) -> Result<bool, ErrorObjectOwned>;

    /// Accept a response bundle envelope.
    #[method(name = "dkg_pushResponse")]
    async fn push_response(&self, envelope: Envelope) -> Result<bool, ErrorObjectOwned>;

    /// Accept a justification bundle envelope.
    #[method(name = "dkg_pushJustification")]
    async fn push_justification(&self, envelope: Envelope) -> Result<bool, ErrorObjectOwned>;

    /// Produce this node's partial signature over the request payload.
    #[method(name = "vrf_sign")]
    async fn vrf_sign(&self, request: SignRequestWire) -> Result<SignatureWire, ErrorObjectOwned>;

    /// Liveness probe.
    #[method(name = "system_health")]
    async fn system_health(&self) -> Result<bool, ErrorObjectOwned>;
}

/// Implementation of the node RPC server.
struct RpcNode {
    inlet: Inlet,
    signer: Option<Arc<dyn SignRequestHandler>>,
}

impl RpcNode {
    fn rpc_error(msg: &str) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
    }

    fn invalid_params(msg: &str) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32602, msg.to_string(), None::<()>)
    }

    async fn accept(&self, expected: BundleKind, envelope: Envelope) -> Result<bool, ErrorObjectOwned> {
        if envelope.kind != expected {
            return Err(Self::invalid_params(&format!(
                "expected {} bundle, got {}",
                expected, envelope.kind
            )));
        }
        let bundle = codec::decode(&envelope).map_err(|e| {
            warn!(kind = %expected, error = %e, "Dropping malformed bundle");
            Self::invalid_params(&e.to_string())
        })?;
        debug!(kind = %expected, origin = bundle.origin(), "Received bundle");
        self.inlet
            .deliver(bundle)
            .await
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        Ok(true)
    }
}

#[async_trait]
impl RandnetApiServer for RpcNode {
    async fn push_deal(&self, envelope: Envelope) -> Result<bool, ErrorObjectOwned> {
        self.accept(BundleKind::Deal, envelope).await
    }

    async fn push_response(&self, envelope: Envelope) -> Result<bool, ErrorObjectOwned> {
        self.accept(BundleKind::Response, envelope).await
    }

    async fn push_justification(&self, envelope: Envelope) -> Result<bool, ErrorObjectOwned> {
        self.accept(BundleKind::Justification, envelope).await
    }

    async fn vrf_sign(&self, request: SignRequestWire) -> Result<SignatureWire, ErrorObjectOwned> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| Self::rpc_error("signing not enabled on this node"))?;
        let request = codec::sign_request_from_wire(&request)
            .map_err(|e| Self::invalid_params(&e.to_string()))?;
        let signature = signer
            .sign(request)
            .await
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        Ok(codec::signature_to_wire(&signature))
    }

    async fn system_health(&self) -> Result<bool, ErrorObjectOwned> {
        Ok(true)
    }
}

/// Start the RPC server. Bundles it receives are fed into `inlet`.
///
/// Returns the bound address, which differs from `addr` when binding port 0.
pub async fn serve(
    addr: SocketAddr,
    inlet: Inlet,
    signer: Option<Arc<dyn SignRequestHandler>>,
) -> Result<(SocketAddr, ServerHandle), BoardError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| BoardError::Transport(format!("failed to bind {}: {}", addr, e)))?;
    let local_addr = server
        .local_addr()
        .map_err(|e| BoardError::Transport(e.to_string()))?;

    let handle = server.start(RpcNode { inlet, signer }.into_rpc());
    info!(%local_addr, "RPC server listening");
    Ok((local_addr, handle))
}
