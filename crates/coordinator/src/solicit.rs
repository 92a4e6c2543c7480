//! Ways of asking peers for partial signatures.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use randnet_board::codec::{
    sign_request_from_bytes, sign_request_to_bytes, sign_request_to_wire, signature_from_bytes,
    signature_from_wire, signature_to_bytes,
};
use randnet_board::{PeerClient, PubSub, PubSubMessage, SIGN_INPUT_TOPIC, SIGN_OUTPUT_TOPIC};
use randnet_types::SignRequest;

use crate::error::RoundError;
use crate::vrf::{PendingSignatures, Solicitor, VrfSigner};

/// Calls `vrf_sign` on every peer concurrently.
pub struct DirectSolicitor {
    peers: Vec<PeerClient>,
    pending: Arc<PendingSignatures>,
}

impl DirectSolicitor {
    pub fn new(peers: Vec<PeerClient>, pending: Arc<PendingSignatures>) -> Self {
        Self { peers, pending }
    }
}

#[async_trait]
impl Solicitor for DirectSolicitor {
    async fn solicit(&self, request: &SignRequest) -> Result<(), RoundError> {
        let wire = sign_request_to_wire(request);
        for peer in &self.peers {
            let peer = peer.clone();
            let wire = wire.clone();
            let pending = self.pending.clone();
            tokio::spawn(async move {
                let answer = match peer.sign(&wire).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!(peer = peer.index(), request_id = %wire.request_id, error = %e, "Sign request failed");
                        return;
                    }
                };
                match signature_from_wire(&answer) {
                    Ok(partial) if partial.request_id != wire.request_id => {
                        warn!(peer = peer.index(), request_id = %wire.request_id, "Answer for another request");
                    }
                    Ok(partial) if partial.share.index != peer.index() => {
                        warn!(
                            peer = peer.index(),
                            signer = partial.share.index,
                            "Answer signed under another index"
                        );
                    }
                    Ok(partial) => {
                        pending.add(&partial.request_id, partial.share);
                    }
                    Err(e) => warn!(peer = peer.index(), error = %e, "Malformed sign answer"),
                }
            });
        }
        Ok(())
    }
}

/// Publishes requests on [`SIGN_INPUT_TOPIC`] and listens for answers on
/// [`SIGN_OUTPUT_TOPIC`]. Also answers requests published by others.
pub struct BroadcastSolicitor<P: PubSub> {
    pubsub: Arc<P>,
    tasks: Vec<JoinHandle<()>>,
}

impl<P: PubSub> BroadcastSolicitor<P> {
    /// Subscribe to both signing topics and start the relay loops.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(pubsub: Arc<P>, signer: VrfSigner, pending: Arc<PendingSignatures>) -> Self {
        let requests = pubsub.subscribe(SIGN_INPUT_TOPIC);
        let answers = pubsub.subscribe(SIGN_OUTPUT_TOPIC);
        let tasks = vec![
            tokio::spawn(answer_loop(pubsub.clone(), requests, signer)),
            tokio::spawn(record_loop(pubsub.local_id().to_string(), answers, pending)),
        ];
        Self { pubsub, tasks }
    }
}

impl<P: PubSub> Drop for BroadcastSolicitor<P> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl<P: PubSub> Solicitor for BroadcastSolicitor<P> {
    async fn solicit(&self, request: &SignRequest) -> Result<(), RoundError> {
        let bytes = sign_request_to_bytes(request)?;
        self.pubsub.publish(SIGN_INPUT_TOPIC, bytes).await?;
        Ok(())
    }
}

async fn next_message(
    receiver: &mut broadcast::Receiver<PubSubMessage>,
    topic: &str,
) -> Option<PubSubMessage> {
    loop {
        match receiver.recv().await {
            Ok(message) => return Some(message),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(topic, skipped, "Relay lagging, messages lost");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn answer_loop<P: PubSub>(
    pubsub: Arc<P>,
    mut requests: broadcast::Receiver<PubSubMessage>,
    signer: VrfSigner,
) {
    while let Some(message) = next_message(&mut requests, SIGN_INPUT_TOPIC).await {
        if message.from == pubsub.local_id() {
            continue;
        }

        let request = match sign_request_from_bytes(&message.data) {
            Ok(request) => request,
            Err(e) => {
                warn!(peer = %message.from, error = %e, "Dropping malformed sign request");
                continue;
            }
        };

        let partial = match signer.partial_sign(&request) {
            Ok(partial) => partial,
            Err(e) => {
                warn!(request_id = %request.request_id, error = %e, "Cannot answer sign request");
                continue;
            }
        };

        let bytes = match signature_to_bytes(&partial) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(request_id = %request.request_id, error = %e, "Cannot encode answer");
                continue;
            }
        };
        if let Err(e) = pubsub.publish(SIGN_OUTPUT_TOPIC, bytes).await {
            warn!(request_id = %request.request_id, error = %e, "Failed to publish answer");
        } else {
            debug!(request_id = %request.request_id, peer = %message.from, "Answered sign request");
        }
    }
}

async fn record_loop(
    local_id: String,
    mut answers: broadcast::Receiver<PubSubMessage>,
    pending: Arc<PendingSignatures>,
) {
    while let Some(message) = next_message(&mut answers, SIGN_OUTPUT_TOPIC).await {
        if message.from == local_id {
            continue;
        }

        match signature_from_bytes(&message.data) {
            Ok(partial) => {
                pending.add(&partial.request_id, partial.share);
            }
            Err(e) => warn!(peer = %message.from, error = %e, "Dropping malformed sign answer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use randnet_board::MemoryHub;
    use std::sync::OnceLock;

    #[tokio::test]
    async fn test_broadcast_request_reaches_topic() {
        let hub = MemoryHub::new();
        let initiator = Arc::new(hub.join("a"));
        let observer = hub.join("b");
        let mut seen = observer.subscribe(SIGN_INPUT_TOPIC);

        let pending = Arc::new(PendingSignatures::new(2));
        let signer = VrfSigner::new(0, Arc::new(OnceLock::new()));
        let solicitor = BroadcastSolicitor::new(initiator, signer, pending);

        let request = SignRequest {
            request_id: "abc".into(),
            origin: Some(0),
            data: vec![1, 2, 3],
        };
        solicitor.solicit(&request).await.unwrap();

        let message = seen.recv().await.unwrap();
        assert_eq!(message.from, "a");
        assert_eq!(sign_request_from_bytes(&message.data).unwrap(), request);
    }

    #[tokio::test]
    async fn test_malformed_answer_is_dropped() {
        let hub = MemoryHub::new();
        let pending = Arc::new(PendingSignatures::new(2));
        let signer = VrfSigner::new(0, Arc::new(OnceLock::new()));
        let _solicitor = BroadcastSolicitor::new(Arc::new(hub.join("a")), signer, pending.clone());

        let other = hub.join("b");
        other
            .publish(SIGN_OUTPUT_TOPIC, b"{\"requestID\":\"r\"}".to_vec())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(pending.count("r"), 0);
    }
}
