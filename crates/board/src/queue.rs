//! Per-kind inbound queues between a transport and the coordinator.
//!
//! A transport holds the [`Inlet`]; the coordinator owns the [`Inbox`].
//! Each queue has a fixed capacity, so a full queue stalls the relay that
//! feeds it until the coordinator catches up.

use tokio::sync::mpsc;
use tracing::debug;

use randnet_types::{DealBundle, JustificationBundle, ResponseBundle};

use crate::bundle::{Bundle, BundleKind};
use crate::error::BoardError;

/// Sending half, shared by relay loops, RPC handlers and local loopback.
#[derive(Clone, Debug)]
pub struct Inlet {
    deals: mpsc::Sender<DealBundle>,
    responses: mpsc::Sender<ResponseBundle>,
    justifications: mpsc::Sender<JustificationBundle>,
}

/// Receiving half: one arrival-ordered sequence per bundle kind.
#[derive(Debug)]
pub struct Inbox {
    pub deals: mpsc::Receiver<DealBundle>,
    pub responses: mpsc::Receiver<ResponseBundle>,
    pub justifications: mpsc::Receiver<JustificationBundle>,
}

/// Create a queue pair with `capacity` slots per kind.
pub fn channel(capacity: usize) -> (Inlet, Inbox) {
    let capacity = capacity.max(1);
    let (deal_tx, deal_rx) = mpsc::channel(capacity);
    let (response_tx, response_rx) = mpsc::channel(capacity);
    let (justification_tx, justification_rx) = mpsc::channel(capacity);
    (
        Inlet {
            deals: deal_tx,
            responses: response_tx,
            justifications: justification_tx,
        },
        Inbox {
            deals: deal_rx,
            responses: response_rx,
            justifications: justification_rx,
        },
    )
}

impl Inlet {
    /// Enqueue a bundle, waiting while its queue is full.
    pub async fn deliver(&self, bundle: Bundle) -> Result<(), BoardError> {
        let kind = bundle.kind();
        let origin = bundle.origin();
        let sent = match bundle {
            Bundle::Deal(bundle) => self.deals.send(bundle).await.is_ok(),
            Bundle::Response(bundle) => self.responses.send(bundle).await.is_ok(),
            Bundle::Justification(bundle) => self.justifications.send(bundle).await.is_ok(),
        };
        if !sent {
            return Err(BoardError::Closed);
        }
        debug!(%kind, origin, "Queued bundle");
        Ok(())
    }

    /// Whether the coordinator has dropped the queue of this kind.
    pub fn is_closed(&self, kind: BundleKind) -> bool {
        match kind {
            BundleKind::Deal => self.deals.is_closed(),
            BundleKind::Response => self.responses.is_closed(),
            BundleKind::Justification => self.justifications.is_closed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(share_index: u32) -> ResponseBundle {
        ResponseBundle {
            share_index,
            responses: vec![],
            session_id: vec![],
            signature: vec![],
        }
    }

    #[tokio::test]
    async fn test_routes_by_kind_in_arrival_order() {
        let (inlet, mut inbox) = channel(4);
        inlet.deliver(response(2).into()).await.unwrap();
        inlet.deliver(response(0).into()).await.unwrap();

        assert_eq!(inbox.responses.recv().await.unwrap().share_index, 2);
        assert_eq!(inbox.responses.recv().await.unwrap().share_index, 0);
        assert!(inbox.deals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_inbox() {
        let (inlet, inbox) = channel(1);
        drop(inbox);
        assert!(inlet.is_closed(BundleKind::Response));
        assert_eq!(
            inlet.deliver(response(1).into()).await,
            Err(BoardError::Closed)
        );
    }
}
