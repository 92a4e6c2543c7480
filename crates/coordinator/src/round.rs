//! DKG round coordinator.
//!
//! Drives one [`DistKeyGenerator`] through its phases, feeding it bundles
//! from the [`Inbox`] and publishing its own through the [`Board`]:
//!
//! ```text
//! Init -> Dealing -> Responding -> (Justifying) -> Certified
//!            \            \              \
//!             +------------+--------------+--> Evicted / Failed
//! ```
//!
//! The outcome is published once; every [`RoundHandle`] observer sees the
//! same value.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rand::rngs::OsRng;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use randnet_board::{Board, BundleKind, Inbox};
use randnet_dkg::{DistKeyGenerator, DkgConfig, DkgResult, ResponseOutcome};
use randnet_types::{DealBundle, JustificationBundle, ResponseBundle};

use crate::error::RoundError;
use crate::phase::{Phase, PhaseTiming};

/// Write-once slot holding the DKG result once the round certifies.
pub type ResultSlot = Arc<OnceLock<DkgResult>>;

type Outcome = Option<Result<DkgResult, RoundError>>;

/// Observer of a running round.
#[derive(Clone)]
pub struct RoundHandle {
    index: u32,
    phase: watch::Receiver<Phase>,
    outcome: watch::Receiver<Outcome>,
}

impl RoundHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Current phase of the round.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Wait for the round to end. May be called by any number of observers.
    pub async fn wait_end(&self) -> Result<DkgResult, RoundError> {
        let mut outcome = self.outcome.clone();
        let done = outcome
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| RoundError::Aborted("round task dropped".into()))?;
        match &*done {
            Some(result) => result.clone(),
            None => Err(RoundError::Aborted("round ended without outcome".into())),
        }
    }
}

/// One node's DKG round.
pub struct DkgRound {
    index: u32,
    generator: Arc<Mutex<DistKeyGenerator>>,
    board: Arc<dyn Board>,
    timing: PhaseTiming,
    phase: watch::Sender<Phase>,
    started: Instant,
}

impl DkgRound {
    /// Start the round on the current tokio runtime.
    ///
    /// The result is also stored into `slot` on success.
    pub fn spawn(
        config: DkgConfig,
        board: Arc<dyn Board>,
        inbox: Inbox,
        timing: PhaseTiming,
        slot: ResultSlot,
    ) -> Result<RoundHandle, RoundError> {
        let generator = DistKeyGenerator::new(config, &mut OsRng)?;
        let index = generator.index();

        let (phase_tx, phase_rx) = watch::channel(Phase::Init);
        let (outcome_tx, outcome_rx) = watch::channel::<Outcome>(None);

        let round = DkgRound {
            index,
            generator: Arc::new(Mutex::new(generator)),
            board,
            timing,
            phase: phase_tx,
            started: Instant::now(),
        };

        tokio::spawn(async move {
            let outcome = round.run(inbox, slot).await;
            outcome_tx.send_replace(Some(outcome));
        });

        Ok(RoundHandle {
            index,
            phase: phase_rx,
            outcome: outcome_rx,
        })
    }

    async fn run(mut self, inbox: Inbox, slot: ResultSlot) -> Result<DkgResult, RoundError> {
        let index = self.index;
        let outcome = self.drive(inbox).await;

        match &outcome {
            Ok(result) => {
                if slot.set(result.clone()).is_err() {
                    warn!(index, "DKG result already stored, keeping the first one");
                }
                self.enter(Phase::Certified);
                info!(
                    index,
                    public_key = %hex::encode(result.public_key.0),
                    "DKG round certified"
                );
            }
            Err(RoundError::RoundEvicted(reason)) => {
                self.enter(Phase::Evicted);
                warn!(index, reason = %reason, "DKG round evicted this node");
            }
            Err(e) => {
                self.enter(Phase::Failed);
                warn!(index, error = %e, "DKG round failed");
            }
        }
        outcome
    }

    async fn drive(&mut self, inbox: Inbox) -> Result<DkgResult, RoundError> {
        let Inbox {
            deals: mut deal_rx,
            responses: mut response_rx,
            justifications: mut justification_rx,
        } = inbox;

        let everyone: BTreeSet<u32> = self.generator.lock().participants().indices().collect();

        self.enter(Phase::Dealing);
        let deal = self.step(|generator| generator.deals(&mut OsRng)).await??;
        self.board.publish(deal.into()).await?;

        let deals = collect(
            &mut deal_rx,
            |bundle: &DealBundle| bundle.dealer_index,
            &everyone,
            self.deadline(1),
            BundleKind::Deal,
        )
        .await?;
        drain(deal_rx, BundleKind::Deal);

        let response = self
            .step(move |generator| generator.process_deals(&deals, &mut OsRng))
            .await??;
        self.enter(Phase::Responding);
        self.board.publish(response.into()).await?;

        let responses = collect(
            &mut response_rx,
            |bundle: &ResponseBundle| bundle.share_index,
            &everyone,
            self.deadline(2),
            BundleKind::Response,
        )
        .await?;
        drain(response_rx, BundleKind::Response);

        let outcome = self
            .step(move |generator| generator.process_responses(&responses, &mut OsRng))
            .await?;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                drain(justification_rx, BundleKind::Justification);
                return Err(e.into());
            }
        };

        let result = match outcome {
            ResponseOutcome::Certified(result) => result,
            ResponseOutcome::Justify(bundle) => {
                self.enter(Phase::Justifying);
                self.board.publish(bundle.into()).await?;
                self.justify(&mut justification_rx).await?
            }
            ResponseOutcome::AwaitJustifications => {
                self.enter(Phase::Justifying);
                self.justify(&mut justification_rx).await?
            }
        };
        drain(justification_rx, BundleKind::Justification);
        Ok(result)
    }

    async fn justify(
        &mut self,
        justification_rx: &mut mpsc::Receiver<JustificationBundle>,
    ) -> Result<DkgResult, RoundError> {
        let complained: BTreeSet<u32> =
            self.generator.lock().complained_dealers().into_iter().collect();
        let justifications = collect(
            justification_rx,
            |bundle: &JustificationBundle| bundle.dealer_index,
            &complained,
            self.deadline(3),
            BundleKind::Justification,
        )
        .await?;
        Ok(self
            .step(move |generator| generator.process_justifications(&justifications))
            .await??)
    }

    /// Run a CPU-bound generator step on the blocking pool, off the async
    /// workers that relay the other nodes' bundles.
    async fn step<T, F>(&self, f: F) -> Result<T, RoundError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DistKeyGenerator) -> T + Send + 'static,
    {
        let generator = self.generator.clone();
        tokio::task::spawn_blocking(move || f(&mut generator.lock()))
            .await
            .map_err(|e| RoundError::Aborted(format!("generator step failed: {}", e)))
    }

    fn enter(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!(index = self.index, phase = %phase, "Entering phase");
        }
    }

    /// End of the `nth` phase under timed advancement.
    fn deadline(&self, nth: u32) -> Option<Instant> {
        match self.timing {
            PhaseTiming::Timed { period } => Some(self.started + period * nth),
            PhaseTiming::Quorum => None,
        }
    }
}

/// Read bundles of one kind until every `expected` origin has been seen or
/// the deadline passes. Keeps the first bundle per origin.
async fn collect<T>(
    rx: &mut mpsc::Receiver<T>,
    origin: impl Fn(&T) -> u32,
    expected: &BTreeSet<u32>,
    deadline: Option<Instant>,
    kind: BundleKind,
) -> Result<Vec<T>, RoundError> {
    let mut seen = BTreeSet::new();
    let mut collected = Vec::with_capacity(expected.len());

    while deadline.is_some() || seen.len() < expected.len() {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(next) => next,
                Err(_) => break,
            },
            None => rx.recv().await,
        };

        let Some(bundle) = next else {
            return Err(RoundError::Aborted(format!("{} queue closed", kind)));
        };

        let from = origin(&bundle);
        if !expected.contains(&from) {
            debug!(%kind, origin = from, "Ignoring unexpected bundle");
            continue;
        }
        if !seen.insert(from) {
            debug!(%kind, origin = from, "Ignoring duplicate bundle");
            continue;
        }
        collected.push(bundle);
    }

    debug!(%kind, received = collected.len(), expected = expected.len(), "Phase closed");
    Ok(collected)
}

/// Discard bundles for a phase that has already closed, so relays feeding
/// the queue never stall on it.
fn drain<T: Send + 'static>(mut rx: mpsc::Receiver<T>, kind: BundleKind) {
    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            debug!(%kind, "Ignoring bundle for a closed phase");
        }
    });
}
