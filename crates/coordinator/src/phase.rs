//! DKG phases and how the coordinator advances between them.

use std::fmt;
use std::time::Duration;

/// State of a node's DKG round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Dealing,
    Responding,
    Justifying,
    Certified,
    /// This node's contribution was rejected
    Evicted,
    /// The round ended without a result for another reason
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Certified | Phase::Evicted | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Dealing => "dealing",
            Phase::Responding => "responding",
            Phase::Justifying => "justifying",
            Phase::Certified => "certified",
            Phase::Evicted => "evicted",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// When a phase closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseTiming {
    /// Close each phase on a fixed period boundary, whatever has arrived.
    Timed { period: Duration },
    /// Close each phase once every expected bundle has arrived. Never times
    /// out.
    #[default]
    Quorum,
}
