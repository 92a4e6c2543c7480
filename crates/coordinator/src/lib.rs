//! Round coordination for a threshold randomness network.
//!
//! [`DkgRound`] runs the distributed key generation over a
//! [`Board`](randnet_board::Board) and stores the result in a shared slot.
//! [`VrfService`] then uses that result to produce verifiable randomness:
//! partial signatures are solicited from peers, recovered into the group
//! signature and hashed.

pub mod error;
pub mod phase;
pub mod round;
pub mod solicit;
pub mod vrf;

pub use error::RoundError;
pub use phase::{Phase, PhaseTiming};
pub use round::{DkgRound, ResultSlot, RoundHandle};
pub use solicit::{BroadcastSolicitor, DirectSolicitor};
pub use vrf::{
    derive_randomness, seed_payload, PendingSignatures, Solicitor, VrfOutput, VrfService,
    VrfSigner,
};
