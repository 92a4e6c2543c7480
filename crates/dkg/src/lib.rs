//! Distributed Key Generation for threshold BLS signatures.
//!
//! Implements a (t, n) Pedersen key generation protocol on top of Feldman VSS:
//!
//! 1. Each participant deals a random polynomial of degree t-1, encrypting one
//!    share to every participant and committing to the coefficients in G2
//! 2. Participants verify the shares addressed to them and publish signed
//!    approvals or complaints
//! 3. Dealers answer complaints by revealing the disputed shares
//! 4. Each participant sums the shares of qualified dealers into its secret
//!    share; the group key is the sum of their constant-term commitments
//!
//! # Security
//!
//! - Privacy holds against up to t-1 corrupt participants
//! - Every bundle is authenticated with its author's long-term key
//! - Encrypted shares are bound to the session, dealer and holder

pub mod error;
pub mod feldman;
pub mod generator;
pub mod types;

pub use error::DkgError;
pub use generator::{share_context, DistKeyGenerator};
pub use types::{session_id, DkgConfig, DkgResult, ResponseOutcome};
