//! Randomness network node.
//!
//! - [`config`]: the TOML network file shared by every node
//! - [`runner`]: a networked node, and a whole network simulated in-process
//! - [`cluster`]: the in-process network used by the simulation and tests

pub mod cluster;
pub mod config;
pub mod runner;

pub use cluster::{Cluster, ClusterNode, Transport};
pub use config::{NetworkConfig, TimingConfig, TimingMode};
pub use runner::{run, simulate, NodeOptions};
