//! Network configuration file.
//!
//! ```toml
//! threshold = 2
//! nonce = "6e6f6e6365"
//! initiator = 0
//!
//! [timing]
//! mode = "timed"
//! period_ms = 2000
//!
//! [liveness]
//! retries = 30
//! interval_ms = 1000
//!
//! [[nodes]]
//! index = 0
//! public_key = "a1b2..."
//! endpoint = "http://127.0.0.1:9000"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use randnet_board::Peer;
use randnet_coordinator::PhaseTiming;
use randnet_crypto::decompress_g2;
use randnet_types::{G2Point, Node, Participants};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub threshold: u32,
    /// Hex-encoded session nonce shared by every node
    pub nonce: String,
    /// Node that starts the VRF round once keys are generated
    #[serde(default)]
    pub initiator: u32,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    pub nodes: Vec<NodeEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    #[default]
    Quorum,
    Timed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default)]
    pub mode: TimingMode,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mode: TimingMode::default(),
            period_ms: default_period_ms(),
        }
    }
}

impl TimingConfig {
    pub fn phase_timing(&self) -> PhaseTiming {
        match self.mode {
            TimingMode::Quorum => PhaseTiming::Quorum,
            TimingMode::Timed => PhaseTiming::Timed {
                period: Duration::from_millis(self.period_ms),
            },
        }
    }
}

/// Pre-round peer probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl LivenessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub index: u32,
    /// Hex of the compressed G2 long-term public key
    pub public_key: String,
    /// JSON-RPC endpoint URL
    pub endpoint: String,
}

fn default_period_ms() -> u64 {
    2000
}

fn default_retries() -> u32 {
    30
}

fn default_interval_ms() -> u64 {
    1000
}

impl NetworkConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        let config: Self = toml::from_str(data)?;
        config.participants()?;
        if !config.nodes.iter().any(|node| node.index == config.initiator) {
            return Err(anyhow!("initiator {} is not a configured node", config.initiator));
        }
        Ok(config)
    }

    pub fn nonce(&self) -> Result<Vec<u8>> {
        hex::decode(&self.nonce).context("nonce is not valid hex")
    }

    /// Validated participant list.
    pub fn participants(&self) -> Result<Participants> {
        let nodes = self
            .nodes
            .iter()
            .map(|entry| {
                let bytes = hex::decode(&entry.public_key)
                    .with_context(|| format!("node {}: public key is not hex", entry.index))?;
                let public = G2Point(
                    bytes
                        .try_into()
                        .map_err(|_| anyhow!("node {}: public key must be 96 bytes", entry.index))?,
                );
                decompress_g2(&public)
                    .with_context(|| format!("node {}: public key is not a G2 point", entry.index))?;
                Ok(Node {
                    index: entry.index,
                    public,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Participants::new(nodes, self.threshold).context("invalid participant list")
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.nodes
            .iter()
            .map(|entry| Peer {
                index: entry.index,
                endpoint: entry.endpoint.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use randnet_crypto::Keypair;

    fn config_text(keys: &[Keypair], threshold: u32, extra: &str) -> String {
        let mut text = format!("threshold = {}\nnonce = \"0a0b\"\n{}", threshold, extra);
        for (index, key) in keys.iter().enumerate() {
            text.push_str(&format!(
                "\n[[nodes]]\nindex = {}\npublic_key = \"{}\"\nendpoint = \"http://127.0.0.1:{}\"\n",
                index,
                hex::encode(key.public().0),
                9000 + index
            ));
        }
        text
    }

    fn keys(n: usize) -> Vec<Keypair> {
        (0..n).map(|_| Keypair::generate(&mut OsRng)).collect()
    }

    #[test]
    fn test_parse_with_defaults() {
        let keys = keys(3);
        let config = NetworkConfig::parse(&config_text(&keys, 2, "")).unwrap();

        assert_eq!(config.initiator, 0);
        assert_eq!(config.timing.phase_timing(), PhaseTiming::Quorum);
        assert_eq!(config.liveness, LivenessConfig::default());
        assert_eq!(config.nonce().unwrap(), vec![0x0a, 0x0b]);

        let participants = config.participants().unwrap();
        assert_eq!(participants.n(), 3);
        assert_eq!(participants.index_of(keys[2].public()), Some(2));
        assert_eq!(config.peers()[1].endpoint, "http://127.0.0.1:9001");
    }

    #[test]
    fn test_parse_timed() {
        let extra = "initiator = 1\n[timing]\nmode = \"timed\"\nperiod_ms = 500\n[liveness]\nretries = 3\n";
        let config = NetworkConfig::parse(&config_text(&keys(2), 2, extra)).unwrap();

        assert_eq!(config.initiator, 1);
        assert_eq!(
            config.timing.phase_timing(),
            PhaseTiming::Timed {
                period: Duration::from_millis(500)
            }
        );
        assert_eq!(config.liveness.retries, 3);
        assert_eq!(config.liveness.interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_rejects_bad_threshold_and_key() {
        let keys = keys(2);
        assert!(NetworkConfig::parse(&config_text(&keys, 3, "")).is_err());

        let bad = config_text(&keys, 2, "").replace(&hex::encode(keys[1].public().0), "abcd");
        assert!(NetworkConfig::parse(&bad).is_err());
    }

    #[test]
    fn test_rejects_unknown_initiator() {
        let text = config_text(&keys(2), 2, "initiator = 5\n");
        assert!(NetworkConfig::parse(&text).is_err());
    }
}
