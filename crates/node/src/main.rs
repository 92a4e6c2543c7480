//! `randnet` command line.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use tracing::info;

use randnet_crypto::Keypair;
use randnet_node::{run, simulate, NetworkConfig, NodeOptions, TimingConfig, TimingMode, Transport};

#[derive(Parser)]
#[command(name = "randnet")]
#[command(about = "Threshold BLS randomness network node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a long-term key pair
    Keygen,

    /// Run one node of a configured network
    Run {
        /// Network configuration file
        #[arg(long)]
        config: PathBuf,

        /// This node's index in the configuration
        #[arg(long)]
        index: u32,

        /// Hex-encoded secret key
        #[arg(long)]
        key: String,

        /// Address for the RPC server
        #[arg(long, default_value = "127.0.0.1:9000")]
        listen: SocketAddr,
    },

    /// Run a whole network in this process
    Simulate {
        #[arg(short = 'n', long, default_value = "3")]
        nodes: u32,

        #[arg(short = 't', long, default_value = "2")]
        threshold: u32,

        #[arg(long, value_enum, default_value_t = Transport::Direct)]
        transport: Transport,

        #[arg(long, value_enum, default_value_t = TimingMode::Quorum)]
        timing: TimingMode,

        /// Phase length for timed advancement
        #[arg(long, default_value = "1000")]
        period_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("randnet=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            let keypair = Keypair::generate(&mut OsRng);
            println!("secret: {}", hex::encode(keypair.to_bytes()));
            println!("public: {}", hex::encode(keypair.public().0));
        }

        Commands::Run {
            config,
            index,
            key,
            listen,
        } => {
            let config = NetworkConfig::load(&config)?;
            let secret = hex::decode(key.trim()).context("key is not valid hex")?;
            let keypair = Keypair::from_bytes(&secret).context("invalid secret key")?;

            run(NodeOptions {
                config,
                index,
                keypair,
                listen,
            })
            .await?;
        }

        Commands::Simulate {
            nodes,
            threshold,
            transport,
            timing,
            period_ms,
        } => {
            let timing = TimingConfig {
                mode: timing,
                period_ms,
            }
            .phase_timing();
            let output = simulate(nodes, threshold, transport, timing).await?;
            info!(request_id = %output.request_id, "Simulation complete");
            println!("{}", output.randomness);
        }
    }

    Ok(())
}
