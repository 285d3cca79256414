mod channel_io;
mod client;
mod routing;
mod server;
mod udp_handshake;
mod udp_transport;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use tungo_config::{ClientConfig, ServerConfig};
use tungo_core::ServerIdentity;

#[derive(Parser, Debug)]
#[command(name = "tungo", version, about = "TunGo: a minimal encrypted tunnel")]
struct Cli {
    /// Set log level: error,warn,info,debug,trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a server Ed25519 identity and write it to disk.
    Keygen {
        /// Path to write the 32-byte signing key seed to.
        #[arg(long)]
        out: PathBuf,
    },

    /// Dial a server and pump packets between a TUN device and the
    /// encrypted transport until cancelled.
    Client {
        /// Path to the client TOML config file.
        #[arg(long)]
        config: PathBuf,
    },

    /// Accept connections, handshake each one, and pump packets for
    /// every resulting session concurrently.
    Server {
        /// Path to the server TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_target(false)
        .init();

    match cli.cmd {
        Commands::Keygen { out } => {
            let identity = ServerIdentity::generate_and_store(&out)?;
            println!("generated server identity at {}", out.display());
            println!("public key: {}", hex::encode(identity.verifying_key().to_bytes()));
        }

        Commands::Client { config } => {
            let config = ClientConfig::load(&config).context("failed to load client config")?;
            client::run(config).await?;
        }

        Commands::Server { config } => {
            let config = ServerConfig::load(&config).context("failed to load server config")?;
            server::run(config).await?;
        }
    }

    Ok(())
}
