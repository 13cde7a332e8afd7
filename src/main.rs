//! Stacks AMM wallet connector - relay sessions from the terminal
//!
//! Pairs a wallet with the AMM over a relay session (QR code pairing),
//! persists the session between runs and shows the connection bar.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use stacks_amm_connect::cli::commands;
use stacks_amm_connect::config::Config;

/// Stacks AMM wallet connector
#[derive(Parser)]
#[command(name = "amm-connect")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "amm-connect.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a wallet
    Connect {
        /// Chain identifier, e.g. stacks:2147483648 (prompts when omitted)
        #[arg(long)]
        chain: Option<String>,

        /// Use the browser extension wallet instead of WalletConnect
        #[arg(long, conflicts_with = "chain")]
        extension: bool,
    },

    /// Disconnect all wallets
    Disconnect,

    /// Show connection status
    Status {
        /// Print status as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recognized chains
    Chains,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("stacks_amm_connect=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Connect { chain, extension } => {
            if extension {
                commands::connect_extension(&config).await
            } else {
                commands::connect(&config, chain).await
            }
        }
        Commands::Disconnect => commands::disconnect(&config).await,
        Commands::Status { json } => commands::status(&config, json).await,
        Commands::Chains => commands::chains(&config),
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
