//! CLI command implementations
//!
//! Each invocation plays the role of one page load: the session manager is
//! built once, initialized (restoring any saved session), then driven by the
//! command.

use std::sync::Arc;

use anyhow::Result;
use dialoguer::Select;
use tracing::{info, warn};

use crate::chain::{ChainId, KNOWN_CHAINS};
use crate::config::{mask_url, Config};
use crate::error::Error;
use crate::extension::{ExtensionWallet, UnavailableExtension};
use crate::relay::{BridgeClientFactory, PairingDisplay, TerminalQrDisplay};
use crate::session::{FileStore, SessionManager};
use crate::ui::Navbar;

/// Services shared by every command
struct App {
    manager: Arc<SessionManager>,
    display: Arc<TerminalQrDisplay>,
    navbar: Navbar,
}

impl App {
    async fn start(config: &Config) -> Result<Self> {
        let display = Arc::new(TerminalQrDisplay::new(config.relay.show_pairing_uri));
        let manager = Arc::new(SessionManager::new(
            config.client_options(),
            Arc::new(BridgeClientFactory::new(config.bridge_config())),
            Arc::new(FileStore::new(&config.storage.path)),
            display.clone(),
        ));

        manager.initialize().await;

        let extension: Arc<dyn ExtensionWallet> = Arc::new(UnavailableExtension);
        let navbar = Navbar::new(manager.clone(), extension, config.navbar_config()?);

        Ok(Self {
            manager,
            display,
            navbar,
        })
    }

    async fn require_initialized(&self, config: &Config) -> Result<()> {
        if !self.manager.is_initialized().await {
            anyhow::bail!(
                "Relay client unavailable - is the relay agent running at {}?",
                config.agent.url
            );
        }
        Ok(())
    }
}

/// Sign in through the browser extension wallet
pub async fn connect_extension(config: &Config) -> Result<()> {
    let mut app = App::start(config).await?;
    app.navbar.connect_extension().await?;

    println!("{}", app.navbar.view().await);
    Ok(())
}

/// Connect a relay session
pub async fn connect(config: &Config, chain: Option<String>) -> Result<()> {
    let chain = match chain {
        Some(chain) => chain.parse::<ChainId>()?,
        None => pick_chain(config)?,
    };

    if !chain.is_known() {
        warn!("{} is not one of the recognized chains", chain);
    }

    let app = App::start(config).await?;
    app.require_initialized(config).await?;

    println!(
        "\nConnecting to {} ({})...",
        chain.label().unwrap_or("custom chain"),
        chain
    );

    let outcome = tokio::select! {
        result = app.manager.connect(&chain) => result,
        _ = tokio::signal::ctrl_c() => {
            app.display.close();
            anyhow::bail!("Connect cancelled");
        }
    };
    outcome.map_err(|e| connect_failure(config, e))?;

    println!("\nConnected.\n");
    println!("{}", app.navbar.view().await);
    Ok(())
}

/// Attach a hint to a failed connect depending on where it failed
fn connect_failure(config: &Config, e: Error) -> anyhow::Error {
    if e.is_transport() {
        anyhow::anyhow!(
            "{} - check the relay agent at {}",
            e,
            mask_url(&config.agent.url)
        )
    } else if e.is_precondition() {
        anyhow::anyhow!("{} - nothing was sent to the wallet", e)
    } else {
        e.into()
    }
}

/// Disconnect every live wallet connection
pub async fn disconnect(config: &Config) -> Result<()> {
    let mut app = App::start(config).await?;

    if !app.manager.is_connected().await {
        println!("No relay session to disconnect.");
    }

    app.navbar.disconnect().await;
    println!("{}", app.navbar.view().await);
    Ok(())
}

/// Show the connection state
pub async fn status(config: &Config, json: bool) -> Result<()> {
    let app = App::start(config).await?;
    let status = app.manager.status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("\n=== CONNECTION STATUS ===\n");
    println!("{}\n", app.navbar.view().await);
    println!("Relay client: {}", status.lifecycle);

    if let Some(topic) = &status.topic {
        println!("Session topic: {}", topic);
        println!("Chain: {}", status.chain.as_deref().unwrap_or("-"));
        println!(
            "Address: {}",
            status.address.as_deref().unwrap_or("(unavailable)")
        );
        if let Some(peer) = &status.peer {
            println!("Wallet: {}", peer);
        }
        if let Some(expiry) = status
            .expiry
            .and_then(|e| chrono::DateTime::<chrono::Utc>::from_timestamp(e, 0))
        {
            println!("Expires: {}", expiry.to_rfc3339());
        }
    }

    println!();
    Ok(())
}

/// List recognized chains and their permission templates
pub fn chains(config: &Config) -> Result<()> {
    println!("\n=== RECOGNIZED CHAINS ===\n");
    println!("{:<45} {:<18} {}", "CHAIN", "NAME", "METHODS");
    println!("{}", "-".repeat(100));

    for (id, label) in KNOWN_CHAINS {
        let chain: ChainId = id.parse()?;
        let marker = if id == config.ui.default_chain { "*" } else { " " };
        println!(
            "{}{:<44} {:<18} {}",
            marker,
            id,
            label,
            chain.permissions().methods.join(", ")
        );
    }

    println!("\n* default for the WalletConnect menu entry\n");
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Interactive chain picker, preselecting the configured default
fn pick_chain(config: &Config) -> Result<ChainId> {
    let items: Vec<String> = KNOWN_CHAINS
        .iter()
        .map(|(id, label)| format!("{} ({})", label, id))
        .collect();
    let default = KNOWN_CHAINS
        .iter()
        .position(|(id, _)| *id == config.ui.default_chain)
        .unwrap_or(0);

    let selection = Select::new()
        .with_prompt("Select a chain")
        .items(&items)
        .default(default)
        .interact()?;

    info!("Selected {}", KNOWN_CHAINS[selection].0);
    Ok(KNOWN_CHAINS[selection].0.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failure_hints() {
        let mut config = Config::default();
        config.agent.url = "ws://127.0.0.1:8787?token=secret".to_string();

        let transport = connect_failure(&config, Error::RelayTimeout(15000)).to_string();
        assert!(transport.contains("ws://127.0.0.1:8787?***"));
        assert!(!transport.contains("secret"));

        let precondition = connect_failure(&config, Error::ConnectInProgress).to_string();
        assert!(precondition.ends_with("nothing was sent to the wallet"));

        let rejected = connect_failure(&config, Error::SessionRejected("no".into())).to_string();
        assert_eq!(rejected, "Session rejected by wallet: no");
    }
}
