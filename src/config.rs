//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::chain::{ChainId, STACKS_TESTNET};
use crate::format::{DEFAULT_HEAD, DEFAULT_TAIL};
use crate::relay::bridge::BridgeConfig;
use crate::relay::ClientOptions;
use crate::session::types::AppMetadata;
use crate::ui::NavbarConfig;

/// Environment variable holding the relay project identifier
pub const PROJECT_ID_ENV: &str = "WALLETCONNECT_PROJECT_ID";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub url: String,
    /// Project credential; empty is passed through and fails at connect time
    #[serde(default = "default_project_id")]
    pub project_id: String,
    /// Print the raw pairing URI under the QR code
    #[serde(default = "default_true")]
    pub show_pairing_uri: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            project_id: default_project_id(),
            show_pairing_uri: true,
        }
    }
}

/// Local relay agent the bridge client talks to
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_url")]
    pub url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: default_agent_url(),
            request_timeout_ms: default_request_timeout_ms(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

/// Application metadata shown to the wallet
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_app_description")]
    pub description: String,
    #[serde(default = "default_app_url")]
    pub url: String,
    #[serde(default = "default_app_icons")]
    pub icons: Vec<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            description: default_app_description(),
            url: default_app_url(),
            icons: default_app_icons(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    /// Chain the WalletConnect menu entry targets
    #[serde(default = "default_chain")]
    pub default_chain: String,
    #[serde(default = "default_abbreviate_head")]
    pub abbreviate_head: usize,
    #[serde(default = "default_abbreviate_tail")]
    pub abbreviate_tail: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_chain: default_chain(),
            abbreviate_head: default_abbreviate_head(),
            abbreviate_tail: default_abbreviate_tail(),
        }
    }
}

// Default value functions
fn default_relay_url() -> String {
    "wss://relay.walletconnect.com".to_string()
}

fn default_project_id() -> String {
    std::env::var(PROJECT_ID_ENV).unwrap_or_default()
}

fn default_agent_url() -> String {
    "ws://127.0.0.1:8787".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15000
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_app_name() -> String {
    "Full Range AMM".to_string()
}

fn default_app_description() -> String {
    "Stacks AMM with WalletConnect".to_string()
}

fn default_app_url() -> String {
    "https://your-app-url.com/".to_string()
}

fn default_app_icons() -> Vec<String> {
    vec!["https://cryptologos.cc/logos/stacks-stx-logo.png".to_string()]
}

fn default_storage_path() -> String {
    ".amm-connect/storage.json".to_string()
}

fn default_chain() -> String {
    STACKS_TESTNET.to_string()
}

fn default_abbreviate_head() -> usize {
    DEFAULT_HEAD
}

fn default_abbreviate_tail() -> usize {
    DEFAULT_TAIL
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("relay.url", default_relay_url())?
            .set_default("relay.project_id", default_project_id())?
            .set_default("storage.path", default_storage_path())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix AMM_)
            .add_source(
                config::Environment::with_prefix("AMM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.relay.url)
            .with_context(|| format!("Invalid relay url: {}", self.relay.url))?;
        url::Url::parse(&self.agent.url)
            .with_context(|| format!("Invalid agent url: {}", self.agent.url))?;

        self.ui
            .default_chain
            .parse::<ChainId>()
            .with_context(|| format!("Invalid ui.default_chain: {}", self.ui.default_chain))?;

        if self.agent.request_timeout_ms == 0 {
            anyhow::bail!("agent.request_timeout_ms must be greater than zero");
        }

        if self.ui.abbreviate_head == 0 {
            anyhow::bail!("ui.abbreviate_head must be greater than zero");
        }

        if self.relay.project_id.is_empty() {
            tracing::warn!(
                "No relay project id configured ({} is unset) - connect requests will be refused by the relay",
                PROJECT_ID_ENV
            );
        }

        Ok(())
    }

    /// Options the relay client is constructed with
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            relay_url: self.relay.url.clone(),
            project_id: self.relay.project_id.clone(),
            metadata: AppMetadata {
                name: self.metadata.name.clone(),
                description: self.metadata.description.clone(),
                url: self.metadata.url.clone(),
                icons: self.metadata.icons.clone(),
            },
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            url: self.agent.url.clone(),
            request_timeout_ms: self.agent.request_timeout_ms,
            ping_interval_secs: self.agent.ping_interval_secs,
        }
    }

    pub fn navbar_config(&self) -> Result<NavbarConfig> {
        Ok(NavbarConfig {
            relay_chain: self
                .ui
                .default_chain
                .parse()
                .with_context(|| format!("Invalid ui.default_chain: {}", self.ui.default_chain))?,
            abbreviate_head: self.ui.abbreviate_head,
            abbreviate_tail: self.ui.abbreviate_tail,
        })
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Relay:
    url: {}
    project_id: {}
    show_pairing_uri: {}
  Agent:
    url: {}
    request_timeout: {}ms
    ping_interval: {}s
  Metadata:
    name: {}
    description: {}
    url: {}
  Storage:
    path: {}
  UI:
    default_chain: {}
    abbreviate: {}/{}
"#,
            self.relay.url,
            mask_secret(&self.relay.project_id),
            self.relay.show_pairing_uri,
            mask_url(&self.agent.url),
            self.agent.request_timeout_ms,
            self.agent.ping_interval_secs,
            self.metadata.name,
            self.metadata.description,
            self.metadata.url,
            self.storage.path,
            self.ui.default_chain,
            self.ui.abbreviate_head,
            self.ui.abbreviate_tail,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
pub fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

/// Mask a credential, keeping a short prefix for recognition
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        "(not set)".to_string()
    } else {
        let prefix: String = secret.chars().take(4).collect();
        format!("{}***", prefix)
    }
}
