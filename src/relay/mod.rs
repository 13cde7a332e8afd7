//! Relay client seam
//!
//! The relay protocol itself (pairing crypto, envelopes, transport) belongs to
//! an external signing client. This module describes what the session manager
//! needs from it:
//!
//! ```text
//! RelayClientFactory ──create──▶ RelayClient ──connect──▶ PendingSession { uri, approval }
//!                                     │
//!                                     └──disconnect(topic, reason)
//! ```

pub mod bridge;
pub mod pairing;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::chain::{ChainId, NamespaceProposal};
use crate::error::Result;
use crate::session::types::{AppMetadata, Session};

pub use bridge::{BridgeClient, BridgeClientFactory};
pub use pairing::{PairingDisplay, TerminalQrDisplay};

/// Reason code sent when the user ends a session
pub const USER_DISCONNECTED_CODE: i64 = 6000;

/// Options the relay client is constructed with
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    pub relay_url: String,
    pub project_id: String,
    pub metadata: AppMetadata,
}

/// Session proposal sent to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub pairing_topic: Option<String>,
    pub required_namespaces: BTreeMap<String, NamespaceProposal>,
}

impl ConnectParams {
    /// Proposal requesting the chain's namespace permission template
    pub fn for_chain(chain: &ChainId) -> Self {
        let mut required_namespaces = BTreeMap::new();
        required_namespaces.insert(
            chain.namespace().as_str().to_string(),
            chain.permissions(),
        );

        Self {
            pairing_topic: None,
            required_namespaces,
        }
    }
}

/// Reason attached to a session termination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectReason {
    pub code: i64,
    pub message: String,
}

impl DisconnectReason {
    pub fn user_disconnected() -> Self {
        Self {
            code: USER_DISCONNECTED_CODE,
            message: "User disconnected".to_string(),
        }
    }
}

/// A proposal the wallet has not answered yet
pub struct PendingSession {
    /// Pairing URI to show the wallet, when a new pairing is needed
    pub uri: Option<String>,

    /// Resolves once the wallet approves or rejects
    pub approval: BoxFuture<'static, Result<Session>>,
}

/// Live connection to the relay
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Propose a session
    async fn connect(&self, params: ConnectParams) -> Result<PendingSession>;

    /// Terminate a session
    async fn disconnect(&self, topic: &str, reason: DisconnectReason) -> Result<()>;
}

/// Builds the long-lived relay client
#[async_trait]
pub trait RelayClientFactory: Send + Sync {
    async fn create(&self, options: &ClientOptions) -> Result<Arc<dyn RelayClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_params_wire_shape() {
        let chain: ChainId = "stacks:2147483648".parse().unwrap();
        let params = ConnectParams::for_chain(&chain);
        let json = serde_json::to_value(&params).unwrap();

        assert!(json["pairingTopic"].is_null());
        let stacks = &json["requiredNamespaces"]["stacks"];
        assert_eq!(stacks["chains"][0], "stacks:2147483648");
        assert_eq!(stacks["methods"].as_array().unwrap().len(), 4);
        assert!(json["requiredNamespaces"].get("bip122").is_none());
    }

    #[test]
    fn test_bip122_params() {
        let chain: ChainId = "bip122:000000000933ea01ad0ee984209779ba".parse().unwrap();
        let params = ConnectParams::for_chain(&chain);

        assert_eq!(params.required_namespaces.len(), 1);
        assert_eq!(
            params.required_namespaces["bip122"].methods,
            vec!["bitcoin_btcTransfer".to_string()]
        );
    }

    #[test]
    fn test_user_disconnected_reason() {
        let reason = DisconnectReason::user_disconnected();
        assert_eq!(reason.code, 6000);
        assert_eq!(reason.message, "User disconnected");
    }
}
