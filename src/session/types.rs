//! Session data model
//!
//! Sessions are issued by the relay and persisted as JSON. They are validated
//! at deserialization time so a shape mismatch is rejected instead of trusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::chain::ChainId;
use crate::error::{Error, Result};

/// Application metadata exchanged with the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
}

/// Counterparty wallet of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    #[serde(default)]
    pub public_key: String,
    pub metadata: AppMetadata,
}

/// CAIP-10 account identifier: `"<namespace>:<reference>:<address>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId {
    namespace: String,
    reference: String,
    address: String,
}

impl AccountId {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// On-chain address (third field)
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [namespace, reference, address] = parts.as_slice() else {
            return Err(Error::InvalidAccountId(s.to_string()));
        };

        if namespace.is_empty() || reference.is_empty() || address.is_empty() {
            return Err(Error::InvalidAccountId(s.to_string()));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            reference: reference.to_string(),
            address: address.to_string(),
        })
    }
}

impl TryFrom<String> for AccountId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(account: AccountId) -> Self {
        account.to_string()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.reference, self.address)
    }
}

/// Granted permissions and accounts for one namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionNamespace {
    pub accounts: Vec<AccountId>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chains: Option<Vec<String>>,
}

/// Relay session as issued by the wallet's approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session topic on the relay
    pub topic: String,

    /// Expiry as unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,

    /// Wallet that approved the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<Peer>,

    /// Accounts and permissions keyed by namespace
    pub namespaces: BTreeMap<String, SessionNamespace>,

    /// Relay fields we don't interpret, kept so the record round-trips verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    /// Parse and validate a serialized session
    pub fn from_json(json: &str) -> Result<Self> {
        let session: Session =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        session.validate()?;
        Ok(session)
    }

    /// Serialize for storage
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check structural invariants the relay library guarantees but storage does not
    pub fn validate(&self) -> Result<()> {
        if self.topic.is_empty() {
            return Err(Error::InvalidSession("empty topic".to_string()));
        }

        for (key, namespace) in &self.namespaces {
            if let Some(account) = namespace.accounts.iter().find(|a| a.namespace() != key) {
                return Err(Error::InvalidSession(format!(
                    "account {} listed under namespace {}",
                    account, key
                )));
            }
        }

        Ok(())
    }

    /// Whether the session has passed its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now.timestamp())
    }

    /// Name of the wallet that approved this session, if known
    pub fn peer_name(&self) -> Option<&str> {
        self.peer.as_ref().map(|p| p.metadata.name.as_str())
    }
}

/// Derive the display address for `chain` from `session`.
///
/// Takes the first account under the chain's namespace.
pub fn extract_address(session: &Session, chain: &ChainId) -> Result<String> {
    let key = chain.namespace().as_str();
    let namespace = session
        .namespaces
        .get(key)
        .ok_or_else(|| Error::InvalidSession(format!("no {} namespace in session", key)))?;

    let account = namespace
        .accounts
        .first()
        .ok_or_else(|| Error::InvalidSession(format!("no accounts under {}", key)))?;

    Ok(account.address().to_string())
}
