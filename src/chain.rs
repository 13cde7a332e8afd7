//! Chain identifiers and namespace permission templates
//!
//! A chain identifier is a CAIP-2 string `"<namespace>:<reference>"`.
//! The namespace decides which methods a session may request:
//!
//! | Namespace | Kind          | Methods                                                       |
//! |-----------|---------------|---------------------------------------------------------------|
//! | `stacks`  | account chain | signMessage, stxTransfer, contractCall, contractDeploy        |
//! | `bip122`  | UTXO chain    | btcTransfer                                                   |

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

lazy_static::lazy_static! {
    /// CAIP-2 chain identifier shape
    static ref CHAIN_ID_RE: Regex =
        Regex::new(r"^[-a-z0-9]{3,8}:[-_a-zA-Z0-9]{1,32}$").expect("Invalid chain id regex");
}

/// Stacks mainnet
pub const STACKS_MAINNET: &str = "stacks:1";
/// Stacks testnet
pub const STACKS_TESTNET: &str = "stacks:2147483648";
/// Bitcoin mainnet (genesis hash prefix)
pub const BITCOIN_MAINNET: &str = "bip122:000000000019d6689c085ae165831e93";
/// Bitcoin testnet (genesis hash prefix)
pub const BITCOIN_TESTNET: &str = "bip122:000000000933ea01ad0ee984209779ba";

/// Chains recognized by this deployment, with a display label
pub const KNOWN_CHAINS: [(&str, &str); 4] = [
    (STACKS_MAINNET, "Stacks Mainnet"),
    (STACKS_TESTNET, "Stacks Testnet"),
    (BITCOIN_MAINNET, "Bitcoin Mainnet"),
    (BITCOIN_TESTNET, "Bitcoin Testnet"),
];

/// Methods requestable on the account-chain namespace
pub const STACKS_METHODS: [&str; 4] = [
    "stacks_signMessage",
    "stacks_stxTransfer",
    "stacks_contractCall",
    "stacks_contractDeploy",
];

/// Methods requestable on the UTXO-chain namespace
pub const BIP122_METHODS: [&str; 1] = ["bitcoin_btcTransfer"];

/// Protocol family of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Stacks (account chain)
    Stacks,

    /// Bitcoin (UTXO chain)
    Bip122,
}

impl Namespace {
    /// Namespace key as used in session namespaces and account ids
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Stacks => "stacks",
            Namespace::Bip122 => "bip122",
        }
    }

    /// Whether this namespace is a UTXO chain
    pub fn is_utxo(&self) -> bool {
        matches!(self, Namespace::Bip122)
    }

    /// Methods a session on this namespace may request
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            Namespace::Stacks => &STACKS_METHODS,
            Namespace::Bip122 => &BIP122_METHODS,
        }
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stacks" => Ok(Namespace::Stacks),
            "bip122" => Ok(Namespace::Bip122),
            other => Err(Error::UnsupportedNamespace(other.to_string())),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated `namespace:reference` chain identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId {
    namespace: Namespace,
    reference: String,
}

impl ChainId {
    /// Namespace of this chain
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Chain reference within the namespace
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Display label for known chains
    pub fn label(&self) -> Option<&'static str> {
        let id = self.to_string();
        KNOWN_CHAINS
            .iter()
            .find(|(chain, _)| *chain == id)
            .map(|(_, label)| *label)
    }

    /// Whether this chain is one of the deployment's recognized chains
    pub fn is_known(&self) -> bool {
        self.label().is_some()
    }

    /// Permission template for a session on this chain
    pub fn permissions(&self) -> NamespaceProposal {
        NamespaceProposal {
            methods: self
                .namespace
                .methods()
                .iter()
                .map(|m| m.to_string())
                .collect(),
            chains: vec![self.to_string()],
            events: Vec::new(),
        }
    }
}

impl FromStr for ChainId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !CHAIN_ID_RE.is_match(s) {
            return Err(Error::InvalidChainId(s.to_string()));
        }

        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidChainId(s.to_string()))?;

        Ok(Self {
            namespace: namespace.parse()?,
            reference: reference.to_string(),
        })
    }
}

impl TryFrom<String> for ChainId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ChainId> for String {
    fn from(chain: ChainId) -> Self {
        chain.to_string()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

/// Requested permissions for one namespace of a session proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceProposal {
    pub methods: Vec<String>,
    pub chains: Vec<String>,
    pub events: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_chains() {
        for (id, _) in KNOWN_CHAINS {
            let chain: ChainId = id.parse().unwrap();
            assert_eq!(chain.to_string(), id);
            assert!(chain.is_known());
        }

        let chain: ChainId = STACKS_TESTNET.parse().unwrap();
        assert_eq!(chain.namespace(), Namespace::Stacks);
        assert_eq!(chain.reference(), "2147483648");
        assert_eq!(chain.label(), Some("Stacks Testnet"));
    }

    #[test]
    fn test_reject_malformed() {
        assert!(matches!(
            "stacks".parse::<ChainId>(),
            Err(Error::InvalidChainId(_))
        ));
        assert!(matches!(
            "stacks:".parse::<ChainId>(),
            Err(Error::InvalidChainId(_))
        ));
        assert!(matches!(
            "STACKS:1".parse::<ChainId>(),
            Err(Error::InvalidChainId(_))
        ));
        assert!(matches!(
            "eip155:1".parse::<ChainId>(),
            Err(Error::UnsupportedNamespace(_))
        ));
    }

    #[test]
    fn test_stacks_permissions() {
        let chain: ChainId = STACKS_TESTNET.parse().unwrap();
        let perms = chain.permissions();

        for method in [
            "stacks_signMessage",
            "stacks_stxTransfer",
            "stacks_contractCall",
            "stacks_contractDeploy",
        ] {
            assert!(perms.methods.iter().any(|m| m == method));
        }
        assert!(!perms.methods.iter().any(|m| m.starts_with("bitcoin_")));
        assert_eq!(perms.chains, vec![STACKS_TESTNET.to_string()]);
        assert!(perms.events.is_empty());
    }

    #[test]
    fn test_bip122_permissions() {
        let chain: ChainId = BITCOIN_MAINNET.parse().unwrap();
        assert!(chain.namespace().is_utxo());

        let perms = chain.permissions();
        assert_eq!(perms.methods, vec!["bitcoin_btcTransfer".to_string()]);
        assert_eq!(perms.chains, vec![BITCOIN_MAINNET.to_string()]);
    }

    #[test]
    fn test_serde_as_string() {
        let chain: ChainId = STACKS_MAINNET.parse().unwrap();
        let json = serde_json::to_string(&chain).unwrap();
        assert_eq!(json, r#""stacks:1""#);

        let back: ChainId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);

        assert!(serde_json::from_str::<ChainId>(r#""nope""#).is_err());
    }
}
