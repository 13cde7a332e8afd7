//! Browser-extension wallet seam
//!
//! The extension wallet authenticates the user itself and exposes a profile.
//! Only the seam lives here; a terminal has no extension to talk to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Account addresses per network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StxAddresses {
    pub mainnet: String,
    pub testnet: String,
}

/// Authenticated user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub stx_address: StxAddresses,
}

/// Data the extension exposes once signed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub profile: UserProfile,
}

/// Wallet reached through a browser extension
#[async_trait]
pub trait ExtensionWallet: Send + Sync {
    /// Ask the extension to authenticate the user
    async fn connect(&self) -> Result<()>;

    /// Sign the user out
    fn disconnect(&self);

    /// Profile of the signed-in user
    fn user_data(&self) -> Option<UserData>;
}

/// Extension wallet for environments without a browser
pub struct UnavailableExtension;

#[async_trait]
impl ExtensionWallet for UnavailableExtension {
    async fn connect(&self) -> Result<()> {
        Err(Error::ExtensionUnavailable(
            "no browser extension in a terminal session; use WalletConnect".to_string(),
        ))
    }

    fn disconnect(&self) {}

    fn user_data(&self) -> Option<UserData> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_extension() {
        let ext = UnavailableExtension;
        assert!(matches!(
            ext.connect().await,
            Err(Error::ExtensionUnavailable(_))
        ));
        assert!(ext.user_data().is_none());
    }

    #[test]
    fn test_user_data_shape() {
        let json = r#"{"profile": {"stxAddress": {"mainnet": "SP1", "testnet": "ST1"}}}"#;
        let data: UserData = serde_json::from_str(json).unwrap();
        assert_eq!(data.profile.stx_address.testnet, "ST1");
    }
}
