//! Navigation bar and wallet connection controls
//!
//! Composes the relay session manager and the extension wallet into the
//! navbar state: which address to show, which provider it came from, the
//! connect menu and the combined disconnect action.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::chain::ChainId;
use crate::error::Result;
use crate::extension::ExtensionWallet;
use crate::format::abbreviate_address;
use crate::session::SessionManager;

/// Brand shown at the left of the bar
pub const BRAND: &str = "Stacks AMM";

/// Navbar settings
#[derive(Debug, Clone)]
pub struct NavbarConfig {
    /// Chain the WalletConnect menu entry connects to
    pub relay_chain: ChainId,
    /// Leading characters kept when abbreviating
    pub abbreviate_head: usize,
    /// Trailing characters kept when abbreviating
    pub abbreviate_tail: usize,
}

/// Where the displayed address comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provider {
    WalletConnect,
    StacksConnect,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::WalletConnect => "WalletConnect",
            Provider::StacksConnect => "Stacks Connect",
        }
    }
}

/// Page link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub label: &'static str,
    pub href: &'static str,
}

/// Right-hand side of the bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WalletArea {
    /// An address is available: show it with a disconnect button
    Connected {
        provider: Provider,
        display_address: String,
    },
    /// Nothing connected: show the connect button and, if open, its menu
    Disconnected { menu_open: bool },
}

/// Rendered navbar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavbarView {
    pub brand: &'static str,
    pub links: Vec<NavLink>,
    pub wallet: WalletArea,
}

impl fmt::Display for NavbarView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.brand)?;
        for link in &self.links {
            write!(f, " | {} ({})", link.label, link.href)?;
        }

        match &self.wallet {
            WalletArea::Connected {
                provider,
                display_address,
            } => write!(
                f,
                " | {} [{}] [Disconnect]",
                provider.label(),
                display_address
            ),
            WalletArea::Disconnected { menu_open } => {
                write!(f, " | [Connect Wallet]")?;
                if *menu_open {
                    write!(
                        f,
                        "\n    > {}\n    > {}",
                        Provider::StacksConnect.label(),
                        Provider::WalletConnect.label()
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Navbar state bound to both wallet adapters
pub struct Navbar {
    relay: Arc<SessionManager>,
    extension: Arc<dyn ExtensionWallet>,
    config: NavbarConfig,
    menu_open: bool,
}

impl Navbar {
    pub fn new(
        relay: Arc<SessionManager>,
        extension: Arc<dyn ExtensionWallet>,
        config: NavbarConfig,
    ) -> Self {
        Self {
            relay,
            extension,
            config,
            menu_open: false,
        }
    }

    pub fn toggle_menu(&mut self) {
        self.menu_open = !self.menu_open;
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu_open
    }

    /// WalletConnect menu entry. The menu closes only on success.
    pub async fn connect_relay(&mut self) -> Result<()> {
        match self.relay.connect(&self.config.relay_chain).await {
            Ok(()) => {
                self.menu_open = false;
                Ok(())
            }
            Err(e) => {
                error!("Failed to connect WalletConnect: {}", e);
                Err(e)
            }
        }
    }

    /// Stacks Connect menu entry
    pub async fn connect_extension(&mut self) -> Result<()> {
        let result = self.extension.connect().await;
        self.menu_open = false;
        result
    }

    /// Disconnect button: ends whichever connections are live
    pub async fn disconnect(&mut self) {
        if self.relay.is_connected().await {
            self.relay.disconnect().await;
        }
        if self.extension.user_data().is_some() {
            self.extension.disconnect();
            info!("Extension wallet signed out");
        }
    }

    /// Address to show, extension profile first
    pub async fn display_address(&self) -> Option<String> {
        let raw = match self.extension.user_data() {
            Some(user) => Some(user.profile.stx_address.testnet),
            None => self.relay.address().await,
        };

        raw.map(|address| {
            abbreviate_address(
                &address,
                self.config.abbreviate_head,
                self.config.abbreviate_tail,
            )
        })
    }

    pub async fn view(&self) -> NavbarView {
        let wallet = match self.display_address().await {
            Some(display_address) => WalletArea::Connected {
                provider: if self.relay.is_connected().await {
                    Provider::WalletConnect
                } else {
                    Provider::StacksConnect
                },
                display_address,
            },
            None => WalletArea::Disconnected {
                menu_open: self.menu_open,
            },
        };

        NavbarView {
            brand: BRAND,
            links: vec![
                NavLink {
                    label: "Swap",
                    href: "/",
                },
                NavLink {
                    label: "Pools",
                    href: "/pools",
                },
            ],
            wallet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::STACKS_TESTNET;
    use crate::error::Error;
    use crate::extension::{StxAddresses, UserData, UserProfile};
    use crate::session::manager::testing::{harness, Harness, Outcome};
    use crate::session::types::fixtures::session;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const STX_ADDR: &str = "SP3FBR2AGK5H9QBDH3EEN6DF8EK8JY7RX8QJ5SVTE";

    #[derive(Default)]
    struct FakeExtension {
        signed_in: AtomicBool,
    }

    #[async_trait]
    impl ExtensionWallet for FakeExtension {
        async fn connect(&self) -> Result<()> {
            self.signed_in.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn disconnect(&self) {
            self.signed_in.store(false, Ordering::SeqCst);
        }

        fn user_data(&self) -> Option<UserData> {
            self.signed_in.load(Ordering::SeqCst).then(|| UserData {
                profile: UserProfile {
                    stx_address: StxAddresses {
                        mainnet: "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".to_string(),
                        testnet: "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQVX8X0G".to_string(),
                    },
                },
            })
        }
    }

    fn navbar(h: &Harness, ext: Arc<FakeExtension>) -> Navbar {
        Navbar::new(
            h.manager.clone(),
            ext,
            NavbarConfig {
                relay_chain: STACKS_TESTNET.parse().unwrap(),
                abbreviate_head: 6,
                abbreviate_tail: 4,
            },
        )
    }

    #[tokio::test]
    async fn test_disconnected_view() {
        let h = harness();
        h.manager.initialize().await;
        let mut bar = navbar(&h, Arc::new(FakeExtension::default()));

        assert_eq!(
            bar.view().await.wallet,
            WalletArea::Disconnected { menu_open: false }
        );

        bar.toggle_menu();
        let view = bar.view().await;
        assert_eq!(view.wallet, WalletArea::Disconnected { menu_open: true });
        assert!(view.to_string().contains("> WalletConnect"));
        assert!(view.to_string().starts_with("Stacks AMM | Swap (/) | Pools (/pools)"));
    }

    #[tokio::test]
    async fn test_relay_connect_closes_menu() {
        let h = harness();
        h.manager.initialize().await;
        h.client.push(Outcome::Approve(session(
            "t1",
            &format!("stacks:2147483648:{}", STX_ADDR),
        )));
        let mut bar = navbar(&h, Arc::new(FakeExtension::default()));
        bar.toggle_menu();

        bar.connect_relay().await.unwrap();

        assert!(!bar.is_menu_open());
        assert_eq!(
            bar.view().await.wallet,
            WalletArea::Connected {
                provider: Provider::WalletConnect,
                display_address: "SP3FBR...SVTE".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_relay_connect_failure_keeps_menu() {
        let h = harness();
        h.manager.initialize().await;
        h.client.push(Outcome::Reject);
        let mut bar = navbar(&h, Arc::new(FakeExtension::default()));
        bar.toggle_menu();

        let result = bar.connect_relay().await;

        assert!(matches!(result, Err(Error::SessionRejected(_))));
        assert!(bar.is_menu_open());
    }

    #[tokio::test]
    async fn test_extension_address_takes_precedence() {
        let h = harness();
        h.manager.initialize().await;
        let ext = Arc::new(FakeExtension::default());
        let mut bar = navbar(&h, ext.clone());

        bar.connect_extension().await.unwrap();

        assert_eq!(
            bar.view().await.wallet,
            WalletArea::Connected {
                provider: Provider::StacksConnect,
                display_address: "ST2J6Z...8X0G".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_disconnect_ends_both() {
        let h = harness();
        h.manager.initialize().await;
        h.client.push(Outcome::Approve(session(
            "t1",
            &format!("stacks:2147483648:{}", STX_ADDR),
        )));
        let ext = Arc::new(FakeExtension::default());
        let mut bar = navbar(&h, ext.clone());

        bar.connect_relay().await.unwrap();
        bar.connect_extension().await.unwrap();
        bar.disconnect().await;

        assert!(!h.manager.is_connected().await);
        assert!(ext.user_data().is_none());
        assert_eq!(h.client.disconnects.lock().unwrap().len(), 1);
        assert!(matches!(
            bar.view().await.wallet,
            WalletArea::Disconnected { .. }
        ));
    }
}
