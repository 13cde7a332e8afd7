//! Relay session manager
//!
//! Owns the relay client handle and at most one relay session. Persists the
//! session under two storage keys and restores it on startup.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──initialize──▶ Initializing ──▶ Disconnected | Connected
//! Disconnected ──connect ok──▶ Connected
//! Connected ──connect(other chain) ok──▶ Connected
//! Connected ──disconnect──▶ Disconnected
//! connect failure ──▶ Disconnected
//! ```
//!
//! Chain and address are cleared when connect starts, before the first await,
//! so a failed or pending connect never exposes the previous target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::chain::ChainId;
use crate::error::{Error, Result};
use crate::relay::{
    ClientOptions, ConnectParams, DisconnectReason, PairingDisplay, RelayClient,
    RelayClientFactory,
};

use super::storage::{KeyValueStore, CHAIN_KEY, SESSION_KEY};
use super::types::{extract_address, Session};

/// Lifecycle of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Disconnected,
    Connected,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Uninitialized => write!(f, "uninitialized"),
            Lifecycle::Initializing => write!(f, "initializing"),
            Lifecycle::Disconnected => write!(f, "disconnected"),
            Lifecycle::Connected => write!(f, "connected"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ConnectionState {
    session: Option<Session>,
    chain: Option<ChainId>,
    address: Option<String>,
}

/// Snapshot of the connection for display
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub lifecycle: Lifecycle,
    pub connected: bool,
    pub chain: Option<String>,
    pub address: Option<String>,
    pub topic: Option<String>,
    pub peer: Option<String>,
    pub expiry: Option<i64>,
}

/// Manages one relay session across restarts
pub struct SessionManager {
    /// Options the relay client is built with
    options: ClientOptions,

    /// Builds the client on first initialize
    factory: Arc<dyn RelayClientFactory>,

    /// Durable storage for the session and chain
    store: Arc<dyn KeyValueStore>,

    /// Pairing code surface
    display: Arc<dyn PairingDisplay>,

    /// Long-lived relay client, set once
    client: RwLock<Option<Arc<dyn RelayClient>>>,

    /// Held for the duration of initialize
    init_lock: Mutex<()>,

    /// Set while initialize runs
    initializing: AtomicBool,

    /// Held for the duration of connect
    connect_lock: Mutex<()>,

    /// Current session, chain and derived address
    state: RwLock<ConnectionState>,
}

impl SessionManager {
    pub fn new(
        options: ClientOptions,
        factory: Arc<dyn RelayClientFactory>,
        store: Arc<dyn KeyValueStore>,
        display: Arc<dyn PairingDisplay>,
    ) -> Self {
        Self {
            options,
            factory,
            store,
            display,
            client: RwLock::new(None),
            init_lock: Mutex::new(()),
            initializing: AtomicBool::new(false),
            connect_lock: Mutex::new(()),
            state: RwLock::new(ConnectionState::default()),
        }
    }

    /// Build the relay client and restore any saved session.
    ///
    /// Idempotent. Failures are logged and leave the manager uninitialized.
    pub async fn initialize(&self) {
        let _guard = self.init_lock.lock().await;

        if self.client.read().await.is_some() {
            debug!("Relay client already initialized");
            return;
        }

        self.initializing.store(true, Ordering::SeqCst);

        match self.factory.create(&self.options).await {
            Ok(client) => {
                *self.client.write().await = Some(client);
                self.restore().await;
            }
            Err(e) => error!("Failed to initialize relay client: {}", e),
        }

        self.initializing.store(false, Ordering::SeqCst);
    }

    /// Propose a session for `chain` and wait for the wallet to approve it.
    ///
    /// Only one connect may be pending; a second call fails with
    /// `ConnectInProgress` until the first settles.
    pub async fn connect(&self, chain: &ChainId) -> Result<()> {
        let _connect_guard = self
            .connect_lock
            .try_lock()
            .map_err(|_| Error::ConnectInProgress)?;

        let client = self.client_handle().await?;

        *self.state.write().await = ConnectionState::default();

        info!("Requesting {} session for {}", chain.namespace(), chain);
        let session = match self.negotiate(client.as_ref(), chain).await {
            Ok(session) => session,
            Err(e) => {
                self.display.close();
                error!("Failed to connect relay session: {}", e);
                return Err(e);
            }
        };

        let address = self.derive_address(&session, chain);
        {
            let mut state = self.state.write().await;
            state.session = Some(session.clone());
            state.chain = Some(chain.clone());
            state.address = address.clone();
        }

        self.persist(&session, chain).await;
        self.display.close();

        info!(
            "Relay session {} connected on {} (address: {})",
            session.topic,
            chain,
            address.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    /// End the session. Local state and storage are always cleared, even if
    /// the relay cannot be reached.
    pub async fn disconnect(&self) {
        let session = self.state.read().await.session.clone();
        let client = self.client.read().await.clone();

        if let (Some(client), Some(session)) = (client, session.as_ref()) {
            if let Err(e) = client
                .disconnect(&session.topic, DisconnectReason::user_disconnected())
                .await
            {
                warn!("Failed to disconnect relay session {}: {}", session.topic, e);
            }
        }

        *self.state.write().await = ConnectionState::default();
        self.clear_storage().await;

        info!("Relay session disconnected");
    }

    /// Whether the relay client exists
    pub async fn is_initialized(&self) -> bool {
        self.client.read().await.is_some()
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        if self.initializing.load(Ordering::SeqCst) {
            return Lifecycle::Initializing;
        }
        if !self.is_initialized().await {
            return Lifecycle::Uninitialized;
        }
        if self.state.read().await.session.is_some() {
            Lifecycle::Connected
        } else {
            Lifecycle::Disconnected
        }
    }

    /// Whether a session is held
    pub async fn is_connected(&self) -> bool {
        self.state.read().await.session.is_some()
    }

    pub async fn address(&self) -> Option<String> {
        self.state.read().await.address.clone()
    }

    pub async fn chain(&self) -> Option<ChainId> {
        self.state.read().await.chain.clone()
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    pub async fn status(&self) -> ConnectionStatus {
        let lifecycle = self.lifecycle().await;
        let state = self.state.read().await;

        ConnectionStatus {
            lifecycle,
            connected: state.session.is_some(),
            chain: state.chain.as_ref().map(ToString::to_string),
            address: state.address.clone(),
            topic: state.session.as_ref().map(|s| s.topic.clone()),
            peer: state
                .session
                .as_ref()
                .and_then(|s| s.peer_name().map(str::to_string)),
            expiry: state.session.as_ref().and_then(|s| s.expiry),
        }
    }

    /// Client handle, waiting for an in-flight initialize to finish first
    async fn client_handle(&self) -> Result<Arc<dyn RelayClient>> {
        drop(self.init_lock.lock().await);
        self.client
            .read()
            .await
            .clone()
            .ok_or(Error::NotInitialized)
    }

    async fn negotiate(&self, client: &dyn RelayClient, chain: &ChainId) -> Result<Session> {
        let pending = client.connect(ConnectParams::for_chain(chain)).await?;

        if let Some(uri) = pending.uri.as_deref() {
            self.display.open(uri);
        }

        let session = pending.approval.await?;
        session.validate()?;
        Ok(session)
    }

    async fn restore(&self) {
        let saved = match (
            self.store.get(SESSION_KEY).await,
            self.store.get(CHAIN_KEY).await,
        ) {
            (Ok(session), Ok(chain)) => (session, chain),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to read saved session: {}", e);
                self.clear_storage().await;
                return;
            }
        };

        let (Some(raw_session), Some(raw_chain)) = saved else {
            debug!("No saved relay session");
            return;
        };

        let parsed = Session::from_json(&raw_session)
            .and_then(|session| raw_chain.parse::<ChainId>().map(|chain| (session, chain)));

        match parsed {
            Ok((session, _)) if session.is_expired(Utc::now()) => {
                info!("Saved relay session {} has expired", session.topic);
                self.clear_storage().await;
            }
            Ok((session, chain)) => {
                let address = self.derive_address(&session, &chain);
                info!("Restored relay session {} on {}", session.topic, chain);

                let mut state = self.state.write().await;
                state.session = Some(session);
                state.chain = Some(chain);
                state.address = address;
            }
            Err(e) => {
                error!("Failed to restore saved session: {}", e);
                self.clear_storage().await;
            }
        }
    }

    fn derive_address(&self, session: &Session, chain: &ChainId) -> Option<String> {
        match extract_address(session, chain) {
            Ok(address) => Some(address),
            Err(e) => {
                warn!("Failed to extract address: {}", e);
                None
            }
        }
    }

    async fn persist(&self, session: &Session, chain: &ChainId) {
        let json = match session.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize session: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(SESSION_KEY, &json).await {
            warn!("Failed to save session: {}", e);
        }
        if let Err(e) = self.store.set(CHAIN_KEY, &chain.to_string()).await {
            warn!("Failed to save chain: {}", e);
        }
    }

    async fn clear_storage(&self) {
        for key in [SESSION_KEY, CHAIN_KEY] {
            if let Err(e) = self.store.remove(key).await {
                warn!("Failed to remove {}: {}", key, e);
            }
        }
    }
}
