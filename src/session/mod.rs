//! Relay session management
//!
//! Provides the session lifecycle for the relay connector:
//! - Typed, validated session records (`types`)
//! - Durable key/value persistence (`storage`)
//! - Connect / restore / disconnect orchestration (`manager`)
//!
//! # Architecture
//!
//! ```text
//! RelayClientFactory → SessionManager → KeyValueStore
//!                           ↓
//!                     PairingDisplay
//! ```

pub mod manager;
pub mod storage;
pub mod types;

pub use manager::{ConnectionStatus, Lifecycle, SessionManager};
pub use storage::{FileStore, KeyValueStore, MemoryStore, CHAIN_KEY, SESSION_KEY};
pub use types::{extract_address, AccountId, AppMetadata, Peer, Session, SessionNamespace};
