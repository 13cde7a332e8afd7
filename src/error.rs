//! Error types for the wallet connection layer

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet connection layer
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Chain identifier errors
    #[error("Invalid chain identifier: {0}")]
    InvalidChainId(String),

    #[error("Unsupported namespace: {0}")]
    UnsupportedNamespace(String),

    #[error("Invalid account identifier: {0}")]
    InvalidAccountId(String),

    // Session errors
    #[error("Relay client not initialized")]
    NotInitialized,

    #[error("A connect request is already pending")]
    ConnectInProgress,

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Session rejected by wallet: {0}")]
    SessionRejected(String),

    // Relay transport errors
    #[error("Relay client initialization failed: {0}")]
    RelayInit(String),

    #[error("Relay transport error: {0}")]
    RelayTransport(String),

    #[error("Relay request timed out after {0}ms")]
    RelayTimeout(u64),

    #[error("Relay returned an error ({code}): {message}")]
    RelayRpc { code: i64, message: String },

    // Extension wallet errors
    #[error("Extension wallet unavailable: {0}")]
    ExtensionUnavailable(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error came from the relay transport (as opposed to a local precondition)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::RelayInit(_)
                | Error::RelayTransport(_)
                | Error::RelayTimeout(_)
                | Error::RelayRpc { .. }
        )
    }

    /// Check if this error means the caller asked for something it cannot have yet
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::NotInitialized
                | Error::ConnectInProgress
                | Error::InvalidChainId(_)
                | Error::UnsupportedNamespace(_)
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from WebSocket errors
impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::RelayTransport(e.to_string())
    }
}
