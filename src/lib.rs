//! Stacks AMM Wallet Connector Library
//!
//! Relay (WalletConnect) session management and navbar state for the
//! Stacks AMM front end.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod extension;
pub mod format;
pub mod relay;
pub mod session;
pub mod ui;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
