//! Error types for Hashledger

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The chain has no blocks. Only reachable through a bug: genesis is
    /// created together with the chain.
    #[error("Chain is empty; the genesis block is missing")]
    EmptyChain,
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Proof-of-work search was cancelled")]
    MiningCancelled,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
