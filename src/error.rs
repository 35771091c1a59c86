//! Error types for LinkChain
//!
//! Every validation failure is a recoverable value: a node that rejects a
//! block or a chain keeps running and keeps its current chain.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The message did not have the shape of a block after deserialization.
    #[error("Malformed block: {0}")]
    MalformedBlock(String),

    #[error("Invalid index: expected {expected}, got {found}")]
    IndexMismatch { expected: u64, found: u64 },

    #[error("Invalid previous hash: expected {expected}, got {}", .found.as_deref().unwrap_or("null"))]
    PreviousHashMismatch {
        expected: String,
        found: Option<String>,
    },

    /// The stated hash does not match the hash recomputed from the block's fields.
    #[error("Invalid hash: computed {computed}, block states {stated}")]
    HashMismatch { computed: String, stated: String },

    #[error("Timestamp {timestamp} outside accepted window [{earliest}, {latest}]")]
    TimestampOutOfRange {
        timestamp: u64,
        earliest: u64,
        latest: u64,
    },

    #[error("Chain is empty")]
    EmptyChain,

    #[error("First block does not match the genesis block")]
    GenesisMismatch,

    #[error("Invalid chain at position {position}: {reason}")]
    ChainInvalid {
        position: usize,
        reason: Box<ChainError>,
    },

    #[error("Received chain is not longer than the local chain ({candidate} <= {local})")]
    ChainNotLonger { candidate: usize, local: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl ChainError {
    /// True for outcomes of the validation and fork-resolution rules, as
    /// opposed to environmental failures (config, network, IO).
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            ChainError::Config(_)
                | ChainError::Network(_)
                | ChainError::Serialization(_)
                | ChainError::Io(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChainError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChainError::Network(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
