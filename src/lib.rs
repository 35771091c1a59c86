//! LinkChain - an append-only, hash-linked ledger shared between peers
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, hashing, validation rules and the local chain
//! - [`ledger`] - Shared, lock-protected handle with tail notifications
//!
//! ## Networking & Integration
//! - [`network`] - WebSocket peer protocol and longest-chain sync
//! - [`api`] - HTTP request interface
//! - [`node`] - Orchestration of ledger, network and API
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod ledger;

// ============================================================================
// Networking & Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod network;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use blockchain::{Block, Blockchain};
pub use error::{ChainError, Result};
pub use ledger::Ledger;
