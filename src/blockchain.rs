// Thin re-export module: implementation is in `blockchain/core.rs` so the
// block, validation and chain-management pieces can evolve separately.

pub mod core;
pub use core::*;
