// core.rs splits the ledger engine into submodules: the block and its hash,
// the linkage/structure validation rules, and the chain that applies them.
pub mod block;
pub mod chain;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use validation::*;
