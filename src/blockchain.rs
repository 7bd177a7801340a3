// Thin re-export module: the consensus set lives in `blockchain/core.rs`,
// split into block/chain handling, ledger state and invariant validation.

pub mod core;
pub use self::core::*;
