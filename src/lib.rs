//! TrinityChain maintenance - the end-of-block phase of the consensus set
//!
//! After a block's transactions are applied, the consensus set credits the
//! block's miner payouts as delayed outputs, promotes delayed outputs that
//! reach maturity, and pays out the missed proof branch of file contracts
//! whose proof window closed without a storage proof. Every change is
//! recorded as an invertible diff on the block node so a reorg can undo it.
//!
//! # Architecture
//!
//! ## Consensus Set
//! - [`blockchain`] - Blocks, block nodes, the ledger maps and invariant checks
//! - [`maintenance`] - Miner payouts, maturation and file contract expiry
//! - [`diff`] - Apply/Revert diff records
//! - [`types`] - Outputs, file contracts and their identifiers
//!
//! ## Storage
//! - [`persistence`] - Block node diff logs (SQLite or in-memory)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`crypto`] - Hashing and address helpers
//! - [`error`] - Recoverable errors and fatal consensus faults

#![forbid(unsafe_code)]

// ============================================================================
// Consensus Set
// ============================================================================
pub mod blockchain;
pub mod diff;
pub mod maintenance;
pub mod types;

// ============================================================================
// Storage
// ============================================================================
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod crypto;
pub mod error;
