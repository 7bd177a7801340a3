//! Error types for TrinityChain maintenance
//!
//! Two tiers live here. [`ChainError`] covers everything a caller can
//! reasonably recover from (a badly linked block, a broken database, a bad
//! config file). [`ConsensusFault`] covers breaches of the consensus set's
//! invariants: once one is observed the ledger can no longer be trusted, so
//! faults are escalated through [`abort`] instead of being returned upward.

use crate::types::{BlockHeight, ContractId, OutputId};
use std::fmt;

#[derive(Debug, Clone)]
pub enum ChainError {
    InvalidBlockLinkage(String),
    InvalidBlock(String),
    DatabaseError(String),
    ConfigError(String),
    IoError(String),
    SerializationError(String),
    EmptyChain,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::InvalidBlockLinkage(msg) => write!(f, "Invalid block linkage: {}", msg),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            ChainError::EmptyChain => write!(f, "Cannot revert past the genesis block"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

/// A breach of a consensus set invariant.
///
/// Faults signal either an engine bug or a corrupted ledger. They are never
/// converted into a [`ChainError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusFault {
    #[error("payout {0} is already in the consensus set")]
    PayoutAlreadyPaid(OutputId),
    #[error("delayed output {0} is already in the matured outputs set")]
    OutputAlreadyMature(OutputId),
    #[error("missed proof triggered for non existing file contract {0}")]
    MissingFileContract(ContractId),
    #[error("missed proof triggered for file contract {id} expiring at {window_end}, not at {height}")]
    StorageProofTiming {
        id: ContractId,
        window_end: BlockHeight,
        height: BlockHeight,
    },
    #[error("file contract {id} expired at {window_end} but is still live at {height}")]
    ExpiredContractMissed {
        id: ContractId,
        window_end: BlockHeight,
        height: BlockHeight,
    },
    #[error("delayed output bucket at {height} still holds {remaining} outputs after maturation")]
    NonEmptyBucket { height: BlockHeight, remaining: usize },
    #[error("output diff for {0} conflicts with the matured outputs set")]
    OutputDiffConflict(OutputId),
    #[error("delayed output diff for {id} conflicts with the bucket at {height}")]
    DelayedOutputDiffConflict { id: OutputId, height: BlockHeight },
    #[error("file contract diff for {0} conflicts with the file contract set")]
    FileContractDiffConflict(ContractId),
    #[error("output {id} is both mature and delayed until {height}")]
    OutputNotDisjoint { id: OutputId, height: BlockHeight },
    #[error("delayed output {id} is queued in both bucket {first} and bucket {second}")]
    DuplicateDelayedOutput {
        id: OutputId,
        first: BlockHeight,
        second: BlockHeight,
    },
    #[error("delayed output bucket at {bucket} is outside the live window at height {height}")]
    StaleDelayedBucket { bucket: BlockHeight, height: BlockHeight },
    #[error("delayed output {id} is filed under {bucket} but matures at {maturity_height}")]
    MisfiledDelayedOutput {
        id: OutputId,
        bucket: BlockHeight,
        maturity_height: BlockHeight,
    },
}

/// Log the fault and stop. With `panic = "abort"` this takes the process
/// down; a partially mutated ledger must never be used again.
#[cold]
pub fn abort(fault: ConsensusFault) -> ! {
    tracing::error!(%fault, "consensus set corrupted, aborting");
    panic!("consensus fault: {}", fault)
}

/// Escalates a faulted result into [`abort`].
pub trait OrAbort<T> {
    fn or_abort(self) -> T;
}

impl<T> OrAbort<T> for std::result::Result<T, ConsensusFault> {
    #[track_caller]
    fn or_abort(self) -> T {
        match self {
            Ok(value) => value,
            Err(fault) => abort(fault),
        }
    }
}
