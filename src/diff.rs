//! Invertible records of consensus set changes.
//!
//! A diff describes one insertion or removal precisely enough to undo it.
//! Committing a diff in the [`DiffDirection::Apply`] direction performs the
//! change it was recorded with; committing it in the
//! [`DiffDirection::Revert`] direction performs the opposite change.

use crate::types::{BlockHeight, ContractId, FileContract, Output, OutputId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffDirection {
    /// The entity is added to the consensus set.
    Apply,
    /// The entity is removed from the consensus set.
    Revert,
}

impl DiffDirection {
    pub fn inverse(self) -> Self {
        match self {
            DiffDirection::Apply => DiffDirection::Revert,
            DiffDirection::Revert => DiffDirection::Apply,
        }
    }
}

/// Change to the matured outputs set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDiff {
    pub direction: DiffDirection,
    pub id: OutputId,
    pub output: Output,
}

/// Change to the height-indexed delayed outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedOutputDiff {
    pub direction: DiffDirection,
    pub id: OutputId,
    pub output: Output,
    pub maturity_height: BlockHeight,
}

/// Change to the file contract set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContractDiff {
    pub direction: DiffDirection,
    pub id: ContractId,
    pub file_contract: FileContract,
}
