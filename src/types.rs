//! Ledger entities: outputs, file contracts and their identifiers

use crate::crypto::{Address, Sha256Hash};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub type BlockHeight = u64;

/// Currency amounts, in the chain's smallest unit.
pub type Currency = u128;

/// Number of blocks a payout waits before it can be spent.
pub const DEFAULT_MATURITY_DELAY: BlockHeight = 144;

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        pub struct $name(pub Sha256Hash);

        impl $name {
            pub fn as_bytes(&self) -> &Sha256Hash {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }
    };
}

hash_id!(
    /// Identifier of a block, the hash of its header.
    BlockId
);
hash_id!(
    /// Identifier of a spendable or delayed output.
    OutputId
);
hash_id!(
    /// Identifier of a file contract.
    ContractId
);

/// Whether a storage proof output pays the valid or the missed branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofStatus {
    Missed,
    Valid,
}

impl ProofStatus {
    fn tag(self) -> u8 {
        match self {
            ProofStatus::Missed => 0,
            ProofStatus::Valid => 1,
        }
    }
}

impl ContractId {
    /// Identifier of the `index`th storage proof output of this contract.
    pub fn storage_proof_output_id(&self, status: ProofStatus, index: u64) -> OutputId {
        let mut hasher = Sha256::new();
        hasher.update(b"storage proof");
        hasher.update(self.0);
        hasher.update([status.tag()]);
        hasher.update(index.to_le_bytes());
        OutputId(hasher.finalize().into())
    }
}

/// A value locked to a spending condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: Currency,
    pub unlock_hash: Address,
}

impl Output {
    pub fn new(value: Currency, unlock_hash: Address) -> Self {
        Output { value, unlock_hash }
    }

    pub fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(self.value.to_le_bytes());
        hasher.update(self.unlock_hash);
    }
}

/// An output that becomes spendable once the chain reaches `maturity_height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedOutput {
    pub output: Output,
    pub maturity_height: BlockHeight,
}

/// A storage agreement. If no storage proof lands by `window_end`, the
/// `missed_proof_outputs` are paid out instead of the valid ones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileContract {
    pub file_size: u64,
    pub file_merkle_root: Sha256Hash,
    pub window_start: BlockHeight,
    pub window_end: BlockHeight,
    pub payout: Currency,
    pub valid_proof_outputs: Vec<Output>,
    pub missed_proof_outputs: Vec<Output>,
    pub unlock_hash: Address,
    pub revision_number: u64,
}

impl FileContract {
    pub fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(self.file_size.to_le_bytes());
        hasher.update(self.file_merkle_root);
        hasher.update(self.window_start.to_le_bytes());
        hasher.update(self.window_end.to_le_bytes());
        hasher.update(self.payout.to_le_bytes());
        for output in self.valid_proof_outputs.iter().chain(&self.missed_proof_outputs) {
            output.hash_into(hasher);
        }
        hasher.update(self.unlock_hash);
        hasher.update(self.revision_number.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_proof_output_ids_are_distinct() {
        let fcid = ContractId([7u8; 32]);
        let missed0 = fcid.storage_proof_output_id(ProofStatus::Missed, 0);
        let missed1 = fcid.storage_proof_output_id(ProofStatus::Missed, 1);
        let valid0 = fcid.storage_proof_output_id(ProofStatus::Valid, 0);
        assert_ne!(missed0, missed1);
        assert_ne!(missed0, valid0);
        assert_eq!(missed0, fcid.storage_proof_output_id(ProofStatus::Missed, 0));
    }

    #[test]
    fn test_id_display_is_hex() {
        let id = OutputId([0xab; 32]);
        assert_eq!(id.to_string(), "ab".repeat(32));
    }
}
