//! End-of-block maintenance for the consensus set
//!
//! Runs once per block, after every transaction in the block has been
//! applied, in a fixed order so that every node produces the same diff log:
//!
//! 1. [`payouts`] - the block's miner payouts become delayed outputs
//! 2. [`maturation`] - delayed outputs maturing at this height become spendable
//! 3. [`contracts`] - file contracts expiring without a storage proof pay
//!    their missed proof outputs and leave the contract set
//!
//! Every phase records its changes on the block node before committing them
//! to the [`LedgerState`]. An invariant breach aborts the process.

pub mod contracts;
pub mod maturation;
pub mod payouts;

use crate::blockchain::{BlockNode, LedgerState};
use crate::types::BlockHeight;
use tracing::debug;

impl LedgerState {
    /// Applies block-level alterations to the consensus set.
    pub fn apply_maintenance(&mut self, node: &mut BlockNode, maturity_delay: BlockHeight) {
        self.apply_miner_payouts(node, maturity_delay);
        self.apply_matured_outputs(node, maturity_delay);
        self.apply_file_contract_maintenance(node, maturity_delay);
        debug!(
            height = node.height,
            outputs = node.output_diffs.len(),
            delayed = node.delayed_output_diffs.len(),
            contracts = node.file_contract_diffs.len(),
            "Applied maintenance"
        );
    }
}
