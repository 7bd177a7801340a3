use crate::blockchain::{BlockNode, LedgerState};
use crate::diff::{DelayedOutputDiff, DiffDirection, FileContractDiff};
use crate::error::{abort, ConsensusFault, OrAbort};
use crate::types::{BlockHeight, ContractId, ProofStatus};
use tracing::debug;

impl LedgerState {
    /// Finds every file contract whose proof window closes at the node's
    /// height and applies the missed proof branch to each.
    pub fn apply_file_contract_maintenance(&mut self, node: &mut BlockNode, maturity_delay: BlockHeight) {
        // The contract set is not touched until the scan is finished.
        let mut expired: Vec<ContractId> = Vec::new();
        for (id, fc) in &self.file_contracts {
            if fc.window_end < node.height {
                abort(ConsensusFault::ExpiredContractMissed {
                    id: *id,
                    window_end: fc.window_end,
                    height: node.height,
                });
            }
            if fc.window_end == node.height {
                expired.push(*id);
            }
        }

        if !expired.is_empty() {
            debug!(height = node.height, count = expired.len(), "File contracts expired without proof");
        }
        for id in expired {
            self.apply_missed_storage_proof(node, id, maturity_delay);
        }
    }

    /// Pays out the missed proof outputs of a contract expiring at the
    /// node's height, then removes the contract.
    pub fn apply_missed_storage_proof(&mut self, node: &mut BlockNode, id: ContractId, maturity_delay: BlockHeight) {
        let fc = match self.file_contracts.get(&id) {
            Some(fc) => fc.clone(),
            None => abort(ConsensusFault::MissingFileContract(id)),
        };
        if fc.window_end != node.height {
            abort(ConsensusFault::StorageProofTiming {
                id,
                window_end: fc.window_end,
                height: node.height,
            });
        }

        let maturity_height = node.height + maturity_delay;
        for (i, output) in fc.missed_proof_outputs.iter().enumerate() {
            let output_id = id.storage_proof_output_id(ProofStatus::Missed, i as u64);
            if self.delayed_height_of(&output_id).is_some() || self.outputs.contains_key(&output_id) {
                abort(ConsensusFault::PayoutAlreadyPaid(output_id));
            }

            let diff = DelayedOutputDiff {
                direction: DiffDirection::Apply,
                id: output_id,
                output: output.clone(),
                maturity_height,
            };
            self.commit_delayed_output_diff(&diff, DiffDirection::Apply).or_abort();
            node.record_delayed_output_diff(diff);
        }

        // The contract never completed, so its creation is what gets undone.
        let diff = FileContractDiff {
            direction: DiffDirection::Revert,
            id,
            file_contract: fc,
        };
        self.commit_file_contract_diff(&diff, DiffDirection::Apply).or_abort();
        node.record_file_contract_diff(diff);
    }
}
