use crate::diff::{DelayedOutputDiff, DiffDirection, FileContractDiff, OutputDiff};
use crate::error::ConsensusFault;
use crate::types::{BlockHeight, ContractId, DelayedOutput, FileContract, Output, OutputId};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Outputs maturing at one height, keyed by output id.
pub type DelayedBucket = BTreeMap<OutputId, DelayedOutput>;

/// The authoritative maps of the consensus set.
///
/// Ordered maps keep every iteration, and therefore every diff log built from
/// one, identical across nodes. The delayed index is sparse: a height with no
/// pending outputs has no bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub outputs: BTreeMap<OutputId, Output>,
    pub delayed_outputs: BTreeMap<BlockHeight, DelayedBucket>,
    pub file_contracts: BTreeMap<ContractId, FileContract>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self, id: &OutputId) -> Option<&Output> {
        self.outputs.get(id)
    }

    pub fn delayed_bucket(&self, height: BlockHeight) -> Option<&DelayedBucket> {
        self.delayed_outputs.get(&height)
    }

    pub fn delayed_output(&self, height: BlockHeight, id: &OutputId) -> Option<&DelayedOutput> {
        self.delayed_outputs.get(&height).and_then(|bucket| bucket.get(id))
    }

    /// Height of the bucket holding `id`, searching every bucket.
    pub fn delayed_height_of(&self, id: &OutputId) -> Option<BlockHeight> {
        self.delayed_outputs
            .iter()
            .find(|(_, bucket)| bucket.contains_key(id))
            .map(|(&height, _)| height)
    }

    pub fn file_contract(&self, id: &ContractId) -> Option<&FileContract> {
        self.file_contracts.get(id)
    }

    /// Total value held in matured outputs by `address`.
    pub fn spendable_balance(&self, address: &crate::crypto::Address) -> crate::types::Currency {
        self.outputs
            .values()
            .filter(|o| &o.unlock_hash == address)
            .map(|o| o.value)
            .sum()
    }

    /// Total value still waiting to mature for `address`.
    pub fn pending_balance(&self, address: &crate::crypto::Address) -> crate::types::Currency {
        self.delayed_outputs
            .values()
            .flat_map(|bucket| bucket.values())
            .filter(|d| &d.output.unlock_hash == address)
            .map(|d| d.output.value)
            .sum()
    }

    pub fn delayed_output_count(&self) -> usize {
        self.delayed_outputs.values().map(|bucket| bucket.len()).sum()
    }

    pub fn commit_output_diff(
        &mut self,
        diff: &OutputDiff,
        dir: DiffDirection,
    ) -> Result<(), ConsensusFault> {
        let conflict = || ConsensusFault::OutputDiffConflict(diff.id);
        match self.outputs.entry(diff.id) {
            Entry::Vacant(slot) if diff.direction == dir => {
                slot.insert(diff.output.clone());
            }
            Entry::Occupied(slot) if diff.direction != dir && *slot.get() == diff.output => {
                slot.remove();
            }
            _ => return Err(conflict()),
        }
        Ok(())
    }

    pub fn commit_delayed_output_diff(
        &mut self,
        diff: &DelayedOutputDiff,
        dir: DiffDirection,
    ) -> Result<(), ConsensusFault> {
        let conflict = || ConsensusFault::DelayedOutputDiffConflict {
            id: diff.id,
            height: diff.maturity_height,
        };

        if diff.direction == dir {
            if self.delayed_output(diff.maturity_height, &diff.id).is_some() {
                return Err(conflict());
            }
            self.delayed_outputs
                .entry(diff.maturity_height)
                .or_default()
                .insert(
                    diff.id,
                    DelayedOutput {
                        output: diff.output.clone(),
                        maturity_height: diff.maturity_height,
                    },
                );
            return Ok(());
        }

        let bucket = self
            .delayed_outputs
            .get_mut(&diff.maturity_height)
            .ok_or_else(conflict)?;
        let recorded = bucket.get(&diff.id).map_or(false, |d| d.output == diff.output);
        if !recorded {
            return Err(conflict());
        }
        bucket.remove(&diff.id);
        if bucket.is_empty() {
            self.delayed_outputs.remove(&diff.maturity_height);
        }
        Ok(())
    }

    pub fn commit_file_contract_diff(
        &mut self,
        diff: &FileContractDiff,
        dir: DiffDirection,
    ) -> Result<(), ConsensusFault> {
        let conflict = || ConsensusFault::FileContractDiffConflict(diff.id);
        match self.file_contracts.entry(diff.id) {
            Entry::Vacant(slot) if diff.direction == dir => {
                slot.insert(diff.file_contract.clone());
            }
            Entry::Occupied(slot) if diff.direction != dir && *slot.get() == diff.file_contract => {
                slot.remove();
            }
            _ => return Err(conflict()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address_from_string;

    fn delayed_diff(byte: u8, height: BlockHeight) -> DelayedOutputDiff {
        DelayedOutputDiff {
            direction: DiffDirection::Apply,
            id: OutputId([byte; 32]),
            output: Output::new(100, address_from_string("alice")),
            maturity_height: height,
        }
    }

    #[test]
    fn test_output_diff_apply_then_revert() {
        let mut state = LedgerState::new();
        let diff = OutputDiff {
            direction: DiffDirection::Apply,
            id: OutputId([1; 32]),
            output: Output::new(5, [0; 32]),
        };
        state.commit_output_diff(&diff, DiffDirection::Apply).unwrap();
        assert_eq!(state.output(&diff.id), Some(&diff.output));
        state.commit_output_diff(&diff, DiffDirection::Revert).unwrap();
        assert_eq!(state, LedgerState::new());
    }

    #[test]
    fn test_output_diff_double_apply_is_a_conflict() {
        let mut state = LedgerState::new();
        let diff = OutputDiff {
            direction: DiffDirection::Apply,
            id: OutputId([1; 32]),
            output: Output::new(5, [0; 32]),
        };
        state.commit_output_diff(&diff, DiffDirection::Apply).unwrap();
        assert_eq!(
            state.commit_output_diff(&diff, DiffDirection::Apply),
            Err(ConsensusFault::OutputDiffConflict(diff.id))
        );
    }

    #[test]
    fn test_delayed_removal_drops_empty_bucket() {
        let mut state = LedgerState::new();
        let first = delayed_diff(1, 20);
        let second = delayed_diff(2, 20);
        state.commit_delayed_output_diff(&first, DiffDirection::Apply).unwrap();
        state.commit_delayed_output_diff(&second, DiffDirection::Apply).unwrap();
        assert_eq!(state.delayed_bucket(20).map(|b| b.len()), Some(2));

        state.commit_delayed_output_diff(&first, DiffDirection::Revert).unwrap();
        assert_eq!(state.delayed_bucket(20).map(|b| b.len()), Some(1));
        state.commit_delayed_output_diff(&second, DiffDirection::Revert).unwrap();
        assert!(state.delayed_bucket(20).is_none());
    }

    #[test]
    fn test_revert_diff_removes_when_applied() {
        let mut state = LedgerState::new();
        let mut diff = delayed_diff(3, 9);
        state.commit_delayed_output_diff(&diff, DiffDirection::Apply).unwrap();

        diff.direction = DiffDirection::Revert;
        state.commit_delayed_output_diff(&diff, DiffDirection::Apply).unwrap();
        assert_eq!(state.delayed_output_count(), 0);
        // Reverting a removal puts the output back.
        state.commit_delayed_output_diff(&diff, DiffDirection::Revert).unwrap();
        assert!(state.delayed_output(9, &diff.id).is_some());
    }

    #[test]
    fn test_delayed_removal_of_missing_output_is_a_conflict() {
        let mut state = LedgerState::new();
        let diff = delayed_diff(4, 30);
        assert_eq!(
            state.commit_delayed_output_diff(&diff, DiffDirection::Revert),
            Err(ConsensusFault::DelayedOutputDiffConflict { id: diff.id, height: 30 })
        );
    }

    #[test]
    fn test_file_contract_removal_requires_matching_contract() {
        let mut state = LedgerState::new();
        let diff = FileContractDiff {
            direction: DiffDirection::Apply,
            id: ContractId([9; 32]),
            file_contract: FileContract { window_end: 20, ..Default::default() },
        };
        state.commit_file_contract_diff(&diff, DiffDirection::Apply).unwrap();

        let stale = FileContractDiff {
            file_contract: FileContract { window_end: 21, ..Default::default() },
            ..diff.clone()
        };
        assert!(state.commit_file_contract_diff(&stale, DiffDirection::Revert).is_err());
        state.commit_file_contract_diff(&diff, DiffDirection::Revert).unwrap();
        assert!(state.file_contracts.is_empty());
    }

    #[test]
    fn test_delayed_height_of_searches_every_bucket() {
        let mut state = LedgerState::new();
        let id = OutputId([9; 32]);
        assert_eq!(state.delayed_height_of(&id), None);
        state
            .commit_delayed_output_diff(&delayed_diff(9, 40), DiffDirection::Apply)
            .unwrap();
        assert_eq!(state.delayed_height_of(&id), Some(40));
    }

    #[test]
    fn test_balances() {
        let mut state = LedgerState::new();
        let alice = address_from_string("alice");
        state.outputs.insert(OutputId([1; 32]), Output::new(40, alice));
        state
            .commit_delayed_output_diff(&delayed_diff(2, 50), DiffDirection::Apply)
            .unwrap();
        assert_eq!(state.spendable_balance(&alice), 40);
        assert_eq!(state.pending_balance(&alice), 100);
        assert_eq!(state.pending_balance(&address_from_string("bob")), 0);
    }
}
