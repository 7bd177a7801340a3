use crate::blockchain::{BlockNode, LedgerState};
use crate::diff::{DelayedOutputDiff, DiffDirection};
use crate::error::{abort, ConsensusFault, OrAbort};
use crate::types::BlockHeight;

impl LedgerState {
    /// Adds a block's miner payouts to the consensus set as delayed outputs
    /// maturing `maturity_delay` blocks from now.
    pub fn apply_miner_payouts(&mut self, node: &mut BlockNode, maturity_delay: BlockHeight) {
        let maturity_height = node.height + maturity_delay;
        for i in 0..node.block.miner_payouts.len() {
            // A payout id that already exists means this block was processed
            // twice or two ids collided.
            let id = node.block.miner_payout_id(i as u64);
            if self.delayed_output(maturity_height, &id).is_some() || self.outputs.contains_key(&id) {
                abort(ConsensusFault::PayoutAlreadyPaid(id));
            }

            let diff = DelayedOutputDiff {
                direction: DiffDirection::Apply,
                id,
                output: node.block.miner_payouts[i].clone(),
                maturity_height,
            };
            self.commit_delayed_output_diff(&diff, DiffDirection::Apply).or_abort();
            node.record_delayed_output_diff(diff);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::blockchain::{Block, BlockNode, LedgerState};
    use crate::crypto::address_from_string;
    use crate::diff::DiffDirection;
    use crate::types::{BlockId, Output};

    fn payout_block(height: u64, values: &[u128]) -> Block {
        let payouts = values
            .iter()
            .map(|v| Output::new(*v, address_from_string("miner")))
            .collect();
        Block::new(height, BlockId::default(), payouts, vec![])
    }

    #[test]
    fn test_one_delayed_output_per_payout() {
        let mut state = LedgerState::new();
        let mut node = BlockNode::new(payout_block(5, &[100, 20, 3]));
        state.apply_miner_payouts(&mut node, 10);

        let bucket = state.delayed_bucket(15).expect("bucket at 15");
        assert_eq!(bucket.len(), 3);
        for (i, diff) in node.delayed_output_diffs.iter().enumerate() {
            assert_eq!(diff.direction, DiffDirection::Apply);
            assert_eq!(diff.id, node.block.miner_payout_id(i as u64));
            assert_eq!(diff.maturity_height, 15);
            assert_eq!(bucket.get(&diff.id).map(|d| &d.output), Some(&node.block.miner_payouts[i]));
        }
        assert!(state.outputs.is_empty());
    }

    #[test]
    fn test_block_without_payouts_records_nothing() {
        let mut state = LedgerState::new();
        let mut node = BlockNode::new(payout_block(5, &[]));
        state.apply_miner_payouts(&mut node, 10);
        assert!(node.delayed_output_diffs.is_empty());
        assert_eq!(state, LedgerState::new());
    }

    #[test]
    #[should_panic(expected = "already in the consensus set")]
    fn test_paying_a_block_twice_aborts() {
        let mut state = LedgerState::new();
        let block = payout_block(5, &[100]);
        let mut first = BlockNode::new(block.clone());
        state.apply_miner_payouts(&mut first, 10);
        let mut second = BlockNode::new(block);
        state.apply_miner_payouts(&mut second, 10);
    }

    #[test]
    #[should_panic(expected = "already in the consensus set")]
    fn test_payout_already_mature_aborts() {
        let mut state = LedgerState::new();
        let block = payout_block(5, &[100]);
        state
            .outputs
            .insert(block.miner_payout_id(0), Output::new(100, address_from_string("miner")));
        let mut node = BlockNode::new(block);
        state.apply_miner_payouts(&mut node, 10);
    }
}
