use crate::blockchain::{BlockNode, LedgerState};
use crate::diff::{DelayedOutputDiff, DiffDirection, OutputDiff};
use crate::error::{abort, ConsensusFault, OrAbort};
use crate::types::BlockHeight;

impl LedgerState {
    /// Moves every delayed output maturing at the node's height into the
    /// matured outputs set and drops the emptied bucket.
    ///
    /// Each promotion records two diffs: the output entering the matured set,
    /// and the same output leaving the delayed bucket. Reverting the block
    /// replays both, restoring the output to its bucket.
    pub fn apply_matured_outputs(&mut self, node: &mut BlockNode, maturity_delay: BlockHeight) {
        // Nothing can have matured before the chain is older than the delay.
        if node.height <= maturity_delay {
            return;
        }

        let matured: Vec<_> = match self.delayed_outputs.get(&node.height) {
            Some(bucket) => bucket
                .iter()
                .map(|(id, delayed)| (*id, delayed.output.clone()))
                .collect(),
            None => Vec::new(),
        };

        for (id, output) in matured {
            if self.outputs.contains_key(&id) {
                abort(ConsensusFault::OutputAlreadyMature(id));
            }

            let promotion = OutputDiff {
                direction: DiffDirection::Apply,
                id,
                output: output.clone(),
            };
            self.commit_output_diff(&promotion, DiffDirection::Apply).or_abort();
            node.record_output_diff(promotion);

            let removal = DelayedOutputDiff {
                direction: DiffDirection::Revert,
                id,
                output,
                maturity_height: node.height,
            };
            self.commit_delayed_output_diff(&removal, DiffDirection::Apply).or_abort();
            node.record_delayed_output_diff(removal);
        }

        if let Some(bucket) = self.delayed_outputs.remove(&node.height) {
            if !bucket.is_empty() {
                abort(ConsensusFault::NonEmptyBucket {
                    height: node.height,
                    remaining: bucket.len(),
                });
            }
        }
    }
}
