use crate::blockchain::core::chain::Block;
use crate::blockchain::core::state::LedgerState;
use crate::error::{ChainError, ConsensusFault};
use crate::types::{BlockHeight, OutputId};
use std::collections::BTreeMap;

/// Contracts formed by a block must open their proof window in the future
/// and close it after it opens.
pub fn validate_file_contracts(block: &Block) -> Result<(), ChainError> {
    let height = block.height();
    for (i, fc) in block.file_contracts.iter().enumerate() {
        if fc.window_start <= height {
            return Err(ChainError::InvalidBlock(format!(
                "File contract {} opens its proof window at {}, not after block height {}.",
                i, fc.window_start, height
            )));
        }
        if fc.window_end <= fc.window_start {
            return Err(ChainError::InvalidBlock(format!(
                "File contract {} closes its proof window at {}, before it opens at {}.",
                i, fc.window_end, fc.window_start
            )));
        }
    }
    Ok(())
}

/// Whole-ledger sweep of the consensus set invariants as they must hold once
/// maintenance for `height` has run:
///
/// - no output is both mature and delayed, and none sits in two buckets;
/// - every delayed bucket lies in `(height, height + maturity_delay]` and
///   only holds outputs maturing at its own height;
/// - no file contract has a `window_end` below `height`.
pub fn check_invariants(
    state: &LedgerState,
    height: BlockHeight,
    maturity_delay: BlockHeight,
) -> Result<(), ConsensusFault> {
    let mut seen: BTreeMap<OutputId, BlockHeight> = BTreeMap::new();
    for (&bucket_height, bucket) in &state.delayed_outputs {
        if bucket_height <= height || bucket_height > height + maturity_delay {
            return Err(ConsensusFault::StaleDelayedBucket {
                bucket: bucket_height,
                height,
            });
        }
        for (id, delayed) in bucket {
            if delayed.maturity_height != bucket_height {
                return Err(ConsensusFault::MisfiledDelayedOutput {
                    id: *id,
                    bucket: bucket_height,
                    maturity_height: delayed.maturity_height,
                });
            }
            if state.outputs.contains_key(id) {
                return Err(ConsensusFault::OutputNotDisjoint {
                    id: *id,
                    height: bucket_height,
                });
            }
            if let Some(first) = seen.insert(*id, bucket_height) {
                return Err(ConsensusFault::DuplicateDelayedOutput {
                    id: *id,
                    first,
                    second: bucket_height,
                });
            }
        }
    }

    for (id, fc) in &state.file_contracts {
        if fc.window_end < height {
            return Err(ConsensusFault::ExpiredContractMissed {
                id: *id,
                window_end: fc.window_end,
                height,
            });
        }
    }
    Ok(())
}
