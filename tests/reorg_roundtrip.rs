//! Property tests: reverting blocks restores the exact prior ledger

use proptest::prelude::*;
use trinity_maintenance::blockchain::{check_invariants, Block, BlockNode, ConsensusSet, LedgerState};
use trinity_maintenance::config::{ConsensusConfig, VerifyMode};
use trinity_maintenance::types::{FileContract, Output};

/// Shape of one generated block: payout values and, optionally, a contract
/// given as (window offset, missed proof values).
#[derive(Debug, Clone)]
struct BlockPlan {
    payouts: Vec<u128>,
    contract: Option<(u64, Vec<u128>)>,
}

fn arb_output_values(max: usize) -> impl Strategy<Value = Vec<u128>> {
    prop::collection::vec(1u128..=1_000_000u128, 0..=max)
}

fn arb_block_plan() -> impl Strategy<Value = BlockPlan> {
    (arb_output_values(3), prop::option::of((1u64..=6, arb_output_values(3))))
        .prop_map(|(payouts, contract)| BlockPlan { payouts, contract })
}

fn build_block(cs: &ConsensusSet, plan: &BlockPlan) -> Block {
    let height = cs.height() + 1;
    let recipient = [height as u8; 32];
    let payouts = plan.payouts.iter().map(|v| Output::new(*v, recipient)).collect();
    let contracts = plan
        .contract
        .iter()
        .map(|(window, missed)| FileContract {
            window_start: height + 1,
            window_end: height + 1 + window,
            missed_proof_outputs: missed.iter().map(|v| Output::new(*v, recipient)).collect(),
            ..Default::default()
        })
        .collect();
    Block::new(height, cs.tip().block.id(), payouts, contracts)
}

fn consensus_set(maturity_delay: u64) -> ConsensusSet {
    ConsensusSet::new(ConsensusConfig {
        maturity_delay,
        verify_invariants: VerifyMode::Always,
    })
    .expect("genesis")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_revert_restores_every_prior_state(
        delay in 1u64..=5,
        plans in prop::collection::vec(arb_block_plan(), 1..=20),
    ) {
        let mut cs = consensus_set(delay);
        let mut snapshots: Vec<LedgerState> = vec![cs.state().clone()];

        for plan in &plans {
            let block = build_block(&cs, plan);
            cs.accept_block(block).expect("block accepted");
            prop_assert_eq!(check_invariants(cs.state(), cs.height(), delay), Ok(()));
            snapshots.push(cs.state().clone());
        }

        // Unwind to genesis, comparing against each recorded state.
        snapshots.pop();
        while let Some(expected) = snapshots.pop() {
            if cs.height() == 0 {
                break;
            }
            cs.revert_tip().expect("revert");
            prop_assert_eq!(cs.state(), &expected);
        }
        prop_assert_eq!(cs.height(), 0);
        prop_assert_eq!(cs.state(), &LedgerState::new());
    }

    #[test]
    fn prop_replaying_diffs_matches_live_state(
        delay in 1u64..=5,
        plans in prop::collection::vec(arb_block_plan(), 1..=20),
    ) {
        let mut cs = consensus_set(delay);
        for plan in &plans {
            let block = build_block(&cs, plan);
            cs.accept_block(block).expect("block accepted");
        }

        let mut replayed = LedgerState::new();
        for node in &cs.path {
            node.apply_diffs(&mut replayed).expect("replay");
        }
        prop_assert_eq!(&replayed, cs.state());
    }

    #[test]
    fn prop_one_delayed_output_per_payout(
        height in 1u64..=1_000,
        delay in 1u64..=200,
        values in arb_output_values(8),
    ) {
        let mut state = LedgerState::new();
        let payouts: Vec<Output> = values.iter().map(|v| Output::new(*v, [7; 32])).collect();
        let block = Block::new(height, Default::default(), payouts.clone(), vec![]);
        let mut node = BlockNode::new(block);
        state.apply_maintenance(&mut node, delay);

        prop_assert!(state.outputs.is_empty());
        prop_assert_eq!(state.delayed_output_count(), payouts.len());
        for (i, payout) in payouts.iter().enumerate() {
            let id = node.block.miner_payout_id(i as u64);
            let delayed = state.delayed_output(height + delay, &id);
            prop_assert_eq!(delayed.map(|d| &d.output), Some(payout));
        }
    }
}
