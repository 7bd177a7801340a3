//! Integration tests for storing block nodes and rebuilding the consensus set

use tempfile::TempDir;
use trinity_maintenance::blockchain::{Block, ConsensusSet};
use trinity_maintenance::config::{ConsensusConfig, VerifyMode};
use trinity_maintenance::crypto::address_from_string;
use trinity_maintenance::error::ChainError;
use trinity_maintenance::persistence::{Database, Persistence};
use trinity_maintenance::types::{FileContract, Output};

fn config() -> ConsensusConfig {
    ConsensusConfig {
        maturity_delay: 4,
        verify_invariants: VerifyMode::Always,
    }
}

fn open_db(dir: &TempDir) -> Result<Box<dyn Persistence>, Box<dyn std::error::Error>> {
    let path = dir.path().join("consensus.db");
    Ok(Box::new(Database::open(path.to_str().ok_or("non utf-8 path")?)?))
}

fn grow(cs: &mut ConsensusSet, blocks: u64) -> Result<(), ChainError> {
    let miner = address_from_string("miner");
    let host = address_from_string("host");
    for _ in 0..blocks {
        let height = cs.height() + 1;
        let contracts = if height % 3 == 0 {
            vec![FileContract {
                window_start: height + 1,
                window_end: height + 2,
                missed_proof_outputs: vec![Output::new(25, host)],
                ..Default::default()
            }]
        } else {
            vec![]
        };
        let block = Block::new(height, cs.tip().block.id(), vec![Output::new(100, miner)], contracts);
        cs.accept_block(block)?;
    }
    Ok(())
}

#[test]
fn test_reload_rebuilds_identical_state() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let expected = {
        let mut cs = ConsensusSet::load(config(), open_db(&dir)?)?;
        grow(&mut cs, 12)?;
        cs.state().clone()
    };

    let reloaded = ConsensusSet::load(config(), open_db(&dir)?)?;
    assert_eq!(reloaded.height(), 12);
    assert_eq!(reloaded.state(), &expected);
    Ok(())
}

#[test]
fn test_revert_removes_persisted_node() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mut cs = ConsensusSet::load(config(), open_db(&dir)?)?;
    grow(&mut cs, 8)?;
    let at_seven = {
        let mut probe = ConsensusSet::load(config(), open_db(&dir)?)?;
        probe.revert_tip()?;
        probe.state().clone()
    };

    // The probe removed height 8 from the shared database.
    let db = open_db(&dir)?;
    assert!(db.load_block_node(8)?.is_none());
    assert!(db.load_block_node(7)?.is_some());

    cs.revert_tip()?;
    assert_eq!(cs.state(), &at_seven);
    Ok(())
}

#[test]
fn test_genesis_cannot_be_reverted() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mut cs = ConsensusSet::load(config(), open_db(&dir)?)?;
    assert!(matches!(cs.revert_tip(), Err(ChainError::EmptyChain)));
    Ok(())
}
