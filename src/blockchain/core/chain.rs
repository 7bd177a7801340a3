use crate::config::ConsensusConfig;
use crate::crypto::Sha256Hash;
use crate::diff::{DelayedOutputDiff, DiffDirection, FileContractDiff, OutputDiff};
use crate::error::{ChainError, ConsensusFault, OrAbort};
use crate::persistence::{InMemoryPersistence, Persistence};
use crate::types::{BlockHeight, BlockId, ContractId, FileContract, Output, OutputId};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub height: BlockHeight,
    pub timestamp: u64,
    pub parent_id: BlockId,
    pub merkle_root: Sha256Hash,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.parent_id.as_bytes());
        hasher.update(self.merkle_root);
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }
}

/// The parts of a block the consensus set cares about at maintenance time:
/// the miner payouts and the file contracts its transactions formed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub miner_payouts: Vec<Output>,
    pub file_contracts: Vec<FileContract>,
}

impl Block {
    pub fn new(
        height: BlockHeight,
        parent_id: BlockId,
        miner_payouts: Vec<Output>,
        file_contracts: Vec<FileContract>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let merkle_root = Block::calculate_merkle_root(&miner_payouts, &file_contracts);

        Block {
            header: BlockHeader {
                height,
                timestamp,
                parent_id,
                merkle_root,
                nonce: 0,
            },
            miner_payouts,
            file_contracts,
        }
    }

    /// Genesis carries no payouts: an output created at height 0 would
    /// mature at exactly the maturity delay, a height maturation never visits.
    pub fn genesis() -> Self {
        let merkle_root = Block::calculate_merkle_root(&[], &[]);
        Block {
            header: BlockHeader {
                height: 0,
                timestamp: 1672531200000,
                parent_id: BlockId::default(),
                merkle_root,
                nonce: 0,
            },
            miner_payouts: Vec::new(),
            file_contracts: Vec::new(),
        }
    }

    pub fn id(&self) -> BlockId {
        BlockId(self.header.hash())
    }

    pub fn height(&self) -> BlockHeight {
        self.header.height
    }

    pub fn calculate_merkle_root(payouts: &[Output], contracts: &[FileContract]) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update((payouts.len() as u64).to_le_bytes());
        for payout in payouts {
            payout.hash_into(&mut hasher);
        }
        hasher.update((contracts.len() as u64).to_le_bytes());
        for contract in contracts {
            contract.hash_into(&mut hasher);
        }
        hasher.finalize().into()
    }

    /// Identifier of the `index`th miner payout of this block.
    pub fn miner_payout_id(&self, index: u64) -> OutputId {
        let mut hasher = Sha256::new();
        hasher.update(self.id().as_bytes());
        hasher.update(index.to_le_bytes());
        OutputId(hasher.finalize().into())
    }

    /// Identifier of the `index`th file contract formed in this block.
    pub fn file_contract_id(&self, index: u64) -> ContractId {
        let mut hasher = Sha256::new();
        hasher.update(b"file contract");
        hasher.update(self.id().as_bytes());
        hasher.update(index.to_le_bytes());
        ContractId(hasher.finalize().into())
    }
}

/// A block in the current path together with every change applying it made
/// to the consensus set, in the order the changes were made.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockNode {
    pub block: Block,
    pub height: BlockHeight,
    pub output_diffs: Vec<OutputDiff>,
    pub delayed_output_diffs: Vec<DelayedOutputDiff>,
    pub file_contract_diffs: Vec<FileContractDiff>,
}

impl BlockNode {
    pub fn new(block: Block) -> Self {
        let height = block.height();
        BlockNode {
            block,
            height,
            output_diffs: Vec::new(),
            delayed_output_diffs: Vec::new(),
            file_contract_diffs: Vec::new(),
        }
    }

    pub fn record_output_diff(&mut self, diff: OutputDiff) {
        self.output_diffs.push(diff);
    }

    pub fn record_delayed_output_diff(&mut self, diff: DelayedOutputDiff) {
        self.delayed_output_diffs.push(diff);
    }

    pub fn record_file_contract_diff(&mut self, diff: FileContractDiff) {
        self.file_contract_diffs.push(diff);
    }

    pub fn diff_count(&self) -> usize {
        self.output_diffs.len() + self.delayed_output_diffs.len() + self.file_contract_diffs.len()
    }

    /// Replays the recorded diffs onto a state that does not yet contain
    /// this block.
    pub fn apply_diffs(&self, state: &mut LedgerState) -> Result<(), ConsensusFault> {
        for diff in &self.file_contract_diffs {
            state.commit_file_contract_diff(diff, DiffDirection::Apply)?;
        }
        for diff in &self.output_diffs {
            state.commit_output_diff(diff, DiffDirection::Apply)?;
        }
        for diff in &self.delayed_output_diffs {
            state.commit_delayed_output_diff(diff, DiffDirection::Apply)?;
        }
        Ok(())
    }

    /// Undoes the recorded diffs in exact reverse order.
    pub fn revert_diffs(&self, state: &mut LedgerState) -> Result<(), ConsensusFault> {
        for diff in self.delayed_output_diffs.iter().rev() {
            state.commit_delayed_output_diff(diff, DiffDirection::Revert)?;
        }
        for diff in self.output_diffs.iter().rev() {
            state.commit_output_diff(diff, DiffDirection::Revert)?;
        }
        for diff in self.file_contract_diffs.iter().rev() {
            state.commit_file_contract_diff(diff, DiffDirection::Revert)?;
        }
        Ok(())
    }
}

use crate::blockchain::core::state::LedgerState;
use crate::blockchain::core::validation::{check_invariants, validate_file_contracts};

/// Owns the ledger and the current path of block nodes. All mutation goes
/// through `&mut self`, so one block is applied or reverted at a time.
pub struct ConsensusSet {
    pub state: LedgerState,
    pub path: Vec<BlockNode>,
    pub config: ConsensusConfig,
    pub persistence: Box<dyn Persistence>,
}

impl ConsensusSet {
    /// Create a new `ConsensusSet` using an in-memory persistence backend.
    pub fn new(config: ConsensusConfig) -> Result<Self, ChainError> {
        Self::new_with_persistence(config, Box::new(InMemoryPersistence::new()))
    }

    /// Create a new `ConsensusSet` at genesis with the provided persistence backend.
    pub fn new_with_persistence(
        config: ConsensusConfig,
        persistence: Box<dyn Persistence>,
    ) -> Result<Self, ChainError> {
        let mut cs = ConsensusSet {
            state: LedgerState::new(),
            path: Vec::new(),
            config,
            persistence,
        };
        let mut genesis = BlockNode::new(Block::genesis());
        cs.state.apply_maintenance(&mut genesis, cs.config.maturity_delay);
        cs.persistence.save_block_node(&genesis)?;
        cs.path.push(genesis);
        Ok(cs)
    }

    /// Rebuild the consensus set by replaying every persisted block node.
    /// Starts a fresh chain when the backend holds nothing.
    pub fn load(config: ConsensusConfig, persistence: Box<dyn Persistence>) -> Result<Self, ChainError> {
        let nodes = persistence.load_block_nodes()?;
        if nodes.is_empty() {
            return Self::new_with_persistence(config, persistence);
        }

        let mut state = LedgerState::new();
        let mut path: Vec<BlockNode> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let expected_height = path.len() as BlockHeight;
            if node.height != expected_height {
                return Err(ChainError::DatabaseError(format!(
                    "Persisted block nodes have a gap: expected height {}, found {}.",
                    expected_height, node.height
                )));
            }
            if let Some(parent) = path.last() {
                if node.block.header.parent_id != parent.block.id() {
                    return Err(ChainError::DatabaseError(format!(
                        "Persisted block at height {} does not extend its parent.",
                        node.height
                    )));
                }
            }
            node.apply_diffs(&mut state).or_abort();
            path.push(node);
        }

        let cs = ConsensusSet { state, path, config, persistence };
        cs.verify(cs.height());
        info!(height = cs.height(), "Loaded consensus set from persistence");
        Ok(cs)
    }

    pub fn height(&self) -> BlockHeight {
        self.path.last().map_or(0, |node| node.height)
    }

    pub fn tip(&self) -> &BlockNode {
        // The path always holds at least the genesis node.
        &self.path[self.path.len() - 1]
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Applies a block on top of the current tip: the block's transaction
    /// effects first, then end-of-block maintenance.
    pub fn accept_block(&mut self, block: Block) -> Result<BlockId, ChainError> {
        let tip = self.tip();
        if block.height() != tip.height + 1 {
            return Err(ChainError::InvalidBlockLinkage(format!(
                "Invalid block height. Expected {}, but got {}.",
                tip.height + 1,
                block.height()
            )));
        }
        if block.header.parent_id != tip.block.id() {
            return Err(ChainError::InvalidBlockLinkage(format!(
                "Invalid parent id. Expected {}, but got {}.",
                tip.block.id(),
                block.header.parent_id
            )));
        }
        let expected_merkle_root = Block::calculate_merkle_root(&block.miner_payouts, &block.file_contracts);
        if expected_merkle_root != block.header.merkle_root {
            return Err(ChainError::InvalidBlock(format!(
                "Merkle root mismatch. Expected {}, but got {}.",
                hex::encode(expected_merkle_root),
                hex::encode(block.header.merkle_root)
            )));
        }
        validate_file_contracts(&block)?;

        let mut node = BlockNode::new(block);
        self.apply_file_contracts(&mut node);
        self.state.apply_maintenance(&mut node, self.config.maturity_delay);
        self.verify(node.height);

        if let Err(e) = self.persistence.save_block_node(&node) {
            node.revert_diffs(&mut self.state).or_abort();
            return Err(e);
        }

        let id = node.block.id();
        info!(height = node.height, %id, diffs = node.diff_count(), "Accepted block");
        self.path.push(node);
        Ok(id)
    }

    /// Removes the tip block and undoes every change it made.
    pub fn revert_tip(&mut self) -> Result<BlockNode, ChainError> {
        if self.path.len() <= 1 {
            return Err(ChainError::EmptyChain);
        }
        let height = self.height();
        self.persistence.remove_block_node(height)?;

        let node = self.path.pop().ok_or(ChainError::EmptyChain)?;
        node.revert_diffs(&mut self.state).or_abort();
        self.verify(self.height());

        info!(height, id = %node.block.id(), "Reverted block");
        Ok(node)
    }

    /// Contracts formed by the block's transactions enter the contract set
    /// before maintenance runs.
    fn apply_file_contracts(&mut self, node: &mut BlockNode) {
        let contracts = node.block.file_contracts.clone();
        for (i, file_contract) in contracts.into_iter().enumerate() {
            let diff = FileContractDiff {
                direction: DiffDirection::Apply,
                id: node.block.file_contract_id(i as u64),
                file_contract,
            };
            self.state.commit_file_contract_diff(&diff, DiffDirection::Apply).or_abort();
            node.record_file_contract_diff(diff);
        }
        debug!(height = node.height, count = node.file_contract_diffs.len(), "Applied file contracts");
    }

    fn verify(&self, height: BlockHeight) {
        if self.config.verify_invariants.enabled() {
            check_invariants(&self.state, height, self.config.maturity_delay).or_abort();
        }
    }
}
