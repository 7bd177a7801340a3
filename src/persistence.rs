//! Database persistence layer for block diff logs

use crate::blockchain::{Block, BlockNode};
use crate::error::ChainError;
use crate::types::BlockHeight;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Abstraction for persistence backends. Each block node is stored together
/// with its three diff logs so that the consensus set can be rebuilt by
/// replaying them and a reorg can undo them.
pub trait Persistence: Send + Sync {
    fn save_block_node(&self, node: &BlockNode) -> Result<(), ChainError>;
    fn load_block_node(&self, height: BlockHeight) -> Result<Option<BlockNode>, ChainError>;
    fn load_block_nodes(&self) -> Result<Vec<BlockNode>, ChainError>;
    fn remove_block_node(&self, height: BlockHeight) -> Result<(), ChainError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS block_nodes (
                height INTEGER PRIMARY KEY,
                block_id BLOB NOT NULL,
                block TEXT NOT NULL,
                output_diffs TEXT NOT NULL,
                delayed_output_diffs TEXT NOT NULL,
                file_contract_diffs TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create block_nodes table: {}", e)))?;

        Ok(Database { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ChainError> {
        self.conn.lock().map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
    }
}

type NodeRow = (i64, String, String, String, String);

fn node_from_row((height, block, outputs, delayed, contracts): NodeRow) -> Result<BlockNode, ChainError> {
    let block: Block = serde_json::from_str(&block)?;
    let node = BlockNode {
        height: height as BlockHeight,
        output_diffs: serde_json::from_str(&outputs)?,
        delayed_output_diffs: serde_json::from_str(&delayed)?,
        file_contract_diffs: serde_json::from_str(&contracts)?,
        block,
    };
    if node.block.height() != node.height {
        return Err(ChainError::DatabaseError(format!(
            "Block stored at height {} claims height {}",
            node.height,
            node.block.height()
        )));
    }
    Ok(node)
}

impl Persistence for Database {
    /// Writes the node and its diffs in a single transaction.
    fn save_block_node(&self, node: &BlockNode) -> Result<(), ChainError> {
        let block_json = serde_json::to_string(&node.block)?;
        let outputs_json = serde_json::to_string(&node.output_diffs)?;
        let delayed_json = serde_json::to_string(&node.delayed_output_diffs)?;
        let contracts_json = serde_json::to_string(&node.file_contract_diffs)?;

        let conn_guard = self.lock()?;
        let tx = conn_guard
            .unchecked_transaction()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO block_nodes
                (height, block_id, block, output_diffs, delayed_output_diffs, file_contract_diffs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node.height as i64,
                node.block.id().as_bytes().to_vec(),
                block_json,
                outputs_json,
                delayed_json,
                contracts_json,
            ],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save block node: {}", e)))?;

        tx.commit()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    fn load_block_node(&self, height: BlockHeight) -> Result<Option<BlockNode>, ChainError> {
        let conn_guard = self.lock()?;
        let row: Option<NodeRow> = conn_guard
            .query_row(
                "SELECT height, block, output_diffs, delayed_output_diffs, file_contract_diffs
                 FROM block_nodes WHERE height = ?1",
                params![height as i64],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query block node: {}", e)))?;

        row.map(node_from_row).transpose()
    }

    fn load_block_nodes(&self) -> Result<Vec<BlockNode>, ChainError> {
        let conn_guard = self.lock()?;
        let mut stmt = conn_guard
            .prepare(
                "SELECT height, block, output_diffs, delayed_output_diffs, file_contract_diffs
                 FROM block_nodes ORDER BY height ASC",
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)))
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query block nodes: {}", e)))?;

        let mut nodes = Vec::new();
        for row_result in rows {
            let row: NodeRow =
                row_result.map_err(|e| ChainError::DatabaseError(format!("Failed to read row: {}", e)))?;
            nodes.push(node_from_row(row)?);
        }
        Ok(nodes)
    }

    fn remove_block_node(&self, height: BlockHeight) -> Result<(), ChainError> {
        let conn_guard = self.lock()?;
        conn_guard
            .execute("DELETE FROM block_nodes WHERE height = ?1", params![height as i64])
            .map_err(|e| ChainError::DatabaseError(format!("Failed to remove block node: {}", e)))?;
        Ok(())
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryPersistence {
    nodes: Mutex<BTreeMap<BlockHeight, BlockNode>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<BlockHeight, BlockNode>>, ChainError> {
        self.nodes.lock().map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
    }
}

impl Persistence for InMemoryPersistence {
    fn save_block_node(&self, node: &BlockNode) -> Result<(), ChainError> {
        self.lock()?.insert(node.height, node.clone());
        Ok(())
    }

    fn load_block_node(&self, height: BlockHeight) -> Result<Option<BlockNode>, ChainError> {
        Ok(self.lock()?.get(&height).cloned())
    }

    fn load_block_nodes(&self) -> Result<Vec<BlockNode>, ChainError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn remove_block_node(&self, height: BlockHeight) -> Result<(), ChainError> {
        self.lock()?.remove(&height);
        Ok(())
    }
}
