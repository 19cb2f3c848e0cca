//! Minimal in-process stand-ins for the external collaborators this
//! coordination plane doesn't own (the on-chain settlement program, and
//! the per-transaction business logic a worker actually executes).
//!
//! A real deployment replaces [`NullSettlementLayer`] and
//! [`LoggingExecutor`] with clients against its own chain and business
//! logic; these exist so `sequencer-node` boots and exercises the full
//! coordination plane end to end without that integration.

use async_trait::async_trait;
use sequencer_bridge::{Error as BridgeError, Operation, OperationExecutor, SettlementLayer};
use sequencer_shard_router::{Error as ShardError, Row, ShardBackend};
use std::sync::Mutex;

/// Always reports an all-zero root and accepts every batch. Good enough to
/// exercise the deposit path and the withdrawal path when withdrawals carry
/// an empty proof (leaf == root); a real settlement client is required for
/// genuine Merkle verification against an on-chain root.
pub struct NullSettlementLayer;

#[async_trait]
impl SettlementLayer for NullSettlementLayer {
    async fn get_merkle_root(&self) -> Result<String, BridgeError> {
        Ok(hex::encode([0u8; 32]))
    }

    async fn submit_batch(&self, payload: serde_json::Value) -> Result<serde_json::Value, BridgeError> {
        Ok(serde_json::json!({ "accepted": true, "echo": payload }))
    }
}

/// Logs and succeeds every operation handed to it.
pub struct LoggingExecutor;

#[async_trait]
impl OperationExecutor for LoggingExecutor {
    async fn execute(&self, op: &Operation) -> Result<(), String> {
        tracing::debug!(operation_id = %op.id, kind = ?op.kind, amount = op.amount, "executed operation");
        Ok(())
    }
}

/// An append-only in-memory shard, keyed by nothing in particular: rows are
/// just the params of every query run against it. Stands in for a real
/// database connection pool per shard.
#[derive(Default)]
pub struct InMemoryShard {
    rows: Mutex<Vec<Row>>,
}

#[async_trait]
impl ShardBackend for InMemoryShard {
    async fn query(&self, _stmt: &str, params: &[serde_json::Value]) -> Result<Vec<Row>, ShardError> {
        let mut row = serde_json::Map::new();
        for (i, param) in params.iter().enumerate() {
            row.insert(format!("p{i}"), param.clone());
        }
        let mut rows = self.rows.lock().unwrap();
        rows.push(row);
        Ok(rows.clone())
    }

    async fn begin(&self) -> Result<(), ShardError> {
        Ok(())
    }

    async fn commit(&self) -> Result<(), ShardError> {
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ShardError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), ShardError> {
        Ok(())
    }

    async fn migrate(&self, _script_path: &str) -> Result<(), ShardError> {
        Ok(())
    }
}
