//! End-to-end scenarios from the bridge batcher's public API, mirroring
//! the worked examples for adaptive confirmations, Merkle verification,
//! and batch-priority ordering, plus a full accept-through-checkpoint
//! path wiring in the shard router and checkpoint engine.

use sequencer_bridge::{BridgeBatcher, BridgeConfig, DepositParams, Error, OperationKind, SettlementLayer, StatusLookup, WithdrawParams};
use sequencer_bridge::OperationExecutor;
use sequencer_checkpoint::{CheckpointConfig, CheckpointEngine};
use sequencer_shard_router::{Row, ShardBackend, ShardRouter, ShardRouterConfig, StrategyConfig};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct FixedRootSettlement {
    root_hex: String,
}

#[async_trait::async_trait]
impl SettlementLayer for FixedRootSettlement {
    async fn get_merkle_root(&self) -> Result<String, Error> {
        Ok(self.root_hex.clone())
    }
    async fn submit_batch(&self, _payload: serde_json::Value) -> Result<serde_json::Value, Error> {
        Ok(serde_json::json!({"submitted": true}))
    }
}

struct CountingExecutor {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl OperationExecutor for CountingExecutor {
    async fn execute(&self, _op: &sequencer_bridge::Operation) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct InMemoryShard {
    rows: Mutex<Vec<Row>>,
}

#[async_trait::async_trait]
impl ShardBackend for InMemoryShard {
    async fn query(&self, _stmt: &str, params: &[serde_json::Value]) -> Result<Vec<Row>, sequencer_shard_router::Error> {
        let mut row = serde_json::Map::new();
        for (i, param) in params.iter().enumerate() {
            row.insert(format!("p{i}"), param.clone());
        }
        let mut rows = self.rows.lock().unwrap();
        rows.push(row);
        Ok(rows.clone())
    }
    async fn begin(&self) -> Result<(), sequencer_shard_router::Error> {
        Ok(())
    }
    async fn commit(&self) -> Result<(), sequencer_shard_router::Error> {
        Ok(())
    }
    async fn rollback(&self) -> Result<(), sequencer_shard_router::Error> {
        Ok(())
    }
    async fn ping(&self) -> Result<(), sequencer_shard_router::Error> {
        Ok(())
    }
    async fn migrate(&self, _script_path: &str) -> Result<(), sequencer_shard_router::Error> {
        Ok(())
    }
}

fn fold(first: [u8; 32], second: [u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize().into()
}

#[tokio::test]
async fn withdrawal_verified_against_settlement_root_then_batched() {
    // Scenario 2's leaf/proof shape, wired through the full accept path
    // rather than calling the merkle module directly.
    let leaf = {
        let canonical = serde_json::json!({ "sender": "A", "amount": 10u64 });
        Sha256::digest(serde_json::to_vec(&canonical).unwrap()).into()
    };
    let h1 = [0x01u8; 32];
    let h2 = [0xffu8; 32];
    let step1 = fold(h1, leaf); // h1 < leaf
    let root = fold(step1, h2); // step1 < h2

    let calls = Arc::new(AtomicUsize::new(0));
    let mut config = BridgeConfig::default();
    config.batch_size = 1;
    let batcher = BridgeBatcher::new(
        config,
        Arc::new(FixedRootSettlement { root_hex: hex::encode(root) }),
        Arc::new(CountingExecutor { calls: calls.clone() }),
        None,
        None,
        None,
    );

    let id = batcher
        .withdraw(WithdrawParams {
            amount: 10,
            sender: "A".into(),
            recipient: "B".into(),
            token: None,
            priority: 0,
            proof: vec![hex::encode(h1), hex::encode(h2)],
        })
        .await
        .unwrap();

    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if calls.load(Ordering::SeqCst) > 0 {
            break;
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match batcher.get_operation_status(&id) {
        StatusLookup::Found(op) => assert_eq!(op.kind, OperationKind::Withdrawal),
        StatusLookup::Unknown => panic!("withdrawal should still be tracked after settling"),
    }
}

#[tokio::test]
async fn accept_persists_through_shard_router_and_checkpoints() {
    let shard: Arc<dyn ShardBackend> = Arc::new(InMemoryShard { rows: Mutex::new(Vec::new()) });
    let router = Arc::new(
        ShardRouter::new(
            vec![shard],
            &ShardRouterConfig { strategy: StrategyConfig::Hash { function: sequencer_shard_router::HashFunction::Sha1 } },
            None,
        )
        .unwrap(),
    );

    let dir = tempfile::tempdir().unwrap();
    let checkpoint = Arc::new(CheckpointEngine::new(
        CheckpointConfig {
            checkpoint_dir: dir.path().to_path_buf(),
            checkpoint_interval: 1,
            max_checkpoints: 5,
        },
        "sequencer-a",
        None,
    ));

    let mut config = BridgeConfig::default();
    config.batch_size = 10; // large enough that our one deposit doesn't trigger a batch mid-checkpoint.
    let batcher = BridgeBatcher::new(
        config,
        Arc::new(FixedRootSettlement { root_hex: "00".into() }),
        Arc::new(CountingExecutor { calls: Arc::new(AtomicUsize::new(0)) }),
        Some(router),
        Some(checkpoint.clone()),
        None,
    );

    batcher
        .deposit(DepositParams {
            amount: 42,
            sender: "alice".into(),
            recipient: "bob".into(),
            token: None,
            priority: 1,
        })
        .await
        .unwrap();

    // checkpoint_interval=1 means the accept should have tripped the
    // checkpoint trigger immediately; the checkpoint is created on a
    // spawned task, so poll briefly for the file to land.
    let mut restored = None;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if let Some(state) = checkpoint.load_state().await {
            restored = Some(state);
            break;
        }
    }
    let state = restored.expect("a checkpoint should have been created");
    assert!(!state.nonce_map().is_empty());

    batcher.close().await;
}

#[tokio::test]
async fn closed_batcher_rejects_further_operations() {
    let batcher = BridgeBatcher::new(
        BridgeConfig::default(),
        Arc::new(FixedRootSettlement { root_hex: "00".into() }),
        Arc::new(CountingExecutor { calls: Arc::new(AtomicUsize::new(0)) }),
        None,
        None,
        None,
    );
    batcher.close().await;
    let err = batcher
        .deposit(DepositParams {
            amount: 1,
            sender: "a".into(),
            recipient: "b".into(),
            token: None,
            priority: 0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Closed));
}
