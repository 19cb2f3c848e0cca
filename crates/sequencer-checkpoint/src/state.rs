use std::collections::HashMap;

/// Sequencer-relevant state captured by a checkpoint. Operation payloads
/// are kept as opaque JSON rather than a concrete `Operation` type so this
/// crate has no dependency on the bridge batcher's types — the bridge
/// serializes its own operations into this shape when it snapshots.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SequencerState {
    #[serde(rename = "pendingOps")]
    pub pending_ops: Vec<serde_json::Value>,
    /// Indexed by priority (0 = lowest), each entry the queue contents at
    /// that priority.
    #[serde(rename = "priorityOps")]
    pub priority_ops: Vec<Vec<serde_json::Value>>,
    /// Ordered pairs rather than a map, matching the wire schema in §3;
    /// reconstructed into a `HashMap` by [`SequencerState::nonce_map`].
    #[serde(rename = "nonceByAccount")]
    pub nonce_by_account: Vec<(String, u64)>,
    #[serde(rename = "processedCount")]
    pub processed_count: u64,
    #[serde(rename = "batchCount")]
    pub batch_count: u64,
    #[serde(rename = "lastBatchTimestamp")]
    pub last_batch_timestamp: i64,
}

impl SequencerState {
    /// Reconstruct the nonce map from the ordered-pairs wire form.
    pub fn nonce_map(&self) -> HashMap<String, u64> {
        self.nonce_by_account.iter().cloned().collect()
    }

    /// Replace `nonce_by_account` from a map, sorting by account so the
    /// serialized form is deterministic across checkpoints.
    pub fn set_nonce_map(&mut self, map: HashMap<String, u64>) {
        let mut pairs: Vec<(String, u64)> = map.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        self.nonce_by_account = pairs;
    }
}
