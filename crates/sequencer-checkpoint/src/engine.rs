use crate::config::CheckpointConfig;
use crate::error::Error;
use crate::id;
use crate::metrics::{CheckpointMetrics, MetricsSnapshot};
use crate::record::CheckpointRecord;
use crate::state::SequencerState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Checkpoint & Recovery Engine (C4): periodic snapshotting of
/// sequencer-relevant state with generation-bounded retention, and
/// last-good-snapshot restoration on startup.
///
/// One engine owns one `checkpoint_dir`; it is the sole writer (matching
/// §5's "Shared resources" note that the checkpoint directory has one
/// writer and parse-skip-tolerant readers).
pub struct CheckpointEngine {
    config: CheckpointConfig,
    sequencer_identity: String,
    ops_since_checkpoint: AtomicU64,
    id_counter: AtomicU64,
    metrics: CheckpointMetrics,
    telemetry: Option<Arc<sequencer_telemetry::Registry>>,
}

impl CheckpointEngine {
    pub fn new(
        config: CheckpointConfig,
        sequencer_identity: impl Into<String>,
        telemetry: Option<Arc<sequencer_telemetry::Registry>>,
    ) -> Self {
        Self {
            config,
            sequencer_identity: sequencer_identity.into(),
            ops_since_checkpoint: AtomicU64::new(0),
            id_counter: AtomicU64::new(0),
            metrics: CheckpointMetrics::default(),
            telemetry,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Record that an operation was accepted, advancing the incremental
    /// trigger counter. Returns `true` once the counter has reached
    /// `checkpoint_interval`, at which point the caller should snapshot
    /// and call [`CheckpointEngine::create_checkpoint`] (which resets the
    /// counter).
    pub fn record_accepted_op(&self) -> bool {
        let count = self.ops_since_checkpoint.fetch_add(1, Ordering::Relaxed) + 1;
        count >= self.config.checkpoint_interval
    }

    /// Serialize `state` to `<id>.json` (via a temp-file-then-rename to
    /// avoid torn writes), enforce retention, and reset the accepted-op
    /// counter. The only failure mode is IO/encoding; callers are expected
    /// to log and continue rather than treat this as fatal (§4.5
    /// "Failure").
    pub async fn create_checkpoint(&self, state: SequencerState) -> Result<CheckpointRecord, Error> {
        let started = Instant::now();
        let millis = now_ms();
        let counter = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let id = id::generate(&self.sequencer_identity, millis, counter);

        let record = CheckpointRecord {
            id: id.clone(),
            timestamp: millis,
            sequencer_identity: self.sequencer_identity.clone(),
            state,
        };

        tokio::fs::create_dir_all(&self.config.checkpoint_dir)
            .await
            .map_err(|source| Error::Io { path: self.config.checkpoint_dir.clone(), source })?;

        let body = serde_json::to_vec_pretty(&record)?;
        let final_path = self.config.checkpoint_dir.join(format!("{id}.json"));
        let tmp_path = self.config.checkpoint_dir.join(format!(".{id}.json.tmp"));

        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(|source| Error::Io { path: tmp_path.clone(), source })?;
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|source| Error::Io { path: final_path.clone(), source })?;

        self.ops_since_checkpoint.store(0, Ordering::Relaxed);
        self.metrics.record_created(body.len() as u64, started.elapsed().as_millis() as u64);
        if let Some(telemetry) = &self.telemetry {
            telemetry.incr("checkpoint.created", 1.0);
            telemetry.gauge("checkpoint.size_bytes", body.len() as f64);
        }

        self.retain().await?;
        Ok(record)
    }

    /// Keep the `max_checkpoints` newest-by-timestamp checkpoint files in
    /// the directory, deleting the rest.
    async fn retain(&self) -> Result<(), Error> {
        let mut entries = self.list_checkpoints().await;
        if entries.len() <= self.config.max_checkpoints {
            return Ok(());
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        for (path, _timestamp) in entries.into_iter().skip(self.config.max_checkpoints) {
            let _ = tokio::fs::remove_file(&path).await;
        }
        Ok(())
    }

    /// Load the newest checkpoint that parses successfully, skipping
    /// corrupt files and falling back to the next-newest rather than
    /// treating a torn write as fatal.
    pub async fn load_state(&self) -> Option<SequencerState> {
        let started = Instant::now();
        self.metrics.record_recovery_attempt();

        let mut entries = self.list_checkpoint_records().await;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let newest = entries.into_iter().next()?;

        self.metrics.record_loaded(started.elapsed().as_millis() as u64);
        if let Some(telemetry) = &self.telemetry {
            telemetry.incr("checkpoint.loaded", 1.0);
        }
        Some(newest.state)
    }

    async fn list_checkpoints(&self) -> Vec<(std::path::PathBuf, i64)> {
        self.list_checkpoint_records()
            .await
            .into_iter()
            .map(|record| {
                let path = self.config.checkpoint_dir.join(format!("{}.json", record.id));
                (path, record.timestamp)
            })
            .collect()
    }

    /// Every checkpoint file in the directory that parses as a valid
    /// `CheckpointRecord`. Files that fail to parse (a torn write, or
    /// anything else unexpected) are silently skipped, per §4.5.
    async fn list_checkpoint_records(&self) -> Vec<CheckpointRecord> {
        let mut out = Vec::new();
        let Ok(mut dir) = tokio::fs::read_dir(&self.config.checkpoint_dir).await else {
            return out;
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = tokio::fs::read(&path).await else {
                continue;
            };
            if let Ok(record) = serde_json::from_slice::<CheckpointRecord>(&bytes) {
                out.push(record);
            }
        }
        out
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path, max_checkpoints: usize) -> CheckpointConfig {
        CheckpointConfig {
            checkpoint_dir: dir.to_path_buf(),
            checkpoint_interval: 100,
            max_checkpoints,
        }
    }

    #[tokio::test]
    async fn round_trip_preserves_state_fields() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CheckpointEngine::new(config(dir.path(), 10), "sequencer-a", None);

        let mut state = SequencerState::default();
        state.processed_count = 42;
        state.batch_count = 3;
        state.last_batch_timestamp = 1_700_000_000_000;
        let mut nonces = std::collections::HashMap::new();
        nonces.insert("alice".to_string(), 2u64);
        state.set_nonce_map(nonces.clone());

        engine.create_checkpoint(state.clone()).await.unwrap();
        let restored = engine.load_state().await.unwrap();

        assert_eq!(restored.processed_count, 42);
        assert_eq!(restored.batch_count, 3);
        assert_eq!(restored.nonce_map(), nonces);
    }

    #[tokio::test]
    async fn accepted_op_counter_trips_at_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 10);
        cfg.checkpoint_interval = 3;
        let engine = CheckpointEngine::new(cfg, "sequencer-a", None);

        assert!(!engine.record_accepted_op());
        assert!(!engine.record_accepted_op());
        assert!(engine.record_accepted_op());
    }

    #[tokio::test]
    async fn retention_keeps_only_newest_n() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CheckpointEngine::new(config(dir.path(), 3), "sequencer-a", None);

        for i in 0..5u64 {
            let mut state = SequencerState::default();
            state.processed_count = i;
            engine.create_checkpoint(state).await.unwrap();
            // Force strictly increasing timestamps across fast test iterations.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let remaining = engine.list_checkpoint_records().await;
        assert_eq!(remaining.len(), 3);
        let mut processed: Vec<u64> = remaining.iter().map(|r| r.state.processed_count).collect();
        processed.sort();
        assert_eq!(processed, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn corrupt_file_is_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CheckpointEngine::new(config(dir.path(), 10), "sequencer-a", None);

        let mut good = SequencerState::default();
        good.processed_count = 9;
        engine.create_checkpoint(good).await.unwrap();

        tokio::fs::write(dir.path().join("deadbeefdeadbeef.json"), b"not json")
            .await
            .unwrap();

        let restored = engine.load_state().await.unwrap();
        assert_eq!(restored.processed_count, 9);
    }

    #[tokio::test]
    async fn load_with_empty_directory_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CheckpointEngine::new(config(dir.path(), 10), "sequencer-a", None);
        assert!(engine.load_state().await.is_none());
    }
}
