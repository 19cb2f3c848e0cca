/// Error taxonomy entries owned by the bridge batcher.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("merkle proof did not verify against the current L1 root")]
    InvalidProof,
    #[error("worker chunk timed out after 30s")]
    WorkerTimeout,
    #[error("worker assigned to this chunk was lost")]
    WorkerLost,
    #[error("shard router error: {0}")]
    ShardUnavailable(#[from] sequencer_shard_router::Error),
    #[error("bridge batcher is closed")]
    Closed,
}
