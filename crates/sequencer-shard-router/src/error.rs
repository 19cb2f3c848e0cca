/// Error taxonomy entries owned by the shard router.
#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    #[error("shard {0} is unavailable")]
    ShardUnavailable(usize),
    #[error("transient shard error: {0}")]
    Transient(String),
    #[error("invalid routing configuration: {0}")]
    ValidationFailed(String),
}
