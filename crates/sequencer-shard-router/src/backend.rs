use crate::error::Error;
use serde_json::Value;

/// One result row, as a JSON object. Keeps the router storage-agnostic:
/// it never assumes a particular database client.
pub type Row = serde_json::Map<String, Value>;

/// A single backend store fronted by the router. Implemented by the
/// caller against whatever storage engine actually backs a shard; the
/// router only ever drives shards through this seam, the same way
/// `EventHandler` is the seam the disruptor core drives business logic
/// through.
#[async_trait::async_trait]
pub trait ShardBackend: Send + Sync + 'static {
    async fn query(&self, stmt: &str, params: &[Value]) -> Result<Vec<Row>, Error>;

    async fn begin(&self) -> Result<(), Error>;
    async fn commit(&self) -> Result<(), Error>;
    async fn rollback(&self) -> Result<(), Error>;

    /// Cheap liveness probe used by `checkShardStatus`.
    async fn ping(&self) -> Result<(), Error>;

    /// Run a migration script (e.g. a SQL file) against this shard.
    async fn migrate(&self, script_path: &str) -> Result<(), Error>;
}
