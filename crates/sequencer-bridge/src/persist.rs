use crate::operation::Operation;
use sequencer_shard_router::ShardRouter;
use std::sync::Arc;

/// Durable-persistence seam for accepted operations: the disruptor core's
/// event handler writes each accepted operation through the shard router
/// (§2 "Persistence and durable lookups for both C5 and C6 go through
/// C3"). The disruptor body is the operation itself, keyed by its id.
pub struct PersistHandler {
    router: Arc<ShardRouter>,
}

impl PersistHandler {
    pub fn new(router: Arc<ShardRouter>) -> Self {
        Self { router }
    }
}

#[async_trait::async_trait]
impl sequencer_disruptor::EventHandler<Operation> for PersistHandler {
    async fn handle(&self, _event_id: &str, body: &Operation) -> Result<(), String> {
        let payload = serde_json::to_value(body).map_err(|e| e.to_string())?;
        self.router
            .query_by_key(
                &body.sender,
                "INSERT INTO operations (id, payload) VALUES ($1, $2)",
                &[serde_json::json!(body.id), payload],
            )
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
