/// The seam a caller (e.g. the bridge batcher) plugs its own per-event
/// execution into; the core never implements business logic itself.
/// Mirrors the shape of `automations::Executor` in this workspace: a small
/// async trait the core drives, with no knowledge of what the
/// implementation actually does.
#[async_trait::async_trait]
pub trait EventHandler<T>: Send + Sync + 'static {
    async fn handle(&self, event_id: &str, body: &T) -> Result<(), String>;
}

#[async_trait::async_trait]
impl<T, F, Fut> EventHandler<T> for F
where
    T: Send + Sync + 'static,
    F: Fn(String, T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
    T: Clone,
{
    async fn handle(&self, event_id: &str, body: &T) -> Result<(), String> {
        (self)(event_id.to_string(), body.clone()).await
    }
}
