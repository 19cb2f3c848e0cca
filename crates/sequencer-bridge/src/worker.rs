use crate::operation::Operation;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Per-chunk dispatch timeout (§4.3 "Parallel dispatch").
pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(30);

/// The per-operation business logic a worker runs. The bridge batcher
/// never implements this itself (§1 scope: "the actual per-transaction
/// business logic executed inside a worker" is an external collaborator),
/// mirroring `sequencer_disruptor::EventHandler` as the seam a caller
/// plugs real settlement work into.
#[async_trait::async_trait]
pub trait OperationExecutor: Send + Sync + 'static {
    async fn execute(&self, op: &Operation) -> Result<(), String>;
}

/// §6.2 "Messages from coordinator -> worker".
struct ProcessOperationsJob {
    operations: Vec<Operation>,
    reply: oneshot::Sender<OperationsProcessed>,
}

/// §6.2 "Messages from worker -> coordinator", `operations_processed`.
#[derive(Debug, Clone, Default)]
pub struct OperationsProcessed {
    pub successful: Vec<String>,
    pub failed: Vec<FailedOperation>,
}

#[derive(Debug, Clone)]
pub struct FailedOperation {
    pub id: String,
    pub error: String,
}

/// Run loop for a single worker: drains jobs until the channel closes or
/// `shutdown` flips true. Polls the flag on a 200ms cadence rather than a
/// dedicated cancellation signal, since a worker only ever idles between
/// batches.
async fn run_worker(
    mut rx: mpsc::Receiver<ProcessOperationsJob>,
    executor: Arc<dyn OperationExecutor>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            Ok(Some(job)) => {
                let mut result = OperationsProcessed::default();
                for op in &job.operations {
                    match executor.execute(op).await {
                        Ok(()) => result.successful.push(op.id.clone()),
                        Err(error) => result.failed.push(FailedOperation { id: op.id.clone(), error }),
                    }
                }
                let _ = job.reply.send(result);
            }
            Ok(None) => return,
            Err(_) => continue,
        }
    }
}

fn spawn_worker(
    executor: Arc<dyn OperationExecutor>,
    shutdown: Arc<AtomicBool>,
) -> (mpsc::Sender<ProcessOperationsJob>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<ProcessOperationsJob>(64);
    let handle = tokio::spawn(run_worker(rx, executor, shutdown));
    (tx, handle)
}

/// Watches one worker slot's `JoinHandle` and restarts it with exponential
/// backoff on panic (§4.2/§9 "Worker lifetime": a crashed worker must not
/// take the whole pool down). A handle that finishes without panicking
/// means `shutdown` was raised; the supervisor exits too.
async fn supervise(
    worker_index: usize,
    executor: Arc<dyn OperationExecutor>,
    shutdown: Arc<AtomicBool>,
    tx_watch: watch::Sender<mpsc::Sender<ProcessOperationsJob>>,
) {
    let mut backoff = Duration::from_millis(100);
    loop {
        let (tx, handle) = spawn_worker(executor.clone(), shutdown.clone());
        let _ = tx_watch.send(tx);
        let outcome = handle.await;
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        match outcome {
            Err(join_err) if join_err.is_panic() => {
                tracing::warn!(worker_index, backoff_ms = backoff.as_millis() as u64, "worker panicked, restarting");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(5));
            }
            _ => return,
        }
    }
}

/// A fixed pool of stateless workers (§6.2: "Workers are stateless w.r.t.
/// batching; they receive everything they need per message"), each
/// holding its own channel so a chunk can be addressed to
/// `worker_index = i mod worker_count` as §4.3 specifies. Each slot is
/// supervised independently so a panicking worker is replaced rather than
/// leaving that slot permanently dead.
pub struct WorkerPool {
    slots: Vec<watch::Receiver<mpsc::Sender<ProcessOperationsJob>>>,
    supervisors: Vec<tokio::task::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, executor: Arc<dyn OperationExecutor>) -> Self {
        let worker_count = worker_count.max(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut slots = Vec::with_capacity(worker_count);
        let mut supervisors = Vec::with_capacity(worker_count);

        for worker_index in 0..worker_count {
            // Seeded with a closed placeholder; `supervise` replaces it with
            // the real worker's sender before any job can be dispatched.
            let (placeholder, _) = mpsc::channel::<ProcessOperationsJob>(1);
            let (tx_watch, rx_watch) = watch::channel(placeholder);
            let supervisor = tokio::spawn(supervise(worker_index, executor.clone(), shutdown.clone(), tx_watch));
            slots.push(rx_watch);
            supervisors.push(supervisor);
        }

        Self { slots, supervisors, shutdown }
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    /// Split `operations` into `worker_count` roughly-equal (ceil-division)
    /// chunks, dispatch chunk `i` to worker `i mod worker_count`, and
    /// collect every reply with a per-chunk 30s timeout. A chunk that
    /// times out surfaces its operations as `WorkerTimeout` failures
    /// rather than failing the whole batch.
    pub async fn dispatch_batch(&self, operations: Vec<Operation>) -> OperationsProcessed {
        if operations.is_empty() {
            return OperationsProcessed::default();
        }
        let worker_count = self.worker_count();
        let chunk_size = (operations.len() + worker_count - 1) / worker_count;
        let chunks: Vec<Vec<Operation>> = operations
            .chunks(chunk_size.max(1))
            .map(|c| c.to_vec())
            .collect();

        let mut pending = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            let worker_index = i % worker_count;
            let (reply_tx, reply_rx) = oneshot::channel();
            let ids: Vec<String> = chunk.iter().map(|op| op.id.clone()).collect();
            let current = self.slots[worker_index].borrow().clone();
            let send_result = current.send(ProcessOperationsJob { operations: chunk, reply: reply_tx }).await;
            if send_result.is_err() {
                pending.push((ids, None));
            } else {
                pending.push((ids, Some(reply_rx)));
            }
        }

        let mut merged = OperationsProcessed::default();
        for (ids, reply_rx) in pending {
            match reply_rx {
                None => {
                    for id in ids {
                        merged.failed.push(FailedOperation { id, error: "worker lost".into() });
                    }
                }
                Some(reply_rx) => match tokio::time::timeout(CHUNK_TIMEOUT, reply_rx).await {
                    Ok(Ok(result)) => {
                        merged.successful.extend(result.successful);
                        merged.failed.extend(result.failed);
                    }
                    Ok(Err(_)) => {
                        for id in ids {
                            merged.failed.push(FailedOperation { id, error: "worker lost".into() });
                        }
                    }
                    Err(_) => {
                        for id in ids {
                            merged.failed.push(FailedOperation { id, error: "chunk timed out after 30s".into() });
                        }
                    }
                },
            }
        }
        merged
    }

    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for supervisor in self.supervisors {
            let _ = supervisor.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{OperationKind, OperationStatus};

    fn op(id: &str) -> Operation {
        Operation {
            id: id.to_string(),
            kind: OperationKind::Deposit,
            amount: 1,
            sender: "s".into(),
            recipient: "r".into(),
            token: None,
            priority: 0,
            confirmations: 1,
            proof: None,
            created_at_ms: 0,
            status: OperationStatus::Pending,
        }
    }

    struct AlwaysOk;
    #[async_trait::async_trait]
    impl OperationExecutor for AlwaysOk {
        async fn execute(&self, _op: &Operation) -> Result<(), String> {
            Ok(())
        }
    }

    struct FailsOdd;
    #[async_trait::async_trait]
    impl OperationExecutor for FailsOdd {
        async fn execute(&self, op: &Operation) -> Result<(), String> {
            if op.id.ends_with('1') {
                Err("boom".into())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn dispatch_splits_and_collects_successes() {
        let pool = WorkerPool::new(2, Arc::new(AlwaysOk));
        let ops = vec![op("a"), op("b"), op("c"), op("d")];
        let result = pool.dispatch_batch(ops).await;
        assert_eq!(result.successful.len(), 4);
        assert!(result.failed.is_empty());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn partial_failure_is_reported_per_operation() {
        let pool = WorkerPool::new(2, Arc::new(FailsOdd));
        let ops = vec![op("id0"), op("id1"), op("id2")];
        let result = pool.dispatch_batch(ops).await;
        assert_eq!(result.successful.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].id, "id1");
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let pool = WorkerPool::new(2, Arc::new(AlwaysOk));
        let result = pool.dispatch_batch(Vec::new()).await;
        assert!(result.successful.is_empty() && result.failed.is_empty());
        pool.shutdown().await;
    }

    struct PanicsOnce {
        used: std::sync::atomic::AtomicBool,
    }
    #[async_trait::async_trait]
    impl OperationExecutor for PanicsOnce {
        async fn execute(&self, _op: &Operation) -> Result<(), String> {
            if !self.used.swap(true, Ordering::SeqCst) {
                panic!("simulated worker crash");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn supervisor_restarts_a_panicked_worker() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let executor: Arc<dyn OperationExecutor> = Arc::new(PanicsOnce { used: std::sync::atomic::AtomicBool::new(false) });
        let (placeholder, _) = mpsc::channel::<ProcessOperationsJob>(1);
        let (tx_watch, mut rx_watch) = watch::channel(placeholder);
        let supervisor = tokio::spawn(supervise(0, executor.clone(), shutdown.clone(), tx_watch));

        rx_watch.changed().await.unwrap();
        let first_worker_tx = rx_watch.borrow().clone();
        let (reply_tx, _reply_rx) = oneshot::channel();
        first_worker_tx
            .send(ProcessOperationsJob { operations: vec![op("crash")], reply: reply_tx })
            .await
            .unwrap();

        // The worker task panics handling that job; the supervisor notices
        // and installs a freshly spawned worker's sender.
        rx_watch.changed().await.unwrap();
        let restarted_tx = rx_watch.borrow().clone();
        let (reply_tx2, reply_rx2) = oneshot::channel();
        restarted_tx
            .send(ProcessOperationsJob { operations: vec![op("ok")], reply: reply_tx2 })
            .await
            .unwrap();
        let result = reply_rx2.await.unwrap();
        assert_eq!(result.successful, vec!["ok".to_string()]);

        shutdown.store(true, Ordering::Relaxed);
        let _ = supervisor.await;
    }
}
