use crate::completed::CompletedSet;
use crate::config::{DisruptorConfig, WaitStrategy};
use crate::deps::DependencyGraph;
use crate::error::Error;
use crate::event::{Event, EventOutcome, PublishOptions};
use crate::handler::EventHandler;
use sequencer_ring::{GatingSequence, RingBuffer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

struct InFlightEntry {
    worker_index: usize,
}

struct Inner<T, H> {
    ring: RingBuffer<Event<T>>,
    config: DisruptorConfig,
    handler: H,
    completed: CompletedSet,
    deps: DependencyGraph,
    parked_events: Mutex<HashMap<String, Event<T>>>,
    in_flight: Mutex<HashMap<String, InFlightEntry>>,
    completions: Mutex<HashMap<String, oneshot::Sender<EventOutcome>>>,
    pending_batch: Mutex<Vec<Event<T>>>,
    shutting_down: AtomicBool,
    publish_notify: Notify,
    telemetry: Option<Arc<sequencer_telemetry::Registry>>,
    worker_handles: Mutex<Vec<Option<tokio::task::JoinHandle<()>>>>,
    worker_gates: Vec<GatingSequence>,
}

/// Disruptor Event Core: dependency-aware, batch-coalescing, parallel
/// dispatching consumer built on top of the ring buffer.
#[derive(Clone)]
pub struct DisruptorCore<T, H> {
    inner: Arc<Inner<T, H>>,
}

impl<T, H> DisruptorCore<T, H>
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    pub fn new(
        config: DisruptorConfig,
        handler: H,
        telemetry: Option<Arc<sequencer_telemetry::Registry>>,
    ) -> Self {
        let ring = RingBuffer::new(config.buffer_size, config.claim_strategy);
        let worker_gates: Vec<GatingSequence> = (0..config.worker_count.max(1))
            .map(|_| ring.add_gating_sequence())
            .collect();

        let inner = Arc::new(Inner {
            ring,
            completed: CompletedSet::new(config.max_dependencies),
            deps: DependencyGraph::new(),
            parked_events: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            completions: Mutex::new(HashMap::new()),
            pending_batch: Mutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
            publish_notify: Notify::new(),
            telemetry,
            worker_handles: Mutex::new(Vec::new()),
            worker_gates,
            config,
            handler,
        });

        spawn_workers(&inner);
        spawn_batch_timer(&inner);
        spawn_supervisor(&inner);

        Self { inner }
    }

    /// Publish an event, applying batching if enabled. Resolves once the
    /// event reaches a terminal state (succeeded, failed, or worker-lost).
    pub async fn publish(&self, body: T, opts: PublishOptions) -> Result<EventOutcome, Error> {
        if self.inner.shutting_down.load(Ordering::Relaxed) {
            return Err(Error::ShuttingDown);
        }

        let id = opts.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.inner.deps.register(&id, &opts.dependencies)?;

        let (tx, rx) = oneshot::channel();
        self.inner.completions.lock().unwrap().insert(id.clone(), tx);

        let event = Event {
            id: id.clone(),
            body,
            created_at_ms: now_ms(),
            dependencies: opts.dependencies,
            priority: opts.priority,
        };

        if self.inner.config.enable_batch_processing {
            let flush_now = {
                let mut batch = self.inner.pending_batch.lock().unwrap();
                batch.push(event);
                batch.len() >= self.inner.config.batch_size
            };
            if flush_now {
                flush_batch(&self.inner).await;
            }
        } else if let Err(err) = claim_and_publish(&self.inner, event) {
            self.inner.completions.lock().unwrap().remove(&id);
            return Err(err);
        }

        match rx.await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Err(Error::ShuttingDown),
        }
    }

    /// Number of events currently in-flight (exposed for status/telemetry).
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().unwrap().len()
    }

    pub fn pending_dependency_count(&self) -> usize {
        self.inner.deps.pending_count()
    }

    pub fn completed_count(&self) -> usize {
        self.inner.completed.len()
    }

    /// Graceful shutdown: stop accepting new publishes, flush the current
    /// batch, drain in-flight work, then join workers.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        flush_batch(&self.inner).await;
        self.inner.publish_notify.notify_waiters();

        while !self.inner.in_flight.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let handles: Vec<_> = {
            let mut guard = self.inner.worker_handles.lock().unwrap();
            guard.drain(..).flatten().collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

fn claim_and_publish<T, H>(inner: &Arc<Inner<T, H>>, event: Event<T>) -> Result<(), Error>
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    let seq = inner.ring.claim_next()?;
    inner.ring.publish(seq, event);
    inner.publish_notify.notify_waiters();
    Ok(())
}

async fn flush_batch<T, H>(inner: &Arc<Inner<T, H>>)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    let batch: Vec<Event<T>> = {
        let mut pending = inner.pending_batch.lock().unwrap();
        std::mem::take(&mut *pending)
    };
    for event in batch {
        // A full ring under batch flushing has nowhere else to go; the
        // event fails its publisher rather than being silently dropped.
        let id = event.id.clone();
        if claim_and_publish(inner, event).is_err() {
            complete_event(inner, id, EventOutcome::Failed("ring full".into())).await;
        }
    }
}

/// Finalize an event's terminal state: remove from in-flight, record into
/// the completed set, resolve its publisher future, and cascade-unblock
/// any dependents.
async fn complete_event<T, H>(inner: &Arc<Inner<T, H>>, id: String, outcome: EventOutcome)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    inner.in_flight.lock().unwrap().remove(&id);
    inner.completed.insert(id.clone());
    inner.deps.forget(&id);

    if let Some(tx) = inner.completions.lock().unwrap().remove(&id) {
        let _ = tx.send(outcome);
    }

    let ready = inner.deps.complete(&id);
    for ready_id in ready {
        let parked = inner.parked_events.lock().unwrap().remove(&ready_id);
        if let Some(event) = parked {
            dispatch(inner, event, usize::MAX).await;
        }
    }
}

async fn dispatch_or_park<T, H>(inner: &Arc<Inner<T, H>>, event: Event<T>, worker_index: usize)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    let missing: std::collections::HashSet<String> = event
        .dependencies
        .iter()
        .filter(|d| !inner.completed.contains(d))
        .cloned()
        .collect();

    if missing.is_empty() {
        dispatch(inner, event, worker_index).await;
    } else {
        let id = event.id.clone();
        inner.parked_events.lock().unwrap().insert(id.clone(), event);
        inner.deps.park(id, missing);
    }
}

/// Hand a dependency-clear event to the handler. With parallel processing
/// enabled, the handler runs on its own spawned task and this returns
/// immediately. With it disabled, the handler runs to completion before
/// returning, serializing the calling worker lane.
async fn dispatch<T, H>(inner: &Arc<Inner<T, H>>, event: Event<T>, worker_index: usize)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    inner
        .in_flight
        .lock()
        .unwrap()
        .insert(event.id.clone(), InFlightEntry { worker_index });

    if let Some(telemetry) = &inner.telemetry {
        telemetry.incr("disruptor.dispatched", 1.0);
    }

    if inner.config.enable_parallel_processing {
        let inner = inner.clone();
        tokio::spawn(async move {
            let outcome = run_handler(&inner, &event).await;
            complete_event(&inner, event.id.clone(), outcome).await;
        });
    } else {
        let outcome = run_handler(inner, &event).await;
        complete_event(inner, event.id.clone(), outcome).await;
    }
}

async fn run_handler<T, H>(inner: &Arc<Inner<T, H>>, event: &Event<T>) -> EventOutcome
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    match inner.handler.handle(&event.id, &event.body).await {
        Ok(()) => EventOutcome::Succeeded,
        Err(e) => EventOutcome::Failed(e),
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn spawn_workers<T, H>(inner: &Arc<Inner<T, H>>)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    let mut handles = inner.worker_handles.lock().unwrap();
    handles.clear();
    for i in 0..inner.config.worker_count.max(1) {
        handles.push(Some(spawn_worker(inner.clone(), i)));
    }
}

/// Each worker owns an independent gating sequence and only reads the
/// sequences congruent to its own index modulo the worker count: worker 0
/// takes sequence 0, workerCount, 2*workerCount, ... This partitions the
/// ring into per-lane streams that can each make independent progress
/// while still gating the buffer correctly (capacity is bounded by the
/// slowest lane).
fn spawn_worker<T, H>(inner: Arc<Inner<T, H>>, worker_index: usize) -> tokio::task::JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    tokio::spawn(async move {
        let gate = inner.worker_gates[worker_index].clone();
        let worker_count = inner.config.worker_count.max(1) as i64;
        let mut next = worker_index as i64;

        loop {
            match inner.ring.read(next) {
                Some(event) => {
                    dispatch_or_park(&inner, event, worker_index).await;
                    inner.ring.mark_processed(next);
                    gate.set(next);
                    next += worker_count;
                }
                None => {
                    if inner.shutting_down.load(Ordering::Relaxed) && next > inner.ring.cursor() {
                        break;
                    }
                    wait(&inner.config.wait_strategy, &inner.publish_notify).await;
                }
            }
        }
    })
}

async fn wait(strategy: &WaitStrategy, notify: &Notify) {
    match strategy {
        WaitStrategy::Yielding => tokio::task::yield_now().await,
        WaitStrategy::Sleeping => tokio::time::sleep(Duration::from_millis(1)).await,
        WaitStrategy::Blocking => {
            let _ = tokio::time::timeout(Duration::from_millis(50), notify.notified()).await;
        }
    }
}

fn spawn_batch_timer<T, H>(inner: &Arc<Inner<T, H>>)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    if !inner.config.enable_batch_processing {
        return;
    }
    let inner = inner.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(inner.config.batch_timeout_ms.max(1)));
        loop {
            interval.tick().await;
            if inner.shutting_down.load(Ordering::Relaxed) && inner.pending_batch.lock().unwrap().is_empty() {
                break;
            }
            flush_batch(&inner).await;
        }
    });
}

fn spawn_supervisor<T, H>(inner: &Arc<Inner<T, H>>)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    let inner = inner.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if inner.shutting_down.load(Ordering::Relaxed) {
                break;
            }
            supervise_once(&inner).await;
        }
    });
}

/// Polls each worker slot for a finished handle. A worker only finishes by
/// panicking (its loop is otherwise infinite), so any finished handle here
/// is a crash: its in-flight events are resolved as `WorkerLost` and a
/// replacement worker is respawned into the same slot after a short
/// backoff.
async fn supervise_once<T, H>(inner: &Arc<Inner<T, H>>)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    let count = inner.config.worker_count.max(1);
    for i in 0..count {
        let finished = {
            let handles = inner.worker_handles.lock().unwrap();
            handles
                .get(i)
                .and_then(|h| h.as_ref())
                .map(|h| h.is_finished())
                .unwrap_or(false)
        };
        if !finished {
            continue;
        }
        let handle = {
            let mut handles = inner.worker_handles.lock().unwrap();
            handles.get_mut(i).and_then(|h| h.take())
        };
        let Some(handle) = handle else { continue };

        match handle.await {
            Ok(()) => {}
            Err(join_err) if join_err.is_panic() => {
                tracing::warn!(worker_index = i, "worker crashed, surfacing WorkerLost and respawning");
                fail_in_flight_for_worker(inner, i).await;
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(_) => {}
        }

        let mut handles = inner.worker_handles.lock().unwrap();
        if let Some(slot) = handles.get_mut(i) {
            *slot = Some(spawn_worker(inner.clone(), i));
        }
    }
}

async fn fail_in_flight_for_worker<T, H>(inner: &Arc<Inner<T, H>>, worker_index: usize)
where
    T: Clone + Send + Sync + 'static,
    H: EventHandler<T>,
{
    let lost_ids: Vec<String> = {
        let in_flight = inner.in_flight.lock().unwrap();
        in_flight
            .iter()
            .filter(|(_, entry)| entry.worker_index == worker_index)
            .map(|(id, _)| id.clone())
            .collect()
    };
    for id in lost_ids {
        complete_event(inner, id, EventOutcome::WorkerLost).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PublishOptions;
    use std::sync::atomic::AtomicUsize;

    fn test_config() -> DisruptorConfig {
        DisruptorConfig {
            buffer_size: 16,
            worker_count: 2,
            enable_batch_processing: false,
            batch_size: 1,
            batch_timeout_ms: 5,
            wait_strategy: WaitStrategy::Sleeping,
            ..DisruptorConfig::default()
        }
    }

    #[derive(Clone, Default)]
    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl EventHandler<u32> for CountingHandler {
        async fn handle(&self, _event_id: &str, _body: &u32) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_resolves_to_succeeded() {
        let core = DisruptorCore::new(test_config(), CountingHandler::default(), None);
        let outcome = core.publish(1, PublishOptions::default()).await.unwrap();
        assert_eq!(outcome, EventOutcome::Succeeded);
    }

    #[tokio::test]
    async fn dependency_gating_parks_until_dependency_completes() {
        let core = DisruptorCore::new(test_config(), CountingHandler::default(), None);

        let parent_id = "parent-1".to_string();
        let parent_opts = PublishOptions {
            id: Some(parent_id.clone()),
            ..Default::default()
        };
        let child_opts = PublishOptions {
            dependencies: [parent_id.clone()].into_iter().collect(),
            ..Default::default()
        };

        let child = core.publish(2, child_opts);
        let parent = core.publish(1, parent_opts);

        let (parent_outcome, child_outcome) = tokio::join!(parent, child);
        assert_eq!(parent_outcome.unwrap(), EventOutcome::Succeeded);
        assert_eq!(child_outcome.unwrap(), EventOutcome::Succeeded);
    }

    #[tokio::test]
    async fn cyclic_dependency_is_rejected() {
        let core = DisruptorCore::new(test_config(), CountingHandler::default(), None);
        let a_opts = PublishOptions {
            id: Some("a".into()),
            dependencies: ["b".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let b_opts = PublishOptions {
            id: Some("b".into()),
            dependencies: ["a".to_string()].into_iter().collect(),
            ..Default::default()
        };

        // Register "a" depends on "b" without awaiting completion.
        let core2 = core.clone();
        let a_fut = tokio::spawn(async move { core2.publish(1, a_opts).await });
        tokio::task::yield_now().await;

        let err = core.publish(2, b_opts).await.unwrap_err();
        assert_eq!(err, Error::DependencyCycle("b".to_string()));
        a_fut.abort();
    }

    #[tokio::test]
    async fn batch_processing_flushes_at_batch_size() {
        let mut config = test_config();
        config.enable_batch_processing = true;
        config.batch_size = 2;
        config.batch_timeout_ms = 1000;
        let core = DisruptorCore::new(config, CountingHandler::default(), None);

        let a = core.publish(1, PublishOptions::default());
        let b = core.publish(2, PublishOptions::default());
        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), EventOutcome::Succeeded);
        assert_eq!(b.unwrap(), EventOutcome::Succeeded);
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_before_returning() {
        let core = DisruptorCore::new(test_config(), CountingHandler::default(), None);
        let _ = core.publish(1, PublishOptions::default()).await.unwrap();
        core.shutdown().await;
        assert_eq!(core.in_flight_count(), 0);
    }
}
