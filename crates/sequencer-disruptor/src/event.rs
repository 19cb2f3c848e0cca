use std::collections::HashSet;

/// Lifecycle of a single event as it moves through the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Queued,
    Published,
    PendingDeps,
    InFlight,
    Succeeded,
    Failed,
}

/// Disruptor payload envelope. `T` is the opaque business body; the core
/// never inspects it.
#[derive(Debug, Clone)]
pub struct Event<T> {
    pub id: String,
    pub body: T,
    pub created_at_ms: i64,
    pub dependencies: HashSet<String>,
    pub priority: u32,
}

/// Options accepted by `publish`.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub dependencies: HashSet<String>,
    pub priority: u32,
    /// Caller-assigned id. When absent a random id is generated. Supplying
    /// one's own id is how dependent events can be declared ahead of the
    /// event that will satisfy them, which is also what makes cycle
    /// detection meaningful for not-yet-published events.
    pub id: Option<String>,
}

/// The outcome delivered to a publisher's completion future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Succeeded,
    Failed(String),
    WorkerLost,
}
