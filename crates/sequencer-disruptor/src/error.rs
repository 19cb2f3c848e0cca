/// Error taxonomy entries owned by the disruptor core.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("ring buffer is full")]
    RingFull,
    #[error("dependency cycle detected for event {0}")]
    DependencyCycle(String),
    #[error("event handling failed: {0}")]
    HandlerFailed(String),
    #[error("worker assigned to this event was lost")]
    WorkerLost,
    #[error("disruptor is shutting down")]
    ShuttingDown,
}

impl From<sequencer_ring::Error> for Error {
    fn from(_: sequencer_ring::Error) -> Self {
        Error::RingFull
    }
}

impl From<crate::deps::CycleError> for Error {
    fn from(e: crate::deps::CycleError) -> Self {
        Error::DependencyCycle(e.0)
    }
}
