/// Wait strategy applied when a worker finds no published event at the
/// sequence it is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    Yielding,
    Sleeping,
    Blocking,
}

/// Tunable configuration of the disruptor core.
#[derive(Debug, Clone)]
pub struct DisruptorConfig {
    pub buffer_size: usize,
    pub worker_count: usize,
    pub enable_parallel_processing: bool,
    pub batch_size: usize,
    pub wait_strategy: WaitStrategy,
    pub claim_strategy: sequencer_ring::ClaimStrategy,
    pub enable_metrics: bool,
    pub metrics_interval_ms: u64,
    pub enable_dependency_tracking: bool,
    pub max_dependencies: usize,
    pub enable_batch_processing: bool,
    pub batch_timeout_ms: u64,
    pub enable_prioritization: bool,
    pub priority_levels: u32,
    pub default_priority: u32,
}

impl Default for DisruptorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            worker_count: default_worker_count(),
            enable_parallel_processing: true,
            batch_size: 100,
            wait_strategy: WaitStrategy::Yielding,
            claim_strategy: sequencer_ring::ClaimStrategy::Single,
            enable_metrics: true,
            metrics_interval_ms: 10_000,
            enable_dependency_tracking: true,
            max_dependencies: 1000,
            enable_batch_processing: true,
            batch_timeout_ms: 10,
            enable_prioritization: true,
            priority_levels: 3,
            default_priority: 1,
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
        .min(4)
}
