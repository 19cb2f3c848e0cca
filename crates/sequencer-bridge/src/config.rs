/// Bridge Batcher configuration (§6.5 `Bridge`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub batch_size: usize,
    pub max_parallelism: usize,
    pub confirmation_levels: u32,
    pub adaptive_confirmations: bool,
    pub min_conf: u32,
    pub max_conf: u32,
    pub high_value_threshold: u128,
    pub optimistic_execution: bool,
    pub prefetching_enabled: bool,
    pub caching_enabled: bool,
    pub cache_size: usize,
    pub cache_ttl_ms: u64,
    pub priority_levels: u32,
    pub monitoring_enabled: bool,
    pub metrics_interval_ms: u64,
    pub gas_optimization_enabled: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_parallelism: 8,
            confirmation_levels: 2,
            adaptive_confirmations: true,
            min_conf: 1,
            max_conf: 5,
            high_value_threshold: 100_000_000_000,
            optimistic_execution: true,
            prefetching_enabled: true,
            caching_enabled: true,
            cache_size: 10_000,
            cache_ttl_ms: 3_600_000,
            priority_levels: 3,
            monitoring_enabled: true,
            metrics_interval_ms: 10_000,
            gas_optimization_enabled: false,
        }
    }
}
