use sequencer_bridge::BridgeConfig;
use sequencer_checkpoint::CheckpointConfig;
use sequencer_disruptor::DisruptorConfig;
use sequencer_shard_router::ShardRouterConfig;

/// Top-level configuration for a `sequencer-node` process: one struct per
/// component, plus the handful of process-level knobs (identity,
/// bind address, shard count, metrics snapshot directory) the components
/// don't own themselves.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub sequencer_identity: String,
    pub bind: String,
    pub shard_count: usize,
    pub metrics_dir: String,
    pub bridge: BridgeConfig,
    pub checkpoint: CheckpointConfig,
    pub shard_router: ShardRouterConfig,
    #[serde(skip, default = "DisruptorConfig::default")]
    pub disruptor: DisruptorConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sequencer_identity: "sequencer-1".to_string(),
            bind: "127.0.0.1:8080".to_string(),
            shard_count: 4,
            metrics_dir: "./metrics".to_string(),
            bridge: BridgeConfig::default(),
            checkpoint: CheckpointConfig::default(),
            shard_router: ShardRouterConfig::default(),
            disruptor: DisruptorConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Merge a YAML document's fields over the defaults. Missing keys keep
    /// their default value via each struct's `#[serde(default)]`.
    pub fn from_yaml(body: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = NodeConfig::from_yaml("{}").unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.bridge.batch_size, 100);
    }

    #[test]
    fn partial_override_merges_with_defaults() {
        let config = NodeConfig::from_yaml("bind: \"0.0.0.0:9000\"\nbridge:\n  batch_size: 50\n").unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.bridge.batch_size, 50);
        assert_eq!(config.bridge.max_parallelism, BridgeConfig::default().max_parallelism);
    }
}
