use crate::strategy::StrategyConfig;

/// Configuration of the shard router: the number of shards (implied by
/// the length of the backend list the caller supplies) and the routing
/// strategy applied to keys.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShardRouterConfig {
    pub strategy: StrategyConfig,
}

impl Default for ShardRouterConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::Hash {
                function: crate::hashing::HashFunction::Sha1,
            },
        }
    }
}
