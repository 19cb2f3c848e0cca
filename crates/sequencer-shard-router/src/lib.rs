mod backend;
mod config;
mod error;
mod hashing;
mod ring;
mod router;
mod strategy;

pub use backend::{Row, ShardBackend};
pub use config::ShardRouterConfig;
pub use error::Error;
pub use hashing::HashFunction;
pub use ring::ConsistentHashRing;
pub use router::{ShardResult, ShardRouter, ShardStats, ShardStatus};
pub use strategy::{Range, Strategy, StrategyConfig};
