//! Bridge Batcher (C6): priority-queued ingest of L1<->L2 bridge
//! operations with adaptive confirmations, Merkle-proof verification,
//! batched parallel settlement dispatch, and gas-aware withdrawal
//! ordering.

mod batcher;
mod cache;
mod config;
mod confirmation;
mod error;
mod external;
mod gas;
mod merkle;
mod operation;
mod persist;
mod queue;
mod worker;

pub use batcher::{BridgeBatcher, BridgeMetricsSnapshot, BridgeStatus, StatusLookup};
pub use config::BridgeConfig;
pub use error::Error;
pub use external::SettlementLayer;
pub use operation::{DepositParams, Operation, OperationKind, OperationStatus, WithdrawParams};
pub use worker::{FailedOperation, OperationExecutor, OperationsProcessed, WorkerPool};
