//! Checkpoint & Recovery Engine (C4): periodic, generation-bounded
//! snapshotting of sequencer state with last-good-snapshot restoration.
//!
//! No process-wide singleton — one [`CheckpointEngine`] per sequencer
//! instance, matching this workspace's per-instance client convention
//! (see `sequencer_telemetry::Registry`'s module docs).

mod config;
mod engine;
mod error;
mod id;
mod metrics;
mod record;
mod state;

pub use config::CheckpointConfig;
pub use engine::CheckpointEngine;
pub use error::Error;
pub use metrics::MetricsSnapshot;
pub use record::CheckpointRecord;
pub use state::SequencerState;
