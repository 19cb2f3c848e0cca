//! Telemetry Facade (C1): counters/gauges/histograms with timeframed
//! queries, summary analysis, a live push stream, periodic snapshotting,
//! and a Prometheus exposition surface.
//!
//! No process-wide singleton: construct a [`Registry`] per owning
//! component (or share one `Arc<Registry>` across a subsystem), matching
//! this workspace's convention of per-instance clients (`gazette::Router`,
//! `ops::tracing::Layer`) rather than statics.

mod analysis;
mod kinds;
mod persistence;
mod prometheus_export;
mod registry;
mod timeframe;

pub use analysis::{analyze, Analysis};
pub use kinds::{MetricKind, MetricPoint, MetricSample};
pub use persistence::{load_latest, save_snapshot, Error as PersistenceError, RETAINED_SNAPSHOTS};
pub use prometheus_export::PrometheusExporter;
pub use registry::{Registry, MAX_POINTS};
pub use timeframe::Timeframe;
