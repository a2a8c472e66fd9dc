//! Change-aware synchronization of FPL data into SQLite.
//!
//! - **Hashing**: SHA256 fingerprints over change-sensitive columns
//! - **Upsert**: per-table reconciliation with insert/update/unchanged
//!   classification and per-row error isolation
//! - **Pipeline**: fetch, materialize and reconcile across entity kinds
//!
//! # Example
//!
//! ```ignore
//! use fplsync::source::StaticSource;
//! use fplsync::storage::SqliteStorage;
//! use fplsync::sync::{RunOptions, SyncPipeline};
//! use fplsync::model::RunMode;
//!
//! let mut storage = SqliteStorage::open(&db_path)?;
//! let mut pipeline = SyncPipeline::new(source, &mut storage, RunOptions::default());
//! let report = pipeline.run(&[], RunMode::Full)?;
//! println!("{} rows written", report.totals().inserted + report.totals().updated);
//! ```

mod hash;
mod pipeline;
mod upsert;

pub use hash::fingerprint;
pub use pipeline::{PipelineReport, RunOptions, SyncPipeline};
pub use upsert::{reconcile, ReconcileReport, RowError};
