//! Pharm Staging Core Library
//!
//! Batch ETL that stages pharmacy data for analytics: four delimited sources
//! are loaded with fixed schemas, cleaned, and written as Parquet, while the
//! patient dimension is kept as an SCD Type 2 history in a local SQLite store.
//!
//! # Architecture
//!
//! ```text
//!   tx / ins / med / pt (CSV)
//!              │
//!       Source Registry ──► Typed Loader
//!              │
//!           Cleaner
//!   (dates, dedup, null-fill, current flag)
//!              │
//!     ┌────────┴─────────┐
//!     │                  ▼
//!     │        [STAGING: patient_updates]
//!     │                  │
//!     │         SCD Type 2 Merge (one transaction)
//!     │                  │
//!     │        [STAGING: patient_staging]
//!     │                  │
//!     └────────┬─────────┘
//!              ▼
//!       Parquet Writer (Snappy)
//! ```
//!
//! # Modules
//!
//! - [`config`]: TOML job configuration
//! - [`source`]: Source registry, schema-typed CSV loading
//! - [`clean`]: Date derivation, dedup, null-fill
//! - [`scd`]: Merge planning for the patient dimension
//! - [`db`]: SQLite staging store (append-only history, merge audit)
//! - [`export`]: Parquet output
//! - [`pipeline`]: The end-to-end job

pub mod clean;
pub mod config;
pub mod db;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod scd;
pub mod source;

// Re-export commonly used types
pub use config::{DateFormat, PipelineConfig};
pub use db::{Database, MergeRun, PublishMode};
pub use export::WriteMode;
pub use models::{Insurance, Medication, Patient, StagedPatient, Transaction};
pub use pipeline::{Pipeline, RunSummary};
pub use scd::InsertPolicy;

use thiserror::Error;

/// Top-level error for a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] source::LoadError),

    #[error("Staging error: {0}")]
    Staging(#[from] db::StagingError),

    #[error("Export error: {0}")]
    Export(#[from] export::ExportError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
