//! Parquet export of the cleaned tables and the published patient staging.

mod writer;
mod tables;

pub use writer::*;
pub use tables::*;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::clean::CleanTables;
use crate::config::OutputLocations;
use crate::models::StagedPatient;
use crate::source::Dataset;

/// Export errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Output already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// One written output dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenTable {
    pub dataset: String,
    pub path: PathBuf,
    pub rows: usize,
}

impl OutputLocations {
    /// Output directory for a dataset.
    pub fn location(&self, dataset: Dataset) -> &Path {
        match dataset {
            Dataset::Transactions => &self.transactions,
            Dataset::Insurance => &self.insurance,
            Dataset::Medications => &self.medications,
            Dataset::Patients => &self.patients,
        }
    }
}

fn write_table<T: ToBatch>(
    dataset: Dataset,
    rows: &[T],
    outputs: &OutputLocations,
) -> ExportResult<WrittenTable> {
    let batch = T::to_batch(rows)?;
    let dir = outputs.location(dataset);
    let path = write_parquet(&batch, dir, outputs.write_mode)?;

    info!(
        dataset = dataset.name(),
        rows = batch.num_rows(),
        path = %dir.display(),
        "Exported table"
    );

    Ok(WrittenTable {
        dataset: dataset.name().to_string(),
        path,
        rows: batch.num_rows(),
    })
}

/// Fail if any output destination exists and the write mode forbids
/// replacing it.
pub fn check_outputs(outputs: &OutputLocations) -> ExportResult<()> {
    for dataset in Dataset::ALL {
        check_writable(outputs.location(dataset), outputs.write_mode)?;
    }
    Ok(())
}

/// Write the four output datasets.
///
/// With [`WriteMode::ErrorIfExists`] every destination is checked before
/// anything is written.
pub fn write_outputs(
    tables: &CleanTables,
    patients: &[StagedPatient],
    outputs: &OutputLocations,
) -> ExportResult<Vec<WrittenTable>> {
    check_outputs(outputs)?;

    Ok(vec![
        write_table(Dataset::Transactions, &tables.transactions, outputs)?,
        write_table(Dataset::Insurance, &tables.insurance, outputs)?,
        write_table(Dataset::Medications, &tables.medications, outputs)?,
        write_table(Dataset::Patients, patients, outputs)?,
    ])
}
