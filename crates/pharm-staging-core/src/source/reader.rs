//! Schema-typed CSV reader.

use std::fs::File;
use std::path::Path;

use arrow::compute::concat_batches;
use arrow::csv::ReaderBuilder;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::info;

use super::{Dataset, FromBatch, LoadError, LoadResult, SourceRegistry};
use crate::models::{Insurance, Medication, Patient, Transaction};

/// Raw typed tables, one per dataset, before cleaning.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub transactions: Vec<Transaction>,
    pub insurance: Vec<Insurance>,
    pub medications: Vec<Medication>,
    pub patients: Vec<Patient>,
}

/// Read a headered CSV file into a single batch typed by the dataset's schema.
///
/// The header row is skipped and columns bind by position. Missing trailing
/// fields read as null. A value that does not parse as its column type fails
/// the whole load.
pub fn read_table(dataset: Dataset, path: &Path) -> LoadResult<RecordBatch> {
    let schema = dataset.schema();
    let schema_error = |source: ArrowError| LoadError::Schema {
        dataset,
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| LoadError::Unavailable {
        dataset,
        path: path.to_path_buf(),
        source,
    })?;

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_truncated_rows(true)
        .build(file)
        .map_err(schema_error)?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(schema_error)?;

    concat_batches(&schema, &batches).map_err(schema_error)
}

/// Read a dataset and decode it into typed rows.
pub fn load_rows<T: FromBatch>(registry: &SourceRegistry) -> LoadResult<Vec<T>> {
    let entry = registry.get(T::DATASET);
    let batch = read_table(entry.dataset, &entry.location)?;
    let rows = T::from_batch(&batch)?;

    info!(
        dataset = %entry.dataset,
        path = %entry.location.display(),
        rows = rows.len(),
        "Loaded source"
    );
    Ok(rows)
}

/// Load all four sources in registry order.
pub fn load_all(registry: &SourceRegistry) -> LoadResult<RawTables> {
    Ok(RawTables {
        transactions: load_rows(registry)?,
        insurance: load_rows(registry)?,
        medications: load_rows(registry)?,
        patients: load_rows(registry)?,
    })
}
