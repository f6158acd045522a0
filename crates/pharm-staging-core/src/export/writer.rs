//! Snappy-compressed Parquet output directories.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ExportError, ExportResult};

/// Data file inside each output directory.
pub const PART_FILE: &str = "part-00000.snappy.parquet";

/// Empty marker written once the data file is complete.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Behaviour when an output directory already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Refuse to write over an existing output.
    #[default]
    ErrorIfExists,
    /// Replace the existing output.
    Overwrite,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Fail if `dir` exists and `mode` does not allow replacing it.
pub fn check_writable(dir: &Path, mode: WriteMode) -> ExportResult<()> {
    if mode == WriteMode::ErrorIfExists && dir.exists() {
        return Err(ExportError::AlreadyExists(dir.to_path_buf()));
    }
    Ok(())
}

/// Write `batch` as a single Parquet part file under `dir`.
///
/// Returns the path of the data file.
pub fn write_parquet(batch: &RecordBatch, dir: &Path, mode: WriteMode) -> ExportResult<PathBuf> {
    check_writable(dir, mode)?;

    if dir.is_dir() {
        fs::remove_dir_all(dir).map_err(io_error(dir))?;
    } else if dir.exists() {
        fs::remove_file(dir).map_err(io_error(dir))?;
    }
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let path = dir.join(PART_FILE);
    let file = File::create(&path).map_err(io_error(&path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    let marker = dir.join(SUCCESS_MARKER);
    File::create(&marker).map_err(io_error(&marker))?;

    debug!(path = %path.display(), rows = batch.num_rows(), "Wrote parquet");
    Ok(path)
}
