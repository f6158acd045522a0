//! Source loading: registry, schema-typed CSV reader, typed row decoding.

mod reader;
mod registry;
mod rows;

pub use reader::*;
pub use registry::*;
pub use rows::*;

use std::path::PathBuf;

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use thiserror::Error;

/// Load errors. All are fatal for a run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Source '{dataset}' unavailable at {path}: {source}")]
    Unavailable {
        dataset: Dataset,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema mismatch loading '{dataset}' from {path}: {source}")]
    Schema {
        dataset: Dataset,
        path: PathBuf,
        #[source]
        source: ArrowError,
    },

    #[error("Column '{column}' missing or not of type {expected}")]
    Column { column: String, expected: DataType },
}

pub type LoadResult<T> = Result<T, LoadError>;
