//! Database layer for the persisted patient staging table.

mod schema;
mod staging;

pub use schema::*;
pub use staging::*;

use std::fmt;
use std::fs;
use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;

use crate::scd::ScdError;

/// Step of the merge transaction, reported when it fails part-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    StageBatch,
    ReadStaging,
    Audit,
    Invalidate,
    Insert,
    Commit,
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStage::StageBatch => "stage update batch",
            MergeStage::ReadStaging => "read staging",
            MergeStage::Audit => "record merge run",
            MergeStage::Invalidate => "invalidate",
            MergeStage::Insert => "insert",
            MergeStage::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Staging database errors.
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot create staging database directory: {0}")]
    Io(#[from] std::io::Error),

    /// The merge transaction failed after it started; it was rolled back.
    #[error("Staging merge incomplete at '{stage}', rolled back: {source}")]
    MergeIncomplete {
        stage: MergeStage,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Plan(#[from] ScdError),
}

pub type StagingResult<T> = Result<T, StagingError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating it and its directory if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StagingResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> StagingResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> StagingResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("staging.db");

        Database::open(&path).unwrap();
        assert!(path.exists());

        // Reopening an existing store keeps working
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"patient_staging".to_string()));
        assert!(tables.contains(&"patient_updates".to_string()));
        assert!(tables.contains(&"merge_runs".to_string()));
    }
}
