//! The batch job: load → clean → merge → publish → write.

use serde::Serialize;
use tracing::{info, info_span};

use crate::clean::{clean_tables, CleanStats};
use crate::config::PipelineConfig;
use crate::db::{Database, MergeRun};
use crate::export::{check_outputs, write_outputs, WrittenTable};
use crate::source::{load_all, SourceRegistry};
use crate::PipelineResult;

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub transactions: usize,
    pub insurance: usize,
    pub medications: usize,
    pub patients: usize,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    /// Rows as loaded from the sources
    pub loaded: TableCounts,
    /// Rows written; `patients` counts published staging rows
    pub written: TableCounts,
    pub cleaning: CleanStats,
    /// Sum of `Paid` over the cleaned, non-void transactions
    pub total_paid: f64,
    pub merge: MergeRun,
    pub outputs: Vec<WrittenTable>,
}

/// Runs the staging job for one configuration.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the job once against the staging store `db`.
    ///
    /// Any error aborts the run. Existing outputs that may not be replaced
    /// are detected before the merge, so such a run leaves the staging table
    /// untouched. A failed merge also leaves it as it was; a failed write may
    /// leave earlier outputs in place.
    pub fn run(&self, db: &mut Database) -> PipelineResult<RunSummary> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("pipeline_run", run_id = %run_id);
        let _guard = span.enter();

        check_outputs(&self.config.outputs)?;

        let registry = SourceRegistry::from_config(&self.config.sources);
        let raw = load_all(&registry)?;
        let loaded = TableCounts {
            transactions: raw.transactions.len(),
            insurance: raw.insurance.len(),
            medications: raw.medications.len(),
            patients: raw.patients.len(),
        };

        let (tables, cleaning) = clean_tables(raw, &self.config.date_format);
        let total_paid = tables
            .transactions
            .iter()
            .map(|tx| f64::from(tx.effective_paid()))
            .sum();

        let merge =
            db.merge_patient_batch(&tables.patient_updates, self.config.merge.insert_policy)?;
        let published = db.read_staging(self.config.merge.publish)?;

        let outputs = write_outputs(&tables, &published, &self.config.outputs)?;
        let written = TableCounts {
            transactions: tables.transactions.len(),
            insurance: tables.insurance.len(),
            medications: tables.medications.len(),
            patients: published.len(),
        };

        info!(
            transactions = written.transactions,
            patients = written.patients,
            duplicates_removed = cleaning.duplicates_removed,
            "Pipeline run complete"
        );

        Ok(RunSummary {
            run_id,
            loaded,
            written,
            cleaning,
            total_paid,
            merge,
            outputs,
        })
    }
}
