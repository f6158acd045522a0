//! Patient staging operations: update batch, SCD Type 2 merge, publish.

use chrono::Utc;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Database, MergeStage, StagingError, StagingResult};
use crate::models::{Patient, StagedPatient};
use crate::scd::{plan_merge, InsertPolicy, StagingRowRef};

/// Which staging rows are published as the patient dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Every historical row, in insertion order
    #[default]
    FullHistory,
    /// Only rows with `is_current = 1`
    CurrentOnly,
}

/// Audit record of one merge, also returned as the merge's statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRun {
    pub batch_id: String,
    pub merged_at: String,
    pub insert_policy: String,
    pub batch_rows: usize,
    pub invalidated: usize,
    pub inserted: usize,
    pub skipped_unchanged: usize,
}

/// One row of a patient's staging history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub row_id: i64,
    pub batch_id: String,
    pub merged_at: String,
    #[serde(flatten)]
    pub record: StagedPatient,
}

const PATIENT_COLUMNS: &str = "id, name, birthday, birthday_parsed, phone, insurance_id, is_current";

fn staged_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<StagedPatient> {
    Ok(StagedPatient {
        patient: Patient {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            birthday: row.get(offset + 2)?,
            birthday_parsed: row.get(offset + 3)?,
            phone: row.get(offset + 4)?,
            insurance_id: row.get(offset + 5)?,
        },
        is_current: row.get(offset + 6)?,
    })
}

fn policy_name(policy: InsertPolicy) -> &'static str {
    match policy {
        InsertPolicy::Unconditional => "unconditional",
        InsertPolicy::ChangedOnly => "changed_only",
    }
}

fn incomplete(stage: MergeStage) -> impl FnOnce(rusqlite::Error) -> StagingError {
    move |source| StagingError::MergeIncomplete { stage, source }
}

/// Replace the update batch table's contents.
fn overwrite_update_batch(conn: &Connection, batch: &[StagedPatient]) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM patient_updates", [])?;

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO patient_updates ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        PATIENT_COLUMNS
    ))?;
    for row in batch {
        let p = &row.patient;
        stmt.execute(params![
            p.id,
            p.name,
            p.birthday,
            p.birthday_parsed,
            p.phone,
            p.insurance_id,
            row.is_current,
        ])?;
    }
    Ok(())
}

fn staging_refs(conn: &Connection) -> rusqlite::Result<Vec<StagingRowRef>> {
    let mut stmt = conn.prepare(
        "SELECT row_id, id, insurance_id, is_current FROM patient_staging ORDER BY row_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(StagingRowRef {
            row_id: row.get(0)?,
            id: row.get(1)?,
            insurance_id: row.get(2)?,
            is_current: row.get(3)?,
        })
    })?;
    rows.collect()
}

fn record_run(conn: &Connection, run: &MergeRun) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO merge_runs (
            batch_id, merged_at, insert_policy, batch_rows,
            invalidated, inserted, skipped_unchanged
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            run.batch_id,
            run.merged_at,
            run.insert_policy,
            run.batch_rows as i64,
            run.invalidated as i64,
            run.inserted as i64,
            run.skipped_unchanged as i64,
        ],
    )?;
    Ok(())
}

fn invalidate_rows(conn: &Connection, row_ids: &[i64]) -> rusqlite::Result<()> {
    let mut stmt = conn
        .prepare("UPDATE patient_staging SET is_current = 0 WHERE row_id = ?1 AND is_current = 1")?;
    for row_id in row_ids {
        stmt.execute([row_id])?;
    }
    Ok(())
}

fn insert_rows(conn: &Connection, batch_id: &str, rows: &[StagedPatient]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO patient_staging ({}, batch_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        PATIENT_COLUMNS
    ))?;
    for row in rows {
        let p = &row.patient;
        stmt.execute(params![
            p.id,
            p.name,
            p.birthday,
            p.birthday_parsed,
            p.phone,
            p.insurance_id,
            row.is_current,
            batch_id,
        ])?;
    }
    Ok(())
}

impl Database {
    /// Merge an update batch into the staging table.
    ///
    /// Stages the batch, invalidates superseded rows and appends the batch in
    /// one `IMMEDIATE` transaction. A failure after the transaction starts is
    /// reported as [`StagingError::MergeIncomplete`] and nothing is kept.
    pub fn merge_patient_batch(
        &mut self,
        batch: &[StagedPatient],
        policy: InsertPolicy,
    ) -> StagingResult<MergeRun> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        overwrite_update_batch(&tx, batch).map_err(incomplete(MergeStage::StageBatch))?;
        let existing = staging_refs(&tx).map_err(incomplete(MergeStage::ReadStaging))?;
        let plan = plan_merge(&existing, batch, policy)?;

        let run = MergeRun {
            batch_id: uuid::Uuid::new_v4().to_string(),
            merged_at: Utc::now().to_rfc3339(),
            insert_policy: policy_name(policy).to_string(),
            batch_rows: batch.len(),
            invalidated: plan.invalidate.len(),
            inserted: plan.insert.len(),
            skipped_unchanged: plan.skipped_unchanged,
        };
        debug!(
            batch_id = %run.batch_id,
            invalidate = ?plan.invalidate,
            "Planned patient merge"
        );

        record_run(&tx, &run).map_err(incomplete(MergeStage::Audit))?;
        invalidate_rows(&tx, &plan.invalidate).map_err(incomplete(MergeStage::Invalidate))?;
        insert_rows(&tx, &run.batch_id, &plan.insert).map_err(incomplete(MergeStage::Insert))?;
        tx.commit().map_err(incomplete(MergeStage::Commit))?;

        info!(
            batch_id = %run.batch_id,
            batch_rows = run.batch_rows,
            invalidated = run.invalidated,
            inserted = run.inserted,
            skipped_unchanged = run.skipped_unchanged,
            "Merged patient batch"
        );
        Ok(run)
    }

    /// Read the staging table as the published patient dimension.
    pub fn read_staging(&self, mode: PublishMode) -> StagingResult<Vec<StagedPatient>> {
        let filter = match mode {
            PublishMode::FullHistory => "",
            PublishMode::CurrentOnly => "WHERE is_current = 1",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patient_staging {} ORDER BY row_id",
            PATIENT_COLUMNS, filter
        ))?;

        let rows = stmt.query_map([], |row| staged_from_row(row, 0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Read the most recently staged update batch.
    pub fn read_update_batch(&self) -> StagingResult<Vec<StagedPatient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patient_updates ORDER BY rowid",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([], |row| staged_from_row(row, 0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Full staging history of one patient, oldest first.
    pub fn patient_history(&self, id: i64) -> StagingResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.row_id, s.batch_id, r.merged_at,
                   s.id, s.name, s.birthday, s.birthday_parsed, s.phone,
                   s.insurance_id, s.is_current
            FROM patient_staging s
            JOIN merge_runs r ON r.batch_id = s.batch_id
            WHERE s.id = ?
            ORDER BY s.row_id
            "#,
        )?;

        let rows = stmt.query_map([id], |row| {
            Ok(HistoryEntry {
                row_id: row.get(0)?,
                batch_id: row.get(1)?,
                merged_at: row.get(2)?,
                record: staged_from_row(row, 3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// All merge runs, oldest first.
    pub fn list_merge_runs(&self) -> StagingResult<Vec<MergeRun>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT batch_id, merged_at, insert_policy, batch_rows,
                   invalidated, inserted, skipped_unchanged
            FROM merge_runs
            ORDER BY merged_at, rowid
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(MergeRun {
                batch_id: row.get(0)?,
                merged_at: row.get(1)?,
                insert_policy: row.get(2)?,
                batch_rows: row.get::<_, i64>(3)? as usize,
                invalidated: row.get::<_, i64>(4)? as usize,
                inserted: row.get::<_, i64>(5)? as usize,
                skipped_unchanged: row.get::<_, i64>(6)? as usize,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
