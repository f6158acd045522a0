//! SQLite schema definition.

/// Complete database schema for the patient staging store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Merge Runs (Audit Log)
-- ============================================================================

CREATE TABLE IF NOT EXISTS merge_runs (
    batch_id TEXT PRIMARY KEY,                   -- UUID v4
    merged_at TEXT NOT NULL,                     -- RFC 3339
    insert_policy TEXT NOT NULL CHECK (insert_policy IN ('unconditional', 'changed_only')),
    batch_rows INTEGER NOT NULL,
    invalidated INTEGER NOT NULL,
    inserted INTEGER NOT NULL,
    skipped_unchanged INTEGER NOT NULL
);

-- ============================================================================
-- Patient Staging (SCD Type 2, Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patient_staging (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,    -- insertion order
    id INTEGER,
    name TEXT,
    birthday TEXT,
    birthday_parsed TEXT,                        -- ISO 8601 date
    phone TEXT,
    insurance_id INTEGER,
    is_current INTEGER NOT NULL CHECK (is_current IN (0, 1)),
    batch_id TEXT NOT NULL REFERENCES merge_runs(batch_id)
);

CREATE INDEX IF NOT EXISTS idx_patient_staging_id ON patient_staging(id);
CREATE INDEX IF NOT EXISTS idx_patient_staging_current ON patient_staging(is_current);

-- Rows are immutable once written; only is_current may flip from 1 to 0
CREATE TRIGGER IF NOT EXISTS patient_staging_immutable
BEFORE UPDATE OF row_id, id, name, birthday, birthday_parsed, phone, insurance_id, batch_id
ON patient_staging
BEGIN
    SELECT RAISE(ABORT, 'patient_staging rows are immutable');
END;

CREATE TRIGGER IF NOT EXISTS patient_staging_no_reinstate
BEFORE UPDATE OF is_current ON patient_staging
WHEN new.is_current > old.is_current
BEGIN
    SELECT RAISE(ABORT, 'is_current may only change from 1 to 0');
END;

CREATE TRIGGER IF NOT EXISTS patient_staging_append_only
BEFORE DELETE ON patient_staging
BEGIN
    SELECT RAISE(ABORT, 'patient_staging is append-only');
END;

-- ============================================================================
-- Patient Updates (Update Batch - Overwritten Each Run)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patient_updates (
    id INTEGER,
    name TEXT,
    birthday TEXT,
    birthday_parsed TEXT,
    phone TEXT,
    insurance_id INTEGER,
    is_current INTEGER NOT NULL CHECK (is_current IN (0, 1))
);
"#;
