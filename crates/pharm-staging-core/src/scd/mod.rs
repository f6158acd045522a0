//! SCD Type 2 merge planning for the patient dimension.
//!
//! The merge is split into a pure plan (this module) and a transactional
//! apply against the staging database ([`crate::db`]). Planning mirrors a
//! MERGE keyed on `id` with `insurance_id` as the sole change key:
//!
//! 1. every staging row whose `id` matches a batch row and whose
//!    `insurance_id` differs from it is invalidated (`is_current = 0`);
//! 2. batch rows are appended as new current rows.
//!
//! Comparisons use SQL semantics: null never matches.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::StagedPatient;

/// Merge planning errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScdError {
    #[error(
        "Staging row {row_id} (patient {id}) is matched by {matches} update rows with differing insurance"
    )]
    AmbiguousSource { row_id: i64, id: i64, matches: usize },
}

pub type ScdResult<T> = Result<T, ScdError>;

/// Which update-batch rows are appended to the staging table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPolicy {
    /// Append every batch row, changed or not. Unchanged patients gain a
    /// second current row on every run.
    #[default]
    Unconditional,
    /// Skip batch rows whose id and insurance id equal a staging row that
    /// stays current.
    ChangedOnly,
}

/// The merge-relevant projection of a staging row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingRowRef {
    pub row_id: i64,
    pub id: Option<i64>,
    pub insurance_id: Option<i64>,
    pub is_current: bool,
}

/// The computed effect of merging one update batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// Staging row ids to flip from current to not-current
    pub invalidate: Vec<i64>,
    /// Rows to append, all current
    pub insert: Vec<StagedPatient>,
    /// Batch rows left out by `InsertPolicy::ChangedOnly`
    pub skipped_unchanged: usize,
}

fn insurance_differs(staged: Option<i64>, update: Option<i64>) -> bool {
    matches!((staged, update), (Some(a), Some(b)) if a != b)
}

fn insurance_equal(staged: Option<i64>, update: Option<i64>) -> bool {
    matches!((staged, update), (Some(a), Some(b)) if a == b)
}

/// Plan a merge of `batch` into the staging rows `existing`.
///
/// Fails without side effects when more than one batch row would invalidate
/// the same staging row.
pub fn plan_merge(
    existing: &[StagingRowRef],
    batch: &[StagedPatient],
    policy: InsertPolicy,
) -> ScdResult<MergePlan> {
    let mut batch_by_id: HashMap<i64, Vec<Option<i64>>> = HashMap::new();
    for row in batch {
        if let Some(id) = row.patient.id {
            batch_by_id
                .entry(id)
                .or_default()
                .push(row.patient.insurance_id);
        }
    }

    let mut invalidate = Vec::new();
    for row in existing {
        let Some(id) = row.id else { continue };
        let Some(updates) = batch_by_id.get(&id) else {
            continue;
        };

        let matches = updates
            .iter()
            .filter(|ins| insurance_differs(row.insurance_id, **ins))
            .count();
        if matches > 1 {
            return Err(ScdError::AmbiguousSource {
                row_id: row.row_id,
                id,
                matches,
            });
        }
        if matches == 1 && row.is_current {
            invalidate.push(row.row_id);
        }
    }

    let mut plan = MergePlan {
        invalidate,
        ..Default::default()
    };

    let invalidated: HashSet<i64> = plan.invalidate.iter().copied().collect();
    let unchanged = |update: &StagedPatient| {
        existing.iter().any(|row| {
            row.is_current
                && !invalidated.contains(&row.row_id)
                && row.id.is_some()
                && row.id == update.patient.id
                && insurance_equal(row.insurance_id, update.patient.insurance_id)
        })
    };

    for update in batch {
        if policy == InsertPolicy::ChangedOnly && unchanged(update) {
            plan.skipped_unchanged += 1;
            continue;
        }
        plan.insert.push(StagedPatient {
            patient: update.patient.clone(),
            is_current: true,
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;

    fn staged(row_id: i64, id: i64, insurance_id: i64, is_current: bool) -> StagingRowRef {
        StagingRowRef {
            row_id,
            id: Some(id),
            insurance_id: Some(insurance_id),
            is_current,
        }
    }

    fn update(id: i64, insurance_id: i64) -> StagedPatient {
        StagedPatient::current(Patient::new(id, format!("patient-{}", id), insurance_id))
    }

    #[test]
    fn test_changed_insurance_invalidates() {
        let plan = plan_merge(
            &[staged(1, 1, 100, true)],
            &[update(1, 200)],
            InsertPolicy::Unconditional,
        )
        .unwrap();

        assert_eq!(plan.invalidate, vec![1]);
        assert_eq!(plan.insert.len(), 1);
        assert_eq!(plan.insert[0].patient.insurance_id, Some(200));
        assert!(plan.insert[0].is_current);
    }

    #[test]
    fn test_unchanged_insurance_not_invalidated_but_inserted() {
        let mut changed_phone = update(2, 100);
        changed_phone.patient.phone = Some("555-0199".into());

        let plan = plan_merge(
            &[staged(1, 2, 100, true)],
            &[changed_phone],
            InsertPolicy::Unconditional,
        )
        .unwrap();

        assert!(plan.invalidate.is_empty());
        assert_eq!(plan.insert.len(), 1);
        assert_eq!(plan.skipped_unchanged, 0);
    }

    #[test]
    fn test_changed_only_skips_unchanged() {
        let plan = plan_merge(
            &[staged(1, 2, 100, true), staged(2, 3, 100, true)],
            &[update(2, 100), update(3, 300)],
            InsertPolicy::ChangedOnly,
        )
        .unwrap();

        assert_eq!(plan.invalidate, vec![2]);
        assert_eq!(plan.insert.len(), 1);
        assert_eq!(plan.insert[0].patient.id, Some(3));
        assert_eq!(plan.skipped_unchanged, 1);
    }

    #[test]
    fn test_changed_only_inserts_new_patient() {
        let plan = plan_merge(&[], &[update(9, 1)], InsertPolicy::ChangedOnly).unwrap();
        assert_eq!(plan.insert.len(), 1);
    }

    #[test]
    fn test_null_never_matches() {
        let existing = [StagingRowRef {
            row_id: 1,
            id: Some(1),
            insurance_id: None,
            is_current: true,
        }];
        let mut null_id = update(1, 5);
        null_id.patient.id = None;

        let plan = plan_merge(
            &existing,
            &[update(1, 5), null_id],
            InsertPolicy::Unconditional,
        )
        .unwrap();

        assert!(plan.invalidate.is_empty());
        assert_eq!(plan.insert.len(), 2);
    }

    #[test]
    fn test_already_invalidated_rows_untouched() {
        let plan = plan_merge(
            &[staged(1, 1, 100, false), staged(2, 1, 200, true)],
            &[update(1, 300)],
            InsertPolicy::Unconditional,
        )
        .unwrap();

        assert_eq!(plan.invalidate, vec![2]);
    }

    #[test]
    fn test_ambiguous_source_rejected() {
        let err = plan_merge(
            &[staged(7, 1, 100, true)],
            &[update(1, 200), update(1, 300)],
            InsertPolicy::Unconditional,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ScdError::AmbiguousSource {
                row_id: 7,
                id: 1,
                matches: 2
            }
        );
    }

    #[test]
    fn test_duplicate_batch_rows_without_conflict_allowed() {
        let plan = plan_merge(
            &[staged(1, 1, 100, true)],
            &[update(1, 100), update(1, 100)],
            InsertPolicy::Unconditional,
        )
        .unwrap();

        assert!(plan.invalidate.is_empty());
        assert_eq!(plan.insert.len(), 2);
    }
}
