//! Patient models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A patient record as loaded from the patients file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Patient {
    /// Business key shared by every history row of the same patient
    pub id: Option<i64>,
    pub name: Option<String>,
    /// Raw birthday string, `M/d/yyyy` in the source
    pub birthday: Option<String>,
    /// Parsed `birthday`, null when unparseable
    pub birthday_parsed: Option<NaiveDate>,
    pub phone: Option<String>,
    /// Insurance plan ID; the only attribute tracked for history
    pub insurance_id: Option<i64>,
}

impl Patient {
    /// Create a patient with the identifying fields set.
    pub fn new(id: i64, name: impl Into<String>, insurance_id: i64) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            insurance_id: Some(insurance_id),
            ..Default::default()
        }
    }
}

/// A patient row in the SCD Type 2 staging table.
///
/// Rows are immutable once staged; the only permitted change is flipping
/// `is_current` from `true` to `false` when a newer row supersedes this one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StagedPatient {
    #[serde(flatten)]
    pub patient: Patient,
    /// Whether this row is the presently valid state for `patient.id`
    pub is_current: bool,
}

impl StagedPatient {
    /// Tag a freshly loaded patient as current.
    pub fn current(patient: Patient) -> Self {
        Self {
            patient,
            is_current: true,
        }
    }

    /// `is_current` as the 0/1 integer stored and published downstream.
    pub fn is_current_flag(&self) -> i32 {
        i32::from(self.is_current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new(7, "Ada Lovelace", 3);
        assert_eq!(patient.id, Some(7));
        assert_eq!(patient.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(patient.insurance_id, Some(3));
        assert!(patient.birthday.is_none());
    }

    #[test]
    fn test_current_flag() {
        let mut staged = StagedPatient::current(Patient::new(1, "Max", 1));
        assert_eq!(staged.is_current_flag(), 1);

        staged.is_current = false;
        assert_eq!(staged.is_current_flag(), 0);
    }

    #[test]
    fn test_staged_serializes_flat() {
        let staged = StagedPatient::current(Patient::new(1, "Max", 2));
        let json = serde_json::to_value(&staged).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["insurance_id"], 2);
        assert_eq!(json["is_current"], true);
    }
}
