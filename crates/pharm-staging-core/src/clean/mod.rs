//! Per-dataset cleaning.
//!
//! Order: date derivation → transaction dedup → null-fill → patient current-flag.
//! Insurance and medications pass through unchanged.

mod dates;
mod transactions;

pub use dates::*;
pub use transactions::*;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::DateFormat;
use crate::models::{Insurance, Medication, Patient, StagedPatient, Transaction};
use crate::source::RawTables;

/// Cleaned tables ready for the merge and export steps.
#[derive(Debug, Clone, Default)]
pub struct CleanTables {
    pub transactions: Vec<Transaction>,
    pub insurance: Vec<Insurance>,
    pub medications: Vec<Medication>,
    /// Current-flagged patients; the update batch for the merge
    pub patient_updates: Vec<StagedPatient>,
}

/// Counters from a cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub duplicates_removed: usize,
    pub payments_filled: usize,
    pub unparseable_transaction_dates: usize,
    pub unparseable_birthdays: usize,
}

/// Tag every freshly loaded patient as current, unconditionally.
pub fn tag_current(patients: Vec<Patient>) -> Vec<StagedPatient> {
    patients.into_iter().map(StagedPatient::current).collect()
}

/// Run all cleaning steps over freshly loaded tables.
pub fn clean_tables(raw: RawTables, format: &DateFormat) -> (CleanTables, CleanStats) {
    let mut stats = CleanStats::default();

    let mut transactions = raw.transactions;
    for tx in transactions.iter_mut() {
        tx.transaction_date_parsed = derive_date(
            tx.transaction_date.as_deref(),
            format,
            &mut stats.unparseable_transaction_dates,
        );
    }

    let mut patients = raw.patients;
    for patient in patients.iter_mut() {
        patient.birthday_parsed = derive_date(
            patient.birthday.as_deref(),
            format,
            &mut stats.unparseable_birthdays,
        );
    }

    let loaded = transactions.len();
    let mut transactions = dedup_transactions(transactions);
    stats.duplicates_removed = loaded - transactions.len();
    stats.payments_filled = fill_missing(&mut transactions);

    if stats.unparseable_transaction_dates + stats.unparseable_birthdays > 0 {
        warn!(
            transaction_dates = stats.unparseable_transaction_dates,
            birthdays = stats.unparseable_birthdays,
            "Unparseable dates set to null"
        );
    }
    info!(
        transactions = transactions.len(),
        duplicates_removed = stats.duplicates_removed,
        payments_filled = stats.payments_filled,
        patients = patients.len(),
        "Cleaned tables"
    );

    let tables = CleanTables {
        transactions,
        insurance: raw.insurance,
        medications: raw.medications,
        patient_updates: tag_current(patients),
    };
    (tables, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw_tx(id: i64, date: &str, paid: Option<f32>) -> Transaction {
        Transaction {
            transaction_id: Some(id),
            transaction_date: Some(date.into()),
            patient_id: Some("P1".into()),
            quantity: Some(1.0),
            amount_paid: paid,
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_end_to_end() {
        let mut birthday = Patient::new(1, "Ada", 10);
        birthday.birthday = Some("12/10/1815".into());

        let raw = RawTables {
            transactions: vec![
                raw_tx(1, "3/4/2022", Some(5.0)),
                raw_tx(1, "3/4/2022", Some(5.0)),
                raw_tx(2, "not-a-date", None),
            ],
            patients: vec![birthday, Patient::new(2, "Max", 11)],
            ..Default::default()
        };

        let (tables, stats) = clean_tables(raw, &DateFormat::default());

        assert_eq!(tables.transactions.len(), 2);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.payments_filled, 2);
        assert_eq!(stats.unparseable_transaction_dates, 1);
        assert_eq!(stats.unparseable_birthdays, 0);

        assert_eq!(
            tables.transactions[0].transaction_date_parsed,
            NaiveDate::from_ymd_opt(2022, 3, 4)
        );
        assert_eq!(tables.transactions[1].transaction_date_parsed, None);
        assert_eq!(tables.transactions[1].amount_paid, Some(0.0));
        assert_eq!(tables.transactions[1].transaction_date.as_deref(), Some("not-a-date"));

        assert_eq!(tables.patient_updates.len(), 2);
        assert!(tables.patient_updates.iter().all(|p| p.is_current));
        assert_eq!(
            tables.patient_updates[0].patient.birthday_parsed,
            NaiveDate::from_ymd_opt(1815, 12, 10)
        );
    }

    #[test]
    fn test_clean_is_deterministic() {
        let raw = RawTables {
            transactions: vec![
                raw_tx(1, "1/1/2022", None),
                raw_tx(1, "1/1/2022", None),
                raw_tx(3, "1/2/2022", Some(2.0)),
            ],
            ..Default::default()
        };

        let (first, _) = clean_tables(raw.clone(), &DateFormat::default());
        let (second, _) = clean_tables(raw, &DateFormat::default());
        assert_eq!(first.transactions, second.transactions);
    }
}
