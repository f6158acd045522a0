//! Dispensing transaction models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single dispensing transaction as it appears in the transactions file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Transaction {
    /// Transaction identifier (not guaranteed unique in the source)
    pub transaction_id: Option<i64>,
    /// Raw date string, `M/d/yyyy` in the source
    pub transaction_date: Option<String>,
    /// Parsed `transaction_date`, null when unparseable
    pub transaction_date_parsed: Option<NaiveDate>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    /// Mock NDC product code
    pub product_code: Option<String>,
    pub medication_name: Option<String>,
    /// Quantity dispensed
    pub quantity: Option<f32>,
    /// Unit price
    pub unit_price: Option<f32>,
    /// Amount paid; filled with 0.0 when absent
    pub amount_paid: Option<f32>,
    pub insurance_id: Option<String>,
    /// Void flag; filled with false when absent
    pub void_flag: Option<bool>,
}

impl Transaction {
    /// Whether either fill-able payment column is missing.
    pub fn has_missing_payment(&self) -> bool {
        self.amount_paid.is_none() || self.void_flag.is_none()
    }

    /// Net amount this transaction contributes, zero when voided.
    pub fn effective_paid(&self) -> f32 {
        if self.void_flag.unwrap_or(false) {
            0.0
        } else {
            self.amount_paid.unwrap_or(0.0)
        }
    }
}
