//! Transaction deduplication and null-filling.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::Transaction;

/// Default for a missing `Paid`.
pub const PAID_DEFAULT: f32 = 0.0;

/// Default for a missing `Void`.
pub const VOID_DEFAULT: bool = false;

/// Whole-row identity of a transaction. Floats compare by bit pattern so the
/// key is `Eq + Hash`, with `-0.0` folded into `0.0`; null equals null.
#[derive(PartialEq, Eq, Hash)]
struct RowKey<'a> {
    transaction_id: Option<i64>,
    transaction_date: Option<&'a str>,
    transaction_date_parsed: Option<NaiveDate>,
    patient_id: Option<&'a str>,
    patient_name: Option<&'a str>,
    product_code: Option<&'a str>,
    medication_name: Option<&'a str>,
    quantity: Option<u32>,
    unit_price: Option<u32>,
    amount_paid: Option<u32>,
    insurance_id: Option<&'a str>,
    void_flag: Option<bool>,
}

fn float_key(value: f32) -> u32 {
    if value == 0.0 {
        0.0f32.to_bits()
    } else {
        value.to_bits()
    }
}

impl<'a> RowKey<'a> {
    fn of(tx: &'a Transaction) -> Self {
        Self {
            transaction_id: tx.transaction_id,
            transaction_date: tx.transaction_date.as_deref(),
            transaction_date_parsed: tx.transaction_date_parsed,
            patient_id: tx.patient_id.as_deref(),
            patient_name: tx.patient_name.as_deref(),
            product_code: tx.product_code.as_deref(),
            medication_name: tx.medication_name.as_deref(),
            quantity: tx.quantity.map(float_key),
            unit_price: tx.unit_price.map(float_key),
            amount_paid: tx.amount_paid.map(float_key),
            insurance_id: tx.insurance_id.as_deref(),
            void_flag: tx.void_flag,
        }
    }
}

/// Remove transactions identical in every column, keeping the first
/// occurrence. Rows that differ in any column, `transaction_id` included,
/// are all kept.
pub fn dedup_transactions(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(transactions.len());
        transactions
            .iter()
            .map(|tx| seen.insert(RowKey::of(tx)))
            .collect()
    };

    transactions
        .into_iter()
        .zip(keep)
        .filter_map(|(tx, keep)| keep.then_some(tx))
        .collect()
}

/// Fill missing `Paid` and `Void`. Returns how many rows had a value filled.
pub fn fill_missing(transactions: &mut [Transaction]) -> usize {
    let mut filled = 0;
    for tx in transactions.iter_mut() {
        if !tx.has_missing_payment() {
            continue;
        }
        tx.amount_paid.get_or_insert(PAID_DEFAULT);
        tx.void_flag.get_or_insert(VOID_DEFAULT);
        filled += 1;
    }
    filled
}
