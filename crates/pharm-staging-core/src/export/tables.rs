//! Arrow encoding of cleaned tables for export.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float32Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};

use super::ExportResult;
use crate::models::{Insurance, Medication, StagedPatient, Transaction};
use crate::source::columns::*;
use crate::source::Dataset;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Arrow `Date32` value (days since the Unix epoch).
pub fn date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// A model that can be encoded as an output batch.
pub trait ToBatch: Sized {
    /// Schema of the written dataset: source columns, then derived ones.
    fn output_schema() -> SchemaRef;

    fn to_batch(rows: &[Self]) -> ExportResult<RecordBatch>;
}

fn with_derived(dataset: Dataset, derived: Vec<Field>) -> SchemaRef {
    let mut fields: Vec<Field> = dataset
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.extend(derived);
    Arc::new(Schema::new(fields))
}

impl ToBatch for Transaction {
    fn output_schema() -> SchemaRef {
        with_derived(
            Dataset::Transactions,
            vec![Field::new(TRANSACTION_DATE_PARSED, DataType::Date32, true)],
        )
    }

    fn to_batch(rows: &[Self]) -> ExportResult<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.transaction_id))),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.transaction_date.as_deref()),
            )),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.patient_id.as_deref()))),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.patient_name.as_deref()),
            )),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.product_code.as_deref()),
            )),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.medication_name.as_deref()),
            )),
            Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.quantity))),
            Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.unit_price))),
            Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.amount_paid))),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.insurance_id.as_deref()),
            )),
            Arc::new(BooleanArray::from_iter(rows.iter().map(|r| r.void_flag))),
            Arc::new(Date32Array::from_iter(
                rows.iter().map(|r| r.transaction_date_parsed.map(date32)),
            )),
        ];
        Ok(RecordBatch::try_new(Self::output_schema(), columns)?)
    }
}

impl ToBatch for Insurance {
    fn output_schema() -> SchemaRef {
        Dataset::Insurance.schema()
    }

    fn to_batch(rows: &[Self]) -> ExportResult<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.id))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.name.as_deref()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.plan_type.as_deref()))),
            Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.amount))),
        ];
        Ok(RecordBatch::try_new(Self::output_schema(), columns)?)
    }
}

impl ToBatch for Medication {
    fn output_schema() -> SchemaRef {
        Dataset::Medications.schema()
    }

    fn to_batch(rows: &[Self]) -> ExportResult<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.id))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.name.as_deref()))),
            Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.strength))),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.product_code.as_deref()),
            )),
            Arc::new(Int32Array::from_iter(rows.iter().map(|r| r.package_size))),
            Arc::new(Float32Array::from_iter(rows.iter().map(|r| r.price_per_unit))),
        ];
        Ok(RecordBatch::try_new(Self::output_schema(), columns)?)
    }
}

impl ToBatch for StagedPatient {
    fn output_schema() -> SchemaRef {
        with_derived(
            Dataset::Patients,
            vec![
                Field::new(BIRTHDAY_PARSED, DataType::Date32, true),
                Field::new(IS_CURRENT, DataType::Int32, false),
            ],
        )
    }

    fn to_batch(rows: &[Self]) -> ExportResult<RecordBatch> {
        let patients = || rows.iter().map(|r| &r.patient);
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter(patients().map(|p| p.id))),
            Arc::new(StringArray::from_iter(patients().map(|p| p.name.as_deref()))),
            Arc::new(StringArray::from_iter(patients().map(|p| p.birthday.as_deref()))),
            Arc::new(StringArray::from_iter(patients().map(|p| p.phone.as_deref()))),
            Arc::new(Int64Array::from_iter(patients().map(|p| p.insurance_id))),
            Arc::new(Date32Array::from_iter(
                patients().map(|p| p.birthday_parsed.map(date32)),
            )),
            Arc::new(Int32Array::from_iter_values(
                rows.iter().map(StagedPatient::is_current_flag),
            )),
        ];
        Ok(RecordBatch::try_new(Self::output_schema(), columns)?)
    }
}
