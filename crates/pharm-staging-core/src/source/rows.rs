//! Typed row decoding from Arrow batches.

use arrow::array::{ArrayRef, AsArray};
use arrow::datatypes::{ArrowPrimitiveType, DataType, Float32Type, Int32Type, Int64Type};
use arrow::record_batch::RecordBatch;

use super::columns::*;
use super::{Dataset, LoadError, LoadResult};
use crate::models::{Insurance, Medication, Patient, Transaction};

/// A model that can be decoded from a batch read with its dataset's schema.
pub trait FromBatch: Sized {
    const DATASET: Dataset;

    fn from_batch(batch: &RecordBatch) -> LoadResult<Vec<Self>>;
}

fn column<'a>(batch: &'a RecordBatch, name: &str, expected: DataType) -> LoadResult<&'a ArrayRef> {
    batch.column_by_name(name).ok_or(LoadError::Column {
        column: name.to_string(),
        expected,
    })
}

fn primitives<T: ArrowPrimitiveType>(
    batch: &RecordBatch,
    name: &str,
) -> LoadResult<std::vec::IntoIter<Option<T::Native>>> {
    let mismatch = || LoadError::Column {
        column: name.to_string(),
        expected: T::DATA_TYPE,
    };
    let array = column(batch, name, T::DATA_TYPE)?
        .as_primitive_opt::<T>()
        .ok_or_else(mismatch)?;
    Ok(array.iter().collect::<Vec<_>>().into_iter())
}

fn strings(batch: &RecordBatch, name: &str) -> LoadResult<std::vec::IntoIter<Option<String>>> {
    let array = column(batch, name, DataType::Utf8)?
        .as_string_opt::<i32>()
        .ok_or_else(|| LoadError::Column {
            column: name.to_string(),
            expected: DataType::Utf8,
        })?;
    Ok(array
        .iter()
        .map(|v| v.map(str::to_string))
        .collect::<Vec<_>>()
        .into_iter())
}

fn booleans(batch: &RecordBatch, name: &str) -> LoadResult<std::vec::IntoIter<Option<bool>>> {
    let array = column(batch, name, DataType::Boolean)?
        .as_boolean_opt()
        .ok_or_else(|| LoadError::Column {
            column: name.to_string(),
            expected: DataType::Boolean,
        })?;
    Ok(array.iter().collect::<Vec<_>>().into_iter())
}

impl FromBatch for Transaction {
    const DATASET: Dataset = Dataset::Transactions;

    fn from_batch(batch: &RecordBatch) -> LoadResult<Vec<Self>> {
        let mut ids = primitives::<Int64Type>(batch, TRANSACTION_ID)?;
        let mut dates = strings(batch, TRANSACTION_DATE)?;
        let mut patient_ids = strings(batch, PATIENT_ID)?;
        let mut patient_names = strings(batch, PATIENT_NAME)?;
        let mut codes = strings(batch, MOCK_NDC)?;
        let mut med_names = strings(batch, MEDICATION_NAME)?;
        let mut qtys = primitives::<Float32Type>(batch, QTY)?;
        let mut prices = primitives::<Float32Type>(batch, PRICE)?;
        let mut paid = primitives::<Float32Type>(batch, PAID)?;
        let mut insurance_ids = strings(batch, INSURANCE_ID)?;
        let mut voids = booleans(batch, VOID)?;

        Ok((0..batch.num_rows())
            .map(|_| Transaction {
                transaction_id: ids.next().flatten(),
                transaction_date: dates.next().flatten(),
                transaction_date_parsed: None,
                patient_id: patient_ids.next().flatten(),
                patient_name: patient_names.next().flatten(),
                product_code: codes.next().flatten(),
                medication_name: med_names.next().flatten(),
                quantity: qtys.next().flatten(),
                unit_price: prices.next().flatten(),
                amount_paid: paid.next().flatten(),
                insurance_id: insurance_ids.next().flatten(),
                void_flag: voids.next().flatten(),
            })
            .collect())
    }
}

impl FromBatch for Insurance {
    const DATASET: Dataset = Dataset::Insurance;

    fn from_batch(batch: &RecordBatch) -> LoadResult<Vec<Self>> {
        let mut ids = primitives::<Int64Type>(batch, ID)?;
        let mut names = strings(batch, NAME)?;
        let mut types = strings(batch, TYPE)?;
        let mut amounts = primitives::<Float32Type>(batch, AMOUNT)?;

        Ok((0..batch.num_rows())
            .map(|_| Insurance {
                id: ids.next().flatten(),
                name: names.next().flatten(),
                plan_type: types.next().flatten(),
                amount: amounts.next().flatten(),
            })
            .collect())
    }
}

impl FromBatch for Medication {
    const DATASET: Dataset = Dataset::Medications;

    fn from_batch(batch: &RecordBatch) -> LoadResult<Vec<Self>> {
        let mut ids = primitives::<Int64Type>(batch, ID)?;
        let mut names = strings(batch, NAME)?;
        let mut strengths = primitives::<Float32Type>(batch, STRENGTH)?;
        let mut codes = strings(batch, MOCK_NDC)?;
        let mut sizes = primitives::<Int32Type>(batch, PKG_SIZE)?;
        let mut unit_prices = primitives::<Float32Type>(batch, PRICE_PER_UNIT)?;

        Ok((0..batch.num_rows())
            .map(|_| Medication {
                id: ids.next().flatten(),
                name: names.next().flatten(),
                strength: strengths.next().flatten(),
                product_code: codes.next().flatten(),
                package_size: sizes.next().flatten(),
                price_per_unit: unit_prices.next().flatten(),
            })
            .collect())
    }
}

impl FromBatch for Patient {
    const DATASET: Dataset = Dataset::Patients;

    fn from_batch(batch: &RecordBatch) -> LoadResult<Vec<Self>> {
        let mut ids = primitives::<Int64Type>(batch, ID)?;
        let mut names = strings(batch, NAME)?;
        let mut birthdays = strings(batch, BIRTHDAY)?;
        let mut phones = strings(batch, PHONE)?;
        let mut insurance_ids = primitives::<Int64Type>(batch, INSURANCE_ID)?;

        Ok((0..batch.num_rows())
            .map(|_| Patient {
                id: ids.next().flatten(),
                name: names.next().flatten(),
                birthday: birthdays.next().flatten(),
                birthday_parsed: None,
                phone: phones.next().flatten(),
                insurance_id: insurance_ids.next().flatten(),
            })
            .collect())
    }
}
