//! Source registry: logical dataset → (schema, location).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use crate::config::SourceLocations;

/// Column names shared by source files and output datasets.
pub mod columns {
    pub const TRANSACTION_ID: &str = "Transaction_Id";
    pub const TRANSACTION_DATE: &str = "Transaction_Date";
    pub const TRANSACTION_DATE_PARSED: &str = "Transaction_Date_format";
    pub const PATIENT_ID: &str = "Patient_Id";
    pub const PATIENT_NAME: &str = "Patient_Name";
    pub const MOCK_NDC: &str = "Mock_NDC";
    pub const MEDICATION_NAME: &str = "Medication_Name";
    pub const QTY: &str = "Qty";
    pub const PRICE: &str = "Price";
    pub const PAID: &str = "Paid";
    pub const INSURANCE_ID: &str = "Insurance_Id";
    pub const VOID: &str = "Void";

    pub const ID: &str = "Id";
    pub const NAME: &str = "Name";
    pub const TYPE: &str = "Type";
    pub const AMOUNT: &str = "Amount";
    pub const STRENGTH: &str = "Strength";
    pub const PKG_SIZE: &str = "PkgSize";
    pub const PRICE_PER_UNIT: &str = "PricePerUnit";
    pub const BIRTHDAY: &str = "Birthday";
    pub const BIRTHDAY_PARSED: &str = "Birthday_format";
    pub const PHONE: &str = "Phone";
    pub const IS_CURRENT: &str = "IsCurrent";
}

use columns::*;

/// The four source datasets, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Transactions,
    Insurance,
    Medications,
    Patients,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [
        Dataset::Transactions,
        Dataset::Insurance,
        Dataset::Medications,
        Dataset::Patients,
    ];

    /// Short logical name.
    pub fn name(self) -> &'static str {
        match self {
            Dataset::Transactions => "tx",
            Dataset::Insurance => "ins",
            Dataset::Medications => "med",
            Dataset::Patients => "pt",
        }
    }

    /// Schema of the source file. Columns bind by position; all nullable.
    pub fn schema(self) -> SchemaRef {
        let fields = match self {
            Dataset::Transactions => vec![
                Field::new(TRANSACTION_ID, DataType::Int64, true),
                Field::new(TRANSACTION_DATE, DataType::Utf8, true),
                Field::new(PATIENT_ID, DataType::Utf8, true),
                Field::new(PATIENT_NAME, DataType::Utf8, true),
                Field::new(MOCK_NDC, DataType::Utf8, true),
                Field::new(MEDICATION_NAME, DataType::Utf8, true),
                Field::new(QTY, DataType::Float32, true),
                Field::new(PRICE, DataType::Float32, true),
                Field::new(PAID, DataType::Float32, true),
                Field::new(INSURANCE_ID, DataType::Utf8, true),
                Field::new(VOID, DataType::Boolean, true),
            ],
            Dataset::Insurance => vec![
                Field::new(ID, DataType::Int64, true),
                Field::new(NAME, DataType::Utf8, true),
                Field::new(TYPE, DataType::Utf8, true),
                Field::new(AMOUNT, DataType::Float32, true),
            ],
            Dataset::Medications => vec![
                Field::new(ID, DataType::Int64, true),
                Field::new(NAME, DataType::Utf8, true),
                Field::new(STRENGTH, DataType::Float32, true),
                Field::new(MOCK_NDC, DataType::Utf8, true),
                Field::new(PKG_SIZE, DataType::Int32, true),
                Field::new(PRICE_PER_UNIT, DataType::Float32, true),
            ],
            Dataset::Patients => vec![
                Field::new(ID, DataType::Int64, true),
                Field::new(NAME, DataType::Utf8, true),
                Field::new(BIRTHDAY, DataType::Utf8, true),
                Field::new(PHONE, DataType::Utf8, true),
                Field::new(INSURANCE_ID, DataType::Int64, true),
            ],
        };
        Arc::new(Schema::new(fields))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One registry entry.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub dataset: Dataset,
    pub schema: SchemaRef,
    pub location: PathBuf,
}

/// Mapping from dataset to schema and location, built from config.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
}

impl SourceRegistry {
    pub fn from_config(locations: &SourceLocations) -> Self {
        let location = |dataset: Dataset| -> &Path {
            match dataset {
                Dataset::Transactions => &locations.transactions,
                Dataset::Insurance => &locations.insurance,
                Dataset::Medications => &locations.medications,
                Dataset::Patients => &locations.patients,
            }
        };

        let entries = Dataset::ALL
            .into_iter()
            .map(|dataset| SourceEntry {
                dataset,
                schema: dataset.schema(),
                location: location(dataset).to_path_buf(),
            })
            .collect();

        Self { entries }
    }

    /// Entry for a dataset. Entries are stored in `Dataset::ALL` order.
    pub fn get(&self, dataset: Dataset) -> &SourceEntry {
        &self.entries[dataset as usize]
    }

    /// Entries in load order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locations() -> SourceLocations {
        SourceLocations {
            transactions: "tx.csv".into(),
            insurance: "ins.csv".into(),
            medications: "med.csv".into(),
            patients: "pt.csv".into(),
        }
    }

    #[test]
    fn test_registry_order_and_locations() {
        let registry = SourceRegistry::from_config(&locations());
        let names: Vec<_> = registry.iter().map(|e| e.dataset.name()).collect();
        assert_eq!(names, vec!["tx", "ins", "med", "pt"]);

        assert_eq!(
            registry.get(Dataset::Medications).location,
            PathBuf::from("med.csv")
        );
        assert_eq!(
            registry.get(Dataset::Patients).location,
            PathBuf::from("pt.csv")
        );
    }

    #[test]
    fn test_schemas() {
        let tx = Dataset::Transactions.schema();
        assert_eq!(tx.fields().len(), 11);
        assert_eq!(tx.field(0).name(), TRANSACTION_ID);
        assert_eq!(tx.field(0).data_type(), &DataType::Int64);
        assert_eq!(tx.field(10).data_type(), &DataType::Boolean);
        assert!(tx.fields().iter().all(|f| f.is_nullable()));

        let med = Dataset::Medications.schema();
        assert_eq!(med.field_with_name(PKG_SIZE).unwrap().data_type(), &DataType::Int32);

        let pt = Dataset::Patients.schema();
        assert_eq!(pt.field_with_name(INSURANCE_ID).unwrap().data_type(), &DataType::Int64);
    }
}
