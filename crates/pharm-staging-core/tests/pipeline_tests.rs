//! End-to-end pipeline tests over temporary source files.

use std::fs::{self, File};
use std::path::Path;

use arrow::array::{Array, AsArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{Date32Type, Float32Type, Int32Type, Int64Type};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::TempDir;

use pharm_staging_core::clean::clean_tables;
use pharm_staging_core::export::{date32, ExportError, PART_FILE, SUCCESS_MARKER};
use pharm_staging_core::source::{load_all, SourceRegistry};
use pharm_staging_core::{
    Database, DateFormat, Pipeline, PipelineConfig, PipelineError, PublishMode,
};

const TX_HEADER: &str =
    "Transaction_Id,Transaction_Date,Patient_Id,Patient_Name,Mock_NDC,Medication_Name,Qty,Price,Paid,Insurance_Id,Void";

const CONFIG: &str = r#"
[sources]
transactions = "data/tx.csv"
insurance = "data/ins.csv"
medications = "data/med.csv"
patients = "data/pt.csv"

[outputs]
transactions = "out/transactions"
insurance = "out/insurance"
medications = "out/medications"
patients = "out/patients"
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(fixture.path("data")).unwrap();

        fixture.write(
            "data/tx.csv",
            &format!(
                "{}\n\
                 1,3/4/2022,P1,Ada Lovelace,0001-01,Aspirin,1,2.5,2.5,10,false\n\
                 1,3/4/2022,P1,Ada Lovelace,0001-01,Aspirin,1,2.5,2.5,10,false\n\
                 2,3/5/2022,P2,Alan Turing,0002-01,Ibuprofen,2,4.0,,20,\n",
                TX_HEADER
            ),
        );
        fixture.write(
            "data/ins.csv",
            "Id,Name,Type,Amount\n10,Acme Health,PPO,20\n20,Globex,HMO,15\n",
        );
        fixture.write(
            "data/med.csv",
            "Id,Name,Strength,Mock_NDC,PkgSize,PricePerUnit\n1,Aspirin,81,0001-01,30,0.1\n",
        );
        fixture.write_patients(&[(1, 10), (2, 20)]);
        fixture
    }

    fn path(&self, relative: &str) -> std::path::PathBuf {
        self.dir.path().join(relative)
    }

    fn write(&self, relative: &str, content: &str) {
        fs::write(self.path(relative), content).unwrap();
    }

    fn write_patients(&self, rows: &[(i64, i64)]) {
        let mut content = String::from("Id,Name,Birthday,Phone,Insurance_Id\n");
        for (id, insurance) in rows {
            content.push_str(&format!("{},Patient {},1/2/1990,555-010{},{}\n", id, id, id, insurance));
        }
        self.write("data/pt.csv", &content);
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::from_toml_str(CONFIG, self.dir.path()).unwrap()
    }
}

fn read_output(dir: &Path) -> RecordBatch {
    let file = File::open(dir.join(PART_FILE)).unwrap();
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
    let schema = builder.schema().clone();
    let batches: Vec<_> = builder.build().unwrap().map(|b| b.unwrap()).collect();
    concat_batches(&schema, &batches).unwrap()
}

#[test]
fn test_end_to_end_transactions() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let mut db = Database::open(&config.staging_db).unwrap();

    Pipeline::new(config.clone()).run(&mut db).unwrap();

    let out = &config.outputs.transactions;
    assert!(out.join(SUCCESS_MARKER).exists());

    let batch = read_output(out);
    assert_eq!(batch.num_rows(), 2);

    let schema = batch.schema();
    assert_eq!(schema.field(8).name(), "Paid");
    assert_eq!(schema.field(11).name(), "Transaction_Date_format");

    let paid = batch.column(8).as_primitive::<Float32Type>();
    let paid: Vec<f32> = paid.iter().map(|v| v.unwrap()).collect();
    assert_eq!(paid, vec![2.5, 0.0]);

    let void = batch.column(10).as_boolean();
    assert!(!void.is_null(1));
    assert!(!void.value(1));

    let dates = batch.column(11).as_primitive::<Date32Type>();
    let expected = date32(NaiveDate::from_ymd_opt(2022, 3, 4).unwrap());
    assert_eq!(dates.value(0), expected);
}

#[test]
fn test_end_to_end_patients_published_with_flag() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let mut db = Database::open(&config.staging_db).unwrap();

    Pipeline::new(config.clone()).run(&mut db).unwrap();

    let batch = read_output(&config.outputs.patients);
    assert_eq!(batch.num_rows(), 2);

    let schema = batch.schema();
    assert_eq!(schema.field(6).name(), "IsCurrent");

    let ids = batch.column(0).as_primitive::<Int64Type>();
    assert_eq!(ids.values().to_vec(), vec![1, 2]);

    let flags = batch.column(6).as_primitive::<Int32Type>();
    assert_eq!(flags.values().to_vec(), vec![1, 1]);
}

#[test]
fn test_load_and_clean_idempotent() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let registry = SourceRegistry::from_config(&config.sources);
    let format = DateFormat::default();

    let (first, first_stats) = clean_tables(load_all(&registry).unwrap(), &format);
    let (second, second_stats) = clean_tables(load_all(&registry).unwrap(), &format);

    assert_eq!(first.transactions, second.transactions);
    assert_eq!(first_stats, second_stats);
    assert_eq!(first.transactions.len(), 2);
}

#[test]
fn test_second_run_requires_overwrite() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    let mut db = Database::open(&config.staging_db).unwrap();

    Pipeline::new(config.clone()).run(&mut db).unwrap();
    let staged_before = db.read_staging(PublishMode::FullHistory).unwrap().len();
    let runs_before = db.list_merge_runs().unwrap().len();

    let err = Pipeline::new(config.clone()).run(&mut db).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Export(ExportError::AlreadyExists(_))
    ));

    // The refused run must not have merged anything
    assert_eq!(
        db.read_staging(PublishMode::FullHistory).unwrap().len(),
        staged_before
    );
    assert_eq!(db.list_merge_runs().unwrap().len(), runs_before);

    config.outputs.write_mode = pharm_staging_core::WriteMode::Overwrite;
    Pipeline::new(config).run(&mut db).unwrap();
}

#[test]
fn test_second_run_extends_history() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.outputs.write_mode = pharm_staging_core::WriteMode::Overwrite;
    let mut db = Database::open(&config.staging_db).unwrap();

    Pipeline::new(config.clone()).run(&mut db).unwrap();

    // Patient 2 switches insurance; patient 1 is re-sent unchanged
    fixture.write_patients(&[(1, 10), (2, 30)]);
    let summary = Pipeline::new(config.clone()).run(&mut db).unwrap();

    assert_eq!(summary.merge.invalidated, 1);
    assert_eq!(summary.merge.inserted, 2);
    assert_eq!(summary.written.patients, 4);

    let current = db.read_staging(PublishMode::CurrentOnly).unwrap();
    assert_eq!(current.len(), 3);

    let history = db.patient_history(2).unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].record.is_current);
    assert_eq!(history[1].record.patient.insurance_id, Some(30));

    let batch = read_output(&config.outputs.patients);
    assert_eq!(batch.num_rows(), 4);
}

#[test]
fn test_bad_transaction_id_fails_run() {
    let fixture = Fixture::new();
    fixture.write(
        "data/tx.csv",
        &format!("{}\nabc,3/4/2022,P1,Ada,N,Aspirin,1,1,1,10,false\n", TX_HEADER),
    );
    let config = fixture.config();
    let mut db = Database::open(&config.staging_db).unwrap();

    let err = Pipeline::new(config.clone()).run(&mut db).unwrap_err();
    assert!(matches!(err, PipelineError::Load(_)));
    assert!(!config.outputs.transactions.exists());
}
