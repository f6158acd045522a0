use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use pharm_staging_core::db::HistoryEntry;
use pharm_staging_core::{Database, MergeRun, Pipeline, PipelineConfig, RunSummary, WriteMode};

mod logging;

#[derive(Parser)]
#[command(name = "pharm-staging")]
#[command(about = "Stage pharmacy source files as Parquet with SCD2 patient history")]
#[command(version)]
struct Cli {
    /// Job configuration file
    #[arg(long, global = true, env = "PHARM_STAGING_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, clean, merge and write all outputs
    Run {
        /// Replace existing output directories
        #[arg(long)]
        overwrite: bool,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the staging history of one patient
    History {
        #[arg(long)]
        patient_id: i64,
        #[arg(long)]
        json: bool,
    },
    /// List recorded merges
    Runs {
        #[arg(long)]
        json: bool,
    },
    /// Create the staging database and exit
    Init,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let path = path.context("no configuration given; pass --config or set PHARM_STAGING_CONFIG")?;
    PipelineConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn open_db(config: &PipelineConfig) -> Result<Database> {
    Database::open(&config.staging_db).with_context(|| {
        format!(
            "failed to open staging database at {}",
            config.staging_db.display()
        )
    })
}

fn print_summary(summary: &RunSummary) {
    println!("Run {}", summary.run_id);
    println!(
        "   Loaded: tx={} ins={} med={} pt={}",
        summary.loaded.transactions,
        summary.loaded.insurance,
        summary.loaded.medications,
        summary.loaded.patients
    );
    println!(
        "   Cleaning: {} duplicates removed, {} rows null-filled, {} unparseable dates, {} unparseable birthdays",
        summary.cleaning.duplicates_removed,
        summary.cleaning.payments_filled,
        summary.cleaning.unparseable_transaction_dates,
        summary.cleaning.unparseable_birthdays
    );
    println!("   Total paid: {:.2}", summary.total_paid);
    println!(
        "   Merge {}: {} invalidated, {} inserted, {} skipped unchanged",
        summary.merge.batch_id,
        summary.merge.invalidated,
        summary.merge.inserted,
        summary.merge.skipped_unchanged
    );
    for table in &summary.outputs {
        println!("   Wrote {} rows to {}", table.rows, table.path.display());
    }
}

fn print_history(patient_id: i64, history: &[HistoryEntry]) {
    if history.is_empty() {
        println!("No staging rows for patient {}", patient_id);
        return;
    }
    for entry in history {
        let patient = &entry.record.patient;
        println!(
            "{:>6}  {}  insurance={}  current={}  batch={}",
            entry.row_id,
            entry.merged_at,
            patient
                .insurance_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "null".into()),
            entry.record.is_current_flag(),
            entry.batch_id
        );
    }
}

fn print_runs(runs: &[MergeRun]) {
    for run in runs {
        println!(
            "{}  {}  {}  rows={} invalidated={} inserted={} skipped={}",
            run.merged_at,
            run.batch_id,
            run.insert_policy,
            run.batch_rows,
            run.invalidated,
            run.inserted,
            run.skipped_unchanged
        );
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.log_json);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { overwrite, json } => {
            if overwrite {
                config.outputs.write_mode = WriteMode::Overwrite;
            }
            let mut db = open_db(&config)?;
            let summary = Pipeline::new(config)
                .run(&mut db)
                .context("pipeline run failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::History { patient_id, json } => {
            let db = open_db(&config)?;
            let history = db.patient_history(patient_id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                print_history(patient_id, &history);
            }
        }
        Commands::Runs { json } => {
            let db = open_db(&config)?;
            let runs = db.list_merge_runs()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else {
                print_runs(&runs);
            }
        }
        Commands::Init => {
            open_db(&config)?;
            info!(path = %config.staging_db.display(), "Staging database ready");
        }
    }

    Ok(())
}
