//! Command line entry point
//!
//! Exit status: 0 when every target completed (gaps included), 1 for fatal
//! setup, configuration, or authentication failures, 2 when at least one
//! target failed outright.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use enquiry_sync::application::{builtin_targets, SyncOrchestrator};
use enquiry_sync::cli::{Cli, Command, VariantArg};
use enquiry_sync::domain::{SyncReport, TargetOutcome};
use enquiry_sync::infrastructure::{
    init_logging_with_config, AppConfig, ConfigManager, DatasetStore,
};

const EXIT_OK: u8 = 0;
const EXIT_FATAL: u8 = 1;
const EXIT_TARGET_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let manager = match config_manager(&cli) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("enquiry-sync: {:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };
    let config = match manager.initialize_on_first_run() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("enquiry-sync: {:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let mut logging = config.logging.clone();
    match cli.verbose {
        0 => {}
        1 => logging.level = "debug".to_string(),
        _ => logging.level = "trace".to_string(),
    }
    if let Err(e) = init_logging_with_config(&logging) {
        eprintln!("enquiry-sync: {:#}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    match dispatch(cli.command, config, manager).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn config_manager(cli: &Cli) -> Result<ConfigManager> {
    match &cli.config {
        Some(path) => Ok(ConfigManager::with_path(path.clone())),
        None => ConfigManager::new(),
    }
}

async fn dispatch(command: Command, config: AppConfig, manager: ConfigManager) -> Result<ExitCode> {
    match command {
        Command::Run { report_json } => run_sync(config, report_json).await,
        Command::Init => init(config, manager).await,
        Command::Status => status(config).await,
        Command::Export {
            sheet,
            variant,
            output,
        } => export(config, &sheet, variant, output).await,
    }
}

async fn run_sync(config: AppConfig, report_json: Option<PathBuf>) -> Result<ExitCode> {
    let orchestrator = SyncOrchestrator::new(config);
    let report = orchestrator.run().await?;

    print_report(&report);
    if let Some(path) = report_json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Wrote run report to {}", path.display());
    }

    if report.has_failures() {
        Ok(ExitCode::from(EXIT_TARGET_FAILED))
    } else {
        Ok(ExitCode::from(EXIT_OK))
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "Run {} finished: {} records across {} targets",
        report.run_id,
        report.total_records(),
        report.targets.len()
    );
    for target in &report.targets {
        match &target.outcome {
            TargetOutcome::Completed => {
                println!("  {:<16} ok, {} records", target.target, target.records_written);
            }
            TargetOutcome::CompletedWithGaps => {
                let mut gaps = Vec::new();
                if !target.sections_missing.is_empty() {
                    gaps.push(format!("{} sections missing", target.sections_missing.len()));
                }
                if target.pages_failed > 0 {
                    gaps.push(format!("{} pages failed", target.pages_failed));
                }
                if target.periods_failed > 0 || target.periods_remaining > 0 {
                    gaps.push(format!(
                        "{} periods still outstanding",
                        target.periods_failed + target.periods_remaining
                    ));
                }
                println!(
                    "  {:<16} ok with gaps ({}), {} records",
                    target.target,
                    gaps.join(", "),
                    target.records_written
                );
            }
            TargetOutcome::Failed(reason) => {
                println!("  {:<16} FAILED: {}", target.target, reason);
            }
        }
    }
}

async fn init(config: AppConfig, manager: ConfigManager) -> Result<ExitCode> {
    let database_path = config.storage.resolved_database_path();
    let store = DatasetStore::connect(&database_path).await?;
    store.migrate().await?;

    println!("Config file: {}", manager.config_path().display());
    println!("Dataset:     {}", database_path.display());
    Ok(ExitCode::from(EXIT_OK))
}

async fn status(config: AppConfig) -> Result<ExitCode> {
    let database_path = config.storage.resolved_database_path();
    let store = DatasetStore::connect(&database_path).await?;
    store.migrate().await?;

    let stats = store.stats().await?;
    println!("Dataset {}", database_path.display());
    println!(
        "  {} sheets, {} rows, {} synced periods",
        stats.sheet_count, stats.row_count, stats.synced_period_count
    );

    for target in builtin_targets() {
        if !target.is_bucketed() {
            continue;
        }
        let periods = store.synced_period_count(target.name).await?;
        match store.latest_period_start(target.name).await? {
            Some(watermark) => println!(
                "  {}: {} periods synced, watermark {}",
                target.name, periods, watermark
            ),
            None => println!("  {}: nothing synced yet", target.name),
        }
    }
    Ok(ExitCode::from(EXIT_OK))
}

async fn export(
    config: AppConfig,
    sheet: &str,
    variant: VariantArg,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let database_path = config.storage.resolved_database_path();
    let store = DatasetStore::connect(&database_path).await?;
    store.migrate().await?;

    let (columns, rows) = store.read_sheet(variant.into(), sheet).await?;

    let out: Box<dyn std::io::Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&columns)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    if let Some(path) = output {
        info!("Exported {} rows to {}", rows.len(), path.display());
    }
    Ok(ExitCode::from(EXIT_OK))
}
