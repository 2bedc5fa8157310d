//! Document Risk Retraining Core - command-line entry point
//!
//! Thin harness around the library; every command prints its result as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use doc_risk_retrain::api::commands::{self, RealDataSource};
use doc_risk_retrain::constants::{APP_NAME, APP_VERSION};

#[derive(Parser, Debug)]
#[command(name = "doc-risk-retrain", version)]
struct Cli {
    /// Settings file (JSON). Falls back to RETRAIN_CONFIG, then defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage root override. Falls back to the settings file, then RETRAIN_STORAGE_ROOT.
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one retrain cycle
    Retrain {
        document_type: String,
        /// JSONL export of labeled documents
        #[arg(long)]
        real_data: Option<PathBuf>,
        /// Minimum label confidence for real rows
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Print the version history summary
    Summary { document_type: String },
    /// Re-activate an earlier version (default: the one before the active version)
    Rollback {
        document_type: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Prune old versions
    Cleanup {
        document_type: String,
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Verify the active version's artifacts
    Verify { document_type: String },
    /// List built-in document types and their feature layouts
    Types,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn run(cli: Cli) -> Result<bool, String> {
    if let Command::Types = cli.command {
        print_json(&commands::list_document_types())?;
        return Ok(true);
    }

    let settings = commands::load_settings(cli.config.as_deref(), cli.storage_root)?;
    log::info!("Storage root: {}", settings.storage_root.display());

    match cli.command {
        Command::Retrain {
            document_type,
            real_data,
            min_confidence,
        } => {
            let source = RealDataSource {
                path: real_data,
                min_confidence,
            };
            let outcome = commands::retrain(&settings, &document_type, &source)?;
            print_json(&outcome)?;
            Ok(outcome.success)
        }
        Command::Summary { document_type } => {
            print_json(&commands::get_performance_summary(&settings, &document_type)?)?;
            Ok(true)
        }
        Command::Rollback { document_type, version } => {
            print_json(&commands::rollback(&settings, &document_type, version.as_deref())?)?;
            Ok(true)
        }
        Command::Cleanup { document_type, keep } => {
            print_json(&commands::cleanup(&settings, &document_type, keep)?)?;
            Ok(true)
        }
        Command::Verify { document_type } => {
            let result = commands::verify_active(&settings, &document_type)?;
            print_json(&result)?;
            Ok(result.artifacts_ok)
        }
        Command::Types => Ok(true),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
