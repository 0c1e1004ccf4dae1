//! CLI entry point for the daily AI/ML briefing pipeline.
mod clients;

use std::path::PathBuf;
use std::sync::Arc;

use briefing_core::config::{self, EnvSource, ProcessEnv};
use briefing_core::error::OrchestratorError;
use briefing_core::model::RunOutcome;
use chrono::NaiveDate;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "briefing")]
#[command(version)]
#[command(about = "AI/ML daily briefing pipeline orchestrator")]
struct Cli {
    /// Path to the provider configuration document.
    #[arg(short = 'c', long, global = true, default_value = "config/providers.toml")]
    config: PathBuf,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run one full pipeline pass and write the day's artifacts.
    Run(RunArgs),
    /// Load and validate configuration without running the pipeline.
    ValidateConfig,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Report date to run for (YYYY-MM-DD). Defaults to `BRIEFING_RUN_DATE`, then today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Directory under which `web/data/` is written.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Path to the curated ecosystem release file.
    #[arg(long, default_value = "config/ecosystem_releases.json")]
    ecosystem_file: PathBuf,

    /// External ecosystem registry endpoint. Fetch failures degrade to the
    /// curated-only timeline rather than aborting the run.
    #[arg(long, default_value = "https://registry.example/api/releases")]
    registry_url: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("briefing=debug,briefing_core=debug,info")
    } else {
        EnvFilter::new("briefing=info,briefing_core=info,warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let code = match cli.command {
        Commands::ValidateConfig => validate_config(&cli.config),
        Commands::Run(args) => run(&cli.config, args).await,
    };
    std::process::exit(code);
}

fn validate_config(config_path: &std::path::Path) -> i32 {
    let env = ProcessEnv;
    match config::load_and_validate(config_path, &env) {
        Ok(_) => {
            tracing::info!(path = %config_path.display(), "configuration is valid");
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "configuration invalid");
            2
        }
    }
}

async fn run(config_path: &std::path::Path, args: RunArgs) -> i32 {
    let env = ProcessEnv;
    let config = match config::load_and_validate(config_path, &env) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return 2;
        }
    };

    let orchestrator = match clients::build_orchestrator(&config, &env, &args) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "failed to construct LLM client");
            return 2;
        }
    };

    let report_date = args
        .date
        .or_else(|| std::env::var("BRIEFING_RUN_DATE").ok().and_then(|s| s.parse().ok()))
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    match orchestrator.run(report_date).await {
        Ok(run_report) => match run_report.outcome {
            RunOutcome::Failed => {
                tracing::error!("run completed with overall outcome failed");
                1
            }
            RunOutcome::Partial | RunOutcome::Success => 0,
        },
        Err(OrchestratorError::Config(e)) => {
            tracing::error!(error = %e, "configuration error during run");
            2
        }
        Err(OrchestratorError::LlmUnavailable(e)) => {
            tracing::error!(error = %e, "LLM client unavailable during run");
            2
        }
        Err(OrchestratorError::Write(e)) => {
            tracing::error!(error = %e, "failed to write output artifacts");
            3
        }
    }
}
