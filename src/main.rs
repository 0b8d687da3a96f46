use anyhow::{Context, Result};
use bkrun::config::{AppConfig, ConfigOverrides, LoggingOverrides, RuntimeOverrides};
use bkrun::core::transfer_engine::TransferEngineType;
use bkrun::core::{Orchestrator, RunReport, notifications};
use bkrun::{context::RunContext, logging};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "bkrun")]
#[command(about = "Archive files, dump databases and ship them to a backup host")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to /etc/bkrun/config.toml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backup pass
    Run(RunArgs),
    /// Validate the configuration and print the resolved job
    Check,
}

#[derive(Args)]
struct RunArgs {
    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long)]
    temp_dir: Option<PathBuf>,

    #[arg(long)]
    transfer_engine: Option<TransferEngineType>,

    /// Bound on each archive or dump invocation; 0 disables
    #[arg(long)]
    tool_timeout_secs: Option<u64>,

    #[arg(long)]
    verbose: bool,

    #[arg(long)]
    json_logs: bool,
}

impl RunArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            runtime: RuntimeOverrides {
                temp_dir: self.temp_dir.clone(),
                transfer_engine: self.transfer_engine,
                tool_timeout_secs: self.tool_timeout_secs,
            },
            logging: LoggingOverrides {
                json: self.json_logs.then_some(true),
                verbose: self.verbose.then_some(true),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => run_backup(cli.config.as_deref(), args).await,
        Commands::Check => run_check(cli.config.as_deref()).map(|_| ExitCode::SUCCESS),
    }
}

async fn run_backup(config_path: Option<&Path>, args: &RunArgs) -> Result<ExitCode> {
    let config = AppConfig::load(config_path, &args.overrides())?;
    logging::init((&config.logging).into());

    let job = config.build_job()?;
    let settings = config.runtime_settings()?;
    let ctx = RunContext::new(settings)
        .with_notifier(notifications::create_notifier(&config.notifications));

    let report = Orchestrator::new(ctx).run(&job).await;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_check(config_path: Option<&Path>) -> Result<()> {
    let config = AppConfig::load(config_path, &ConfigOverrides::default())?;
    let job = config.build_job()?;
    config.runtime_settings()?;

    println!(
        "{}",
        serde_json::to_string_pretty(&job).context("Failed to serialize job")?
    );
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}
