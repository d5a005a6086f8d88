use anyhow::Context;
use hedgerun::cli::{self, Invocation, RunMode};
use hedgerun::config::AppConfig;
use hedgerun::coordination::{listen_for_signals, shutdown};
use hedgerun::scheduler::{CycleOutcome, CycleScheduler, SchedulerSettings};
use std::process::ExitCode;
use tracing::{error, info, warn};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match cli::parse_or_usage() {
        Invocation::Run(cli) => cli,
        Invocation::Exit => return ExitCode::SUCCESS,
    };

    let config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging_simple();
            error!("Failed to load configuration from {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_logging(&config.logging);

    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(config, cli.mode()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig, mode: RunMode) -> anyhow::Result<()> {
    let (trigger, signal) = shutdown::channel();
    tokio::spawn(listen_for_signals(trigger));

    let mut scheduler = CycleScheduler::from_config(&config, signal)
        .context("failed to initialize strategy runner")?;

    match mode {
        RunMode::Once => {
            info!("Running single automation cycle");
            match scheduler.run_cycle().await {
                CycleOutcome::Completed(summary) if summary.interrupted => {
                    warn!("Cycle interrupted by shutdown: {} strategies executed successfully", summary);
                }
                CycleOutcome::Completed(summary) => {
                    info!("Cycle finished: {} strategies executed successfully", summary);
                }
                CycleOutcome::Skipped(e) => warn!("Cycle skipped: {}", e),
                CycleOutcome::Crashed(reason) => warn!("Cycle failed: {}", reason),
            }
        }
        RunMode::Continuous { interval_minutes } => {
            let minutes = interval_minutes.unwrap_or(config.scheduler.interval_minutes);
            scheduler
                .run_continuous(SchedulerSettings::interval_from_minutes(minutes))
                .await;
        }
    }

    info!("hedgerun exiting");
    Ok(())
}
