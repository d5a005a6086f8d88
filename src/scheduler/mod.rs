//! Cycle scheduler
//!
//! One cycle: ensure a venue session, fetch the catalog, then validate and
//! execute each strategy strictly in catalog order. Cycles never overlap and
//! strategies never run in parallel, so the session needs no locking.
//!
//! Failures are contained by scope:
//! - authentication failure skips the cycle
//! - catalog failure runs the cycle with zero strategies
//! - a bad record or failed job affects only that strategy
//! - a panic inside a cycle fails that cycle; in continuous mode a failed
//!   cycle or loop is retried after the crash backoff instead of the interval

pub mod summary;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::catalog::{HttpCatalogClient, StrategyCatalog};
use crate::config::{AppConfig, SchedulerConfig};
use crate::coordination::ShutdownSignal;
use crate::error::{AuthError, Result};
use crate::executor::{JobExecutor, ProcessLauncher};
use crate::session::{AngelOneClient, SessionManager};
use crate::strategy::StrategyValidator;
pub use summary::{CycleSummary, SkippedStrategy};

/// Where the scheduler is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Authenticating,
    Fetching,
    /// Index into this cycle's catalog
    Executing(usize),
    Summarizing,
}

impl CyclePhase {
    pub fn can_transition_to(&self, target: CyclePhase) -> bool {
        use CyclePhase::*;

        matches!(
            (self, target),
            (Idle, Authenticating)
                | (Authenticating, Fetching)
                | (Authenticating, Idle)
                | (Fetching, Executing(_))
                | (Fetching, Summarizing)
                | (Executing(_), Executing(_))
                | (Executing(_), Summarizing)
                | (Summarizing, Idle)
        )
    }
}

/// What a single cycle amounted to
#[derive(Debug)]
pub enum CycleOutcome {
    /// Ran through to a summary (possibly with zero strategies)
    Completed(CycleSummary),
    /// Authentication failed; nothing was fetched or run
    Skipped(AuthError),
    /// Panicked; contained at the cycle boundary
    Crashed(String),
}

impl CycleOutcome {
    pub fn summary(&self) -> Option<&CycleSummary> {
        match self {
            CycleOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Timing knobs for the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub strategy_pause: Duration,
    pub crash_backoff: Duration,
}

impl SchedulerSettings {
    /// Saturates instead of overflowing on absurd intervals
    pub fn interval_from_minutes(minutes: u64) -> Duration {
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            interval: Self::interval_from_minutes(config.interval_minutes),
            strategy_pause: Duration::from_secs(config.strategy_pause_secs),
            crash_backoff: Duration::from_secs(config.crash_backoff_secs),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

/// Drives cycles, once or on a fixed interval
pub struct CycleScheduler {
    session: SessionManager,
    catalog: Box<dyn StrategyCatalog>,
    validator: StrategyValidator,
    executor: JobExecutor,
    settings: SchedulerSettings,
    shutdown: ShutdownSignal,
    phase: CyclePhase,
    cycles_run: u64,
}

impl CycleScheduler {
    pub fn new(
        session: SessionManager,
        catalog: Box<dyn StrategyCatalog>,
        executor: JobExecutor,
        settings: SchedulerSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            session,
            catalog,
            validator: StrategyValidator::new(),
            executor,
            settings,
            shutdown,
            phase: CyclePhase::Idle,
            cycles_run: 0,
        }
    }

    /// Wire the production collaborators from configuration
    pub fn from_config(config: &AppConfig, shutdown: ShutdownSignal) -> Result<Self> {
        let venue = AngelOneClient::new(&config.venue)?;
        let session = SessionManager::new(Box::new(venue), &config.venue)?;
        let catalog = HttpCatalogClient::new(&config.control_plane, config.retry.clone())?;
        let launcher = ProcessLauncher::new(
            config.executor.interpreter.clone(),
            Duration::from_secs(config.executor.output_drain_secs),
        );
        let executor = JobExecutor::new(Box::new(launcher), config.executor.timeout());

        Ok(Self::new(
            session,
            Box::new(catalog),
            executor,
            SchedulerSettings::from(&config.scheduler),
            shutdown,
        ))
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    fn set_phase(&mut self, next: CyclePhase) {
        if !self.phase.can_transition_to(next) {
            warn!("Unexpected cycle phase transition {:?} -> {:?}", self.phase, next);
        }
        debug!("Cycle phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Run one cycle. Never panics and never returns an error: every failure
    /// is folded into the outcome.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles_run += 1;
        let cycle = self.cycles_run;

        match AssertUnwindSafe(self.cycle(cycle)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(cycle, "Error in automation cycle: {}", reason);
                self.phase = CyclePhase::Idle;
                CycleOutcome::Crashed(reason)
            }
        }
    }

    async fn cycle(&mut self, cycle: u64) -> CycleOutcome {
        let started = Instant::now();
        info!(cycle, "Starting automation cycle");

        self.set_phase(CyclePhase::Authenticating);
        let session = match self.session.ensure_session().await {
            Ok(session) => session,
            Err(e) => {
                error!(cycle, error = %e, "Failed to connect to venue. Skipping cycle.");
                self.set_phase(CyclePhase::Idle);
                return CycleOutcome::Skipped(e);
            }
        };

        self.set_phase(CyclePhase::Fetching);
        let records = match self.catalog.fetch_active_strategies(&session).await {
            Ok(records) => records,
            Err(e) => {
                error!(cycle, error = %e, "Failed to fetch strategies");
                Vec::new()
            }
        };

        let mut summary = CycleSummary::new(records.len());
        if records.is_empty() {
            info!(cycle, "No active strategies found");
        }

        for (index, record) in records.iter().enumerate() {
            if self.shutdown.is_requested() {
                warn!(cycle, remaining = records.len() - index, "Shutdown requested, not launching further strategies");
                summary.interrupted = true;
                break;
            }

            self.set_phase(CyclePhase::Executing(index));

            let strategy = match self.validator.validate(record) {
                Ok(strategy) => strategy,
                Err(e) => {
                    error!(cycle, strategy = %record.label(), error = %e, "Strategy failed validation, skipping");
                    summary.record_skipped(record.label(), e);
                    continue;
                }
            };

            if summary.attempted > 0 && !self.shutdown.sleep(self.settings.strategy_pause).await {
                warn!(cycle, "Shutdown requested during strategy pause");
                summary.interrupted = true;
                break;
            }

            let result = self.executor.execute(&strategy, &session).await;
            summary.record(result);
        }

        self.set_phase(CyclePhase::Summarizing);
        summary.duration = started.elapsed();
        info!(
            cycle,
            attempted = summary.attempted,
            skipped = summary.skipped_invalid,
            duration_ms = summary.duration.as_millis() as u64,
            "Automation cycle completed. {} strategies executed successfully",
            summary
        );
        self.set_phase(CyclePhase::Idle);

        CycleOutcome::Completed(summary)
    }

    /// Run cycles every `interval` until shutdown is requested.
    pub async fn run_continuous(&mut self, interval: Duration) {
        info!(
            "Starting continuous automation (interval: {} minutes)",
            interval.as_secs_f64() / 60.0
        );

        loop {
            if self.shutdown.is_requested() {
                break;
            }

            let failure = match AssertUnwindSafe(self.step(interval)).catch_unwind().await {
                Ok(LoopStep::Waited) => continue,
                Ok(LoopStep::Stopped) => break,
                Ok(LoopStep::Crashed(reason)) => reason,
                Err(panic) => panic_message(panic.as_ref()),
            };

            error!(
                backoff_secs = self.settings.crash_backoff.as_secs_f64(),
                "Unexpected error in continuous loop: {}. Backing off before the next cycle",
                failure
            );
            self.phase = CyclePhase::Idle;
            if !self.shutdown.sleep(self.settings.crash_backoff).await {
                break;
            }
        }

        info!(cycles = self.cycles_run, "Automation stopped");
    }

    /// One cycle plus the wait for the next. A crashed cycle skips the wait.
    async fn step(&mut self, interval: Duration) -> LoopStep {
        if let CycleOutcome::Crashed(reason) = self.run_cycle().await {
            return LoopStep::Crashed(reason);
        }
        info!(
            "Waiting {} minutes for next cycle...",
            interval.as_secs_f64() / 60.0
        );
        if self.shutdown.sleep(interval).await {
            LoopStep::Waited
        } else {
            LoopStep::Stopped
        }
    }
}

enum LoopStep {
    /// Interval elapsed; run the next cycle
    Waited,
    /// Shutdown interrupted the wait
    Stopped,
    Crashed(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
