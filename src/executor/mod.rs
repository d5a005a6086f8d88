//! Strategy job execution
//!
//! A job receives its inputs only through environment variables and reports
//! only through its exit code and output text. Nothing a job does can fail
//! the caller: every outcome is an [`ExecutionResult`].

pub mod launcher;

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::session::SessionHandle;
use crate::strategy::{StrategyId, ValidatedStrategy};
pub use launcher::{JobLauncher, JobSpec, JobTermination, LaunchOutcome, ProcessLauncher};

pub const ENV_STRATEGY_ID: &str = "STRATEGY_ID";
pub const ENV_STRATEGY_NAME: &str = "STRATEGY_NAME";
pub const ENV_STRATEGY_PARAMETERS: &str = "STRATEGY_PARAMETERS";
pub const ENV_SESSION_TOKEN: &str = "ANGEL_SESSION_TOKEN";
pub const ENV_API_KEY: &str = "ANGEL_API_KEY";
pub const ENV_CLIENT_ID: &str = "ANGEL_CLIENT_ID";

/// Classified outcome of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Succeeded,
    Failed { exit_code: i32 },
    Signaled { signal: Option<i32> },
    TimedOut { limit: Duration },
    SpawnFailed { reason: String },
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Succeeded => write!(f, "succeeded"),
            ExecutionStatus::Failed { exit_code } => write!(f, "failed with exit code {}", exit_code),
            ExecutionStatus::Signaled { signal: Some(sig) } => write!(f, "killed by signal {}", sig),
            ExecutionStatus::Signaled { signal: None } => write!(f, "killed by signal"),
            ExecutionStatus::TimedOut { limit } => write!(f, "timed out after {}s", limit.as_secs()),
            ExecutionStatus::SpawnFailed { reason } => write!(f, "could not be started: {}", reason),
        }
    }
}

/// Result of one strategy invocation; lives for one cycle
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub strategy_id: StrategyId,
    pub strategy_name: String,
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }

    /// Present only when the job exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            ExecutionStatus::Succeeded => Some(0),
            ExecutionStatus::Failed { exit_code } => Some(exit_code),
            _ => None,
        }
    }
}

/// Environment injected into every job, on top of the orchestrator's own.
pub fn job_environment(strategy: &ValidatedStrategy, session: &SessionHandle) -> Vec<(String, String)> {
    vec![
        (ENV_STRATEGY_ID.to_string(), strategy.id.to_string()),
        (ENV_STRATEGY_NAME.to_string(), strategy.name.clone()),
        (ENV_STRATEGY_PARAMETERS.to_string(), strategy.parameters_json()),
        (ENV_SESSION_TOKEN.to_string(), session.token.clone()),
        (ENV_API_KEY.to_string(), session.api_key.clone()),
        (ENV_CLIENT_ID.to_string(), session.client_id.clone()),
    ]
}

/// Runs validated strategies through a [`JobLauncher`] under a time limit
pub struct JobExecutor {
    launcher: Box<dyn JobLauncher>,
    timeout: Duration,
}

impl JobExecutor {
    pub fn new(launcher: Box<dyn JobLauncher>, timeout: Duration) -> Self {
        Self { launcher, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, strategy: &ValidatedStrategy, session: &SessionHandle) -> ExecutionResult {
        info!(
            strategy_id = %strategy.id,
            strategy_name = %strategy.name,
            entry_point = %strategy.executable_path.display(),
            "Executing strategy"
        );

        let started = Instant::now();
        let outcome = self
            .launcher
            .launch(JobSpec {
                entry_point: strategy.executable_path.clone(),
                env: job_environment(strategy, session),
                timeout: self.timeout,
            })
            .await;
        let duration = started.elapsed();

        let status = match outcome.termination {
            JobTermination::Exited(0) => ExecutionStatus::Succeeded,
            JobTermination::Exited(exit_code) => ExecutionStatus::Failed { exit_code },
            JobTermination::Signaled(signal) => ExecutionStatus::Signaled { signal },
            JobTermination::TimedOut => ExecutionStatus::TimedOut { limit: self.timeout },
            JobTermination::SpawnFailed(reason) => ExecutionStatus::SpawnFailed { reason },
        };

        let result = ExecutionResult {
            strategy_id: strategy.id.clone(),
            strategy_name: strategy.name.clone(),
            status,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            duration,
        };
        log_result(&result);
        result
    }
}

fn log_result(result: &ExecutionResult) {
    let duration_ms = result.duration.as_millis() as u64;
    let stdout = result.stdout.trim();
    let stderr = result.stderr.trim();

    if result.succeeded() {
        info!(
            strategy_id = %result.strategy_id,
            duration_ms,
            "Strategy {} executed successfully", result.strategy_name
        );
        if !stdout.is_empty() {
            info!(strategy_id = %result.strategy_id, "Strategy output: {}", stdout);
        }
        if !stderr.is_empty() {
            warn!(strategy_id = %result.strategy_id, "Strategy stderr: {}", stderr);
        }
        return;
    }

    error!(
        strategy_id = %result.strategy_id,
        exit_code = ?result.exit_code(),
        duration_ms,
        "Strategy {} {}", result.strategy_name, result.status
    );
    if !stderr.is_empty() {
        error!(strategy_id = %result.strategy_id, "Strategy error: {}", stderr);
    }
    if !stdout.is_empty() {
        info!(strategy_id = %result.strategy_id, "Strategy output: {}", stdout);
    }
}
