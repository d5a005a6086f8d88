//! How a strategy job is started and observed.
//!
//! The executor only describes the job (entry point, environment, time limit);
//! a [`JobLauncher`] decides how it runs. [`ProcessLauncher`] runs it as a
//! local child process.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Everything a launcher needs to run one strategy job
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub entry_point: PathBuf,
    /// Added on top of the orchestrator's own environment
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTermination {
    Exited(i32),
    /// Killed by a signal the launcher did not send
    Signaled(Option<i32>),
    TimedOut,
    SpawnFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub termination: JobTermination,
    pub stdout: String,
    pub stderr: String,
}

impl LaunchOutcome {
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self {
            termination: JobTermination::SpawnFailed(reason.into()),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Runs a job to completion or until its time limit. Never fails: every
/// problem is described by the returned [`LaunchOutcome`].
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(&self, job: JobSpec) -> LaunchOutcome;
}

/// Launches jobs as local child processes with piped output
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    interpreter: Option<OsString>,
    output_drain: Duration,
}

impl ProcessLauncher {
    pub fn new(interpreter: Option<String>, output_drain: Duration) -> Self {
        Self {
            interpreter: interpreter
                .filter(|i| !i.trim().is_empty())
                .map(OsString::from),
            output_drain,
        }
    }

    fn command(&self, job: &JobSpec) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&job.entry_point);
                cmd
            }
            None => Command::new(&job.entry_point),
        };

        cmd.envs(job.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down anything the job forked.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }

    async fn collect(&self, mut task: JoinHandle<String>) -> String {
        match timeout(self.output_drain, &mut task).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Output reader failed: {}", e);
                String::new()
            }
            Err(_) => {
                warn!("Job output still open after exit, discarding");
                task.abort();
                String::new()
            }
        }
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(None, Duration::from_secs(5))
    }
}

#[async_trait]
impl JobLauncher for ProcessLauncher {
    async fn launch(&self, job: JobSpec) -> LaunchOutcome {
        let mut child = match self.command(&job).spawn() {
            Ok(child) => child,
            Err(e) => {
                return LaunchOutcome::spawn_failed(format!(
                    "failed to start {}: {}",
                    job.entry_point.display(),
                    e
                ))
            }
        };
        debug!(pid = ?child.id(), entry_point = %job.entry_point.display(), "Job started");

        let stdout = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let termination = match timeout(job.timeout, child.wait()).await {
            Ok(Ok(status)) => classify(status),
            Ok(Err(e)) => JobTermination::SpawnFailed(format!("lost track of job: {}", e)),
            Err(_) => {
                kill_job_group(child.id());
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out job: {}", e);
                }
                JobTermination::TimedOut
            }
        };

        LaunchOutcome {
            termination,
            stdout: self.collect(stdout).await,
            stderr: self.collect(stderr).await,
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("Job pipe closed with error: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn classify(status: ExitStatus) -> JobTermination {
    match status.code() {
        Some(code) => JobTermination::Exited(code),
        None => JobTermination::Signaled(signal_of(&status)),
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

#[cfg(unix)]
fn kill_job_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("killpg({}) failed: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn kill_job_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_entry_point_is_spawn_failure() {
        let outcome = ProcessLauncher::default()
            .launch(JobSpec {
                entry_point: PathBuf::from("/definitely/not/here"),
                env: Vec::new(),
                timeout: Duration::from_secs(5),
            })
            .await;

        match outcome.termination {
            JobTermination::SpawnFailed(reason) => assert!(reason.contains("/definitely/not/here")),
            other => panic!("expected SpawnFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_spawn_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let launcher = ProcessLauncher::new(
            Some("no-such-interpreter-4f1c".to_string()),
            Duration::from_secs(1),
        );
        let outcome = launcher
            .launch(JobSpec {
                entry_point: file.path().to_path_buf(),
                env: Vec::new(),
                timeout: Duration::from_secs(5),
            })
            .await;

        assert!(matches!(outcome.termination, JobTermination::SpawnFailed(_)));
    }

    #[test]
    fn test_blank_interpreter_means_direct_exec() {
        let launcher = ProcessLauncher::new(Some("  ".to_string()), Duration::from_secs(1));
        assert!(launcher.interpreter.is_none());
    }
}
