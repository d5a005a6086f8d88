//! Strategy jobs as real child processes
#![cfg(unix)]

use hedgerun::executor::{ExecutionStatus, JobExecutor, ProcessLauncher};
use hedgerun::session::SessionHandle;
use hedgerun::strategy::{StrategyId, ValidatedStrategy};
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str, executable: bool) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mode = if executable { 0o755 } else { 0o644 };
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
    path
}

fn strategy(path: PathBuf) -> ValidatedStrategy {
    ValidatedStrategy {
        id: StrategyId::Number(7),
        name: "Breakout".to_string(),
        executable_path: path,
        parameters: json!({"symbol": "SBIN-EQ", "quantity": 1}),
    }
}

fn session() -> SessionHandle {
    SessionHandle {
        token: "jwt-abc".to_string(),
        client_id: "A123456".to_string(),
        api_key: "key-1".to_string(),
    }
}

fn executor(timeout: Duration) -> JobExecutor {
    JobExecutor::new(Box::new(ProcessLauncher::default()), timeout)
}

#[tokio::test]
async fn test_successful_job_sees_its_environment() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "env.sh",
        r#"echo "id=$STRATEGY_ID name=$STRATEGY_NAME"
echo "params=$STRATEGY_PARAMETERS"
echo "session=$ANGEL_SESSION_TOKEN key=$ANGEL_API_KEY client=$ANGEL_CLIENT_ID"
echo SUCCESS"#,
        true,
    );

    let result = executor(Duration::from_secs(10))
        .execute(&strategy(script), &session())
        .await;

    assert_eq!(result.status, ExecutionStatus::Succeeded);
    assert_eq!(result.exit_code(), Some(0));
    assert!(result.stdout.contains("id=7 name=Breakout"));
    assert!(result.stdout.contains("session=jwt-abc key=key-1 client=A123456"));

    let params_line = result
        .stdout
        .lines()
        .find_map(|line| line.strip_prefix("params="))
        .unwrap();
    let params: serde_json::Value = serde_json::from_str(params_line).unwrap();
    assert_eq!(params, json!({"symbol": "SBIN-EQ", "quantity": 1}));
}

#[tokio::test]
async fn test_nonzero_exit_keeps_stderr() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "fail.sh", "echo 'order rejected' >&2\nexit 3", true);

    let result = executor(Duration::from_secs(10))
        .execute(&strategy(script), &session())
        .await;

    assert_eq!(result.status, ExecutionStatus::Failed { exit_code: 3 });
    assert_eq!(result.exit_code(), Some(3));
    assert_eq!(result.stderr.trim(), "order rejected");
}

#[tokio::test]
async fn test_hung_job_is_killed_at_timeout() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "hang.sh", "echo started\nexec sleep 30", true);

    let result = executor(Duration::from_millis(300))
        .execute(&strategy(script), &session())
        .await;

    assert_eq!(
        result.status,
        ExecutionStatus::TimedOut {
            limit: Duration::from_millis(300)
        }
    );
    assert_eq!(result.exit_code(), None);
    assert!(result.duration < Duration::from_secs(10));
    assert!(result.stdout.contains("started"));
}

#[tokio::test]
async fn test_timeout_takes_down_forked_children() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "fork.sh", "sleep 30 &\nsleep 30 &\nwait", true);

    let result = executor(Duration::from_millis(300))
        .execute(&strategy(script), &session())
        .await;

    assert!(matches!(result.status, ExecutionStatus::TimedOut { .. }));
    // Orphaned sleepers holding the pipes open would stall output collection.
    assert!(result.duration < Duration::from_secs(4));
}

#[tokio::test]
async fn test_job_killed_by_signal() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "suicide.sh", "kill -9 $$", true);

    let result = executor(Duration::from_secs(10))
        .execute(&strategy(script), &session())
        .await;

    assert_eq!(result.status, ExecutionStatus::Signaled { signal: Some(9) });
    assert!(!result.succeeded());
    assert_eq!(result.exit_code(), None);
}

#[tokio::test]
async fn test_unexecutable_entry_point_is_spawn_failure() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "plain.sh", "echo never", false);

    let result = executor(Duration::from_secs(10))
        .execute(&strategy(script), &session())
        .await;

    assert!(matches!(result.status, ExecutionStatus::SpawnFailed { .. }));
    assert_eq!(result.exit_code(), None);
}

#[tokio::test]
async fn test_missing_interpreter_is_spawn_failure() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "job.py", "print('hi')", false);
    let launcher = ProcessLauncher::new(
        Some("/nonexistent/bin/python3".to_string()),
        Duration::from_secs(5),
    );

    let result = JobExecutor::new(Box::new(launcher), Duration::from_secs(10))
        .execute(&strategy(script), &session())
        .await;

    match result.status {
        ExecutionStatus::SpawnFailed { reason } => assert!(reason.contains("job.py")),
        other => panic!("expected SpawnFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_interpreter_runs_non_executable_file() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "job.sh", "echo \"via interpreter $STRATEGY_ID\"", false);
    let launcher = ProcessLauncher::new(Some("sh".to_string()), Duration::from_secs(5));

    let result = JobExecutor::new(Box::new(launcher), Duration::from_secs(10))
        .execute(&strategy(script), &session())
        .await;

    assert!(result.succeeded());
    assert_eq!(result.stdout.trim(), "via interpreter 7");
}
