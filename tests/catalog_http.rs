//! Catalog client against a local control-plane

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use hedgerun::config::{ControlPlaneConfig, RetryConfig};
use hedgerun::error::FetchError;
use hedgerun::session::SessionHandle;
use hedgerun::strategy::StrategyId;
use hedgerun::{HttpCatalogClient, StrategyCatalog};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

const TOKEN: &str = "cp-secret";

/// Responses served in order; the last one repeats
#[derive(Clone)]
struct Script {
    responses: Arc<Vec<(StatusCode, &'static str)>>,
    hits: Arc<AtomicUsize>,
}

impl Script {
    fn new(responses: Vec<(StatusCode, &'static str)>) -> Self {
        Self {
            responses: Arc::new(responses),
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn active_strategies(State(script): State<Script>, headers: HeaderMap) -> (StatusCode, String) {
    let hit = script.hits.fetch_add(1, Ordering::SeqCst);

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == format!("Bearer {}", TOKEN));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, r#"{"success":false,"error":"unauthorized"}"#.to_string());
    }

    let index = hit.min(script.responses.len() - 1);
    let (status, body) = script.responses[index];
    (status, body.to_string())
}

async fn serve(script: Script) -> String {
    let router = Router::new()
        .route("/api/active-strategies", get(active_strategies))
        .with_state(script);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn client(base_url: &str, token: &str, max_retries: u32) -> HttpCatalogClient {
    let config = ControlPlaneConfig {
        base_url: base_url.to_string(),
        api_token: token.to_string(),
        timeout_secs: 5,
        user_agent: "hedgerun-tests".to_string(),
    };
    let retry = RetryConfig {
        max_retries,
        retry_delay_secs: 0,
    };
    HttpCatalogClient::new(&config, retry).unwrap()
}

fn session() -> SessionHandle {
    SessionHandle {
        token: "jwt".to_string(),
        client_id: "A123456".to_string(),
        api_key: "key".to_string(),
    }
}

#[tokio::test]
async fn test_fetches_records_in_catalog_order() {
    let script = Script::new(vec![(
        StatusCode::OK,
        r#"{
            "success": true,
            "data": [
                {"id": 1, "name": "MA-Cross", "script_path": "/srv/ma.py",
                 "params": {"symbol": "SBIN-EQ", "short_ma_period": 5, "long_ma_period": 20},
                 "user_id": 4, "last_modified": "2024-01-02 10:00:00", "file_size": 2048},
                {"id": "rsi-7", "name": "RSI", "python_file_path": "/srv/rsi.py", "parameters": null}
            ]
        }"#,
    )]);
    let base = serve(script.clone()).await;

    let records = assert_ok!(client(&base, TOKEN, 3)
        .fetch_active_strategies(&session())
        .await);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, Some(StrategyId::Number(1)));
    assert_eq!(records[0].executable_path, Some(PathBuf::from("/srv/ma.py")));
    assert_eq!(records[0].parameters.as_ref().unwrap()["short_ma_period"], 5);
    assert_eq!(records[1].id, Some(StrategyId::Text("rsi-7".to_string())));
    assert_eq!(records[1].parameters, Some(serde_json::Value::Null));
    assert_eq!(script.hits(), 1);
}

#[tokio::test]
async fn test_empty_catalog_is_not_an_error() {
    let script = Script::new(vec![(StatusCode::OK, r#"{"success": true, "data": []}"#)]);
    let base = serve(script).await;

    let records = assert_ok!(client(&base, TOKEN, 3)
        .fetch_active_strategies(&session())
        .await);
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_reported_failure_is_rejected_without_retry() {
    let script = Script::new(vec![(StatusCode::OK, r#"{"success": false, "error": "rate limited"}"#)]);
    let base = serve(script.clone()).await;

    let err = assert_err!(client(&base, TOKEN, 3)
        .fetch_active_strategies(&session())
        .await);
    match err {
        FetchError::Rejected(message) => assert_eq!(message, "rate limited"),
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(script.hits(), 1);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let script = Script::new(vec![
        (StatusCode::BAD_GATEWAY, "upstream down"),
        (StatusCode::SERVICE_UNAVAILABLE, "still down"),
        (StatusCode::OK, r#"{"success": true, "data": [{"id": 9, "name": "Late", "executable_path": "/srv/late.py", "parameters": {}}]}"#),
    ]);
    let base = serve(script.clone()).await;

    let records = assert_ok!(client(&base, TOKEN, 3)
        .fetch_active_strategies(&session())
        .await);
    assert_eq!(records.len(), 1);
    assert_eq!(script.hits(), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let script = Script::new(vec![(StatusCode::INTERNAL_SERVER_ERROR, "boom")]);
    let base = serve(script.clone()).await;

    let err = assert_err!(client(&base, TOKEN, 2)
        .fetch_active_strategies(&session())
        .await);
    assert!(matches!(err, FetchError::Status { status: 500, .. }));
    assert_eq!(script.hits(), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let script = Script::new(vec![(StatusCode::OK, r#"{"success": true, "data": []}"#)]);
    let base = serve(script.clone()).await;

    let err = assert_err!(client(&base, "wrong-token", 3)
        .fetch_active_strategies(&session())
        .await);
    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("unauthorized"));
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert_eq!(script.hits(), 1);
}

#[tokio::test]
async fn test_malformed_body() {
    let script = Script::new(vec![(StatusCode::OK, "<html>maintenance</html>")]);
    let base = serve(script).await;

    let err = assert_err!(client(&base, TOKEN, 3)
        .fetch_active_strategies(&session())
        .await);
    assert!(matches!(err, FetchError::Malformed(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_unreachable_control_plane() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = assert_err!(client(&format!("http://{}/api", addr), TOKEN, 1)
        .fetch_active_strategies(&session())
        .await);
    assert!(matches!(err, FetchError::Transport(_)));
    assert!(err.is_transient());
}
