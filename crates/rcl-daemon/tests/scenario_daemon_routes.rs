//! In-process scenario tests for the rcl-daemon admin API.
//!
//! Validates: every route answers with the right status code and body, and
//! that locked-policy mutations surface as `409 Conflict`.
//!
//! GREEN when:
//! - Health and status report the service, accounts and policies.
//! - Policy reads return 200 / 404; lock, unlock, enable and disable round
//!   trip through the store.
//! - Mutating a locked policy answers 409 with the store's error text and
//!   changes nothing.
//! - Candidates are queued for a known account (202), refused for an unknown
//!   one (404) or a mismatched body (400).
//! - Account summaries read from the ledger.
//!
//! The router is driven with `tower::ServiceExt::oneshot`; no TCP socket.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rcl_audit::AuditLog;
use rcl_config::{load_layered_yaml_from_strings, ControlDocument};
use rcl_daemon::{routes, state};
use rcl_ledger::PerformanceLedger;
use rcl_policy::RiskPolicyStore;
use rcl_schemas::TradeCandidate;
use serde_json::json;
use tokio::sync::mpsc;
use tower::ServiceExt; // oneshot

const DOC: &str = r#"
version: 1
policies:
  momentum:
    risk: { max_risk_per_trade: 0.01, min_risk_reward: 1.5 }
    limits: { max_concurrent_positions: 3, max_trades_per_day: 10 }
    protection: { breakeven_threshold: 0.005, trail_activation: 0.01, trail_distance: 0.008 }
accounts:
  - account_id: acct-1
    strategy: momentum
    instrument: EUR_USD
    instrument_class: forex
    initial_balance: 100000
"#;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    _dir: tempfile::TempDir,
    state: Arc<state::AppState>,
    candidates: mpsc::Receiver<TradeCandidate>,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let doc: ControlDocument = load_layered_yaml_from_strings(&[DOC]).unwrap().document().unwrap();
    let audit = AuditLog::open(dir.path().join("audit.jsonl"), true).unwrap();
    let policies = Arc::new(RiskPolicyStore::open(&doc, dir.path().join("state.json"), audit, None).unwrap());
    let ledger = PerformanceLedger::in_memory().await.unwrap();

    let (tx, rx) = mpsc::channel(4);
    let mut accounts = BTreeMap::new();
    accounts.insert(
        "acct-1".to_string(),
        state::AccountHandle {
            config: doc.accounts[0].clone(),
            candidates: tx,
        },
    );
    let state = Arc::new(state::AppState::new(policies, ledger, accounts, "abc123".to_string()));
    Fixture {
        _dir: dir,
        state,
        candidates: rx,
    }
}

async fn call(st: &Arc<state::AppState>, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn parse_json(b: Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn candidate_json(account_id: &str) -> serde_json::Value {
    json!({
        "account_id": account_id,
        "strategy": "momentum",
        "instrument": "EUR_USD",
        "direction": "LONG",
        "entry_price": 1.1,
        "stop_loss": 1.095,
        "take_profit": 1.11,
        "generated_at": "2026-03-10T10:00:00Z"
    })
}

// ---------------------------------------------------------------------------
// Health / status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let f = fixture().await;
    let (status, body) = call(&f.state, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "rcl-daemon");
}

#[tokio::test]
async fn status_lists_accounts_policies_and_config_hash() {
    let f = fixture().await;
    let (status, body) = call(&f.state, get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["config_hash"], "abc123");
    assert_eq!(json["accounts"][0]["account_id"], "acct-1");
    assert_eq!(json["accounts"][0]["mandate"], false);
    assert_eq!(json["policies"][0]["name"], "momentum");
    assert_eq!(json["policies"][0]["locked"], false);
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn policy_reads() {
    let f = fixture().await;

    let (status, body) = call(&f.state, get("/v1/policies")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["policies"].as_array().unwrap().len(), 1);

    let (status, body) = call(&f.state, get("/v1/policies/momentum")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["policy"]["risk"]["max_risk_per_trade"], 0.01);

    let (status, body) = call(&f.state, get("/v1/policies/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(parse_json(body)["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn locked_policy_mutations_answer_409() {
    let f = fixture().await;

    let (status, body) = call(&f.state, post("/v1/policies/momentum/lock")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["policy"]["locked"], true);

    let update = json!({ "section": "risk", "key": "max_risk_per_trade", "value": 0.05 });
    let (status, body) = call(&f.state, post_json("/v1/policies/momentum/parameters", update.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse_json(body)["error"], "policy 'momentum' is locked");

    let (status, _) = call(&f.state, post("/v1/policies/momentum/disable")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let p = f.state.policies.get_policy("momentum").unwrap();
    assert_eq!(p.risk.max_risk_per_trade, 0.01);
    assert!(p.enabled);

    let (status, _) = call(&f.state, post("/v1/policies/momentum/unlock")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&f.state, post_json("/v1/policies/momentum/parameters", update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["policy"]["risk"]["max_risk_per_trade"], 0.05);
}

#[tokio::test]
async fn enable_and_disable_round_trip() {
    let f = fixture().await;

    let (status, body) = call(&f.state, post("/v1/policies/momentum/disable")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["policy"]["enabled"], false);

    let (status, body) = call(&f.state, post("/v1/policies/momentum/enable")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["policy"]["enabled"], true);

    let (status, _) = call(&f.state, post("/v1/policies/ghost/enable")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_parameter_updates_answer_400() {
    let f = fixture().await;

    let unknown = json!({ "section": "risk", "key": "leverage", "value": 10 });
    let (status, _) = call(&f.state, post_json("/v1/policies/momentum/parameters", unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let out_of_range = json!({ "section": "risk", "key": "max_risk_per_trade", "value": -1.0 });
    let (status, _) = call(&f.state, post_json("/v1/policies/momentum/parameters", out_of_range)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn candidates_are_queued_for_known_accounts_only() {
    let mut f = fixture().await;

    let (status, body) = call(&f.state, post_json("/v1/accounts/acct-1/candidates", candidate_json("acct-1"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(parse_json(body)["queued"], true);
    let queued = f.candidates.try_recv().unwrap();
    assert_eq!(queued.account_id, "acct-1");
    assert_eq!(queued.stop_loss, Some(1.095));

    let (status, _) = call(&f.state, post_json("/v1/accounts/acct-9/candidates", candidate_json("acct-9"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&f.state, post_json("/v1/accounts/acct-1/candidates", candidate_json("acct-2"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(f.candidates.try_recv().is_err());
}

#[tokio::test]
async fn account_summary_reads_the_ledger() {
    let f = fixture().await;

    let (status, body) = call(&f.state, get("/v1/accounts/acct-1/summary")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert!(json["state"].is_null());
    assert!(json["daily"].as_array().unwrap().is_empty());

    f.state.ledger.open_account("acct-1", 100_000.0).await.unwrap();
    let (status, body) = call(&f.state, get("/v1/accounts/acct-1/summary?days=3")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["state"]["current_balance"], 100000.0);
    assert!(json["open_trades"].as_array().unwrap().is_empty());

    let (status, _) = call(&f.state, get("/v1/accounts/acct-9/summary")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_is_server_sent_events() {
    let f = fixture().await;
    let resp = routes::build_router(Arc::clone(&f.state))
        .oneshot(get("/v1/stream"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(ct.starts_with("text/event-stream"), "{ct}");
}
