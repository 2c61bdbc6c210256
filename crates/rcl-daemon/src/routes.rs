//! Axum router and HTTP handlers for rcl-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers, so tests can compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use rcl_config::RiskPolicy;
use rcl_ledger::LedgerError;
use rcl_policy::PolicyError;
use rcl_schemas::TradeCandidate;
use tokio::sync::{broadcast, mpsc::error::TrySendError};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{
        AccountSummaryResponse, CandidateAccepted, ErrorResponse, HealthResponse, PoliciesResponse,
        PolicyResponse, SummaryQuery, UpdateParameterRequest,
    },
    state::{AppState, BusMsg},
};

const DEFAULT_SUMMARY_DAYS: u32 = 7;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/policies", get(list_policies))
        .route("/v1/policies/:name", get(get_policy))
        .route("/v1/policies/:name/lock", post(lock_policy))
        .route("/v1/policies/:name/unlock", post(unlock_policy))
        .route("/v1/policies/:name/enable", post(enable_policy))
        .route("/v1/policies/:name/disable", post(disable_policy))
        .route("/v1/policies/:name/parameters", post(update_parameter))
        .route("/v1/accounts/:id/candidates", post(submit_candidate))
        .route("/v1/accounts/:id/summary", get(account_summary))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: msg.into() })).into_response()
}

fn policy_error(err: PolicyError) -> Response {
    let status = match &err {
        PolicyError::Locked(_) | PolicyError::LockedPolicyMismatch { .. } => StatusCode::CONFLICT,
        PolicyError::UnknownPolicy(_) => StatusCode::NOT_FOUND,
        PolicyError::UnknownParameter { .. } | PolicyError::InvalidValue { .. } => {
            StatusCode::BAD_REQUEST
        }
        PolicyError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "policy mutation failed");
    }
    error(status, err.to_string())
}

fn ledger_error(err: LedgerError) -> Response {
    tracing::error!(error = %err, "ledger read failed");
    error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

// ---------------------------------------------------------------------------
// GET /v1/health, /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.status().await;
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

fn policy_response(name: &str, policy: &RiskPolicy) -> PolicyResponse {
    PolicyResponse {
        name: name.to_string(),
        policy: policy.clone(),
    }
}

pub(crate) async fn list_policies(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let policies = st
        .policies
        .policies()
        .iter()
        .map(|(name, p)| policy_response(name, p))
        .collect();
    Json(PoliciesResponse { policies })
}

pub(crate) async fn get_policy(State(st): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    match st.policies.get_policy(&name) {
        Some(p) => Json(policy_response(&name, &p)).into_response(),
        None => error(StatusCode::NOT_FOUND, format!("unknown policy: {name}")),
    }
}

fn mutation(
    st: &AppState,
    name: &str,
    action: &str,
    result: Result<Arc<RiskPolicy>, PolicyError>,
) -> Response {
    match result {
        Ok(p) => {
            info!(policy = %name, action, "policy mutated via admin api");
            Json(policy_response(name, &p)).into_response()
        }
        Err(e) => {
            warn!(policy = %name, action, error = %e, "policy mutation refused");
            st.log("WARN", format!("policy {action} refused for {name}: {e}"));
            policy_error(e)
        }
    }
}

pub(crate) async fn lock_policy(State(st): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let r = st.policies.lock(&name);
    mutation(&st, &name, "lock", r)
}

pub(crate) async fn unlock_policy(State(st): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let r = st.policies.unlock(&name);
    mutation(&st, &name, "unlock", r)
}

pub(crate) async fn enable_policy(State(st): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let r = st.policies.enable(&name);
    mutation(&st, &name, "enable", r)
}

pub(crate) async fn disable_policy(State(st): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let r = st.policies.disable(&name);
    mutation(&st, &name, "disable", r)
}

pub(crate) async fn update_parameter(
    State(st): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateParameterRequest>,
) -> Response {
    let r = st
        .policies
        .update_parameter(&name, &req.section, &req.key, req.value);
    mutation(&st, &name, "update_parameter", r)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub(crate) async fn submit_candidate(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(candidate): Json<TradeCandidate>,
) -> Response {
    let Some(handle) = st.accounts.get(&id) else {
        return error(StatusCode::NOT_FOUND, format!("unknown account: {id}"));
    };
    if candidate.account_id != id {
        return error(
            StatusCode::BAD_REQUEST,
            format!("candidate is for account {}, posted to {id}", candidate.account_id),
        );
    }

    match handle.candidates.try_send(candidate) {
        Ok(()) => {
            info!(account_id = %id, "candidate queued");
            (
                StatusCode::ACCEPTED,
                Json(CandidateAccepted {
                    account_id: id,
                    queued: true,
                }),
            )
                .into_response()
        }
        Err(TrySendError::Full(_)) => error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("candidate queue for {id} is full"),
        ),
        Err(TrySendError::Closed(_)) => error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("account loop for {id} is not running"),
        ),
    }
}

pub(crate) async fn account_summary(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> Response {
    if !st.accounts.contains_key(&id) {
        return error(StatusCode::NOT_FOUND, format!("unknown account: {id}"));
    }
    let days = q.days.unwrap_or(DEFAULT_SUMMARY_DAYS);

    let state = match st.ledger.get_account_state(&id).await {
        Ok(s) => s,
        Err(e) => return ledger_error(e),
    };
    let latest_snapshot = match st.ledger.get_latest_snapshot(&id).await {
        Ok(s) => s,
        Err(e) => return ledger_error(e),
    };
    let daily = match st.ledger.get_daily_summary(&id, days).await {
        Ok(d) => d,
        Err(e) => return ledger_error(e),
    };
    let open_trades = match st.ledger.open_trades(&id).await {
        Ok(t) => t,
        Err(e) => return ledger_error(e),
    };

    Json(AccountSummaryResponse {
        account_id: id,
        state,
        latest_snapshot,
        daily,
        open_trades,
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::Control(_) => "control",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
