//! Request and response types for the rcl-daemon admin API.
//!
//! No business logic lives here.

use rcl_config::RiskPolicy;
use rcl_ledger::{AccountSnapshot, DailySummary, TradeRecord};
use rcl_risk::AccountState;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// /v1/policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResponse {
    pub name: String,
    pub policy: RiskPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesResponse {
    pub policies: Vec<PolicyResponse>,
}

/// `POST /v1/policies/{name}/parameters`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateParameterRequest {
    pub section: String,
    pub key: String,
    pub value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// /v1/accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateAccepted {
    pub account_id: String,
    pub queued: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummaryResponse {
    pub account_id: String,
    pub state: Option<AccountState>,
    pub latest_snapshot: Option<AccountSnapshot>,
    pub daily: Vec<DailySummary>,
    pub open_trades: Vec<TradeRecord>,
}
