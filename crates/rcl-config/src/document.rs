use chrono::{DateTime, NaiveTime, Timelike, Utc};
use rcl_schemas::{ContractSpec, Direction, InstrumentClass};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{check_range, ConfigError};
use crate::policy::RiskPolicy;

pub const CONTROL_DOCUMENT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Document root
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlDocument {
    pub version: u32,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub policies: BTreeMap<String, RiskPolicy>,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl ControlDocument {
    pub fn from_value(v: Value) -> Result<Self, ConfigError> {
        let doc: ControlDocument = serde_json::from_value(v)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn account(&self, account_id: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.account_id == account_id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONTROL_DOCUMENT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                expected: CONTROL_DOCUMENT_VERSION,
            });
        }

        for (name, policy) in &self.policies {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("policy name must not be empty".to_string()));
            }
            policy.validate(name)?;
        }

        let mut seen = BTreeSet::new();
        for acct in &self.accounts {
            if !seen.insert(acct.account_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate account_id '{}'",
                    acct.account_id
                )));
            }
            if !self.policies.contains_key(&acct.strategy) {
                return Err(ConfigError::Invalid(format!(
                    "account '{}' references unknown policy '{}'",
                    acct.account_id, acct.strategy
                )));
            }
            acct.validate()?;
        }

        self.quality.validate()?;
        self.broker.validate()?;

        if self.ledger.max_connections == 0 {
            return Err(ConfigError::out_of_range(
                "ledger.max_connections",
                self.ledger.max_connections,
                ">= 1",
            ));
        }
        if self.daemon.event_capacity == 0 {
            return Err(ConfigError::out_of_range(
                "daemon.event_capacity",
                self.daemon.event_capacity,
                ">= 1",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub account_id: String,
    /// Name of the [`RiskPolicy`] this account trades under.
    pub strategy: String,
    pub instrument: String,
    pub instrument_class: InstrumentClass,
    /// Overrides the class point value (e.g. JPY crosses at the current rate).
    #[serde(default)]
    pub point_value: Option<f64>,
    pub initial_balance: f64,
    #[serde(default)]
    pub limits: AccountLimits,
    /// Present only for mandate-restricted accounts.
    #[serde(default)]
    pub mandate: Option<MandateConfig>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AccountConfig {
    pub fn contract(&self) -> ContractSpec {
        let mut spec = self.instrument_class.contract();
        if let Some(pv) = self.point_value {
            spec.point_value = pv;
        }
        spec
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let id = &self.account_id;
        if id.trim().is_empty() {
            return Err(ConfigError::Invalid("account_id must not be empty".to_string()));
        }
        if !self.initial_balance.is_finite() || self.initial_balance <= 0.0 {
            return Err(ConfigError::out_of_range(
                format!("accounts.{id}.initial_balance"),
                self.initial_balance,
                "> 0",
            ));
        }
        if let Some(pv) = self.point_value {
            check_range(
                &format!("accounts.{id}.point_value"),
                pv,
                0.0,
                f64::MAX,
                false,
                "> 0",
            )?;
        }
        if self.poll_interval_ms < 10 {
            return Err(ConfigError::out_of_range(
                format!("accounts.{id}.poll_interval_ms"),
                self.poll_interval_ms,
                ">= 10",
            ));
        }
        self.limits.validate(id)?;
        if let Some(m) = &self.mandate {
            m.validate(id)?;
        }
        Ok(())
    }
}

/// Account-level risk caps (FTMO-style challenge rules).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountLimits {
    /// Fraction of the day's starting balance (0.05 == 5%).
    #[serde(default = "default_max_daily_drawdown")]
    pub max_daily_drawdown: f64,
    /// Fraction of the peak balance.
    #[serde(default = "default_max_total_drawdown")]
    pub max_total_drawdown: f64,
    /// Consecutive losses that halt new entries.
    #[serde(default = "default_loss_streak")]
    pub loss_streak_circuit_breaker: u32,
    /// Profit target as a fraction of the initial balance.
    #[serde(default)]
    pub profit_target: Option<f64>,
    #[serde(default)]
    pub min_trading_days: Option<u32>,
}

impl Default for AccountLimits {
    fn default() -> Self {
        Self {
            max_daily_drawdown: default_max_daily_drawdown(),
            max_total_drawdown: default_max_total_drawdown(),
            loss_streak_circuit_breaker: default_loss_streak(),
            profit_target: None,
            min_trading_days: None,
        }
    }
}

impl AccountLimits {
    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        check_range(
            &format!("accounts.{id}.limits.max_daily_drawdown"),
            self.max_daily_drawdown,
            0.0,
            1.0,
            false,
            "0 < x <= 1",
        )?;
        check_range(
            &format!("accounts.{id}.limits.max_total_drawdown"),
            self.max_total_drawdown,
            0.0,
            1.0,
            false,
            "0 < x <= 1",
        )?;
        if self.max_daily_drawdown > self.max_total_drawdown {
            return Err(ConfigError::out_of_range(
                format!("accounts.{id}.limits.max_daily_drawdown"),
                self.max_daily_drawdown,
                "<= limits.max_total_drawdown",
            ));
        }
        if self.loss_streak_circuit_breaker == 0 {
            return Err(ConfigError::out_of_range(
                format!("accounts.{id}.limits.loss_streak_circuit_breaker"),
                0,
                ">= 1",
            ));
        }
        if let Some(t) = self.profit_target {
            check_range(
                &format!("accounts.{id}.limits.profit_target"),
                t,
                0.0,
                10.0,
                false,
                "0 < x <= 10",
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mandates
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriceBand {
    pub low: f64,
    pub high: f64,
}

impl PriceBand {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipBand {
    pub min: f64,
    pub max: f64,
}

/// Declarative restrictions for one mandate-restricted account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MandateConfig {
    pub instrument: String,
    pub direction: Direction,
    pub max_units: u64,
    pub max_concurrent_positions: u32,
    pub max_total_units: u64,
    pub entry_zones: Vec<PriceBand>,
    pub stop_distance_pips: PipBand,
    pub min_take_profit_pips: f64,
    pub min_risk_reward: f64,
    #[serde(default)]
    pub sessions: Vec<SessionWindow>,
}

impl MandateConfig {
    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        let f = |s: &str| format!("accounts.{id}.mandate.{s}");
        if self.max_units == 0 {
            return Err(ConfigError::out_of_range(f("max_units"), 0, ">= 1"));
        }
        if self.max_total_units < self.max_units {
            return Err(ConfigError::out_of_range(
                f("max_total_units"),
                self.max_total_units,
                ">= max_units",
            ));
        }
        if self.max_concurrent_positions == 0 {
            return Err(ConfigError::out_of_range(f("max_concurrent_positions"), 0, ">= 1"));
        }
        if self.entry_zones.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{} must declare at least one zone",
                f("entry_zones")
            )));
        }
        for (i, z) in self.entry_zones.iter().enumerate() {
            if !(z.low.is_finite() && z.high.is_finite()) || z.low >= z.high {
                return Err(ConfigError::out_of_range(
                    f(&format!("entry_zones[{i}]")),
                    format!("{}..{}", z.low, z.high),
                    "low < high",
                ));
            }
        }
        let band = self.stop_distance_pips;
        if !(band.min.is_finite() && band.max.is_finite()) || band.min <= 0.0 || band.min > band.max {
            return Err(ConfigError::out_of_range(
                f("stop_distance_pips"),
                format!("{}..{}", band.min, band.max),
                "0 < min <= max",
            ));
        }
        check_range(
            &f("min_take_profit_pips"),
            self.min_take_profit_pips,
            0.0,
            f64::MAX,
            true,
            ">= 0",
        )?;
        check_range(&f("min_risk_reward"), self.min_risk_reward, 0.0, 20.0, true, "0 <= x <= 20")?;
        validate_sessions(&f("sessions"), &self.sessions, true)
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// A UTC time-of-day window `[start, end)`. `end < start` wraps midnight.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionWindow {
    #[serde(default)]
    pub name: Option<SessionName>,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

/// Display label of a session window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionName {
    Asia,
    London,
    NewYork,
    Overlap,
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: None,
            start,
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let t = ts.time();
        if self.start < self.end {
            t >= self.start && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }

    fn minutes(&self) -> Vec<(u32, u32)> {
        let s = self.start.hour() * 60 + self.start.minute();
        let e = self.end.hour() * 60 + self.end.minute();
        if s < e {
            vec![(s, e)]
        } else {
            vec![(s, 24 * 60), (0, e)]
        }
    }
}

fn validate_sessions(field: &str, sessions: &[SessionWindow], disjoint: bool) -> Result<(), ConfigError> {
    let mut spans: Vec<(u32, u32)> = Vec::new();
    for (i, s) in sessions.iter().enumerate() {
        if s.start == s.end {
            return Err(ConfigError::out_of_range(
                format!("{field}[{i}]"),
                format!("{}..{}", s.start.format("%H:%M"), s.end.format("%H:%M")),
                "start != end",
            ));
        }
        spans.extend(s.minutes());
    }
    if disjoint {
        spans.sort();
        for w in spans.windows(2) {
            if w[1].0 < w[0].1 {
                return Err(ConfigError::Invalid(format!("{field} must not overlap")));
            }
        }
    }
    Ok(())
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| {
            serde::de::Error::custom(format!("invalid HH:MM time '{raw}': {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Quality filter
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityConfig {
    #[serde(default = "default_min_passing_checks")]
    pub min_passing_checks: usize,
    #[serde(default = "default_min_momentum")]
    pub min_momentum: f64,
    #[serde(default = "default_min_trend_strength")]
    pub min_trend_strength: f64,
    /// Allowed distance of price from the fast average, in multiples of the
    /// fast/slow average gap.
    #[serde(default = "default_max_extension")]
    pub max_extension: f64,
    #[serde(default)]
    pub default_min_volatility: f64,
    #[serde(default = "default_max_spread")]
    pub default_max_spread: f64,
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentQuality>,
    /// Empty means no session restriction.
    #[serde(default = "default_quality_sessions")]
    pub sessions: Vec<SessionWindow>,
    #[serde(default)]
    pub weights: QualityWeights,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentQuality {
    pub min_volatility: f64,
    pub max_spread: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityWeights {
    pub momentum: u32,
    pub average_alignment: u32,
    pub trend_strength: u32,
    pub volatility: u32,
    pub session: u32,
    pub spread: u32,
    pub extension: u32,
    pub momentum_direction: u32,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            momentum: 20,
            average_alignment: 15,
            trend_strength: 20,
            volatility: 15,
            session: 10,
            spread: 10,
            extension: 10,
            momentum_direction: 0,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_passing_checks: default_min_passing_checks(),
            min_momentum: default_min_momentum(),
            min_trend_strength: default_min_trend_strength(),
            max_extension: default_max_extension(),
            default_min_volatility: 0.0,
            default_max_spread: default_max_spread(),
            instruments: BTreeMap::new(),
            sessions: default_quality_sessions(),
            weights: QualityWeights::default(),
        }
    }
}

impl QualityConfig {
    pub fn min_volatility_for(&self, instrument: &str) -> f64 {
        self.instruments
            .get(instrument)
            .map(|q| q.min_volatility)
            .unwrap_or(self.default_min_volatility)
    }

    pub fn max_spread_for(&self, instrument: &str) -> f64 {
        self.instruments
            .get(instrument)
            .map(|q| q.max_spread)
            .unwrap_or(self.default_max_spread)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_passing_checks == 0 || self.min_passing_checks > 8 {
            return Err(ConfigError::out_of_range(
                "quality.min_passing_checks",
                self.min_passing_checks,
                "1..=8",
            ));
        }
        let non_negative = [
            ("quality.min_momentum", self.min_momentum),
            ("quality.min_trend_strength", self.min_trend_strength),
            ("quality.max_extension", self.max_extension),
            ("quality.default_min_volatility", self.default_min_volatility),
            ("quality.default_max_spread", self.default_max_spread),
        ];
        for (field, v) in non_negative {
            check_range(field, v, 0.0, f64::MAX, true, ">= 0")?;
        }
        for (instrument, q) in &self.instruments {
            check_range(
                &format!("quality.instruments.{instrument}.min_volatility"),
                q.min_volatility,
                0.0,
                f64::MAX,
                true,
                ">= 0",
            )?;
            check_range(
                &format!("quality.instruments.{instrument}.max_spread"),
                q.max_spread,
                0.0,
                f64::MAX,
                true,
                ">= 0",
            )?;
        }
        let w = &self.weights;
        for (field, v) in [
            ("momentum", w.momentum),
            ("average_alignment", w.average_alignment),
            ("trend_strength", w.trend_strength),
            ("volatility", w.volatility),
            ("session", w.session),
            ("spread", w.spread),
            ("extension", w.extension),
            ("momentum_direction", w.momentum_direction),
        ] {
            if v > 100 {
                return Err(ConfigError::out_of_range(format!("quality.weights.{field}"), v, "0..=100"));
            }
        }
        validate_sessions("quality.sessions", &self.sessions, false)
    }
}

// ---------------------------------------------------------------------------
// Broker / ledger / audit / daemon
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the first attempt, reads only.
    #[serde(default = "default_read_retries")]
    pub read_retries: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default)]
    pub paper: PaperBrokerConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            read_retries: default_read_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            paper: PaperBrokerConfig::default(),
        }
    }
}

impl BrokerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 || self.timeout_ms > 120_000 {
            return Err(ConfigError::out_of_range("broker.timeout_ms", self.timeout_ms, "1..=120000"));
        }
        if self.read_retries > 10 {
            return Err(ConfigError::out_of_range("broker.read_retries", self.read_retries, "0..=10"));
        }
        for (instrument, q) in &self.paper.quotes {
            if !(q.bid.is_finite() && q.ask.is_finite()) || q.bid <= 0.0 || q.ask < q.bid {
                return Err(ConfigError::out_of_range(
                    format!("broker.paper.quotes.{instrument}"),
                    format!("{}/{}", q.bid, q.ask),
                    "0 < bid <= ask",
                ));
            }
        }
        Ok(())
    }
}

/// Seed quotes for the in-process paper broker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaperBrokerConfig {
    #[serde(default)]
    pub quotes: BTreeMap<String, PaperQuote>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaperQuote {
    pub bid: f64,
    pub ask: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_url")]
    pub url: String,
    #[serde(default = "default_ledger_connections")]
    pub max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: default_ledger_url(),
            max_connections: default_ledger_connections(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default = "default_audit_path")]
    pub path: String,
    #[serde(default = "default_true")]
    pub hash_chain: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
            hash_chain: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_addr")]
    pub addr: String,
    #[serde(default = "default_policy_state_path")]
    pub policy_state_path: String,
    /// Reload policies when the control document changes on disk.
    #[serde(default = "default_true")]
    pub watch_config: bool,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: default_daemon_addr(),
            policy_state_path: default_policy_state_path(),
            watch_config: true,
            event_capacity: default_event_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    1_000
}
fn default_max_daily_drawdown() -> f64 {
    0.05
}
fn default_max_total_drawdown() -> f64 {
    0.10
}
fn default_loss_streak() -> u32 {
    3
}
fn default_min_passing_checks() -> usize {
    5
}
fn default_min_momentum() -> f64 {
    0.0005
}
fn default_min_trend_strength() -> f64 {
    25.0
}
fn default_max_extension() -> f64 {
    1.5
}
fn default_max_spread() -> f64 {
    0.0003
}
fn default_quality_sessions() -> Vec<SessionWindow> {
    // 07:00-21:00 UTC: London open through New York close.
    match (NaiveTime::from_hms_opt(7, 0, 0), NaiveTime::from_hms_opt(21, 0, 0)) {
        (Some(start), Some(end)) => vec![SessionWindow::new(start, end)],
        _ => Vec::new(),
    }
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_read_retries() -> usize {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    100
}
fn default_ledger_url() -> String {
    "sqlite://rcl-ledger.db?mode=rwc".to_string()
}
fn default_ledger_connections() -> u32 {
    4
}
fn default_audit_path() -> String {
    "rcl-policy-audit.jsonl".to_string()
}
fn default_daemon_addr() -> String {
    "127.0.0.1:8899".to_string()
}
fn default_policy_state_path() -> String {
    "rcl-policy-state.json".to_string()
}
fn default_event_capacity() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn session_window_is_half_open() {
        let w = SessionWindow::new(t(7, 0), t(16, 0));
        let at = |h, m| Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap();
        assert!(w.contains(at(7, 0)));
        assert!(w.contains(at(15, 59)));
        assert!(!w.contains(at(16, 0)));
        assert!(!w.contains(at(6, 59)));
    }

    #[test]
    fn session_window_wraps_midnight() {
        let w = SessionWindow::new(t(22, 0), t(2, 0));
        let at = |h| Utc.with_ymd_and_hms(2026, 3, 2, h, 30, 0).unwrap();
        assert!(w.contains(at(23)));
        assert!(w.contains(at(1)));
        assert!(!w.contains(at(12)));
    }

    #[test]
    fn overlapping_mandate_sessions_rejected() {
        let sessions = vec![
            SessionWindow::new(t(7, 0), t(12, 0)),
            SessionWindow::new(t(11, 0), t(14, 0)),
        ];
        assert!(validate_sessions("s", &sessions, true).is_err());
        assert!(validate_sessions("s", &sessions, false).is_ok());
    }

    #[test]
    fn session_time_must_be_hh_mm() {
        let err = serde_json::from_value::<SessionWindow>(serde_json::json!({
            "start": "7am",
            "end": "16:00"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("HH:MM"));
    }
}
