//! Per-account polling loop.
//!
//! One tick, in order:
//! 0. retry trade entries the ledger has not accepted yet;
//! 1. fetch the quote;
//! 2. run protection for every open position on the instrument, committing a
//!    stop only after the broker accepted it;
//! 3. detect closed trades and record their exits;
//! 4. pull at most one candidate and push it through quality, policy,
//!    mandate and risk checks;
//! 5. submit an approved order exactly once and register the fill.
//!
//! While any confirmed fill is missing from the ledger the loop keeps
//! protecting it but admits no new candidates, and holds back its exit
//! until the entry is written.
//!
//! Shutdown is only observed between ticks.

use chrono::{NaiveDate, Utc};
use rcl_config::{AccountConfig, RiskPolicy};
use rcl_execution::{BrokerGateway, MarketOrderRequest, OrderOutcome, TradeState};
use rcl_ledger::{AccountSnapshot, LedgerError, PerformanceLedger, StopAdjustment, TradeEntry, TradeExit};
use rcl_policy::RiskPolicyStore;
use rcl_protect::ProtectionEngine;
use rcl_quality::{QualityInput, QualityScorer};
use rcl_risk::{
    check_for_emotional_trading, AccountState, Denial, MandateRequest, MandateVerdict, RiskGate,
    TradeRequest, TradeValidator,
};
use rcl_schemas::{ContractSpec, ControlEvent, EventBus, Position, Quote, TradeCandidate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{CandidateOutcome, DenialReason, RuntimeError, SignalSource, TickReport};

/// Shared collaborators handed to every account loop.
#[derive(Clone)]
pub struct LoopContext {
    pub ledger: PerformanceLedger,
    pub policies: Arc<RiskPolicyStore>,
    pub gateway: BrokerGateway,
    pub scorer: Arc<QualityScorer>,
    pub events: EventBus,
}

pub struct AccountLoop<S: SignalSource> {
    account: AccountConfig,
    ctx: LoopContext,
    signals: S,
    protection: ProtectionEngine,
    validator: Option<TradeValidator>,
    contract: ContractSpec,
    ticks: u64,
    snapshot_every: u64,
    breach_reported_on: Option<NaiveDate>,
    unrecorded_entries: Vec<TradeEntry>,
}

impl<S: SignalSource> AccountLoop<S> {
    pub fn new(account: AccountConfig, ctx: LoopContext, signals: S) -> Result<Self, RuntimeError> {
        let policy = ctx
            .policies
            .get_policy(&account.strategy)
            .ok_or_else(|| RuntimeError::UnknownPolicy {
                account_id: account.account_id.clone(),
                policy: account.strategy.clone(),
            })?;
        let validator = account
            .mandate
            .clone()
            .map(|m| TradeValidator::new(m, account.instrument_class));
        Ok(Self {
            contract: account.contract(),
            protection: ProtectionEngine::new(policy.protection.clone()),
            validator,
            account,
            ctx,
            signals,
            ticks: 0,
            snapshot_every: 60,
            breach_reported_on: None,
            unrecorded_entries: Vec::new(),
        })
    }

    /// Record a broker snapshot every `n` ticks (0 disables).
    pub fn with_snapshot_every(mut self, n: u64) -> Self {
        self.snapshot_every = n;
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account.account_id
    }

    pub fn protection(&self) -> &ProtectionEngine {
        &self.protection
    }

    /// Confirmed fills whose entry the ledger has not accepted yet.
    pub fn unrecorded_entries(&self) -> usize {
        self.unrecorded_entries.len()
    }

    /// Open the ledger account and re-register positions that were open at
    /// the last shutdown.
    pub async fn restore(&mut self) -> Result<AccountState, RuntimeError> {
        let state = self
            .ctx
            .ledger
            .open_account(&self.account.account_id, self.account.initial_balance)
            .await?;
        for record in self.ctx.ledger.open_trades(&self.account.account_id).await? {
            info!(
                account_id = %self.account.account_id,
                trade_id = %record.trade_id,
                stage = %record.stage,
                "restored open position"
            );
            self.protection.register(record.to_position());
        }
        Ok(state)
    }

    /// Restore, then tick every `poll_interval_ms` until `shutdown` flips to
    /// true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let account_id = self.account.account_id.clone();
        if let Err(e) = self.restore().await {
            error!(%account_id, error = %e, "account loop failed to start");
            return;
        }
        info!(%account_id, instrument = %self.account.instrument, "account loop started");

        let mut interval = tokio::time::interval(Duration::from_millis(self.account.poll_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    // The tick runs to completion even if shutdown arrives meanwhile.
                    let report = self.tick().await;
                    debug!(%account_id, closed = report.closed.len(), stops = report.stops_moved.len(), "tick done");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(%account_id, open_positions = self.protection.len(), "account loop stopped");
    }

    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport::default();
        self.record_unrecorded_entries().await;

        let quote = match self.ctx.gateway.get_current_price(&self.account.instrument).await {
            Ok(q) => q,
            Err(e) => {
                warn!(account_id = %self.account.account_id, error = %e, "price fetch failed; skipping tick");
                return report;
            }
        };

        let policy = self.ctx.policies.get_policy(&self.account.strategy);
        if let Some(p) = &policy {
            if p.protection != *self.protection.params() {
                self.protection.set_params(p.protection.clone());
            }
        }

        self.protect(&quote, &mut report).await;
        self.detect_closes(&mut report).await;

        if let Some(candidate) = self.signals.poll_candidate() {
            let outcome = self.handle_candidate(candidate, policy).await;
            report.candidate = Some(outcome);
        }

        if self.snapshot_every > 0 && self.ticks % self.snapshot_every == 0 {
            self.snapshot().await;
        }

        report.quote = Some(quote);
        report
    }

    // -----------------------------------------------------------------------
    // Protection
    // -----------------------------------------------------------------------

    async fn protect(&mut self, quote: &Quote, report: &mut TickReport) {
        for trade_id in self.protection.trade_ids_for(&quote.instrument) {
            let Some(position) = self.protection.get(&trade_id) else {
                continue;
            };
            let price = quote.exit_price(position.direction());
            let stage_before = position.stage();

            let Some(update) = self.protection.evaluate(&trade_id, price) else {
                if let Some(p) = self.protection.get(&trade_id) {
                    if p.stage() != stage_before {
                        self.publish_stage(&trade_id, stage_before, p.stage());
                    }
                }
                continue;
            };

            match self.ctx.gateway.modify_stop_loss(&trade_id, update.new_stop).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(account_id = %self.account.account_id, %trade_id, new_stop = update.new_stop, "broker declined stop modification");
                    continue;
                }
                Err(e) => {
                    warn!(account_id = %self.account.account_id, %trade_id, error = %e, "stop modification failed; will re-propose");
                    continue;
                }
            }

            if !self.protection.apply(&update) {
                continue;
            }
            let adjustment = StopAdjustment {
                trade_id: trade_id.clone(),
                previous_stop: update.previous_stop,
                new_stop: update.new_stop,
                stage: update.to_stage,
                peak_price: update.peak_price,
                ts_utc: Utc::now(),
            };
            if let Err(e) = self.ctx.ledger.record_stop_adjustment(&adjustment).await {
                error!(account_id = %self.account.account_id, %trade_id, error = %e, "stop accepted by broker but not persisted");
            }

            info!(
                account_id = %self.account.account_id,
                %trade_id,
                previous_stop = update.previous_stop,
                new_stop = update.new_stop,
                stage = %update.to_stage,
                "stop adjusted"
            );
            self.ctx.events.publish(ControlEvent::StopAdjusted {
                account_id: self.account.account_id.clone(),
                trade_id: trade_id.clone(),
                previous_stop: update.previous_stop,
                new_stop: update.new_stop,
                ts_utc: Utc::now(),
            });
            if update.changes_stage() {
                self.publish_stage(&trade_id, update.from_stage, update.to_stage);
            }
            report.stops_moved.push(update);
        }
    }

    fn publish_stage(&self, trade_id: &str, from: rcl_schemas::ProtectionStage, to: rcl_schemas::ProtectionStage) {
        self.ctx.events.publish(ControlEvent::ProtectionStageChanged {
            account_id: self.account.account_id.clone(),
            trade_id: trade_id.to_string(),
            from,
            to,
            ts_utc: Utc::now(),
        });
    }

    // -----------------------------------------------------------------------
    // Close detection
    // -----------------------------------------------------------------------

    async fn detect_closes(&mut self, report: &mut TickReport) {
        let ids: Vec<String> = self.protection.positions().map(|p| p.trade_id.clone()).collect();
        for trade_id in ids {
            if self.unrecorded_entries.iter().any(|e| e.trade_id == trade_id) {
                continue;
            }
            let state = match self.ctx.gateway.get_trade_state(&trade_id).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(account_id = %self.account.account_id, %trade_id, error = %e, "trade state query failed");
                    continue;
                }
            };
            let (exit_price, realized_pl, closed_at) = match state {
                TradeState::Open => continue,
                TradeState::NotFound => {
                    error!(account_id = %self.account.account_id, %trade_id, "broker has no record of registered trade; verify manually");
                    continue;
                }
                TradeState::Closed {
                    exit_price,
                    realized_pl,
                    closed_at,
                } => (exit_price, realized_pl, closed_at),
            };

            let exit = TradeExit {
                trade_id: trade_id.clone(),
                account_id: self.account.account_id.clone(),
                exit_price,
                realized_pl,
                closed_at,
            };
            match self.ctx.ledger.record_trade_exit(&exit).await {
                Ok(state) => {
                    self.protection.unregister(&trade_id);
                    info!(account_id = %self.account.account_id, %trade_id, realized_pl, balance = state.current_balance, "position closed");
                    self.ctx.events.publish(ControlEvent::PositionClosed {
                        account_id: self.account.account_id.clone(),
                        trade_id: trade_id.clone(),
                        exit_price,
                        realized_pl,
                        ts_utc: closed_at,
                    });
                    self.report_breach(&state, closed_at.date_naive());
                    report.closed.push(trade_id);
                }
                Err(LedgerError::ExitWithoutEntry { .. }) => {
                    error!(account_id = %self.account.account_id, %trade_id, realized_pl, "closed trade has no ledger entry; exit held, verify manually");
                }
                Err(e) => {
                    error!(account_id = %self.account.account_id, %trade_id, error = %e, "exit not recorded; will retry");
                }
            }
        }
    }

    async fn record_unrecorded_entries(&mut self) {
        if self.unrecorded_entries.is_empty() {
            return;
        }
        let mut still_missing = Vec::new();
        for entry in std::mem::take(&mut self.unrecorded_entries) {
            match self.ctx.ledger.record_trade_entry(&entry).await {
                Ok(_) => {
                    info!(account_id = %entry.account_id, trade_id = %entry.trade_id, "late trade entry recorded");
                }
                Err(LedgerError::DuplicateTrade { .. }) => {
                    info!(account_id = %entry.account_id, trade_id = %entry.trade_id, "trade entry already in ledger");
                }
                Err(e) => {
                    warn!(account_id = %entry.account_id, trade_id = %entry.trade_id, error = %e, "trade entry still not recorded");
                    still_missing.push(entry);
                }
            }
        }
        self.unrecorded_entries = still_missing;
    }

    fn report_breach(&mut self, state: &AccountState, day: NaiveDate) {
        if self.breach_reported_on == Some(day) {
            return;
        }
        let Some(policy) = self.ctx.policies.get_policy(&self.account.strategy) else {
            return;
        };
        let gate = RiskGate::new(self.account.limits.clone(), &policy);
        if let Some(daily_drawdown) = gate.daily_drawdown_breached(state) {
            self.breach_reported_on = Some(day);
            warn!(account_id = %self.account.account_id, daily_drawdown, "daily drawdown limit breached");
            self.ctx.events.publish(ControlEvent::DailyDrawdownBreached {
                account_id: self.account.account_id.clone(),
                daily_drawdown,
                limit: self.account.limits.max_daily_drawdown,
                ts_utc: Utc::now(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Candidates
    // -----------------------------------------------------------------------

    async fn handle_candidate(&mut self, c: TradeCandidate, policy: Option<Arc<RiskPolicy>>) -> CandidateOutcome {
        let (units, score) = match self.evaluate(&c, policy).await {
            Ok(v) => v,
            Err(reason) => return self.deny(&c, reason),
        };

        let (Some(stop_loss), Some(take_profit)) = (c.stop_loss, c.take_profit) else {
            return self.deny(&c, DenialReason::Risk(Denial::MissingStopLoss));
        };

        info!(
            account_id = %c.account_id,
            strategy = %c.strategy,
            instrument = %c.instrument,
            direction = %c.direction,
            units,
            quality_score = score,
            "trade approved"
        );
        self.ctx.events.publish(ControlEvent::TradeApproved {
            account_id: c.account_id.clone(),
            strategy: c.strategy.clone(),
            instrument: c.instrument.clone(),
            direction: c.direction,
            units,
            quality_score: score,
            ts_utc: Utc::now(),
        });

        let client_order_id = format!("rcl-{}-{}", c.account_id, Uuid::new_v4().simple());
        let req = MarketOrderRequest::new(
            client_order_id.clone(),
            c.account_id.clone(),
            c.instrument.clone(),
            c.direction,
            units,
            stop_loss,
            take_profit,
        );

        match self.ctx.gateway.place_market_order(&req).await {
            OrderOutcome::Confirmed(fill) => {
                let entry = TradeEntry {
                    trade_id: fill.trade_id.clone(),
                    account_id: c.account_id.clone(),
                    strategy: c.strategy.clone(),
                    instrument: c.instrument.clone(),
                    direction: c.direction,
                    units: fill.units,
                    client_order_id,
                    quality_score: score,
                    entry_price: fill.fill_price,
                    stop_loss,
                    take_profit: Some(take_profit),
                    entered_at: Utc::now(),
                };
                if let Err(e) = self.ctx.ledger.record_trade_entry(&entry).await {
                    error!(account_id = %c.account_id, trade_id = %fill.trade_id, error = %e, "fill confirmed but entry not recorded; pausing new entries");
                    self.unrecorded_entries.push(entry.clone());
                }
                self.protection.register(Position::new(
                    fill.trade_id.clone(),
                    c.account_id.clone(),
                    c.instrument.clone(),
                    c.direction,
                    fill.units,
                    fill.fill_price,
                    stop_loss,
                    Some(take_profit),
                    entry.entered_at,
                ));
                self.ctx.events.publish(ControlEvent::PositionOpened {
                    account_id: c.account_id.clone(),
                    trade_id: fill.trade_id.clone(),
                    instrument: c.instrument.clone(),
                    direction: c.direction,
                    units: fill.units,
                    fill_price: fill.fill_price,
                    ts_utc: entry.entered_at,
                });
                CandidateOutcome::Opened {
                    trade_id: fill.trade_id,
                    units: fill.units,
                    fill_price: fill.fill_price,
                }
            }
            OrderOutcome::Rejected { reason } => self.deny(&c, DenialReason::BrokerRejected(reason)),
            OrderOutcome::Unknown { detail } => {
                error!(account_id = %c.account_id, %client_order_id, %detail, "order outcome unknown; verify manually");
                self.ctx.events.publish(ControlEvent::OrderOutcomeUnknown {
                    account_id: c.account_id.clone(),
                    instrument: c.instrument.clone(),
                    client_order_id: client_order_id.clone(),
                    detail: detail.clone(),
                    ts_utc: Utc::now(),
                });
                CandidateOutcome::Unknown { client_order_id, detail }
            }
        }
    }

    /// All pre-trade checks. Returns the order size and quality score.
    async fn evaluate(&mut self, c: &TradeCandidate, policy: Option<Arc<RiskPolicy>>) -> Result<(u64, u8), DenialReason> {
        if c.account_id != self.account.account_id {
            return Err(DenialReason::WrongAccount {
                expected: self.account.account_id.clone(),
                got: c.account_id.clone(),
            });
        }
        if self.validator.is_none() && c.instrument != self.account.instrument {
            return Err(DenialReason::WrongInstrument {
                expected: self.account.instrument.clone(),
                got: c.instrument.clone(),
            });
        }

        let quality = self.ctx.scorer.filter_trade(&QualityInput::from_candidate(c));
        if !quality.passes {
            return Err(DenialReason::Quality {
                passed: quality.passed_count(),
                required: self.ctx.scorer.config().min_passing_checks,
                summary: quality.failure_summary(),
            });
        }

        let emotional = check_for_emotional_trading(&c.rationale);
        if emotional.flagged {
            warn!(account_id = %c.account_id, terms = ?emotional.matched_terms, "emotional trading language in rationale");
            self.ctx.events.publish(ControlEvent::EmotionalTradingWarning {
                account_id: c.account_id.clone(),
                matched_terms: emotional.matched_terms,
                ts_utc: Utc::now(),
            });
        }

        if c.strategy != self.account.strategy {
            return Err(DenialReason::PolicyUnavailable(c.strategy.clone()));
        }
        let Some(policy) = policy else {
            return Err(DenialReason::PolicyUnavailable(c.strategy.clone()));
        };
        if !policy.enabled {
            return Err(DenialReason::PolicyDisabled(c.strategy.clone()));
        }
        if !self.unrecorded_entries.is_empty() {
            return Err(DenialReason::EntriesUnrecorded(self.unrecorded_entries.len()));
        }

        let state = match self.ctx.ledger.get_account_state(&c.account_id).await {
            Ok(Some(s)) => s.as_of(Utc::now().date_naive()),
            Ok(None) => return Err(DenialReason::AccountStateUnavailable("account not opened in ledger".to_string())),
            Err(e) => {
                error!(account_id = %c.account_id, error = %e, "account state read failed");
                return Err(DenialReason::AccountStateUnavailable(e.to_string()));
            }
        };

        let gate = RiskGate::new(self.account.limits.clone(), &policy);
        let open = self.protection.len();

        if let Some(validator) = &self.validator {
            // The size the gate would order; a mandate cap rejects it, never
            // shrinks it.
            let units = c
                .stop_loss
                .and_then(|stop| {
                    gate.calculate_position_size(state.current_balance, c.entry_price, stop, self.contract)
                        .ok()
                })
                .unwrap_or(self.contract.min_units);
            let req = MandateRequest {
                instrument: &c.instrument,
                direction: c.direction,
                units,
                entry_price: c.entry_price,
                stop_loss: c.stop_loss,
                take_profit: c.take_profit,
                open_positions: self.protection.positions_for(&c.instrument).count(),
                open_units: self.protection.open_units(&c.instrument),
            };
            if let MandateVerdict::Rejected(r) = validator.validate_trade(&req, c.generated_at) {
                return Err(DenialReason::Mandate(r));
            }
        }

        let stop_loss = c.stop_loss.ok_or(DenialReason::Risk(Denial::MissingStopLoss))?;
        let take_profit = c.take_profit.ok_or(DenialReason::Risk(Denial::MissingTakeProfit))?;
        let check = gate.validate_trade(
            &state,
            &TradeRequest {
                direction: c.direction,
                entry: c.entry_price,
                stop_loss,
                take_profit,
            },
            self.contract,
            open,
        );
        if !check.is_valid {
            let denial = check.reason.unwrap_or(Denial::Sizing {
                detail: "check failed without reason".to_string(),
            });
            return Err(DenialReason::Risk(denial));
        }

        Ok((check.position_size, quality.score))
    }

    fn deny(&self, c: &TradeCandidate, reason: DenialReason) -> CandidateOutcome {
        info!(
            account_id = %self.account.account_id,
            strategy = %c.strategy,
            instrument = %c.instrument,
            reason = %reason,
            "trade denied"
        );
        self.ctx.events.publish(ControlEvent::TradeDenied {
            account_id: self.account.account_id.clone(),
            strategy: c.strategy.clone(),
            instrument: c.instrument.clone(),
            direction: c.direction,
            reason: reason.to_string(),
            ts_utc: Utc::now(),
        });
        CandidateOutcome::Denied(reason)
    }

    async fn snapshot(&self) {
        match self.ctx.gateway.get_account_summary(&self.account.account_id).await {
            Ok(s) => {
                let snap = AccountSnapshot {
                    account_id: s.account_id,
                    balance: s.balance,
                    unrealized_pl: s.unrealized_pl,
                    open_trade_count: s.open_trade_count,
                    ts_utc: Utc::now(),
                };
                if let Err(e) = self.ctx.ledger.record_snapshot(&snap).await {
                    warn!(account_id = %self.account.account_id, error = %e, "snapshot not recorded");
                }
            }
            Err(e) => warn!(account_id = %self.account.account_id, error = %e, "account summary failed"),
        }
    }
}
