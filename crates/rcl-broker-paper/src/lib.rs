//! Deterministic in-memory "paper" broker adapter.
//!
//! Design decisions:
//! - Ids derive from the client order id:
//!     - order: "paper:order:{client_order_id}"
//!     - trade: "paper:trade:{client_order_id}"
//! - Submitting a client order id that already exists returns the existing
//!   fill without opening a second trade.
//! - Market orders fill at the current quote (longs at the ask, shorts at the
//!   bid). Stops and targets are checked each time a quote is set; a hit
//!   closes the trade at the stop or target price.
//! - No randomness. Faults are injected explicitly and consumed in order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rcl_config::{AccountConfig, PaperBrokerConfig};
use rcl_execution::{
    AccountSummary, BrokerAdapter, BrokerError, MarketOrderRequest, OpenTrade, OrderResult,
    OrderStatus, TradeState,
};
use rcl_schemas::Quote;
use std::collections::BTreeMap;
use std::time::Duration;

/// One-shot fault for the next market order.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderFault {
    Reject(String),
    /// Open the trade, then stall for the given time before answering.
    HangAfterFill(Duration),
    /// Stall without opening anything.
    HangBeforeFill(Duration),
}

#[derive(Clone, Debug)]
struct PaperTrade {
    account_id: String,
    client_order_id: String,
    instrument: String,
    units: i64,
    entry_price: f64,
    stop_loss: f64,
    take_profit: f64,
    point_value: f64,
    closed: Option<Closed>,
}

#[derive(Clone, Copy, Debug)]
struct Closed {
    exit_price: f64,
    realized_pl: f64,
    closed_at: DateTime<Utc>,
}

impl PaperTrade {
    fn pnl_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.units as f64 * self.point_value
    }
}

#[derive(Debug, Default)]
struct State {
    quotes: BTreeMap<String, Quote>,
    point_values: BTreeMap<String, f64>,
    balances: BTreeMap<String, f64>,
    trades: BTreeMap<String, PaperTrade>,
    order_submissions: u64,
    stop_modifications: u64,
    read_failures: u32,
    read_delay: Option<Duration>,
    order_faults: Vec<OrderFault>,
    stop_faults: u32,
}

#[derive(Debug, Default)]
pub struct PaperBroker {
    state: Mutex<State>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed quotes from config and balances/point values from the accounts.
    pub fn from_config(paper: &PaperBrokerConfig, accounts: &[AccountConfig]) -> Self {
        let broker = Self::new();
        {
            let mut st = broker.state.lock();
            let now = Utc::now();
            for (instrument, q) in &paper.quotes {
                st.quotes.insert(
                    instrument.clone(),
                    Quote {
                        instrument: instrument.clone(),
                        bid: q.bid,
                        ask: q.ask,
                        ts_utc: now,
                    },
                );
            }
            for acct in accounts {
                st.balances.insert(acct.account_id.clone(), acct.initial_balance);
                st.point_values
                    .insert(acct.instrument.clone(), acct.contract().point_value);
            }
        }
        broker
    }

    pub fn open_account(&self, account_id: impl Into<String>, balance: f64) {
        self.state.lock().balances.insert(account_id.into(), balance);
    }

    pub fn set_point_value(&self, instrument: impl Into<String>, point_value: f64) {
        self.state.lock().point_values.insert(instrument.into(), point_value);
    }

    pub fn set_quote(&self, instrument: &str, bid: f64, ask: f64) {
        self.set_quote_at(instrument, bid, ask, Utc::now());
    }

    /// Set the quote and settle any stop or target it crosses.
    pub fn set_quote_at(&self, instrument: &str, bid: f64, ask: f64, ts_utc: DateTime<Utc>) {
        let mut st = self.state.lock();
        st.quotes.insert(
            instrument.to_string(),
            Quote {
                instrument: instrument.to_string(),
                bid,
                ask,
                ts_utc,
            },
        );

        let mut settled = Vec::new();
        for (trade_id, t) in st.trades.iter_mut() {
            if t.closed.is_some() || t.instrument != instrument {
                continue;
            }
            let exit = if t.units > 0 {
                if bid <= t.stop_loss {
                    Some(t.stop_loss)
                } else if bid >= t.take_profit {
                    Some(t.take_profit)
                } else {
                    None
                }
            } else if ask >= t.stop_loss {
                Some(t.stop_loss)
            } else if ask <= t.take_profit {
                Some(t.take_profit)
            } else {
                None
            };
            if let Some(exit_price) = exit {
                let realized_pl = t.pnl_at(exit_price);
                t.closed = Some(Closed {
                    exit_price,
                    realized_pl,
                    closed_at: ts_utc,
                });
                settled.push((trade_id.clone(), t.account_id.clone(), realized_pl));
            }
        }
        for (trade_id, account_id, pl) in settled {
            *st.balances.entry(account_id).or_insert(0.0) += pl;
            tracing::debug!(%trade_id, realized_pl = pl, "paper trade closed by quote");
        }
    }

    /// Close an open trade at `price`. Returns false if it is not open.
    pub fn close_trade(&self, trade_id: &str, price: f64) -> bool {
        let mut st = self.state.lock();
        let closed_at = Utc::now();
        let Some(t) = st.trades.get_mut(trade_id) else {
            return false;
        };
        if t.closed.is_some() {
            return false;
        }
        let realized_pl = t.pnl_at(price);
        t.closed = Some(Closed {
            exit_price: price,
            realized_pl,
            closed_at,
        });
        let account_id = t.account_id.clone();
        *st.balances.entry(account_id).or_insert(0.0) += realized_pl;
        true
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    /// The next `n` reads fail with a transport error.
    pub fn fail_next_reads(&self, n: u32) {
        self.state.lock().read_failures = n;
    }

    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state.lock().read_delay = delay;
    }

    pub fn push_order_fault(&self, fault: OrderFault) {
        self.state.lock().order_faults.push(fault);
    }

    /// The next `n` stop modifications fail with a transport error.
    pub fn fail_next_stop_modifications(&self, n: u32) {
        self.state.lock().stop_faults = n;
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn order_submissions(&self) -> u64 {
        self.state.lock().order_submissions
    }

    pub fn stop_modifications(&self) -> u64 {
        self.state.lock().stop_modifications
    }

    pub fn stop_of(&self, trade_id: &str) -> Option<f64> {
        self.state.lock().trades.get(trade_id).map(|t| t.stop_loss)
    }

    pub fn balance(&self, account_id: &str) -> Option<f64> {
        self.state.lock().balances.get(account_id).copied()
    }

    pub fn trade_id_for(client_order_id: &str) -> String {
        format!("paper:trade:{client_order_id}")
    }

    fn take_read_fault(&self) -> (Result<(), BrokerError>, Option<Duration>) {
        let mut st = self.state.lock();
        let delay = st.read_delay;
        if st.read_failures > 0 {
            st.read_failures -= 1;
            return (Err(BrokerError::Transport("paper: injected read failure".to_string())), delay);
        }
        (Ok(()), delay)
    }

    async fn read_gate(&self) -> Result<(), BrokerError> {
        let (fault, delay) = self.take_read_fault();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        fault
    }

    fn open(&self, req: &MarketOrderRequest) -> Result<OrderResult, BrokerError> {
        let mut st = self.state.lock();
        let trade_id = Self::trade_id_for(&req.client_order_id);
        let order_id = format!("paper:order:{}", req.client_order_id);

        if let Some(existing) = st.trades.get(&trade_id) {
            return Ok(OrderResult {
                order_id,
                trade_id: Some(trade_id),
                fill_price: Some(existing.entry_price),
                status: OrderStatus::Filled,
            });
        }
        if !st.balances.contains_key(&req.account_id) {
            return Err(BrokerError::Rejected(format!("paper: unknown account {}", req.account_id)));
        }
        if req.units == 0 {
            return Err(BrokerError::Rejected("paper: zero units".to_string()));
        }
        let Some(quote) = st.quotes.get(&req.instrument) else {
            return Err(BrokerError::Rejected(format!("paper: no quote for {}", req.instrument)));
        };
        let fill = if req.units > 0 { quote.ask } else { quote.bid };
        let sane = if req.units > 0 {
            req.stop_loss < fill && fill < req.take_profit
        } else {
            req.take_profit < fill && fill < req.stop_loss
        };
        if !sane {
            return Err(BrokerError::Rejected(format!(
                "paper: protective levels invalid for fill {fill} (stop {}, target {})",
                req.stop_loss, req.take_profit
            )));
        }

        let point_value = st.point_values.get(&req.instrument).copied().unwrap_or(1.0);
        st.trades.insert(
            trade_id.clone(),
            PaperTrade {
                account_id: req.account_id.clone(),
                client_order_id: req.client_order_id.clone(),
                instrument: req.instrument.clone(),
                units: req.units,
                entry_price: fill,
                stop_loss: req.stop_loss,
                take_profit: req.take_profit,
                point_value,
                closed: None,
            },
        );
        Ok(OrderResult {
            order_id,
            trade_id: Some(trade_id),
            fill_price: Some(fill),
            status: OrderStatus::Filled,
        })
    }
}

#[async_trait]
impl BrokerAdapter for PaperBroker {
    async fn get_current_price(&self, instrument: &str) -> Result<Quote, BrokerError> {
        self.read_gate().await?;
        self.state
            .lock()
            .quotes
            .get(instrument)
            .cloned()
            .ok_or_else(|| BrokerError::Rejected(format!("paper: no quote for {instrument}")))
    }

    async fn place_market_order(&self, req: &MarketOrderRequest) -> Result<OrderResult, BrokerError> {
        let fault = {
            let mut st = self.state.lock();
            st.order_submissions += 1;
            if st.order_faults.is_empty() {
                None
            } else {
                Some(st.order_faults.remove(0))
            }
        };
        match fault {
            None => self.open(req),
            Some(OrderFault::Reject(reason)) => Err(BrokerError::Rejected(reason)),
            Some(OrderFault::HangAfterFill(d)) => {
                let result = self.open(req);
                tokio::time::sleep(d).await;
                result
            }
            Some(OrderFault::HangBeforeFill(d)) => {
                tokio::time::sleep(d).await;
                Err(BrokerError::Transport("paper: order stalled".to_string()))
            }
        }
    }

    async fn get_account_summary(&self, account_id: &str) -> Result<AccountSummary, BrokerError> {
        self.read_gate().await?;
        let st = self.state.lock();
        let balance = *st
            .balances
            .get(account_id)
            .ok_or_else(|| BrokerError::Rejected(format!("paper: unknown account {account_id}")))?;
        let mut unrealized_pl = 0.0;
        let mut open_trade_count = 0;
        for t in st.trades.values() {
            if t.account_id != account_id || t.closed.is_some() {
                continue;
            }
            open_trade_count += 1;
            if let Some(q) = st.quotes.get(&t.instrument) {
                let mark = if t.units > 0 { q.bid } else { q.ask };
                unrealized_pl += t.pnl_at(mark);
            }
        }
        Ok(AccountSummary {
            account_id: account_id.to_string(),
            balance,
            unrealized_pl,
            open_trade_count,
        })
    }

    async fn modify_stop_loss(&self, trade_id: &str, new_price: f64) -> Result<bool, BrokerError> {
        let mut st = self.state.lock();
        if st.stop_faults > 0 {
            st.stop_faults -= 1;
            return Err(BrokerError::Transport("paper: injected stop failure".to_string()));
        }
        let applied = match st.trades.get_mut(trade_id) {
            Some(t) if t.closed.is_none() => {
                t.stop_loss = new_price;
                true
            }
            _ => false,
        };
        if applied {
            st.stop_modifications += 1;
        }
        Ok(applied)
    }

    async fn list_open_trades(&self, account_id: &str) -> Result<Vec<OpenTrade>, BrokerError> {
        self.read_gate().await?;
        let st = self.state.lock();
        Ok(st
            .trades
            .iter()
            .filter(|(_, t)| t.account_id == account_id && t.closed.is_none())
            .map(|(id, t)| {
                let mark = st
                    .quotes
                    .get(&t.instrument)
                    .map(|q| if t.units > 0 { q.bid } else { q.ask })
                    .unwrap_or(t.entry_price);
                OpenTrade {
                    trade_id: id.clone(),
                    client_order_id: Some(t.client_order_id.clone()),
                    instrument: t.instrument.clone(),
                    units: t.units,
                    price: t.entry_price,
                    stop_loss: Some(t.stop_loss),
                    take_profit: Some(t.take_profit),
                    unrealized_pl: t.pnl_at(mark),
                }
            })
            .collect())
    }

    async fn get_trade_state(&self, trade_id: &str) -> Result<TradeState, BrokerError> {
        self.read_gate().await?;
        let st = self.state.lock();
        Ok(match st.trades.get(trade_id) {
            None => TradeState::NotFound,
            Some(t) => match t.closed {
                None => TradeState::Open,
                Some(c) => TradeState::Closed {
                    exit_price: c.exit_price,
                    realized_pl: c.realized_pl,
                    closed_at: c.closed_at,
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcl_schemas::Direction;

    fn broker() -> PaperBroker {
        let b = PaperBroker::new();
        b.open_account("acct", 10_000.0);
        b.set_quote("EUR_USD", 1.1000, 1.1002);
        b
    }

    fn long(client_order_id: &str) -> MarketOrderRequest {
        MarketOrderRequest::new(client_order_id, "acct", "EUR_USD", Direction::Long, 10_000, 1.0950, 1.1100)
    }

    #[tokio::test]
    async fn long_fills_at_ask_and_is_idempotent_per_client_id() {
        let b = broker();
        let first = b.place_market_order(&long("c-1")).await.unwrap();
        let again = b.place_market_order(&long("c-1")).await.unwrap();
        assert_eq!(first.fill_price, Some(1.1002));
        assert_eq!(first, again);
        assert_eq!(b.list_open_trades("acct").await.unwrap().len(), 1);
        assert_eq!(b.order_submissions(), 2);
    }

    #[tokio::test]
    async fn stop_hit_settles_balance() {
        let b = broker();
        let r = b.place_market_order(&long("c-1")).await.unwrap();
        let trade_id = r.trade_id.unwrap();

        b.set_quote("EUR_USD", 1.0950, 1.0952);
        match b.get_trade_state(&trade_id).await.unwrap() {
            TradeState::Closed { exit_price, realized_pl, .. } => {
                assert_eq!(exit_price, 1.0950);
                assert!((realized_pl - (1.0950 - 1.1002) * 10_000.0).abs() < 1e-6);
            }
            other => panic!("expected closed, got {other:?}"),
        }
        let bal = b.balance("acct").unwrap();
        assert!((bal - (10_000.0 - 52.0)).abs() < 1e-6);
        assert!(!b.modify_stop_loss(&trade_id, 1.1).await.unwrap());
    }

    #[tokio::test]
    async fn inverted_levels_are_rejected() {
        let b = broker();
        let bad = MarketOrderRequest::new("c-2", "acct", "EUR_USD", Direction::Short, 1_000, 1.0900, 1.1100);
        assert!(matches!(b.place_market_order(&bad).await, Err(BrokerError::Rejected(_))));
        assert_eq!(b.get_trade_state("paper:trade:c-2").await.unwrap(), TradeState::NotFound);
    }
}
