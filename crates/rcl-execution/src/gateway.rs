//! BrokerGateway: the single choke-point for broker operations.
//!
//! # Invariants
//!
//! - Every broker call runs under `tokio::time::timeout`.
//! - Reads retry transient failures (timeout, transport) with exponential
//!   backoff, at most `read_retries` times. Rejections are not retried.
//! - `place_market_order` reaches the adapter exactly once per call. A fill
//!   is only `Confirmed` once the broker's own open-trade list shows it; a
//!   failed or timed-out submission is resolved by re-query, never by
//!   resubmission.
//! - `modify_stop_loss` is a single attempt. The protection engine proposes
//!   the same move again on the next tick.

use rcl_config::BrokerConfig;
use rcl_schemas::Quote;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use crate::{
    AccountSummary, BrokerAdapter, BrokerError, ConfirmedFill, MarketOrderRequest, OpenTrade,
    OrderOutcome, OrderStatus, TradeState,
};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub struct GatewaySettings {
    pub timeout: Duration,
    /// Retries after the first attempt, reads only.
    pub read_retries: usize,
    /// Delay before retry n is `retry_base_delay * 2^n`, capped at 5s.
    pub retry_base_delay: Duration,
}

impl From<&BrokerConfig> for GatewaySettings {
    fn from(cfg: &BrokerConfig) -> Self {
        Self {
            timeout: Duration::from_millis(cfg.timeout_ms),
            read_retries: cfg.read_retries,
            retry_base_delay: Duration::from_millis(cfg.retry_base_delay_ms),
        }
    }
}

#[derive(Clone)]
pub struct BrokerGateway {
    broker: Arc<dyn BrokerAdapter>,
    settings: GatewaySettings,
}

impl BrokerGateway {
    pub fn new(broker: Arc<dyn BrokerAdapter>, settings: GatewaySettings) -> Self {
        Self { broker, settings }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Reads (timed out, retried)
    // -----------------------------------------------------------------------

    pub async fn get_current_price(&self, instrument: &str) -> Result<Quote, BrokerError> {
        self.read("get_current_price", || self.broker.get_current_price(instrument))
            .await
    }

    pub async fn get_account_summary(&self, account_id: &str) -> Result<AccountSummary, BrokerError> {
        self.read("get_account_summary", || self.broker.get_account_summary(account_id))
            .await
    }

    pub async fn list_open_trades(&self, account_id: &str) -> Result<Vec<OpenTrade>, BrokerError> {
        self.read("list_open_trades", || self.broker.list_open_trades(account_id))
            .await
    }

    pub async fn get_trade_state(&self, trade_id: &str) -> Result<TradeState, BrokerError> {
        self.read("get_trade_state", || self.broker.get_trade_state(trade_id))
            .await
    }

    // -----------------------------------------------------------------------
    // Writes (timed out, never retried)
    // -----------------------------------------------------------------------

    pub async fn modify_stop_loss(&self, trade_id: &str, new_price: f64) -> Result<bool, BrokerError> {
        self.timed("modify_stop_loss", self.broker.modify_stop_loss(trade_id, new_price))
            .await
    }

    /// Submit once, then confirm the fill against the broker's open trades.
    pub async fn place_market_order(&self, req: &MarketOrderRequest) -> OrderOutcome {
        let submitted = self
            .timed("place_market_order", self.broker.place_market_order(req))
            .await;

        match submitted {
            Ok(result) => {
                if result.status == OrderStatus::Pending {
                    tracing::warn!(
                        client_order_id = %req.client_order_id,
                        order_id = %result.order_id,
                        "order accepted but not reported filled"
                    );
                }
                match self.find_fill(req, result.trade_id.as_deref()).await {
                    Ok(Some(trade)) => OrderOutcome::Confirmed(fill_from(Some(result.order_id), &trade)),
                    Ok(None) => OrderOutcome::Unknown {
                        detail: format!(
                            "broker acknowledged order {} but no open trade carries client order id {}",
                            result.order_id, req.client_order_id
                        ),
                    },
                    Err(e) => OrderOutcome::Unknown {
                        detail: format!("order {} sent; fill verification failed: {e}", result.order_id),
                    },
                }
            }
            Err(BrokerError::Rejected(reason)) => {
                tracing::info!(client_order_id = %req.client_order_id, %reason, "order rejected by broker");
                OrderOutcome::Rejected { reason }
            }
            Err(err) => {
                tracing::warn!(
                    client_order_id = %req.client_order_id,
                    error = %err,
                    "order outcome unknown; re-querying open trades"
                );
                match self.find_fill(req, None).await {
                    Ok(Some(trade)) => {
                        tracing::info!(
                            client_order_id = %req.client_order_id,
                            trade_id = %trade.trade_id,
                            "order found live after failed submission"
                        );
                        OrderOutcome::Confirmed(fill_from(None, &trade))
                    }
                    Ok(None) => OrderOutcome::Unknown {
                        detail: format!(
                            "{err}; no open trade found for client order id {}",
                            req.client_order_id
                        ),
                    },
                    Err(requery) => OrderOutcome::Unknown {
                        detail: format!("{err}; re-query failed: {requery}"),
                    },
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn find_fill(
        &self,
        req: &MarketOrderRequest,
        trade_id: Option<&str>,
    ) -> Result<Option<OpenTrade>, BrokerError> {
        let trades = self.list_open_trades(&req.account_id).await?;
        Ok(trades.into_iter().find(|t| {
            t.client_order_id.as_deref() == Some(req.client_order_id.as_str())
                || trade_id.is_some_and(|id| id == t.trade_id)
        }))
    }

    async fn timed<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, BrokerError>>,
    ) -> Result<T, BrokerError> {
        match tokio::time::timeout(self.settings.timeout, fut).await {
            Ok(r) => r,
            Err(_) => Err(BrokerError::Timeout {
                op,
                after_ms: self.settings.timeout.as_millis() as u64,
            }),
        }
    }

    async fn read<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, BrokerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BrokerError>>,
    {
        let base_ms = (self.settings.retry_base_delay.as_millis() as u64).max(1);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(base_ms)
            .max_delay(MAX_RETRY_DELAY)
            .take(self.settings.read_retries);

        RetryIf::spawn(
            strategy,
            || self.timed(op, call()),
            |e: &BrokerError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!(op, error = %e, "broker read failed; retrying");
                }
                retry
            },
        )
        .await
    }
}

fn fill_from(order_id: Option<String>, trade: &OpenTrade) -> ConfirmedFill {
    ConfirmedFill {
        order_id,
        trade_id: trade.trade_id.clone(),
        fill_price: trade.price,
        units: trade.units.unsigned_abs(),
    }
}
