use async_trait::async_trait;
use rcl_schemas::Quote;

use crate::{AccountSummary, BrokerError, MarketOrderRequest, OpenTrade, OrderResult, TradeState};

/// The broker boundary. Implementations talk to one broker; they do not
/// retry or time out on their own. [`BrokerGateway`](crate::BrokerGateway)
/// owns both.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn get_current_price(&self, instrument: &str) -> Result<Quote, BrokerError>;

    async fn place_market_order(&self, req: &MarketOrderRequest) -> Result<OrderResult, BrokerError>;

    async fn get_account_summary(&self, account_id: &str) -> Result<AccountSummary, BrokerError>;

    /// `Ok(false)` means the broker answered but did not apply the change.
    async fn modify_stop_loss(&self, trade_id: &str, new_price: f64) -> Result<bool, BrokerError>;

    async fn list_open_trades(&self, account_id: &str) -> Result<Vec<OpenTrade>, BrokerError>;

    async fn get_trade_state(&self, trade_id: &str) -> Result<TradeState, BrokerError>;
}
