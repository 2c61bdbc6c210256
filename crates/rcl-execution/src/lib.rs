//! rcl-execution
//!
//! Broker boundary for the control layer.
//!
//! - [`BrokerAdapter`]: what a broker must provide.
//! - [`BrokerGateway`]: the single path to the broker. Every call is timed
//!   out; reads retry with bounded exponential backoff; market orders are
//!   sent exactly once and their fill is re-verified against the broker's own
//!   trade list.

mod adapter;
mod gateway;
mod types;

pub use adapter::BrokerAdapter;
pub use gateway::{BrokerGateway, GatewaySettings};
pub use types::{
    AccountSummary, BrokerError, ConfirmedFill, MarketOrderRequest, OpenTrade, OrderOutcome,
    OrderResult, OrderStatus, TradeState,
};
