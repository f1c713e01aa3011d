//! Exchange client trait and common wire types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Exchange;

/// Errors surfaced by exchange clients.
///
/// The retryability of each kind drives the executor's retry policy:
/// credential and balance problems terminate a job immediately, while
/// transport-level failures and maintenance windows are worth re-attempting.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeError {
    /// Invalid or unauthorized API credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Account balance too low for the requested order
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Order amount below the exchange's minimum order value
    #[error("amount below exchange minimum: {0}")]
    MinimumAmount(String),

    /// Transport-level failure (connection reset, DNS, TLS, 5xx)
    #[error("network error: {0}")]
    Network(String),

    /// Request deadline exceeded
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Exchange is in a maintenance window
    #[error("exchange under maintenance: {0}")]
    Maintenance(String),
}

impl ExchangeError {
    /// Whether re-attempting the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::Network(_) | ExchangeError::Timeout(_) | ExchangeError::Maintenance(_)
        )
    }

    /// Short machine-readable label for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Auth(_) => "auth",
            ExchangeError::InsufficientBalance(_) => "insufficient_balance",
            ExchangeError::MinimumAmount(_) => "minimum_amount",
            ExchangeError::Network(_) => "network",
            ExchangeError::Timeout(_) => "timeout",
            ExchangeError::Maintenance(_) => "maintenance",
        }
    }
}

/// Per-currency balance information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Balance {
    /// Currency symbol (e.g. "KRW", "BTC")
    pub currency: String,
    /// Available balance
    pub free: f64,
    /// Balance locked in open orders
    pub locked: f64,
}

impl Balance {
    /// Total balance (free + locked)
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    /// Market buy for a quote-currency amount
    Buy,
    /// Market sell of a base-currency quantity
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Acknowledgement returned by the exchange for a submitted market order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Exchange-assigned order id
    pub order_id: String,
    /// Trading symbol (base currency, e.g. "BTC")
    pub symbol: String,
    /// Order side
    pub side: OrderSide,
    /// Quote amount for buys, base quantity for sells
    pub amount: f64,
    /// Submission timestamp (unix seconds)
    pub timestamp: i64,
}

/// Capability interface for a single exchange account.
///
/// One client instance wraps one account's credentials; the orchestration
/// layer owns the mapping from accounts to clients and serializes order
/// submissions per account where the exchange requires it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Which exchange this client talks to
    fn exchange(&self) -> Exchange;

    /// Minimum market-order value in quote currency (KRW)
    fn min_order_quote(&self) -> f64;

    /// Fetch the balance of a single currency
    async fn get_balance(&self, currency: &str) -> Result<Balance, ExchangeError>;

    /// Fetch balances for all currencies with a non-zero total
    async fn get_all_balances(&self) -> Result<HashMap<String, Balance>, ExchangeError>;

    /// Submit a market buy for `quote_amount` of quote currency
    async fn place_market_buy(
        &self,
        symbol: &str,
        quote_amount: f64,
    ) -> Result<OrderReceipt, ExchangeError>;

    /// Submit a market sell of `base_quantity` units of the base currency
    async fn place_market_sell(
        &self,
        symbol: &str,
        base_quantity: f64,
    ) -> Result<OrderReceipt, ExchangeError>;

    /// Quantity of `symbol` credited by the given buy, polling for settlement
    async fn get_filled_quantity(
        &self,
        symbol: &str,
        receipt: &OrderReceipt,
    ) -> Result<f64, ExchangeError>;

    /// Last traded price of `symbol` in quote currency
    async fn get_last_price(&self, symbol: &str) -> Result<f64, ExchangeError>;
}
