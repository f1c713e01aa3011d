//! Exchange client implementations

pub mod bithumb;
pub mod traits;
pub mod upbit;

pub use bithumb::BithumbClient;
pub use traits::*;
pub use upbit::UpbitClient;

use crate::plan::Account;
use crate::RunnerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Bithumb exchange
    Bithumb,
    /// Upbit exchange
    Upbit,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Bithumb => write!(f, "bithumb"),
            Exchange::Upbit => write!(f, "upbit"),
        }
    }
}

impl std::str::FromStr for Exchange {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bithumb" => Ok(Exchange::Bithumb),
            "upbit" => Ok(Exchange::Upbit),
            _ => Err(RunnerError::Config(format!("Unknown exchange: {}", s))),
        }
    }
}

/// Map a reqwest transport failure onto the error taxonomy
pub(crate) fn transport_error(err: reqwest::Error) -> ExchangeError {
    if err.is_timeout() {
        ExchangeError::Timeout(err.to_string())
    } else {
        ExchangeError::Network(err.to_string())
    }
}

/// Factory for creating exchange clients from account credentials
pub struct ClientFactory;

impl ClientFactory {
    /// Create a client bound to the given account's credentials
    pub fn create(account: &Account) -> Arc<dyn ExchangeClient> {
        match account.exchange {
            Exchange::Bithumb => {
                Arc::new(BithumbClient::new(&account.api_key, &account.api_secret))
            }
            Exchange::Upbit => Arc::new(UpbitClient::new(&account.api_key, &account.api_secret)),
        }
    }
}
