//! Small-holdings sweep
//!
//! Repeated event participation leaves dust: coin positions worth less than
//! the exchange's minimum sell value, which cannot be sold directly. The
//! sweep tops each one up with a small buy so the combined position clears
//! the floor, then sells the whole holding.

use crate::config::SweepSettings;
use crate::exchanges::{ExchangeClient, ExchangeError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

const SETTLE_DELAY: Duration = Duration::from_secs(2);
const INTER_COIN_DELAY: Duration = Duration::from_secs(1);

/// Sweep result for one account
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    /// Account the sweep ran on
    pub account_id: String,
    /// Coins topped up and sold
    pub swept: Vec<String>,
    /// Coins that could not be cleaned
    pub failed: Vec<String>,
}

/// Sweep one account's dust holdings
pub async fn sweep_account(
    account_id: &str,
    client: Arc<dyn ExchangeClient>,
    settings: &SweepSettings,
) -> SweepOutcome {
    let mut outcome = SweepOutcome {
        account_id: account_id.to_string(),
        swept: Vec::new(),
        failed: Vec::new(),
    };

    let balances = match client.get_all_balances().await {
        Ok(balances) => balances,
        Err(e) => {
            error!(account = account_id, error = %e, "sweep balance lookup failed");
            return outcome;
        }
    };

    let mut dust = Vec::new();
    for (currency, balance) in &balances {
        if currency == "KRW" || balance.free <= 0.0 {
            continue;
        }
        match client.get_last_price(currency).await {
            Ok(price) => {
                let value = balance.free * price;
                if value > 0.0 && value < settings.threshold_krw {
                    info!(
                        account = account_id,
                        coin = %currency,
                        value_krw = value,
                        "dust holding found"
                    );
                    dust.push(currency.clone());
                }
            }
            Err(e) => {
                warn!(account = account_id, coin = %currency, error = %e, "no price, skipping");
            }
        }
    }

    if dust.is_empty() {
        info!(account = account_id, "no dust holdings");
        return outcome;
    }

    for coin in dust {
        match sweep_coin(&client, &coin, settings).await {
            Ok(()) => {
                info!(account = account_id, coin = %coin, "dust swept");
                outcome.swept.push(coin);
            }
            Err(e) => {
                error!(account = account_id, coin = %coin, error = %e, "sweep failed");
                outcome.failed.push(coin);
            }
        }
        tokio::time::sleep(INTER_COIN_DELAY).await;
    }

    outcome
}

/// Top up one coin past the minimum sell value, then sell the full holding
async fn sweep_coin(
    client: &Arc<dyn ExchangeClient>,
    coin: &str,
    settings: &SweepSettings,
) -> Result<(), ExchangeError> {
    client.place_market_buy(coin, settings.top_up_krw).await?;
    tokio::time::sleep(SETTLE_DELAY).await;

    let balance = client.get_balance(coin).await?;
    if balance.free <= 0.0 {
        return Err(ExchangeError::Timeout(format!(
            "{} top-up not credited",
            coin
        )));
    }

    client.place_market_sell(coin, balance.free).await?;
    Ok(())
}

/// Sweep every account with bounded parallelism
pub async fn sweep_all(
    clients: &HashMap<String, Arc<dyn ExchangeClient>>,
    settings: &SweepSettings,
    max_concurrency: usize,
) -> Vec<SweepOutcome> {
    info!(accounts = clients.len(), "sweep started");

    let pool = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks: JoinSet<SweepOutcome> = JoinSet::new();

    for (account_id, client) in clients {
        let account_id = account_id.clone();
        let client = Arc::clone(client);
        let settings = settings.clone();
        let pool = Arc::clone(&pool);

        tasks.spawn(async move {
            let _slot = pool.acquire_owned().await;
            sweep_account(&account_id, client, &settings).await
        });
    }

    let mut outcomes = Vec::with_capacity(clients.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => error!(error = %e, "sweep task failed to join"),
        }
    }

    let swept: usize = outcomes.iter().map(|o| o.swept.len()).sum();
    info!(coins = swept, "sweep finished");
    outcomes
}
