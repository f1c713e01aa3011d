//! Run plan and trade job data model
//!
//! A [`RunPlan`] is built once from configuration before the first cycle and
//! is read-only afterwards: the scheduler owns it, and the jobs inside are
//! shared read-only with the executors.

use crate::config::RunnerConfig;
use crate::exchanges::{Exchange, ExchangeError};
use crate::{Result, RunnerError};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One exchange account, immutable for the duration of a run
#[derive(Clone)]
pub struct Account {
    /// Stable identifier (e.g. "bithumb_1")
    pub id: String,
    /// Exchange this account belongs to
    pub exchange: Exchange,
    /// API key / access key
    pub api_key: String,
    /// API secret
    pub api_secret: String,
}

impl Account {
    /// Create an account record
    pub fn new(id: &str, exchange: Exchange, api_key: &str, api_secret: &str) -> Self {
        Self {
            id: id.to_string(),
            exchange,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }
}

// Credentials stay out of logs
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("exchange", &self.exchange)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// One (account, symbol) trade unit within a cycle
#[derive(Debug, Clone)]
pub struct Job {
    /// Account executing the trade
    pub account: Arc<Account>,
    /// Base currency symbol (e.g. "BTC")
    pub symbol: String,
    /// Quote-currency amount to spend on the buy
    pub quote_amount: f64,
    /// Hold time between the buy fill and the sell
    pub wait: Duration,
}

impl Job {
    /// "account/SYMBOL" label used in logs and reports
    pub fn label(&self) -> String {
        format!("{}/{}", self.account.id, self.symbol)
    }
}

/// Backoff progression between retry attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// Delay grows linearly with the attempt number
    Linear(Duration),
}

/// Retry policy applied by the trade job executor
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts per job, including the first
    pub max_attempts: u32,
    /// Backoff between attempts
    pub backoff: Backoff,
    /// Backoff multiplier applied when the exchange is in maintenance
    pub maintenance_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(2)),
            maintenance_multiplier: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay to apply after the given failed attempt (1-based)
    pub fn delay(&self, attempt: u32, error: &ExchangeError) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Linear(d) => d * attempt,
        };
        if matches!(error, ExchangeError::Maintenance(_)) {
            base * self.maintenance_multiplier
        } else {
            base
        }
    }
}

/// Immutable description of a full run
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Jobs to execute each cycle, one per (account, symbol)
    pub jobs: Vec<Job>,
    /// Worker-pool bound for a batch
    pub max_concurrency: usize,
    /// Simultaneous in-flight order submissions allowed per account
    pub per_account_limit: usize,
    /// Retry policy for every job
    pub retry: RetryPolicy,
    /// Number of cycles to run
    pub cycle_count: u32,
    /// Pause between consecutive cycles
    pub cycle_interval: Duration,
}

impl RunPlan {
    /// Build the plan from configuration and discovered accounts.
    ///
    /// The only fatal failure point of a run: zero accounts or zero symbols
    /// means there is nothing to do.
    pub fn build(config: &RunnerConfig, accounts: Vec<Account>) -> Result<Self> {
        if accounts.is_empty() {
            return Err(RunnerError::Plan("no accounts configured".to_string()).into());
        }
        if config.trading.symbols.is_empty() {
            return Err(RunnerError::Plan("no symbols configured".to_string()).into());
        }

        let accounts: Vec<Arc<Account>> = accounts.into_iter().map(Arc::new).collect();
        let wait = Duration::from_secs(config.trading.wait_secs);

        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(accounts.len() * config.trading.symbols.len());
        for account in &accounts {
            for symbol in &config.trading.symbols {
                let symbol = symbol.to_uppercase();
                if !seen.insert((account.id.clone(), symbol.clone())) {
                    continue; // duplicate (account, symbol) pairs collapse
                }
                jobs.push(Job {
                    account: Arc::clone(account),
                    symbol,
                    quote_amount: config.trading.trade_amount_krw,
                    wait,
                });
            }
        }

        Ok(Self {
            jobs,
            max_concurrency: config.execution.max_concurrency,
            per_account_limit: config.execution.per_account_concurrency,
            retry: config.retry_policy()?,
            cycle_count: config.schedule.cycles,
            cycle_interval: Duration::from_secs(config.schedule.cycle_interval_secs),
        })
    }
}
