//! Configuration management module

pub mod accounts;

pub use accounts::discover_accounts;

use crate::plan::{Backoff, RetryPolicy};
use crate::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for an event run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// What to trade and how much
    pub trading: TradingConfig,
    /// How often and how many times to repeat
    pub schedule: ScheduleConfig,
    /// Concurrency and retry settings
    pub execution: ExecutionConfig,
    /// Small-holdings sweep settings
    pub sweep: SweepSettings,
}

/// Trade parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Coin symbols to trade each cycle (e.g. ["BTC", "XRP"])
    pub symbols: Vec<String>,
    /// Quote amount per buy, in KRW
    pub trade_amount_krw: f64,
    /// Hold time between buy fill and sell, in seconds
    pub wait_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC".to_string()],
            trade_amount_krw: 5_500.0,
            wait_secs: 2,
        }
    }
}

/// Cycle schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Number of cycles (event days); 1 runs the batch once
    pub cycles: u32,
    /// Pause between cycles, in seconds
    pub cycle_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycles: 1,
            cycle_interval_secs: 24 * 60 * 60,
        }
    }
}

/// Concurrency and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Worker-pool bound for a batch
    pub max_concurrency: usize,
    /// In-flight order submissions allowed per account (1 serializes)
    pub per_account_concurrency: usize,
    /// Attempts per job, including the first
    pub max_retry_attempts: u32,
    /// Base backoff between attempts, in seconds
    pub retry_backoff_secs: u64,
    /// Backoff progression: "fixed" or "linear"
    pub backoff: String,
    /// Backoff multiplier while the exchange is in maintenance
    pub maintenance_backoff_multiplier: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            per_account_concurrency: 1,
            max_retry_attempts: 3,
            retry_backoff_secs: 2,
            backoff: "fixed".to_string(),
            maintenance_backoff_multiplier: 5,
        }
    }
}

/// Small-holdings sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Run the sweep once all cycles have completed
    pub enabled: bool,
    /// Holdings valued below this are swept, in KRW
    pub threshold_krw: f64,
    /// Top-up buy amount per swept coin, in KRW
    pub top_up_krw: f64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_krw: 5_000.0,
            top_up_krw: 5_500.0,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RunnerError::Config(format!("Failed to read config file: {}", e)))?;

        let config: RunnerConfig = toml::from_str(&content)
            .map_err(|e| RunnerError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.trading.symbols.is_empty() {
            return Err(RunnerError::Config("symbol list cannot be empty".to_string()).into());
        }
        if self.trading.trade_amount_krw <= 0.0 {
            return Err(RunnerError::Config("trade amount must be positive".to_string()).into());
        }
        if self.schedule.cycles == 0 {
            return Err(RunnerError::Config("cycles must be at least 1".to_string()).into());
        }
        if self.schedule.cycles > 1 && self.schedule.cycle_interval_secs == 0 {
            return Err(
                RunnerError::Config("cycle interval required for multi-day runs".to_string())
                    .into(),
            );
        }
        if self.execution.max_concurrency == 0 {
            return Err(RunnerError::Config("max concurrency must be at least 1".to_string()).into());
        }
        if self.execution.per_account_concurrency == 0 {
            return Err(
                RunnerError::Config("per-account concurrency must be at least 1".to_string())
                    .into(),
            );
        }
        if self.execution.max_retry_attempts == 0 {
            return Err(RunnerError::Config("retry attempts must be at least 1".to_string()).into());
        }
        self.retry_policy()?;

        if self.sweep.enabled && self.sweep.top_up_krw <= self.sweep.threshold_krw {
            return Err(RunnerError::Config(
                "sweep top-up must exceed the sweep threshold".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Retry policy derived from the execution section
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let base = Duration::from_secs(self.execution.retry_backoff_secs);
        let backoff = match self.execution.backoff.to_lowercase().as_str() {
            "fixed" => Backoff::Fixed(base),
            "linear" => Backoff::Linear(base),
            other => {
                return Err(RunnerError::Config(format!(
                    "unknown backoff kind: {} (expected \"fixed\" or \"linear\")",
                    other
                ))
                .into())
            }
        };

        Ok(RetryPolicy {
            max_attempts: self.execution.max_retry_attempts,
            backoff,
            maintenance_multiplier: self.execution.maintenance_backoff_multiplier,
        })
    }
}
