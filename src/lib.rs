//! Airdrop Event Runner
//!
//! Automates buy-then-sell "airdrop event" participation across multiple
//! exchange accounts and coin symbols. Each (account, symbol) pair runs as an
//! independent trade job with retry; batches execute under bounded parallelism
//! and repeat on a fixed schedule for the duration of the event window.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod exchanges;
pub mod plan;
pub mod report;
pub mod trading;
pub mod utils;

// Re-export commonly used types
pub use config::RunnerConfig;
pub use exchanges::{Exchange, ExchangeClient, ExchangeError};
pub use plan::{Account, Job, RetryPolicy, RunPlan};
pub use report::{CycleSummary, JobResult, RunSummary};
pub use trading::{CycleScheduler, Orchestrator, StopSignal};

/// Result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

/// Fatal errors raised while preparing a run
#[derive(thiserror::Error, Debug)]
pub enum RunnerError {
    /// Configuration file or value error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Account credential discovery error
    #[error("Credential error: {0}")]
    Credentials(String),

    /// Run plan could not be constructed
    #[error("Plan error: {0}")]
    Plan(String),
}

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
