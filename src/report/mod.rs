//! Result aggregation
//!
//! Pure reductions from job outcomes into per-cycle and whole-run summaries.
//! Everything here is `Serialize` so the presentation layer can render or
//! persist a report; nothing here performs I/O.

use crate::exchanges::{Exchange, ExchangeError, OrderReceipt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Buy and sell both completed
    Success,
    /// Job failed after exhausting retries, or failed non-retryably
    Failure,
}

/// Why a job ended in failure
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobError {
    /// The exchange rejected or failed an operation
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Stop was requested before the job started
    #[error("cancelled before start")]
    Cancelled,
}

impl JobError {
    /// Short machine-readable label for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Exchange(e) => e.kind(),
            JobError::Cancelled => "cancelled",
        }
    }
}

/// Terminal outcome of one job within one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Account that executed the job
    pub account_id: String,
    /// Exchange the account belongs to
    pub exchange: Exchange,
    /// Traded symbol
    pub symbol: String,
    /// Final status
    pub status: JobStatus,
    /// Failure cause, when status is Failure
    pub error: Option<JobError>,
    /// Attempts consumed, including the successful one
    pub attempts: u32,
    /// Wall-clock duration of the job in seconds
    pub elapsed_secs: f64,
    /// Buy acknowledgement, when the buy was submitted successfully
    pub buy: Option<OrderReceipt>,
    /// Sell acknowledgement, when the sell was submitted successfully
    pub sell: Option<OrderReceipt>,
    /// Base quantity credited by the buy, when known
    pub filled_quantity: Option<f64>,
}

impl JobResult {
    /// Whether the job succeeded
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Success/failure counts for one symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolOutcome {
    /// Successful jobs
    pub success: u32,
    /// Failed jobs
    pub failure: u32,
}

/// Aggregated outcome of one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Zero-based cycle index
    pub cycle: u32,
    /// Jobs in the batch
    pub total: u32,
    /// Successful jobs
    pub success: u32,
    /// Failed jobs
    pub failure: u32,
    /// Per-symbol breakdown, across all accounts
    pub by_symbol: BTreeMap<String, SymbolOutcome>,
    /// Per-job detail
    pub results: Vec<JobResult>,
}

/// Aggregated outcome of the whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of cycles executed
    pub cycle_count: u32,
    /// Jobs attempted across all cycles
    pub total: u32,
    /// Successful jobs across all cycles
    pub success: u32,
    /// Failed jobs across all cycles
    pub failure: u32,
    /// Per-symbol breakdown, across all accounts and cycles
    pub by_symbol: BTreeMap<String, SymbolOutcome>,
    /// Per-cycle detail
    pub cycles: Vec<CycleSummary>,
}

/// Reduce one cycle's job results into a summary
pub fn summarize(cycle: u32, results: Vec<JobResult>) -> CycleSummary {
    let mut by_symbol: BTreeMap<String, SymbolOutcome> = BTreeMap::new();
    let mut success = 0u32;
    let mut failure = 0u32;

    for result in &results {
        let outcome = by_symbol.entry(result.symbol.clone()).or_default();
        if result.is_success() {
            success += 1;
            outcome.success += 1;
        } else {
            failure += 1;
            outcome.failure += 1;
        }
    }

    CycleSummary {
        cycle,
        total: results.len() as u32,
        success,
        failure,
        by_symbol,
        results,
    }
}

/// Reduce all cycle summaries into the run summary
pub fn summarize_run(cycles: &[CycleSummary]) -> RunSummary {
    let mut by_symbol: BTreeMap<String, SymbolOutcome> = BTreeMap::new();
    let mut total = 0u32;
    let mut success = 0u32;
    let mut failure = 0u32;

    for cycle in cycles {
        total += cycle.total;
        success += cycle.success;
        failure += cycle.failure;
        for (symbol, outcome) in &cycle.by_symbol {
            let entry = by_symbol.entry(symbol.clone()).or_default();
            entry.success += outcome.success;
            entry.failure += outcome.failure;
        }
    }

    RunSummary {
        cycle_count: cycles.len() as u32,
        total,
        success,
        failure,
        by_symbol,
        cycles: cycles.to_vec(),
    }
}
