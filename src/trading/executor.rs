//! Trade job executor
//!
//! Runs one (account, symbol) job to completion: market buy, hold, market
//! sell, with retry for transient failures. Retries resume at the furthest
//! successfully-reached stage, so a filled buy is never repeated.

use crate::exchanges::{ExchangeClient, ExchangeError, OrderReceipt};
use crate::plan::{Job, RetryPolicy};
use crate::report::{JobError, JobResult, JobStatus};
use crate::trading::StopSignal;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Stage reached by the current attempt of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    /// Nothing submitted yet
    Pending,
    /// Buy order sent to the exchange
    BuySubmitted,
    /// Buy acknowledged and credited
    BuyFilled,
    /// Holding through the configured wait
    Waiting,
    /// Sell order sent to the exchange
    SellSubmitted,
    /// Sell acknowledged; the job is done
    SellFilled,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Pending => "pending",
            JobStage::BuySubmitted => "buy_submitted",
            JobStage::BuyFilled => "buy_filled",
            JobStage::Waiting => "waiting",
            JobStage::SellSubmitted => "sell_submitted",
            JobStage::SellFilled => "sell_filled",
        };
        write!(f, "{}", name)
    }
}

/// Executes a single trade job under a retry policy
#[derive(Debug, Clone, Copy)]
pub struct TradeJobExecutor {
    policy: RetryPolicy,
}

/// State carried across retry attempts of one job
struct JobProgress {
    stage: JobStage,
    buy: Option<OrderReceipt>,
    filled: Option<f64>,
    sell: Option<OrderReceipt>,
}

impl TradeJobExecutor {
    /// Create an executor applying the given retry policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run the job to a terminal outcome. Never returns an error: every
    /// failure is captured in the [`JobResult`].
    ///
    /// A stop raised mid-job lets the current attempt finish but abandons
    /// any remaining retries during the backoff.
    pub async fn execute(
        &self,
        job: &Job,
        client: Arc<dyn ExchangeClient>,
        account_gate: Arc<Semaphore>,
        stop: &StopSignal,
    ) -> JobResult {
        let started = Instant::now();
        let label = job.label();
        info!(job = %label, amount = job.quote_amount, "job started");

        // The exchange floor is known before any submission
        if job.quote_amount < client.min_order_quote() {
            let error = ExchangeError::MinimumAmount(format!(
                "{:.0} KRW below {} minimum {:.0} KRW",
                job.quote_amount,
                client.exchange(),
                client.min_order_quote()
            ));
            warn!(job = %label, %error, "job rejected before submission");
            return self.result(job, started, 1, Err(error.into()), JobProgress::new());
        }

        let mut progress = JobProgress::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.attempt(job, &client, &account_gate, &mut progress).await {
                Ok(()) => {
                    info!(job = %label, attempts = attempt, "job completed");
                    return self.result(job, started, attempt, Ok(()), progress);
                }
                Err(error) => {
                    let retryable = error.is_retryable() && attempt < self.policy.max_attempts;
                    if !retryable {
                        warn!(
                            job = %label,
                            attempts = attempt,
                            stage = %progress.stage,
                            %error,
                            "job failed"
                        );
                        return self.result(job, started, attempt, Err(error.into()), progress);
                    }

                    let delay = self.policy.delay(attempt, &error);
                    warn!(
                        job = %label,
                        attempt,
                        stage = %progress.stage,
                        %error,
                        delay_secs = delay.as_secs_f64(),
                        "attempt failed, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop.triggered() => {
                            warn!(
                                job = %label,
                                attempts = attempt,
                                "stop requested during backoff, abandoning retries"
                            );
                            return self.result(job, started, attempt, Err(error.into()), progress);
                        }
                    }
                }
            }
        }
    }

    /// One attempt, entering at the furthest stage already reached
    async fn attempt(
        &self,
        job: &Job,
        client: &Arc<dyn ExchangeClient>,
        account_gate: &Arc<Semaphore>,
        progress: &mut JobProgress,
    ) -> Result<(), ExchangeError> {
        if progress.buy.is_none() {
            progress.stage = JobStage::BuySubmitted;
            let receipt = {
                // one in-flight submission per account; the permit is not
                // held across the post-buy wait
                let _permit = acquire(account_gate).await?;
                client
                    .place_market_buy(&job.symbol, job.quote_amount)
                    .await?
            };
            debug!(job = %job.label(), order_id = %receipt.order_id, "buy accepted");
            progress.stage = JobStage::BuyFilled;
            progress.buy = Some(receipt);

            progress.stage = JobStage::Waiting;
            tokio::time::sleep(job.wait).await;
        }

        if progress.filled.is_none() {
            // progress.buy was just set or carried over from a prior attempt
            let receipt = match &progress.buy {
                Some(receipt) => receipt,
                None => return Err(ExchangeError::Network("buy receipt missing".to_string())),
            };
            let quantity = client.get_filled_quantity(&job.symbol, receipt).await?;
            progress.filled = Some(quantity);
        }

        let quantity = progress.filled.unwrap_or(0.0);
        progress.stage = JobStage::SellSubmitted;
        let receipt = {
            let _permit = acquire(account_gate).await?;
            client.place_market_sell(&job.symbol, quantity).await?
        };
        debug!(job = %job.label(), order_id = %receipt.order_id, "sell accepted");
        progress.sell = Some(receipt);
        progress.stage = JobStage::SellFilled;
        Ok(())
    }

    fn result(
        &self,
        job: &Job,
        started: Instant,
        attempts: u32,
        outcome: Result<(), JobError>,
        progress: JobProgress,
    ) -> JobResult {
        let (status, error) = match outcome {
            Ok(()) => (JobStatus::Success, None),
            Err(e) => (JobStatus::Failure, Some(e)),
        };
        JobResult {
            account_id: job.account.id.clone(),
            exchange: job.account.exchange,
            symbol: job.symbol.clone(),
            status,
            error,
            attempts,
            elapsed_secs: started.elapsed().as_secs_f64(),
            buy: progress.buy,
            sell: progress.sell,
            filled_quantity: progress.filled,
        }
    }
}

impl JobProgress {
    fn new() -> Self {
        Self {
            stage: JobStage::Pending,
            buy: None,
            filled: None,
            sell: None,
        }
    }
}

async fn acquire(gate: &Arc<Semaphore>) -> Result<tokio::sync::SemaphorePermit<'_>, ExchangeError> {
    gate.acquire()
        .await
        .map_err(|_| ExchangeError::Network("account gate closed".to_string()))
}
