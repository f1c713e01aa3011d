//! Concurrency orchestrator
//!
//! Runs a batch of trade jobs under a bounded worker pool. Every input job
//! produces exactly one result; a single job's failure never aborts the
//! batch. Order submissions on the same account are additionally gated so an
//! exchange's per-account rate limits and nonce ordering are respected even
//! when the pool is larger than the account list.

use crate::exchanges::{ClientFactory, ExchangeClient};
use crate::plan::{Job, RetryPolicy, RunPlan};
use crate::report::{JobError, JobResult, JobStatus};
use crate::trading::{StopSignal, TradeJobExecutor};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Batch runner with bounded parallelism and per-account order gates
pub struct Orchestrator {
    executor: TradeJobExecutor,
    max_concurrency: usize,
    per_account_limit: usize,
    clients: HashMap<String, Arc<dyn ExchangeClient>>,
    gates: HashMap<String, Arc<Semaphore>>,
    stop: StopSignal,
}

impl Orchestrator {
    /// Create an orchestrator with no clients registered yet
    pub fn new(
        policy: RetryPolicy,
        max_concurrency: usize,
        per_account_limit: usize,
        stop: StopSignal,
    ) -> Self {
        Self {
            executor: TradeJobExecutor::new(policy),
            max_concurrency: max_concurrency.max(1),
            per_account_limit: per_account_limit.max(1),
            clients: HashMap::new(),
            gates: HashMap::new(),
            stop,
        }
    }

    /// Build an orchestrator for a plan, creating one client per account
    pub fn for_plan(plan: &RunPlan, stop: StopSignal) -> Self {
        let mut orchestrator = Self::new(
            plan.retry,
            plan.max_concurrency,
            plan.per_account_limit,
            stop,
        );
        for job in &plan.jobs {
            if !orchestrator.clients.contains_key(&job.account.id) {
                orchestrator.register_client(&job.account.id, ClientFactory::create(&job.account));
            }
        }
        orchestrator
    }

    /// Register the client (and order gate) for an account
    pub fn register_client(&mut self, account_id: &str, client: Arc<dyn ExchangeClient>) {
        self.clients.insert(account_id.to_string(), client);
        self.gates.insert(
            account_id.to_string(),
            Arc::new(Semaphore::new(self.per_account_limit)),
        );
    }

    /// Registered clients, keyed by account id
    pub fn clients(&self) -> &HashMap<String, Arc<dyn ExchangeClient>> {
        &self.clients
    }

    /// Execute every job in the batch, collecting one result per job.
    ///
    /// Results arrive in completion order; the aggregator keys them by
    /// (account, symbol) so no ordering is guaranteed or needed.
    pub async fn run_batch(&self, jobs: &[Job]) -> Vec<JobResult> {
        info!(
            jobs = jobs.len(),
            max_concurrency = self.max_concurrency,
            "batch started"
        );

        let pool = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<JobResult> = JoinSet::new();

        for job in jobs.iter().cloned() {
            let Some(client) = self.clients.get(&job.account.id).cloned() else {
                error!(account = %job.account.id, "no client registered, job skipped");
                tasks.spawn(async move { cancelled(&job) });
                continue;
            };
            // a fabricated fallback gate would defeat per-account
            // serialization, so an unpaired client skips the job instead
            let Some(gate) = self.gates.get(&job.account.id).cloned() else {
                error!(account = %job.account.id, "no order gate registered, job skipped");
                tasks.spawn(async move { cancelled(&job) });
                continue;
            };

            let pool = Arc::clone(&pool);
            let executor = self.executor;
            let stop = self.stop.clone();

            tasks.spawn(async move {
                if stop.is_triggered() {
                    return cancelled(&job);
                }
                let _slot = match pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return cancelled(&job),
                };
                // a stop raised while queued still cancels the job; once the
                // executor runs, the current attempt is allowed to finish
                if stop.is_triggered() {
                    return cancelled(&job);
                }
                executor.execute(&job, client, gate, &stop).await
            });
        }

        let mut results = Vec::with_capacity(jobs.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(error = %e, "job task failed to join"),
            }
        }

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_success()).count(),
            "batch finished"
        );
        results
    }
}

fn cancelled(job: &Job) -> JobResult {
    JobResult {
        account_id: job.account.id.clone(),
        exchange: job.account.exchange,
        symbol: job.symbol.clone(),
        status: JobStatus::Failure,
        error: Some(JobError::Cancelled),
        attempts: 0,
        elapsed_secs: 0.0,
        buy: None,
        sell: None,
        filled_quantity: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::Exchange;
    use crate::plan::{Account, Backoff};
    use std::time::Duration;

    #[test]
    fn test_for_plan_registers_each_account_once() {
        let mut config = crate::config::RunnerConfig::default();
        config.trading.symbols = vec!["BTC".to_string(), "ETH".to_string()];
        let accounts = vec![
            Account::new("bithumb_1", Exchange::Bithumb, "k", "s"),
            Account::new("upbit_1", Exchange::Upbit, "k", "s"),
        ];
        let plan = RunPlan::build(&config, accounts).unwrap();

        let orchestrator = Orchestrator::for_plan(&plan, StopSignal::new());
        assert_eq!(orchestrator.clients().len(), 2);
        assert!(orchestrator.clients().contains_key("bithumb_1"));
        assert!(orchestrator.clients().contains_key("upbit_1"));
    }

    #[tokio::test]
    async fn test_client_without_gate_yields_cancelled_result() {
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::from_millis(1)),
            maintenance_multiplier: 1,
        };
        let mut orchestrator = Orchestrator::new(policy, 2, 1, StopSignal::new());
        // client inserted without its gate; no order may be submitted
        orchestrator.clients.insert(
            "a1".to_string(),
            Arc::new(crate::exchanges::MockExchangeClient::new()),
        );

        let job = Job {
            account: Arc::new(Account::new("a1", Exchange::Bithumb, "k", "s")),
            symbol: "BTC".to_string(),
            quote_amount: 5_500.0,
            wait: Duration::from_millis(1),
        };

        let results = orchestrator.run_batch(&[job]).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].error, Some(JobError::Cancelled)));
        assert_eq!(results[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_missing_client_yields_cancelled_result() {
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::from_millis(1)),
            maintenance_multiplier: 1,
        };
        let orchestrator = Orchestrator::new(policy, 2, 1, StopSignal::new());

        let job = Job {
            account: Arc::new(Account::new("ghost", Exchange::Bithumb, "k", "s")),
            symbol: "BTC".to_string(),
            quote_amount: 5_500.0,
            wait: Duration::from_millis(1),
        };

        let results = orchestrator.run_batch(&[job]).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, JobStatus::Failure);
        assert!(matches!(results[0].error, Some(JobError::Cancelled)));
    }
}
