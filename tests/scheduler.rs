//! Cycle scheduling properties: exact cycle counts, fresh job sets per
//! cycle, and stop handling during the inter-cycle wait.

mod common;

use airdrop_runner::exchanges::Exchange;
use airdrop_runner::plan::{Account, Backoff, Job, RetryPolicy, RunPlan};
use airdrop_runner::trading::{CycleScheduler, Orchestrator, StopSignal};
use common::{FakeClient, Probe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn plan(cycle_count: u32) -> RunPlan {
    let accounts = vec![
        Arc::new(Account::new("a1", Exchange::Bithumb, "key", "secret")),
        Arc::new(Account::new("a2", Exchange::Bithumb, "key", "secret")),
    ];
    let jobs = accounts
        .iter()
        .map(|account| Job {
            account: Arc::clone(account),
            symbol: "BTC".to_string(),
            quote_amount: 10_000.0,
            wait: Duration::from_millis(100),
        })
        .collect();

    RunPlan {
        jobs,
        max_concurrency: 4,
        per_account_limit: 1,
        retry: RetryPolicy {
            max_attempts: 2,
            backoff: Backoff::Fixed(Duration::from_millis(10)),
            maintenance_multiplier: 2,
        },
        cycle_count,
        cycle_interval: Duration::from_secs(3600),
    }
}

fn orchestrator_for(plan: &RunPlan, probe: &Arc<Probe>, stop: StopSignal) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(
        plan.retry,
        plan.max_concurrency,
        plan.per_account_limit,
        stop,
    );
    for job in &plan.jobs {
        orchestrator.register_client(&job.account.id, Arc::new(FakeClient::new(Arc::clone(probe))));
    }
    orchestrator
}

#[tokio::test(start_paused = true)]
async fn test_runs_exactly_the_configured_cycle_count() {
    let probe = Probe::new();
    let plan = plan(3);
    let stop = StopSignal::new();
    let orchestrator = orchestrator_for(&plan, &probe, stop.clone());

    let summaries = CycleScheduler::new(stop).run(&plan, &orchestrator).await;

    assert_eq!(summaries.len(), 3);
    for (i, summary) in summaries.iter().enumerate() {
        assert_eq!(summary.cycle, i as u32);
        assert_eq!(summary.total, 2, "every cycle attempts the full job set");
        assert_eq!(summary.success, 2);
    }
    assert_eq!(probe.buy_calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_single_cycle_has_no_trailing_wait() {
    let probe = Probe::new();
    let plan = plan(1);
    let stop = StopSignal::new();
    let orchestrator = orchestrator_for(&plan, &probe, stop.clone());

    let started = tokio::time::Instant::now();
    let summaries = CycleScheduler::new(stop).run(&plan, &orchestrator).await;

    assert_eq!(summaries.len(), 1);
    // well under the hour-long interval: no sleep after the last cycle
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_wait_ends_the_run() {
    let probe = Probe::new();
    let plan = plan(5);
    let stop = StopSignal::new();
    let orchestrator = orchestrator_for(&plan, &probe, stop.clone());

    {
        let stop = stop.clone();
        tokio::spawn(async move {
            // fires inside the first inter-cycle wait
            tokio::time::sleep(Duration::from_secs(1800)).await;
            stop.trigger();
        });
    }

    let summaries = CycleScheduler::new(stop).run(&plan, &orchestrator).await;

    assert_eq!(summaries.len(), 1, "later cycles were abandoned");
    assert_eq!(probe.buy_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_first_cycle_runs_nothing() {
    let probe = Probe::new();
    let plan = plan(3);
    let stop = StopSignal::new();
    let orchestrator = orchestrator_for(&plan, &probe, stop.clone());

    stop.trigger();
    let summaries = CycleScheduler::new(stop).run(&plan, &orchestrator).await;

    assert!(summaries.is_empty());
    assert_eq!(probe.buy_calls.load(Ordering::SeqCst), 0);
}
