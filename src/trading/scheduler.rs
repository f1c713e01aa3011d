//! Cycle scheduler
//!
//! Repeats the batch on a fixed interval for the event window. Cycles never
//! overlap: each batch runs to completion before the inter-cycle wait
//! begins, and the wait itself is a suspension racing against the stop
//! signal.

use crate::plan::RunPlan;
use crate::report::{self, CycleSummary};
use crate::trading::{Orchestrator, StopSignal};
use tracing::info;

/// Drives a plan through its cycles
pub struct CycleScheduler {
    stop: StopSignal,
}

impl CycleScheduler {
    /// Create a scheduler observing the given stop signal
    pub fn new(stop: StopSignal) -> Self {
        Self { stop }
    }

    /// Run every cycle of the plan, returning one summary per executed cycle.
    ///
    /// Each cycle attempts the identical job set fresh: a failure in one
    /// cycle has no effect on the next.
    pub async fn run(&self, plan: &RunPlan, orchestrator: &Orchestrator) -> Vec<CycleSummary> {
        let mut summaries = Vec::with_capacity(plan.cycle_count as usize);

        for cycle in 0..plan.cycle_count {
            if self.stop.is_triggered() {
                info!(cycle, "stop requested, no further cycles");
                break;
            }

            info!(
                cycle = cycle + 1,
                of = plan.cycle_count,
                jobs = plan.jobs.len(),
                "cycle started"
            );
            let results = orchestrator.run_batch(&plan.jobs).await;
            let summary = report::summarize(cycle, results);
            info!(
                cycle = cycle + 1,
                success = summary.success,
                failure = summary.failure,
                "cycle finished"
            );
            summaries.push(summary);

            if cycle + 1 < plan.cycle_count {
                info!(
                    next_in_secs = plan.cycle_interval.as_secs(),
                    "waiting for next cycle"
                );
                tokio::select! {
                    _ = tokio::time::sleep(plan.cycle_interval) => {}
                    _ = self.stop.triggered() => {
                        info!("stop requested during inter-cycle wait");
                        break;
                    }
                }
            }
        }

        summaries
    }
}
