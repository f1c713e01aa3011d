//! Trade execution modules

pub mod executor;
pub mod orchestrator;
pub mod scheduler;
pub mod sweep;

pub use executor::{JobStage, TradeJobExecutor};
pub use orchestrator::Orchestrator;
pub use scheduler::CycleScheduler;
pub use sweep::{sweep_all, SweepOutcome};

use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative stop signal.
///
/// Triggering lets in-flight jobs finish their current attempt while
/// preventing queued jobs and new cycles from starting. A submitted exchange
/// order is never interrupted locally.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop; idempotent
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether a stop has been requested
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once a stop has been requested
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
