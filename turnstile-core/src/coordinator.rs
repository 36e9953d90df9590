//! Composes queue admission and allocation into one coordination attempt.

use std::sync::Arc;
use std::time::Duration;

use crate::allocation::allocate;
use crate::ledger::QueueLedger;
use crate::store::DocumentStore;
use crate::types::{AttemptResult, FailureReason};
use crate::waiter::wait_for_turn;

/// Knobs for one coordinator. Defaults: 20 s queue-entry TTL, 100 ms poll
/// interval, 100 polls.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// When false, callers skip the queue and go straight to allocation.
    pub use_queue: bool,
    /// How long a queue entry counts as active after registration.
    pub queue_ttl: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            use_queue: true,
            queue_ttl: Duration::from_secs(20),
            poll_interval: Duration::from_millis(100),
            max_poll_attempts: 100,
        }
    }
}

pub struct Coordinator {
    store: Arc<dyn DocumentStore>,
    ledger: QueueLedger,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(store: Arc<dyn DocumentStore>, config: CoordinatorConfig) -> Self {
        let ledger = QueueLedger::new(Arc::clone(&store));
        Self {
            store,
            ledger,
            config,
        }
    }

    /// One complete coordination attempt for `label`: optional queue
    /// registration, polling for the turn, allocation, and unconditional
    /// queue cleanup. Always yields exactly one structured result.
    pub async fn run(&self, label: &str) -> AttemptResult {
        if !self.config.use_queue {
            return allocate(self.store.as_ref(), label);
        }

        let result = self.run_queued(label).await;

        // Every exit path of run_queued lands here, including register
        // failure, so the label never leaves a stale entry behind. A failed
        // delete is logged and never masks the attempt's outcome.
        if let Err(err) = self.ledger.deregister(label) {
            tracing::warn!(label, error = %err, "failed to remove queue entry");
        }

        result
    }

    async fn run_queued(&self, label: &str) -> AttemptResult {
        if let Err(err) = self.ledger.register(label, self.config.queue_ttl) {
            return AttemptResult::failure(FailureReason::StoreError(err.to_string()), label, 0);
        }

        match wait_for_turn(
            &self.ledger,
            label,
            self.config.poll_interval,
            self.config.max_poll_attempts,
        )
        .await
        {
            Ok(true) => allocate(self.store.as_ref(), label),
            Ok(false) => AttemptResult::failure(FailureReason::TurnNotGranted, label, 0),
            Err(err) => AttemptResult::failure(FailureReason::StoreError(err.to_string()), label, 0),
        }
    }
}
