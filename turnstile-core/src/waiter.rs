//! Bounded polling for admission.

use std::time::Duration;

use crate::ledger::QueueLedger;
use crate::store::StoreError;

/// Polls [`QueueLedger::is_my_turn`] up to `max_attempts` times, sleeping
/// `poll_interval` between checks. Returns as soon as the turn is granted,
/// with no trailing delay. Fixed backoff, no jitter: simplicity and fairness
/// over avoiding lockstep polling.
///
/// A full miss performs exactly `max_attempts` checks across at least
/// `(max_attempts - 1) * poll_interval` of wall time.
pub async fn wait_for_turn(
    ledger: &QueueLedger,
    label: &str,
    poll_interval: Duration,
    max_attempts: u32,
) -> Result<bool, StoreError> {
    for attempt in 1..=max_attempts {
        if ledger.is_my_turn(label)? {
            tracing::debug!(label, attempt, "turn granted");
            return Ok(true);
        }
        if attempt < max_attempts {
            tokio::time::sleep(poll_interval).await;
        }
    }
    tracing::debug!(label, max_attempts, "poll budget exhausted without turn");
    Ok(false)
}
