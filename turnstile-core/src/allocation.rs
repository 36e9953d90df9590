//! The allocation transaction: atomically sell the most eligible ticket.

use crate::store::{Direction, DocumentStore, FilterOp, Query, from_document, to_document};
use crate::types::{AttemptResult, FailureReason, Ticket};

pub const TICKETS_COLLECTION: &str = "tickets";

/// Finds the unsold ticket with the lowest priority value and assigns it to
/// `owner_label`, inside one store transaction. The store re-invokes the
/// body on write conflicts; the returned attempt count includes those
/// re-invocations. Ties between equal-priority tickets fall to whatever
/// order the store yields.
///
/// A permanently failed transaction (contention budget spent, or a backend
/// fault) is reported as [`FailureReason::StoreError`] and not retried here.
pub fn allocate(store: &dyn DocumentStore, owner_label: &str) -> AttemptResult {
    let mut attempts: u32 = 0;
    let mut outcome: Option<AttemptResult> = None;

    let committed = store.run_transaction(&mut |txn| {
        // Re-runnable: overwrite the captured outcome on every invocation.
        attempts += 1;
        tracing::debug!(owner = owner_label, attempt = attempts, "allocation transaction started");

        let query = Query::filter("sold", FilterOp::Eq, false)
            .order_by("priority", Direction::Ascending)
            .limit(1);
        let hits = txn.query(TICKETS_COLLECTION, &query)?;

        match hits.into_iter().next() {
            None => {
                outcome = Some(AttemptResult::failure(
                    FailureReason::NoEligibleTicket,
                    owner_label,
                    attempts,
                ));
                Ok(())
            }
            Some((key, doc)) => {
                let mut ticket: Ticket = from_document(&doc)?;
                ticket.sold = true;
                ticket.owner = Some(owner_label.to_string());
                txn.set(TICKETS_COLLECTION, &key, to_document(&ticket)?);
                outcome = Some(AttemptResult::success(ticket.id, owner_label, attempts));
                Ok(())
            }
        }
    });

    match committed {
        Ok(()) => match outcome {
            Some(result) => {
                if let AttemptResult::Success { ticket_id, .. } = &result {
                    tracing::info!(owner = owner_label, ticket_id, attempts, "ticket allocated");
                }
                result
            }
            // The body always records an outcome before returning Ok; treat
            // anything else as a backend contract violation.
            None => AttemptResult::failure(
                FailureReason::StoreError("transaction committed without an outcome".into()),
                owner_label,
                attempts,
            ),
        },
        Err(err) => {
            tracing::warn!(owner = owner_label, error = %err, "allocation transaction failed");
            AttemptResult::failure(FailureReason::StoreError(err.to_string()), owner_label, attempts)
        }
    }
}
