//! The external driver around the coordination kernel: inventory seeding,
//! concurrent caller fan-out with staggered starts, timing instrumentation,
//! and result aggregation. Nothing here touches a ticket except through
//! [`Coordinator::run`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use nanoid::nanoid;

use turnstile_core::allocation::TICKETS_COLLECTION;
use turnstile_core::coordinator::{Coordinator, CoordinatorConfig};
use turnstile_core::ledger::QUEUE_COLLECTION;
use turnstile_core::store::{Direction, DocumentStore, Query, StoreError, to_document};
use turnstile_core::store_in_memory::InMemoryStore;
use turnstile_core::types::{AttemptResult, Ticket};

pub struct SimulationOptions {
    pub tickets: usize,
    pub callers: usize,
    pub use_queue: bool,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub queue_ttl: Duration,
    pub stagger: Duration,
}

pub fn create_store(storage: &str) -> Result<Arc<dyn DocumentStore>, String> {
    if storage == "memory" {
        return Ok(Arc::new(InMemoryStore::new()));
    }
    if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            let store = turnstile_core::store_sqlite::SqliteStore::open(path)
                .map_err(|e| format!("failed to open SQLite database at '{path}': {e}"))?;
            return Ok(Arc::new(store));
        }
        #[cfg(not(feature = "sqlite"))]
        {
            let _ = path;
            return Err("sqlite support is not compiled in (enable the `sqlite` feature)".into());
        }
    }
    Err(format!(
        "unknown storage '{storage}', expected \"memory\" or \"sqlite:<path>\""
    ))
}

fn clear_collection(store: &dyn DocumentStore, collection: &str) -> Result<usize, StoreError> {
    let existing = store.query(collection, &Query::all())?;
    let removed = existing.len();
    for (key, _) in existing {
        store.delete(collection, &key)?;
    }
    Ok(removed)
}

/// Clears prior inventory and queue entries, then writes `count` fresh
/// tickets, four per priority band.
pub fn seed_tickets(store: &dyn DocumentStore, count: usize) -> Result<(), StoreError> {
    let removed = clear_collection(store, TICKETS_COLLECTION)?
        + clear_collection(store, QUEUE_COLLECTION)?;
    if removed > 0 {
        tracing::debug!(removed, "cleared prior documents");
    }

    for i in 0..count {
        let ticket = Ticket::new(i as u64 + 1, (i / 4) as u32 + 1);
        store.set(TICKETS_COLLECTION, &ticket.key(), to_document(&ticket)?)?;
    }
    tracing::info!(count, "ticket inventory seeded");
    Ok(())
}

pub fn print_tickets(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let query = Query::all().order_by("id", Direction::Ascending);
    for (_, doc) in store.query(TICKETS_COLLECTION, &query)? {
        println!("{}", serde_json::to_string(&doc)?);
    }
    Ok(())
}

struct TimedResult {
    result: AttemptResult,
    duration: Duration,
}

pub async fn run_simulation(
    store: Arc<dyn DocumentStore>,
    options: SimulationOptions,
) -> Result<(), StoreError> {
    tracing::info!(
        tickets = options.tickets,
        callers = options.callers,
        use_queue = options.use_queue,
        poll_interval_ms = options.poll_interval.as_millis() as u64,
        max_poll_attempts = options.max_poll_attempts,
        "starting allocation run"
    );

    seed_tickets(store.as_ref(), options.tickets)?;

    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&store),
        CoordinatorConfig {
            use_queue: options.use_queue,
            queue_ttl: options.queue_ttl,
            poll_interval: options.poll_interval,
            max_poll_attempts: options.max_poll_attempts,
        },
    ));

    // Labels carry a per-run ID so reruns against a persistent store never
    // collide on queue keys.
    let run_id = nanoid!(8);
    let started = Instant::now();

    let mut handles = Vec::with_capacity(options.callers);
    for i in 0..options.callers {
        let coordinator = Arc::clone(&coordinator);
        let label = format!("{run_id}-{}", i + 1);
        let delay = options.stagger * i as u32;
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let caller_started = Instant::now();
            let result = coordinator.run(&label).await;
            TimedResult {
                result,
                duration: caller_started.elapsed(),
            }
        }));
    }

    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(timed) => {
                tracing::info!(
                    label = timed.result.label(),
                    success = timed.result.is_success(),
                    attempts = timed.result.attempts(),
                    took_ms = timed.duration.as_millis() as u64,
                    "caller finished"
                );
                if timed.result.is_success() {
                    successes.push(timed);
                } else {
                    failures.push(timed);
                }
            }
            Err(err) => tracing::error!(error = %err, "caller task panicked"),
        }
    }

    println!("successful attempts: {}", successes.len());
    for timed in &successes {
        if let AttemptResult::Success {
            ticket_id,
            label,
            attempts,
        } = &timed.result
        {
            println!(
                "  {label}: ticket {ticket_id} in {attempts} attempt(s), {} ms",
                timed.duration.as_millis()
            );
        }
    }

    println!("failed attempts: {}", failures.len());
    for timed in &failures {
        if let AttemptResult::Failure { reason, label, .. } = &timed.result {
            println!("  {label}: {reason:?}, {} ms", timed.duration.as_millis());
        }
    }

    println!("final ticket state:");
    print_tickets(store.as_ref())?;
    println!("total wall time: {} ms", started.elapsed().as_millis());
    Ok(())
}
