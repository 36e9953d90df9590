#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::ledger::{QUEUE_COLLECTION, QueueLedger};
    use crate::store::DocumentStore;
    use crate::store_in_memory::InMemoryStore;

    fn ledger() -> (Arc<InMemoryStore>, QueueLedger) {
        let store = Arc::new(InMemoryStore::new());
        let ledger = QueueLedger::new(store.clone() as Arc<dyn DocumentStore>);
        (store, ledger)
    }

    #[test]
    fn test_sole_registrant_holds_the_turn() {
        let (_, ledger) = ledger();

        ledger.register("A", Duration::from_secs(20)).unwrap();

        // Immediately after A registers, and before B registers at all
        assert!(ledger.is_my_turn("A").unwrap());
        assert!(!ledger.is_my_turn("B").unwrap());
    }

    #[test]
    fn test_earliest_deadline_wins() {
        let (_, ledger) = ledger();

        // Distinct TTLs stand in for distinct registration instants.
        ledger.register("A", Duration::from_secs(1)).unwrap();
        ledger.register("B", Duration::from_secs(5)).unwrap();

        assert!(ledger.is_my_turn("A").unwrap());
        assert!(!ledger.is_my_turn("B").unwrap());
    }

    #[test]
    fn test_no_unexpired_entries_means_no_turn() {
        let (_, ledger) = ledger();
        assert!(!ledger.is_my_turn("A").unwrap());

        // A zero TTL expires at registration: the caller's own entry no
        // longer counts, even though it is the only one.
        ledger.register("A", Duration::ZERO).unwrap();
        assert!(!ledger.is_my_turn("A").unwrap());
    }

    #[test]
    fn test_expired_entries_are_excluded_not_evicted() {
        let (store, ledger) = ledger();

        ledger.register("stale", Duration::ZERO).unwrap();
        ledger.register("fresh", Duration::from_secs(5)).unwrap();

        assert!(ledger.is_my_turn("fresh").unwrap());
        assert!(!ledger.is_my_turn("stale").unwrap());

        // The stale entry still sits in storage.
        assert!(store.get(QUEUE_COLLECTION, "stale").unwrap().is_some());
    }

    #[test]
    fn test_reregistration_replaces_deadline() {
        let (_, ledger) = ledger();

        ledger.register("A", Duration::from_secs(1)).unwrap();
        ledger.register("B", Duration::from_secs(5)).unwrap();
        assert!(ledger.is_my_turn("A").unwrap());

        // Re-registering A pushes its deadline past B's.
        ledger.register("A", Duration::from_secs(60)).unwrap();
        assert!(!ledger.is_my_turn("A").unwrap());
        assert!(ledger.is_my_turn("B").unwrap());
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let (store, ledger) = ledger();

        // Safe even when register never ran
        ledger.deregister("ghost").unwrap();

        ledger.register("A", Duration::from_secs(5)).unwrap();
        ledger.deregister("A").unwrap();
        assert!(store.get(QUEUE_COLLECTION, "A").unwrap().is_none());
        assert!(!ledger.is_my_turn("A").unwrap());

        ledger.deregister("A").unwrap();
    }
}
