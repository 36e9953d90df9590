#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::allocation::{TICKETS_COLLECTION, allocate};
    use crate::store::{
        Document, DocumentStore, Query, StoreError, TransactionBody, from_document, to_document,
    };
    use crate::store_in_memory::InMemoryStore;
    use crate::types::{AttemptResult, FailureReason, Ticket};

    /// A store whose transactions always fail permanently.
    struct BrokenStore;

    impl DocumentStore for BrokenStore {
        fn get(&self, _: &str, _: &str) -> Result<Option<Document>, StoreError> {
            Err(StoreError::Backend("store offline".into()))
        }
        fn set(&self, _: &str, _: &str, _: Document) -> Result<(), StoreError> {
            Err(StoreError::Backend("store offline".into()))
        }
        fn delete(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("store offline".into()))
        }
        fn query(&self, _: &str, _: &Query) -> Result<Vec<(String, Document)>, StoreError> {
            Err(StoreError::Backend("store offline".into()))
        }
        fn run_transaction(&self, _: &mut TransactionBody<'_>) -> Result<(), StoreError> {
            Err(StoreError::Backend("store offline".into()))
        }
    }

    /// A store where a rival write lands before every commit, so each
    /// transaction body invocation gets invalidated.
    struct ContendedStore {
        inner: InMemoryStore,
    }

    impl DocumentStore for ContendedStore {
        fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, key)
        }
        fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
            self.inner.set(collection, key, doc)
        }
        fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
            self.inner.delete(collection, key)
        }
        fn query(&self, collection: &str, query: &Query) -> Result<Vec<(String, Document)>, StoreError> {
            self.inner.query(collection, query)
        }
        fn run_transaction(&self, body: &mut TransactionBody<'_>) -> Result<(), StoreError> {
            self.inner.run_transaction(&mut |txn| {
                let result = body(txn);
                let rival = Ticket::new(1, 1);
                self.inner
                    .set(TICKETS_COLLECTION, &rival.key(), to_document(&rival)?)?;
                result
            })
        }
    }

    fn seed(store: &dyn DocumentStore, priorities: &[u32]) {
        for (i, priority) in priorities.iter().enumerate() {
            let ticket = Ticket::new(i as u64 + 1, *priority);
            store
                .set(TICKETS_COLLECTION, &ticket.key(), to_document(&ticket).unwrap())
                .unwrap();
        }
    }

    fn ticket(store: &dyn DocumentStore, id: u64) -> Ticket {
        let doc = store
            .get(TICKETS_COLLECTION, &id.to_string())
            .unwrap()
            .expect("ticket exists");
        from_document(&doc).unwrap()
    }

    #[test]
    fn test_allocate_sells_lowest_priority_ticket() {
        let store = Arc::new(InMemoryStore::new());
        seed(store.as_ref(), &[3, 1, 2]);

        let result = allocate(store.as_ref(), "alice");
        assert_eq!(result, AttemptResult::success(2, "alice", 1));

        let sold = ticket(store.as_ref(), 2);
        assert!(sold.sold);
        assert_eq!(sold.owner.as_deref(), Some("alice"));
        // Untouched fields survive the rewrite
        assert_eq!(sold.priority, 1);

        // The other tickets stay unsold and unowned
        for id in [1, 3] {
            let t = ticket(store.as_ref(), id);
            assert!(!t.sold);
            assert!(t.owner.is_none());
        }
    }

    #[test]
    fn test_sequential_allocations_follow_priority_order() {
        let store = Arc::new(InMemoryStore::new());
        seed(store.as_ref(), &[2, 1, 3]);

        let picked: Vec<u64> = (0..3)
            .map(|i| match allocate(store.as_ref(), &format!("caller-{i}")) {
                AttemptResult::Success { ticket_id, .. } => ticket_id,
                other => panic!("expected success, got {other:?}"),
            })
            .collect();

        assert_eq!(picked, vec![2, 1, 3]);
    }

    #[test]
    fn test_exhausted_inventory_reports_no_eligible_ticket() {
        let store = Arc::new(InMemoryStore::new());
        seed(store.as_ref(), &[1]);

        assert!(allocate(store.as_ref(), "first").is_success());

        let result = allocate(store.as_ref(), "second");
        assert_eq!(
            result,
            AttemptResult::failure(FailureReason::NoEligibleTicket, "second", 1)
        );

        // A sold ticket is never reassigned
        let t = ticket(store.as_ref(), 1);
        assert_eq!(t.owner.as_deref(), Some("first"));
    }

    #[test]
    fn test_empty_inventory_reports_no_eligible_ticket() {
        let store = Arc::new(InMemoryStore::new());
        let result = allocate(store.as_ref(), "anyone");
        assert_eq!(
            result,
            AttemptResult::failure(FailureReason::NoEligibleTicket, "anyone", 1)
        );
    }

    #[test]
    fn test_permanent_store_failure_reports_store_error() {
        let result = allocate(&BrokenStore, "anyone");
        match result {
            AttemptResult::Failure {
                reason: FailureReason::StoreError(message),
                label,
                attempts,
            } => {
                assert_eq!(label, "anyone");
                // The body never ran
                assert_eq!(attempts, 0);
                assert!(message.contains("store offline"), "{message}");
            }
            other => panic!("expected store-error failure, got {other:?}"),
        }
    }

    #[test]
    fn test_contention_budget_exhaustion_reports_store_error() {
        let store = ContendedStore {
            inner: InMemoryStore::with_transaction_budget(2),
        };
        seed(&store.inner, &[1]);

        let result = allocate(&store, "unlucky");
        match result {
            AttemptResult::Failure {
                reason: FailureReason::StoreError(message),
                label,
                attempts,
            } => {
                assert_eq!(label, "unlucky");
                // The attempt count carries every conflicting invocation.
                assert_eq!(attempts, 2);
                assert!(message.contains("2 conflicting attempts"), "{message}");
            }
            other => panic!("expected store-error failure, got {other:?}"),
        }

        // Nothing committed: the ticket is still unsold.
        assert!(!ticket(&store.inner, 1).sold);
    }

    #[test]
    fn test_attempt_count_reflects_conflict_reinvocations() {
        let store = Arc::new(InMemoryStore::new());
        seed(store.as_ref(), &[1, 2]);

        // Invalidate the first invocation's snapshot by selling ticket 1
        // out-of-band between the body's read and its commit.
        let mut sabotaged = false;
        let mut attempts = 0;
        let mut outcome = None;
        store
            .run_transaction(&mut |txn| {
                attempts += 1;
                let q = crate::store::Query::filter("sold", crate::store::FilterOp::Eq, false)
                    .order_by("priority", crate::store::Direction::Ascending)
                    .limit(1);
                let hits = txn.query(TICKETS_COLLECTION, &q)?;
                let (key, doc) = hits.into_iter().next().expect("ticket available");
                if !sabotaged {
                    sabotaged = true;
                    let mut stolen: Ticket = from_document(&doc)?;
                    stolen.sold = true;
                    stolen.owner = Some("rival".into());
                    store
                        .set(TICKETS_COLLECTION, &key, to_document(&stolen)?)
                        .unwrap();
                }
                let mut t: Ticket = from_document(&doc)?;
                t.sold = true;
                t.owner = Some("me".into());
                outcome = Some(t.id);
                txn.set(TICKETS_COLLECTION, &key, to_document(&t)?);
                Ok(())
            })
            .unwrap();

        // Second invocation saw the rival's commit and took the next ticket.
        assert_eq!(attempts, 2);
        assert_eq!(outcome, Some(2));
        assert_eq!(ticket(store.as_ref(), 1).owner.as_deref(), Some("rival"));
        assert_eq!(ticket(store.as_ref(), 2).owner.as_deref(), Some("me"));
    }
}
