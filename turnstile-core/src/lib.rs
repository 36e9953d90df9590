//! # turnstile-core
//!
//! The coordination kernel for the Turnstile protocol.
//! Provides a self-expiring poll-based admission queue and
//! optimistic-transaction allocation of uniquely-ownable tickets
//! over a pluggable document store.

pub mod allocation;
pub mod coordinator;
pub mod ledger;
pub mod store;
#[path = "store_in_memory.rs"]
pub mod store_in_memory;
#[cfg(feature = "sqlite")]
#[path = "store_sqlite.rs"]
pub mod store_sqlite;
pub mod types;
pub mod waiter;

#[cfg(test)]
#[path = "ledger_test.rs"]
mod ledger_test;
#[cfg(test)]
#[path = "allocation_test.rs"]
mod allocation_test;
