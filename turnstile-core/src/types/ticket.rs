use serde::{Deserialize, Serialize};

/// A uniquely-ownable unit of inventory.
///
/// Tickets are created in bulk by external setup and mutated exactly once,
/// by the allocation transaction that sells them. A sold ticket is never
/// reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Stable unique ID, also used as the document key
    pub id: u64,
    /// Eligibility rank. Lower values are allocated first.
    pub priority: u32,
    /// Identity of the acquirer, unset until sold
    pub owner: Option<String>,
    /// Whether the ticket has been allocated
    pub sold: bool,
}

impl Ticket {
    pub fn new(id: u64, priority: u32) -> Self {
        Self {
            id,
            priority,
            owner: None,
            sold: false,
        }
    }

    /// Document key for this ticket in the store.
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}
