use serde::{Deserialize, Serialize};

/// Why a coordination attempt did not produce a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum FailureReason {
    /// Every ticket is already sold. Expected once inventory runs out.
    NoEligibleTicket,
    /// The poll budget elapsed without this caller holding the earliest
    /// unexpired deadline. Expected under contention.
    TurnNotGranted,
    /// The store reported a permanent transaction or transport fault.
    StoreError(String),
}

/// Outcome of one coordinator invocation.
///
/// `attempts` counts how many times the allocation transaction body ran,
/// including re-invocations the store performed after write conflicts. It
/// is zero when the attempt never reached the allocation transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptResult {
    Success {
        ticket_id: u64,
        label: String,
        attempts: u32,
    },
    Failure {
        reason: FailureReason,
        label: String,
        attempts: u32,
    },
}

impl AttemptResult {
    pub fn success(ticket_id: u64, label: impl Into<String>, attempts: u32) -> Self {
        Self::Success {
            ticket_id,
            label: label.into(),
            attempts,
        }
    }

    pub fn failure(reason: FailureReason, label: impl Into<String>, attempts: u32) -> Self {
        Self::Failure {
            reason,
            label: label.into(),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Success { label, .. } | Self::Failure { label, .. } => label,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }
}
