use serde::{Deserialize, Serialize};

/// One caller's waiting position in the admission queue.
///
/// The entry stops counting as active once `deadline` passes; it is not a
/// lock, only an advisory marker ordered by deadline. At most one entry
/// exists per label at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Caller identity, also the document key
    pub label: String,
    /// Epoch milliseconds after which this entry is ignored
    pub deadline: u64,
}

impl QueueEntry {
    pub fn new(label: impl Into<String>, deadline: u64) -> Self {
        Self {
            label: label.into(),
            deadline,
        }
    }
}
