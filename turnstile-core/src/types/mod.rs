mod attempt;
mod queue;
mod ticket;

pub use attempt::{AttemptResult, FailureReason};
pub use queue::QueueEntry;
pub use ticket::Ticket;
