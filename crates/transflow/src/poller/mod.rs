//! Completion polling for submitted jobs.

pub mod reconciler;
pub mod scheduler;

pub use reconciler::{CompletionPoller, TickOutcome, TickReport};
pub use scheduler::PollScheduler;
