pub mod queue_entry;

pub use queue_entry::{QueueEntry, QueueStats, QueueStatus};
