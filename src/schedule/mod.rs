//! Scheduling: the lane priority domain, per-unit update queues, the
//! external cooperative scheduler contract, and the synchronous queue.

pub mod lanes;
pub mod scheduler;
pub(crate) mod sync_queue;
pub mod update_queue;

pub use lanes::{
    highest_priority, is_subset, lanes_to_scheduler_priority, merge, scheduler_priority_to_lane,
    Lane, Lanes, RootLanes,
};
pub use scheduler::{CallbackToken, Continuation, SchedulerPriority, TaskScheduler};
pub use update_queue::{process_update_queue, Action, Processed, Update, UpdateQueue};
