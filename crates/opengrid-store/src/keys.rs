//! The store key schema.
//!
//! These names are a compatibility boundary shared with any other client of
//! the same store; they must match byte-for-byte.

use opengrid_core::Priority;

/// High-priority job list.
pub const Q_HIGH: &str = "jobs:q:high";
/// Medium-priority job list.
pub const Q_MED: &str = "jobs:q:med";
/// Low-priority job list.
pub const Q_LOW: &str = "jobs:q:low";

/// Status hash; field = job id, value = JSON status record.
pub const JOB_STATUS: &str = "jobs:status";

/// Set of known worker ids. Membership outlives the heartbeat TTL; liveness
/// requires a fresh heartbeat.
pub const WORKERS_SET: &str = "workers:set";

/// The priority list a job of class `priority` queues on.
pub fn priority_queue(priority: Priority) -> &'static str {
    match priority {
        Priority::High => Q_HIGH,
        Priority::Med => Q_MED,
        Priority::Low => Q_LOW,
    }
}

/// A worker's personal job list (scheduler appends, owning worker pops).
pub fn worker_queue(worker_id: &str) -> String {
    format!("worker:{worker_id}:queue")
}

/// A worker's heartbeat key (unix seconds string, TTL-bounded).
pub fn worker_heartbeat(worker_id: &str) -> String {
    format!("worker:{worker_id}:heartbeat")
}

/// A worker's stats hash (`inflight`, `completed`).
pub fn worker_stats(worker_id: &str) -> String {
    format!("worker:{worker_id}:stats")
}
