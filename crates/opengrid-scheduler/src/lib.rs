//! OpenGrid dispatch core.
//!
//! One logical scheduler drains the three priority lists into workers'
//! personal lists. Priority is strict -- no lower class is touched while a
//! higher one is non-empty -- and within a class the scheduler is
//! earliest-deadline-first over a small peek window, so a tight deadline can
//! jump at most three predecessors. Placement is least-loaded among live
//! workers.
//!
//! The scheduler owns no state of its own: everything it reads and writes
//! goes through [`opengrid_store::JobBoard`], which is what makes running a
//! second instance merely wasteful instead of wrong (remove-by-value lets at
//! most one instance win a given job).

pub mod dispatch;

pub use dispatch::{Scheduler, SchedulerConfig, TickOutcome};
