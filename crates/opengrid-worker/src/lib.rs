//! OpenGrid worker.
//!
//! A worker owns a unique id and a single execution slot. It advertises
//! liveness and load through the store, claims one job at a time from its
//! personal list, runs the workload synchronously on the blocking thread
//! pool, and publishes the terminal status with measured latency, SLO
//! verdict, and cost.
//!
//! - **[`lifecycle`]** -- The claim/execute/report loop and its telemetry.
//! - **[`runners`]** -- The workload kernels (matmul, conv, sleep, cnn,
//!   ddp_mock) behind one dispatch function; unknown tags run as a short
//!   no-op rather than failing the job.

pub mod lifecycle;
pub mod runners;

pub use lifecycle::{Worker, WorkerConfig, estimate_power};
pub use runners::RunnerError;
