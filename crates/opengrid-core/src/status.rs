//! Job status records.
//!
//! Status records live in the `jobs:status` hash, one per job id, tagged by
//! their `state` field. The DAG is `queued -> assigned -> done`; `done` is
//! terminal and never overwritten. Readers may briefly observe `queued`
//! after the scheduler has moved the record between lists; they never
//! observe a regression.

use serde::{Deserialize, Serialize};

use crate::job::JobRecord;

/// The opaque result a workload runner reports for a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Seconds the workload itself ran (excludes claim/report overhead).
    pub elapsed_sec: f64,
    /// Cost accrued by the linear cost model, in USD.
    pub cost_usd: f64,
}

/// A job's current position in the status DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, waiting on a priority list.
    Queued { info: JobRecord },
    /// Moved to a worker's personal list by the scheduler.
    Assigned { worker: String, info: JobRecord },
    /// Terminal. `latency_sec` is wall-clock from worker claim to report;
    /// `error` is set when the workload runner failed.
    Done {
        result: JobResult,
        latency_sec: f64,
        slo_violation: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl JobStatus {
    /// The wire tag of the current state.
    pub fn state(&self) -> &'static str {
        match self {
            Self::Queued { .. } => "queued",
            Self::Assigned { .. } => "assigned",
            Self::Done { .. } => "done",
        }
    }

    /// Whether this state is terminal (no further transition is legal).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}
