//! Job records, workload tags, and priority classes.
//!
//! A [`JobRecord`] is immutable after submission and travels through the
//! store as JSON with exactly the field names defined here. The
//! [`Workload`] set is closed at the submission surface but tolerant on the
//! wire: a tag this build does not recognize deserializes into
//! [`Workload::Other`] and executes as a short no-op rather than failing
//! the job.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::{CoreError, Result};

/// Largest accepted problem size (or batch size for the training kernels).
pub const MAX_SIZE: u32 = 8192;

/// Largest accepted iteration/step count.
pub const MAX_ITERATIONS: u32 = 5000;

// ---------------------------------------------------------------------------
// Workload
// ---------------------------------------------------------------------------

/// The kind of computation a job runs.
///
/// Serialized as a bare string (`"matmul"`, `"ddp_mock"`, ...). Unknown
/// strings round-trip through [`Workload::Other`] so that records written by
/// a newer front-end still claim and complete on older workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Workload {
    /// Dense `size x size` matrix product, repeated `iterations` times.
    Matmul,
    /// 3x3 kernel convolution over a `size x size` image.
    Conv,
    /// Sleep for `size` milliseconds.
    Sleep,
    /// Toy CNN-style training loop; `size` is the batch, `iterations` the steps.
    Cnn,
    /// Training loop with a per-step pause mimicking gradient-sync cost.
    DdpMock,
    /// Tag not recognized by this build; runs as a short no-op.
    Other(String),
}

impl Workload {
    /// The wire tag for this workload.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Matmul => "matmul",
            Self::Conv => "conv",
            Self::Sleep => "sleep",
            Self::Cnn => "cnn",
            Self::DdpMock => "ddp_mock",
            Self::Other(tag) => tag,
        }
    }

    /// Parse a tag, rejecting anything outside the closed set.
    ///
    /// This is the submission-surface parse; the serde path is deliberately
    /// more permissive (see [`Workload::Other`]).
    pub fn parse_strict(tag: &str) -> Result<Self> {
        match Self::from_tag(tag) {
            Self::Other(_) => Err(CoreError::UnknownTag {
                field: "workload",
                value: tag.to_string(),
            }),
            known => Ok(known),
        }
    }

    fn from_tag(tag: &str) -> Self {
        match tag {
            "matmul" => Self::Matmul,
            "conv" => Self::Conv,
            "sleep" => Self::Sleep,
            "cnn" => Self::Cnn,
            "ddp_mock" => Self::DdpMock,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Workload {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<Workload> for String {
    fn from(workload: Workload) -> Self {
        workload.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Priority class of a job; determines which priority list it queues on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Med,
    Low,
}

impl Priority {
    /// All classes in strict scheduling order (high drains before med, med
    /// before low).
    pub const ORDER: [Priority; 3] = [Priority::High, Priority::Med, Priority::Low];

    /// The wire tag for this class.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Med => "med",
            Self::Low => "low",
        }
    }

    /// Parse a tag, rejecting anything outside the closed set.
    pub fn parse_strict(tag: &str) -> Result<Self> {
        match tag {
            "high" => Ok(Self::High),
            "med" => Ok(Self::Med),
            "low" => Ok(Self::Low),
            other => Err(CoreError::UnknownTag {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Med
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// An immutable job submission as stored on a priority list.
///
/// Field names and shapes are the store compatibility boundary; do not
/// rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub workload: Workload,
    pub size: u32,
    pub iterations: u32,
    #[serde(default)]
    pub priority: Priority,
    pub deadline_sec: u32,
    pub submit_ts: f64,
}

impl JobRecord {
    /// Build a validated record, stamping a fresh id and `submit_ts`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] when `size`, `iterations`, or
    /// `deadline_sec` fall outside their allowed ranges.
    pub fn create(
        workload: Workload,
        size: u32,
        iterations: u32,
        priority: Priority,
        deadline_sec: u32,
    ) -> Result<Self> {
        check_range("size", size, 1, MAX_SIZE)?;
        check_range("iterations", iterations, 1, MAX_ITERATIONS)?;
        if deadline_sec < 1 {
            return Err(CoreError::OutOfRange {
                field: "deadline_sec",
                value: i64::from(deadline_sec),
                min: 1,
                max: i64::from(u32::MAX),
            });
        }

        Ok(Self {
            job_id: generate_job_id(),
            workload,
            size,
            iterations,
            priority,
            deadline_sec,
            submit_ts: clock::unix_now(),
        })
    }

    /// Absolute deadline: `submit_ts + deadline_sec`, in unix seconds.
    ///
    /// The scheduler minimizes this within its peek window.
    pub fn absolute_deadline(&self) -> f64 {
        self.submit_ts + f64::from(self.deadline_sec)
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(CoreError::OutOfRange {
            field,
            value: i64::from(value),
            min: i64::from(min),
            max: i64::from(max),
        });
    }
    Ok(())
}

/// Generate a job id of the form `job-{unix_millis}-{rand}`.
///
/// The millisecond stamp keeps ids roughly sortable; the random suffix keeps
/// them collision-free under sub-millisecond submission bursts.
pub fn generate_job_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(1000..=9999);
    format!("job-{millis}-{suffix}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
