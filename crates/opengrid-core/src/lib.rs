//! OpenGrid domain model.
//!
//! This crate defines the types that cross the state-store compatibility
//! boundary and nothing else:
//!
//! - **[`job`]** -- Job records, the closed [`job::Workload`] set, priority
//!   classes, bounds validation, and job-id generation.
//! - **[`status`]** -- The `queued -> assigned -> done` status DAG, serialized
//!   exactly as the wire expects (tagged by `state`).
//! - **[`clock`]** -- Wall-clock helpers; all timestamps on the wire are unix
//!   seconds.
//! - **[`error`]** -- Unified domain error type via [`thiserror`].
//!
//! Everything here is plain data: no store handles, no runtime. The wire
//! format (JSON field names and shapes) is a compatibility contract shared
//! with any other front-end talking to the same store, so changes to the
//! serde attributes in this crate are breaking changes.

pub mod clock;
pub mod error;
pub mod job;
pub mod status;

pub use error::{CoreError, Result};
pub use job::{JobRecord, Priority, Workload};
pub use status::{JobResult, JobStatus};
