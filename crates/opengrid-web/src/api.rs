//! REST API route handlers.
//!
//! Validation happens here, before anything reaches the store: a rejected
//! submission never touches a priority list. The handlers mirror the store's
//! own vocabulary -- a status read returns the status record exactly as the
//! worker wrote it.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use serde_json::json;

use opengrid_core::{CoreError, JobRecord, Priority, Workload};
use opengrid_store::{JobBoard, StoreError};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /submit
// ---------------------------------------------------------------------------

/// Request body for a job submission.
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    /// One of `matmul | conv | sleep | cnn | ddp_mock`.
    pub workload: String,
    /// Problem size (or batch size for the training kernels), 1..=8192.
    pub size: u32,
    /// Iteration/step count, 1..=5000.
    pub iterations: u32,
    /// One of `high | med | low`; defaults to `med`.
    #[serde(default)]
    pub priority: Option<String>,
    /// Deadline SLO in seconds; defaults to the configured cluster SLO.
    #[serde(default)]
    pub deadline_sec: Option<u32>,
}

/// Response payload for a successful submission.
#[derive(Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Validate a submission and build the immutable job record.
pub fn build_record(body: &SubmitBody, default_deadline_sec: u32) -> Result<JobRecord, CoreError> {
    let workload = Workload::parse_strict(&body.workload)?;
    let priority = match body.priority.as_deref() {
        Some(tag) => Priority::parse_strict(tag)?,
        None => Priority::default(),
    };
    JobRecord::create(
        workload,
        body.size,
        body.iterations,
        priority,
        body.deadline_sec.unwrap_or(default_deadline_sec),
    )
}

/// Validate, enqueue, and return the fresh job id.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitBody>,
) -> impl IntoResponse {
    let job = match build_record(&body, state.config.default_deadline_sec) {
        Ok(job) => job,
        Err(err) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };

    if let Err(err) = state.board.enqueue(&job).await {
        return store_failure(err);
    }
    counter!("jobs_submitted_total").increment(1);
    refresh_queue_gauges(&state.board).await;

    tracing::info!(
        job_id = %job.job_id,
        workload = %job.workload.as_str(),
        priority = %job.priority.as_str(),
        "job submitted"
    );
    Json(SubmitResponse { job_id: job.job_id }).into_response()
}

// ---------------------------------------------------------------------------
// GET /status/{job_id}
// ---------------------------------------------------------------------------

/// Return the status record for a job, or 404.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.board.status(&job_id).await {
        Ok(Some(status)) => {
            refresh_queue_gauges(&state.board).await;
            Json(status).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "not found" })),
        )
            .into_response(),
        Err(err) => store_failure(err),
    }
}

// ---------------------------------------------------------------------------
// GET /healthz
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn refresh_queue_gauges(board: &JobBoard) {
    // Gauge refresh is best-effort; the scheduler republishes every tick.
    if let Ok(lengths) = board.queue_lengths().await {
        gauge!("q_high_len").set(lengths.high as f64);
        gauge!("q_med_len").set(lengths.med as f64);
        gauge!("q_low_len").set(lengths.low as f64);
    }
}

fn store_failure(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "store operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "state store unavailable" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
