//! The worker loop: heartbeat, claim, execute, report.
//!
//! Each iteration publishes liveness and zero-load telemetry, blocks on the
//! personal list for up to the claim timeout, and -- when a job arrives --
//! runs it to a terminal status. A failed workload still terminates its job
//! (with an error field and the measured latency); a failed store operation
//! aborts the iteration and the loop retries after a short backoff. One
//! failed job never affects the next.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use tokio::task::JoinHandle;

use opengrid_core::{JobRecord, JobResult};
use opengrid_store::{JobBoard, StoreResult};

use crate::runners;

/// Pseudo power model: package TDP and idle floor, in watts.
const CPU_TDP_W: f64 = 25.0;
const IDLE_W: f64 = 6.0;

/// Estimated power draw at a given utilization (0..1).
pub fn estimate_power(util: f64) -> f64 {
    IDLE_W + (CPU_TDP_W - IDLE_W) * util.powf(1.4)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long a claim blocks on the personal list before giving up.
    pub claim_timeout: Duration,
    /// Sleep after an empty claim before the next iteration.
    pub idle_sleep: Duration,
    /// Brief pause after finishing a job.
    pub post_job_pause: Duration,
    /// TTL on the heartbeat key. The effective heartbeat period is one loop
    /// iteration, which is bounded by `claim_timeout + idle_sleep` when
    /// idle -- comfortably under a third of the scheduler's staleness bound.
    pub heartbeat_ttl: Duration,
    /// Linear cost model rate, USD per second of latency.
    pub cost_rate_usd_per_sec: f64,
    /// Sleep after a failed store operation before retrying.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            claim_timeout: Duration::from_secs(2),
            idle_sleep: Duration::from_millis(250),
            post_job_pause: Duration::from_millis(50),
            heartbeat_ttl: Duration::from_secs(20),
            cost_rate_usd_per_sec: 6e-5,
            error_backoff: Duration::from_millis(500),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// A single-slot worker. Cheaply cloneable (`Arc`-backed).
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

struct WorkerInner {
    board: JobBoard,
    id: String,
    config: WorkerConfig,
    inflight: AtomicU64,
    completed: AtomicU64,
    shutdown: AtomicBool,
}

impl Worker {
    /// Create a worker with a cluster-unique id.
    pub fn new(board: JobBoard, id: impl Into<String>, config: WorkerConfig) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                board,
                id: id.into(),
                config,
                inflight: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// This worker's id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Jobs this worker has driven to a terminal status.
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Spawn the worker loop onto the tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move { worker.run().await })
    }

    /// Signal the loop to exit after the current iteration.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
    }

    /// Run the worker loop until [`Worker::shutdown`] is called.
    pub async fn run(&self) {
        tracing::info!(worker = %self.inner.id, "worker loop started");
        while !self.inner.shutdown.load(Ordering::Acquire) {
            if let Err(err) = self.iteration().await {
                tracing::warn!(worker = %self.inner.id, error = %err, "worker iteration failed");
                tokio::time::sleep(self.inner.config.error_backoff).await;
            }
        }
        tracing::info!(worker = %self.inner.id, "worker loop stopped");
    }

    async fn iteration(&self) -> StoreResult<()> {
        let inner = &self.inner;

        self.publish_load(0.0);
        inner
            .board
            .heartbeat(
                &inner.id,
                inner.inflight.load(Ordering::Acquire),
                inner.completed.load(Ordering::Acquire),
                inner.config.heartbeat_ttl,
            )
            .await?;

        let Some(job) = inner
            .board
            .claim(&inner.id, inner.config.claim_timeout)
            .await?
        else {
            tokio::time::sleep(inner.config.idle_sleep).await;
            return Ok(());
        };

        let result = self.execute(job).await;
        tokio::time::sleep(inner.config.post_job_pause).await;
        result
    }

    /// Execute one claimed job through to its terminal status.
    async fn execute(&self, job: JobRecord) -> StoreResult<()> {
        let inner = &self.inner;

        inner.inflight.store(1, Ordering::Release);
        self.publish_load(0.9);
        // Best-effort stats refresh so least-loaded placement sees the claim
        // without waiting a full loop iteration.
        if let Err(err) = inner
            .board
            .heartbeat(
                &inner.id,
                1,
                inner.completed.load(Ordering::Acquire),
                inner.config.heartbeat_ttl,
            )
            .await
        {
            tracing::warn!(worker = %inner.id, error = %err, "claim-time heartbeat failed");
        }
        tracing::info!(
            worker = %inner.id,
            job_id = %job.job_id,
            workload = %job.workload.as_str(),
            "job claimed"
        );

        let started = Instant::now();
        let workload = job.workload.clone();
        let (size, iterations) = (job.size, job.iterations);
        let outcome =
            tokio::task::spawn_blocking(move || runners::run(&workload, size, iterations)).await;

        let latency = started.elapsed().as_secs_f64();
        let slo_violation = latency > f64::from(job.deadline_sec);
        let cost = inner.config.cost_rate_usd_per_sec * latency;

        histogram!("job_latency_seconds").record(latency);
        gauge!("worker_cost_usd_total", "worker" => inner.id.clone()).increment(cost);
        if slo_violation {
            counter!("slo_violations_total").increment(1);
        }

        let written = match outcome {
            Ok(Ok(elapsed_sec)) => {
                inner
                    .board
                    .complete(
                        &job.job_id,
                        JobResult {
                            elapsed_sec,
                            cost_usd: cost,
                        },
                        latency,
                        slo_violation,
                    )
                    .await
            }
            Ok(Err(runner_err)) => {
                tracing::warn!(
                    worker = %inner.id,
                    job_id = %job.job_id,
                    error = %runner_err,
                    "workload runner failed"
                );
                inner
                    .board
                    .fail(&job.job_id, &runner_err.to_string(), latency, slo_violation, cost)
                    .await
            }
            Err(join_err) => {
                tracing::error!(
                    worker = %inner.id,
                    job_id = %job.job_id,
                    error = %join_err,
                    "workload runner panicked"
                );
                inner
                    .board
                    .fail(&job.job_id, "workload runner panicked", latency, slo_violation, cost)
                    .await
            }
        };

        inner.completed.fetch_add(1, Ordering::AcqRel);
        counter!("worker_completed_total", "worker" => inner.id.clone()).increment(1);
        inner.inflight.store(0, Ordering::Release);
        self.publish_load(0.1);

        tracing::info!(
            worker = %inner.id,
            job_id = %job.job_id,
            latency_sec = latency,
            slo_violation,
            "job finished"
        );
        written.map(|_| ())
    }

    fn publish_load(&self, util: f64) {
        let id = self.inner.id.clone();
        gauge!("worker_utilization", "worker" => id.clone()).set(util);
        gauge!("worker_power_watts", "worker" => id.clone()).set(estimate_power(util));
        gauge!("worker_inflight", "worker" => id)
            .set(self.inner.inflight.load(Ordering::Acquire) as f64);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use opengrid_core::{JobStatus, Priority, Workload, clock};
    use opengrid_store::MemoryStore;

    use super::*;

    fn setup() -> (Worker, JobBoard) {
        let board = JobBoard::new(Arc::new(MemoryStore::new()));
        let config = WorkerConfig {
            claim_timeout: Duration::from_millis(50),
            idle_sleep: Duration::from_millis(10),
            post_job_pause: Duration::from_millis(5),
            ..WorkerConfig::default()
        };
        let worker = Worker::new(board.clone(), "w1", config);
        (worker, board)
    }

    fn job(workload: Workload, size: u32, deadline_sec: u32) -> JobRecord {
        JobRecord::create(workload, size, 1, Priority::High, deadline_sec).unwrap()
    }

    async fn assign(board: &JobBoard, job: &JobRecord) {
        board.enqueue(job).await.unwrap();
        let peeked = board.peek_window(job.priority, 4).await.unwrap();
        board.take_queued(job.priority, &peeked[0].payload).await.unwrap();
        board.push_to_worker("w1", job).await.unwrap();
        board.mark_assigned("w1", job).await.unwrap();
    }

    async fn wait_for_done(board: &JobBoard, job_id: &str, deadline: Duration) -> JobStatus {
        let give_up = Instant::now() + deadline;
        loop {
            if let Some(status) = board.status(job_id).await.unwrap() {
                if status.is_terminal() {
                    return status;
                }
            }
            assert!(Instant::now() < give_up, "job {job_id} never finished");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn sleep_job_terminates_with_latency_and_no_violation() {
        let (worker, board) = setup();
        let job = job(Workload::Sleep, 100, 10);
        assign(&board, &job).await;

        let handle = worker.start();
        let status = wait_for_done(&board, &job.job_id, Duration::from_secs(3)).await;
        worker.shutdown();
        handle.await.unwrap();

        match status {
            JobStatus::Done {
                result,
                latency_sec,
                slo_violation,
                error,
            } => {
                assert!(result.elapsed_sec >= 0.1);
                assert!((0.1..1.0).contains(&latency_sec), "latency {latency_sec}");
                assert!(latency_sec >= result.elapsed_sec);
                assert!(!slo_violation);
                assert!(result.cost_usd > 0.0);
                assert_eq!(error, None);
            }
            other => panic!("expected done, got {other:?}"),
        }
        assert_eq!(worker.completed(), 1);
    }

    #[tokio::test]
    async fn blown_deadline_sets_the_violation_flag() {
        let (worker, board) = setup();
        // 1.2 s of sleep against a 1 s deadline.
        let job = job(Workload::Sleep, 1200, 1);
        assign(&board, &job).await;

        let handle = worker.start();
        let status = wait_for_done(&board, &job.job_id, Duration::from_secs(5)).await;
        worker.shutdown();
        handle.await.unwrap();

        match status {
            JobStatus::Done { slo_violation, .. } => assert!(slo_violation),
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn runner_failure_still_terminates_the_job() {
        let (worker, board) = setup();
        // Bypass submission validation: a wire record can carry any size.
        let oversized = JobRecord {
            job_id: "job-0-0001".to_string(),
            workload: Workload::Matmul,
            size: 100_000,
            iterations: 1,
            priority: Priority::High,
            deadline_sec: 10,
            submit_ts: clock::unix_now(),
        };
        board.push_to_worker("w1", &oversized).await.unwrap();
        board.mark_assigned("w1", &oversized).await.unwrap();

        let handle = worker.start();
        let status = wait_for_done(&board, &oversized.job_id, Duration::from_secs(3)).await;
        worker.shutdown();
        handle.await.unwrap();

        match status {
            JobStatus::Done {
                error, latency_sec, ..
            } => {
                assert!(error.unwrap().contains("budget"));
                assert!(latency_sec >= 0.0);
            }
            other => panic!("expected done, got {other:?}"),
        }
        // The failed job still counts as served; the loop stayed healthy.
        assert_eq!(worker.completed(), 1);
    }

    #[tokio::test]
    async fn unknown_workload_is_a_noop_not_a_failure() {
        let (worker, board) = setup();
        let job = JobRecord {
            job_id: "job-0-0002".to_string(),
            workload: Workload::Other("quantum".into()),
            size: 1,
            iterations: 1,
            priority: Priority::Med,
            deadline_sec: 10,
            submit_ts: clock::unix_now(),
        };
        board.push_to_worker("w1", &job).await.unwrap();
        board.mark_assigned("w1", &job).await.unwrap();

        let handle = worker.start();
        let status = wait_for_done(&board, &job.job_id, Duration::from_secs(3)).await;
        worker.shutdown();
        handle.await.unwrap();

        match status {
            JobStatus::Done { error, result, .. } => {
                assert_eq!(error, None);
                assert!(result.elapsed_sec >= 0.04);
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn heartbeat_registers_and_reports_stats() {
        let (worker, board) = setup();
        let handle = worker.start();

        // Give the loop a moment to publish its first heartbeat.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(board.workers().await.unwrap(), vec!["w1"]);
        let stats = board.worker_stats("w1").await.unwrap();
        assert_eq!(stats.inflight, 0);

        worker.shutdown();
        handle.await.unwrap();
    }

    #[test]
    fn power_model_is_monotonic_between_idle_and_tdp() {
        assert!((estimate_power(0.0) - 6.0).abs() < 1e-9);
        assert!((estimate_power(1.0) - 25.0).abs() < 1e-9);
        assert!(estimate_power(0.5) > estimate_power(0.1));
    }
}
