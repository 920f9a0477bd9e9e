//! The job board: typed operations over the raw state-store contract.
//!
//! Every component -- submission surface, scheduler, worker -- talks to the
//! store through this one layer, so the key schema and payload encoding
//! live in exactly one place. The board is mechanical: it performs single
//! store operations (or the fixed two-step move sequences) and leaves all
//! policy (priority order, peek window, liveness) to its callers.
//!
//! Payload identity matters: a job travels between lists as the exact JSON
//! string it was enqueued with, because remove-first-matching-value is the
//! race-resolution primitive. The board therefore hands peeked payloads
//! back to the caller verbatim for the later remove.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use opengrid_core::{JobRecord, JobResult, JobStatus, Priority, clock};

use crate::contract::StateStore;
use crate::error::{StoreError, StoreResult};
use crate::keys;

/// Lengths of the three priority lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLengths {
    pub high: usize,
    pub med: usize,
    pub low: usize,
}

/// A worker's load counters as stored in its stats hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub inflight: u64,
    pub completed: u64,
}

/// A job peeked from a priority list, with the verbatim payload needed to
/// remove it later.
#[derive(Debug, Clone)]
pub struct PeekedJob {
    pub payload: String,
    pub job: JobRecord,
}

/// Typed access to the cluster's shared state.
#[derive(Clone)]
pub struct JobBoard {
    store: Arc<dyn StateStore>,
}

impl JobBoard {
    /// Wrap a state-store backend.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    // -- Submission ---------------------------------------------------------

    /// Append a job to its priority list and record the `queued` status.
    pub async fn enqueue(&self, job: &JobRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(job)?;
        self.store
            .list_push_tail(keys::priority_queue(job.priority), &payload)
            .await?;
        self.write_status(
            &job.job_id,
            &JobStatus::Queued { info: job.clone() },
        )
        .await
    }

    /// Current lengths of the three priority lists.
    pub async fn queue_lengths(&self) -> StoreResult<QueueLengths> {
        Ok(QueueLengths {
            high: self.store.list_len(keys::Q_HIGH).await?,
            med: self.store.list_len(keys::Q_MED).await?,
            low: self.store.list_len(keys::Q_LOW).await?,
        })
    }

    // -- Scheduler side -----------------------------------------------------

    /// Peek up to `window` records from the head of a priority list.
    ///
    /// Records that vanish between the length read and the index read (a
    /// concurrent scheduler won them) are simply skipped.
    pub async fn peek_window(
        &self,
        priority: Priority,
        window: usize,
    ) -> StoreResult<Vec<PeekedJob>> {
        let key = keys::priority_queue(priority);
        let mut peeked = Vec::with_capacity(window);
        for index in 0..window {
            let Some(payload) = self.store.list_index(key, index).await? else {
                break;
            };
            let job: JobRecord = serde_json::from_str(&payload)?;
            peeked.push(PeekedJob { payload, job });
        }
        Ok(peeked)
    }

    /// Remove a peeked payload from its priority list.
    ///
    /// `false` means another scheduler already took it; the peek was stale.
    pub async fn take_queued(&self, priority: Priority, payload: &str) -> StoreResult<bool> {
        self.store
            .list_remove_first(keys::priority_queue(priority), payload)
            .await
    }

    /// Return a job to the **head** of its original priority list.
    ///
    /// Head placement keeps the job ahead of everything behind it, so a
    /// requeue never demotes it within its own class.
    pub async fn requeue_head(&self, job: &JobRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(job)?;
        self.store
            .list_push_head(keys::priority_queue(job.priority), &payload)
            .await
    }

    /// Append a job to a worker's personal list.
    pub async fn push_to_worker(&self, worker_id: &str, job: &JobRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(job)?;
        self.store
            .list_push_tail(&keys::worker_queue(worker_id), &payload)
            .await
    }

    /// Record the `assigned` status for a job placed on `worker_id`'s list.
    pub async fn mark_assigned(&self, worker_id: &str, job: &JobRecord) -> StoreResult<()> {
        self.write_status(
            &job.job_id,
            &JobStatus::Assigned {
                worker: worker_id.to_string(),
                info: job.clone(),
            },
        )
        .await
    }

    // -- Worker side --------------------------------------------------------

    /// Block up to `timeout` for the next job on a worker's personal list.
    pub async fn claim(
        &self,
        worker_id: &str,
        timeout: Duration,
    ) -> StoreResult<Option<JobRecord>> {
        let popped = self
            .store
            .list_pop_head_blocking(&keys::worker_queue(worker_id), timeout)
            .await?;
        match popped {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Write the terminal status for a successfully executed job.
    ///
    /// Returns `false` (and writes nothing) if a terminal status already
    /// exists: `done` is never overwritten.
    pub async fn complete(
        &self,
        job_id: &str,
        result: JobResult,
        latency_sec: f64,
        slo_violation: bool,
    ) -> StoreResult<bool> {
        self.write_terminal(
            job_id,
            JobStatus::Done {
                result,
                latency_sec,
                slo_violation,
                error: None,
            },
        )
        .await
    }

    /// Write the terminal status for a job whose runner failed.
    ///
    /// The job still terminates -- with the error recorded and the measured
    /// latency -- so clients never wait forever on a failed job.
    pub async fn fail(
        &self,
        job_id: &str,
        error: &str,
        latency_sec: f64,
        slo_violation: bool,
        cost_usd: f64,
    ) -> StoreResult<bool> {
        self.write_terminal(
            job_id,
            JobStatus::Done {
                result: JobResult {
                    elapsed_sec: 0.0,
                    cost_usd,
                },
                latency_sec,
                slo_violation,
                error: Some(error.to_string()),
            },
        )
        .await
    }

    /// Read a job's status record.
    pub async fn status(&self, job_id: &str) -> StoreResult<Option<JobStatus>> {
        let raw = self.store.hash_get(keys::JOB_STATUS, job_id).await?;
        match raw {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    // -- Worker liveness ----------------------------------------------------

    /// Publish a worker's heartbeat and load counters.
    ///
    /// Registers the id in the workers set, writes the current wall-clock
    /// second under a TTL, and updates the stats hash.
    pub async fn heartbeat(
        &self,
        worker_id: &str,
        inflight: u64,
        completed: u64,
        ttl: Duration,
    ) -> StoreResult<()> {
        self.store.set_add(keys::WORKERS_SET, worker_id).await?;
        self.store
            .string_set_with_ttl(
                &keys::worker_heartbeat(worker_id),
                &clock::unix_now_secs().to_string(),
                ttl,
            )
            .await?;
        self.store
            .hash_set_all(
                &keys::worker_stats(worker_id),
                vec![
                    ("inflight".to_string(), inflight.to_string()),
                    ("completed".to_string(), completed.to_string()),
                ],
            )
            .await
    }

    /// All worker ids ever registered (liveness is judged separately).
    pub async fn workers(&self) -> StoreResult<Vec<String>> {
        self.store.set_members(keys::WORKERS_SET).await
    }

    /// A worker's last heartbeat in unix seconds, `None` once the TTL lapsed.
    pub async fn worker_heartbeat(&self, worker_id: &str) -> StoreResult<Option<i64>> {
        let key = keys::worker_heartbeat(worker_id);
        let Some(raw) = self.store.string_get(&key).await? else {
            return Ok(None);
        };
        let seconds = raw.parse::<i64>().map_err(|_| StoreError::Malformed {
            key,
            reason: format!("non-integer heartbeat: {raw}"),
        })?;
        Ok(Some(seconds))
    }

    /// A worker's load counters; zeroes when the stats hash is absent.
    pub async fn worker_stats(&self, worker_id: &str) -> StoreResult<WorkerStats> {
        let key = keys::worker_stats(worker_id);
        let hash = self.store.hash_get_all(&key).await?;
        Ok(WorkerStats {
            inflight: parse_stat(&key, &hash, "inflight")?,
            completed: parse_stat(&key, &hash, "completed")?,
        })
    }

    // -- Internal -----------------------------------------------------------

    async fn write_status(&self, job_id: &str, status: &JobStatus) -> StoreResult<()> {
        let payload = serde_json::to_string(status)?;
        self.store
            .hash_set(keys::JOB_STATUS, job_id, &payload)
            .await
    }

    async fn write_terminal(&self, job_id: &str, status: JobStatus) -> StoreResult<bool> {
        if let Some(existing) = self.status(job_id).await? {
            if existing.is_terminal() {
                tracing::warn!(job_id = %job_id, "terminal status already written, keeping first");
                return Ok(false);
            }
        }
        self.write_status(job_id, &status).await?;
        Ok(true)
    }
}

fn parse_stat(
    key: &str,
    hash: &HashMap<String, String>,
    field: &str,
) -> StoreResult<u64> {
    match hash.get(field) {
        None => Ok(0),
        Some(raw) => raw.parse::<u64>().map_err(|_| StoreError::Malformed {
            key: key.to_string(),
            reason: format!("non-integer {field}: {raw}"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use opengrid_core::Workload;

    use super::*;
    use crate::memory::MemoryStore;

    fn board() -> JobBoard {
        JobBoard::new(Arc::new(MemoryStore::new()))
    }

    fn job(priority: Priority) -> JobRecord {
        JobRecord::create(Workload::Sleep, 50, 1, priority, 10).unwrap()
    }

    #[tokio::test]
    async fn enqueue_places_job_and_queued_status() {
        let board = board();
        let job = job(Priority::High);
        board.enqueue(&job).await.unwrap();

        let lengths = board.queue_lengths().await.unwrap();
        assert_eq!((lengths.high, lengths.med, lengths.low), (1, 0, 0));

        let status = board.status(&job.job_id).await.unwrap().unwrap();
        assert_eq!(status, JobStatus::Queued { info: job });
    }

    #[tokio::test]
    async fn peek_take_assign_claim_roundtrip() {
        let board = board();
        let job = job(Priority::Med);
        board.enqueue(&job).await.unwrap();

        let peeked = board.peek_window(Priority::Med, 4).await.unwrap();
        assert_eq!(peeked.len(), 1);
        assert_eq!(peeked[0].job, job);

        assert!(board.take_queued(Priority::Med, &peeked[0].payload).await.unwrap());
        board.push_to_worker("w1", &job).await.unwrap();
        board.mark_assigned("w1", &job).await.unwrap();

        match board.status(&job.job_id).await.unwrap().unwrap() {
            JobStatus::Assigned { worker, info } => {
                assert_eq!(worker, "w1");
                assert_eq!(info, job);
            }
            other => panic!("expected assigned, got {other:?}"),
        }

        let claimed = board
            .claim("w1", Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed, job);
    }

    #[tokio::test]
    async fn take_queued_reports_stale_peek() {
        let board = board();
        let job = job(Priority::Low);
        board.enqueue(&job).await.unwrap();

        let peeked = board.peek_window(Priority::Low, 4).await.unwrap();
        assert!(board.take_queued(Priority::Low, &peeked[0].payload).await.unwrap());
        // A second scheduler holding the same peek loses the race.
        assert!(!board.take_queued(Priority::Low, &peeked[0].payload).await.unwrap());
    }

    #[tokio::test]
    async fn requeue_head_goes_before_existing_jobs() {
        let board = board();
        let first = job(Priority::High);
        let second = job(Priority::High);
        board.enqueue(&first).await.unwrap();
        board.enqueue(&second).await.unwrap();

        let peeked = board.peek_window(Priority::High, 4).await.unwrap();
        board.take_queued(Priority::High, &peeked[0].payload).await.unwrap();
        board.requeue_head(&first).await.unwrap();

        let again = board.peek_window(Priority::High, 4).await.unwrap();
        assert_eq!(again[0].job.job_id, first.job_id);
        assert_eq!(again[1].job.job_id, second.job_id);
    }

    #[tokio::test]
    async fn terminal_status_is_never_overwritten() {
        let board = board();
        let job = job(Priority::Med);
        board.enqueue(&job).await.unwrap();

        let result = JobResult {
            elapsed_sec: 0.05,
            cost_usd: 3e-6,
        };
        assert!(board.complete(&job.job_id, result.clone(), 0.06, false).await.unwrap());
        // Second terminal write (success or failure) is refused.
        assert!(!board.complete(&job.job_id, result, 9.0, true).await.unwrap());
        assert!(!board.fail(&job.job_id, "late failure", 9.0, true, 0.0).await.unwrap());

        match board.status(&job.job_id).await.unwrap().unwrap() {
            JobStatus::Done {
                latency_sec, error, ..
            } => {
                assert!((latency_sec - 0.06).abs() < f64::EPSILON);
                assert_eq!(error, None);
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn heartbeat_publishes_membership_stats_and_ttl() {
        let board = board();
        board
            .heartbeat("w1", 1, 7, Duration::from_millis(40))
            .await
            .unwrap();

        assert_eq!(board.workers().await.unwrap(), vec!["w1"]);
        assert!(board.worker_heartbeat("w1").await.unwrap().is_some());
        assert_eq!(
            board.worker_stats("w1").await.unwrap(),
            WorkerStats {
                inflight: 1,
                completed: 7
            }
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        // TTL evicts the heartbeat; membership and stats persist.
        assert_eq!(board.worker_heartbeat("w1").await.unwrap(), None);
        assert_eq!(board.workers().await.unwrap(), vec!["w1"]);
    }

    #[tokio::test]
    async fn stats_default_to_zero_for_unknown_worker() {
        let board = board();
        assert_eq!(board.worker_stats("ghost").await.unwrap(), WorkerStats::default());
        assert_eq!(board.worker_heartbeat("ghost").await.unwrap(), None);
    }
}
