//! The scheduler loop.
//!
//! Each iteration: publish queue-length gauges, pick the candidate job
//! (strict priority, earliest absolute deadline within the peek window),
//! pick the least-loaded live worker, and move the job onto that worker's
//! personal list. Every store failure aborts the iteration; the loop never
//! propagates errors upward.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::task::JoinHandle;

use opengrid_core::{JobRecord, Priority, clock};
use opengrid_store::{JobBoard, StoreResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for the dispatch loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between iterations when all priority lists are empty.
    pub loop_interval: Duration,
    /// Sleep after requeueing a job because no worker was live.
    pub no_worker_backoff: Duration,
    /// Sleep after a failed store operation before retrying.
    pub error_backoff: Duration,
    /// How many records to peek per priority list. Kept small: the
    /// remove-by-value that follows is O(list length).
    pub peek_window: usize,
    /// A worker whose heartbeat is older than this is not live.
    pub heartbeat_stale: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            loop_interval: Duration::from_millis(600),
            no_worker_backoff: Duration::from_secs(1),
            error_backoff: Duration::from_millis(500),
            peek_window: 4,
            heartbeat_stale: Duration::from_secs(20),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// What a single iteration of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// All priority lists were empty.
    Idle,
    /// Another scheduler removed the peeked job first; retry immediately.
    StalePeek,
    /// No live worker; the job went back to the head of its priority list.
    NoLiveWorker { job_id: String },
    /// The job was moved onto a worker's personal list.
    Assigned { job_id: String, worker: String },
}

/// The priority- and deadline-aware dispatcher.
///
/// Cheaply cloneable (`Arc`-backed); one logical instance is expected per
/// cluster.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    board: JobBoard,
    config: SchedulerConfig,
    shutdown: AtomicBool,
}

impl Scheduler {
    /// Create a scheduler over `board`.
    pub fn new(board: JobBoard, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                board,
                config,
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the dispatch loop onto the tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Signal the loop to exit after the current iteration.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
    }

    /// Run the dispatch loop until [`Scheduler::shutdown`] is called.
    pub async fn run(&self) {
        tracing::info!("scheduler loop started");
        let config = &self.inner.config;
        while !self.inner.shutdown.load(Ordering::Acquire) {
            match self.tick().await {
                Ok(TickOutcome::Assigned { job_id, worker }) => {
                    tracing::info!(job_id = %job_id, worker = %worker, "job assigned");
                }
                Ok(TickOutcome::StalePeek) => {}
                Ok(TickOutcome::Idle) => {
                    tokio::time::sleep(config.loop_interval).await;
                }
                Ok(TickOutcome::NoLiveWorker { job_id }) => {
                    tracing::debug!(job_id = %job_id, "no live worker, requeued at head");
                    tokio::time::sleep(config.no_worker_backoff).await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "scheduler iteration failed");
                    tokio::time::sleep(config.error_backoff).await;
                }
            }
        }
        tracing::info!("scheduler loop stopped");
    }

    /// One iteration of the dispatch loop.
    ///
    /// Exposed so tests can drive the scheduler deterministically.
    pub async fn tick(&self) -> StoreResult<TickOutcome> {
        let board = &self.inner.board;

        let lengths = board.queue_lengths().await?;
        gauge!("q_high_len").set(lengths.high as f64);
        gauge!("q_med_len").set(lengths.med as f64);
        gauge!("q_low_len").set(lengths.low as f64);

        let job = match self.pick_candidate().await? {
            Pick::Empty => {
                counter!("idle_loops_total").increment(1);
                return Ok(TickOutcome::Idle);
            }
            Pick::Lost => return Ok(TickOutcome::StalePeek),
            Pick::Won(job) => job,
        };

        match self.pick_worker().await? {
            None => {
                board.requeue_head(&job).await?;
                Ok(TickOutcome::NoLiveWorker { job_id: job.job_id })
            }
            Some(worker) => {
                if let Err(err) = board.push_to_worker(&worker, &job).await {
                    // The job is in neither list right now; put it back at
                    // the head of its priority list before surfacing.
                    if let Err(requeue_err) = board.requeue_head(&job).await {
                        tracing::error!(
                            job_id = %job.job_id,
                            error = %requeue_err,
                            "failed to requeue after a failed assign"
                        );
                    }
                    return Err(err);
                }
                if let Err(err) = board.mark_assigned(&worker, &job).await {
                    // The worker already owns the job; readers tolerate a
                    // brief stale `queued` until the terminal write.
                    tracing::warn!(job_id = %job.job_id, error = %err, "assigned-status write failed");
                }
                counter!("assignments_total").increment(1);
                Ok(TickOutcome::Assigned {
                    job_id: job.job_id,
                    worker,
                })
            }
        }
    }

    // -- Candidate selection ------------------------------------------------

    async fn pick_candidate(&self) -> StoreResult<Pick> {
        let board = &self.inner.board;
        for priority in Priority::ORDER {
            let peeked = board
                .peek_window(priority, self.inner.config.peek_window)
                .await?;
            if peeked.is_empty() {
                continue;
            }

            // Earliest absolute deadline; strict `<` keeps the lowest list
            // index on ties.
            let mut best = 0;
            for (index, entry) in peeked.iter().enumerate() {
                if entry.job.absolute_deadline() < peeked[best].job.absolute_deadline() {
                    best = index;
                }
            }

            let chosen = &peeked[best];
            if !board.take_queued(priority, &chosen.payload).await? {
                return Ok(Pick::Lost);
            }
            return Ok(Pick::Won(chosen.job.clone()));
        }
        Ok(Pick::Empty)
    }

    // -- Worker selection ---------------------------------------------------

    /// Least-loaded live worker, ties broken by lexical id. Publishes the
    /// `workers_alive` gauge as a side effect of the scan.
    async fn pick_worker(&self) -> StoreResult<Option<String>> {
        let board = &self.inner.board;
        let stale = self.inner.config.heartbeat_stale.as_secs() as i64;
        let now = clock::unix_now_secs();

        let mut ids = board.workers().await?;
        ids.sort_unstable();

        let mut alive = 0u64;
        let mut best: Option<(String, u64)> = None;
        for id in ids {
            let Some(heartbeat) = board.worker_heartbeat(&id).await? else {
                continue;
            };
            if now - heartbeat >= stale {
                continue;
            }
            alive += 1;
            let stats = board.worker_stats(&id).await?;
            let better = match &best {
                None => true,
                Some((_, load)) => stats.inflight < *load,
            };
            if better {
                best = Some((id, stats.inflight));
            }
        }

        gauge!("workers_alive").set(alive as f64);
        Ok(best.map(|(id, _)| id))
    }
}

enum Pick {
    Empty,
    Lost,
    Won(JobRecord),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
