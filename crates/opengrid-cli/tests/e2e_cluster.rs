//! End-to-end cluster scenarios over the in-memory store.
//!
//! Each test stands up real scheduler and worker loops (shortened timers)
//! against one shared `MemoryStore` and drives jobs through submit ->
//! dispatch -> execute -> terminal status, asserting the ordering and SLO
//! contracts a client would observe.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use opengrid_core::{JobRecord, JobStatus, Priority, Workload};
use opengrid_scheduler::{Scheduler, SchedulerConfig};
use opengrid_store::{JobBoard, MemoryStore};
use opengrid_worker::{Worker, WorkerConfig};

fn fast_scheduler(board: &JobBoard) -> Scheduler {
    Scheduler::new(
        board.clone(),
        SchedulerConfig {
            loop_interval: Duration::from_millis(40),
            no_worker_backoff: Duration::from_millis(100),
            error_backoff: Duration::from_millis(50),
            ..SchedulerConfig::default()
        },
    )
}

fn fast_worker(board: &JobBoard, id: &str) -> Worker {
    Worker::new(
        board.clone(),
        id,
        WorkerConfig {
            claim_timeout: Duration::from_millis(100),
            idle_sleep: Duration::from_millis(20),
            post_job_pause: Duration::from_millis(5),
            ..WorkerConfig::default()
        },
    )
}

fn sleep_job(priority: Priority, millis: u32, deadline_sec: u32) -> JobRecord {
    JobRecord::create(Workload::Sleep, millis, 1, priority, deadline_sec).unwrap()
}

async fn terminal_status(board: &JobBoard, job_id: &str) -> Option<JobStatus> {
    board
        .status(job_id)
        .await
        .unwrap()
        .filter(JobStatus::is_terminal)
}

async fn wait_for_done(board: &JobBoard, job_id: &str, deadline: Duration) -> JobStatus {
    let give_up = Instant::now() + deadline;
    loop {
        if let Some(status) = terminal_status(board, job_id).await {
            return status;
        }
        assert!(Instant::now() < give_up, "job {job_id} never finished");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn single_high_job_completes_within_budget() {
    let board = JobBoard::new(Arc::new(MemoryStore::new()));
    let scheduler = fast_scheduler(&board);
    let worker = fast_worker(&board, "w1");
    let scheduler_handle = scheduler.start();
    let worker_handle = worker.start();

    let job = sleep_job(Priority::High, 100, 10);
    board.enqueue(&job).await.unwrap();

    let status = wait_for_done(&board, &job.job_id, Duration::from_secs(3)).await;
    match status {
        JobStatus::Done {
            latency_sec,
            slo_violation,
            error,
            ..
        } => {
            assert!((0.1..1.0).contains(&latency_sec), "latency {latency_sec}");
            assert!(!slo_violation);
            assert_eq!(error, None);
        }
        other => panic!("expected done, got {other:?}"),
    }

    scheduler.shutdown();
    worker.shutdown();
    scheduler_handle.await.unwrap();
    worker_handle.await.unwrap();
}

#[tokio::test]
async fn high_priority_finishes_before_the_low_backlog() {
    let board = JobBoard::new(Arc::new(MemoryStore::new()));

    // Submit 5 low, then 1 high, before the cluster starts.
    let lows: Vec<JobRecord> = (0..5).map(|_| sleep_job(Priority::Low, 50, 30)).collect();
    for job in &lows {
        board.enqueue(job).await.unwrap();
    }
    let high = sleep_job(Priority::High, 50, 30);
    board.enqueue(&high).await.unwrap();

    let scheduler = fast_scheduler(&board);
    let worker = fast_worker(&board, "w1");
    let scheduler_handle = scheduler.start();
    let worker_handle = worker.start();

    wait_for_done(&board, &high.job_id, Duration::from_secs(5)).await;

    // At the moment the high job is done, at most one low snuck ahead.
    let mut lows_done = 0;
    for job in &lows {
        if terminal_status(&board, &job.job_id).await.is_some() {
            lows_done += 1;
        }
    }
    assert!(lows_done <= 1, "{lows_done} low jobs finished before high");

    // Drain the backlog so shutdown leaves nothing in flight.
    for job in &lows {
        wait_for_done(&board, &job.job_id, Duration::from_secs(5)).await;
    }

    scheduler.shutdown();
    worker.shutdown();
    scheduler_handle.await.unwrap();
    worker_handle.await.unwrap();
}

#[tokio::test]
async fn least_loaded_placement_balances_two_workers() {
    let board = JobBoard::new(Arc::new(MemoryStore::new()));
    let scheduler = fast_scheduler(&board);
    let workers = [fast_worker(&board, "w1"), fast_worker(&board, "w2")];
    let scheduler_handle = scheduler.start();
    let worker_handles: Vec<_> = workers.iter().map(Worker::start).collect();

    // Let both workers publish a first heartbeat before jobs arrive.
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Identical service time; spaced submissions so placement always sees
    // fresh load. The idle worker must win every time.
    let mut jobs = Vec::new();
    for _ in 0..10 {
        let job = sleep_job(Priority::High, 500, 30);
        board.enqueue(&job).await.unwrap();
        jobs.push(job);
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    for job in &jobs {
        wait_for_done(&board, &job.job_id, Duration::from_secs(10)).await;
    }

    let w1 = workers[0].completed();
    let w2 = workers[1].completed();
    assert_eq!(w1 + w2, 10);
    assert!(
        w1.abs_diff(w2) <= 1,
        "completed counts diverged: w1={w1} w2={w2}"
    );

    scheduler.shutdown();
    for worker in &workers {
        worker.shutdown();
    }
    scheduler_handle.await.unwrap();
    for handle in worker_handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn jobs_stay_queued_when_the_only_worker_is_gone() {
    let board = JobBoard::new(Arc::new(MemoryStore::new()));
    let scheduler = fast_scheduler(&board);
    let scheduler_handle = scheduler.start();

    // A worker that lived once, then died; its heartbeat TTL lapses.
    let worker = Worker::new(
        board.clone(),
        "w1",
        WorkerConfig {
            claim_timeout: Duration::from_millis(50),
            idle_sleep: Duration::from_millis(10),
            heartbeat_ttl: Duration::from_millis(120),
            ..WorkerConfig::default()
        },
    );
    let worker_handle = worker.start();
    tokio::time::sleep(Duration::from_millis(60)).await;
    worker.shutdown();
    worker_handle.await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let job = sleep_job(Priority::Med, 50, 10);
    board.enqueue(&job).await.unwrap();

    // Give the scheduler several iterations: the job must keep returning to
    // the head of its list, never be marked assigned, never be lost.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let lengths = board.queue_lengths().await.unwrap();
    assert_eq!(lengths.med, 1);
    assert!(matches!(
        board.status(&job.job_id).await.unwrap().unwrap(),
        JobStatus::Queued { .. }
    ));

    scheduler.shutdown();
    scheduler_handle.await.unwrap();
}

#[tokio::test]
async fn blown_deadline_is_flagged_end_to_end() {
    let board = JobBoard::new(Arc::new(MemoryStore::new()));
    let scheduler = fast_scheduler(&board);
    let worker = fast_worker(&board, "w1");
    let scheduler_handle = scheduler.start();
    let worker_handle = worker.start();

    // ~1.3 s of work against a 1 s deadline.
    let job = sleep_job(Priority::High, 1300, 1);
    board.enqueue(&job).await.unwrap();

    let status = wait_for_done(&board, &job.job_id, Duration::from_secs(5)).await;
    match status {
        JobStatus::Done { slo_violation, .. } => assert!(slo_violation),
        other => panic!("expected done, got {other:?}"),
    }

    scheduler.shutdown();
    worker.shutdown();
    scheduler_handle.await.unwrap();
    worker_handle.await.unwrap();
}
