//! Integration tests for the opengrid-store crate.
//!
//! These exercise the job board and the in-memory backend together as one
//! fabric: the full queued -> assigned -> done lifecycle, payload identity
//! across list moves, and the conservation of job ids across the store.

use std::sync::Arc;
use std::time::Duration;

use opengrid_core::{JobRecord, JobResult, JobStatus, Priority, Workload};
use opengrid_store::{JobBoard, MemoryStore};

fn board() -> JobBoard {
    JobBoard::new(Arc::new(MemoryStore::new()))
}

fn job(priority: Priority, deadline_sec: u32) -> JobRecord {
    JobRecord::create(Workload::Sleep, 50, 1, priority, deadline_sec).unwrap()
}

#[tokio::test]
async fn full_lifecycle_is_monotonic() {
    let board = board();
    let job = job(Priority::High, 10);

    board.enqueue(&job).await.unwrap();
    assert_eq!(
        board.status(&job.job_id).await.unwrap().unwrap().state(),
        "queued"
    );

    let peeked = board.peek_window(Priority::High, 4).await.unwrap();
    assert!(board.take_queued(Priority::High, &peeked[0].payload).await.unwrap());
    board.push_to_worker("w1", &job).await.unwrap();
    board.mark_assigned("w1", &job).await.unwrap();
    assert_eq!(
        board.status(&job.job_id).await.unwrap().unwrap().state(),
        "assigned"
    );

    let claimed = board
        .claim("w1", Duration::from_millis(20))
        .await
        .unwrap()
        .expect("assigned job must be claimable");
    assert_eq!(claimed.job_id, job.job_id);

    board
        .complete(
            &job.job_id,
            JobResult {
                elapsed_sec: 0.05,
                cost_usd: 3.6e-6,
            },
            0.06,
            false,
        )
        .await
        .unwrap();

    let terminal = board.status(&job.job_id).await.unwrap().unwrap();
    assert!(terminal.is_terminal());

    // Terminal re-reads are byte-stable.
    let first = serde_json::to_string(&terminal).unwrap();
    let second = serde_json::to_string(&board.status(&job.job_id).await.unwrap().unwrap()).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn job_ids_are_conserved_across_lists_and_status() {
    let board = board();

    let mut submitted = Vec::new();
    for (priority, deadline) in [
        (Priority::High, 5),
        (Priority::Med, 10),
        (Priority::Med, 3),
        (Priority::Low, 30),
    ] {
        let job = job(priority, deadline);
        board.enqueue(&job).await.unwrap();
        submitted.push(job);
    }

    // Move one job to a worker list; finish another outright.
    let peeked = board.peek_window(Priority::Med, 4).await.unwrap();
    board.take_queued(Priority::Med, &peeked[0].payload).await.unwrap();
    board.push_to_worker("w1", &peeked[0].job).await.unwrap();
    board.mark_assigned("w1", &peeked[0].job).await.unwrap();

    // Every submitted id is visible in exactly one queue position or in the
    // status hash with a state reflecting its location.
    for job in &submitted {
        let status = board.status(&job.job_id).await.unwrap().unwrap();
        match status {
            JobStatus::Queued { info } => assert_eq!(info.job_id, job.job_id),
            JobStatus::Assigned { worker, info } => {
                assert_eq!(worker, "w1");
                assert_eq!(info.job_id, job.job_id);
            }
            JobStatus::Done { .. } => panic!("nothing finished yet"),
        }
    }

    let lengths = board.queue_lengths().await.unwrap();
    assert_eq!(lengths.high + lengths.med + lengths.low, 3);
}

#[tokio::test]
async fn claim_times_out_on_an_empty_personal_list() {
    let board = board();
    let claimed = board.claim("idle-worker", Duration::from_millis(20)).await.unwrap();
    assert!(claimed.is_none());
}

#[tokio::test]
async fn peek_window_is_bounded() {
    let board = board();
    for _ in 0..6 {
        board.enqueue(&job(Priority::High, 10)).await.unwrap();
    }
    let peeked = board.peek_window(Priority::High, 4).await.unwrap();
    assert_eq!(peeked.len(), 4);
}
