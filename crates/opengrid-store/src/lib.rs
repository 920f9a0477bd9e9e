//! OpenGrid state-store fabric.
//!
//! The state store is the only communication channel between the submission
//! surface, the scheduler, and the workers. This crate provides:
//!
//! - **[`contract`]** -- The [`StateStore`] trait: the exact set of atomic
//!   list/hash/set/TTL-string operations the dispatch core depends on, and
//!   nothing more. No multi-key transactions; every race is resolved by
//!   remove-first-matching-value and the single-writer-per-worker-list
//!   discipline.
//! - **[`redis_store`]** -- The production backend over a Redis connection
//!   manager.
//! - **[`memory`]** -- An in-process fake with the same observable semantics
//!   (blocking pop wakeups, TTL lapse) so the scheduler and worker loops are
//!   unit-testable without a network.
//! - **[`keys`]** -- The bit-exact key schema shared with any other client
//!   of the same store.
//! - **[`board`]** -- [`JobBoard`], the typed layer every component talks
//!   to: enqueue, peek, assign, claim, terminal status, heartbeat, stats.
//! - **[`error`]** -- Unified store error types via [`thiserror`].

pub mod board;
pub mod contract;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_store;

pub use board::{JobBoard, QueueLengths, WorkerStats};
pub use contract::StateStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
