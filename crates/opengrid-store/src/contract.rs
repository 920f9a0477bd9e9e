//! The state-store contract.
//!
//! Exactly the operations the dispatch core depends on. Each operation is
//! individually atomic; the contract deliberately offers no multi-key
//! transaction, because the core resolves every race with
//! [`StateStore::list_remove_first`] (at most one caller wins a given
//! payload) plus the single-writer-per-worker-list discipline.
//!
//! The rest of the workspace is pure with respect to this trait, which is
//! what makes [`crate::MemoryStore`] a faithful stand-in for Redis in tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Atomic key/value, list, hash, set, and TTL-string operations.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Append a value at the tail of a list (RPUSH).
    async fn list_push_tail(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Push a value at the head of a list (LPUSH); used for requeue.
    async fn list_push_head(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Read the value at `index` without removing it (LINDEX).
    async fn list_index(&self, key: &str, index: usize) -> StoreResult<Option<String>>;

    /// Current length of a list (LLEN); zero for a missing key.
    async fn list_len(&self, key: &str) -> StoreResult<usize>;

    /// Remove the first element equal to `value` (LREM count=1).
    ///
    /// Returns `false` when no element matched -- the caller's view of the
    /// list was stale.
    async fn list_remove_first(&self, key: &str, value: &str) -> StoreResult<bool>;

    /// Pop the head of a list, blocking up to `timeout` (BLPOP).
    async fn list_pop_head_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> StoreResult<Option<String>>;

    /// Set one field of a hash (HSET).
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Read one field of a hash (HGET).
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Set several fields of a hash in one atomic call (HSET mapping).
    async fn hash_set_all(&self, key: &str, entries: Vec<(String, String)>) -> StoreResult<()>;

    /// Read a whole hash (HGETALL); empty for a missing key.
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Add a member to a set (SADD).
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()>;

    /// All members of a set (SMEMBERS); empty for a missing key.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Set a string value that the store evicts after `ttl` (SET EX).
    async fn string_set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()>;

    /// Read a string value; `None` once the TTL has lapsed (GET).
    async fn string_get(&self, key: &str) -> StoreResult<Option<String>>;
}
